//! Dimension identifiers.
//!
//! A command source always acts from inside one dimension. Dimensions do not
//! share a coordinate frame: the Nether is compressed horizontally, so moving
//! a locus between dimensions has to rescale its x/z components.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Stable identifier for a world dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum DimensionId {
    /// The Overworld dimension.
    Overworld = 0,
    /// The Nether dimension.
    Nether = 1,
    /// The End dimension.
    End = 2,
}

/// Error returned when a dimension key is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown dimension '{0}'")]
pub struct ParseDimensionError(pub String);

impl DimensionId {
    /// Default (Overworld) dimension.
    pub const DEFAULT: Self = Self::Overworld;

    /// Every dimension, in stable id order.
    pub const ALL: [Self; 3] = [Self::Overworld, Self::Nether, Self::End];

    /// Convert to a stable numeric representation.
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Canonical namespaced key used by commands and configs.
    pub const fn key(self) -> &'static str {
        match self {
            Self::Overworld => "minecraft:overworld",
            Self::Nether => "minecraft:the_nether",
            Self::End => "minecraft:the_end",
        }
    }

    /// How many overworld blocks one horizontal block of this dimension spans.
    pub const fn coordinate_scale(self) -> f64 {
        match self {
            Self::Nether => 8.0,
            Self::Overworld | Self::End => 1.0,
        }
    }

    /// Factor applied to x/z when moving a locus from `from` into `to`.
    pub fn teleportation_scale(from: Self, to: Self) -> f64 {
        from.coordinate_scale() / to.coordinate_scale()
    }
}

impl Default for DimensionId {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl FromStr for DimensionId {
    type Err = ParseDimensionError;

    /// Accepts the namespaced key, or the bare path which implies `minecraft:`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let path = s.strip_prefix("minecraft:").unwrap_or(s);
        match path {
            "overworld" => Ok(Self::Overworld),
            "the_nether" | "nether" => Ok(Self::Nether),
            "the_end" | "end" => Ok(Self::End),
            _ => Err(ParseDimensionError(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_round_trip_through_from_str() {
        for dim in DimensionId::ALL {
            assert_eq!(dim.key().parse::<DimensionId>(), Ok(dim));
        }
        assert_eq!("nether".parse::<DimensionId>(), Ok(DimensionId::Nether));
        assert!("minecraft:moon".parse::<DimensionId>().is_err());
    }

    #[test]
    fn nether_compresses_horizontal_space() {
        let into_nether = DimensionId::teleportation_scale(DimensionId::Overworld, DimensionId::Nether);
        let out_of_nether =
            DimensionId::teleportation_scale(DimensionId::Nether, DimensionId::Overworld);
        assert_eq!(into_nether, 0.125);
        assert_eq!(out_of_nether, 8.0);
        assert_eq!(
            DimensionId::teleportation_scale(DimensionId::Overworld, DimensionId::End),
            1.0
        );
    }
}
