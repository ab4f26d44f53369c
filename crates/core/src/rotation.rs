//! Yaw/pitch helpers.

use glam::DVec3;
use serde::{Deserialize, Serialize};

/// Orientation in degrees. `pitch` is the x rotation, `yaw` the y rotation.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rotation {
    /// Vertical look angle; negative looks up.
    pub pitch: f32,
    /// Horizontal look angle; 0 faces +z.
    pub yaw: f32,
}

impl Rotation {
    /// Looking straight ahead along +z.
    pub const ZERO: Self = Self {
        pitch: 0.0,
        yaw: 0.0,
    };

    /// Create a rotation from pitch and yaw in degrees.
    pub const fn new(pitch: f32, yaw: f32) -> Self {
        Self { pitch, yaw }
    }
}

/// Wrap an angle in degrees into `[-180, 180)`.
pub fn wrap_degrees(value: f32) -> f32 {
    let mut wrapped = value % 360.0;
    if wrapped >= 180.0 {
        wrapped -= 360.0;
    }
    if wrapped < -180.0 {
        wrapped += 360.0;
    }
    wrapped
}

/// Rotation that looks from `from` towards `target`.
pub fn facing_rotation(from: DVec3, target: DVec3) -> Rotation {
    let delta = target - from;
    let horizontal = (delta.x * delta.x + delta.z * delta.z).sqrt();
    let pitch = wrap_degrees(-(delta.y.atan2(horizontal).to_degrees()) as f32);
    let yaw = wrap_degrees(delta.z.atan2(delta.x).to_degrees() as f32 - 90.0);
    Rotation::new(pitch, yaw)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrap_degrees_stays_in_canonical_range() {
        assert_eq!(wrap_degrees(0.0), 0.0);
        assert_eq!(wrap_degrees(180.0), -180.0);
        assert_eq!(wrap_degrees(-180.0), -180.0);
        assert_eq!(wrap_degrees(270.0), -90.0);
        assert_eq!(wrap_degrees(-190.0), 170.0);
        assert_eq!(wrap_degrees(725.0), 5.0);
    }

    #[test]
    fn facing_points_along_axes() {
        let origin = DVec3::ZERO;
        let south = facing_rotation(origin, DVec3::new(0.0, 0.0, 10.0));
        assert!(south.yaw.abs() < 1e-4);
        assert!(south.pitch.abs() < 1e-4);

        let east = facing_rotation(origin, DVec3::new(10.0, 0.0, 0.0));
        assert!((east.yaw + 90.0).abs() < 1e-4);

        let up = facing_rotation(origin, DVec3::new(0.0, 10.0, 0.0));
        assert!((up.pitch + 90.0).abs() < 1e-4);
    }
}
