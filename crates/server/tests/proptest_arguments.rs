//! Fuzz-style property tests for the world argument parsers.

use std::sync::Arc;

use glam::DVec3;
use mdcommand_dispatch::{ArgumentType, StringReader};
use mdcommand_server::arguments::{
    anchor, dimension, entities, rotation, vec3, Coordinates, EntitySelector,
};
use mdcommand_server::{CommandSource, NullHost, NullOutput};
use proptest::prelude::*;

fn source(level: i32) -> CommandSource {
    CommandSource::new("Alex", Arc::new(NullHost), Arc::new(NullOutput)).with_permission(level)
}

proptest! {
    /// Property: no parser panics, and a failed parse points inside the input.
    #[test]
    fn parsers_never_panic(input in "[ -~]{0,24}", level in 0i32..5) {
        let source = source(level);
        let (e, v, r, d, a) = (entities(), vec3(), rotation(), dimension(), anchor());
        let types: [&dyn ArgumentType<CommandSource>; 5] = [&e, &v, &r, &d, &a];
        for ty in types {
            let mut reader = StringReader::new(input.as_str());
            if let Err(err) = ty.parse_with_source(&mut reader, &source) {
                if let Some(cursor) = err.cursor() {
                    prop_assert!(cursor <= input.len());
                }
            }
        }
    }

    /// Property: integer x and z land on the block centre; y and relative parts do not move.
    #[test]
    fn integer_coordinates_are_centred(x in -30_000i32..30_000, y in -64i32..320, z in -30_000i32..30_000, dy in -10i32..10) {
        let here = source(0).with_position(DVec3::new(0.25, 70.0, -3.0));
        let text = format!("{x} {y} {z}");
        let value = vec3().parse(&mut StringReader::new(text.as_str())).unwrap();
        let coords = value.downcast_ref::<Coordinates>().unwrap();
        prop_assert_eq!(coords.position(&here), DVec3::new(x as f64 + 0.5, y as f64, z as f64 + 0.5));

        let text = format!("~ ~{dy} ~");
        let value = vec3().parse(&mut StringReader::new(text.as_str())).unwrap();
        let coords = value.downcast_ref::<Coordinates>().unwrap();
        prop_assert_eq!(coords.position(&here), DVec3::new(0.25, 70.0 + dy as f64, -3.0));
    }

    /// Property: any player-shaped name parses as a name regardless of level.
    #[test]
    fn names_parse_without_selector_rights(name in "[A-Za-z0-9_]{1,16}") {
        let mut reader = StringReader::new(name.as_str());
        let value = entities().parse_with_source(&mut reader, &source(0)).unwrap();
        prop_assert_eq!(value.downcast_ref::<EntitySelector>(), Some(&EntitySelector::Name(name.clone())));
        prop_assert!(!reader.can_read());
    }
}
