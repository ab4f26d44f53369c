//! Argument types that read world concepts: entities, coordinates, rotations,
//! dimensions and anchors.

use std::cmp::Ordering;

use glam::DVec3;
use mdcommand_core::{DimensionId, Rotation};
use mdcommand_dispatch::{
    ArgumentType, ArgumentTypeRegistry, ArgumentValue, CommandContext, CommandError,
    CommandSyntaxError, StringReader, SuggestionsBuilder, SyntaxErrorKind,
};

use crate::host::EntitySnapshot;
use crate::source::{CommandSource, EntityAnchor};

/// Type key of [`EntityArgument`].
pub const ENTITY_KEY: &str = "minecraft:entity";
/// Type key of [`Vec3Argument`].
pub const VEC3_KEY: &str = "minecraft:vec3";
/// Type key of [`RotationArgument`].
pub const ROTATION_KEY: &str = "minecraft:rotation";
/// Type key of [`DimensionArgument`].
pub const DIMENSION_KEY: &str = "minecraft:dimension";
/// Type key of [`AnchorArgument`].
pub const ANCHOR_KEY: &str = "minecraft:entity_anchor";
/// Type key of [`ResourceLocationArgument`].
pub const RESOURCE_LOCATION_KEY: &str = "minecraft:resource_location";

/// Record the keys of every type in this module.
pub fn register_domain_types(registry: &mut ArgumentTypeRegistry) {
    for key in [
        ENTITY_KEY,
        VEC3_KEY,
        ROTATION_KEY,
        DIMENSION_KEY,
        ANCHOR_KEY,
        RESOURCE_LOCATION_KEY,
    ] {
        registry.register(key);
    }
}

fn syntax_error(message: impl Into<String>, reader: &StringReader) -> CommandSyntaxError {
    CommandSyntaxError::with_context(SyntaxErrorKind::Custom(message.into()), reader)
}

fn fail_at(
    reader: &mut StringReader,
    start: usize,
    message: impl Into<String>,
) -> CommandSyntaxError {
    reader.set_cursor(start);
    syntax_error(message, reader)
}

// ---------------------------------------------------------------------------
// Entities
// ---------------------------------------------------------------------------

/// The `@x` part of a selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectorKind {
    /// `@a`
    AllPlayers,
    /// `@e`
    AllEntities,
    /// `@p`
    NearestPlayer,
    /// `@s`
    Executor,
}

impl SelectorKind {
    fn from_char(c: char) -> Option<Self> {
        match c {
            'a' => Some(Self::AllPlayers),
            'e' => Some(Self::AllEntities),
            'p' => Some(Self::NearestPlayer),
            's' => Some(Self::Executor),
            _ => None,
        }
    }
}

/// A parsed entity reference, resolved against a source at execution time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntitySelector {
    /// A player by name.
    Name(String),
    /// An `@` selector with its options.
    Selector {
        /// Which entities the selector starts from.
        kind: SelectorKind,
        /// `limit=`
        limit: Option<usize>,
        /// `type=`, normalised to a namespaced key.
        entity_type: Option<String>,
        /// `name=`
        name: Option<String>,
    },
}

fn namespaced(key: &str) -> String {
    if key.contains(':') {
        key.to_string()
    } else {
        format!("minecraft:{key}")
    }
}

impl EntitySelector {
    /// Upper bound on how many entities this selector can produce.
    pub fn max_results(&self) -> usize {
        match self {
            Self::Name(_) => 1,
            Self::Selector { kind, limit, .. } => match kind {
                SelectorKind::Executor | SelectorKind::NearestPlayer => limit.unwrap_or(1).min(1),
                SelectorKind::AllPlayers | SelectorKind::AllEntities => limit.unwrap_or(usize::MAX),
            },
        }
    }

    /// Whether the selector may match entities that are not players.
    pub fn includes_entities(&self) -> bool {
        match self {
            Self::Selector {
                kind: SelectorKind::AllEntities,
                entity_type,
                ..
            } => entity_type.as_deref() != Some(EntitySnapshot::PLAYER_KIND),
            Self::Selector {
                kind: SelectorKind::Executor,
                entity_type,
                ..
            } => entity_type.as_deref() != Some(EntitySnapshot::PLAYER_KIND),
            _ => false,
        }
    }

    fn accepts(&self, entity: &EntitySnapshot) -> bool {
        match self {
            Self::Name(name) => entity.is_player && entity.name == *name,
            Self::Selector {
                entity_type, name, ..
            } => {
                entity_type.as_deref().map_or(true, |t| entity.kind == t)
                    && name.as_deref().map_or(true, |n| entity.name == n)
            }
        }
    }

    /// Entities this selector picks for `source`, in selection order.
    pub fn select(&self, source: &CommandSource) -> Vec<EntitySnapshot> {
        let mut found: Vec<EntitySnapshot> = match self {
            Self::Name(_) => source
                .host()
                .entities()
                .into_iter()
                .filter(|e| self.accepts(e))
                .collect(),
            Self::Selector { kind, .. } => match kind {
                SelectorKind::Executor => source
                    .entity()
                    .filter(|e| self.accepts(e))
                    .cloned()
                    .into_iter()
                    .collect(),
                SelectorKind::AllPlayers | SelectorKind::NearestPlayer => source
                    .host()
                    .entities()
                    .into_iter()
                    .filter(|e| e.is_player && self.accepts(e))
                    .collect(),
                SelectorKind::AllEntities => source
                    .host()
                    .entities()
                    .into_iter()
                    .filter(|e| self.accepts(e))
                    .collect(),
            },
        };
        if let Self::Selector {
            kind: SelectorKind::NearestPlayer,
            ..
        } = self
        {
            let origin = source.position();
            found.sort_by(|a, b| {
                a.position
                    .distance_squared(origin)
                    .partial_cmp(&b.position.distance_squared(origin))
                    .unwrap_or(Ordering::Equal)
            });
        }
        found.truncate(self.max_results());
        found
    }
}

/// Entity or player reference: a name or an `@` selector (level 2 required).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntityArgument {
    single: bool,
    players_only: bool,
}

/// Exactly one entity.
pub fn entity() -> EntityArgument {
    EntityArgument {
        single: true,
        players_only: false,
    }
}

/// Any number of entities.
pub fn entities() -> EntityArgument {
    EntityArgument {
        single: false,
        players_only: false,
    }
}

/// Exactly one player.
pub fn player() -> EntityArgument {
    EntityArgument {
        single: true,
        players_only: true,
    }
}

/// Any number of players.
pub fn players() -> EntityArgument {
    EntityArgument {
        single: false,
        players_only: true,
    }
}

const SELECTORS: [&str; 4] = ["@a", "@e", "@p", "@s"];

impl EntityArgument {
    fn read_selector(
        &self,
        reader: &mut StringReader,
        allow_selectors: bool,
    ) -> Result<EntitySelector, CommandSyntaxError> {
        let start = reader.cursor();
        if reader.peek() != Some('@') {
            let name = reader.read_unquoted_string().to_string();
            if name.is_empty() || name.len() > 16 {
                return Err(fail_at(reader, start, "Invalid name or UUID"));
            }
            return Ok(EntitySelector::Name(name));
        }
        if !allow_selectors {
            return Err(fail_at(reader, start, "Selector not allowed"));
        }
        reader.skip();
        let Some(c) = reader.read() else {
            return Err(fail_at(reader, start, "Missing selector type"));
        };
        let Some(kind) = SelectorKind::from_char(c) else {
            return Err(fail_at(reader, start, format!("Unknown selector type '@{c}'")));
        };

        let mut limit = None;
        let mut entity_type = None;
        let mut name = None;
        if reader.peek() == Some('[') {
            reader.skip();
            reader.skip_whitespace();
            while reader.can_read() && reader.peek() != Some(']') {
                let option_start = reader.cursor();
                let key = reader.read_unquoted_string().to_string();
                reader.skip_whitespace();
                reader.expect('=')?;
                reader.skip_whitespace();
                match key.as_str() {
                    "limit" => {
                        let value_start = reader.cursor();
                        let value = reader.read_int()?;
                        if value < 1 {
                            return Err(fail_at(reader, value_start, "Limit must be at least 1"));
                        }
                        limit = Some(value as usize);
                    }
                    "type" => {
                        let key = read_resource(reader);
                        entity_type = Some(namespaced(&key));
                    }
                    "name" => name = Some(reader.read_string()?),
                    _ => {
                        return Err(fail_at(reader, option_start, format!("Unknown option '{key}'")))
                    }
                }
                reader.skip_whitespace();
                if reader.peek() == Some(',') {
                    reader.skip();
                    reader.skip_whitespace();
                } else if reader.peek() != Some(']') {
                    return Err(syntax_error("Expected end of options", reader));
                }
            }
            reader.expect(']')?;
        }
        if kind == SelectorKind::AllPlayers {
            entity_type = Some(EntitySnapshot::PLAYER_KIND.to_string());
        }
        Ok(EntitySelector::Selector {
            kind,
            limit,
            entity_type,
            name,
        })
    }

    fn check(
        &self,
        reader: &mut StringReader,
        start: usize,
        selector: &EntitySelector,
    ) -> Result<(), CommandSyntaxError> {
        if self.single && selector.max_results() > 1 {
            let message = if self.players_only {
                "Only one player is allowed, but the provided selector allows more than one"
            } else {
                "Only one entity is allowed, but the provided selector allows more than one"
            };
            return Err(fail_at(reader, start, message));
        }
        if self.players_only && selector.includes_entities() {
            return Err(fail_at(
                reader,
                start,
                "Only players may be affected by this command, but the provided selector includes entities",
            ));
        }
        Ok(())
    }
}

impl ArgumentType<CommandSource> for EntityArgument {
    fn type_key(&self) -> &'static str {
        ENTITY_KEY
    }

    fn parse(&self, reader: &mut StringReader) -> Result<ArgumentValue, CommandSyntaxError> {
        let start = reader.cursor();
        let selector = self.read_selector(reader, true)?;
        self.check(reader, start, &selector)?;
        Ok(ArgumentValue::new(selector))
    }

    fn parse_with_source(
        &self,
        reader: &mut StringReader,
        source: &CommandSource,
    ) -> Result<ArgumentValue, CommandSyntaxError> {
        let start = reader.cursor();
        let selector = self.read_selector(reader, source.can_use_selectors())?;
        self.check(reader, start, &selector)?;
        Ok(ArgumentValue::new(selector))
    }

    fn list_suggestions(
        &self,
        context: &CommandContext<CommandSource>,
        builder: &mut SuggestionsBuilder,
    ) {
        let source = context.source();
        if source.can_use_selectors() {
            builder.suggest_matching(SELECTORS);
        }
        builder.suggest_matching(source.online_player_names());
    }

    fn examples(&self) -> Vec<String> {
        ["Player", "0123", "@e", "@e[type=foo]"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }
}

fn selector_of<'a>(
    context: &'a CommandContext<CommandSource>,
    name: &str,
) -> Result<&'a EntitySelector, CommandError> {
    context.argument::<EntitySelector>(name)
}

/// Entities named by argument `name`; at least one.
pub fn get_entities(
    context: &CommandContext<CommandSource>,
    name: &str,
) -> Result<Vec<EntitySnapshot>, CommandError> {
    let found = get_optional_entities(context, name)?;
    if found.is_empty() {
        return Err(CommandError::failure("No entity was found"));
    }
    Ok(found)
}

/// Entities named by argument `name`; possibly none.
pub fn get_optional_entities(
    context: &CommandContext<CommandSource>,
    name: &str,
) -> Result<Vec<EntitySnapshot>, CommandError> {
    Ok(selector_of(context, name)?.select(context.source()))
}

/// The single entity named by argument `name`.
pub fn get_entity(
    context: &CommandContext<CommandSource>,
    name: &str,
) -> Result<EntitySnapshot, CommandError> {
    let mut found = get_entities(context, name)?;
    if found.len() > 1 {
        return Err(CommandError::failure(
            "Only one entity is allowed, but the provided selector allows more than one",
        ));
    }
    Ok(found.remove(0))
}

/// Players named by argument `name`; at least one.
pub fn get_players(
    context: &CommandContext<CommandSource>,
    name: &str,
) -> Result<Vec<EntitySnapshot>, CommandError> {
    let found: Vec<_> = get_optional_entities(context, name)?
        .into_iter()
        .filter(|e| e.is_player)
        .collect();
    if found.is_empty() {
        return Err(CommandError::failure("No player was found"));
    }
    Ok(found)
}

// ---------------------------------------------------------------------------
// Coordinates
// ---------------------------------------------------------------------------

/// One axis: absolute, or relative (`~`) to the source.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WorldCoordinate {
    /// Whether `value` is an offset from the source.
    pub relative: bool,
    /// Absolute value or offset.
    pub value: f64,
}

impl WorldCoordinate {
    /// Resolve against `origin`.
    pub fn resolve(self, origin: f64) -> f64 {
        if self.relative {
            origin + self.value
        } else {
            self.value
        }
    }

    fn parse(reader: &mut StringReader, center_correct: bool) -> Result<Self, CommandSyntaxError> {
        if reader.peek() == Some('^') {
            return Err(syntax_error(MIXED_COORDINATES, reader));
        }
        if !reader.can_read() {
            return Err(syntax_error("Expected a coordinate", reader));
        }
        let relative = reader.peek() == Some('~');
        if relative {
            reader.skip();
        }
        let number_start = reader.cursor();
        let value = if reader.can_read() && reader.peek() != Some(' ') {
            reader.read_double()?
        } else {
            0.0
        };
        let text = &reader.string()[number_start..reader.cursor()];
        let value = if !relative && center_correct && !text.contains('.') {
            value + 0.5
        } else {
            value
        };
        Ok(Self { relative, value })
    }
}

const MIXED_COORDINATES: &str =
    "Cannot mix world & local coordinates (everything must either use ^ or not)";

fn read_local(reader: &mut StringReader) -> Result<f64, CommandSyntaxError> {
    if reader.peek() != Some('^') {
        return Err(syntax_error(MIXED_COORDINATES, reader));
    }
    reader.skip();
    if reader.can_read() && reader.peek() != Some(' ') {
        reader.read_double()
    } else {
        Ok(0.0)
    }
}

fn expect_separator(reader: &mut StringReader, start: usize) -> Result<(), CommandSyntaxError> {
    if reader.peek() != Some(' ') {
        return Err(fail_at(reader, start, "Incomplete (expected 3 coordinates)"));
    }
    reader.skip();
    Ok(())
}

/// A position: three world coordinates, or three `^` local offsets measured
/// along the source's look direction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Coordinates {
    /// `x y z`, each possibly `~` relative.
    World([WorldCoordinate; 3]),
    /// `^left ^up ^forwards`.
    Local {
        /// Offset to the left of the look direction.
        left: f64,
        /// Offset above the look direction.
        up: f64,
        /// Offset along the look direction.
        forwards: f64,
    },
}

impl Coordinates {
    /// Resolve against the source's locus, rotation and anchor.
    pub fn position(&self, source: &CommandSource) -> DVec3 {
        match *self {
            Self::World([x, y, z]) => {
                let origin = source.position();
                DVec3::new(x.resolve(origin.x), y.resolve(origin.y), z.resolve(origin.z))
            }
            Self::Local { left, up, forwards } => {
                let rotation = source.rotation();
                let origin = source.anchor_position();
                let yaw = (rotation.yaw as f64 + 90.0).to_radians();
                let pitch = (-rotation.pitch as f64).to_radians();
                let pitch_up = (-rotation.pitch as f64 + 90.0).to_radians();
                let forward = DVec3::new(yaw.cos() * pitch.cos(), pitch.sin(), yaw.sin() * pitch.cos());
                let upward = DVec3::new(
                    yaw.cos() * pitch_up.cos(),
                    pitch_up.sin(),
                    yaw.sin() * pitch_up.cos(),
                );
                let leftward = -forward.cross(upward);
                origin + forward * forwards + upward * up + leftward * left
            }
        }
    }

    fn parse(reader: &mut StringReader, center_correct: bool) -> Result<Self, CommandSyntaxError> {
        let start = reader.cursor();
        if reader.peek() == Some('^') {
            let left = read_local(reader)?;
            expect_separator(reader, start)?;
            let up = read_local(reader)?;
            expect_separator(reader, start)?;
            let forwards = read_local(reader)?;
            return Ok(Self::Local { left, up, forwards });
        }
        let x = WorldCoordinate::parse(reader, center_correct)?;
        expect_separator(reader, start)?;
        let y = WorldCoordinate::parse(reader, false)?;
        expect_separator(reader, start)?;
        let z = WorldCoordinate::parse(reader, center_correct)?;
        Ok(Self::World([x, y, z]))
    }
}

/// Three coordinates. Integer x/z are centred on the block unless disabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Vec3Argument {
    center_correct: bool,
}

/// Block-centred position argument.
pub fn vec3() -> Vec3Argument {
    Vec3Argument {
        center_correct: true,
    }
}

/// Position argument read exactly as typed.
pub fn vec3_exact() -> Vec3Argument {
    Vec3Argument {
        center_correct: false,
    }
}

impl ArgumentType<CommandSource> for Vec3Argument {
    fn type_key(&self) -> &'static str {
        VEC3_KEY
    }

    fn parse(&self, reader: &mut StringReader) -> Result<ArgumentValue, CommandSyntaxError> {
        Ok(ArgumentValue::new(Coordinates::parse(reader, self.center_correct)?))
    }

    fn list_suggestions(
        &self,
        _context: &CommandContext<CommandSource>,
        builder: &mut SuggestionsBuilder,
    ) {
        if builder.remaining().starts_with('^') {
            builder.suggest_matching(["^", "^ ^", "^ ^ ^"]);
        } else {
            builder.suggest_matching(["~", "~ ~", "~ ~ ~"]);
        }
    }

    fn examples(&self) -> Vec<String> {
        ["0 0 0", "~ ~ ~", "^ ^ ^", "^1 ^ ^-5", "0.1 -0.5 .9", "~0.5 ~1 ~-5"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }
}

/// Resolved position bound to argument `name`.
pub fn get_vec3(context: &CommandContext<CommandSource>, name: &str) -> Result<DVec3, CommandError> {
    Ok(context.argument::<Coordinates>(name)?.position(context.source()))
}

/// `yaw pitch`, each possibly `~` relative to the source.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RotationCoordinates {
    /// Horizontal component.
    pub yaw: WorldCoordinate,
    /// Vertical component.
    pub pitch: WorldCoordinate,
}

impl RotationCoordinates {
    /// Resolve against the source rotation.
    pub fn rotation(&self, source: &CommandSource) -> Rotation {
        let current = source.rotation();
        Rotation::new(
            self.pitch.resolve(current.pitch as f64) as f32,
            self.yaw.resolve(current.yaw as f64) as f32,
        )
    }
}

/// Rotation argument.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RotationArgument;

/// Rotation argument.
pub fn rotation() -> RotationArgument {
    RotationArgument
}

impl ArgumentType<CommandSource> for RotationArgument {
    fn type_key(&self) -> &'static str {
        ROTATION_KEY
    }

    fn parse(&self, reader: &mut StringReader) -> Result<ArgumentValue, CommandSyntaxError> {
        let start = reader.cursor();
        if !reader.can_read() {
            return Err(syntax_error("Incomplete (expected 2 coordinates)", reader));
        }
        let yaw = WorldCoordinate::parse(reader, false)?;
        if reader.peek() != Some(' ') {
            return Err(fail_at(reader, start, "Incomplete (expected 2 coordinates)"));
        }
        reader.skip();
        let pitch = WorldCoordinate::parse(reader, false)?;
        Ok(ArgumentValue::new(RotationCoordinates { yaw, pitch }))
    }

    fn list_suggestions(
        &self,
        _context: &CommandContext<CommandSource>,
        builder: &mut SuggestionsBuilder,
    ) {
        builder.suggest_matching(["~", "~ ~"]);
    }

    fn examples(&self) -> Vec<String> {
        ["0 0", "~ ~", "~-5 ~5"].iter().map(|s| s.to_string()).collect()
    }
}

/// Resolved rotation bound to argument `name`.
pub fn get_rotation(
    context: &CommandContext<CommandSource>,
    name: &str,
) -> Result<Rotation, CommandError> {
    Ok(context
        .argument::<RotationCoordinates>(name)?
        .rotation(context.source()))
}

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

fn is_allowed_in_resource(c: char) -> bool {
    c.is_ascii_digit() || c.is_ascii_lowercase() || matches!(c, '_' | ':' | '/' | '.' | '-')
}

fn read_resource(reader: &mut StringReader) -> String {
    let start = reader.cursor();
    while reader.peek().is_some_and(is_allowed_in_resource) {
        reader.skip();
    }
    reader.string()[start..reader.cursor()].to_string()
}

/// Namespaced id (`minecraft:zombie`, `demo:setup`); a bare path gets the
/// `minecraft:` namespace.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResourceLocationArgument;

/// Resource location argument.
pub fn resource_location() -> ResourceLocationArgument {
    ResourceLocationArgument
}

impl ArgumentType<CommandSource> for ResourceLocationArgument {
    fn type_key(&self) -> &'static str {
        RESOURCE_LOCATION_KEY
    }

    fn parse(&self, reader: &mut StringReader) -> Result<ArgumentValue, CommandSyntaxError> {
        let start = reader.cursor();
        let id = read_resource(reader);
        let valid = !id.is_empty()
            && id.matches(':').count() <= 1
            && !id.starts_with(':')
            && !id.ends_with(':');
        if !valid {
            return Err(fail_at(reader, start, format!("Invalid resource location '{id}'")));
        }
        Ok(ArgumentValue::new(namespaced(&id)))
    }

    fn examples(&self) -> Vec<String> {
        ["foo", "foo:bar", "012"].iter().map(|s| s.to_string()).collect()
    }
}

/// Namespaced id bound to argument `name`.
pub fn get_resource_location(
    context: &CommandContext<CommandSource>,
    name: &str,
) -> Result<String, CommandError> {
    context.argument::<String>(name).cloned()
}

/// Dimension key such as `minecraft:the_nether` or `the_end`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DimensionArgument;

/// Dimension argument.
pub fn dimension() -> DimensionArgument {
    DimensionArgument
}

impl ArgumentType<CommandSource> for DimensionArgument {
    fn type_key(&self) -> &'static str {
        DIMENSION_KEY
    }

    fn parse(&self, reader: &mut StringReader) -> Result<ArgumentValue, CommandSyntaxError> {
        let start = reader.cursor();
        let key = read_resource(reader);
        match key.parse::<DimensionId>() {
            Ok(dimension) => Ok(ArgumentValue::new(dimension)),
            Err(_) => Err(fail_at(reader, start, format!("Unknown dimension '{key}'"))),
        }
    }

    fn list_suggestions(
        &self,
        _context: &CommandContext<CommandSource>,
        builder: &mut SuggestionsBuilder,
    ) {
        builder.suggest_resources(DimensionId::ALL.iter().map(|d| d.key()));
    }

    fn examples(&self) -> Vec<String> {
        ["world", "minecraft:the_nether"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }
}

/// Dimension bound to argument `name`.
pub fn get_dimension(
    context: &CommandContext<CommandSource>,
    name: &str,
) -> Result<DimensionId, CommandError> {
    context.argument::<DimensionId>(name).copied()
}

/// `feet` or `eyes`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AnchorArgument;

/// Entity anchor argument.
pub fn anchor() -> AnchorArgument {
    AnchorArgument
}

impl ArgumentType<CommandSource> for AnchorArgument {
    fn type_key(&self) -> &'static str {
        ANCHOR_KEY
    }

    fn parse(&self, reader: &mut StringReader) -> Result<ArgumentValue, CommandSyntaxError> {
        let start = reader.cursor();
        let name = reader.read_unquoted_string().to_string();
        match EntityAnchor::from_name(&name) {
            Some(anchor) => Ok(ArgumentValue::new(anchor)),
            None => Err(fail_at(reader, start, format!("Invalid entity anchor position {name}"))),
        }
    }

    fn list_suggestions(
        &self,
        _context: &CommandContext<CommandSource>,
        builder: &mut SuggestionsBuilder,
    ) {
        builder.suggest_matching(["feet", "eyes"]);
    }

    fn examples(&self) -> Vec<String> {
        vec!["eyes".to_string(), "feet".to_string()]
    }
}

/// Anchor bound to argument `name`.
pub fn get_anchor(
    context: &CommandContext<CommandSource>,
    name: &str,
) -> Result<EntityAnchor, CommandError> {
    context.argument::<EntityAnchor>(name).copied()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::NullHost;
    use crate::output::NullOutput;
    use std::sync::Arc;

    fn source(level: i32) -> CommandSource {
        CommandSource::new("Alex", Arc::new(NullHost), Arc::new(NullOutput)).with_permission(level)
    }

    fn read<T: ArgumentType<CommandSource>>(
        ty: &T,
        input: &str,
        level: i32,
    ) -> Result<ArgumentValue, CommandSyntaxError> {
        ty.parse_with_source(&mut StringReader::new(input), &source(level))
    }

    #[test]
    fn selectors_need_level_two() {
        let err = read(&entities(), "@e", 1).unwrap_err();
        assert_eq!(err.raw_message(), "Selector not allowed");
        assert_eq!(err.cursor(), Some(0));

        let value = read(&entities(), "@e[type=zombie,limit=2]", 2).unwrap();
        assert_eq!(
            value.downcast_ref::<EntitySelector>(),
            Some(&EntitySelector::Selector {
                kind: SelectorKind::AllEntities,
                limit: Some(2),
                entity_type: Some("minecraft:zombie".into()),
                name: None,
            })
        );
        let name = read(&entities(), "Steve", 0).unwrap();
        assert_eq!(
            name.downcast_ref::<EntitySelector>(),
            Some(&EntitySelector::Name("Steve".into()))
        );
    }

    #[test]
    fn single_and_player_restrictions_are_checked_at_parse_time() {
        let err = read(&entity(), "@e", 4).unwrap_err();
        assert!(err.raw_message().starts_with("Only one entity is allowed"));
        assert!(read(&entity(), "@e[limit=1]", 4).is_ok());
        assert!(read(&entity(), "@p", 4).is_ok());

        let err = read(&players(), "@e", 4).unwrap_err();
        assert!(err.raw_message().starts_with("Only players may be affected"));
        assert!(read(&players(), "@e[type=player]", 4).is_ok());
        assert!(read(&players(), "@a", 4).is_ok());

        let err = read(&entities(), "@x", 4).unwrap_err();
        assert_eq!(err.raw_message(), "Unknown selector type '@x'");
        let err = read(&entities(), "@e[color=red]", 4).unwrap_err();
        assert_eq!(err.raw_message(), "Unknown option 'color'");
    }

    #[test]
    fn world_coordinates_handle_relative_and_centering() {
        let mut reader = StringReader::new("1 ~2 ~");
        let coords = Coordinates::parse(&mut reader, true).unwrap();
        let here = source(0).with_position(DVec3::new(10.0, 20.0, 30.0));
        assert_eq!(coords.position(&here), DVec3::new(1.5, 22.0, 30.0));

        let mut reader = StringReader::new("1.0 2 3");
        let coords = Coordinates::parse(&mut reader, true).unwrap();
        assert_eq!(coords.position(&here), DVec3::new(1.0, 2.0, 3.5));

        let mut reader = StringReader::new("1 2");
        let err = Coordinates::parse(&mut reader, true).unwrap_err();
        assert_eq!(err.raw_message(), "Incomplete (expected 3 coordinates)");
        assert_eq!(err.cursor(), Some(0));

        let mut reader = StringReader::new("^ ~ ^");
        let err = Coordinates::parse(&mut reader, true).unwrap_err();
        assert_eq!(err.raw_message(), MIXED_COORDINATES);
    }

    #[test]
    fn local_coordinates_follow_the_look_direction() {
        let mut reader = StringReader::new("^ ^ ^2");
        let coords = Coordinates::parse(&mut reader, true).unwrap();
        let facing_south = source(0);
        let pos = coords.position(&facing_south);
        assert!((pos - DVec3::new(0.0, 0.0, 2.0)).length() < 1e-9);

        let facing_east = facing_south.with_rotation(Rotation::new(0.0, -90.0));
        let pos = coords.position(&facing_east);
        assert!((pos - DVec3::new(2.0, 0.0, 0.0)).length() < 1e-9);

        let mut reader = StringReader::new("^1 ^ ^");
        let left = Coordinates::parse(&mut reader, true).unwrap().position(&facing_south);
        assert!((left - DVec3::new(1.0, 0.0, 0.0)).length() < 1e-9);
    }

    #[test]
    fn rotations_resolve_relative_to_the_source() {
        let value = RotationArgument.parse(&mut StringReader::new("~10 -20")).unwrap();
        let coords = value.downcast_ref::<RotationCoordinates>().unwrap();
        let turned = source(0).with_rotation(Rotation::new(5.0, 30.0));
        assert_eq!(coords.rotation(&turned), Rotation::new(-20.0, 40.0));
    }

    #[test]
    fn identifiers_reject_unknown_names() {
        let value = DimensionArgument.parse(&mut StringReader::new("the_nether")).unwrap();
        assert_eq!(value.downcast_ref::<DimensionId>(), Some(&DimensionId::Nether));
        let err = DimensionArgument
            .parse(&mut StringReader::new("minecraft:moon"))
            .unwrap_err();
        assert_eq!(err.raw_message(), "Unknown dimension 'minecraft:moon'");

        let value = ResourceLocationArgument
            .parse(&mut StringReader::new("zombie"))
            .unwrap();
        assert_eq!(value.downcast_ref::<String>().map(String::as_str), Some("minecraft:zombie"));
        assert!(ResourceLocationArgument.parse(&mut StringReader::new("a:b:c")).is_err());

        let value = AnchorArgument.parse(&mut StringReader::new("eyes")).unwrap();
        assert_eq!(value.downcast_ref::<EntityAnchor>(), Some(&EntityAnchor::Eyes));
        assert!(AnchorArgument.parse(&mut StringReader::new("knees")).is_err());
    }
}
