//! The concrete invocation context commands run as.
//!
//! A [`CommandSource`] is an immutable handle. Every `with_*` call returns a
//! new handle that shares the untouched state, or the very same handle when
//! the requested value is already current, so callers can compare with
//! [`CommandSource::ptr_eq`] to see whether anything changed.

use std::fmt;
use std::sync::Arc;

use glam::DVec3;
use mdcommand_core::{facing_rotation, DimensionId, Rotation, LEVEL_GAMEMASTERS};
use mdcommand_dispatch::{CommandError, ExecutionSource, ResultCallback};

use crate::host::{CommandHost, EntitySnapshot};
use crate::output::CommandOutput;
use crate::signing::{SigningContext, TaskChainer};

/// Which point of an entity `facing` and `^` offsets measure from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EntityAnchor {
    /// The entity's feet.
    #[default]
    Feet,
    /// The entity's eyes.
    Eyes,
}

impl EntityAnchor {
    /// Argument spelling.
    pub fn name(self) -> &'static str {
        match self {
            Self::Feet => "feet",
            Self::Eyes => "eyes",
        }
    }

    /// Parse the argument spelling.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "feet" => Some(Self::Feet),
            "eyes" => Some(Self::Eyes),
            _ => None,
        }
    }

    /// Anchor point on `entity`.
    pub fn apply_to(self, entity: &EntitySnapshot) -> DVec3 {
        match self {
            Self::Feet => entity.position,
            Self::Eyes => entity.eye_position(),
        }
    }
}

/// How the integer level and the host permission store combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PermissionPolicy {
    /// Either check grants the permission.
    #[default]
    Lenient,
    /// Both checks must grant the permission.
    Strict,
}

/// Permission key consulted in the host store for `level`.
pub fn level_permission_key(level: i32) -> String {
    format!("commands.level.{level}")
}

#[derive(Clone)]
struct SourceState {
    output: Arc<dyn CommandOutput>,
    host: Arc<dyn CommandHost>,
    position: DVec3,
    rotation: Rotation,
    dimension: DimensionId,
    permission_level: i32,
    text_name: String,
    entity: Option<EntitySnapshot>,
    silent: bool,
    callback: ResultCallback,
    anchor: EntityAnchor,
    signing: SigningContext,
    chainer: TaskChainer,
    policy: PermissionPolicy,
}

/// Who runs a command, from where, and with what rights.
#[derive(Clone)]
pub struct CommandSource(Arc<SourceState>);

impl CommandSource {
    /// Source named `name` at the Overworld origin with level 0.
    pub fn new(
        name: impl Into<String>,
        host: Arc<dyn CommandHost>,
        output: Arc<dyn CommandOutput>,
    ) -> Self {
        Self(Arc::new(SourceState {
            output,
            host,
            position: DVec3::ZERO,
            rotation: Rotation::ZERO,
            dimension: DimensionId::DEFAULT,
            permission_level: 0,
            text_name: name.into(),
            entity: None,
            silent: false,
            callback: ResultCallback::EMPTY,
            anchor: EntityAnchor::Feet,
            signing: SigningContext::ANONYMOUS,
            chainer: TaskChainer::Immediate,
            policy: PermissionPolicy::Lenient,
        }))
    }

    /// Source acting as `entity`, positioned where it stands.
    pub fn for_entity(
        entity: EntitySnapshot,
        host: Arc<dyn CommandHost>,
        output: Arc<dyn CommandOutput>,
    ) -> Self {
        let position = entity.position;
        let rotation = entity.rotation;
        let dimension = entity.dimension;
        Self::new(entity.name.clone(), host, output).derive(|state| {
            state.position = position;
            state.rotation = rotation;
            state.dimension = dimension;
            state.entity = Some(entity);
        })
    }

    /// Whether both handles share the same state.
    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        Arc::ptr_eq(&a.0, &b.0)
    }

    fn derive(&self, update: impl FnOnce(&mut SourceState)) -> Self {
        let mut state = (*self.0).clone();
        update(&mut state);
        Self(Arc::new(state))
    }

    /// Text name used for permission lookups and feedback.
    pub fn text_name(&self) -> &str {
        &self.0.text_name
    }

    /// Current locus.
    pub fn position(&self) -> DVec3 {
        self.0.position
    }

    /// Current orientation.
    pub fn rotation(&self) -> Rotation {
        self.0.rotation
    }

    /// Current dimension.
    pub fn dimension(&self) -> DimensionId {
        self.0.dimension
    }

    /// Integer permission level.
    pub fn permission_level(&self) -> i32 {
        self.0.permission_level
    }

    /// Entity this source acts as, if any.
    pub fn entity(&self) -> Option<&EntitySnapshot> {
        self.0.entity.as_ref()
    }

    /// Whether feedback is suppressed.
    pub fn is_silent(&self) -> bool {
        self.0.silent
    }

    /// Anchor used by `facing` and eye-relative offsets.
    pub fn anchor(&self) -> EntityAnchor {
        self.0.anchor
    }

    /// Signed arguments for this invocation.
    pub fn signing_context(&self) -> &SigningContext {
        &self.0.signing
    }

    /// Chainer for dependent side effects.
    pub fn chainer(&self) -> &TaskChainer {
        &self.0.chainer
    }

    /// Host collaborator.
    pub fn host(&self) -> &Arc<dyn CommandHost> {
        &self.0.host
    }

    /// Output collaborator.
    pub fn output(&self) -> &Arc<dyn CommandOutput> {
        &self.0.output
    }

    /// Permission combination policy.
    pub fn policy(&self) -> PermissionPolicy {
        self.0.policy
    }

    /// Act as `entity`, or as nobody.
    pub fn with_entity(&self, entity: Option<EntitySnapshot>) -> Self {
        if self.0.entity == entity {
            return self.clone();
        }
        self.derive(|state| {
            if let Some(e) = &entity {
                state.text_name = e.name.clone();
            }
            state.entity = entity;
        })
    }

    /// Move the locus.
    pub fn with_position(&self, position: DVec3) -> Self {
        if self.0.position == position {
            return self.clone();
        }
        self.derive(|state| state.position = position)
    }

    /// Change orientation.
    pub fn with_rotation(&self, rotation: Rotation) -> Self {
        if self.0.rotation == rotation {
            return self.clone();
        }
        self.derive(|state| state.rotation = rotation)
    }

    /// Report results to `callback` instead.
    pub fn with_callback(&self, callback: ResultCallback) -> Self {
        if self.0.callback == callback {
            return self.clone();
        }
        self.derive(|state| state.callback = callback)
    }

    /// Report results to the current callback and then to `callback`.
    pub fn with_callback_chained(&self, callback: &ResultCallback) -> Self {
        self.with_callback(ResultCallback::chain(&self.0.callback, callback))
    }

    /// Silence feedback. No-op when already silent or the output always accepts.
    pub fn with_suppressed_output(&self) -> Self {
        if self.0.silent || self.0.output.always_accepts() {
            return self.clone();
        }
        self.derive(|state| state.silent = true)
    }

    /// Send feedback to `output`.
    pub fn with_output(&self, output: Arc<dyn CommandOutput>) -> Self {
        if Arc::ptr_eq(&self.0.output, &output) {
            return self.clone();
        }
        self.derive(|state| state.output = output)
    }

    /// Set the permission level.
    pub fn with_permission(&self, level: i32) -> Self {
        if self.0.permission_level == level {
            return self.clone();
        }
        self.derive(|state| state.permission_level = level)
    }

    /// Raise the permission level to at least `level`.
    pub fn with_maximum_permission(&self, level: i32) -> Self {
        if level <= self.0.permission_level {
            return self.clone();
        }
        self.with_permission(level)
    }

    /// Change the entity anchor.
    pub fn with_anchor(&self, anchor: EntityAnchor) -> Self {
        if self.0.anchor == anchor {
            return self.clone();
        }
        self.derive(|state| state.anchor = anchor)
    }

    /// Move into `dimension`, rescaling horizontal coordinates between frames.
    pub fn with_dimension(&self, dimension: DimensionId) -> Self {
        if self.0.dimension == dimension {
            return self.clone();
        }
        let scale = DimensionId::teleportation_scale(self.0.dimension, dimension);
        let position = self.0.position;
        self.derive(|state| {
            state.position = DVec3::new(position.x * scale, position.y, position.z * scale);
            state.dimension = dimension;
        })
    }

    /// Bind signed arguments and the side-effect chainer.
    pub fn with_signing_context(&self, signing: SigningContext, chainer: TaskChainer) -> Self {
        if self.0.signing == signing && self.0.chainer == chainer {
            return self.clone();
        }
        self.derive(|state| {
            state.signing = signing;
            state.chainer = chainer;
        })
    }

    /// Change how level and host permissions combine.
    pub fn with_policy(&self, policy: PermissionPolicy) -> Self {
        if self.0.policy == policy {
            return self.clone();
        }
        self.derive(|state| state.policy = policy)
    }

    /// Point of this source that `facing` measures from.
    pub fn anchor_position(&self) -> DVec3 {
        match (&self.0.entity, self.0.anchor) {
            (Some(entity), EntityAnchor::Eyes) => {
                self.0.position + DVec3::new(0.0, entity.eye_height, 0.0)
            }
            _ => self.0.position,
        }
    }

    /// Rotate to look at `target`.
    pub fn facing(&self, target: DVec3) -> Self {
        self.with_rotation(facing_rotation(self.anchor_position(), target))
    }

    /// Rotate to look at `anchor` on `entity`.
    pub fn facing_entity(&self, entity: &EntitySnapshot, anchor: EntityAnchor) -> Self {
        self.facing(anchor.apply_to(entity))
    }

    /// Level check combined with the host permission store under the policy.
    pub fn has_permission(&self, level: i32) -> bool {
        let by_level = self.0.permission_level >= level;
        let key = level_permission_key(level);
        match self.0.policy {
            PermissionPolicy::Lenient => {
                by_level || self.0.host.has_permission(&self.0.text_name, &key)
            }
            PermissionPolicy::Strict => {
                by_level && self.0.host.has_permission(&self.0.text_name, &key)
            }
        }
    }

    /// Whether `@` selectors may be used.
    pub fn can_use_selectors(&self) -> bool {
        self.has_permission(LEVEL_GAMEMASTERS)
    }

    /// The entity or a "requires an entity" failure.
    pub fn entity_or_error(&self) -> Result<&EntitySnapshot, CommandError> {
        self.entity()
            .ok_or_else(|| CommandError::failure("An entity is required to run this command here"))
    }

    /// The player or a "requires a player" failure.
    pub fn player_or_error(&self) -> Result<&EntitySnapshot, CommandError> {
        match self.entity() {
            Some(entity) if entity.is_player => Ok(entity),
            _ => Err(CommandError::failure(
                "A player is required to run this command here",
            )),
        }
    }

    /// Connected players this source may see.
    pub fn online_player_names(&self) -> Vec<String> {
        let viewer = &self.0.text_name;
        self.0
            .host
            .player_names()
            .into_iter()
            .filter(|name| name == viewer || self.0.host.can_see(viewer, name))
            .collect()
    }

    /// Unconditional feedback, unless silenced.
    pub fn send_system_message(&self, message: &str) {
        if !self.0.silent {
            self.0.output.send_system_message(message);
        }
    }

    /// Success feedback, optionally relayed to operators.
    pub fn send_success(&self, message: &str, broadcast_to_admins: bool) {
        if self.0.silent {
            return;
        }
        if self.0.output.accepts_success() {
            self.0.output.send_system_message(message);
        }
        if broadcast_to_admins && self.0.output.should_inform_admins() {
            self.0
                .host
                .broadcast_to_admins(&self.0.text_name, &format!("[{}: {}]", self.0.text_name, message));
        }
    }
}

impl ExecutionSource for CommandSource {
    fn callback(&self) -> ResultCallback {
        self.0.callback.clone()
    }

    fn with_callback(&self, callback: ResultCallback) -> Self {
        CommandSource::with_callback(self, callback)
    }

    fn send_failure(&self, message: &str) {
        if !self.0.silent && self.0.output.accepts_failure() {
            self.0.output.send_system_message(message);
        }
    }
}

impl fmt::Debug for CommandSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandSource")
            .field("name", &self.0.text_name)
            .field("position", &self.0.position)
            .field("rotation", &self.0.rotation)
            .field("dimension", &self.0.dimension)
            .field("permission_level", &self.0.permission_level)
            .field("entity", &self.0.entity.as_ref().map(|e| e.id))
            .field("silent", &self.0.silent)
            .field("anchor", &self.0.anchor)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::NullHost;
    use crate::output::BufferedOutput;
    use std::collections::HashSet;

    struct Grants(HashSet<(String, String)>);

    impl CommandHost for Grants {
        fn has_permission(&self, principal: &str, permission: &str) -> bool {
            self.0.contains(&(principal.to_string(), permission.to_string()))
        }

        fn entities(&self) -> Vec<EntitySnapshot> {
            Vec::new()
        }
    }

    fn source() -> CommandSource {
        CommandSource::new("Alex", Arc::new(NullHost), Arc::new(BufferedOutput::new()))
    }

    #[test]
    fn unchanged_values_return_the_same_handle() {
        let base = source()
            .with_position(DVec3::new(1.0, 2.0, 3.0))
            .with_permission(2);
        let callback = ResultCallback::new(|_, _| {});
        let with_cb = base.with_callback(callback.clone());

        assert!(CommandSource::ptr_eq(&base, &base.with_position(DVec3::new(1.0, 2.0, 3.0))));
        assert!(CommandSource::ptr_eq(&base, &base.with_rotation(Rotation::ZERO)));
        assert!(CommandSource::ptr_eq(&base, &base.with_permission(2)));
        assert!(CommandSource::ptr_eq(&base, &base.with_maximum_permission(1)));
        assert!(CommandSource::ptr_eq(&base, &base.with_anchor(EntityAnchor::Feet)));
        assert!(CommandSource::ptr_eq(&base, &base.with_dimension(DimensionId::Overworld)));
        assert!(CommandSource::ptr_eq(&base, &base.with_entity(None)));
        assert!(CommandSource::ptr_eq(&base, &base.with_callback(ResultCallback::EMPTY)));
        assert!(CommandSource::ptr_eq(&with_cb, &with_cb.with_callback(callback)));
        assert!(CommandSource::ptr_eq(
            &base,
            &base.with_signing_context(SigningContext::ANONYMOUS, TaskChainer::Immediate)
        ));
        assert!(CommandSource::ptr_eq(&with_cb, &with_cb.with_callback_chained(&ResultCallback::EMPTY)));

        let silent = base.with_suppressed_output();
        assert!(!CommandSource::ptr_eq(&base, &silent));
        assert!(CommandSource::ptr_eq(&silent, &silent.with_suppressed_output()));
        assert!(!CommandSource::ptr_eq(&base, &base.with_permission(4)));
    }

    #[test]
    fn changing_dimension_rescales_horizontal_position() {
        let base = source().with_position(DVec3::new(80.0, 64.0, -16.0));
        let nether = base.with_dimension(DimensionId::Nether);
        assert_eq!(nether.position(), DVec3::new(10.0, 64.0, -2.0));
        assert_eq!(nether.dimension(), DimensionId::Nether);
        let back = nether.with_dimension(DimensionId::Overworld);
        assert_eq!(back.position(), DVec3::new(80.0, 64.0, -16.0));
        let end = base.with_dimension(DimensionId::End);
        assert_eq!(end.position(), base.position());
    }

    #[test]
    fn facing_uses_the_eye_anchor_when_set() {
        let player = EntitySnapshot::player(1, "Alex", DVec3::ZERO);
        let source = CommandSource::for_entity(player, Arc::new(NullHost), Arc::new(BufferedOutput::new()));
        let level = source.facing(DVec3::new(0.0, 0.0, 5.0));
        assert!(level.rotation().pitch.abs() < 1e-4);
        let from_eyes = source
            .with_anchor(EntityAnchor::Eyes)
            .facing(DVec3::new(0.0, 0.0, 5.0));
        assert!(from_eyes.rotation().pitch > 0.0, "looking down from the eyes");
    }

    #[test]
    fn permission_policy_combines_level_and_host_grants() {
        let grants = Grants(HashSet::from([(
            "Alex".to_string(),
            level_permission_key(4),
        )]));
        let host: Arc<dyn CommandHost> = Arc::new(grants);
        let lenient = CommandSource::new("Alex", Arc::clone(&host), Arc::new(BufferedOutput::new()))
            .with_permission(1);
        assert!(lenient.has_permission(1));
        assert!(lenient.has_permission(4), "host grant is enough");
        assert!(!lenient.has_permission(3));

        let strict = lenient.with_policy(PermissionPolicy::Strict);
        assert!(!strict.has_permission(1), "level alone is not enough");
        assert!(!strict.has_permission(4), "grant alone is not enough");
        assert!(strict.with_permission(4).has_permission(4));
    }

    #[test]
    fn silenced_sources_drop_feedback() {
        let output = Arc::new(BufferedOutput::new());
        let source = CommandSource::new("Alex", Arc::new(NullHost), output.clone());
        source.send_success("visible", false);
        source.send_failure("also visible");
        let silent = source.with_suppressed_output();
        silent.send_success("hidden", false);
        silent.send_failure("hidden");
        silent.send_system_message("hidden");
        assert_eq!(output.take_lines(), vec!["visible", "also visible"]);
    }

    #[test]
    fn entity_requirements_report_failures() {
        let source = source();
        assert!(source.entity_or_error().is_err());
        let mob = source.with_entity(Some(EntitySnapshot::mob(7, "minecraft:zombie", DVec3::ZERO)));
        assert_eq!(mob.entity_or_error().map(|e| e.id), Ok(7));
        assert!(mob.player_or_error().is_err());
        assert_eq!(mob.text_name(), "zombie");
    }
}
