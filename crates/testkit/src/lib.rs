#![warn(missing_docs)]
//! Test doubles and transcript plumbing for command tests.

mod transcript;

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

use glam::DVec3;
use mdcommand_dispatch::ResultCallback;
use mdcommand_server::{BufferedOutput, CommandHost, CommandSource, EntitySnapshot};

pub use transcript::*;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// In-memory world: a list of entities plus explicit permission grants and
/// visibility rules.
#[derive(Debug, Default)]
pub struct TestHost {
    entities: Mutex<Vec<EntitySnapshot>>,
    next_id: Mutex<u64>,
    grants: Mutex<HashSet<(String, String)>>,
    hidden: Mutex<HashSet<(String, String)>>,
    admin_messages: Mutex<Vec<String>>,
}

impl TestHost {
    /// Empty world.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a player and return the host, for chained setup.
    pub fn with_player(self, name: &str, position: DVec3) -> Self {
        self.spawn_player(name, position);
        self
    }

    /// Add a mob and return the host, for chained setup.
    pub fn with_mob(self, kind: &str, position: DVec3) -> Self {
        self.spawn(|id| EntitySnapshot::mob(id, kind, position));
        self
    }

    /// Add a player; returns its id.
    pub fn spawn_player(&self, name: &str, position: DVec3) -> u64 {
        self.spawn(|id| EntitySnapshot::player(id, name, position))
    }

    /// Add an entity built from a fresh id; returns the id.
    pub fn spawn(&self, make: impl FnOnce(u64) -> EntitySnapshot) -> u64 {
        let id = {
            let mut next = lock(&self.next_id);
            *next += 1;
            *next
        };
        lock(&self.entities).push(make(id));
        id
    }

    /// Apply `f` to the entity with `id`.
    pub fn update_entity(&self, id: u64, f: impl FnOnce(&mut EntitySnapshot)) -> bool {
        match lock(&self.entities).iter_mut().find(|e| e.id == id) {
            Some(entity) => {
                f(entity);
                true
            }
            None => false,
        }
    }

    /// Player by name.
    pub fn player(&self, name: &str) -> Option<EntitySnapshot> {
        lock(&self.entities)
            .iter()
            .find(|e| e.is_player && e.name == name)
            .cloned()
    }

    /// Grant `permission` to `principal` in the external store.
    pub fn grant(&self, principal: &str, permission: &str) {
        lock(&self.grants).insert((principal.to_string(), permission.to_string()));
    }

    /// Hide `target` from `viewer` in lists and completions.
    pub fn hide(&self, viewer: &str, target: &str) {
        lock(&self.hidden).insert((viewer.to_string(), target.to_string()));
    }

    /// Messages relayed to operators so far.
    pub fn admin_messages(&self) -> Vec<String> {
        lock(&self.admin_messages).clone()
    }
}

impl CommandHost for TestHost {
    fn has_permission(&self, principal: &str, permission: &str) -> bool {
        lock(&self.grants).contains(&(principal.to_string(), permission.to_string()))
    }

    fn entities(&self) -> Vec<EntitySnapshot> {
        lock(&self.entities).clone()
    }

    fn can_see(&self, viewer: &str, target: &str) -> bool {
        !lock(&self.hidden).contains(&(viewer.to_string(), target.to_string()))
    }

    fn broadcast_to_admins(&self, _from: &str, message: &str) {
        lock(&self.admin_messages).push(message.to_string());
    }
}

/// Source named `name` at `level`, writing to a fresh buffer.
pub fn buffered_source(
    host: &Arc<TestHost>,
    name: &str,
    level: i32,
) -> (CommandSource, Arc<BufferedOutput>) {
    let output = Arc::new(BufferedOutput::new());
    let source = CommandSource::new(name, host.clone(), output.clone()).with_permission(level);
    (source, output)
}

/// Source acting as the player `name`, writing to a fresh buffer.
pub fn player_source(
    host: &Arc<TestHost>,
    name: &str,
    level: i32,
) -> Option<(CommandSource, Arc<BufferedOutput>)> {
    let entity = host.player(name)?;
    let output = Arc::new(BufferedOutput::new());
    let source =
        CommandSource::for_entity(entity, host.clone(), output.clone()).with_permission(level);
    Some((source, output))
}

/// Collects `(success, value)` pairs reported through a [`ResultCallback`].
#[derive(Debug, Clone, Default)]
pub struct RecordingCallback {
    results: Arc<Mutex<Vec<(bool, i32)>>>,
}

impl RecordingCallback {
    /// Empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Callback that appends to this recorder.
    pub fn callback(&self) -> ResultCallback {
        let results = Arc::clone(&self.results);
        ResultCallback::new(move |success, value| lock(&results).push((success, value)))
    }

    /// Every result so far, in report order.
    pub fn results(&self) -> Vec<(bool, i32)> {
        lock(&self.results).clone()
    }

    /// Number of successful results.
    pub fn successes(&self) -> usize {
        lock(&self.results).iter().filter(|(ok, _)| *ok).count()
    }

    /// Number of failed results.
    pub fn failures(&self) -> usize {
        lock(&self.results).iter().filter(|(ok, _)| !*ok).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_tracks_grants_and_visibility() {
        let host = TestHost::new()
            .with_player("Alex", DVec3::ZERO)
            .with_player("Steve", DVec3::X)
            .with_mob("minecraft:zombie", DVec3::Y);
        host.grant("Alex", "commands.level.3");
        host.hide("Alex", "Steve");

        assert!(host.has_permission("Alex", "commands.level.3"));
        assert!(!host.has_permission("Steve", "commands.level.3"));
        assert!(!host.can_see("Alex", "Steve"));
        assert_eq!(host.player_names(), vec!["Alex", "Steve"]);
        assert_eq!(host.entities().len(), 3);
    }

    #[test]
    fn recording_callback_counts_outcomes() {
        let recorder = RecordingCallback::new();
        let callback = recorder.callback();
        callback.on_success(4);
        callback.on_failure();
        assert_eq!(recorder.results(), vec![(true, 4), (false, 0)]);
        assert_eq!((recorder.successes(), recorder.failures()), (1, 1));
    }
}
