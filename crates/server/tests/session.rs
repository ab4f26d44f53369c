//! Session suggestion trees: background rebuilds, saturation and hand-off.

use std::sync::Arc;

use glam::DVec3;
use mdcommand_server::{literal, require_level, Commands, Session, SessionTask, SuggestionPool};
use mdcommand_testkit::{buffered_source, TestHost};
use tokio::runtime::Handle;

fn commands() -> Arc<Commands> {
    let commands = Commands::default();
    commands
        .update(|d| -> Result<(), mdcommand_dispatch::GrammarError> {
            d.register(literal("help").executes(|_| Ok(1)))?;
            d.register(literal("halt").requires(require_level(4)).executes(|ctx| {
                ctx.source().send_success("halted", false);
                Ok(1)
            }))?;
            Ok(())
        })
        .unwrap();
    Arc::new(commands)
}

fn host() -> Arc<TestHost> {
    Arc::new(TestHost::new().with_player("Alex", DVec3::ZERO))
}

#[tokio::test]
async fn rebuilt_tree_is_applied_on_the_session_turn() {
    let host = host();
    let (source, _) = buffered_source(&host, "Alex", 0);
    let pool = SuggestionPool::new(2, Handle::current());
    let mut session = Session::new(source, commands(), pool);

    // Nothing applied yet.
    assert!(session.suggest("h").is_empty());
    assert!(session.request_suggestion_rebuild());
    assert!(session.pump_next().await);
    assert_eq!(session.applied_generation(), 1);
    assert_eq!(session.suggest("h").texts(), vec!["help"]);
}

#[tokio::test]
async fn permission_change_needs_a_new_tree() {
    let host = host();
    let (source, _) = buffered_source(&host, "Alex", 0);
    let pool = SuggestionPool::new(1, Handle::current());
    let mut session = Session::new(source.clone(), commands(), pool);

    assert!(session.request_suggestion_rebuild());
    assert!(session.pump_next().await);
    assert_eq!(session.suggest("h").texts(), vec!["help"]);

    session.set_source(source.with_permission(4));
    // The old tree stays until the rebuild lands.
    assert_eq!(session.suggest("h").texts(), vec!["help"]);
    assert!(session.request_suggestion_rebuild());
    assert!(session.pump_next().await);
    assert_eq!(session.applied_generation(), 2);
    assert_eq!(session.suggest("h").texts(), vec!["help", "halt"]);
}

#[tokio::test]
async fn saturated_pool_drops_requests() {
    let host = host();
    let (source, _) = buffered_source(&host, "Alex", 0);
    let pool = SuggestionPool::new(0, Handle::current());
    let mut session = Session::new(source, commands(), pool.clone());

    assert_eq!(pool.available(), 0);
    assert!(!session.request_suggestion_rebuild());
    assert_eq!(session.pump(), 0);
    assert_eq!(session.applied_generation(), 0);
}

#[tokio::test]
async fn queued_commands_run_when_pumped() {
    let host = host();
    let (source, output) = buffered_source(&host, "Alex", 4);
    let pool = SuggestionPool::new(1, Handle::current());
    let mut session = Session::new(source, commands(), pool);

    let sender = session.sender();
    sender.send(SessionTask::Perform("halt".into())).ok();
    sender.send(SessionTask::Perform("/halt".into())).ok();
    assert!(output.lines().is_empty());
    assert_eq!(session.pump(), 2);
    assert_eq!(output.take_lines(), vec!["halted", "halted"]);
    assert!(session.perform("help"));
}
