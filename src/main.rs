//! mdcommand - command console for the mdminecraft sandbox
//!
//! Runs the built-in command grammar against an in-memory world, either
//! interactively on stdin or from a tick-stamped script.

mod command_script;
mod commands;
mod config;
mod console;

use anyhow::{bail, Context, Result};
use clap::Parser;
use command_script::CommandScript;
use commands::register_builtins;
use config::CommandConfig;
use console::{ConsoleWorld, StdoutOutput};
use mdcommand_core::{SimTick, LEVEL_ALL};
use mdcommand_server::{
    CommandHost, CommandOutput, CommandSource, Commands, PermissionPolicy, Session, SuggestionPool,
};
use std::io::Write;
use std::{path::PathBuf, sync::Arc};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::runtime::Handle;
use tracing::{debug, info, warn};

#[derive(Parser, Debug)]
#[command(author, version, about = "Command console for mdminecraft", long_about = None)]
struct Cli {
    /// Command config: limits, players, grants and functions
    #[arg(long, default_value = config::DEFAULT_COMMANDS_PATH)]
    config: PathBuf,

    /// Replay a JSON command script instead of reading stdin
    #[arg(long)]
    script: Option<PathBuf>,

    /// Check the command grammar and exit
    #[arg(long)]
    validate: bool,

    /// Run stdin commands as this player instead of the console
    #[arg(long = "as", value_name = "PLAYER")]
    executor: Option<String>,

    /// Permission level of the interactive source (overrides the config)
    #[arg(long)]
    permission: Option<i32>,
}

fn main() -> Result<()> {
    // Initialize tracing with WARN level by default (can be overridden via RUST_LOG env var)
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    info!("Starting mdcommand v{}", env!("CARGO_PKG_VERSION"));

    let cli = Cli::parse();
    let cfg = CommandConfig::load_from_path(&cli.config);
    let world = Arc::new(ConsoleWorld::new(
        cfg.players.iter().map(String::as_str),
        &cfg.grants,
    ));
    let commands = Arc::new(Commands::new(cfg.limits()));
    register_builtins(&commands, &world, &cfg.functions)
        .context("registering built-in commands")?;

    let report = commands.validate();
    if cli.validate {
        for line in report.lines() {
            println!("{line}");
        }
        if report.has_errors() {
            bail!("command grammar failed validation");
        }
        println!("command grammar ok");
        return Ok(());
    }

    let policy = if cfg.strict_permissions {
        PermissionPolicy::Strict
    } else {
        PermissionPolicy::Lenient
    };
    let console = Console {
        world,
        policy,
        console_level: cli.permission.unwrap_or(cfg.console_permission_level),
    };

    match &cli.script {
        Some(path) => run_script(path, &commands, &console),
        None => {
            let source = match &cli.executor {
                Some(name) => {
                    let source = console.player(name)?;
                    match cli.permission {
                        Some(level) => source.with_permission(level),
                        None => source,
                    }
                }
                None => console.server(),
            };
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .worker_threads(cfg.suggestion_workers.max(1))
                .enable_all()
                .build()?;
            runtime.block_on(run_interactive(
                commands,
                source,
                console.world,
                cfg.suggestion_workers,
            ))
        }
    }
}

/// Builds sources bound to the console world.
struct Console {
    world: Arc<ConsoleWorld>,
    policy: PermissionPolicy,
    console_level: i32,
}

impl Console {
    fn host(&self) -> Arc<dyn CommandHost> {
        self.world.clone()
    }

    fn output() -> Arc<dyn CommandOutput> {
        Arc::new(StdoutOutput)
    }

    fn server(&self) -> CommandSource {
        CommandSource::new("Server", self.host(), Self::output())
            .with_permission(self.console_level)
            .with_policy(self.policy)
    }

    /// Source for the online player `name` as it stands right now.
    fn player(&self, name: &str) -> Result<CommandSource> {
        let Some(entity) = self
            .world
            .entities()
            .into_iter()
            .find(|e| e.is_player && e.name == name)
        else {
            bail!("no player named '{name}' is online");
        };
        Ok(CommandSource::for_entity(entity, self.host(), Self::output())
            .with_permission(LEVEL_ALL)
            .with_policy(self.policy))
    }
}

fn run_script(path: &std::path::Path, commands: &Commands, console: &Console) -> Result<()> {
    let mut script = CommandScript::from_path(path)?;
    info!(
        "Replaying {} until tick {}",
        path.display(),
        script.last_tick().0
    );
    let mut tick = SimTick::ZERO;
    let mut accepted = 0usize;
    let mut rejected = 0usize;
    loop {
        for step in script.drain_ready(tick) {
            let source = match &step.executor {
                Some(name) => console.player(name)?,
                None => console.server(),
            };
            debug!(tick = tick.0, source = source.text_name(), "{}", step.command);
            if commands.perform_command(&step.command, &source) {
                accepted += 1;
            } else {
                rejected += 1;
            }
        }
        if script.is_finished() {
            break;
        }
        tick = console.world.tick();
    }
    info!(accepted, rejected, "script finished at tick {}", tick.0);
    Ok(())
}

async fn run_interactive(
    commands: Arc<Commands>,
    source: CommandSource,
    world: Arc<ConsoleWorld>,
    workers: usize,
) -> Result<()> {
    let pool = SuggestionPool::new(workers, Handle::current());
    let mut session = Session::new(source, commands, pool);
    if session.request_suggestion_rebuild() {
        session.pump_next().await;
    } else {
        warn!("no suggestion workers; completions are disabled");
    }

    println!("Type a command, end a line with '?' for completions, 'quit' to leave.");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        std::io::stdout().flush()?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        session.pump();
        let line = line.trim();
        match line {
            "" => continue,
            "quit" | "exit" => break,
            _ => {}
        }
        if let Some(partial) = line.strip_suffix('?') {
            let suggestions = session.suggest(partial);
            if suggestions.is_empty() {
                println!("  (no suggestions)");
            }
            for text in suggestions.texts() {
                println!("  {text}");
            }
            continue;
        }
        session.perform(line);
        world.tick();
    }
    Ok(())
}
