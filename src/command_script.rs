use anyhow::{bail, Context, Result};
use mdcommand_core::SimTick;
use serde::Deserialize;
use std::{collections::VecDeque, fs, path::Path};

#[derive(Debug, Deserialize)]
struct ScriptFile {
    steps: Vec<StepDef>,
}

#[derive(Debug, Deserialize)]
struct StepDef {
    tick: u64,
    command: String,
    /// Player to run as; the console when absent.
    #[serde(default, rename = "as")]
    executor: Option<String>,
}

/// One scheduled command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptStep {
    pub tick: SimTick,
    pub command: String,
    pub executor: Option<String>,
}

/// Replays `{tick, command, as?}` steps against the world clock.
///
/// Steps must be sorted by tick; steps sharing a tick run in file order.
#[derive(Debug)]
pub struct CommandScript {
    pending: VecDeque<ScriptStep>,
    last_tick: SimTick,
}

impl CommandScript {
    pub fn from_path(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("reading command script {}", path.display()))?;
        Self::parse(&contents).with_context(|| format!("parsing {}", path.display()))
    }

    pub fn parse(contents: &str) -> Result<Self> {
        let file: ScriptFile = serde_json::from_str(contents)?;
        if file.steps.is_empty() {
            bail!("command script contains no steps");
        }

        let mut pending = VecDeque::with_capacity(file.steps.len());
        let mut last_tick = 0;
        for (index, step) in file.steps.into_iter().enumerate() {
            let command = step.command.trim();
            if command.is_empty() {
                bail!("step {index} has an empty command");
            }
            if step.tick < last_tick {
                bail!("command script steps must be sorted by tick (step {index})");
            }
            last_tick = step.tick;
            pending.push_back(ScriptStep {
                tick: SimTick(step.tick),
                command: command.to_string(),
                executor: step.executor.filter(|name| !name.is_empty()),
            });
        }

        Ok(Self {
            pending,
            last_tick: SimTick(last_tick),
        })
    }

    /// Remove and return every step due at or before `tick`.
    pub fn drain_ready(&mut self, tick: SimTick) -> Vec<ScriptStep> {
        let due = self
            .pending
            .iter()
            .take_while(|step| step.tick <= tick)
            .count();
        self.pending.drain(..due).collect()
    }

    /// Tick of the final step.
    pub fn last_tick(&self) -> SimTick {
        self.last_tick
    }

    pub fn is_finished(&self) -> bool {
        self.pending.is_empty()
    }
}
