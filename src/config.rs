use anyhow::Result;
use indexmap::IndexMap;
use mdcommand_core::LEVEL_OWNERS;
use mdcommand_dispatch::ExecutionLimits;
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};
use tracing::warn;

pub const DEFAULT_COMMANDS_PATH: &str = "config/commands.toml";

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct CommandConfig {
    /// Work units one top-level command may spend.
    pub max_command_chain_length: usize,
    /// Forked sources one top-level command may create.
    pub max_command_fork_count: usize,
    /// Require both the level and an explicit grant for permission checks.
    pub strict_permissions: bool,
    /// Concurrent suggestion-tree rebuilds.
    pub suggestion_workers: usize,
    pub console_permission_level: i32,
    /// Players present in the console world at startup.
    pub players: Vec<String>,
    /// Principal -> permission keys granted outside the level system.
    pub grants: IndexMap<String, Vec<String>>,
    /// Function name -> command lines run by `/function`.
    pub functions: IndexMap<String, Vec<String>>,
}

impl Default for CommandConfig {
    fn default() -> Self {
        let limits = ExecutionLimits::default();
        Self {
            max_command_chain_length: limits.max_chain_length,
            max_command_fork_count: limits.max_fork_count,
            strict_permissions: false,
            suggestion_workers: 2,
            console_permission_level: LEVEL_OWNERS,
            players: vec!["Alex".to_string(), "Steve".to_string()],
            grants: IndexMap::new(),
            functions: IndexMap::new(),
        }
    }
}

impl CommandConfig {
    /// Load from the default path.
    pub fn load() -> Self {
        Self::load_from_path(Path::new(DEFAULT_COMMANDS_PATH))
    }

    /// Load from an explicit path, falling back to defaults on errors.
    pub fn load_from_path(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(contents) => match toml::from_str::<CommandConfig>(&contents) {
                Ok(cfg) => cfg,
                Err(err) => {
                    warn!("Failed to parse {}: {err}. Using defaults", path.display());
                    CommandConfig::default()
                }
            },
            Err(err) => {
                if path != Path::new(DEFAULT_COMMANDS_PATH)
                    || err.kind() != std::io::ErrorKind::NotFound
                {
                    warn!("Failed to read {}: {err}. Using defaults", path.display());
                } else {
                    warn!(
                        "Command config not found at {}. Using defaults",
                        path.display()
                    );
                }
                CommandConfig::default()
            }
        }
    }

    /// Save to an explicit path as pretty TOML.
    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        let toml = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, toml)?;
        Ok(())
    }

    /// Scheduler limits; zero values fall back to one.
    pub fn limits(&self) -> ExecutionLimits {
        ExecutionLimits {
            max_chain_length: self.max_command_chain_length.max(1),
            max_fork_count: self.max_command_fork_count.max(1),
            ..ExecutionLimits::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_files_keep_defaults_for_missing_keys() {
        let cfg: CommandConfig = toml::from_str(
            r#"
            max_command_chain_length = 8
            strict_permissions = true

            [functions]
            "demo:setup" = ["time set day", "weather clear"]
            "#,
        )
        .unwrap();
        assert_eq!(cfg.max_command_chain_length, 8);
        assert!(cfg.strict_permissions);
        assert_eq!(cfg.max_command_fork_count, 65536);
        assert_eq!(cfg.suggestion_workers, 2);
        assert_eq!(cfg.functions["demo:setup"].len(), 2);
        assert_eq!(cfg.limits().max_chain_length, 8);
    }

    #[test]
    fn unreadable_files_fall_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("commands.toml");
        assert_eq!(CommandConfig::load_from_path(&path), CommandConfig::default());

        fs::write(&path, "max_command_chain_length = \"lots\"").unwrap();
        assert_eq!(CommandConfig::load_from_path(&path), CommandConfig::default());
    }

    #[test]
    fn save_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("commands.toml");
        let mut cfg = CommandConfig::default();
        cfg.grants
            .insert("Steve".into(), vec!["commands.level.2".into()]);
        cfg.save_to_path(&path).unwrap();
        assert_eq!(CommandConfig::load_from_path(&path), cfg);
    }
}
