//! # Configuration
//!
//! Centralizes all settings with a clear override hierarchy:
//! defaults → config file → env vars → CLI flags.
//!
//! Config lives at `~/.quasar/config.toml`. If missing on first run, a
//! commented-out default is generated so users can discover all options.

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use crate::protocol::WorkerSpec;

// ============================================================================
// Config Structs (all fields Option<T> for sparse TOML)
// ============================================================================

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct QuasarConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub worker: WorkerConfig,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct GeneralConfig {
    pub auto_restart: Option<bool>,
    pub exit_on_completion: Option<bool>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct WorkerConfig {
    pub program: Option<String>,
    pub args: Option<Vec<String>>,
    pub workspace_root: Option<String>,
}

// ============================================================================
// Defaults
// ============================================================================

pub const DEFAULT_WORKER_PROGRAM: &str = "python3";
pub const DEFAULT_WORKER_ARGS: &[&str] = &["bridge.py"];
pub const DEFAULT_WORKSPACE_ROOT: &str = "workspace";

/// File whose presence under the workspace root means a checkpoint exists.
pub const CHECKPOINT_STORE: &str = "checkpoints.sqlite";

pub const ENV_WORKER: &str = "QUASAR_WORKER";
pub const ENV_WORKSPACE: &str = "WORKSPACE_DIR";
pub const ENV_AUTO_RESTART: &str = "QUASAR_AUTO_RESTART";

// ============================================================================
// Resolved Config (concrete values, no Options)
// ============================================================================

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub worker: WorkerSpec,
    pub auto_restart: bool,
    pub exit_on_completion: bool,
}

/// Values supplied on the command line. `None` / `false` = not specified.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub worker: Option<String>,
    pub workspace: Option<PathBuf>,
    pub auto_restart: bool,
}

// ============================================================================
// Error Type
// ============================================================================

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "config I/O error: {e}"),
            ConfigError::Parse(e) => write!(f, "config parse error: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}

// ============================================================================
// Loading
// ============================================================================

/// Returns the path to `~/.quasar/config.toml`.
pub fn config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".quasar").join("config.toml"))
}

/// Load config from `~/.quasar/config.toml`.
///
/// If the file doesn't exist, generates a commented-out default and
/// returns `QuasarConfig::default()`. If it exists but is malformed,
/// returns `ConfigError::Parse`.
pub fn load_config() -> Result<QuasarConfig, ConfigError> {
    let path = match config_path() {
        Some(p) => p,
        None => {
            warn!("Could not determine home directory, using default config");
            return Ok(QuasarConfig::default());
        }
    };

    if !path.exists() {
        info!("No config file found, generating default at {}", path.display());
        generate_default_config(&path);
        return Ok(QuasarConfig::default());
    }

    let contents = fs::read_to_string(&path).map_err(ConfigError::Io)?;
    let config: QuasarConfig = toml::from_str(&contents).map_err(ConfigError::Parse)?;
    info!("Loaded config from {}", path.display());
    debug!("Config: {:?}", config);
    Ok(config)
}

/// Generates a commented-out default config file at the given path.
fn generate_default_config(path: &Path) {
    let default_content = r#"# Quasar Configuration
# All settings are optional. Defaults are used for anything not specified.
# Override hierarchy: defaults → this file → env vars → CLI flags.

# [worker]
# program = "python3"                # Or set QUASAR_WORKER="python3 bridge.py"
# args = ["bridge.py"]
# workspace_root = "workspace"       # Or set WORKSPACE_DIR

# [general]
# auto_restart = false               # Resume the last checkpoint without asking
# exit_on_completion = false         # Quit when a run finishes
"#;

    if let Some(parent) = path.parent()
        && let Err(e) = fs::create_dir_all(parent)
    {
        warn!("Failed to create config directory: {}", e);
        return;
    }
    if let Err(e) = fs::write(path, default_content) {
        warn!("Failed to write default config: {}", e);
    }
}

// ============================================================================
// Resolution
// ============================================================================

/// Parse a boolean-ish environment value. Unset or unrecognized → `None`.
pub fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}

pub fn env_flag(name: &str) -> Option<bool> {
    std::env::var(name).ok().as_deref().and_then(parse_flag)
}

/// Restart intent as of right now. The env var is re-read on every call so a
/// supervisor can flip it between worker restarts.
pub fn auto_restart_requested(configured: bool) -> bool {
    env_flag(ENV_AUTO_RESTART).unwrap_or(configured)
}

/// Whether a persisted checkpoint store exists under `workspace_root`.
pub fn checkpoint_store_exists(workspace_root: &Path) -> bool {
    workspace_root.join(CHECKPOINT_STORE).exists()
}

/// Split a `QUASAR_WORKER`-style command line into program and args.
fn split_command(line: &str) -> Option<(String, Vec<String>)> {
    let mut parts = line.split_whitespace().map(str::to_string);
    let program = parts.next()?;
    Some((program, parts.collect()))
}

/// Resolve the final config by collapsing: defaults → config file → env vars → CLI.
pub fn resolve(config: &QuasarConfig, cli: &CliOverrides) -> ResolvedConfig {
    // Worker command: CLI → env → config → default
    let command_line = cli
        .worker
        .clone()
        .or_else(|| std::env::var(ENV_WORKER).ok());
    let (program, args) = match command_line.as_deref().and_then(split_command) {
        Some(parts) => parts,
        None => (
            config
                .worker
                .program
                .clone()
                .unwrap_or_else(|| DEFAULT_WORKER_PROGRAM.to_string()),
            config.worker.args.clone().unwrap_or_else(|| {
                DEFAULT_WORKER_ARGS.iter().map(|s| s.to_string()).collect()
            }),
        ),
    };

    // Workspace root: CLI → env → config → default
    let workspace_root = cli
        .workspace
        .clone()
        .or_else(|| std::env::var(ENV_WORKSPACE).ok().map(PathBuf::from))
        .or_else(|| config.worker.workspace_root.clone().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_WORKSPACE_ROOT));

    // Auto-restart: CLI flag → env → config → default
    let auto_restart = cli.auto_restart
        || env_flag(ENV_AUTO_RESTART)
            .or(config.general.auto_restart)
            .unwrap_or(false);

    ResolvedConfig {
        worker: WorkerSpec {
            program,
            args,
            workspace_root,
            env: Vec::new(),
        },
        auto_restart,
        exit_on_completion: config.general.exit_on_completion.unwrap_or(false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_parses() {
        let config = QuasarConfig::default();
        assert!(config.worker.program.is_none());
        assert!(config.general.auto_restart.is_none());
    }

    #[test]
    fn test_resolve_config_values_override_defaults() {
        let config = QuasarConfig {
            worker: WorkerConfig {
                program: Some("uv".to_string()),
                args: Some(vec!["run".to_string(), "bridge.py".to_string()]),
                workspace_root: Some("/tmp/ws".to_string()),
            },
            general: GeneralConfig {
                auto_restart: None,
                exit_on_completion: Some(true),
            },
        };
        let cli = CliOverrides {
            worker: Some("python3 -u bridge.py".to_string()),
            workspace: Some(PathBuf::from("/data/run")),
            auto_restart: true,
        };
        let resolved = resolve(&config, &cli);
        assert_eq!(resolved.worker.program, "python3");
        assert_eq!(resolved.worker.args, vec!["-u", "bridge.py"]);
        assert_eq!(resolved.worker.workspace_root, PathBuf::from("/data/run"));
        assert!(resolved.auto_restart);
        assert!(resolved.exit_on_completion);
    }

    #[test]
    fn test_parse_flag() {
        assert_eq!(parse_flag("true"), Some(true));
        assert_eq!(parse_flag(" 1 "), Some(true));
        assert_eq!(parse_flag("FALSE"), Some(false));
        assert_eq!(parse_flag("maybe"), None);
    }

    #[test]
    fn test_split_command() {
        assert_eq!(
            split_command("python3 bridge.py --fast"),
            Some(("python3".to_string(), vec!["bridge.py".to_string(), "--fast".to_string()]))
        );
        assert_eq!(split_command("   "), None);
    }

    #[test]
    fn test_checkpoint_store_detection() {
        let dir = std::env::temp_dir().join(format!("quasar-store-{}", uuid::Uuid::new_v4()));
        fs::create_dir_all(&dir).unwrap();
        assert!(!checkpoint_store_exists(&dir));
        fs::write(dir.join(CHECKPOINT_STORE), b"").unwrap();
        assert!(checkpoint_store_exists(&dir));
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_toml_round_trip() {
        let toml_str = r#"
[worker]
program = "python3"
args = ["bridge.py", "--quiet"]
workspace_root = "runs/current"

[general]
auto_restart = true
exit_on_completion = false
"#;
        let config: QuasarConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.worker.program.as_deref(), Some("python3"));
        assert_eq!(config.worker.args.as_ref().map(Vec::len), Some(2));
        assert_eq!(config.general.auto_restart, Some(true));
        assert_eq!(config.general.exit_on_completion, Some(false));
    }

    #[test]
    fn test_sparse_toml_parses() {
        // Only override one thing; everything else stays default
        let toml_str = r#"
[worker]
workspace_root = "elsewhere"
"#;
        let config: QuasarConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.worker.workspace_root.as_deref(), Some("elsewhere"));
        assert!(config.worker.program.is_none());
        assert!(config.general.exit_on_completion.is_none());
    }
}
