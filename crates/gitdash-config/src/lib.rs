use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const GITDASH_DIR_NAME: &str = ".gitdash";
pub const CONFIG_FILE_NAME: &str = "config.toml";
pub const DEFAULT_STORE_PATH: &str = ".gitdash/facts.sqlite";
pub const DEFAULT_CONSISTENCY_TOLERANCE: f64 = 0.05;
pub const DEFAULT_DISPLAY_TOP_N: u32 = 15;
pub const DEFAULT_LOG_LEVEL: &str = "info";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Human,
    Json,
}

impl LogFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Human => "human",
            Self::Json => "json",
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "human" => Ok(Self::Human),
            "json" => Ok(Self::Json),
            other => Err(format!(
                "invalid log format '{other}', expected one of: human, json"
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct GitdashConfig {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_store_path")]
    pub path: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "default_true")]
    pub prefer_precomputed: bool,
    #[serde(default)]
    pub verify_paths: bool,
    #[serde(default = "default_consistency_tolerance")]
    pub consistency_tolerance: f64,
    #[serde(default = "default_display_top_n")]
    pub display_top_n: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            prefer_precomputed: true,
            verify_paths: false,
            consistency_tolerance: default_consistency_tolerance(),
            display_top_n: default_display_top_n(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub format: LogFormat,
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Human,
            level: default_log_level(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigWarning {
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config TOML: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("failed to serialize config TOML: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

pub fn gitdash_dir(workspace_root: impl AsRef<Path>) -> PathBuf {
    workspace_root.as_ref().join(GITDASH_DIR_NAME)
}

pub fn config_path(workspace_root: impl AsRef<Path>) -> PathBuf {
    gitdash_dir(workspace_root).join(CONFIG_FILE_NAME)
}

/// Absolute location of the fact store; relative paths resolve against the
/// workspace root.
pub fn store_path(workspace_root: impl AsRef<Path>, config: &GitdashConfig) -> PathBuf {
    let configured = Path::new(config.store.path.as_str());
    if configured.is_absolute() {
        configured.to_path_buf()
    } else {
        workspace_root.as_ref().join(configured)
    }
}

pub fn load_workspace_config(
    workspace_root: impl AsRef<Path>,
) -> Result<GitdashConfig, ConfigError> {
    let path = config_path(workspace_root);
    if !path.exists() {
        return Ok(GitdashConfig::default());
    }

    let raw = fs::read_to_string(path)?;
    let parsed: GitdashConfig = toml::from_str(&raw)?;
    Ok(normalize_config(parsed))
}

pub fn ensure_workspace_config(
    workspace_root: impl AsRef<Path>,
) -> Result<GitdashConfig, ConfigError> {
    let workspace_root = workspace_root.as_ref();
    fs::create_dir_all(gitdash_dir(workspace_root))?;

    let path = config_path(workspace_root);
    if path.exists() {
        return load_workspace_config(workspace_root);
    }

    let config = GitdashConfig::default();
    let content = toml::to_string_pretty(&config)?;
    fs::write(path, content)?;

    Ok(config)
}

pub fn validate_config(config: &GitdashConfig) -> Vec<ConfigWarning> {
    let mut warnings = Vec::new();

    let tolerance = config.engine.consistency_tolerance;
    if !tolerance.is_finite() || tolerance < 0.0 {
        warnings.push(ConfigWarning {
            code: "engine.consistency_tolerance",
            message: format!(
                "consistency_tolerance {tolerance} is not a non-negative number; using {DEFAULT_CONSISTENCY_TOLERANCE}"
            ),
        });
    } else if tolerance > DEFAULT_CONSISTENCY_TOLERANCE {
        warnings.push(ConfigWarning {
            code: "engine.consistency_tolerance",
            message: format!(
                "consistency_tolerance {tolerance} is looser than {DEFAULT_CONSISTENCY_TOLERANCE}; path disagreements may go unreported"
            ),
        });
    }

    if config.engine.display_top_n == 0 {
        warnings.push(ConfigWarning {
            code: "engine.display_top_n",
            message: "display_top_n is 0; listings will show every group".to_owned(),
        });
    }

    warnings
}

/// Tolerance actually applied by the engine after rejecting unusable values.
pub fn effective_tolerance(config: &EngineConfig) -> f64 {
    let tolerance = config.consistency_tolerance;
    if tolerance.is_finite() && tolerance >= 0.0 {
        tolerance
    } else {
        DEFAULT_CONSISTENCY_TOLERANCE
    }
}

fn default_store_path() -> String {
    DEFAULT_STORE_PATH.to_owned()
}

fn default_true() -> bool {
    true
}

fn default_consistency_tolerance() -> f64 {
    DEFAULT_CONSISTENCY_TOLERANCE
}

fn default_display_top_n() -> u32 {
    DEFAULT_DISPLAY_TOP_N
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_owned()
}

fn normalize_config(mut config: GitdashConfig) -> GitdashConfig {
    let store_path = config.store.path.trim();
    if store_path.is_empty() {
        config.store.path = default_store_path();
    } else {
        config.store.path = store_path.to_owned();
    }

    let level = config.logging.level.trim();
    if level.is_empty() {
        config.logging.level = default_log_level();
    } else {
        config.logging.level = level.to_owned();
    }

    config
}
