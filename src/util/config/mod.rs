//! Shell configuration
//!
//! Layered configuration with merge-by-replacement semantics.
//!
//! # Configuration hierarchy
//!
//! ```text
//! Priority (high -> low):
//! 1. CLI arguments
//! 2. Explicit --config file
//! 3. User-level (~/.config/snippet-engine/config.toml)
//! 4. Default values
//! ```
//!
//! # Usage
//!
//! ```rust,no_run
//! use snippet_engine::util::config::load_user_config;
//!
//! // Missing file yields the defaults
//! let config = load_user_config().unwrap();
//! println!("{}", config.repl.prompt);
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::util::logger::LogLevel;

/// Directory name under the user config root
const CONFIG_DIR_NAME: &str = "snippet-engine";

/// Top-level configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ShellConfig {
    /// Engine settings
    #[serde(default)]
    pub engine: EngineConfig,
    /// REPL settings
    #[serde(default)]
    pub repl: ReplConfig,
    /// Logging settings
    #[serde(default)]
    pub log: LogConfig,
}

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EngineConfig {
    /// Prefix of every generated class name
    #[serde(default = "default_class_prefix")]
    pub class_prefix: String,
    /// Entry point invoked for executable snippets
    #[serde(default = "default_entry_point")]
    pub entry_point: String,
    /// Compiler worker threads (0 = one per CPU)
    #[serde(default)]
    pub compiler_threads: usize,
    /// Index the library in the background for `/lookup`
    #[serde(default = "default_true")]
    pub index_library: bool,
}

fn default_class_prefix() -> String {
    "$Snip".to_string()
}

fn default_entry_point() -> String {
    "__run".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            class_prefix: default_class_prefix(),
            entry_point: default_entry_point(),
            compiler_threads: 0,
            index_library: true,
        }
    }
}

/// REPL configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReplConfig {
    /// History size
    #[serde(default = "default_history_size")]
    pub history_size: usize,
    /// History file path
    #[serde(default)]
    pub history_file: Option<PathBuf>,
    /// Prompt string
    #[serde(default = "default_prompt")]
    pub prompt: String,
    /// Prompt for continuation lines
    #[serde(default = "default_continuation_prompt")]
    pub continuation_prompt: String,
    /// Colored feedback
    #[serde(default = "default_true")]
    pub colors: bool,
}

fn default_history_size() -> usize {
    1000
}

fn default_prompt() -> String {
    "snip> ".to_string()
}

fn default_continuation_prompt() -> String {
    "   ...> ".to_string()
}

impl Default for ReplConfig {
    fn default() -> Self {
        Self {
            history_size: default_history_size(),
            history_file: None,
            prompt: default_prompt(),
            continuation_prompt: default_continuation_prompt(),
            colors: true,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct LogConfig {
    /// Minimum level written to stderr
    #[serde(default)]
    pub level: LogLevel,
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Config parse error: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Get the user config directory
pub fn get_config_dir() -> Option<PathBuf> {
    if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
        return Some(PathBuf::from(xdg_config).join(CONFIG_DIR_NAME));
    }

    if let Ok(home) = std::env::var("HOME") {
        return Some(PathBuf::from(home).join(".config").join(CONFIG_DIR_NAME));
    }

    if let Ok(appdata) = std::env::var("APPDATA") {
        return Some(PathBuf::from(appdata).join(CONFIG_DIR_NAME));
    }

    None
}

/// Get the user config file path
pub fn get_config_path() -> Option<PathBuf> {
    get_config_dir().map(|dir| dir.join("config.toml"))
}

/// Load a configuration file
pub fn load_config_file(path: &Path) -> Result<ShellConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}

/// Load user-level configuration
///
/// Returns the defaults if the file doesn't exist.
pub fn load_user_config() -> Result<ShellConfig, ConfigError> {
    match get_config_path() {
        Some(path) if path.exists() => load_config_file(&path),
        _ => Ok(ShellConfig::default()),
    }
}

/// Load the effective configuration: an explicit file wins over the user file
pub fn load(explicit: Option<&Path>) -> Result<ShellConfig, ConfigError> {
    match explicit {
        Some(path) => load_config_file(path),
        None => load_user_config(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = ShellConfig::default();
        assert_eq!(config.engine.class_prefix, "$Snip");
        assert_eq!(config.engine.entry_point, "__run");
        assert_eq!(config.repl.history_size, 1000);
        assert_eq!(config.log.level, LogLevel::Warn);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[repl]\nprompt = \"> \"\n\n[log]\nlevel = \"debug\"").unwrap();

        let config = load_config_file(file.path()).unwrap();
        assert_eq!(config.repl.prompt, "> ");
        assert_eq!(config.repl.history_size, 1000);
        assert_eq!(config.log.level, LogLevel::Debug);
        assert_eq!(config.engine, EngineConfig::default());
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[engine\nclass_prefix = 3").unwrap();

        let err = load_config_file(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_round_trip_through_toml() {
        let mut config = ShellConfig::default();
        config.engine.compiler_threads = 2;
        let text = toml::to_string_pretty(&config).unwrap();
        let back: ShellConfig = toml::from_str(&text).unwrap();
        assert_eq!(back, config);
    }
}
