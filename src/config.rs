//! Configuration management with XDG paths
//!
//! ~/.config/azswitch/config.json - tool name, retry tuning (0600)
//! ~/.local/state/azswitch/       - debug log

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::retry::{self, RetryPolicy};

const APP_NAME: &str = "azswitch";

/// Serve bundled sample data instead of calling the CLI
pub const ENV_USE_SAMPLE_DATA: &str = "USE_SAMPLE_DATA";
/// Presence enables the debug log
pub const ENV_DEBUG: &str = "DEBUG";
/// Override the debug log location
pub const ENV_LOG_FILE: &str = "AZSWITCH_LOG_FILE";

/// Get config directory (~/.config/azswitch/)
pub fn config_dir() -> Result<PathBuf> {
    let base = dirs::config_dir()
        .or_else(|| dirs::home_dir().map(|h| h.join(".config")))
        .context("Could not determine config directory")?;
    Ok(base.join(APP_NAME))
}

/// Get state directory (~/.local/state/azswitch/)
pub fn state_dir() -> Result<PathBuf> {
    let base = dirs::state_dir()
        .or_else(|| dirs::home_dir().map(|h| h.join(".local/state")))
        .context("Could not determine state directory")?;
    Ok(base.join(APP_NAME))
}

/// Get config file path
pub fn config_path() -> Result<PathBuf> {
    Ok(config_dir()?.join("config.json"))
}

/// Main configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// External CLI executable
    #[serde(default = "default_tool")]
    pub tool: String,

    /// Automatic retries before giving up
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// First backoff delay (ms), doubled per attempt
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Backoff cap (ms)
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Result page lifetime (ms)
    #[serde(default = "default_result_countdown_ms")]
    pub result_countdown_ms: u64,

    /// Use the bundled sample list
    #[serde(default)]
    pub use_sample_data: bool,

    /// Debug log target, set from the environment only
    #[serde(skip)]
    pub debug_log: Option<PathBuf>,
}

fn default_tool() -> String { crate::gateway::DEFAULT_TOOL.to_string() }
fn default_max_attempts() -> u32 { retry::MAX_ATTEMPTS }
fn default_base_delay_ms() -> u64 { retry::BASE_DELAY.as_millis() as u64 }
fn default_max_delay_ms() -> u64 { retry::MAX_DELAY.as_millis() as u64 }
fn default_result_countdown_ms() -> u64 { crate::app::RESULT_COUNTDOWN.as_millis() as u64 }

impl Default for Config {
    fn default() -> Self {
        Self {
            tool: default_tool(),
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            result_countdown_ms: default_result_countdown_ms(),
            use_sample_data: false,
            debug_log: None,
        }
    }
}

impl Config {
    /// Load config from disk, or return defaults
    pub fn load() -> Result<Self> {
        Self::load_from(&config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Config::default());
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config: Config = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        Ok(config)
    }

    /// Save config to disk with owner-only permissions
    pub fn save(&self) -> Result<()> {
        self.save_to(&config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create {}", dir.display()))?;
        }

        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, &content)
            .with_context(|| format!("Failed to write {}", path.display()))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mut perms = fs::metadata(path)?.permissions();
            perms.set_mode(0o600);
            fs::set_permissions(path, perms)?;
        }

        Ok(())
    }

    /// Apply environment overrides from the process environment
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_env_with(|key| std::env::var(key).ok())
    }

    pub fn apply_env_with(&mut self, var: impl Fn(&str) -> Option<String>) -> Result<()> {
        if var(ENV_USE_SAMPLE_DATA).as_deref() == Some("true") {
            self.use_sample_data = true;
        }
        if var(ENV_DEBUG).is_some() {
            let path = match var(ENV_LOG_FILE) {
                Some(p) if !p.is_empty() => PathBuf::from(p),
                _ => state_dir()?.join("messages.log"),
            };
            self.debug_log = Some(path);
        }
        Ok(())
    }

    /// Set a value by its CLI name
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "tool" => {
                if value.is_empty() {
                    anyhow::bail!("tool must not be empty");
                }
                self.tool = value.to_string();
            }
            "max_attempts" => self.max_attempts = parse_number(key, value)?,
            "base_delay_ms" => self.base_delay_ms = parse_number(key, value)?,
            "max_delay_ms" => self.max_delay_ms = parse_number(key, value)?,
            "result_countdown_ms" => self.result_countdown_ms = parse_number(key, value)?,
            "sample" | "use_sample_data" => {
                self.use_sample_data = value
                    .parse()
                    .with_context(|| format!("{} expects true or false, got '{}'", key, value))?;
            }
            _ => anyhow::bail!(
                "Unknown config key: {}. Valid keys: tool, max_attempts, base_delay_ms, max_delay_ms, result_countdown_ms, sample",
                key
            ),
        }
        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            base_delay: Duration::from_millis(self.base_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
        }
    }

    pub fn result_countdown(&self) -> Duration {
        Duration::from_millis(self.result_countdown_ms)
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| anyhow::anyhow!("{} expects a non-negative number, got '{}'", key, value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let cfg = Config::default();
        assert_eq!(cfg.tool, "az");
        assert_eq!(cfg.max_attempts, 3);
        assert_eq!(cfg.retry_policy(), RetryPolicy::default());
        assert_eq!(cfg.result_countdown(), Duration::from_secs(1));
        assert!(!cfg.use_sample_data);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let cfg: Config = serde_json::from_str(r#"{"tool": "az2", "max_attempts": 5}"#).unwrap();
        assert_eq!(cfg.tool, "az2");
        assert_eq!(cfg.max_attempts, 5);
        assert_eq!(cfg.base_delay_ms, 500);
        assert_eq!(cfg.max_delay_ms, 5000);
    }

    #[test]
    fn test_load_missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = Config::load_from(&dir.path().join("config.json")).unwrap();
        assert_eq!(cfg, Config::default());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let mut cfg = Config::default();
        cfg.set("max_delay_ms", "2000").unwrap();
        cfg.set("sample", "true").unwrap();
        cfg.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.max_delay_ms, 2000);
        assert!(loaded.use_sample_data);

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(&path).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }
    }

    #[test]
    fn test_load_malformed_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{not json").unwrap();
        let err = Config::load_from(&path).unwrap_err();
        assert!(format!("{:#}", err).contains("Failed to parse"));
    }

    #[test]
    fn test_set_rejects_bad_values() {
        let mut cfg = Config::default();
        assert!(cfg.set("max_attempts", "-1").is_err());
        assert!(cfg.set("sample", "yes").is_err());
        assert!(cfg.set("tool", "").is_err());
        assert!(cfg.set("colour", "red").is_err());
        assert_eq!(cfg, Config::default());
    }

    #[test]
    fn test_env_overrides() {
        let mut cfg = Config::default();
        cfg.apply_env_with(|key| match key {
            ENV_USE_SAMPLE_DATA => Some("true".into()),
            ENV_DEBUG => Some("1".into()),
            ENV_LOG_FILE => Some("/tmp/azswitch-test.log".into()),
            _ => None,
        })
        .unwrap();
        assert!(cfg.use_sample_data);
        assert_eq!(cfg.debug_log, Some(PathBuf::from("/tmp/azswitch-test.log")));

        let mut cfg = Config::default();
        cfg.apply_env_with(|key| (key == ENV_USE_SAMPLE_DATA).then(|| "1".to_string()))
            .unwrap();
        assert!(!cfg.use_sample_data);
        assert_eq!(cfg.debug_log, None);
    }
}
