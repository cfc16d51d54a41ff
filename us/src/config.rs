//! Unstuck configuration types and loading

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Name of the project-local config file
const LOCAL_CONFIG: &str = ".unstuck.yml";

/// Main Unstuck configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[serde(rename = "log-level")]
    pub log_level: Option<String>,

    /// Generation API configuration
    pub llm: LlmConfig,

    /// Preferences file; defaults to `~/.config/unstuck/preferences.json`
    #[serde(rename = "prefs-path")]
    pub prefs_path: Option<String>,

    /// Directory exported documents are written to
    #[serde(rename = "export-dir")]
    pub export_dir: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: None,
            llm: LlmConfig::default(),
            prefs_path: None,
            export_dir: ".".to_string(),
        }
    }
}

impl Config {
    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Try project-local config: .unstuck.yml
        let local_config = PathBuf::from(LOCAL_CONFIG);
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        // Try user config: ~/.config/unstuck/unstuck.yml
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("unstuck").join("unstuck.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        // No config file found, use defaults
        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Read only the log level, before logging is set up
    ///
    /// Errors are ignored here; the full load reports them once logging works.
    pub fn load_log_level(config_path: Option<&PathBuf>) -> Option<String> {
        Self::load(config_path).ok().and_then(|c| c.log_level)
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }

    /// Resolved preferences file path
    pub fn prefs_path(&self) -> PathBuf {
        match &self.prefs_path {
            Some(p) => expand_home(p),
            None => dirs::config_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("unstuck")
                .join("preferences.json"),
        }
    }

    /// Resolved export directory
    pub fn export_dir(&self) -> PathBuf {
        expand_home(&self.export_dir)
    }
}

/// Generation API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Model identifier
    pub model: String,

    /// API base URL
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Environment variable consulted when no credential is stored
    #[serde(rename = "api-key-env")]
    pub api_key_env: String,

    /// Maximum output tokens per breakdown
    #[serde(rename = "max-tokens")]
    pub max_tokens: u32,

    /// Sampling temperature for breakdowns
    pub temperature: f32,

    /// Request timeout in milliseconds
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: "gemini-3-flash-preview".to_string(),
            base_url: "https://generativelanguage.googleapis.com".to_string(),
            api_key_env: "GEMINI_API_KEY".to_string(),
            max_tokens: 1024,
            temperature: 0.7,
            timeout_ms: 60_000,
        }
    }
}

impl LlmConfig {
    /// Credential from the configured environment variable, if set and non-empty
    pub fn env_credential(&self) -> Option<String> {
        if self.api_key_env.is_empty() {
            return None;
        }
        std::env::var(&self.api_key_env)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }
}

fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/")
        && let Some(home) = dirs::home_dir()
    {
        return home.join(rest);
    }
    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.llm.model, "gemini-3-flash-preview");
        assert_eq!(config.llm.max_tokens, 1024);
        assert!((config.llm.temperature - 0.7).abs() < f32::EPSILON);
        assert_eq!(config.export_dir, ".");
        assert!(config.log_level.is_none());
    }

    #[test]
    fn test_deserialize_config() {
        let yaml = r#"
log-level: DEBUG
llm:
  model: gemini-2.5-flash
  base-url: http://localhost:8080
  api-key-env: MY_KEY
  max-tokens: 512
  temperature: 0.5
  timeout-ms: 5000
prefs-path: /tmp/unstuck-prefs.json
export-dir: /tmp/exports
"#;

        let config: Config = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.log_level.as_deref(), Some("DEBUG"));
        assert_eq!(config.llm.model, "gemini-2.5-flash");
        assert_eq!(config.llm.base_url, "http://localhost:8080");
        assert_eq!(config.llm.api_key_env, "MY_KEY");
        assert_eq!(config.llm.max_tokens, 512);
        assert_eq!(config.llm.timeout_ms, 5000);
        assert_eq!(config.prefs_path(), PathBuf::from("/tmp/unstuck-prefs.json"));
        assert_eq!(config.export_dir(), PathBuf::from("/tmp/exports"));
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let yaml = r#"
llm:
  model: gemini-lite
"#;

        let config: Config = serde_yaml::from_str(yaml).unwrap();

        // Specified value
        assert_eq!(config.llm.model, "gemini-lite");

        // Defaults for unspecified
        assert_eq!(config.llm.api_key_env, "GEMINI_API_KEY");
        assert_eq!(config.llm.max_tokens, 1024);
        assert_eq!(config.export_dir, ".");
    }

    #[test]
    fn test_load_explicit_path() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("unstuck.yml");
        fs::write(&path, "log-level: WARN\n").unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.log_level.as_deref(), Some("WARN"));
        assert_eq!(Config::load_log_level(Some(&path)).as_deref(), Some("WARN"));
    }

    #[test]
    fn test_load_explicit_path_missing_is_error() {
        let path = PathBuf::from("/nonexistent/unstuck.yml");
        assert!(Config::load(Some(&path)).is_err());
        assert!(Config::load_log_level(Some(&path)).is_none());
    }

    #[test]
    fn test_expand_home() {
        let expanded = expand_home("~/notes");
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expanded, home.join("notes"));
        }
        assert_eq!(expand_home("/abs/path"), PathBuf::from("/abs/path"));
    }

    #[test]
    #[serial]
    fn test_env_credential() {
        let config = LlmConfig {
            api_key_env: "UNSTUCK_TEST_KEY".to_string(),
            ..Default::default()
        };

        // SAFETY: serialized with other env-mutating tests
        unsafe { std::env::set_var("UNSTUCK_TEST_KEY", "  env-key  ") };
        assert_eq!(config.env_credential().as_deref(), Some("env-key"));

        unsafe { std::env::set_var("UNSTUCK_TEST_KEY", "   ") };
        assert_eq!(config.env_credential(), None);

        unsafe { std::env::remove_var("UNSTUCK_TEST_KEY") };
        assert_eq!(config.env_credential(), None);

        let disabled = LlmConfig {
            api_key_env: String::new(),
            ..Default::default()
        };
        assert_eq!(disabled.env_credential(), None);
    }
}
