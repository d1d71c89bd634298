//! Configuration management for hydra-pywr.
//!
//! Configuration is loaded from multiple sources with the following priority:
//! 1. Environment variables (highest priority)
//! 2. Project-local `hydra-pywr.toml` file
//! 3. User config `~/.config/hydra-pywr/config.toml`
//! 4. Built-in defaults (lowest priority)

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

mod defaults;

pub use defaults::*;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Hydra server connection.
    pub hydra: HydraConfig,

    /// Template, project and projection settings.
    pub network: NetworkConfig,

    /// External model runner.
    pub runner: RunnerConfig,

    /// Where written artifacts go.
    pub output: OutputConfig,

    /// Log filter and format.
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from default locations.
    ///
    /// Searches for config in order:
    /// 1. `./hydra-pywr.toml` (project local)
    /// 2. `~/.config/hydra-pywr/config.toml` (user config)
    /// 3. Falls back to defaults
    pub fn load() -> Result<Self, ConfigError> {
        if Path::new("hydra-pywr.toml").exists() {
            return Self::from_file("hydra-pywr.toml");
        }

        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("hydra-pywr").join("config.toml");
            if user_config.exists() {
                return Self::from_file(&user_config);
            }
        }

        let mut config = Self::default();
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load configuration from a specific file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&content)?;

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Apply environment variable overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("HYDRA_URL") {
            self.hydra.url = url;
        }
        if let Ok(session) = std::env::var("HYDRA_SESSION_ID") {
            self.hydra.session_id = Some(session);
        }
        if let Ok(user) = std::env::var("HYDRA_USER_ID") {
            if let Ok(id) = user.parse() {
                self.hydra.user_id = Some(id);
            }
        }
        if let Ok(username) = std::env::var("HYDRA_USERNAME") {
            self.hydra.username = Some(username);
        }
        if let Ok(password) = std::env::var("HYDRA_PASSWORD") {
            self.hydra.password = Some(password);
        }

        if let Ok(dir) = std::env::var("HYDRA_PYWR_OUTPUT_DIR") {
            self.output.output_dir = dir;
        }
        if let Ok(exe) = std::env::var("HYDRA_PYWR_EXECUTABLE") {
            self.runner.executable = exe;
        }
        if let Ok(level) = std::env::var("HYDRA_PYWR_LOG") {
            self.logging.level = level;
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.hydra.url.trim().is_empty() {
            return Err(ConfigError::Invalid("hydra.url must not be empty".to_string()));
        }
        if self.runner.executable.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "runner.executable must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Create a default config file content as a string.
    pub fn default_config_string() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

/// Hydra server connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HydraConfig {
    /// Base URL of the Hydra server (the `/json` endpoint is appended).
    pub url: String,

    /// Existing session id, if already logged in.
    pub session_id: Option<String>,

    /// User id sent alongside the session.
    pub user_id: Option<i64>,

    /// Username used to log in when no session id is set.
    pub username: Option<String>,

    /// Password used to log in (can also be set via environment variable).
    #[serde(skip_serializing)]
    pub password: Option<String>,

    /// Application name reported to the server.
    pub app_name: String,

    /// HTTP timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for HydraConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_HYDRA_URL.to_string(),
            session_id: None,
            user_id: None,
            username: None,
            password: None,
            app_name: DEFAULT_APP_NAME.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

/// Template, project and projection settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Template used for single-domain networks.
    pub template_id: Option<i64>,

    /// Template used for the water domain of integrated networks.
    pub water_template_id: Option<i64>,

    /// Template used for the energy domain of integrated networks.
    pub energy_template_id: Option<i64>,

    /// Project new networks are created in.
    pub project_id: Option<i64>,

    /// Projection used when neither the caller nor the network metadata sets one.
    pub default_projection: Option<String>,
}

/// External model runner settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// Executable to launch.
    pub executable: String,

    /// Sub-command passed before the config path.
    pub command: String,

    /// Prefix prepended to the inherited PYTHONPATH.
    pub python_path_prefix: String,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            executable: DEFAULT_RUNNER_EXECUTABLE.to_string(),
            command: DEFAULT_RUNNER_COMMAND.to_string(),
            python_path_prefix: DEFAULT_PYTHON_PATH_PREFIX.to_string(),
        }
    }
}

/// Output artifact settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Directory all artifacts are written to.
    pub output_dir: String,

    /// File name of the pynsim config for integrated runs.
    pub pynsim_file: String,

    /// File name of the custom rules module.
    pub rules_module: String,

    /// File name of the multi-network config.
    pub multi_config_file: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            output_dir: DEFAULT_OUTPUT_DIR.to_string(),
            pynsim_file: DEFAULT_PYNSIM_FILE.to_string(),
            rules_module: DEFAULT_RULES_MODULE.to_string(),
            multi_config_file: DEFAULT_MULTI_CONFIG_FILE.to_string(),
        }
    }
}

impl OutputConfig {
    /// Get the output directory as a path.
    pub fn output_path(&self) -> PathBuf {
        PathBuf::from(&self.output_dir)
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `tracing` filter directive, e.g. `info` or `hydra_pywr_core=debug`.
    pub level: String,

    /// Emit JSON formatted log lines.
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL.to_string(),
            json: false,
        }
    }
}
