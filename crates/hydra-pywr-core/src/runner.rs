//! Launching the external simulation engine.

use std::path::Path;
use std::process::{ExitStatus, Stdio};

use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, info};

use crate::config::RunnerConfig;

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("Failed to launch `{executable}`: {source}")]
    Spawn {
        executable: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Model run failed with exit code {code:?}: {stderr}")]
    Failed { code: Option<i32>, stderr: String },
}

/// A finished model run.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub status: ExitStatus,
    pub stdout: String,
}

/// Runs `<executable> <command> <config>` with a prefixed `PYTHONPATH`.
#[derive(Debug, Clone)]
pub struct ModelRunner {
    executable: String,
    command: String,
    python_path_prefix: String,
}

impl Default for ModelRunner {
    fn default() -> Self {
        Self::from_config(&RunnerConfig::default())
    }
}

impl ModelRunner {
    pub fn new(
        executable: impl Into<String>,
        command: impl Into<String>,
        python_path_prefix: impl Into<String>,
    ) -> Self {
        Self {
            executable: executable.into(),
            command: command.into(),
            python_path_prefix: python_path_prefix.into(),
        }
    }

    pub fn from_config(config: &RunnerConfig) -> Self {
        Self::new(&config.executable, &config.command, &config.python_path_prefix)
    }

    pub fn executable(&self) -> &str {
        &self.executable
    }

    /// `PYTHONPATH` for the child: the prefix followed by the inherited value.
    pub fn python_path(&self) -> String {
        let inherited = std::env::var("PYTHONPATH").unwrap_or_default();
        format!("{}{}", self.python_path_prefix, inherited)
    }

    pub async fn run(&self, config_path: impl AsRef<Path>) -> Result<RunOutcome, RunnerError> {
        let config_path = config_path.as_ref();
        let python_path = self.python_path();

        info!(
            executable = %self.executable,
            command = %self.command,
            config = %config_path.display(),
            "begin model run"
        );
        debug!(python_path = %python_path, "model environment");

        let output = Command::new(&self.executable)
            .arg(&self.command)
            .arg(config_path)
            .env("PYTHONPATH", &python_path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|source| RunnerError::Spawn {
                executable: self.executable.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(RunnerError::Failed {
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }

        info!(code = ?output.status.code(), "model run complete");
        Ok(RunOutcome {
            status: output.status,
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        })
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let runner = ModelRunner::default();
        assert_eq!(runner.executable(), "fdf");
        assert!(runner.python_path().starts_with(".:/app:"));
    }

    #[tokio::test]
    async fn test_run_captures_stdout() {
        // `echo run model.json` prints its arguments
        let runner = ModelRunner::new("echo", "run", "");
        let outcome = runner.run("model.json").await.unwrap();
        assert!(outcome.status.success());
        assert_eq!(outcome.stdout.trim(), "run model.json");
    }

    #[tokio::test]
    async fn test_non_zero_exit_is_error() {
        let runner = ModelRunner::new("false", "run", "");
        let err = runner.run("model.json").await.unwrap_err();
        assert!(matches!(err, RunnerError::Failed { code: Some(1), .. }));
    }

    #[tokio::test]
    async fn test_missing_executable() {
        let runner = ModelRunner::new("hydra-pywr-no-such-binary", "run", "");
        let err = runner.run("model.json").await.unwrap_err();
        assert!(matches!(err, RunnerError::Spawn { .. }));
    }
}
