//! Runner configuration
//!
//! ## Priority Order (highest to lowest)
//!
//! 1. CLI flags (`--shell`, `--timeout`)
//! 2. Environment variables (`STEPWISE_SHELL`, `STEPWISE_EXEC_TIMEOUT_SECS`),
//!    including values loaded from `.env`
//! 3. Defaults

use std::time::Duration;

use crate::error::{Result, StepwiseError};

/// Default timeout for exec steps (60 seconds)
pub const DEFAULT_EXEC_TIMEOUT: Duration = Duration::from_secs(60);

pub const DEFAULT_SHELL: &str = "sh";

pub const ENV_SHELL: &str = "STEPWISE_SHELL";
pub const ENV_EXEC_TIMEOUT: &str = "STEPWISE_EXEC_TIMEOUT_SECS";

/// Settings used by [`Runner`](crate::Runner) for exec steps
#[derive(Debug, Clone, PartialEq)]
pub struct RunnerConfig {
    /// Shell invoked as `<shell> -c <command>`
    pub shell: String,
    /// Per-step limit for exec steps
    pub exec_timeout: Duration,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            shell: DEFAULT_SHELL.to_string(),
            exec_timeout: DEFAULT_EXEC_TIMEOUT,
        }
    }
}

impl RunnerConfig {
    /// Tighter limits for tests
    pub fn testing() -> Self {
        Self {
            exec_timeout: Duration::from_secs(10),
            ..Self::default()
        }
    }

    /// Defaults overridden by the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each variable
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(shell) = lookup(ENV_SHELL) {
            let shell = shell.trim();
            if shell.is_empty() {
                return Err(StepwiseError::Config {
                    reason: format!("{} is set but empty", ENV_SHELL),
                });
            }
            config.shell = shell.to_string();
        }

        if let Some(raw) = lookup(ENV_EXEC_TIMEOUT) {
            let secs: u64 = raw.trim().parse().map_err(|e| StepwiseError::Config {
                reason: format!("{}='{}' is not a number of seconds: {}", ENV_EXEC_TIMEOUT, raw, e),
            })?;
            config.exec_timeout = Self::checked_timeout(secs)?;
        }

        Ok(config)
    }

    pub fn with_shell(mut self, shell: impl Into<String>) -> Self {
        self.shell = shell.into();
        self
    }

    pub fn with_exec_timeout(mut self, timeout: Duration) -> Self {
        self.exec_timeout = timeout;
        self
    }

    /// Timeout from a whole number of seconds; zero is rejected
    pub fn checked_timeout(secs: u64) -> Result<Duration> {
        if secs == 0 {
            return Err(StepwiseError::Config {
                reason: "exec timeout must be at least 1 second".to_string(),
            });
        }
        Ok(Duration::from_secs(secs))
    }
}
