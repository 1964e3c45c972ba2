//! Simulator configuration.
//!
//! [`SimulatorConfig`] gathers the externally configured values the dispatch
//! engine needs: the fallback scenario, timeouts, the execution discipline
//! and the correlation registry bound.

use std::time::Duration;

use crate::{correlation::DEFAULT_CORRELATION_CAPACITY, error::ConfigError};

/// How scenario scripts are scheduled.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ExecutionMode {
    /// Run one script at a time system-wide.
    Sync,
    /// Run scripts on a bounded pool of background tasks.
    #[default]
    Async,
}

/// Configuration for the dispatch engine.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use scenario_simulator::config::{ExecutionMode, SimulatorConfig};
///
/// let config = SimulatorConfig::default()
///     .default_scenario("Fallback")
///     .default_timeout(Duration::from_secs(2))
///     .execution_mode(ExecutionMode::Sync);
///
/// assert_eq!(config.default_scenario, "Fallback");
/// assert!(config.validate().is_ok());
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SimulatorConfig {
    /// Scenario used when no mapped scenario is registered.
    ///
    /// Default: `"Default"`.
    pub default_scenario: String,

    /// How long the dispatcher waits for a scripted response.
    ///
    /// Default: 5 seconds.
    pub default_timeout: Duration,

    /// How long [`ScenarioContext::receive`](crate::scenario::ScenarioContext::receive)
    /// waits for a message.
    ///
    /// Default: 5 seconds.
    pub receive_timeout: Duration,

    /// Execution discipline.
    ///
    /// Default: [`ExecutionMode::Async`].
    pub execution_mode: ExecutionMode,

    /// Maximum concurrently running scripts in asynchronous mode.
    ///
    /// Default: 10.
    pub executor_threads: usize,

    /// Maximum number of live correlation handlers.
    ///
    /// Default: 1000.
    pub correlation_capacity: usize,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            default_scenario: "Default".to_owned(),
            default_timeout: Duration::from_secs(5),
            receive_timeout: Duration::from_secs(5),
            execution_mode: ExecutionMode::default(),
            executor_threads: 10,
            correlation_capacity: DEFAULT_CORRELATION_CAPACITY,
        }
    }
}

impl SimulatorConfig {
    /// Set the fallback scenario name.
    #[must_use]
    pub fn default_scenario(mut self, name: impl Into<String>) -> Self {
        self.default_scenario = name.into();
        self
    }

    /// Set the dispatcher response timeout.
    #[must_use]
    pub fn default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// Set the script receive timeout.
    #[must_use]
    pub fn receive_timeout(mut self, timeout: Duration) -> Self {
        self.receive_timeout = timeout;
        self
    }

    /// Set the execution discipline.
    #[must_use]
    pub fn execution_mode(mut self, mode: ExecutionMode) -> Self {
        self.execution_mode = mode;
        self
    }

    /// Set the asynchronous pool size (minimum 1).
    #[must_use]
    pub fn executor_threads(mut self, count: usize) -> Self {
        self.executor_threads = count.max(1);
        self
    }

    /// Set the correlation registry capacity (minimum 1).
    #[must_use]
    pub fn correlation_capacity(mut self, capacity: usize) -> Self {
        self.correlation_capacity = capacity.max(1);
        self
    }

    /// Check the configuration for values the engine cannot work with.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::EmptyDefaultScenario`] for a blank fallback
    /// name and [`ConfigError::ZeroTimeout`] for zero timeouts.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_scenario.trim().is_empty() {
            return Err(ConfigError::EmptyDefaultScenario);
        }
        if self.default_timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout("default_timeout"));
        }
        if self.receive_timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout("receive_timeout"));
        }
        Ok(())
    }
}
