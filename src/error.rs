//! Canonical error types for the crate.
//!
//! Errors are split by the party responsible for them: scenario authors see
//! [`CorrelationError`] and [`ScenarioError`], transport adapters see
//! [`DispatchError`], and the composition root sees [`ConfigError`].

use std::time::Duration;

use thiserror::Error;

use crate::execution::ExecutionId;

/// A reply was attempted without a pending request to answer.
///
/// This always indicates a bug in a scenario script: it called `send` or
/// `fail` more often than it received messages.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum CorrelationError {
    /// The endpoint's response stack was empty.
    #[error("no response consumer registered")]
    NoPendingResponse,
}

/// Uncaught failure of a scenario script, delivered through the response slot.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("scenario '{scenario}' ({execution_id}) failed: {reason}")]
pub struct ScriptFailure {
    /// Name of the failing scenario.
    pub scenario: String,
    /// Execution that failed.
    pub execution_id: ExecutionId,
    /// Rendered cause.
    pub reason: String,
}

/// Failure side of a response slot.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SlotError {
    /// The scenario script failed.
    #[error(transparent)]
    Script(#[from] ScriptFailure),
    /// The execution was interrupted by shutdown.
    #[error("scenario execution cancelled")]
    Cancelled,
}

/// Errors raised inside scenario scripts.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ScenarioError {
    /// A reply was sent without a pending request.
    #[error(transparent)]
    Correlation(#[from] CorrelationError),
    /// A message the script insisted on never arrived.
    #[error("no message received within {0:?}")]
    ReceiveTimeout(Duration),
    /// A scripted expectation did not hold.
    #[error("assertion failed: {0}")]
    Assertion(String),
    /// Any other script failure.
    #[error(transparent)]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl ScenarioError {
    /// Build an [`ScenarioError::Assertion`] from any displayable message.
    #[must_use]
    pub fn assertion(message: impl Into<String>) -> Self { Self::Assertion(message.into()) }
}

/// Errors surfaced to transport adapters by
/// [`Dispatcher::dispatch`](crate::dispatcher::Dispatcher::dispatch).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum DispatchError {
    /// Neither the mapped nor the default scenario is registered.
    #[error("no scenario matched and default scenario '{scenario}' is not registered")]
    MappingMiss {
        /// The default scenario name that failed to resolve.
        scenario: String,
    },
    /// The scenario script failed before replying.
    #[error(transparent)]
    ScriptFailure(#[from] ScriptFailure),
    /// The execution was interrupted by shutdown.
    #[error("scenario execution cancelled")]
    Cancelled,
}

impl From<SlotError> for DispatchError {
    fn from(error: SlotError) -> Self {
        match error {
            SlotError::Script(failure) => Self::ScriptFailure(failure),
            SlotError::Cancelled => Self::Cancelled,
        }
    }
}

/// Invalid simulator configuration.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum ConfigError {
    /// The default scenario name was empty.
    #[error("default scenario name must not be empty")]
    EmptyDefaultScenario,
    /// A timeout was configured as zero.
    #[error("{0} must be greater than zero")]
    ZeroTimeout(&'static str),
    /// The default scenario is not registered with the simulator.
    #[error("default scenario '{0}' is not registered")]
    UnknownDefaultScenario(String),
}
