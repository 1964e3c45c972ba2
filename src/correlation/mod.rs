//! Routing of follow-up messages to running scenario executions.
//!
//! A [`CorrelationHandler`] claims inbound messages that satisfy all of its
//! [`CorrelationCondition`]s on behalf of one execution's
//! [`ScenarioEndpoint`]. Handlers live in a [`CorrelationHandlerRegistry`]
//! that the dispatcher consults before mapping a message to a new scenario.

mod builder;
mod registry;

use std::{
    fmt,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

pub use builder::CorrelationBuilder;
pub use registry::{CorrelationHandlerRegistry, DEFAULT_CORRELATION_CAPACITY};

use crate::{
    endpoint::ScenarioEndpoint,
    execution::ExecutionId,
    mapper::KeyExpression,
    message::Message,
};

static NEXT_HANDLER_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of a registered handler.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandlerId(u64);

impl HandlerId {
    fn next() -> Self { Self(NEXT_HANDLER_ID.fetch_add(1, Ordering::Relaxed)) }

    /// Return the inner `u64` representation.
    #[must_use]
    pub fn as_u64(&self) -> u64 { self.0 }
}

impl fmt::Display for HandlerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "HandlerId({})", self.0) }
}

/// A single matching rule. Values are fully resolved when the handler starts.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CorrelationCondition {
    /// Header `name` equals `value`.
    Header {
        /// Header name.
        name: String,
        /// Expected value.
        value: String,
    },
    /// Payload expression evaluates to `value`.
    Payload {
        /// Expression evaluated against the payload.
        expression: KeyExpression,
        /// Expected value.
        value: String,
    },
    /// The message type header equals the value.
    MessageType(String),
}

impl CorrelationCondition {
    /// Whether `message` satisfies this condition.
    ///
    /// Payload extraction failures count as a mismatch.
    #[must_use]
    pub fn matches(&self, message: &Message) -> bool {
        match self {
            Self::Header { name, value } => message.header(name) == Some(value.as_str()),
            Self::MessageType(value) => message.message_type() == Some(value.as_str()),
            Self::Payload { expression, value } => {
                matches!(expression.evaluate(message), Ok(Some(found)) if found == *value)
            }
        }
    }
}

impl fmt::Display for CorrelationCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Header { name, value } => write!(f, "header {name}={value}"),
            Self::Payload { expression, value } => write!(f, "{expression}={value}"),
            Self::MessageType(value) => write!(f, "message_type={value}"),
        }
    }
}

/// Active rule routing matching messages to one running execution.
pub struct CorrelationHandler {
    id: HandlerId,
    execution_id: ExecutionId,
    scenario: String,
    endpoint: Arc<ScenarioEndpoint>,
    conditions: Vec<CorrelationCondition>,
}

impl CorrelationHandler {
    /// Create a handler owned by `execution_id`.
    ///
    /// A handler without conditions never matches.
    #[must_use]
    pub fn new(
        execution_id: ExecutionId,
        scenario: impl Into<String>,
        endpoint: Arc<ScenarioEndpoint>,
        conditions: Vec<CorrelationCondition>,
    ) -> Self {
        Self {
            id: HandlerId::next(),
            execution_id,
            scenario: scenario.into(),
            endpoint,
            conditions,
        }
    }

    /// Handler identity.
    #[must_use]
    pub fn id(&self) -> HandlerId { self.id }

    /// Owning execution.
    #[must_use]
    pub fn execution_id(&self) -> ExecutionId { self.execution_id }

    /// Name of the owning scenario.
    #[must_use]
    pub fn scenario(&self) -> &str { &self.scenario }

    /// Endpoint receiving correlated messages.
    #[must_use]
    pub fn endpoint(&self) -> &Arc<ScenarioEndpoint> { &self.endpoint }

    /// Conditions that must all hold.
    #[must_use]
    pub fn conditions(&self) -> &[CorrelationCondition] { &self.conditions }

    /// Whether `message` belongs to this handler's execution.
    #[must_use]
    pub fn is_handler_for(&self, message: &Message) -> bool {
        !self.conditions.is_empty() && self.conditions.iter().all(|c| c.matches(message))
    }
}

impl fmt::Debug for CorrelationHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CorrelationHandler")
            .field("id", &self.id)
            .field("execution_id", &self.execution_id)
            .field("scenario", &self.scenario)
            .field("conditions", &self.conditions)
            .finish_non_exhaustive()
    }
}
