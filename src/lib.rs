#![doc(html_root_url = "https://docs.rs/scenario-simulator/latest")]
//! Public API for the `scenario-simulator` library.
//!
//! This crate provides the request correlation and dispatch engine of a
//! scenario-driven backend simulator. Transport adapters hand inbound
//! messages to a [`Simulator`]; the engine either routes them to a running
//! scenario that claimed them through correlation or starts a new scenario
//! chosen by a [`ScenarioMapper`](mapper::ScenarioMapper), and waits for the
//! scripted reply.

pub mod config;
pub mod correlation;
pub mod dispatcher;
pub mod endpoint;
pub mod error;
pub mod execution;
pub mod executor;
pub mod hooks;
pub mod mapper;
pub mod message;
pub mod metrics;
pub mod scenario;
pub mod simulator;

pub use config::{ExecutionMode, SimulatorConfig};
pub use correlation::{CorrelationHandler, CorrelationHandlerRegistry};
pub use dispatcher::Dispatcher;
pub use endpoint::ScenarioEndpoint;
pub use error::{ConfigError, CorrelationError, DispatchError, ScenarioError, ScriptFailure};
pub use execution::{ExecutionId, ExecutionStore, InMemoryExecutionStore};
pub use hooks::{DispatchHooks, MessageInterceptor, ScenarioListener};
pub use mapper::{ContentBasedMapper, KeyExpression, ScenarioMapper};
pub use message::Message;
pub use self::metrics::{
    CORRELATION_HANDLERS_ACTIVE,
    DISPATCH_TIMEOUTS,
    MESSAGES_DISPATCHED,
    SCENARIOS_STARTED,
    SCRIPT_FAILURES,
};
pub use scenario::{FnScenario, Scenario, ScenarioContext};
pub use simulator::{Simulator, SimulatorBuilder};
