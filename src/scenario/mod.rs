//! Scenario scripts and their registry.
//!
//! A [`Scenario`] is a named, scripted exchange. Scripts implement a single
//! `run` entry point receiving a [`ScenarioContext`] through which they
//! receive messages, send replies and manage correlation.

mod context;

use std::{collections::BTreeMap, fmt, sync::Arc};

use async_trait::async_trait;
pub use context::{EXECUTION_ID_VARIABLE, SCENARIO_NAME_VARIABLE, ScenarioContext};
use futures::future::BoxFuture;

use crate::{error::ScenarioError, execution::ScenarioParameters};

/// Result returned by scenario scripts.
pub type ScenarioResult = Result<(), ScenarioError>;

/// Scripted behaviour of a simulated backend interaction.
///
/// # Examples
///
/// ```
/// use async_trait::async_trait;
/// use scenario_simulator::{
///     error::ScenarioError,
///     message::Message,
///     scenario::{Scenario, ScenarioContext},
/// };
///
/// struct Hello;
///
/// #[async_trait]
/// impl Scenario for Hello {
///     async fn run(&self, ctx: &mut ScenarioContext) -> Result<(), ScenarioError> {
///         if ctx.receive().await.is_some() {
///             ctx.send(Message::new("<HelloResponse/>"))?;
///         }
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait Scenario: Send + Sync + 'static {
    /// Execute the script.
    async fn run(&self, ctx: &mut ScenarioContext) -> ScenarioResult;

    /// Parameters bound as variables before each run.
    fn parameters(&self) -> ScenarioParameters { ScenarioParameters::new() }
}

/// Boxed script function used by [`FnScenario`].
pub type ScenarioFn =
    dyn for<'a> Fn(&'a mut ScenarioContext) -> BoxFuture<'a, ScenarioResult> + Send + Sync;

/// Adapter turning a closure into a [`Scenario`].
///
/// ```
/// use scenario_simulator::{message::Message, scenario::FnScenario};
///
/// let echo = FnScenario::new(|ctx| {
///     Box::pin(async move {
///         if let Some(request) = ctx.receive().await {
///             ctx.send(Message::new(request.payload()))?;
///         }
///         Ok(())
///     })
/// });
/// # let _ = echo;
/// ```
#[derive(Clone)]
pub struct FnScenario(Arc<ScenarioFn>);

impl FnScenario {
    /// Wrap `script` as a scenario.
    pub fn new<F>(script: F) -> Self
    where
        F: for<'a> Fn(&'a mut ScenarioContext) -> BoxFuture<'a, ScenarioResult>
            + Send
            + Sync
            + 'static,
    {
        Self(Arc::new(script))
    }
}

#[async_trait]
impl Scenario for FnScenario {
    async fn run(&self, ctx: &mut ScenarioContext) -> ScenarioResult { (self.0)(ctx).await }
}

/// Named scenarios known to the simulator.
#[derive(Clone, Default)]
pub struct ScenarioRegistry {
    scenarios: BTreeMap<String, Arc<dyn Scenario>>,
}

impl ScenarioRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Register `scenario` under `name`, replacing any previous entry.
    pub fn register(&mut self, name: impl Into<String>, scenario: impl Scenario) {
        self.register_arc(name, Arc::new(scenario));
    }

    /// Register an already shared scenario.
    pub fn register_arc(&mut self, name: impl Into<String>, scenario: Arc<dyn Scenario>) {
        self.scenarios.insert(name.into(), scenario);
    }

    /// Look up a scenario.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<dyn Scenario>> { self.scenarios.get(name).cloned() }

    /// Whether `name` is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool { self.scenarios.contains_key(name) }

    /// Registered names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> { self.scenarios.keys().map(String::as_str) }

    /// Number of registered scenarios.
    #[must_use]
    pub fn len(&self) -> usize { self.scenarios.len() }

    /// Whether no scenario is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool { self.scenarios.is_empty() }
}

impl fmt::Debug for ScenarioRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.scenarios.keys()).finish()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use rstest::rstest;

    use super::*;
    use crate::{
        correlation::CorrelationHandlerRegistry,
        endpoint::{ScenarioEndpoint, response_slot},
        execution::ExecutionId,
        message::Message,
    };

    #[rstest]
    fn registry_replaces_by_name() {
        let mut registry = ScenarioRegistry::new();
        registry.register("Hello", FnScenario::new(|_| Box::pin(async { Ok(()) })));
        registry.register("Hello", FnScenario::new(|_| Box::pin(async { Ok(()) })));
        registry.register("Default", FnScenario::new(|_| Box::pin(async { Ok(()) })));
        assert_eq!(registry.len(), 2);
        assert!(registry.contains("Hello"));
        assert_eq!(registry.names().collect::<Vec<_>>(), ["Default", "Hello"]);
    }

    #[rstest]
    #[tokio::test]
    async fn fn_scenario_runs_closure() {
        let echo = FnScenario::new(|ctx| {
            Box::pin(async move {
                let request = ctx.expect_message().await?;
                ctx.send(Message::new(format!("echo:{}", request.payload())))?;
                Ok(())
            })
        });
        let endpoint = Arc::new(ScenarioEndpoint::new("Echo"));
        let (tx, rx) = response_slot();
        endpoint.add(Message::new("ping"), tx);
        let mut ctx = ScenarioContext::new(
            ExecutionId::from(1),
            "Echo",
            Arc::clone(&endpoint),
            Arc::new(CorrelationHandlerRegistry::default()),
            Duration::from_millis(50),
        );
        echo.run(&mut ctx).await.expect("script succeeds");
        let reply = rx.await.expect("resolved").expect("ok");
        assert_eq!(reply.payload(), "echo:ping");
    }
}
