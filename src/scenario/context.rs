//! Execution context handed to scenario scripts.

use std::{collections::BTreeMap, sync::Arc, time::Duration};

use log::debug;

use crate::{
    correlation::{
        CorrelationBuilder,
        CorrelationCondition,
        CorrelationHandler,
        CorrelationHandlerRegistry,
    },
    endpoint::ScenarioEndpoint,
    error::{CorrelationError, ScenarioError},
    execution::ExecutionId,
    message::Message,
};

/// Variable holding the execution identifier.
pub const EXECUTION_ID_VARIABLE: &str = "scenarioExecutionId";
/// Variable holding the scenario name.
pub const SCENARIO_NAME_VARIABLE: &str = "scenarioName";

/// State and actions available to a running scenario.
///
/// The context owns the scenario's variables and the correlation handlers it
/// started. Handlers still registered when the script ends are removed by the
/// executor, whatever the outcome.
pub struct ScenarioContext {
    execution_id: ExecutionId,
    name: String,
    variables: BTreeMap<String, String>,
    endpoint: Arc<ScenarioEndpoint>,
    correlations: Arc<CorrelationHandlerRegistry>,
    handlers: Vec<Arc<CorrelationHandler>>,
    receive_timeout: Duration,
}

impl ScenarioContext {
    /// Create a context for `execution_id`, pre-populating the well-known
    /// variables.
    #[must_use]
    pub fn new(
        execution_id: ExecutionId,
        name: impl Into<String>,
        endpoint: Arc<ScenarioEndpoint>,
        correlations: Arc<CorrelationHandlerRegistry>,
        receive_timeout: Duration,
    ) -> Self {
        let name = name.into();
        let mut variables = BTreeMap::new();
        variables.insert(EXECUTION_ID_VARIABLE.to_owned(), execution_id.as_u64().to_string());
        variables.insert(SCENARIO_NAME_VARIABLE.to_owned(), name.clone());
        Self {
            execution_id,
            name,
            variables,
            endpoint,
            correlations,
            handlers: Vec::new(),
            receive_timeout,
        }
    }

    /// Identifier of this execution.
    #[must_use]
    pub fn execution_id(&self) -> ExecutionId { self.execution_id }

    /// Scenario name.
    #[must_use]
    pub fn name(&self) -> &str { &self.name }

    /// The endpoint bound to this execution.
    #[must_use]
    pub fn endpoint(&self) -> &Arc<ScenarioEndpoint> { &self.endpoint }

    /// Look up a variable.
    #[must_use]
    pub fn variable(&self, name: &str) -> Option<&str> {
        self.variables.get(name).map(String::as_str)
    }

    /// Set or replace a variable.
    pub fn set_variable(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.variables.insert(name.into(), value.into());
    }

    /// Replace `${name}` placeholders with variable values.
    ///
    /// Unknown placeholders are left untouched.
    #[must_use]
    pub fn resolve(&self, text: &str) -> String {
        let mut out = String::with_capacity(text.len());
        let mut rest = text;
        while let Some(start) = rest.find("${") {
            out.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            match after.find('}') {
                Some(end) => {
                    let key = &after[..end];
                    match self.variables.get(key) {
                        Some(value) => out.push_str(value),
                        None => out.push_str(&rest[start..start + 3 + end]),
                    }
                    rest = &after[end + 1..];
                }
                None => {
                    out.push_str(&rest[start..]);
                    rest = "";
                }
            }
        }
        out.push_str(rest);
        out
    }

    /// Wait for the next message using the configured receive timeout.
    pub async fn receive(&self) -> Option<Message> {
        self.endpoint.receive(self.receive_timeout).await
    }

    /// Wait up to `timeout` for the next message.
    pub async fn receive_timeout(&self, timeout: Duration) -> Option<Message> {
        self.endpoint.receive(timeout).await
    }

    /// Wait for the next message, treating a timeout as a script failure.
    ///
    /// # Errors
    ///
    /// Returns [`ScenarioError::ReceiveTimeout`] if nothing arrives in time.
    pub async fn expect_message(&self) -> Result<Message, ScenarioError> {
        self.receive()
            .await
            .ok_or(ScenarioError::ReceiveTimeout(self.receive_timeout))
    }

    /// Reply to the most recent unanswered request.
    ///
    /// Placeholders in the payload and header values are resolved first.
    ///
    /// # Errors
    ///
    /// Returns [`CorrelationError::NoPendingResponse`] when every request has
    /// already been answered.
    pub fn send(&self, message: Message) -> Result<(), CorrelationError> {
        let message = message.map_text(|text| self.resolve(text));
        self.endpoint.send(message)
    }

    /// Begin building a correlation handler for this execution.
    pub fn correlation(&mut self) -> CorrelationBuilder<'_> { CorrelationBuilder::new(self) }

    pub(crate) fn start_correlation(
        &mut self,
        conditions: Vec<CorrelationCondition>,
    ) -> Arc<CorrelationHandler> {
        let handler = Arc::new(CorrelationHandler::new(
            self.execution_id,
            self.name.clone(),
            Arc::clone(&self.endpoint),
            conditions,
        ));
        self.correlations.register(Arc::clone(&handler));
        self.handlers.push(Arc::clone(&handler));
        handler
    }

    /// Stop routing messages through `handler`.
    pub fn stop_correlation(&mut self, handler: &CorrelationHandler) {
        self.correlations.remove(handler);
        self.handlers.retain(|h| h.id() != handler.id());
    }

    /// Stop every correlation this execution started.
    ///
    /// Returns the number of handlers that were still registered.
    pub fn stop_all_correlations(&mut self) -> usize {
        let handlers = std::mem::take(&mut self.handlers);
        let removed = handlers
            .iter()
            .filter(|handler| self.correlations.remove(handler))
            .count();
        if removed > 0 {
            debug!(
                "correlation stopped: scenario={}, execution={}, handlers={removed}",
                self.name, self.execution_id
            );
        }
        removed
    }

    /// Handlers started by this execution and not yet stopped.
    #[must_use]
    pub fn active_correlations(&self) -> &[Arc<CorrelationHandler>] { &self.handlers }
}

impl std::fmt::Debug for ScenarioContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScenarioContext")
            .field("execution_id", &self.execution_id)
            .field("name", &self.name)
            .field("variables", &self.variables)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use rstest::{fixture, rstest};

    use super::*;
    use crate::endpoint::response_slot;

    #[fixture]
    fn ctx() -> ScenarioContext {
        ScenarioContext::new(
            ExecutionId::from(7),
            "Hello",
            Arc::new(ScenarioEndpoint::new("Hello")),
            Arc::new(CorrelationHandlerRegistry::default()),
            Duration::from_millis(20),
        )
    }

    #[rstest]
    fn well_known_variables_are_bound(ctx: ScenarioContext) {
        assert_eq!(ctx.variable(EXECUTION_ID_VARIABLE), Some("7"));
        assert_eq!(ctx.variable(SCENARIO_NAME_VARIABLE), Some("Hello"));
    }

    #[rstest]
    #[case("id=${scenarioExecutionId}", "id=7")]
    #[case("${missing} stays", "${missing} stays")]
    #[case("${scenarioName}-${scenarioName}", "Hello-Hello")]
    #[case("unterminated ${scenarioName", "unterminated ${scenarioName")]
    #[case("no placeholders", "no placeholders")]
    fn resolves_placeholders(ctx: ScenarioContext, #[case] input: &str, #[case] expected: &str) {
        assert_eq!(ctx.resolve(input), expected);
    }

    #[rstest]
    fn send_resolves_placeholders(ctx: ScenarioContext) {
        let (tx, mut rx) = response_slot();
        ctx.endpoint().add(Message::new("req"), tx);
        let template = Message::new("<Reply id=\"${scenarioExecutionId}\"/>")
            .with_header("who", "${scenarioName}");
        ctx.send(template).expect("pending slot");
        let reply = rx.try_recv().expect("resolved").expect("ok");
        assert_eq!(reply.payload(), "<Reply id=\"7\"/>");
        assert_eq!(reply.header("who"), Some("Hello"));
    }

    #[rstest]
    fn correlation_start_and_stop(mut ctx: ScenarioContext) {
        ctx.set_variable("cid", "123");
        let handler = ctx.correlation().on_header("x-correlationid", "${cid}").start();
        let registry = Arc::clone(&ctx.correlations);
        let tagged = Message::new("").with_header("x-correlationid", "123");
        assert!(registry.find_handler_for(&tagged).is_some());
        assert_eq!(ctx.active_correlations().len(), 1);

        ctx.stop_correlation(&handler);
        assert!(registry.find_handler_for(&tagged).is_none());
        assert_eq!(ctx.stop_all_correlations(), 0);
    }

    #[rstest]
    fn stop_all_correlations_clears_registry(mut ctx: ScenarioContext) {
        let _ = ctx.correlation().on_message_type("A").start();
        let _ = ctx.correlation().on_message_type("B").start();
        assert_eq!(ctx.correlations.len(), 2);
        assert_eq!(ctx.stop_all_correlations(), 2);
        assert!(ctx.correlations.is_empty());
    }

    #[rstest]
    #[tokio::test]
    async fn expect_message_times_out(ctx: ScenarioContext) {
        assert!(matches!(
            ctx.expect_message().await,
            Err(ScenarioError::ReceiveTimeout(_))
        ));
    }
}
