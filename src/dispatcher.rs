//! Entry point every transport adapter calls with an inbound message.
//!
//! For each message the [`Dispatcher`] runs a small state machine:
//!
//! 1. **Correlate**: ask the [`CorrelationHandlerRegistry`] whether a running
//!    execution claims the message; if so, hand it to that execution's
//!    endpoint.
//! 2. **Map**: otherwise derive a scenario name with the [`ScenarioMapper`],
//!    falling back to the configured default scenario.
//! 3. **Start**: create an execution, push the message onto a fresh
//!    [`ScenarioEndpoint`] and start the script.
//! 4. **Await**: wait for the response slot up to the default timeout.
//!
//! A timeout is a valid outcome reported as `Ok(None)`; the transport decides
//! whether that means sending nothing or an empty acknowledgement.

use std::{sync::Arc, time::Duration};

use log::{debug, error, info, warn};
use tokio::time::timeout;

use crate::{
    correlation::CorrelationHandlerRegistry,
    endpoint::{ResponseSlot, ScenarioEndpoint, response_slot},
    error::DispatchError,
    execution::{ExecutionId, ExecutionStore, ScenarioParameters},
    executor::{Execution, ScenarioExecutor},
    hooks::DispatchHooks,
    mapper::ScenarioMapper,
    message::Message,
    metrics::{self, Route},
    scenario::ScenarioRegistry,
};

/// Routes inbound messages to scenario executions and awaits their replies.
pub struct Dispatcher {
    correlations: Arc<CorrelationHandlerRegistry>,
    mapper: Arc<dyn ScenarioMapper>,
    scenarios: Arc<ScenarioRegistry>,
    executor: ScenarioExecutor,
    store: Arc<dyn ExecutionStore>,
    hooks: DispatchHooks,
    default_scenario: String,
    default_timeout: Duration,
}

/// Collaborators a [`Dispatcher`] is assembled from.
pub struct DispatcherParts {
    /// Live correlation handlers.
    pub correlations: Arc<CorrelationHandlerRegistry>,
    /// Scenario name extraction.
    pub mapper: Arc<dyn ScenarioMapper>,
    /// Known scenarios.
    pub scenarios: Arc<ScenarioRegistry>,
    /// Script executor.
    pub executor: ScenarioExecutor,
    /// Execution-history collaborator.
    pub store: Arc<dyn ExecutionStore>,
    /// Observation callbacks.
    pub hooks: DispatchHooks,
    /// Fallback scenario name.
    pub default_scenario: String,
    /// Response timeout.
    pub default_timeout: Duration,
}

impl Dispatcher {
    /// Assemble a dispatcher from its collaborators.
    #[must_use]
    pub fn new(parts: DispatcherParts) -> Self {
        let DispatcherParts {
            correlations,
            mapper,
            scenarios,
            executor,
            store,
            hooks,
            default_scenario,
            default_timeout,
        } = parts;
        Self {
            correlations,
            mapper,
            scenarios,
            executor,
            store,
            hooks,
            default_scenario,
            default_timeout,
        }
    }

    /// Route `message` to a scenario and wait for its response.
    ///
    /// Returns `Ok(None)` when the scenario does not reply within the default
    /// timeout or finishes without replying.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::MappingMiss`] if neither the mapped nor the
    /// default scenario is registered, [`DispatchError::ScriptFailure`] if the
    /// script failed before replying and [`DispatchError::Cancelled`] if the
    /// execution was interrupted by shutdown.
    pub async fn dispatch(&self, message: Message) -> Result<Option<Message>, DispatchError> {
        self.hooks.on_inbound(&message);
        let request = message.clone();
        let (tx, slot) = response_slot();

        if let Some(handler) = self.correlations.find_handler_for(&message) {
            debug!(
                "message correlated: message_id={}, scenario={}, execution={}",
                message.id(),
                handler.scenario(),
                handler.execution_id()
            );
            metrics::inc_dispatched(Route::Correlated);
            handler.endpoint().add(message, tx);
        } else {
            let name = self.select_scenario(&message)?;
            metrics::inc_dispatched(Route::Mapped);
            self.start(name, ScenarioParameters::new(), Some((message, tx)))?;
        }

        self.await_response(&request, slot).await
    }

    /// Start scenario `name` without an inbound message.
    ///
    /// `parameters` override the scenario's own parameters of the same name.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::MappingMiss`] if `name` is not registered.
    pub fn launch(
        &self,
        name: &str,
        parameters: ScenarioParameters,
    ) -> Result<ExecutionId, DispatchError> {
        if !self.scenarios.contains(name) {
            return Err(DispatchError::MappingMiss {
                scenario: name.to_owned(),
            });
        }
        self.start(name.to_owned(), parameters, None)
    }

    fn select_scenario(&self, message: &Message) -> Result<String, DispatchError> {
        match self.mapper.extract_key(message) {
            Some(key) if self.scenarios.contains(&key) => return Ok(key),
            Some(key) => info!(
                "no scenario registered for key, using default: key={key}, default={}, \
                 message_id={}",
                self.default_scenario,
                message.id()
            ),
            None => info!(
                "no scenario key extracted, using default: default={}, message_id={}",
                self.default_scenario,
                message.id()
            ),
        }
        if self.scenarios.contains(&self.default_scenario) {
            Ok(self.default_scenario.clone())
        } else {
            error!(
                "default scenario is not registered: default={}",
                self.default_scenario
            );
            Err(DispatchError::MappingMiss {
                scenario: self.default_scenario.clone(),
            })
        }
    }

    fn start(
        &self,
        name: String,
        overrides: ScenarioParameters,
        first: Option<(Message, crate::endpoint::ResponseSender)>,
    ) -> Result<ExecutionId, DispatchError> {
        let scenario = self
            .scenarios
            .get(&name)
            .ok_or_else(|| DispatchError::MappingMiss {
                scenario: name.clone(),
            })?;
        let mut parameters = scenario.parameters();
        for (key, value) in overrides {
            match parameters.iter_mut().find(|(k, _)| *k == key) {
                Some(existing) => existing.1 = value,
                None => parameters.push((key, value)),
            }
        }

        let id = self.store.create_execution(&name, &parameters);
        let endpoint = Arc::new(ScenarioEndpoint::new(name.clone()));
        if let Some((message, tx)) = first {
            endpoint.add(message, tx);
        }
        tracing::info!(scenario = %name, execution = %id, "starting scenario");
        self.executor
            .start(Execution {
                id,
                name,
                scenario,
                parameters,
                endpoint,
            });
        Ok(id)
    }

    async fn await_response(
        &self,
        request: &Message,
        slot: ResponseSlot,
    ) -> Result<Option<Message>, DispatchError> {
        match timeout(self.default_timeout, slot).await {
            Ok(Ok(Ok(response))) => {
                self.hooks.on_outbound(request, &response);
                Ok(Some(response))
            }
            Ok(Ok(Err(failure))) => Err(failure.into()),
            Ok(Err(_)) => {
                debug!(
                    "scenario finished without responding: message_id={}",
                    request.id()
                );
                Ok(None)
            }
            Err(_) => {
                warn!(
                    "no response within timeout: message_id={}, timeout={:?}",
                    request.id(),
                    self.default_timeout
                );
                metrics::inc_timeouts();
                self.hooks.on_timeout(request);
                Ok(None)
            }
        }
    }

    /// Live correlation handlers.
    #[must_use]
    pub fn correlations(&self) -> &Arc<CorrelationHandlerRegistry> { &self.correlations }

    /// Known scenarios.
    #[must_use]
    pub fn scenarios(&self) -> &Arc<ScenarioRegistry> { &self.scenarios }

    /// The executor running scripts.
    #[must_use]
    pub fn executor(&self) -> &ScenarioExecutor { &self.executor }
}
