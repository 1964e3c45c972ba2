//! Composition root wiring configuration, scenarios and collaborators.
//!
//! [`Simulator::builder`] collects scenarios, the mapper and optional
//! observers, validates the configuration and assembles a [`Dispatcher`]
//! backed by a [`ScenarioExecutor`].

use std::sync::Arc;

use crate::{
    config::SimulatorConfig,
    correlation::CorrelationHandlerRegistry,
    dispatcher::{Dispatcher, DispatcherParts},
    error::{ConfigError, DispatchError},
    execution::{ExecutionId, ExecutionStore, InMemoryExecutionStore, ScenarioParameters},
    executor::ScenarioExecutor,
    hooks::{DispatchHooks, Listeners, MessageInterceptor, ScenarioListener},
    mapper::{ContentBasedMapper, ScenarioMapper},
    message::Message,
    scenario::{Scenario, ScenarioRegistry},
};

/// Builder for [`Simulator`].
pub struct SimulatorBuilder {
    config: SimulatorConfig,
    scenarios: ScenarioRegistry,
    mapper: Option<Arc<dyn ScenarioMapper>>,
    store: Option<Arc<dyn ExecutionStore>>,
    listeners: Listeners,
    hooks: DispatchHooks,
}

impl Default for SimulatorBuilder {
    fn default() -> Self {
        Self {
            config: SimulatorConfig::default(),
            scenarios: ScenarioRegistry::new(),
            mapper: None,
            store: None,
            listeners: Listeners::default(),
            hooks: DispatchHooks::default(),
        }
    }
}

impl SimulatorBuilder {
    /// Replace the configuration.
    #[must_use]
    pub fn config(mut self, config: SimulatorConfig) -> Self {
        self.config = config;
        self
    }

    /// Register a scenario under `name`.
    #[must_use]
    pub fn scenario(mut self, name: impl Into<String>, scenario: impl Scenario) -> Self {
        self.scenarios.register(name, scenario);
        self
    }

    /// Register an already shared scenario under `name`.
    #[must_use]
    pub fn scenario_arc(mut self, name: impl Into<String>, scenario: Arc<dyn Scenario>) -> Self {
        self.scenarios.register_arc(name, scenario);
        self
    }

    /// Use `mapper` to derive scenario names.
    ///
    /// Without one, a [`ContentBasedMapper`] reading the root element name of
    /// XML payloads is used.
    #[must_use]
    pub fn mapper(mut self, mapper: impl ScenarioMapper + 'static) -> Self {
        self.mapper = Some(Arc::new(mapper));
        self
    }

    /// Record executions in `store` instead of an in-memory store.
    #[must_use]
    pub fn execution_store(mut self, store: Arc<dyn ExecutionStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Add a lifecycle listener.
    #[must_use]
    pub fn listener(mut self, listener: Arc<dyn ScenarioListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    /// Replace the dispatch hooks.
    #[must_use]
    pub fn hooks(mut self, hooks: DispatchHooks) -> Self {
        self.hooks = hooks;
        self
    }

    /// Configure dispatch hooks from an interceptor.
    #[must_use]
    pub fn interceptor<I: MessageInterceptor>(self, interceptor: Arc<I>) -> Self {
        self.hooks(DispatchHooks::from_interceptor(&interceptor))
    }

    /// Validate the configuration and assemble the simulator.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the configuration is invalid or the
    /// default scenario is not registered.
    pub fn build(self) -> Result<Simulator, ConfigError> {
        let Self {
            config,
            scenarios,
            mapper,
            store,
            listeners,
            hooks,
        } = self;
        config.validate()?;
        if !scenarios.contains(&config.default_scenario) {
            return Err(ConfigError::UnknownDefaultScenario(config.default_scenario));
        }

        let executions = Arc::new(InMemoryExecutionStore::new());
        let store = store.unwrap_or_else(|| executions.clone());
        let mapper = mapper
            .unwrap_or_else(|| Arc::new(ContentBasedMapper::new().xpath("local-name(/*)")));
        let correlations = Arc::new(CorrelationHandlerRegistry::with_capacity(
            config.correlation_capacity,
        ));
        let executor = ScenarioExecutor::new(
            config.execution_mode,
            config.executor_threads,
            Arc::clone(&store),
            listeners,
            Arc::clone(&correlations),
            config.receive_timeout,
        );
        let dispatcher = Dispatcher::new(DispatcherParts {
            correlations,
            mapper,
            scenarios: Arc::new(scenarios),
            executor,
            store,
            hooks,
            default_scenario: config.default_scenario.clone(),
            default_timeout: config.default_timeout,
        });
        log::info!(
            "simulator ready: default_scenario={}, mode={:?}, threads={}",
            config.default_scenario,
            config.execution_mode,
            config.executor_threads
        );
        Ok(Simulator {
            config,
            dispatcher,
            executions,
        })
    }
}

/// A configured dispatch engine.
///
/// # Examples
///
/// ```no_run
/// use scenario_simulator::{message::Message, scenario::FnScenario, simulator::Simulator};
///
/// # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
/// let simulator = Simulator::builder()
///     .scenario(
///         "Default",
///         FnScenario::new(|ctx| {
///             Box::pin(async move {
///                 if let Some(request) = ctx.receive().await {
///                     ctx.send(Message::new(request.payload()))?;
///                 }
///                 Ok(())
///             })
///         }),
///     )
///     .build()?;
/// let reply = simulator.dispatch(Message::new("ping")).await?;
/// assert_eq!(reply.map(|m| m.payload().to_owned()).as_deref(), Some("ping"));
/// simulator.shutdown().await;
/// # Ok(())
/// # }
/// ```
pub struct Simulator {
    config: SimulatorConfig,
    dispatcher: Dispatcher,
    executions: Arc<InMemoryExecutionStore>,
}

impl Simulator {
    /// Start building a simulator.
    #[must_use]
    pub fn builder() -> SimulatorBuilder { SimulatorBuilder::default() }

    /// Route `message` and wait for the scripted response.
    ///
    /// # Errors
    ///
    /// See [`Dispatcher::dispatch`].
    pub async fn dispatch(&self, message: Message) -> Result<Option<Message>, DispatchError> {
        self.dispatcher.dispatch(message).await
    }

    /// Start scenario `name` without an inbound message.
    ///
    /// # Errors
    ///
    /// See [`Dispatcher::launch`].
    pub fn launch(
        &self,
        name: &str,
        parameters: ScenarioParameters,
    ) -> Result<ExecutionId, DispatchError> {
        self.dispatcher.launch(name, parameters)
    }

    /// Active configuration.
    #[must_use]
    pub fn config(&self) -> &SimulatorConfig { &self.config }

    /// Live correlation handlers.
    #[must_use]
    pub fn registry(&self) -> &CorrelationHandlerRegistry { self.dispatcher.correlations() }

    /// Registered scenarios.
    #[must_use]
    pub fn scenarios(&self) -> &ScenarioRegistry { self.dispatcher.scenarios() }

    /// Built-in execution history.
    ///
    /// Stays empty when a custom store was supplied through
    /// [`SimulatorBuilder::execution_store`].
    #[must_use]
    pub fn executions(&self) -> &InMemoryExecutionStore { &self.executions }

    /// Number of executions still running.
    #[must_use]
    pub fn in_flight(&self) -> usize { self.dispatcher.executor().in_flight() }

    /// Cancel running executions and wait for them to finish.
    pub async fn shutdown(&self) { self.dispatcher.executor().shutdown().await; }
}
