//! Listener recording lifecycle notifications for later assertions.

use std::sync::{Mutex, PoisonError};

use scenario_simulator::{ExecutionId, ScenarioListener, ScriptFailure};

/// One observed lifecycle notification.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// `on_start`
    Start(ExecutionId),
    /// `on_success`
    Success(ExecutionId),
    /// `on_failure` with the rendered reason.
    Failure(ExecutionId, String),
    /// `on_finish`
    Finish(ExecutionId),
}

impl LifecycleEvent {
    /// Execution the event belongs to.
    pub fn execution_id(&self) -> ExecutionId {
        match self {
            Self::Start(id) | Self::Success(id) | Self::Failure(id, _) | Self::Finish(id) => *id,
        }
    }
}

/// [`ScenarioListener`] appending every notification to a list.
#[derive(Debug, Default)]
pub struct RecordingListener {
    events: Mutex<Vec<LifecycleEvent>>,
}

impl RecordingListener {
    /// Create an empty recorder.
    pub fn new() -> Self { Self::default() }

    /// Snapshot of all events in arrival order.
    pub fn events(&self) -> Vec<LifecycleEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Events recorded for one execution.
    pub fn events_for(&self, id: ExecutionId) -> Vec<LifecycleEvent> {
        self.events()
            .into_iter()
            .filter(|event| event.execution_id() == id)
            .collect()
    }

    /// Number of finished executions.
    pub fn finished(&self) -> usize {
        self.events()
            .iter()
            .filter(|event| matches!(event, LifecycleEvent::Finish(_)))
            .count()
    }

    fn push(&self, event: LifecycleEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }
}

impl ScenarioListener for RecordingListener {
    fn on_start(&self, execution_id: ExecutionId, _scenario: &str) {
        self.push(LifecycleEvent::Start(execution_id));
    }

    fn on_success(&self, execution_id: ExecutionId, _scenario: &str) {
        self.push(LifecycleEvent::Success(execution_id));
    }

    fn on_failure(&self, execution_id: ExecutionId, failure: &ScriptFailure) {
        self.push(LifecycleEvent::Failure(execution_id, failure.reason.clone()));
    }

    fn on_finish(&self, execution_id: ExecutionId, _scenario: &str) {
        self.push(LifecycleEvent::Finish(execution_id));
    }
}
