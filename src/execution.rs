//! Execution identifiers and the execution-history collaborator.
//!
//! The dispatcher obtains an [`ExecutionId`] from an [`ExecutionStore`] before
//! a scenario starts, because scripts may reference it as a correlation
//! variable. Durable persistence lives outside this crate; the
//! [`InMemoryExecutionStore`] is the default used by tests and the demo binary.

use std::{
    sync::atomic::{AtomicU64, Ordering},
    time::SystemTime,
};

use dashmap::DashMap;

/// Identifier of one scenario execution.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExecutionId(u64);

impl From<u64> for ExecutionId {
    fn from(value: u64) -> Self { Self(value) }
}

impl ExecutionId {
    /// Return the inner `u64` representation.
    #[must_use]
    pub fn as_u64(&self) -> u64 { self.0 }
}

impl std::fmt::Display for ExecutionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ExecutionId({})", self.0)
    }
}

/// Ordered `(name, value)` pairs bound as scenario variables.
pub type ScenarioParameters = Vec<(String, String)>;

/// Terminal or running state of an execution.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ExecutionStatus {
    /// The script is still running.
    Running,
    /// The script returned successfully.
    Success,
    /// The script failed; the rendered cause is kept.
    Failed(String),
}

/// Snapshot of one execution kept by [`InMemoryExecutionStore`].
#[derive(Clone, Debug)]
pub struct ExecutionRecord {
    /// Scenario name.
    pub name: String,
    /// Parameters bound at start.
    pub parameters: ScenarioParameters,
    /// Current status.
    pub status: ExecutionStatus,
    /// Wall-clock start time.
    pub started_at: SystemTime,
    /// Wall-clock end time once finished.
    pub ended_at: Option<SystemTime>,
}

/// Collaborator creating and finalising execution records.
pub trait ExecutionStore: Send + Sync + 'static {
    /// Record a new execution and return its identifier.
    fn create_execution(&self, name: &str, parameters: &ScenarioParameters) -> ExecutionId;

    /// Mark an execution as successfully completed.
    fn complete(&self, _id: ExecutionId) {}

    /// Mark an execution as failed.
    fn fail(&self, _id: ExecutionId, _reason: &str) {}
}

/// Execution store keeping records in memory.
#[derive(Debug, Default)]
pub struct InMemoryExecutionStore {
    next_id: AtomicU64,
    records: DashMap<ExecutionId, ExecutionRecord>,
}

impl InMemoryExecutionStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Return a snapshot of the record for `id`.
    #[must_use]
    pub fn get(&self, id: ExecutionId) -> Option<ExecutionRecord> {
        self.records.get(&id).map(|entry| entry.value().clone())
    }

    /// Number of executions recorded.
    #[must_use]
    pub fn len(&self) -> usize { self.records.len() }

    /// Whether no execution has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool { self.records.is_empty() }

    /// Count executions of `name`.
    #[must_use]
    pub fn count_for(&self, name: &str) -> usize {
        self.records
            .iter()
            .filter(|entry| entry.value().name == name)
            .count()
    }

    fn finish(&self, id: ExecutionId, status: ExecutionStatus) {
        if let Some(mut record) = self.records.get_mut(&id) {
            record.status = status;
            record.ended_at = Some(SystemTime::now());
        }
    }
}

impl ExecutionStore for InMemoryExecutionStore {
    fn create_execution(&self, name: &str, parameters: &ScenarioParameters) -> ExecutionId {
        let id = ExecutionId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        self.records.insert(
            id,
            ExecutionRecord {
                name: name.to_owned(),
                parameters: parameters.clone(),
                status: ExecutionStatus::Running,
                started_at: SystemTime::now(),
                ended_at: None,
            },
        );
        id
    }

    fn complete(&self, id: ExecutionId) { self.finish(id, ExecutionStatus::Success); }

    fn fail(&self, id: ExecutionId, reason: &str) {
        self.finish(id, ExecutionStatus::Failed(reason.to_owned()));
    }
}
