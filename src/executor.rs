//! Scheduling and supervision of scenario scripts.
//!
//! [`ScenarioExecutor`] runs scripts on tracked background tasks gated by a
//! semaphore: one permit in [`ExecutionMode::Sync`], so scripts run one at a
//! time system-wide, and `threads` permits in [`ExecutionMode::Async`]. The
//! caller never owns the script's future, so dropping a dispatch cannot skip
//! supervision. Errors and panics are converted into a failed response slot so
//! a waiting dispatcher is always released, lifecycle notifications fire
//! exactly once, and correlation handlers the script started are removed.

use std::{any::Any, panic::AssertUnwindSafe, sync::Arc, time::Duration};

use futures::FutureExt;
use log::{error, info, warn};
use tokio::sync::Semaphore;
use tokio_util::{sync::CancellationToken, task::TaskTracker};

use crate::{
    config::ExecutionMode,
    correlation::CorrelationHandlerRegistry,
    endpoint::ScenarioEndpoint,
    error::ScriptFailure,
    execution::{ExecutionId, ExecutionStore, ScenarioParameters},
    hooks::Listeners,
    metrics,
    scenario::{Scenario, ScenarioContext},
};

/// Everything needed to run one execution.
pub struct Execution {
    /// Identifier obtained from the execution store.
    pub id: ExecutionId,
    /// Scenario name.
    pub name: String,
    /// Script to run.
    pub scenario: Arc<dyn Scenario>,
    /// Parameters bound as variables.
    pub parameters: ScenarioParameters,
    /// Mailbox bound to the execution.
    pub endpoint: Arc<ScenarioEndpoint>,
}

enum Outcome {
    Success,
    Failed(String),
    Cancelled,
}

struct Shared {
    permits: Semaphore,
    shutdown: CancellationToken,
    store: Arc<dyn ExecutionStore>,
    listeners: Listeners,
    correlations: Arc<CorrelationHandlerRegistry>,
    receive_timeout: Duration,
}

/// Runs scenario scripts under the configured [`ExecutionMode`].
#[derive(Clone)]
pub struct ScenarioExecutor {
    mode: ExecutionMode,
    tracker: TaskTracker,
    shared: Arc<Shared>,
}

/// Render a panic payload for logging and failure reports.
fn panic_reason(panic: &(dyn Any + Send)) -> String {
    let message = panic
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("<non-string panic>");
    format!("script panicked: {message}")
}

impl ScenarioExecutor {
    /// Create an executor.
    ///
    /// `threads` bounds concurrently running scripts in asynchronous mode and
    /// is ignored in synchronous mode, which always runs one at a time.
    #[must_use]
    pub fn new(
        mode: ExecutionMode,
        threads: usize,
        store: Arc<dyn ExecutionStore>,
        listeners: Listeners,
        correlations: Arc<CorrelationHandlerRegistry>,
        receive_timeout: Duration,
    ) -> Self {
        let permits = match mode {
            ExecutionMode::Sync => 1,
            ExecutionMode::Async => threads.max(1),
        };
        Self {
            mode,
            tracker: TaskTracker::new(),
            shared: Arc::new(Shared {
                permits: Semaphore::new(permits),
                shutdown: CancellationToken::new(),
                store,
                listeners,
                correlations,
                receive_timeout,
            }),
        }
    }

    /// Execution discipline in use.
    #[must_use]
    pub fn mode(&self) -> ExecutionMode { self.mode }

    /// Whether [`shutdown`](Self::shutdown) has been requested.
    #[must_use]
    pub fn is_shut_down(&self) -> bool { self.shared.shutdown.is_cancelled() }

    /// Number of executions still tracked.
    #[must_use]
    pub fn in_flight(&self) -> usize { self.tracker.len() }

    /// Start `execution`.
    ///
    /// Returns as soon as the script is submitted; it runs once a permit is
    /// free. After shutdown the execution is refused and its pending
    /// responses are cancelled.
    pub fn start(&self, execution: Execution) {
        if self.is_shut_down() {
            warn!(
                "scenario refused after shutdown: scenario={}, execution={}",
                execution.name, execution.id
            );
            self.shared
                .store
                .fail(execution.id, "executor shut down");
            execution.endpoint.cancel_pending();
            return;
        }
        metrics::inc_scenarios_started();
        self.tracker
            .spawn(supervise(Arc::clone(&self.shared), execution));
    }

    /// Cancel in-flight executions and wait for their tasks to finish.
    pub async fn shutdown(&self) {
        self.shared.shutdown.cancel();
        self.tracker.close();
        self.tracker.wait().await;
        info!("scenario executor shut down");
    }
}

async fn supervise(shared: Arc<Shared>, execution: Execution) {
    let Execution {
        id,
        name,
        scenario,
        parameters,
        endpoint,
    } = execution;

    let permit = tokio::select! {
        biased;
        () = shared.shutdown.cancelled() => None,
        permit = shared.permits.acquire() => permit.ok(),
    };
    let Some(_permit) = permit else {
        shared.store.fail(id, "executor shut down");
        endpoint.cancel_pending();
        return;
    };

    shared.listeners.start(id, &name);
    tracing::debug!(scenario = %name, execution = %id, "scenario started");

    let mut ctx = ScenarioContext::new(
        id,
        name.clone(),
        Arc::clone(&endpoint),
        Arc::clone(&shared.correlations),
        shared.receive_timeout,
    );
    for (key, value) in parameters {
        ctx.set_variable(key, value);
    }

    let outcome = tokio::select! {
        biased;
        () = shared.shutdown.cancelled() => Outcome::Cancelled,
        result = AssertUnwindSafe(scenario.run(&mut ctx)).catch_unwind() => match result {
            Ok(Ok(())) => Outcome::Success,
            Ok(Err(e)) => Outcome::Failed(e.to_string()),
            Err(panic) => Outcome::Failed(panic_reason(panic.as_ref())),
        },
    };
    ctx.stop_all_correlations();
    drop(ctx);

    match outcome {
        Outcome::Success => {
            shared.store.complete(id);
            shared.listeners.success(id, &name);
        }
        Outcome::Failed(reason) => {
            error!("scenario failed: scenario={name}, execution={id}, reason={reason}");
            metrics::inc_script_failures();
            let failure = ScriptFailure {
                scenario: name.clone(),
                execution_id: id,
                reason,
            };
            shared.store.fail(id, &failure.reason);
            shared.listeners.failure(id, &failure);
            if endpoint.fail(failure).is_err() {
                warn!("scenario failure had no pending request: scenario={name}, execution={id}");
            }
        }
        Outcome::Cancelled => {
            let released = endpoint.cancel_pending();
            warn!("scenario cancelled: scenario={name}, execution={id}, released={released}");
            let failure = ScriptFailure {
                scenario: name.clone(),
                execution_id: id,
                reason: "cancelled by shutdown".to_owned(),
            };
            shared.store.fail(id, &failure.reason);
            shared.listeners.failure(id, &failure);
        }
    }
    shared.listeners.finish(id, &name);
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use rstest::rstest;
    use tokio::time::timeout;

    use super::*;
    use crate::{
        endpoint::response_slot,
        error::{ScenarioError, SlotError},
        execution::{ExecutionStatus, InMemoryExecutionStore},
        message::Message,
        scenario::FnScenario,
    };

    struct Panicking;

    #[async_trait::async_trait]
    impl Scenario for Panicking {
        async fn run(&self, _ctx: &mut ScenarioContext) -> crate::scenario::ScenarioResult {
            panic!("kaboom")
        }
    }

    struct Harness {
        executor: ScenarioExecutor,
        store: Arc<InMemoryExecutionStore>,
        correlations: Arc<CorrelationHandlerRegistry>,
    }

    fn harness(mode: ExecutionMode, threads: usize) -> Harness {
        let store = Arc::new(InMemoryExecutionStore::new());
        let correlations = Arc::new(CorrelationHandlerRegistry::default());
        let executor = ScenarioExecutor::new(
            mode,
            threads,
            store.clone(),
            Listeners::default(),
            Arc::clone(&correlations),
            Duration::from_millis(100),
        );
        Harness {
            executor,
            store,
            correlations,
        }
    }

    fn execution(
        h: &Harness,
        scenario: impl Scenario,
        parameters: ScenarioParameters,
    ) -> (Execution, crate::endpoint::ResponseSlot) {
        let id = h.store.create_execution("Test", &parameters);
        let endpoint = Arc::new(ScenarioEndpoint::new("Test"));
        let (tx, rx) = response_slot();
        endpoint.add(Message::new("request"), tx);
        (
            Execution {
                id,
                name: "Test".into(),
                scenario: Arc::new(scenario),
                parameters,
                endpoint,
            },
            rx,
        )
    }

    #[rstest]
    #[case(ExecutionMode::Sync)]
    #[case(ExecutionMode::Async)]
    #[tokio::test]
    async fn binds_parameters_and_execution_id(#[case] mode: ExecutionMode) {
        let h = harness(mode, 2);
        let scenario = FnScenario::new(|ctx| {
            Box::pin(async move {
                ctx.expect_message().await?;
                ctx.send(Message::new("${greeting} from ${scenarioExecutionId}"))?;
                Ok(())
            })
        });
        let params = vec![("greeting".to_owned(), "hi".to_owned())];
        let (exec, rx) = execution(&h, scenario, params);
        let id = exec.id;
        h.executor.start(exec);
        let reply = timeout(Duration::from_secs(1), rx)
            .await
            .expect("reply in time")
            .expect("slot resolved")
            .expect("success");
        assert_eq!(reply.payload(), format!("hi from {}", id.as_u64()));
        h.executor.shutdown().await;
        assert_eq!(h.store.get(id).expect("record").status, ExecutionStatus::Success);
    }

    #[rstest]
    #[tokio::test]
    async fn script_error_fails_pending_slot() {
        let h = harness(ExecutionMode::Async, 1);
        let scenario = FnScenario::new(|_| {
            Box::pin(async { Err(ScenarioError::assertion("unexpected payload")) })
        });
        let (exec, rx) = execution(&h, scenario, Vec::new());
        h.executor.start(exec);
        let outcome = timeout(Duration::from_secs(1), rx)
            .await
            .expect("released in time")
            .expect("slot resolved");
        match outcome {
            Err(SlotError::Script(failure)) => {
                assert!(failure.reason.contains("unexpected payload"));
            }
            other => panic!("expected script failure, got {other:?}"),
        }
        h.executor.shutdown().await;
    }

    #[rstest]
    #[tokio::test]
    async fn panic_fails_pending_slot() {
        let h = harness(ExecutionMode::Async, 1);
        let (exec, rx) = execution(&h, Panicking, Vec::new());
        let id = exec.id;
        h.executor.start(exec);
        let outcome = timeout(Duration::from_secs(1), rx)
            .await
            .expect("released in time")
            .expect("slot resolved");
        assert!(matches!(outcome, Err(SlotError::Script(ref f)) if f.reason.contains("kaboom")));
        h.executor.shutdown().await;
        assert!(matches!(
            h.store.get(id).expect("record").status,
            ExecutionStatus::Failed(_)
        ));
    }

    #[rstest]
    #[tokio::test]
    async fn correlations_are_stopped_after_failure() {
        let h = harness(ExecutionMode::Sync, 1);
        let scenario = FnScenario::new(|ctx| {
            Box::pin(async move {
                let _ = ctx.correlation().on_header("session", "s1").start();
                Err(ScenarioError::assertion("fail after correlating"))
            })
        });
        let (exec, rx) = execution(&h, scenario, Vec::new());
        h.executor.start(exec);
        let outcome = timeout(Duration::from_secs(1), rx)
            .await
            .expect("released in time")
            .expect("slot resolved");
        assert!(outcome.is_err());
        assert!(h.correlations.is_empty());
        h.executor.shutdown().await;
    }

    #[rstest]
    #[tokio::test]
    async fn shutdown_cancels_in_flight_scripts() {
        let h = harness(ExecutionMode::Async, 1);
        let scenario = FnScenario::new(|_| {
            Box::pin(async {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(())
            })
        });
        let (exec, rx) = execution(&h, scenario, Vec::new());
        h.executor.start(exec);
        tokio::task::yield_now().await;
        timeout(Duration::from_secs(1), h.executor.shutdown())
            .await
            .expect("shutdown completes");
        assert_eq!(h.executor.in_flight(), 0);
        assert_eq!(rx.await.expect("slot resolved"), Err(SlotError::Cancelled));
    }

    #[rstest]
    #[tokio::test]
    async fn start_after_shutdown_is_refused() {
        let h = harness(ExecutionMode::Async, 1);
        h.executor.shutdown().await;
        let (exec, rx) = execution(&h, FnScenario::new(|_| Box::pin(async { Ok(()) })), Vec::new());
        h.executor.start(exec);
        assert_eq!(rx.await.expect("slot resolved"), Err(SlotError::Cancelled));
    }

    #[rstest]
    #[tokio::test]
    async fn async_pool_bounds_concurrency() {
        let h = harness(ExecutionMode::Async, 2);
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let mut slots = Vec::new();
        for _ in 0..6 {
            let running = Arc::clone(&running);
            let peak = Arc::clone(&peak);
            let scenario = FnScenario::new(move |ctx| {
                let running = Arc::clone(&running);
                let peak = Arc::clone(&peak);
                Box::pin(async move {
                    let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    running.fetch_sub(1, Ordering::SeqCst);
                    ctx.send(Message::new("done"))?;
                    Ok(())
                })
            });
            let (exec, rx) = execution(&h, scenario, Vec::new());
            h.executor.start(exec);
            slots.push(rx);
        }
        for rx in slots {
            timeout(Duration::from_secs(2), rx)
                .await
                .expect("completes")
                .expect("resolved")
                .expect("success");
        }
        assert!(peak.load(Ordering::SeqCst) <= 2);
        h.executor.shutdown().await;
    }
}
