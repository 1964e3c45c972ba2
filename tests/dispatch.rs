//! End-to-end tests for message dispatch through a [`Simulator`].

use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::{Duration, Instant},
};

use rstest::rstest;
use scenario_simulator::{
    DispatchError,
    ExecutionMode,
    FnScenario,
    Message,
    Simulator,
    SimulatorConfig,
    execution::ExecutionStatus,
};
use simulator_testing::{
    CountingScenario,
    EchoScenario,
    FailingScenario,
    PanickingScenario,
    SilentScenario,
};

fn config(timeout: Duration) -> SimulatorConfig {
    SimulatorConfig::default()
        .default_timeout(timeout)
        .receive_timeout(Duration::from_secs(1))
}

#[rstest]
#[tokio::test]
async fn xml_root_selects_scenario() {
    let simulator = Simulator::builder()
        .scenario("Default", EchoScenario::with_prefix("default:"))
        .scenario("Hello", EchoScenario::with_prefix("hello:"))
        .build()
        .expect("valid simulator");

    let hello = simulator
        .dispatch(Message::new("<Hello/>"))
        .await
        .expect("dispatch succeeds")
        .expect("reply");
    let other = simulator
        .dispatch(Message::new("<Goodbye/>"))
        .await
        .expect("dispatch succeeds")
        .expect("reply");

    assert_eq!(hello.payload(), "hello:<Hello/>");
    assert_eq!(other.payload(), "default:<Goodbye/>");
    simulator.shutdown().await;
}

#[rstest]
#[case(ExecutionMode::Sync)]
#[case(ExecutionMode::Async)]
#[tokio::test]
async fn silent_scenario_times_out_with_no_response(#[case] mode: ExecutionMode) {
    let simulator = Simulator::builder()
        .config(config(Duration::from_millis(50)).execution_mode(mode))
        .scenario("Default", SilentScenario::default())
        .build()
        .expect("valid simulator");

    let started = Instant::now();
    let reply = simulator
        .dispatch(Message::new("<Anything/>"))
        .await
        .expect("a timeout is not an error");

    assert!(reply.is_none());
    assert!(started.elapsed() < Duration::from_secs(2));
    simulator.shutdown().await;
}

#[rstest]
#[tokio::test]
async fn script_finishing_without_reply_returns_none_early() {
    let simulator = Simulator::builder()
        .config(config(Duration::from_secs(5)))
        .scenario(
            "Default",
            SilentScenario {
                linger: Duration::ZERO,
            },
        )
        .build()
        .expect("valid simulator");

    let started = Instant::now();
    let reply = simulator
        .dispatch(Message::new("ping"))
        .await
        .expect("dispatch succeeds");

    assert!(reply.is_none());
    assert!(started.elapsed() < Duration::from_secs(2));
    simulator.shutdown().await;
}

#[rstest]
#[case::error(false)]
#[case::panic(true)]
#[tokio::test]
async fn script_failure_is_reported_before_timeout(#[case] panics: bool) {
    let builder = Simulator::builder().config(config(Duration::from_secs(5)));
    let simulator = if panics {
        builder.scenario("Default", PanickingScenario)
    } else {
        builder.scenario("Default", FailingScenario::new("bad request"))
    }
    .build()
    .expect("valid simulator");

    let started = Instant::now();
    let err = simulator
        .dispatch(Message::new("ping"))
        .await
        .expect_err("script failure propagates");

    assert!(started.elapsed() < Duration::from_secs(2));
    match err {
        DispatchError::ScriptFailure(failure) => {
            assert_eq!(failure.scenario, "Default");
            let expected = if panics { "scenario blew up" } else { "bad request" };
            assert!(failure.reason.contains(expected), "{}", failure.reason);
        }
        other => panic!("expected a script failure, got {other:?}"),
    }
    simulator.shutdown().await;
}

#[rstest]
#[tokio::test]
async fn concurrent_dispatches_start_one_execution_each() {
    let counting = CountingScenario::new();
    let runs = counting.runs();
    let simulator = Arc::new(
        Simulator::builder()
            .config(config(Duration::from_secs(2)).executor_threads(4))
            .scenario("Default", counting)
            .build()
            .expect("valid simulator"),
    );

    let tasks: Vec<_> = (0..16)
        .map(|i| {
            let simulator = Arc::clone(&simulator);
            tokio::spawn(async move { simulator.dispatch(Message::new(format!("m{i}"))).await })
        })
        .collect();
    for (i, task) in tasks.into_iter().enumerate() {
        let reply = task
            .await
            .expect("task joins")
            .expect("dispatch succeeds")
            .expect("reply");
        assert_eq!(reply.payload(), format!("m{i}"));
    }

    simulator.shutdown().await;
    assert_eq!(runs.load(Ordering::SeqCst), 16);
    assert_eq!(simulator.executions().count_for("Default"), 16);
}

#[rstest]
#[tokio::test]
async fn sync_mode_runs_one_script_at_a_time() {
    let running = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));
    let scenario = {
        let running = Arc::clone(&running);
        let peak = Arc::clone(&peak);
        FnScenario::new(move |ctx| {
            let running = Arc::clone(&running);
            let peak = Arc::clone(&peak);
            Box::pin(async move {
                let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                let request = ctx.expect_message().await?;
                tokio::time::sleep(Duration::from_millis(20)).await;
                running.fetch_sub(1, Ordering::SeqCst);
                ctx.send(Message::new(request.payload()))?;
                Ok(())
            })
        })
    };
    let simulator = Simulator::builder()
        .config(config(Duration::from_secs(2)).execution_mode(ExecutionMode::Sync))
        .scenario("Default", scenario)
        .build()
        .expect("valid simulator");

    let (a, b, c) = tokio::join!(
        simulator.dispatch(Message::new("a")),
        simulator.dispatch(Message::new("b")),
        simulator.dispatch(Message::new("c")),
    );

    for (reply, expected) in [(a, "a"), (b, "b"), (c, "c")] {
        let reply = reply.expect("dispatch succeeds").expect("reply");
        assert_eq!(reply.payload(), expected);
    }
    assert_eq!(peak.load(Ordering::SeqCst), 1);
    simulator.shutdown().await;
}

#[rstest]
#[tokio::test]
async fn execution_history_tracks_outcomes() {
    let simulator = Simulator::builder()
        .scenario("Default", EchoScenario::default())
        .scenario("Broken", FailingScenario::new("nope"))
        .build()
        .expect("valid simulator");

    simulator
        .dispatch(Message::new("<Ping/>"))
        .await
        .expect("dispatch succeeds");
    simulator
        .dispatch(Message::new("<Broken/>"))
        .await
        .expect_err("script fails");
    simulator.shutdown().await;

    let executions = simulator.executions();
    assert_eq!(executions.len(), 2);
    let statuses: Vec<_> = (1..=2_u64)
        .filter_map(|i| executions.get(i.into()))
        .map(|record| (record.name, record.status))
        .collect();
    assert!(statuses.contains(&("Default".to_owned(), ExecutionStatus::Success)));
    assert!(
        statuses
            .iter()
            .any(|(name, status)| name == "Broken" && matches!(status, ExecutionStatus::Failed(_)))
    );
}

#[rstest]
#[tokio::test]
async fn shutdown_cancels_waiting_dispatch() {
    let simulator = Arc::new(
        Simulator::builder()
            .config(config(Duration::from_secs(30)))
            .scenario("Default", SilentScenario::default())
            .build()
            .expect("valid simulator"),
    );

    let pending = {
        let simulator = Arc::clone(&simulator);
        tokio::spawn(async move { simulator.dispatch(Message::new("ping")).await })
    };
    while simulator.executions().is_empty() {
        tokio::task::yield_now().await;
    }
    simulator.shutdown().await;

    let outcome = tokio::time::timeout(Duration::from_secs(1), pending)
        .await
        .expect("dispatch released")
        .expect("task joins");
    assert_eq!(outcome, Err(DispatchError::Cancelled));
}
