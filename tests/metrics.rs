#![cfg(feature = "metrics")]
//! Tests for the simulator metrics helpers.
//!
//! These tests verify that counters and gauges update as expected using
//! `metrics_util::debugging::DebuggingRecorder`.

use std::time::Duration;

use metrics_util::debugging::{DebugValue, DebuggingRecorder, Snapshotter};
use rstest::rstest;
use scenario_simulator::{
    Message,
    Simulator,
    SimulatorConfig,
    metrics::{self as sim_metrics, Route},
};
use simulator_testing::{EchoScenario, SilentScenario};

/// Creates a debugging recorder and snapshotter for metrics testing.
fn debugging_recorder_setup() -> (Snapshotter, DebuggingRecorder) {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    (snapshotter, recorder)
}

fn counter(snapshotter: &Snapshotter, name: &str, label: Option<(&str, &str)>) -> u64 {
    snapshotter
        .snapshot()
        .into_vec()
        .into_iter()
        .filter(|(k, _, _, _)| {
            k.key().name() == name
                && label.is_none_or(|(key, value)| {
                    k.key().labels().any(|l| l.key() == key && l.value() == value)
                })
        })
        .map(|(_, _, _, v)| match v {
            DebugValue::Counter(c) => c,
            _ => 0,
        })
        .sum()
}

#[rstest]
#[case(Route::Mapped, "mapped")]
#[case(Route::Correlated, "correlated")]
fn dispatched_counter_is_labelled_by_route(#[case] route: Route, #[case] label: &str) {
    let (snapshotter, recorder) = debugging_recorder_setup();
    metrics::with_local_recorder(&recorder, || sim_metrics::inc_dispatched(route));
    assert_eq!(
        counter(&snapshotter, sim_metrics::MESSAGES_DISPATCHED, Some(("route", label))),
        1
    );
}

#[test]
fn correlation_gauge_reports_live_handlers() {
    let (snapshotter, recorder) = debugging_recorder_setup();
    metrics::with_local_recorder(&recorder, || sim_metrics::set_correlation_handlers(3));
    let found = snapshotter.snapshot().into_vec().into_iter().any(|(k, _, _, v)| {
        k.key().name() == sim_metrics::CORRELATION_HANDLERS_ACTIVE
            && matches!(v, DebugValue::Gauge(g) if g.into_inner() == 3.0)
    });
    assert!(found, "correlation gauge not recorded");
}

#[rstest]
#[tokio::test]
async fn dispatch_records_starts_and_timeouts() {
    let (snapshotter, recorder) = debugging_recorder_setup();
    let _guard = metrics::set_default_local_recorder(&recorder);

    let simulator = Simulator::builder()
        .config(SimulatorConfig::default().default_timeout(Duration::from_millis(50)))
        .scenario("Default", EchoScenario::default())
        .scenario("Quiet", SilentScenario::default())
        .build()
        .expect("valid simulator");
    simulator
        .dispatch(Message::new("<Ping/>"))
        .await
        .expect("dispatch succeeds");
    simulator
        .dispatch(Message::new("<Quiet/>"))
        .await
        .expect("timeout is not an error");
    simulator.shutdown().await;

    assert_eq!(
        counter(&snapshotter, sim_metrics::MESSAGES_DISPATCHED, Some(("route", "mapped"))),
        2
    );
    assert_eq!(counter(&snapshotter, sim_metrics::SCENARIOS_STARTED, None), 2);
    assert_eq!(counter(&snapshotter, sim_metrics::DISPATCH_TIMEOUTS, None), 1);
}
