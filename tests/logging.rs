//! Log output emitted while dispatching.

use log::Level;
use rstest::rstest;
use scenario_simulator::{Message, Simulator};
use serial_test::serial;
use simulator_testing::{EchoScenario, LoggerHandle, logger};

#[rstest]
#[serial]
#[tokio::test]
async fn unknown_key_falls_back_to_default_with_info_log(mut logger: LoggerHandle) {
    let simulator = Simulator::builder()
        .scenario("Default", EchoScenario::with_prefix("default:"))
        .build()
        .expect("valid simulator");
    logger.clear();

    let reply = simulator
        .dispatch(Message::new("<Hello/>"))
        .await
        .expect("dispatch succeeds")
        .expect("default replies");
    simulator.shutdown().await;

    assert_eq!(reply.payload(), "default:<Hello/>");
    let infos = logger.drain_at(Level::Info);
    assert!(
        infos
            .iter()
            .any(|m| m.contains("using default") && m.contains("key=Hello")),
        "{infos:?}"
    );
}

#[rstest]
#[serial]
#[tokio::test]
async fn registered_key_starts_without_fallback_log(mut logger: LoggerHandle) {
    let simulator = Simulator::builder()
        .scenario("Default", EchoScenario::default())
        .scenario("Hello", EchoScenario::with_prefix("hello:"))
        .build()
        .expect("valid simulator");
    logger.clear();

    let reply = simulator
        .dispatch(Message::new("<Hello/>"))
        .await
        .expect("dispatch succeeds")
        .expect("hello replies");
    simulator.shutdown().await;

    assert_eq!(reply.payload(), "hello:<Hello/>");
    let infos = logger.drain_at(Level::Info);
    assert!(!infos.iter().any(|m| m.contains("using default")), "{infos:?}");
}

#[rstest]
#[serial]
#[tokio::test]
async fn script_failure_is_logged_as_error(mut logger: LoggerHandle) {
    let simulator = Simulator::builder()
        .scenario("Default", simulator_testing::FailingScenario::new("bad input"))
        .build()
        .expect("valid simulator");
    logger.clear();

    simulator
        .dispatch(Message::new("x"))
        .await
        .expect_err("script fails");
    simulator.shutdown().await;

    let errors = logger.drain_at(Level::Error);
    assert!(
        errors
            .iter()
            .any(|m| m.contains("scenario failed") && m.contains("bad input")),
        "{errors:?}"
    );
}
