//! Tests for the recording listener.

use scenario_simulator::{ExecutionId, ScenarioListener, ScriptFailure};
use simulator_testing::{LifecycleEvent, RecordingListener};

#[test]
fn records_events_per_execution() {
    let listener = RecordingListener::new();
    let a = ExecutionId::from(1);
    let b = ExecutionId::from(2);
    listener.on_start(a, "A");
    listener.on_start(b, "B");
    listener.on_failure(
        b,
        &ScriptFailure {
            scenario: "B".into(),
            execution_id: b,
            reason: "boom".into(),
        },
    );
    listener.on_finish(b, "B");

    assert_eq!(
        listener.events_for(b),
        [
            LifecycleEvent::Start(b),
            LifecycleEvent::Failure(b, "boom".into()),
            LifecycleEvent::Finish(b),
        ]
    );
    assert_eq!(listener.events_for(a), [LifecycleEvent::Start(a)]);
    assert_eq!(listener.finished(), 1);
}
