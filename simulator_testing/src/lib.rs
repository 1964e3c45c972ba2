//! Test helpers for the scenario simulator.
//!
//! Provides a serialised log capture fixture, a lifecycle-recording
//! listener and a handful of canned scenarios covering the success, silence,
//! failure and panic paths of a dispatch.
//!
//! ```rust
//! use scenario_simulator::{Message, Simulator};
//! use simulator_testing::EchoScenario;
//!
//! # async fn example() {
//! let simulator = Simulator::builder()
//!     .scenario("Default", EchoScenario::default())
//!     .build()
//!     .expect("valid simulator");
//! let reply = simulator.dispatch(Message::new("ping")).await.expect("dispatch");
//! assert_eq!(reply.expect("reply").payload(), "ping");
//! # }
//! ```

pub mod listener;
pub mod logging;
pub mod scenarios;

pub use listener::{LifecycleEvent, RecordingListener};
pub use logging::{LoggerHandle, logger};
pub use scenarios::{
    CountingScenario,
    EchoScenario,
    FailingScenario,
    PanickingScenario,
    SilentScenario,
};
