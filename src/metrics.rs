//! Metric helpers for the dispatch engine.
//!
//! This module defines metric names and simple helper functions wrapping the
//! [`metrics`](https://docs.rs/metrics) crate. Without the `metrics` feature
//! every helper is a no-op.

#[cfg(feature = "metrics")]
use metrics::{counter, gauge};

/// Counter of dispatched inbound messages, labelled by route.
pub const MESSAGES_DISPATCHED: &str = "simulator_messages_dispatched_total";
/// Counter of scenario executions started.
pub const SCENARIOS_STARTED: &str = "simulator_scenarios_started_total";
/// Counter of dispatches that ended without a response in time.
pub const DISPATCH_TIMEOUTS: &str = "simulator_dispatch_timeouts_total";
/// Counter of failed scenario scripts.
pub const SCRIPT_FAILURES: &str = "simulator_script_failures_total";
/// Gauge tracking live correlation handlers.
pub const CORRELATION_HANDLERS_ACTIVE: &str = "simulator_correlation_handlers_active";

/// How an inbound message reached its scenario.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Route {
    /// Claimed by a running execution's correlation handler.
    Correlated,
    /// Mapped to a newly started execution.
    Mapped,
}

impl Route {
    #[cfg_attr(not(feature = "metrics"), allow(dead_code))]
    fn as_str(self) -> &'static str {
        match self {
            Route::Correlated => "correlated",
            Route::Mapped => "mapped",
        }
    }
}

/// Record a dispatched message.
pub fn inc_dispatched(route: Route) {
    #[cfg(feature = "metrics")]
    counter!(MESSAGES_DISPATCHED, "route" => route.as_str()).increment(1);
    #[cfg(not(feature = "metrics"))]
    let _ = route;
}

/// Record a started scenario execution.
pub fn inc_scenarios_started() {
    #[cfg(feature = "metrics")]
    counter!(SCENARIOS_STARTED).increment(1);
}

/// Record a dispatch timeout.
pub fn inc_timeouts() {
    #[cfg(feature = "metrics")]
    counter!(DISPATCH_TIMEOUTS).increment(1);
}

/// Record a script failure.
pub fn inc_script_failures() {
    #[cfg(feature = "metrics")]
    counter!(SCRIPT_FAILURES).increment(1);
}

/// Publish the number of live correlation handlers.
#[cfg_attr(
    feature = "metrics",
    expect(clippy::cast_precision_loss, reason = "handler counts are far below 2^52")
)]
pub fn set_correlation_handlers(count: usize) {
    #[cfg(feature = "metrics")]
    gauge!(CORRELATION_HANDLERS_ACTIVE).set(count as f64);
    #[cfg(not(feature = "metrics"))]
    let _ = count;
}
