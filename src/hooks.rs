//! Explicit observation points for dispatch and scenario lifecycles.
//!
//! [`ScenarioListener`] receives execution lifecycle notifications from the
//! executor. [`DispatchHooks`] stores optional callbacks the dispatcher runs
//! around each inbound message, while [`MessageInterceptor`] exposes the
//! trait applications implement to configure those callbacks in one place.

use std::sync::Arc;

use crate::{error::ScriptFailure, execution::ExecutionId, message::Message};

/// Receives lifecycle notifications for scenario executions.
///
/// For each execution `on_start` fires first, then exactly one of
/// `on_success` or `on_failure`, then `on_finish`.
pub trait ScenarioListener: Send + Sync + 'static {
    /// The script is about to run.
    fn on_start(&self, _execution_id: ExecutionId, _scenario: &str) {}

    /// The script returned successfully.
    fn on_success(&self, _execution_id: ExecutionId, _scenario: &str) {}

    /// The script failed, panicked or was cancelled.
    fn on_failure(&self, _execution_id: ExecutionId, _failure: &ScriptFailure) {}

    /// The execution is over, whatever the outcome.
    fn on_finish(&self, _execution_id: ExecutionId, _scenario: &str) {}
}

/// Ordered collection of listeners notified in registration order.
#[derive(Clone, Default)]
pub struct Listeners(Vec<Arc<dyn ScenarioListener>>);

impl Listeners {
    /// Append a listener.
    pub fn push(&mut self, listener: Arc<dyn ScenarioListener>) { self.0.push(listener); }

    /// Number of listeners.
    #[must_use]
    pub fn len(&self) -> usize { self.0.len() }

    /// Whether no listener is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool { self.0.is_empty() }

    pub(crate) fn start(&self, id: ExecutionId, scenario: &str) {
        self.0.iter().for_each(|l| l.on_start(id, scenario));
    }

    pub(crate) fn success(&self, id: ExecutionId, scenario: &str) {
        self.0.iter().for_each(|l| l.on_success(id, scenario));
    }

    pub(crate) fn failure(&self, id: ExecutionId, failure: &ScriptFailure) {
        self.0.iter().for_each(|l| l.on_failure(id, failure));
    }

    pub(crate) fn finish(&self, id: ExecutionId, scenario: &str) {
        self.0.iter().for_each(|l| l.on_finish(id, scenario));
    }
}

/// Trait bundling the dispatcher callbacks.
pub trait MessageInterceptor: Send + Sync + 'static {
    /// Invoked for every inbound message before routing.
    fn on_inbound(&self, _message: &Message) {}

    /// Invoked for every response returned to a transport.
    fn on_outbound(&self, _request: &Message, _response: &Message) {}

    /// Invoked when no response arrived in time.
    fn on_timeout(&self, _request: &Message) {}
}

/// Type alias for the `on_inbound` callback.
type InboundHook = Box<dyn Fn(&Message) + Send + Sync + 'static>;

/// Type alias for the `on_outbound` callback.
type OutboundHook = Box<dyn Fn(&Message, &Message) + Send + Sync + 'static>;

/// Type alias for the `on_timeout` callback.
type TimeoutHook = Box<dyn Fn(&Message) + Send + Sync + 'static>;

/// Callbacks run by the dispatcher.
#[derive(Default)]
pub struct DispatchHooks {
    /// Invoked when a message arrives.
    pub on_inbound: Option<InboundHook>,
    /// Invoked when a response is returned.
    pub on_outbound: Option<OutboundHook>,
    /// Invoked when a dispatch times out.
    pub on_timeout: Option<TimeoutHook>,
}

impl DispatchHooks {
    /// Run the `on_inbound` hook if registered.
    pub fn on_inbound(&self, message: &Message) {
        if let Some(hook) = &self.on_inbound {
            hook(message);
        }
    }

    /// Run the `on_outbound` hook if registered.
    pub fn on_outbound(&self, request: &Message, response: &Message) {
        if let Some(hook) = &self.on_outbound {
            hook(request, response);
        }
    }

    /// Run the `on_timeout` hook if registered.
    pub fn on_timeout(&self, request: &Message) {
        if let Some(hook) = &self.on_timeout {
            hook(request);
        }
    }

    /// Construct hooks from a [`MessageInterceptor`] implementation.
    pub fn from_interceptor<I>(interceptor: &Arc<I>) -> Self
    where
        I: MessageInterceptor + ?Sized,
    {
        let inbound = Arc::clone(interceptor);
        let outbound = Arc::clone(interceptor);
        let timeout = Arc::clone(interceptor);
        Self {
            on_inbound: Some(Box::new(move |m: &Message| inbound.on_inbound(m))),
            on_outbound: Some(Box::new(move |req: &Message, resp: &Message| {
                outbound.on_outbound(req, resp);
            })),
            on_timeout: Some(Box::new(move |m: &Message| timeout.on_timeout(m))),
        }
    }
}
