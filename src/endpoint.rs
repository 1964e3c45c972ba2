//! Per-execution mailbox connecting the dispatcher to a running scenario.
//!
//! A [`ScenarioEndpoint`] pairs an unbounded inbox of inbound messages with a
//! stack of response slots. Every [`add`](ScenarioEndpoint::add) pushes one of
//! each; every [`send`](ScenarioEndpoint::send) or
//! [`fail`](ScenarioEndpoint::fail) pops the most recent slot. Replies are
//! therefore paired with requests in LIFO order, which keeps nested
//! challenge/response exchanges inside one scenario correctly matched.

use std::{
    sync::{Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use log::debug;
use tokio::sync::{Mutex as AsyncMutex, mpsc, oneshot};

use crate::{
    error::{CorrelationError, SlotError},
    message::Message,
};

/// Outcome carried by a response slot.
pub type SlotResult = Result<Message, SlotError>;

/// Producer half of a response slot, held by the endpoint.
pub type ResponseSender = oneshot::Sender<SlotResult>;

/// Consumer half of a response slot, awaited by the dispatcher.
pub type ResponseSlot = oneshot::Receiver<SlotResult>;

/// Create a fresh single-assignment response slot.
#[must_use]
pub fn response_slot() -> (ResponseSender, ResponseSlot) { oneshot::channel() }

/// Mailbox bound to one scenario execution.
pub struct ScenarioEndpoint {
    name: String,
    inbox_tx: mpsc::UnboundedSender<Message>,
    inbox_rx: AsyncMutex<mpsc::UnboundedReceiver<Message>>,
    pending: Mutex<Vec<ResponseSender>>,
}

impl ScenarioEndpoint {
    /// Create an endpoint labelled with the scenario name for diagnostics.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        let (inbox_tx, inbox_rx) = mpsc::unbounded_channel();
        Self {
            name: name.into(),
            inbox_tx,
            inbox_rx: AsyncMutex::new(inbox_rx),
            pending: Mutex::new(Vec::new()),
        }
    }

    /// Name of the scenario this endpoint belongs to.
    #[must_use]
    pub fn name(&self) -> &str { &self.name }

    fn pending(&self) -> MutexGuard<'_, Vec<ResponseSender>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Enqueue `message` and push its response slot.
    ///
    /// Never blocks. The slot and message are pushed under one lock so
    /// concurrent producers keep the inbox and the slot stack aligned.
    pub fn add(&self, message: Message, slot: ResponseSender) {
        let mut pending = self.pending();
        pending.push(slot);
        // The receiver lives as long as `self`, so the send cannot fail.
        let _ = self.inbox_tx.send(message);
    }

    /// Wait up to `timeout` for the next inbound message.
    ///
    /// Returns `None` when nothing arrives in time; scripts treat that as
    /// "no further intervening messages".
    pub async fn receive(&self, timeout: Duration) -> Option<Message> {
        tokio::time::timeout(timeout, async {
            let mut inbox = self.inbox_rx.lock().await;
            inbox.recv().await
        })
        .await
        .ok()
        .flatten()
    }

    /// Resolve the most recently pushed slot with `message`.
    ///
    /// # Errors
    ///
    /// Returns [`CorrelationError::NoPendingResponse`] if no slot is pending.
    pub fn send(&self, message: Message) -> Result<(), CorrelationError> {
        self.resolve(Ok(message))
    }

    /// Resolve the most recently pushed slot with a failure.
    ///
    /// # Errors
    ///
    /// Returns [`CorrelationError::NoPendingResponse`] if no slot is pending.
    pub fn fail(&self, cause: impl Into<SlotError>) -> Result<(), CorrelationError> {
        self.resolve(Err(cause.into()))
    }

    fn resolve(&self, outcome: SlotResult) -> Result<(), CorrelationError> {
        let slot = self
            .pending()
            .pop()
            .ok_or(CorrelationError::NoPendingResponse)?;
        if slot.send(outcome).is_err() {
            debug!(
                "response discarded: scenario={}, reason=dispatcher no longer waiting",
                self.name
            );
        }
        Ok(())
    }

    /// Fail every pending slot with [`SlotError::Cancelled`].
    ///
    /// Returns the number of slots released.
    pub fn cancel_pending(&self) -> usize {
        let slots = std::mem::take(&mut *self.pending());
        let count = slots.len();
        for slot in slots {
            let _ = slot.send(Err(SlotError::Cancelled));
        }
        count
    }

    /// Number of requests still awaiting a reply.
    #[must_use]
    pub fn pending_responses(&self) -> usize { self.pending().len() }
}

impl std::fmt::Debug for ScenarioEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScenarioEndpoint")
            .field("name", &self.name)
            .field("pending_responses", &self.pending_responses())
            .finish_non_exhaustive()
    }
}
