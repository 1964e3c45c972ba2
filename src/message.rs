//! Message model shared by every transport and the dispatch engine.
//!
//! A [`Message`] is deliberately transport-agnostic: an identifier, a set of
//! string headers and a textual payload. Adapters for HTTP, JMS or SOAP map
//! their native representation onto this shape before calling
//! [`Dispatcher::dispatch`](crate::dispatcher::Dispatcher::dispatch).

use std::{
    collections::BTreeMap,
    sync::atomic::{AtomicU64, Ordering},
};

use serde::{Deserialize, Serialize};

/// Header carrying the logical message type used by message-type correlation.
pub const MESSAGE_TYPE_HEADER: &str = "message_type";
/// Header carrying an operation identifier (SOAP action, HTTP operation id).
pub const OPERATION_HEADER: &str = "operation";

static NEXT_MESSAGE_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identifier assigned to a message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MessageId(u64);

impl MessageId {
    /// Allocate the next identifier.
    #[must_use]
    pub fn next() -> Self { Self(NEXT_MESSAGE_ID.fetch_add(1, Ordering::Relaxed)) }

    /// Return the inner `u64` representation.
    #[must_use]
    pub fn as_u64(&self) -> u64 { self.0 }
}

impl From<u64> for MessageId {
    fn from(value: u64) -> Self { Self(value) }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "MessageId({})", self.0)
    }
}

fn fresh_id() -> MessageId { MessageId::next() }

/// Inbound or outbound simulator message.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    #[serde(default = "fresh_id")]
    id: MessageId,
    #[serde(default)]
    headers: BTreeMap<String, String>,
    #[serde(default)]
    payload: String,
}

impl Message {
    /// Create a message with a fresh identifier and no headers.
    ///
    /// ```
    /// use scenario_simulator::message::Message;
    ///
    /// let msg = Message::new("<Hello/>").with_header("x-correlationid", "123");
    /// assert_eq!(msg.payload(), "<Hello/>");
    /// assert_eq!(msg.header("x-correlationid"), Some("123"));
    /// ```
    #[must_use]
    pub fn new(payload: impl Into<String>) -> Self {
        Self {
            id: MessageId::next(),
            headers: BTreeMap::new(),
            payload: payload.into(),
        }
    }

    /// Add or replace a header.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Set the [`MESSAGE_TYPE_HEADER`].
    #[must_use]
    pub fn with_message_type(self, message_type: impl Into<String>) -> Self {
        self.with_header(MESSAGE_TYPE_HEADER, message_type)
    }

    /// Message identifier.
    #[must_use]
    pub fn id(&self) -> MessageId { self.id }

    /// Look up a header value.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> { self.headers.get(name).map(String::as_str) }

    /// All headers in name order.
    #[must_use]
    pub fn headers(&self) -> &BTreeMap<String, String> { &self.headers }

    /// Message payload.
    #[must_use]
    pub fn payload(&self) -> &str { &self.payload }

    /// Value of the [`MESSAGE_TYPE_HEADER`], if present.
    #[must_use]
    pub fn message_type(&self) -> Option<&str> { self.header(MESSAGE_TYPE_HEADER) }

    pub(crate) fn map_text(self, mut f: impl FnMut(&str) -> String) -> Self {
        let headers = self
            .headers
            .into_iter()
            .map(|(name, value)| {
                let value = f(&value);
                (name, value)
            })
            .collect();
        Self {
            id: self.id,
            headers,
            payload: f(&self.payload),
        }
    }
}
