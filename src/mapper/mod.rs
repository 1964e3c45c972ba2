//! Content-based mapping of inbound messages to scenario names.
//!
//! A [`ScenarioMapper`] derives a scenario name from a message. The
//! [`ContentBasedMapper`] evaluates an ordered list of [`KeyExpression`]s and
//! returns the first non-empty value accepted by its [`KeyFilter`]. Extraction
//! errors never escape a mapper: a malformed payload simply yields no key so
//! the dispatcher can fall back to the default scenario.

mod json_path;
mod xpath;

use std::{collections::BTreeSet, fmt, sync::Arc};

use log::debug;
use thiserror::Error;

use crate::message::{Message, OPERATION_HEADER};

/// Failure evaluating a [`KeyExpression`].
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ExtractError {
    /// The expression uses syntax outside the supported subset.
    #[error("unsupported expression: {0}")]
    UnsupportedExpression(String),
    /// The payload is not well-formed XML.
    #[error("malformed XML payload: {0}")]
    Xml(String),
    /// The payload is not valid JSON.
    #[error("malformed JSON payload: {0}")]
    Json(#[from] serde_json::Error),
}

/// Expression selecting a value from a message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum KeyExpression {
    /// Value of the named header.
    Header(String),
    /// XPath expression evaluated against the payload.
    XPath(String),
    /// JSONPath expression evaluated against the payload.
    JsonPath(String),
    /// Value of the [`OPERATION_HEADER`].
    Operation,
}

impl KeyExpression {
    /// Evaluate the expression against `message`.
    ///
    /// # Errors
    ///
    /// Returns an [`ExtractError`] when the payload cannot be parsed or the
    /// expression is outside the supported subset.
    pub fn evaluate(&self, message: &Message) -> Result<Option<String>, ExtractError> {
        match self {
            Self::Header(name) => Ok(message.header(name).map(str::to_owned)),
            Self::Operation => Ok(message.header(OPERATION_HEADER).map(str::to_owned)),
            Self::XPath(expr) => xpath::evaluate(expr, message.payload()),
            Self::JsonPath(expr) => json_path::evaluate(expr, message.payload()),
        }
    }
}

impl fmt::Display for KeyExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Header(name) => write!(f, "header:{name}"),
            Self::XPath(expr) => write!(f, "xpath:{expr}"),
            Self::JsonPath(expr) => write!(f, "jsonpath:{expr}"),
            Self::Operation => f.write_str("operation"),
        }
    }
}

/// Maps an inbound message to a scenario name.
pub trait ScenarioMapper: Send + Sync + 'static {
    /// Extract a scenario name, or `None` when no expression applies.
    fn extract_key(&self, message: &Message) -> Option<String>;
}

impl<F> ScenarioMapper for F
where
    F: Fn(&Message) -> Option<String> + Send + Sync + 'static,
{
    fn extract_key(&self, message: &Message) -> Option<String> { self(message) }
}

/// Predicate deciding whether an extracted key is acceptable.
pub type KeyPredicate = dyn Fn(&str) -> bool + Send + Sync;

/// Filter applied to extracted keys.
#[derive(Clone, Default)]
pub enum KeyFilter {
    /// Accept any non-empty key.
    #[default]
    Any,
    /// Accept only keys from the given set.
    Names(BTreeSet<String>),
    /// Accept keys for which the predicate holds.
    Predicate(Arc<KeyPredicate>),
}

impl KeyFilter {
    fn accepts(&self, key: &str) -> bool {
        match self {
            Self::Any => true,
            Self::Names(names) => names.contains(key),
            Self::Predicate(predicate) => predicate(key),
        }
    }
}

impl fmt::Debug for KeyFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => f.write_str("Any"),
            Self::Names(names) => f.debug_tuple("Names").field(names).finish(),
            Self::Predicate(_) => f.write_str("Predicate(..)"),
        }
    }
}

/// Mapper evaluating expressions in configured order.
///
/// ```
/// use scenario_simulator::{mapper::{ContentBasedMapper, ScenarioMapper}, message::Message};
///
/// let mapper = ContentBasedMapper::new().xpath("local-name(/*)");
/// assert_eq!(mapper.extract_key(&Message::new("<Hello/>")).as_deref(), Some("Hello"));
/// assert_eq!(mapper.extract_key(&Message::new("{not xml")), None);
/// ```
#[derive(Clone, Debug, Default)]
pub struct ContentBasedMapper {
    expressions: Vec<KeyExpression>,
    filter: KeyFilter,
}

impl ContentBasedMapper {
    /// Create a mapper with no expressions; it maps every message to `None`.
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Append an arbitrary expression.
    #[must_use]
    pub fn expression(mut self, expression: KeyExpression) -> Self {
        self.expressions.push(expression);
        self
    }

    /// Append a header expression.
    #[must_use]
    pub fn header(self, name: impl Into<String>) -> Self {
        self.expression(KeyExpression::Header(name.into()))
    }

    /// Append an XPath expression.
    #[must_use]
    pub fn xpath(self, expr: impl Into<String>) -> Self {
        self.expression(KeyExpression::XPath(expr.into()))
    }

    /// Append a JSONPath expression.
    #[must_use]
    pub fn json_path(self, expr: impl Into<String>) -> Self {
        self.expression(KeyExpression::JsonPath(expr.into()))
    }

    /// Append the operation-header expression.
    #[must_use]
    pub fn operation(self) -> Self { self.expression(KeyExpression::Operation) }

    /// Replace the key filter.
    #[must_use]
    pub fn filter(mut self, filter: KeyFilter) -> Self {
        self.filter = filter;
        self
    }

    /// Accept only the given scenario names.
    #[must_use]
    pub fn known_names<I, S>(self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.filter(KeyFilter::Names(names.into_iter().map(Into::into).collect()))
    }
}

impl ScenarioMapper for ContentBasedMapper {
    fn extract_key(&self, message: &Message) -> Option<String> {
        self.expressions.iter().find_map(|expression| {
            match expression.evaluate(message) {
                Ok(Some(key)) if !key.is_empty() && self.filter.accepts(&key) => Some(key),
                Ok(_) => None,
                Err(e) => {
                    debug!(
                        "scenario key extraction failed: expression={expression}, message_id={}, \
                         error={e}",
                        message.id()
                    );
                    None
                }
            }
        })
    }
}
