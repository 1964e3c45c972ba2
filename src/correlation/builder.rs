//! Fluent construction of correlation handlers from within a scenario.

use std::sync::Arc;

use super::{CorrelationCondition, CorrelationHandler};
use crate::{mapper::KeyExpression, scenario::ScenarioContext};

/// Collects conditions and registers a handler for the current execution.
///
/// Condition values may contain `${variable}` placeholders; they are resolved
/// against the scenario variables when [`start`](Self::start) runs.
///
/// ```rust,ignore
/// let handler = ctx
///     .correlation()
///     .on_header("x-correlationid", "${correlationId}")
///     .start();
/// // ... exchange follow-up messages ...
/// ctx.stop_correlation(&handler);
/// ```
#[must_use = "call `start` to register the correlation handler"]
pub struct CorrelationBuilder<'a> {
    ctx: &'a mut ScenarioContext,
    conditions: Vec<CorrelationCondition>,
}

impl<'a> CorrelationBuilder<'a> {
    pub(crate) fn new(ctx: &'a mut ScenarioContext) -> Self {
        Self {
            ctx,
            conditions: Vec::new(),
        }
    }

    /// Match messages whose header `name` equals `value`.
    pub fn on_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.conditions.push(CorrelationCondition::Header {
            name: name.into(),
            value: value.into(),
        });
        self
    }

    /// Match messages whose payload `expression` evaluates to `value`.
    pub fn on_payload(mut self, expression: KeyExpression, value: impl Into<String>) -> Self {
        self.conditions.push(CorrelationCondition::Payload {
            expression,
            value: value.into(),
        });
        self
    }

    /// Shorthand for [`on_payload`](Self::on_payload) with an XPath expression.
    pub fn on_xpath(self, expression: impl Into<String>, value: impl Into<String>) -> Self {
        self.on_payload(KeyExpression::XPath(expression.into()), value)
    }

    /// Shorthand for [`on_payload`](Self::on_payload) with a JSONPath expression.
    pub fn on_json_path(self, expression: impl Into<String>, value: impl Into<String>) -> Self {
        self.on_payload(KeyExpression::JsonPath(expression.into()), value)
    }

    /// Match messages of the given type.
    pub fn on_message_type(mut self, value: impl Into<String>) -> Self {
        self.conditions
            .push(CorrelationCondition::MessageType(value.into()));
        self
    }

    /// Resolve placeholders and register the handler.
    pub fn start(self) -> Arc<CorrelationHandler> {
        let ctx = self.ctx;
        let conditions = self
            .conditions
            .into_iter()
            .map(|condition| match condition {
                CorrelationCondition::Header { name, value } => CorrelationCondition::Header {
                    name,
                    value: ctx.resolve(&value),
                },
                CorrelationCondition::Payload { expression, value } => {
                    CorrelationCondition::Payload {
                        expression,
                        value: ctx.resolve(&value),
                    }
                }
                CorrelationCondition::MessageType(value) => {
                    CorrelationCondition::MessageType(ctx.resolve(&value))
                }
            })
            .collect();
        ctx.start_correlation(conditions)
    }
}
