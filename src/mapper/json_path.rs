//! Evaluation of simple JSONPath expressions against message payloads.
//!
//! Supported syntax is the root `$` followed by any mix of `.field`,
//! `['field']`, `["field"]` and `[index]` segments.

use serde_json::Value;

use super::ExtractError;

#[derive(Debug, PartialEq, Eq)]
enum Segment {
    Field(String),
    Index(usize),
}

fn parse(expression: &str) -> Result<Vec<Segment>, ExtractError> {
    let unsupported = || ExtractError::UnsupportedExpression(expression.to_owned());
    let mut rest = expression.trim().strip_prefix('$').ok_or_else(unsupported)?;
    let mut segments = Vec::new();

    while !rest.is_empty() {
        if let Some(after_dot) = rest.strip_prefix('.') {
            let end = after_dot.find(['.', '[']).unwrap_or(after_dot.len());
            let field = &after_dot[..end];
            if field.is_empty() || field == "*" {
                return Err(unsupported());
            }
            segments.push(Segment::Field(field.to_owned()));
            rest = &after_dot[end..];
        } else if let Some(after_bracket) = rest.strip_prefix('[') {
            let end = after_bracket.find(']').ok_or_else(unsupported)?;
            let inner = after_bracket[..end].trim();
            let quoted = inner
                .strip_prefix('\'')
                .and_then(|s| s.strip_suffix('\''))
                .or_else(|| inner.strip_prefix('"').and_then(|s| s.strip_suffix('"')));
            let segment = match quoted {
                Some(field) => Segment::Field(field.to_owned()),
                None => Segment::Index(inner.parse().map_err(|_| unsupported())?),
            };
            segments.push(segment);
            rest = &after_bracket[end + 1..];
        } else {
            return Err(unsupported());
        }
    }
    Ok(segments)
}

/// Evaluate `expression` against the JSON document `json`.
///
/// String values are returned without quotes; other scalars, arrays and
/// objects are rendered as compact JSON. `null` and missing nodes yield
/// `Ok(None)`.
pub(crate) fn evaluate(expression: &str, json: &str) -> Result<Option<String>, ExtractError> {
    let segments = parse(expression)?;
    let document: Value = serde_json::from_str(json)?;
    let mut node = &document;
    for segment in &segments {
        let next = match segment {
            Segment::Field(name) => node.get(name.as_str()),
            Segment::Index(index) => node.get(*index),
        };
        match next {
            Some(value) => node = value,
            None => return Ok(None),
        }
    }
    Ok(match node {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    })
}
