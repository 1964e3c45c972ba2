//! Streaming evaluation of the XPath subset used for scenario mapping.
//!
//! Supported expressions:
//!
//! - `local-name(/*)` and `name(/*)` for the root element name;
//! - absolute element paths such as `/Envelope/Body/Hello`;
//! - descendant lookups such as `//Hello`.
//!
//! Paths may end in `/text()`. Namespace prefixes are ignored when matching
//! path steps. Element paths yield the text content of the first match.

use quick_xml::{Reader, events::Event};

use super::ExtractError;

#[derive(Clone, Debug, PartialEq, Eq)]
enum XPathExpr {
    RootLocalName,
    RootName,
    Path(Vec<String>),
    Descendant(String),
}

fn local(name: &str) -> &str { name.rsplit_once(':').map_or(name, |(_, local)| local) }

fn parse(expression: &str) -> Result<XPathExpr, ExtractError> {
    let expr = expression.trim();
    match expr {
        "local-name(/*)" => return Ok(XPathExpr::RootLocalName),
        "name(/*)" => return Ok(XPathExpr::RootName),
        _ => {}
    }
    let expr = expr.strip_suffix("/text()").unwrap_or(expr);
    let unsupported = || ExtractError::UnsupportedExpression(expression.to_owned());

    if let Some(rest) = expr.strip_prefix("//") {
        if rest.is_empty() || rest.contains('/') {
            return Err(unsupported());
        }
        return Ok(XPathExpr::Descendant(local(rest).to_owned()));
    }
    let Some(rest) = expr.strip_prefix('/') else {
        return Err(unsupported());
    };
    let steps: Vec<String> = rest.split('/').map(|s| local(s).to_owned()).collect();
    if steps.iter().any(|s| s.is_empty() || s == "*" || s.contains(['(', '[', '@'])) {
        return Err(unsupported());
    }
    Ok(XPathExpr::Path(steps))
}

fn xml_error(error: impl std::fmt::Display) -> ExtractError { ExtractError::Xml(error.to_string()) }

/// Evaluate `expression` against `xml`.
///
/// Returns `Ok(None)` when the document has no matching node.
pub(crate) fn evaluate(expression: &str, xml: &str) -> Result<Option<String>, ExtractError> {
    let expr = parse(expression)?;
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<String> = Vec::new();
    // Depth of the element being captured and the text gathered so far.
    let mut capture: Option<(usize, String)> = None;

    loop {
        match reader.read_event().map_err(xml_error)? {
            Event::Start(e) => {
                let qualified = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                match &expr {
                    XPathExpr::RootLocalName => return Ok(Some(name)),
                    XPathExpr::RootName => return Ok(Some(qualified)),
                    XPathExpr::Path(_) | XPathExpr::Descendant(_) => {}
                }
                stack.push(name);
                if capture.is_none() && matches_node(&expr, &stack) {
                    capture = Some((stack.len(), String::new()));
                }
            }
            Event::Empty(e) => {
                let qualified = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                match &expr {
                    XPathExpr::RootLocalName => return Ok(Some(name)),
                    XPathExpr::RootName => return Ok(Some(qualified)),
                    XPathExpr::Path(_) | XPathExpr::Descendant(_) => {}
                }
                if capture.is_none() {
                    stack.push(name);
                    let hit = matches_node(&expr, &stack);
                    stack.pop();
                    if hit {
                        return Ok(Some(String::new()));
                    }
                }
            }
            Event::Text(t) => {
                if let Some((_, buf)) = capture.as_mut() {
                    buf.push_str(&t.unescape().map_err(xml_error)?);
                }
            }
            Event::CData(c) => {
                if let Some((_, buf)) = capture.as_mut() {
                    buf.push_str(&String::from_utf8_lossy(&c));
                }
            }
            Event::End(_) => {
                if let Some((depth, buf)) = capture.take() {
                    if depth == stack.len() {
                        return Ok(Some(buf));
                    }
                    capture = Some((depth, buf));
                }
                stack.pop();
            }
            Event::Eof => return Ok(None),
            _ => {}
        }
    }
}

fn matches_node(expr: &XPathExpr, stack: &[String]) -> bool {
    match expr {
        XPathExpr::Path(steps) => stack.len() == steps.len() && stack.iter().eq(steps.iter()),
        XPathExpr::Descendant(name) => stack.last().is_some_and(|last| last == name),
        XPathExpr::RootLocalName | XPathExpr::RootName => false,
    }
}
