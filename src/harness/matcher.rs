//! Message matching
//!
//! Decides which pending [`Expectation`] an inbound message satisfies.
//! Matching is structural: fields named by the pattern must be present and
//! equal (or satisfy a `$regex`); everything else is a wildcard.

use regex::Regex;
use serde_json::Value;

use crate::common::{Error, Result};
use crate::stream::StreamingMessage;

use super::validator::Assertion;
use super::variables::VariableStore;

/// Key that turns a pattern object into a regular expression node
const REGEX_KEY: &str = "$regex";

/// A compiled structural pattern
#[derive(Debug, Clone)]
pub enum Pattern {
    /// Matches anything
    Any,
    /// JSON equality (numbers compared numerically)
    Literal(Value),
    /// String matching a regular expression
    Regex(Regex),
    /// Object containing at least these fields
    Object(Vec<(String, Pattern)>),
    /// Array of exactly these elements
    Array(Vec<Pattern>),
}

impl Pattern {
    /// Compile a pattern from its scenario form
    pub fn compile(value: &Value) -> Result<Self> {
        match value {
            Value::Object(fields) if fields.len() == 1 && fields.contains_key(REGEX_KEY) => {
                let source = fields[REGEX_KEY].as_str().ok_or_else(|| {
                    Error::invalid_pattern(&value.to_string(), "'$regex' must be a string")
                })?;
                Regex::new(source)
                    .map(Pattern::Regex)
                    .map_err(|e| Error::invalid_pattern(source, e))
            }
            Value::Object(fields) => fields
                .iter()
                .map(|(key, field)| Ok((key.clone(), Pattern::compile(field)?)))
                .collect::<Result<Vec<_>>>()
                .map(Pattern::Object),
            Value::Array(items) => items
                .iter()
                .map(Pattern::compile)
                .collect::<Result<Vec<_>>>()
                .map(Pattern::Array),
            other => Ok(Pattern::Literal(other.clone())),
        }
    }

    /// Substitute variables into literal nodes
    pub fn resolve(&self, variables: &VariableStore, request_id: Option<&str>) -> Result<Self> {
        Ok(match self {
            Pattern::Any => Pattern::Any,
            Pattern::Literal(value) => Pattern::Literal(variables.resolve(value, request_id)?),
            Pattern::Regex(re) => Pattern::Regex(re.clone()),
            Pattern::Object(fields) => Pattern::Object(
                fields
                    .iter()
                    .map(|(key, field)| Ok((key.clone(), field.resolve(variables, request_id)?)))
                    .collect::<Result<Vec<_>>>()?,
            ),
            Pattern::Array(items) => Pattern::Array(
                items
                    .iter()
                    .map(|item| item.resolve(variables, request_id))
                    .collect::<Result<Vec<_>>>()?,
            ),
        })
    }

    pub fn matches(&self, candidate: &Value) -> bool {
        match self {
            Pattern::Any => true,
            Pattern::Literal(expected) => json_eq(expected, candidate),
            Pattern::Regex(re) => candidate.as_str().is_some_and(|s| re.is_match(s)),
            Pattern::Object(fields) => match candidate {
                Value::Object(actual) => fields.iter().all(|(key, field)| {
                    actual.get(key).is_some_and(|value| field.matches(value))
                }),
                _ => false,
            },
            Pattern::Array(items) => match candidate {
                Value::Array(actual) => {
                    actual.len() == items.len()
                        && items.iter().zip(actual).all(|(item, value)| item.matches(value))
                }
                _ => false,
            },
        }
    }
}

/// JSON equality that treats `5` and `5.0` as equal
pub fn json_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_f64(), y.as_f64()) {
            (Some(x), Some(y)) => x == y,
            _ => x == y,
        },
        (Value::Array(x), Value::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(a, b)| json_eq(a, b))
        }
        (Value::Object(x), Value::Object(y)) => {
            x.len() == y.len()
                && x.iter()
                    .all(|(key, a)| y.get(key).is_some_and(|b| json_eq(a, b)))
        }
        _ => a == b,
    }
}

/// A response the running action is waiting for
#[derive(Debug, Clone)]
pub struct Expectation {
    /// Label used in diagnostics, e.g. `messages[1] invocationResponse`
    pub label: String,
    /// Required content key
    pub message_type: Option<String>,
    /// Required request id (correlation with the sent message)
    pub request_id: Option<String>,
    /// Pattern over the body (or the whole message when no type is given)
    pub pattern: Pattern,
    /// Field assertions run against the matched message
    pub assertions: Vec<Assertion>,
    /// `(variable, query)` pairs captured from the matched message
    pub captures: Vec<(String, String)>,
}

impl Expectation {
    /// Structural check of one candidate against this expectation
    pub fn is_satisfied_by(&self, candidate: &StreamingMessage) -> bool {
        if let Some(request_id) = &self.request_id {
            if &candidate.request_id != request_id {
                return false;
            }
        }

        match &self.message_type {
            Some(message_type) => candidate
                .content
                .get(message_type)
                .is_some_and(|body| self.pattern.matches(body)),
            None => self.pattern.matches(&candidate.to_value()),
        }
    }
}

/// Chooses the pending expectation a message satisfies
pub trait MessageMatcher: Send + Sync {
    /// Index into `pending` of the matched expectation, oldest first
    fn find_match(&self, candidate: &StreamingMessage, pending: &[Expectation]) -> Option<usize>;
}

/// Default matcher: first (oldest) structurally satisfied expectation wins
#[derive(Debug, Default, Clone, Copy)]
pub struct StructuralMatcher;

impl MessageMatcher for StructuralMatcher {
    fn find_match(&self, candidate: &StreamingMessage, pending: &[Expectation]) -> Option<usize> {
        pending
            .iter()
            .position(|expectation| expectation.is_satisfied_by(candidate))
    }
}
