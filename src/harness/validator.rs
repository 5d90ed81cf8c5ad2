//! Field-level validation of matched messages
//!
//! Each [`Assertion`] names a JSONPath query and a condition. Every
//! assertion is evaluated and every failure is reported; a query that is
//! malformed or selects nothing is itself a violation (except for `absent`).

use std::fmt;
use std::panic::{self, AssertUnwindSafe};

use jsonpath_lib::select;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;

use crate::common::{Error, Result};

use super::matcher::json_eq;
use super::variables::VariableStore;

/// JSON value kinds accepted by the `type` validator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JsonType {
    Null,
    Bool,
    Number,
    String,
    Array,
    Object,
}

impl JsonType {
    fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "null" => Some(Self::Null),
            "bool" | "boolean" => Some(Self::Bool),
            "number" | "integer" => Some(Self::Number),
            "string" => Some(Self::String),
            "array" => Some(Self::Array),
            "object" => Some(Self::Object),
            _ => None,
        }
    }

    fn of(value: &Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(_) => Self::Bool,
            Value::Number(_) => Self::Number,
            Value::String(_) => Self::String,
            Value::Array(_) => Self::Array,
            Value::Object(_) => Self::Object,
        }
    }
}

impl fmt::Display for JsonType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Null => "null",
            Self::Bool => "bool",
            Self::Number => "number",
            Self::String => "string",
            Self::Array => "array",
            Self::Object => "object",
        };
        f.write_str(name)
    }
}

/// The condition an assertion checks
#[derive(Debug, Clone)]
pub enum AssertionKind {
    Equals(Value),
    Regex(Regex),
    Type(JsonType),
    Present,
    Absent,
}

/// Validator entry as written in a scenario
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ValidatorSpec {
    /// JSONPath query; a leading `$.` is added when missing
    pub query: String,
    /// Validator name: equals (alias string), regex, type, present, absent
    #[serde(rename = "type")]
    pub kind: String,
    /// Expected value, required by equals/regex/type
    pub expected: Option<Value>,
}

/// A single field assertion
#[derive(Debug, Clone)]
pub struct Assertion {
    pub query: String,
    pub kind: AssertionKind,
}

impl Assertion {
    /// Build an assertion from its scenario form
    pub fn from_spec(spec: &ValidatorSpec) -> Result<Self> {
        let query = compile_query(&spec.query)?;
        let expected = || {
            spec.expected.as_ref().ok_or_else(|| {
                Error::argument(format!(
                    "validator '{}' on '{}' requires an 'expected' value",
                    spec.kind, spec.query
                ))
            })
        };
        let expected_str = || {
            expected()?.as_str().ok_or_else(|| {
                Error::argument(format!(
                    "validator '{}' on '{}' requires a string 'expected' value",
                    spec.kind, spec.query
                ))
            })
        };

        let kind = match spec.kind.to_ascii_lowercase().as_str() {
            "equals" | "string" => AssertionKind::Equals(expected()?.clone()),
            "regex" => {
                let source = expected_str()?;
                AssertionKind::Regex(
                    Regex::new(source).map_err(|e| Error::invalid_pattern(source, e))?,
                )
            }
            "type" => {
                let name = expected_str()?;
                AssertionKind::Type(JsonType::parse(name).ok_or_else(|| {
                    Error::argument(format!("unknown JSON type '{}' for '{}'", name, spec.query))
                })?)
            }
            "present" => AssertionKind::Present,
            "absent" => AssertionKind::Absent,
            other => {
                return Err(Error::argument(format!(
                    "unknown validator type '{}' for '{}'",
                    other, spec.query
                )))
            }
        };

        Ok(Self { query, kind })
    }

    /// Validator name used in diagnostics
    pub fn name(&self) -> &'static str {
        match self.kind {
            AssertionKind::Equals(_) => "equals",
            AssertionKind::Regex(_) => "regex",
            AssertionKind::Type(_) => "type",
            AssertionKind::Present => "present",
            AssertionKind::Absent => "absent",
        }
    }

    /// Substitute variables into the expected value
    pub fn resolve(&self, variables: &VariableStore, request_id: Option<&str>) -> Result<Self> {
        let kind = match &self.kind {
            AssertionKind::Equals(value) => {
                AssertionKind::Equals(variables.resolve(value, request_id)?)
            }
            other => other.clone(),
        };
        Ok(Self {
            query: self.query.clone(),
            kind,
        })
    }

    fn check(&self, message: &Value) -> Option<Violation> {
        let selected = match select_guarded(message, &self.query) {
            Ok(selected) => selected,
            Err(reason) => return Some(self.violation(reason)),
        };

        if let AssertionKind::Absent = self.kind {
            return match selected.first() {
                None => None,
                Some(value) => Some(self.violation(format!("expected no value, found {}", value))),
            };
        }

        if selected.is_empty() {
            return Some(self.violation("field not found".to_string()));
        }

        selected
            .into_iter()
            .find_map(|actual| self.check_value(actual))
            .map(|message| self.violation(message))
    }

    fn check_value(&self, actual: &Value) -> Option<String> {
        match &self.kind {
            AssertionKind::Equals(expected) => {
                (!json_eq(expected, actual)).then(|| format!("expected {}, got {}", expected, actual))
            }
            AssertionKind::Regex(re) => match actual.as_str() {
                Some(s) if re.is_match(s) => None,
                Some(s) => Some(format!("'{}' does not match /{}/", s, re.as_str())),
                None => Some(format!("expected a string matching /{}/, got {}", re.as_str(), actual)),
            },
            AssertionKind::Type(expected) => {
                let found = JsonType::of(actual);
                (found != *expected).then(|| format!("expected type {}, got {}", expected, found))
            }
            AssertionKind::Present | AssertionKind::Absent => None,
        }
    }

    fn violation(&self, message: String) -> Violation {
        Violation {
            query: self.query.clone(),
            validator: self.name(),
            message,
        }
    }
}

fn normalize_query(query: &str) -> String {
    if query.starts_with('$') {
        query.to_string()
    } else {
        format!("$.{}", query)
    }
}

/// Normalize a field query and reject it unless it is well formed
///
/// The JSONPath parser accepts some inputs it cannot evaluate: trailing
/// tokens are ignored and a zero slice step panics during selection.
/// Both are rejected here along with ordinary parse errors.
pub(crate) fn compile_query(query: &str) -> Result<String> {
    let normalized = normalize_query(query.trim());
    let invalid = |reason: String| Error::argument(format!("invalid query '{}': {}", query, reason));

    check_query_syntax(&normalized).map_err(invalid)?;
    select(&Value::Null, &normalized).map_err(|e| invalid(format!("{:?}", e)))?;
    Ok(normalized)
}

/// Outside brackets only path tokens may appear; inside, quotes and
/// nesting must balance
fn check_query_syntax(query: &str) -> std::result::Result<(), String> {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut bracket_start = 0;

    for (offset, c) in query.char_indices() {
        if let Some(open) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == open {
                quote = None;
            }
            continue;
        }

        match c {
            '\'' | '"' if depth > 0 => quote = Some(c),
            '[' => {
                if depth == 0 {
                    bracket_start = offset + 1;
                }
                depth += 1;
            }
            ']' => {
                if depth == 0 {
                    return Err(format!("unexpected ']' at offset {}", offset));
                }
                depth -= 1;
                if depth == 0 {
                    check_slice(&query[bracket_start..offset])?;
                }
            }
            _ if depth > 0 => {}
            '$' | '.' | '*' | '@' | '_' | '-' => {}
            c if c.is_alphanumeric() => {}
            c => return Err(format!("unexpected {:?} at offset {}", c, offset)),
        }
    }

    if quote.is_some() {
        return Err("unterminated quote".to_string());
    }
    if depth > 0 {
        return Err("unterminated '['".to_string());
    }
    Ok(())
}

fn check_slice(selector: &str) -> std::result::Result<(), String> {
    let selector = selector.trim();
    if selector.starts_with('?') || selector.starts_with('\'') || selector.starts_with('"') {
        return Ok(());
    }
    let parts: Vec<&str> = selector.split(':').collect();
    if parts.len() == 3 && parts[2].trim().parse::<i64>() == Ok(0) {
        return Err(format!("slice step must not be zero in [{}]", selector));
    }
    Ok(())
}

/// Run a query, reporting parse errors and evaluation panics as a reason
pub(crate) fn select_guarded<'a>(
    message: &'a Value,
    query: &str,
) -> std::result::Result<Vec<&'a Value>, String> {
    match panic::catch_unwind(AssertUnwindSafe(|| select(message, query))) {
        Ok(Ok(selected)) => Ok(selected),
        Ok(Err(e)) => Err(format!("invalid query: {:?}", e)),
        Err(_) => Err("query evaluation failed".to_string()),
    }
}

/// One failed assertion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub query: String,
    pub validator: &'static str,
    pub message: String,
}

impl Violation {
    pub fn new(query: impl Into<String>, validator: &'static str, message: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            validator,
            message: message.into(),
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.validator, self.query, self.message)
    }
}

/// Evaluates assertions against a message
pub trait ValidatorEngine: Send + Sync {
    /// Every violation found; empty means the message passed
    fn validate(&self, message: &Value, assertions: &[Assertion]) -> Vec<Violation>;
}

/// Default engine backed by JSONPath queries
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonPathValidator;

impl ValidatorEngine for JsonPathValidator {
    fn validate(&self, message: &Value, assertions: &[Assertion]) -> Vec<Violation> {
        assertions
            .iter()
            .filter_map(|assertion| assertion.check(message))
            .collect()
    }
}
