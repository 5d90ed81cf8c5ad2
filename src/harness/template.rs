//! Message templates
//!
//! Each entry of an rpc action's `messages` list is a template. Outgoing
//! templates describe a message to send; either kind may carry an `expect`
//! block describing the response to wait for:
//! ```yaml
//! - messageType: invocationRequest
//!   payload: { functionId: "${functionId}", invocationId: inv-1 }
//!   expect:
//!     messageType: invocationResponse
//!     match: { invocationId: inv-1 }
//!     validators:
//!       - { query: "$.invocationResponse.result.status", type: equals, expected: Success }
//!     capture: { output: "$.invocationResponse.returnValue" }
//! ```

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::Value;

use crate::common::{Error, Result};

use super::matcher::{Expectation, Pattern};
use super::validator::{compile_query, Assertion, ValidatorSpec};
use super::variables::VariableStore;

/// Whether a template sends a message or only waits for one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Outgoing,
    Incoming,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct RawTemplate {
    #[serde(default)]
    direction: Direction,
    message_type: Option<String>,
    request_id: Option<String>,
    payload: Option<Value>,
    expect: Option<RawExpectation>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct RawExpectation {
    message_type: Option<String>,
    #[serde(default = "default_correlate")]
    correlate: bool,
    #[serde(rename = "match")]
    pattern: Option<Value>,
    #[serde(default)]
    validators: Vec<ValidatorSpec>,
    #[serde(default)]
    capture: BTreeMap<String, String>,
}

fn default_correlate() -> bool {
    true
}

/// A message to send
#[derive(Debug, Clone)]
pub struct OutgoingTemplate {
    /// Content key; when absent the payload is used as the raw content map
    pub message_type: Option<String>,
    /// Explicit request id (may reference variables); generated otherwise
    pub request_id: Option<String>,
    pub payload: Value,
}

/// A response to wait for, before variables are substituted
#[derive(Debug, Clone)]
pub struct ExpectationTemplate {
    pub label: String,
    pub message_type: Option<String>,
    pub correlate: bool,
    pub pattern: Pattern,
    pub assertions: Vec<Assertion>,
    pub captures: Vec<(String, String)>,
}

impl ExpectationTemplate {
    /// Produce the runtime expectation for one run
    ///
    /// `sent_request_id` is the id of the message this template sent, if
    /// any; it becomes a correlation constraint unless `correlate` is off.
    pub fn instantiate(
        &self,
        variables: &VariableStore,
        sent_request_id: Option<&str>,
    ) -> Result<Expectation> {
        Ok(Expectation {
            label: self.label.clone(),
            message_type: self.message_type.clone(),
            request_id: sent_request_id
                .filter(|_| self.correlate)
                .map(String::from),
            pattern: self.pattern.resolve(variables, sent_request_id)?,
            assertions: self
                .assertions
                .iter()
                .map(|a| a.resolve(variables, sent_request_id))
                .collect::<Result<Vec<_>>>()?,
            captures: self.captures.clone(),
        })
    }
}

/// One parsed entry of an rpc action's `messages`
#[derive(Debug, Clone)]
pub struct MessageTemplate {
    pub index: usize,
    pub outgoing: Option<OutgoingTemplate>,
    pub expect: Option<ExpectationTemplate>,
}

impl MessageTemplate {
    /// Parse and compile a template node
    pub fn parse(index: usize, node: &Value) -> Result<Self> {
        let raw: RawTemplate = serde_json::from_value(node.clone()).map_err(|e| {
            Error::argument(format!("messages[{}] is not a valid message template: {}", index, e))
        })?;

        let outgoing = match raw.direction {
            Direction::Outgoing => Some(OutgoingTemplate {
                message_type: raw.message_type.clone(),
                request_id: raw.request_id,
                payload: raw.payload.unwrap_or_else(|| Value::Object(Default::default())),
            }),
            Direction::Incoming => {
                if raw.payload.is_some() || raw.message_type.is_some() {
                    return Err(Error::argument(format!(
                        "messages[{}] is incoming; put 'messageType' and 'match' under 'expect'",
                        index
                    )));
                }
                None
            }
        };

        let expect = match raw.expect {
            Some(expect) => Some(Self::parse_expectation(index, expect)?),
            None if raw.direction == Direction::Incoming => {
                return Err(Error::argument(format!(
                    "messages[{}] is incoming but has no 'expect' block",
                    index
                )))
            }
            None => None,
        };

        Ok(Self {
            index,
            outgoing,
            expect,
        })
    }

    fn parse_expectation(index: usize, raw: RawExpectation) -> Result<ExpectationTemplate> {
        let label = match &raw.message_type {
            Some(message_type) => format!("messages[{}] {}", index, message_type),
            None => format!("messages[{}]", index),
        };
        let pattern = match &raw.pattern {
            Some(value) => Pattern::compile(value)?,
            None => Pattern::Any,
        };
        let assertions = raw
            .validators
            .iter()
            .map(Assertion::from_spec)
            .collect::<Result<Vec<_>>>()?;

        let captures = raw
            .capture
            .into_iter()
            .map(|(name, query)| Ok((name, compile_query(&query)?)))
            .collect::<Result<Vec<_>>>()
            .map_err(|e| Error::argument(format!("messages[{}] capture: {}", index, e)))?;

        Ok(ExpectationTemplate {
            label,
            message_type: raw.message_type,
            correlate: raw.correlate,
            pattern,
            assertions,
            captures,
        })
    }

    /// Label used in diagnostics
    pub fn label(&self) -> String {
        let message_type = self
            .outgoing
            .as_ref()
            .and_then(|o| o.message_type.as_deref());
        match message_type {
            Some(message_type) => format!("messages[{}] {}", self.index, message_type),
            None => format!("messages[{}]", self.index),
        }
    }
}
