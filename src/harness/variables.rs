//! Scenario variables
//!
//! Template strings may reference variables as `${name}`. A string that is
//! exactly one reference is replaced by the variable's JSON value; otherwise
//! each reference is interpolated as text. Built-ins:
//! - `${@uuid}`: a fresh UUID
//! - `${@requestId}`: request id of the message being built

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;
use serde_json::{Map, Value};

use crate::common::{Error, Result};

fn reference_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\$\{([^}]+)\}").expect("variable reference regex is valid"))
}

/// Values shared between the actions of one scenario run
#[derive(Debug, Default, Clone)]
pub struct VariableStore {
    values: HashMap<String, Value>,
}

impl VariableStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store from a scenario's `variables` map
    pub fn from_map(map: Map<String, Value>) -> Self {
        Self {
            values: map.into_iter().collect(),
        }
    }

    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        self.values.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// Resolve every reference inside a JSON value
    pub fn resolve(&self, value: &Value, request_id: Option<&str>) -> Result<Value> {
        match value {
            Value::String(s) => self.resolve_str(s, request_id),
            Value::Array(items) => items
                .iter()
                .map(|item| self.resolve(item, request_id))
                .collect::<Result<Vec<_>>>()
                .map(Value::Array),
            Value::Object(fields) => {
                let mut resolved = Map::with_capacity(fields.len());
                for (key, field) in fields {
                    resolved.insert(key.clone(), self.resolve(field, request_id)?);
                }
                Ok(Value::Object(resolved))
            }
            other => Ok(other.clone()),
        }
    }

    /// Resolve references in a single string
    pub fn resolve_str(&self, s: &str, request_id: Option<&str>) -> Result<Value> {
        let re = reference_regex();

        // Whole-string reference keeps the variable's JSON type
        if let Some(caps) = re.captures(s) {
            if caps.get(0).map(|m| m.as_str().len()) == Some(s.len()) {
                return self.lookup(&caps[1], request_id);
            }
        } else {
            return Ok(Value::String(s.to_string()));
        }

        let mut out = String::with_capacity(s.len());
        let mut last = 0;
        for caps in re.captures_iter(s) {
            let Some(whole) = caps.get(0) else {
                continue;
            };
            out.push_str(&s[last..whole.start()]);
            match self.lookup(&caps[1], request_id)? {
                Value::String(text) => out.push_str(&text),
                other => out.push_str(&other.to_string()),
            }
            last = whole.end();
        }
        out.push_str(&s[last..]);
        Ok(Value::String(out))
    }

    fn lookup(&self, name: &str, request_id: Option<&str>) -> Result<Value> {
        match name {
            "@uuid" => Ok(Value::String(uuid::Uuid::new_v4().to_string())),
            "@requestId" => request_id
                .map(|id| Value::String(id.to_string()))
                .ok_or_else(|| Error::UnresolvedVariable(name.to_string())),
            _ => self
                .values
                .get(name)
                .cloned()
                .ok_or_else(|| Error::UnresolvedVariable(name.to_string())),
        }
    }
}
