//! Scenario files
//!
//! A scenario is a YAML (or JSON) document:
//! ```yaml
//! scenarioName: init and invoke
//! continueOnFailure: false
//! variables: { functionId: fn-1 }
//! actions:
//!   - actionName: init
//!     type: rpc
//!     timeout: 5000
//!     messages: [...]
//!   - { type: delay, timeout: 100 }
//! ```

use std::path::Path;

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::common::{Error, Result};

use super::actions::{Action, ActionRegistry};
use super::variables::VariableStore;

/// A scenario file as written
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ScenarioDefinition {
    pub scenario_name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub continue_on_failure: bool,
    #[serde(default)]
    pub variables: Map<String, Value>,
    pub actions: Vec<Value>,
}

impl ScenarioDefinition {
    pub fn parse(content: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::FileRead {
            path: path.display().to_string(),
            error: e.to_string(),
        })?;
        Self::parse(&content)
    }

    /// Construct every action; the first invalid step aborts the build
    pub fn build(&self, registry: &ActionRegistry) -> Result<Scenario> {
        let actions = self
            .actions
            .iter()
            .enumerate()
            .map(|(index, node)| {
                registry.create(node).map_err(|e| match e {
                    Error::Argument(message) => {
                        Error::argument(format!("actions[{}]: {}", index, message))
                    }
                    other => other,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Scenario {
            name: self.scenario_name.clone(),
            description: self.description.clone(),
            continue_on_failure: self.continue_on_failure,
            variables: VariableStore::from_map(self.variables.clone()),
            actions,
        })
    }
}

/// A scenario ready to run
pub struct Scenario {
    pub name: String,
    pub description: Option<String>,
    pub continue_on_failure: bool,
    pub variables: VariableStore,
    pub actions: Vec<Box<dyn Action>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::config::Timeouts;
    use crate::harness::actions::ActionType;
    use crate::stream::DuplexChannel;
    use serde_json::json;
    use std::sync::Arc;

    fn registry() -> ActionRegistry {
        let (channel, _endpoint) = DuplexChannel::new();
        ActionRegistry::with_defaults(Arc::new(channel), &Timeouts::default())
    }

    const SCENARIO: &str = r#"
scenarioName: smoke
description: init then wait
variables:
  functionId: fn-1
actions:
  - actionName: init
    timeout: 2000
    messages:
      - messageType: workerInitRequest
        expect:
          messageType: workerInitResponse
  - type: delay
    timeout: 10
"#;

    #[test]
    fn test_parse_yaml() {
        let definition = ScenarioDefinition::parse(SCENARIO).unwrap();
        assert_eq!(definition.scenario_name, "smoke");
        assert!(!definition.continue_on_failure);
        assert_eq!(definition.variables.get("functionId"), Some(&json!("fn-1")));
        assert_eq!(definition.actions.len(), 2);
    }

    #[test]
    fn test_parse_json() {
        let definition = ScenarioDefinition::parse(
            r#"{"scenarioName": "j", "continueOnFailure": true, "actions": []}"#,
        )
        .unwrap();
        assert!(definition.continue_on_failure);
    }

    #[test]
    fn test_missing_name_rejected() {
        assert!(matches!(
            ScenarioDefinition::parse("actions: []"),
            Err(Error::Yaml(_))
        ));
    }

    #[test]
    fn test_build_constructs_all_actions() {
        let scenario = ScenarioDefinition::parse(SCENARIO)
            .unwrap()
            .build(&registry())
            .unwrap();
        assert_eq!(scenario.actions.len(), 2);
        assert_eq!(scenario.actions[0].name(), "init");
        assert_eq!(scenario.actions[1].action_type(), ActionType::Delay);
        assert_eq!(scenario.variables.get("functionId"), Some(&json!("fn-1")));
    }

    #[test]
    fn test_build_fails_on_any_invalid_action() {
        let definition = ScenarioDefinition::parse(
            "scenarioName: bad\nactions:\n  - messages: [{}]\n  - actionName: broken\n",
        )
        .unwrap();
        let err = definition.build(&registry()).err().unwrap();
        assert!(err.to_string().starts_with("actions[1]: "));
    }

    #[test]
    fn test_load_missing_file() {
        let err = ScenarioDefinition::load(Path::new("/nonexistent/scenario.yaml")).unwrap_err();
        assert!(matches!(err, Error::FileRead { .. }));
    }
}
