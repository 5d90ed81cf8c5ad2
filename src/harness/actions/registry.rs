//! Action provider registry

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use crate::common::config::Timeouts;
use crate::common::{Error, Result};
use crate::harness::builder::TemplateMessageBuilder;
use crate::harness::matcher::StructuralMatcher;
use crate::harness::validator::JsonPathValidator;
use crate::stream::MessageChannel;

use super::{Action, ActionProvider, ActionType, DelayActionProvider, RpcActionProvider};

/// Maps action types to the providers that build them
#[derive(Default)]
pub struct ActionRegistry {
    providers: HashMap<ActionType, Box<dyn ActionProvider>>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in rpc and delay providers
    pub fn with_defaults(channel: Arc<dyn MessageChannel>, timeouts: &Timeouts) -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(RpcActionProvider::new(
            Arc::new(TemplateMessageBuilder),
            Arc::new(StructuralMatcher),
            Arc::new(JsonPathValidator),
            channel,
            timeouts.rpc_action(),
        )));
        registry.register(Box::new(DelayActionProvider::new(timeouts.delay_action())));
        registry
    }

    /// Add a provider, replacing any previous one for the same type
    pub fn register(&mut self, provider: Box<dyn ActionProvider>) {
        self.providers.insert(provider.action_type(), provider);
    }

    /// Build an action from a step definition; `type` defaults to rpc
    pub fn create(&self, node: &Value) -> Result<Box<dyn Action>> {
        let action_type = match node.get("type") {
            None | Some(Value::Null) => ActionType::Rpc,
            Some(Value::String(name)) => name.parse()?,
            Some(other) => {
                return Err(Error::argument(format!(
                    "action 'type' must be a string, got {}",
                    other
                )))
            }
        };

        let provider = self.providers.get(&action_type).ok_or_else(|| {
            Error::argument(format!("no provider registered for {} actions", action_type))
        })?;
        provider.create(node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::DuplexChannel;
    use serde_json::json;

    fn registry() -> ActionRegistry {
        let (channel, _endpoint) = DuplexChannel::new();
        ActionRegistry::with_defaults(Arc::new(channel), &Timeouts::default())
    }

    #[test]
    fn test_type_defaults_to_rpc() {
        let action = registry().create(&json!({"messages": [{}]})).unwrap();
        assert_eq!(action.action_type(), ActionType::Rpc);
    }

    #[test]
    fn test_dispatches_on_type() {
        let action = registry()
            .create(&json!({"type": "Delay", "timeout": 5}))
            .unwrap();
        assert_eq!(action.action_type(), ActionType::Delay);
    }

    #[test]
    fn test_unknown_type() {
        let err = registry().create(&json!({"type": "http"})).err().unwrap();
        assert!(err.to_string().contains("http"));
    }

    #[test]
    fn test_non_string_type() {
        assert!(matches!(
            registry().create(&json!({"type": 3})),
            Err(Error::Argument(_))
        ));
    }

    #[test]
    fn test_empty_registry_has_no_providers() {
        let err = ActionRegistry::new()
            .create(&json!({"messages": [{}]}))
            .err()
            .unwrap();
        assert!(err.to_string().contains("Rpc"));
    }
}
