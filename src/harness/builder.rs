//! Concrete message construction from outgoing templates

use serde_json::Value;

use crate::common::{Error, Result};
use crate::stream::StreamingMessage;

use super::template::OutgoingTemplate;
use super::variables::VariableStore;

/// Materializes outgoing templates into messages
pub trait MessageBuilder: Send + Sync {
    fn build(&self, template: &OutgoingTemplate, variables: &VariableStore)
        -> Result<StreamingMessage>;
}

/// Default builder: fills the request id and substitutes variables
#[derive(Debug, Default, Clone, Copy)]
pub struct TemplateMessageBuilder;

impl MessageBuilder for TemplateMessageBuilder {
    fn build(
        &self,
        template: &OutgoingTemplate,
        variables: &VariableStore,
    ) -> Result<StreamingMessage> {
        let request_id = match &template.request_id {
            Some(id) => match variables.resolve_str(id, None)? {
                Value::String(id) => id,
                other => other.to_string(),
            },
            None => uuid::Uuid::new_v4().to_string(),
        };

        let payload = variables.resolve(&template.payload, Some(&request_id))?;

        match &template.message_type {
            Some(message_type) => Ok(StreamingMessage::new(request_id, message_type, payload)),
            None => match payload {
                Value::Object(content) => {
                    let mut message = StreamingMessage::empty(request_id);
                    message.content = content;
                    Ok(message)
                }
                other => Err(Error::argument(format!(
                    "payload without 'messageType' must be an object, got {}",
                    other
                ))),
            },
        }
    }
}
