//! Letter composition tool. Produces text only; nothing is sent.

use async_trait::async_trait;
use serde_json::{Map, Value};
use taskpilot_core::error::ToolError;
use taskpilot_core::tool::Tool;

use crate::args::required_str;

pub struct ComposeLetterTool;

#[async_trait]
impl Tool for ComposeLetterTool {
    fn name(&self) -> &str {
        "compose_letter"
    }

    fn description(&self) -> &str {
        "Compose the text of a letter without sending it."
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "recipient": { "type": "string", "description": "Recipient email address" },
                "subject": { "type": "string" },
                "content": { "type": "string", "description": "Body of the letter" }
            },
            "required": ["recipient", "subject", "content"]
        })
    }

    async fn execute(&self, arguments: &Map<String, Value>, _caller: &str) -> Result<String, ToolError> {
        let recipient = required_str(arguments, "recipient")?;
        let subject = required_str(arguments, "subject")?;
        let content = required_str(arguments, "content")?;

        Ok(format!(
            "Letter composed for {recipient}:\nSubject: {subject}\n\n{content}"
        ))
    }
}
