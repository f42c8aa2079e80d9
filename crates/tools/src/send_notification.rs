//! Email notification tool.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::Arc;
use taskpilot_core::directory::UserDirectory;
use taskpilot_core::error::ToolError;
use taskpilot_core::tool::Tool;

use crate::args::{required_str, string_list};
use crate::recipients::partition;
use crate::services::Mailer;

pub struct SendNotificationTool {
    directory: Arc<dyn UserDirectory>,
    mailer: Arc<dyn Mailer>,
}

impl SendNotificationTool {
    pub fn new(directory: Arc<dyn UserDirectory>, mailer: Arc<dyn Mailer>) -> Self {
        Self { directory, mailer }
    }
}

#[async_trait]
impl Tool for SendNotificationTool {
    fn name(&self) -> &str {
        "send_notification"
    }

    fn description(&self) -> &str {
        "Send an email notification to one or more registered users."
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "recipients": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "Email addresses of the recipients"
                },
                "subject": { "type": "string" },
                "message": { "type": "string" }
            },
            "required": ["recipients", "subject", "message"]
        })
    }

    async fn execute(&self, arguments: &Map<String, Value>, _caller: &str) -> Result<String, ToolError> {
        let requested = string_list(arguments, "recipients")?;
        let subject = required_str(arguments, "subject")?;
        let message = required_str(arguments, "message")?;

        let split = partition(self.directory.as_ref(), &requested).await?;
        if split.known.is_empty() {
            let mut msg = String::from("No valid recipients for the notification.");
            if !split.unknown.is_empty() {
                msg.push_str(&format!(
                    " These addresses are not registered: {}.",
                    split.unknown.join(", ")
                ));
            }
            msg.push_str(" Check the addresses and make sure the users exist.");
            return Err(ToolError::Failed(msg));
        }

        self.mailer.send_bulk(&split.known, subject, message).await?;

        let mut result = format!(
            "Notifications sent to {} recipients: {}",
            split.known.len(),
            split.known.join(", ")
        );
        if !split.unknown.is_empty() {
            result.push_str(&format!(". Skipped unknown addresses: {}", split.unknown.join(", ")));
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::RecordingMailer;
    use serde_json::json;
    use taskpilot_core::directory::{StaticDirectory, UserProfile};

    fn setup(mailer: Arc<RecordingMailer>) -> SendNotificationTool {
        let directory = Arc::new(StaticDirectory::new(vec![
            UserProfile::email_only("ann@example.com"),
            UserProfile::email_only("bob@example.com"),
        ]));
        SendNotificationTool::new(directory, mailer)
    }

    fn args(v: Value) -> Map<String, Value> {
        v.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn sends_to_known_recipients() {
        let mailer = Arc::new(RecordingMailer::new());
        let tool = setup(mailer.clone());
        let out = tool
            .execute(
                &args(json!({
                    "recipients": ["ann@example.com", "BOB@example.com", "nobody@example.com"],
                    "subject": "Release",
                    "message": "Shipping Friday"
                })),
                "ann@example.com",
            )
            .await
            .unwrap();

        assert!(out.starts_with("Notifications sent to 2 recipients: ann@example.com, bob@example.com"));
        assert!(out.contains("Skipped unknown addresses: nobody@example.com"));
        let sent = mailer.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[1].to, "bob@example.com");
        assert_eq!(sent[1].body, "Shipping Friday");
    }

    #[tokio::test]
    async fn fails_without_known_recipients() {
        let mailer = Arc::new(RecordingMailer::new());
        let tool = setup(mailer.clone());
        let err = tool
            .execute(
                &args(json!({"recipients": ["x@example.com"], "subject": "s", "message": "m"})),
                "ann@example.com",
            )
            .await
            .unwrap_err();
        assert!(err.to_string().starts_with("No valid recipients"));
        assert!(err.to_string().contains("x@example.com"));
        assert!(mailer.sent().is_empty());
    }

    #[tokio::test]
    async fn mailer_failure_surfaces() {
        let mailer = Arc::new(RecordingMailer::failing_for(&["bob@example.com"]));
        let tool = setup(mailer);
        let err = tool
            .execute(
                &args(json!({"recipients": ["bob@example.com"], "subject": "s", "message": "m"})),
                "ann@example.com",
            )
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Mailbox unavailable: bob@example.com");
    }

    #[tokio::test]
    async fn missing_message_is_invalid() {
        let tool = setup(Arc::new(RecordingMailer::new()));
        let err = tool
            .execute(
                &args(json!({"recipients": ["bob@example.com"], "subject": "s"})),
                "ann@example.com",
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }
}
