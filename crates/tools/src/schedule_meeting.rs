//! Meeting scheduling tool.
//!
//! Attendees are checked against the user directory; unknown addresses are
//! dropped and the caller is always added as organizer. The room itself is
//! created by the configured [`MeetingScheduler`].

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime};
use serde_json::{Map, Value};
use std::sync::Arc;
use taskpilot_core::directory::UserDirectory;
use taskpilot_core::error::ToolError;
use taskpilot_core::tool::Tool;
use tracing::info;

use crate::args::{optional_str, optional_u32, required_str, string_list};
use crate::recipients::partition;
use crate::services::{MEETING_TIME_FORMAT, MeetingRequest, MeetingScheduler};

const DEFAULT_DURATION_MINUTES: u32 = 60;

pub struct ScheduleMeetingTool {
    directory: Arc<dyn UserDirectory>,
    scheduler: Arc<dyn MeetingScheduler>,
}

impl ScheduleMeetingTool {
    pub fn new(directory: Arc<dyn UserDirectory>, scheduler: Arc<dyn MeetingScheduler>) -> Self {
        Self { directory, scheduler }
    }
}

/// ISO-8601 local date-time, with or without seconds. An explicit offset is
/// accepted and its wall-clock time kept.
fn parse_start_time(raw: &str) -> Result<NaiveDateTime, ToolError> {
    let raw = raw.trim();
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M"))
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f"))
        .or_else(|_| DateTime::parse_from_rfc3339(raw).map(|dt| dt.naive_local()))
        .map_err(|_| {
            ToolError::InvalidArguments(format!(
                "start_time must be an ISO-8601 date-time such as 2025-11-14T16:00:00, got '{raw}'"
            ))
        })
}

#[async_trait]
impl Tool for ScheduleMeetingTool {
    fn name(&self) -> &str {
        "schedule_meeting"
    }

    fn description(&self) -> &str {
        "Schedule a meeting: create a video-call link, send invitations to the attendees. \
         The organizer is the current user and is added automatically."
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "title": { "type": "string", "description": "Meeting title" },
                "start_time": {
                    "type": "string",
                    "format": "date-time",
                    "description": "Start time, ISO 8601 (e.g. 2025-11-14T16:00:00)"
                },
                "duration_minutes": { "type": "integer", "default": DEFAULT_DURATION_MINUTES },
                "attendees": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "Email addresses of the attendees"
                },
                "description": { "type": "string" }
            },
            "required": ["title", "start_time", "attendees"]
        })
    }

    async fn execute(&self, arguments: &Map<String, Value>, caller: &str) -> Result<String, ToolError> {
        let title = required_str(arguments, "title")?;
        let start = parse_start_time(required_str(arguments, "start_time")?)?;
        let duration_minutes = optional_u32(arguments, "duration_minutes", DEFAULT_DURATION_MINUTES)?;
        let requested = string_list(arguments, "attendees")?;
        let description = optional_str(arguments, "description").map(str::to_string);

        let organizer = caller.trim().to_lowercase();
        let mut split = partition(self.directory.as_ref(), &requested).await?;
        split.unknown.retain(|e| *e != organizer);

        // The organizer alone does not make a meeting.
        if split.known.iter().all(|e| *e == organizer) {
            let mut msg = String::from("No valid attendees for the meeting.");
            if !split.unknown.is_empty() {
                msg.push_str(&format!(
                    " These addresses are not registered: {}.",
                    split.unknown.join(", ")
                ));
            }
            msg.push_str(" Check the addresses and make sure the users exist.");
            return Err(ToolError::Failed(msg));
        }

        let mut attendees = split.known;
        if !attendees.contains(&organizer) {
            attendees.push(organizer.clone());
        }

        info!(title, attendees = attendees.len(), "Scheduling meeting");

        let meeting = self
            .scheduler
            .schedule(MeetingRequest {
                title: title.to_string(),
                start,
                duration_minutes,
                attendees,
                description,
                organizer,
            })
            .await?;

        let mut result = format!(
            "Meeting '{}' scheduled for {}. Link: {}. Participants: {}",
            title,
            meeting.start.format(MEETING_TIME_FORMAT),
            meeting.url,
            meeting.attendees.join(", "),
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
    use crate::services::{JitsiScheduler, RecordingMailer};
    use serde_json::json;
    use taskpilot_core::directory::{StaticDirectory, UserProfile};

    fn setup() -> (ScheduleMeetingTool, Arc<RecordingMailer>) {
        let directory = Arc::new(StaticDirectory::new(vec![
            UserProfile::email_only("ann@example.com"),
            UserProfile::email_only("bob@example.com"),
            UserProfile::email_only("cat@example.com"),
        ]));
        let mailer = Arc::new(RecordingMailer::new());
        let scheduler = Arc::new(JitsiScheduler::new("https://meet.jit.si", mailer.clone()));
        (ScheduleMeetingTool::new(directory, scheduler), mailer)
    }

    fn args(v: Value) -> Map<String, Value> {
        v.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn schedules_with_known_attendees_and_organizer() {
        let (tool, mailer) = setup();
        let out = tool
            .execute(
                &args(json!({
                    "title": "Strategy",
                    "start_time": "2025-11-14T16:00:00",
                    "attendees": ["Bob@example.com", "cat@example.com"]
                })),
                "ann@example.com",
            )
            .await
            .unwrap();

        assert!(out.starts_with("Meeting 'Strategy' scheduled for 14.11.2025 16:00."));
        assert!(out.contains("https://meet.jit.si/strategy-"));
        assert!(out.contains("Participants: bob@example.com, cat@example.com, ann@example.com"));
        assert_eq!(mailer.sent().len(), 3);
    }

    #[tokio::test]
    async fn unknown_attendees_are_skipped() {
        let (tool, _) = setup();
        let out = tool
            .execute(
                &args(json!({
                    "title": "Sync",
                    "start_time": "2025-11-14T09:30",
                    "attendees": ["bob@example.com", "ghost@example.com"]
                })),
                "ann@example.com",
            )
            .await
            .unwrap();
        assert!(out.contains("Skipped unknown addresses: ghost@example.com"));
        assert!(!out.contains("Participants: bob@example.com, ghost"));
    }

    #[tokio::test]
    async fn fails_when_no_attendee_is_known() {
        let (tool, mailer) = setup();
        let err = tool
            .execute(
                &args(json!({
                    "title": "Sync",
                    "start_time": "2025-11-14T09:30:00",
                    "attendees": ["ghost@example.com"]
                })),
                "ann@example.com",
            )
            .await
            .unwrap_err();
        let msg = err.to_string();
        assert!(msg.starts_with("No valid attendees for the meeting."));
        assert!(msg.contains("ghost@example.com"));
        assert!(mailer.sent().is_empty());
    }

    #[tokio::test]
    async fn rejects_bad_start_time() {
        let (tool, _) = setup();
        let err = tool
            .execute(
                &args(json!({
                    "title": "Sync",
                    "start_time": "tomorrow at five",
                    "attendees": ["bob@example.com"]
                })),
                "ann@example.com",
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }

    #[tokio::test]
    async fn missing_title_is_invalid() {
        let (tool, _) = setup();
        let err = tool
            .execute(
                &args(json!({"start_time": "2025-11-14T09:30:00", "attendees": ["bob@example.com"]})),
                "ann@example.com",
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }

    #[test]
    fn start_time_formats() {
        assert!(parse_start_time("2025-11-14T16:00:00").is_ok());
        assert!(parse_start_time("2025-11-14T16:00").is_ok());
        let with_offset = parse_start_time("2025-11-14T16:00:00+03:00").unwrap();
        assert_eq!(with_offset.format("%H:%M").to_string(), "16:00");
        assert!(parse_start_time("14.11.2025").is_err());
    }
}
