//! Collaborators the business tools delegate to.
//!
//! Mail delivery and calendar provisioning live outside this system; these
//! traits are the seam. `LogMailer` only traces, `RecordingMailer` keeps an
//! outbox for inspection, and `JitsiScheduler` builds a meeting room link and
//! mails the invitations.

use async_trait::async_trait;
use chrono::NaiveDateTime;
use std::sync::{Arc, Mutex};
use taskpilot_core::error::ToolError;
use tracing::{info, warn};
use uuid::Uuid;

/// Display format for meeting times.
pub const MEETING_TIME_FORMAT: &str = "%d.%m.%Y %H:%M";

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), ToolError>;

    /// Send the same message to every recipient. Stops at the first failure.
    async fn send_bulk(&self, to: &[String], subject: &str, body: &str) -> Result<(), ToolError> {
        for recipient in to {
            self.send(recipient, subject, body).await?;
        }
        Ok(())
    }
}

/// A mailer that only logs what it would send.
#[derive(Debug, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), ToolError> {
        info!(to, subject, body_len = body.len(), "Mail dispatched");
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// A mailer that keeps every message in memory.
///
/// Addresses listed in `failing` are rejected, which lets callers exercise
/// partial delivery.
#[derive(Debug, Default)]
pub struct RecordingMailer {
    outbox: Mutex<Vec<SentMail>>,
    failing: Vec<String>,
}

impl RecordingMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_for(addresses: &[&str]) -> Self {
        Self {
            outbox: Mutex::new(Vec::new()),
            failing: addresses.iter().map(|a| a.to_string()).collect(),
        }
    }

    pub fn sent(&self) -> Vec<SentMail> {
        self.outbox.lock().map(|o| o.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), ToolError> {
        if self.failing.iter().any(|a| a == to) {
            return Err(ToolError::Failed(format!("Mailbox unavailable: {to}")));
        }
        let mut outbox = self
            .outbox
            .lock()
            .map_err(|e| ToolError::Failed(format!("Outbox lock poisoned: {e}")))?;
        outbox.push(SentMail {
            to: to.to_string(),
            subject: subject.to_string(),
            body: body.to_string(),
        });
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct MeetingRequest {
    pub title: String,
    pub start: NaiveDateTime,
    pub duration_minutes: u32,
    pub attendees: Vec<String>,
    pub description: Option<String>,
    pub organizer: String,
}

#[derive(Debug, Clone)]
pub struct ScheduledMeeting {
    pub room_id: String,
    pub url: String,
    pub start: NaiveDateTime,
    pub attendees: Vec<String>,
}

#[async_trait]
pub trait MeetingScheduler: Send + Sync {
    async fn schedule(&self, request: MeetingRequest) -> Result<ScheduledMeeting, ToolError>;
}

/// Creates Jitsi Meet rooms and mails an invitation to each attendee.
pub struct JitsiScheduler {
    base_url: String,
    mailer: Arc<dyn Mailer>,
}

impl JitsiScheduler {
    pub fn new(base_url: impl Into<String>, mailer: Arc<dyn Mailer>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            mailer,
        }
    }

    fn invitation_body(request: &MeetingRequest, url: &str) -> String {
        let mut body = format!(
            "You are invited to a meeting: {}\n\nTime: {}\nDuration: {} minutes\n\nVideo call (Jitsi Meet): {}\n",
            request.title,
            request.start.format(MEETING_TIME_FORMAT),
            request.duration_minutes,
            url,
        );
        if let Some(description) = &request.description {
            body.push_str(&format!("\nDescription: {description}\n"));
        }
        body.push_str("\nOpen the link to join. No registration is required.\n");
        body
    }
}

/// Lower-case alphanumerics of the title plus eight hex characters.
pub fn room_id(title: &str) -> String {
    let sanitized: String = title
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_lowercase();
    let suffix: String = Uuid::new_v4().simple().to_string().chars().take(8).collect();
    format!("{sanitized}-{suffix}")
}

#[async_trait]
impl MeetingScheduler for JitsiScheduler {
    async fn schedule(&self, request: MeetingRequest) -> Result<ScheduledMeeting, ToolError> {
        let room_id = room_id(&request.title);
        let url = format!("{}/{}", self.base_url, room_id);
        let subject = format!("Meeting invitation: {}", request.title);
        let body = Self::invitation_body(&request, &url);

        for attendee in &request.attendees {
            if let Err(e) = self.mailer.send(attendee, &subject, &body).await {
                warn!(attendee = %attendee, error = %e, "Invitation not delivered");
            }
        }

        info!(
            title = %request.title,
            organizer = %request.organizer,
            attendees = request.attendees.len(),
            url = %url,
            "Meeting scheduled"
        );

        Ok(ScheduledMeeting {
            room_id,
            url,
            start: request.start,
            attendees: request.attendees,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(attendees: &[&str]) -> MeetingRequest {
        MeetingRequest {
            title: "Q3 Planning!".into(),
            start: NaiveDateTime::parse_from_str("2025-11-14T16:00:00", "%Y-%m-%dT%H:%M:%S").unwrap(),
            duration_minutes: 45,
            attendees: attendees.iter().map(|a| a.to_string()).collect(),
            description: Some("Budget review".into()),
            organizer: "ann@example.com".into(),
        }
    }

    #[test]
    fn room_id_is_sanitized_with_suffix() {
        let id = room_id("Q3 Planning!");
        let (name, suffix) = id.rsplit_once('-').unwrap();
        assert_eq!(name, "q3planning");
        assert_eq!(suffix.len(), 8);
        assert!(suffix.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[tokio::test]
    async fn jitsi_scheduler_mails_every_attendee() {
        let mailer = Arc::new(RecordingMailer::new());
        let scheduler = JitsiScheduler::new("https://meet.jit.si/", mailer.clone());

        let meeting = scheduler
            .schedule(request(&["ann@example.com", "bob@example.com"]))
            .await
            .unwrap();

        assert!(meeting.url.starts_with("https://meet.jit.si/q3planning-"));
        let sent = mailer.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].subject, "Meeting invitation: Q3 Planning!");
        assert!(sent[0].body.contains("14.11.2025 16:00"));
        assert!(sent[0].body.contains("45 minutes"));
        assert!(sent[0].body.contains("Budget review"));
        assert!(sent[0].body.contains(&meeting.url));
    }

    #[tokio::test]
    async fn failed_invitation_does_not_fail_scheduling() {
        let mailer = Arc::new(RecordingMailer::failing_for(&["bob@example.com"]));
        let scheduler = JitsiScheduler::new("https://meet.jit.si", mailer.clone());

        let meeting = scheduler
            .schedule(request(&["ann@example.com", "bob@example.com"]))
            .await
            .unwrap();

        assert_eq!(meeting.attendees.len(), 2);
        assert_eq!(mailer.sent().len(), 1);
    }

    #[tokio::test]
    async fn bulk_send_stops_at_first_failure() {
        let mailer = RecordingMailer::failing_for(&["bad@example.com"]);
        let to = vec!["a@example.com".to_string(), "bad@example.com".to_string(), "c@example.com".to_string()];
        let err = mailer.send_bulk(&to, "s", "b").await.unwrap_err();
        assert!(err.to_string().contains("bad@example.com"));
        assert_eq!(mailer.sent().len(), 1);
    }
}
