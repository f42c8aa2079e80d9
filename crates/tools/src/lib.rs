//! Built-in tool implementations for taskpilot.
//!
//! Tools let the agent act for the caller: schedule meetings, send
//! notifications to colleagues, and draft letters. Mail delivery and meeting
//! rooms are reached through the [`Mailer`] and [`MeetingScheduler`] traits.

mod args;
mod recipients;

pub mod compose_letter;
pub mod schedule_meeting;
pub mod send_notification;
pub mod services;

use std::sync::Arc;
use taskpilot_core::directory::UserDirectory;
use taskpilot_core::tool::ToolRegistry;

pub use compose_letter::ComposeLetterTool;
pub use schedule_meeting::ScheduleMeetingTool;
pub use send_notification::SendNotificationTool;
pub use services::{
    JitsiScheduler, LogMailer, Mailer, MeetingRequest, MeetingScheduler, RecordingMailer,
    ScheduledMeeting, SentMail,
};

/// Create a tool registry with all built-in tools.
pub fn default_registry(
    directory: Arc<dyn UserDirectory>,
    scheduler: Arc<dyn MeetingScheduler>,
    mailer: Arc<dyn Mailer>,
) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Box::new(ScheduleMeetingTool::new(directory.clone(), scheduler)));
    registry.register(Box::new(SendNotificationTool::new(directory, mailer)));
    registry.register(Box::new(ComposeLetterTool));
    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use taskpilot_core::directory::StaticDirectory;

    #[test]
    fn default_registry_has_all_tools() {
        let mailer: Arc<dyn Mailer> = Arc::new(LogMailer);
        let scheduler = Arc::new(JitsiScheduler::new("https://meet.jit.si", mailer.clone()));
        let registry = default_registry(Arc::new(StaticDirectory::default()), scheduler, mailer);
        assert_eq!(
            registry.names(),
            vec!["compose_letter", "schedule_meeting", "send_notification"]
        );
    }
}
