//! System prompt and corrective nudge.
//!
//! Both teach the text-channel call syntax and are built from the same
//! marker constants the interpreter scans for.

use chrono::NaiveDate;
use taskpilot_core::audit::ExecutionRecord;
use taskpilot_core::directory::UserProfile;
use taskpilot_core::provider::ToolDefinition;

use crate::interpreter::{ARGUMENTS_MARKER, CALL_MARKER};

/// Everything the system prompt is grounded on.
pub struct PromptContext<'a> {
    pub profile: &'a UserProfile,
    pub recent: &'a [ExecutionRecord],
    pub tools: &'a [ToolDefinition],
    pub known_users: &'a [String],
    pub today: NaiveDate,
    /// Recent task texts are cut to this many characters
    pub preview_chars: usize,
}

pub fn build_system_prompt(ctx: &PromptContext<'_>) -> String {
    let mut prompt = String::from("You are a task agent acting on behalf of a business user.\n\n");

    prompt.push_str("## User\n");
    push_field(&mut prompt, "Email", &ctx.profile.email);
    push_field(&mut prompt, "First name", &ctx.profile.first_name);
    push_field(&mut prompt, "Last name", &ctx.profile.last_name);
    push_field(&mut prompt, "Department", &ctx.profile.department);
    push_field(&mut prompt, "Role", &ctx.profile.role);
    prompt.push('\n');

    if !ctx.recent.is_empty() {
        prompt.push_str("## Recent tasks of this user\n");
        for record in ctx.recent {
            prompt.push_str(&format!(
                "- {} (status: {})\n",
                preview(record.task_text(), ctx.preview_chars),
                record.status
            ));
        }
        prompt.push('\n');
    }

    prompt.push_str(
        "Your job: understand the user's request and carry it out by calling tools.\n\n",
    );

    prompt.push_str("## Tools\n");
    for (i, tool) in ctx.tools.iter().enumerate() {
        prompt.push_str(&format!("{}. {} - {}\n", i + 1, tool.name, tool.description));
        prompt.push_str(&format!("   Parameters: {}\n", tool.parameters));
    }
    prompt.push('\n');

    if !ctx.known_users.is_empty() {
        prompt.push_str("## Registered users\n");
        for email in ctx.known_users {
            prompt.push_str(&format!("- {email}\n"));
        }
        prompt.push('\n');
    }

    prompt.push_str("## Rules\n");
    prompt.push_str(&format!(
        "1. Today is {}. Resolve relative dates such as \"tomorrow\" from it.\n",
        ctx.today.format("%Y-%m-%d")
    ));
    prompt.push_str(&format!(
        "2. The user's email is {}. It is the organizer of every meeting; never ask for it.\n",
        ctx.profile.email
    ));
    prompt.push_str("3. Use only the registered addresses listed above. Never invent an address.\n");
    prompt.push_str(
        "4. If the user names someone who is not registered, say so instead of guessing.\n",
    );
    prompt.push_str(
        "5. Never claim an action is done until you have called the tool and seen its result.\n",
    );
    prompt.push_str(
        "6. Call each tool once per distinct request. After a tool result arrives, report it to the user.\n",
    );
    prompt.push_str("7. Dates and times use ISO 8601, e.g. 2025-11-14T15:00:00.\n\n");

    prompt.push_str("## Calling a tool\n");
    prompt.push_str("Reply with exactly these two lines, and nothing else, to call a tool:\n");
    prompt.push_str(&format!("{CALL_MARKER} tool_name\n"));
    prompt.push_str(&format!(
        "{ARGUMENTS_MARKER} {{\"param1\": \"value1\", \"param2\": \"value2\"}}\n\n"
    ));
    prompt.push_str("Example:\n");
    prompt.push_str(&example_call());
    prompt.push_str("\n\nNever answer with an empty message. When the work is done, answer in plain text.\n");

    prompt
}

/// Appended after an empty model response.
pub fn nudge() -> String {
    format!(
        "Your last reply was empty. Respond to the user's request with a concrete action. \
         To act, call a tool using exactly this format:\n{}\n\
         Do not return an empty reply and do not describe what you are about to do: call the tool.",
        example_call()
    )
}

fn example_call() -> String {
    format!(
        "{CALL_MARKER} schedule_meeting\n{ARGUMENTS_MARKER} {{\"title\": \"Planning\", \"start_time\": \"2025-11-14T16:00:00\", \"attendees\": [\"colleague@example.com\"]}}"
    )
}

fn push_field(prompt: &mut String, label: &str, value: &str) {
    if !value.trim().is_empty() {
        prompt.push_str(&format!("- {label}: {value}\n"));
    }
}

fn preview(text: &str, max_chars: usize) -> String {
    if text.chars().count() > max_chars {
        let cut: String = text.chars().take(max_chars).collect();
        format!("{cut}...")
    } else {
        text.to_string()
    }
}
