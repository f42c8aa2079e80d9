//! Task request and terminal result types.

use serde::{Deserialize, Serialize};
use crate::message::{ConversationId, HistoryEntry};
use crate::tool::ToolOutcome;

/// Everything the loop needs to run one task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRequest {
    /// The natural-language request
    pub task: String,

    /// Identity of the requester (an email address)
    pub caller: String,

    /// Prior exchanges, already trimmed by the caller
    #[serde(default)]
    pub history: Vec<HistoryEntry>,

    /// Conversation that scopes recent-action lookups
    #[serde(default)]
    pub conversation_id: Option<ConversationId>,
}

impl TaskRequest {
    pub fn new(task: impl Into<String>, caller: impl Into<String>) -> Self {
        Self {
            task: task.into(),
            caller: caller.into(),
            history: Vec::new(),
            conversation_id: None,
        }
    }

    pub fn with_history(mut self, history: Vec<HistoryEntry>) -> Self {
        self.history = history;
        self
    }

    pub fn with_conversation(mut self, id: ConversationId) -> Self {
        self.conversation_id = Some(id);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Success,
    PartialSuccess,
    Error,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::PartialSuccess => "partial_success",
            Self::Error => "error",
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The terminal value of one task execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskResult {
    pub status: TaskStatus,
    pub result_text: String,

    /// Outcomes in first-dispatch order
    pub actions: Vec<ToolOutcome>,
}

impl TaskResult {
    pub fn success(result_text: impl Into<String>, actions: Vec<ToolOutcome>) -> Self {
        Self { status: TaskStatus::Success, result_text: result_text.into(), actions }
    }

    pub fn partial(result_text: impl Into<String>, actions: Vec<ToolOutcome>) -> Self {
        Self { status: TaskStatus::PartialSuccess, result_text: result_text.into(), actions }
    }

    pub fn error(result_text: impl Into<String>, actions: Vec<ToolOutcome>) -> Self {
        Self { status: TaskStatus::Error, result_text: result_text.into(), actions }
    }

    pub fn is_success(&self) -> bool {
        self.status == TaskStatus::Success
    }
}
