//! Conversation turn types.
//!
//! These are the value objects that flow between the loop and the model:
//! caller request → system + history + user turns → model → assistant turn →
//! tool results → model again.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque identifier of the caller's conversation (chat), used to scope
/// recent-action lookups.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConversationId(pub String);

impl ConversationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Default for ConversationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConversationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The role of a turn in the model-facing conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Instructions (identity, task context, corrective nudges)
    System,
    /// The end user
    User,
    /// The model
    Assistant,
    /// The outcome of one tool invocation
    ToolResult,
}

/// Reference from a tool result back to the invocation that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvocationRef {
    /// Tool name
    pub name: String,

    /// Provider call ID, present only for structured tool calls
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub call_id: Option<String>,
}

/// A single turn in the conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    /// Unique turn ID
    pub id: String,

    /// Who produced this turn
    pub role: Role,

    /// The text content
    pub content: String,

    /// Structured tool calls requested by the model (if any)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<MessageToolCall>,

    /// For tool results: the invocation this turn answers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invocation: Option<InvocationRef>,

    /// Timestamp
    pub timestamp: DateTime<Utc>,
}

impl Turn {
    fn new(role: Role, content: String) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            content,
            tool_calls: Vec::new(),
            invocation: None,
            timestamp: Utc::now(),
        }
    }

    /// Create a new system turn.
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content.into())
    }

    /// Create a new user turn.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content.into())
    }

    /// Create a new assistant turn.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content.into())
    }

    /// Create a tool result turn answering `invocation`.
    pub fn tool_result(invocation: InvocationRef, content: impl Into<String>) -> Self {
        let mut turn = Self::new(Role::ToolResult, content.into());
        turn.invocation = Some(invocation);
        turn
    }

    /// Whether the model produced no usable text.
    pub fn is_blank(&self) -> bool {
        self.content.trim().is_empty()
    }
}

/// A structured tool call attached to an assistant turn by the provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageToolCall {
    /// Provider-assigned ID for this tool call
    pub id: String,

    /// Name of the tool to invoke. Providers occasionally omit it.
    #[serde(default)]
    pub name: Option<String>,

    /// Arguments as a JSON string, exactly as the provider sent them
    #[serde(default)]
    pub arguments: String,
}

/// One prior exchange supplied by the caller, e.g. from the chat window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub role: String,
    pub content: String,
}

impl HistoryEntry {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }

    /// Convert into a conversation turn. Only `user` and `assistant` entries
    /// with content are accepted.
    pub fn to_turn(&self) -> Option<Turn> {
        if self.content.is_empty() {
            return None;
        }
        match self.role.as_str() {
            "user" => Some(Turn::user(&self.content)),
            "assistant" => Some(Turn::assistant(&self.content)),
            _ => None,
        }
    }
}
