//! Audit trait: persistent records of task executions.
//!
//! Each finished task yields one `task_execution` record plus one record per
//! tool outcome. Records are created once and never mutated. The same store
//! answers the recent-action lookup that gives the model short-term memory
//! across calls.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;
use crate::error::AuditError;
use crate::message::ConversationId;
use crate::task::TaskResult;
use crate::tool::ToolOutcome;

/// Action type of the per-task summary record.
pub const TASK_EXECUTION: &str = "task_execution";

/// A single persisted audit record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub id: String,

    /// Identity of the caller the task ran for
    pub caller: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,

    /// `task_execution` or the tool name
    pub action_type: String,

    pub input: serde_json::Value,
    pub output: serde_json::Value,

    /// `success` / `partial_success` / `error` for tasks,
    /// `completed` / `failed` for tools
    pub status: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,

    pub duration_ms: u64,
    pub created_at: DateTime<Utc>,
}

impl ExecutionRecord {
    /// The task text, for `task_execution` records.
    pub fn task_text(&self) -> &str {
        self.input.get("task").and_then(|v| v.as_str()).unwrap_or_default()
    }

    pub fn is_task_execution(&self) -> bool {
        self.action_type == TASK_EXECUTION
    }
}

/// What the loop hands to the recorder once it reaches a terminal state.
#[derive(Debug, Clone)]
pub struct ExecutionSummary {
    pub task: String,
    pub caller: String,
    pub conversation_id: Option<ConversationId>,

    /// Model round-trips performed
    pub iterations: u32,

    pub result: TaskResult,

    /// Underlying cause for `error` results, kept for operators
    pub error_message: Option<String>,

    pub duration_ms: u64,
}

impl ExecutionSummary {
    /// Expand into the records to persist: the task record first, then one
    /// record per outcome in dispatch order.
    pub fn to_records(&self, outcomes: &[ToolOutcome]) -> Vec<ExecutionRecord> {
        let now = Utc::now();
        let conversation_id = self.conversation_id.as_ref().map(|c| c.0.clone());

        let actions: Vec<serde_json::Value> = outcomes
            .iter()
            .map(|o| serde_json::to_value(o).unwrap_or(serde_json::Value::Null))
            .collect();

        let mut records = Vec::with_capacity(outcomes.len() + 1);
        records.push(ExecutionRecord {
            id: Uuid::new_v4().to_string(),
            caller: self.caller.clone(),
            conversation_id: conversation_id.clone(),
            action_type: TASK_EXECUTION.to_string(),
            input: json!({ "task": self.task, "iterations": self.iterations }),
            output: json!({
                "result": self.result.result_text,
                "status": self.result.status.as_str(),
                "actions": actions,
            }),
            status: self.result.status.as_str().to_string(),
            error_message: self.error_message.clone(),
            duration_ms: self.duration_ms,
            created_at: now,
        });

        for outcome in outcomes {
            records.push(ExecutionRecord {
                id: Uuid::new_v4().to_string(),
                caller: self.caller.clone(),
                conversation_id: conversation_id.clone(),
                action_type: outcome.name.clone(),
                input: json!({
                    "task": self.task,
                    "tool": outcome.name,
                    "arguments": outcome.arguments,
                }),
                output: json!({
                    "status": outcome.status.as_str(),
                    "output": outcome.output,
                }),
                status: outcome.status.as_str().to_string(),
                error_message: outcome.error_message().map(str::to_string),
                duration_ms: outcome.duration_ms,
                created_at: now,
            });
        }
        records
    }
}

/// Persists execution records. Must tolerate concurrent appends.
#[async_trait]
pub trait AuditRecorder: Send + Sync {
    /// The backend name (e.g., "sqlite", "memory").
    fn name(&self) -> &str;

    /// Persist one execution and its tool outcomes.
    async fn record(
        &self,
        summary: &ExecutionSummary,
        outcomes: &[ToolOutcome],
    ) -> std::result::Result<(), AuditError>;
}

/// Looks up recent task executions for a caller.
#[async_trait]
pub trait ActionHistory: Send + Sync {
    /// The last `limit` `task_execution` records for `caller`, newest first,
    /// optionally restricted to one conversation.
    async fn recent(
        &self,
        caller: &str,
        conversation_id: Option<&ConversationId>,
        limit: usize,
    ) -> std::result::Result<Vec<ExecutionRecord>, AuditError>;
}
