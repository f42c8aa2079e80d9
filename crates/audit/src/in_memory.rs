//! In-memory audit store: used by tests and the `memory` backend setting.

use async_trait::async_trait;
use std::sync::Arc;
use taskpilot_core::audit::{ActionHistory, AuditRecorder, ExecutionRecord, ExecutionSummary};
use taskpilot_core::error::AuditError;
use taskpilot_core::message::ConversationId;
use taskpilot_core::tool::ToolOutcome;
use tokio::sync::RwLock;

/// Keeps records in insertion order.
pub struct InMemoryAudit {
    records: Arc<RwLock<Vec<ExecutionRecord>>>,
}

impl InMemoryAudit {
    pub fn new() -> Self {
        Self {
            records: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// A snapshot of everything recorded so far.
    pub async fn records(&self) -> Vec<ExecutionRecord> {
        self.records.read().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

impl Default for InMemoryAudit {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AuditRecorder for InMemoryAudit {
    fn name(&self) -> &str {
        "memory"
    }

    async fn record(
        &self,
        summary: &ExecutionSummary,
        outcomes: &[ToolOutcome],
    ) -> Result<(), AuditError> {
        let new_records = summary.to_records(outcomes);
        self.records.write().await.extend(new_records);
        Ok(())
    }
}

#[async_trait]
impl ActionHistory for InMemoryAudit {
    async fn recent(
        &self,
        caller: &str,
        conversation_id: Option<&ConversationId>,
        limit: usize,
    ) -> Result<Vec<ExecutionRecord>, AuditError> {
        let records = self.records.read().await;
        Ok(records
            .iter()
            .rev()
            .filter(|r| r.is_task_execution() && r.caller == caller)
            .filter(|r| match conversation_id {
                Some(c) => r.conversation_id.as_deref() == Some(c.0.as_str()),
                None => true,
            })
            .take(limit)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use taskpilot_core::task::TaskResult;

    fn summary(task: &str, caller: &str, conversation: Option<&str>) -> ExecutionSummary {
        ExecutionSummary {
            task: task.into(),
            caller: caller.into(),
            conversation_id: conversation.map(ConversationId::from),
            iterations: 1,
            result: TaskResult::success("ok", vec![ToolOutcome::completed("compose_letter", "text")]),
            error_message: None,
            duration_ms: 5,
        }
    }

    #[tokio::test]
    async fn records_task_and_tool_entries() {
        let audit = InMemoryAudit::new();
        let s = summary("first", "ann@example.com", None);
        audit.record(&s, &s.result.actions).await.unwrap();
        assert_eq!(audit.len().await, 2);
    }

    #[tokio::test]
    async fn recent_returns_task_records_newest_first() {
        let audit = InMemoryAudit::new();
        for task in ["one", "two", "three"] {
            let s = summary(task, "ann@example.com", None);
            audit.record(&s, &s.result.actions).await.unwrap();
        }
        let other = summary("not mine", "bob@example.com", None);
        audit.record(&other, &[]).await.unwrap();

        let recent = audit.recent("ann@example.com", None, 2).await.unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].task_text(), "three");
        assert_eq!(recent[1].task_text(), "two");
        assert!(recent.iter().all(|r| r.is_task_execution()));
    }

    #[tokio::test]
    async fn recent_can_be_scoped_to_conversation() {
        let audit = InMemoryAudit::new();
        let a = summary("in chat a", "ann@example.com", Some("a"));
        let b = summary("in chat b", "ann@example.com", Some("b"));
        audit.record(&a, &[]).await.unwrap();
        audit.record(&b, &[]).await.unwrap();

        let scoped = audit
            .recent("ann@example.com", Some(&ConversationId::from("a")), 10)
            .await
            .unwrap();
        assert_eq!(scoped.len(), 1);
        assert_eq!(scoped[0].task_text(), "in chat a");
    }

    #[tokio::test]
    async fn concurrent_appends_are_all_kept() {
        let audit = Arc::new(InMemoryAudit::new());
        let mut handles = Vec::new();
        for i in 0..8 {
            let audit = audit.clone();
            handles.push(tokio::spawn(async move {
                let s = summary(&format!("task {i}"), "ann@example.com", None);
                audit.record(&s, &s.result.actions).await.unwrap();
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        assert_eq!(audit.len().await, 16);
    }
}
