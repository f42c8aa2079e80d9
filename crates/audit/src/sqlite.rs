//! SQLite audit store.
//!
//! A single `audit_records` table holds both the per-task summary rows and
//! the per-tool rows. JSON payloads are stored as text. One execution is
//! written in a single transaction.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};
use std::path::Path;
use std::str::FromStr;
use taskpilot_core::audit::{
    ActionHistory, AuditRecorder, ExecutionRecord, ExecutionSummary, TASK_EXECUTION,
};
use taskpilot_core::error::AuditError;
use taskpilot_core::message::ConversationId;
use taskpilot_core::tool::ToolOutcome;
use tracing::{debug, info};

pub struct SqliteAudit {
    pool: SqlitePool,
}

impl SqliteAudit {
    /// Open (or create) a database from a connection string.
    ///
    /// Pass `"sqlite::memory:"` for an ephemeral database.
    pub async fn new(url: &str) -> Result<Self, AuditError> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(|e| AuditError::Storage(format!("Invalid SQLite path: {e}")))?;
        // Each connection to an in-memory database sees its own database.
        let max_connections = if url.contains(":memory:") { 1 } else { 4 };
        Self::connect(options, max_connections, url).await
    }

    /// Open (or create) a database file, creating parent directories.
    pub async fn open(path: &Path) -> Result<Self, AuditError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| AuditError::Storage(format!("Cannot create {}: {e}", parent.display())))?;
            }
        }
        let options = SqliteConnectOptions::new().filename(path);
        Self::connect(options, 4, &path.display().to_string()).await
    }

    async fn connect(
        options: SqliteConnectOptions,
        max_connections: u32,
        label: &str,
    ) -> Result<Self, AuditError> {
        let options = options
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .map_err(|e| AuditError::Storage(format!("Failed to open SQLite: {e}")))?;

        let store = Self { pool };
        store.run_migrations().await?;
        info!("SQLite audit store initialized at {label}");
        Ok(store)
    }

    async fn run_migrations(&self) -> Result<(), AuditError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS audit_records (
                iid             INTEGER PRIMARY KEY AUTOINCREMENT,
                id              TEXT UNIQUE NOT NULL,
                caller          TEXT NOT NULL,
                conversation_id TEXT,
                action_type     TEXT NOT NULL,
                input           TEXT NOT NULL,
                output          TEXT NOT NULL,
                status          TEXT NOT NULL,
                error_message   TEXT,
                duration_ms     INTEGER NOT NULL DEFAULT 0,
                created_at      TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| AuditError::MigrationFailed(format!("audit_records table: {e}")))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_audit_caller_type ON audit_records(caller, action_type, iid DESC)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| AuditError::MigrationFailed(format!("caller index: {e}")))?;

        debug!("SQLite audit migrations complete");
        Ok(())
    }

    fn row_to_record(row: &sqlx::sqlite::SqliteRow) -> Result<ExecutionRecord, AuditError> {
        let col = |name: &str, e: sqlx::Error| AuditError::QueryFailed(format!("{name} column: {e}"));

        let id: String = row.try_get("id").map_err(|e| col("id", e))?;
        let caller: String = row.try_get("caller").map_err(|e| col("caller", e))?;
        let conversation_id: Option<String> =
            row.try_get("conversation_id").map_err(|e| col("conversation_id", e))?;
        let action_type: String = row.try_get("action_type").map_err(|e| col("action_type", e))?;
        let input: String = row.try_get("input").map_err(|e| col("input", e))?;
        let output: String = row.try_get("output").map_err(|e| col("output", e))?;
        let status: String = row.try_get("status").map_err(|e| col("status", e))?;
        let error_message: Option<String> =
            row.try_get("error_message").map_err(|e| col("error_message", e))?;
        let duration_ms: i64 = row.try_get("duration_ms").map_err(|e| col("duration_ms", e))?;
        let created_at: String = row.try_get("created_at").map_err(|e| col("created_at", e))?;

        Ok(ExecutionRecord {
            id,
            caller,
            conversation_id,
            action_type,
            input: serde_json::from_str(&input).unwrap_or(serde_json::Value::Null),
            output: serde_json::from_str(&output).unwrap_or(serde_json::Value::Null),
            status,
            error_message,
            duration_ms: u64::try_from(duration_ms).unwrap_or_default(),
            created_at: chrono::DateTime::parse_from_rfc3339(&created_at)
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(|_| Utc::now()),
        })
    }

    /// Total number of stored records.
    pub async fn count(&self) -> Result<usize, AuditError> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM audit_records")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| AuditError::QueryFailed(format!("COUNT failed: {e}")))?;
        let n: i64 = row
            .try_get("n")
            .map_err(|e| AuditError::QueryFailed(format!("count column: {e}")))?;
        Ok(usize::try_from(n).unwrap_or_default())
    }
}

#[async_trait]
impl AuditRecorder for SqliteAudit {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn record(
        &self,
        summary: &ExecutionSummary,
        outcomes: &[ToolOutcome],
    ) -> Result<(), AuditError> {
        let records = summary.to_records(outcomes);

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AuditError::Storage(format!("BEGIN failed: {e}")))?;

        for record in &records {
            sqlx::query(
                r#"
                INSERT INTO audit_records
                    (id, caller, conversation_id, action_type, input, output, status, error_message, duration_ms, created_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                "#,
            )
            .bind(&record.id)
            .bind(&record.caller)
            .bind(&record.conversation_id)
            .bind(&record.action_type)
            .bind(record.input.to_string())
            .bind(record.output.to_string())
            .bind(&record.status)
            .bind(&record.error_message)
            .bind(i64::try_from(record.duration_ms).unwrap_or(i64::MAX))
            .bind(record.created_at.to_rfc3339())
            .execute(&mut *tx)
            .await
            .map_err(|e| AuditError::Storage(format!("INSERT failed: {e}")))?;
        }

        tx.commit()
            .await
            .map_err(|e| AuditError::Storage(format!("COMMIT failed: {e}")))?;

        debug!(records = records.len(), caller = %summary.caller, "Execution recorded");
        Ok(())
    }
}

#[async_trait]
impl ActionHistory for SqliteAudit {
    async fn recent(
        &self,
        caller: &str,
        conversation_id: Option<&ConversationId>,
        limit: usize,
    ) -> Result<Vec<ExecutionRecord>, AuditError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = match conversation_id {
            Some(c) => {
                sqlx::query(
                    r#"
                    SELECT * FROM audit_records
                    WHERE caller = ?1 AND action_type = ?2 AND conversation_id = ?3
                    ORDER BY iid DESC
                    LIMIT ?4
                    "#,
                )
                .bind(caller)
                .bind(TASK_EXECUTION)
                .bind(&c.0)
                .bind(limit)
                .fetch_all(&self.pool)
                .await
            }
            None => {
                sqlx::query(
                    r#"
                    SELECT * FROM audit_records
                    WHERE caller = ?1 AND action_type = ?2
                    ORDER BY iid DESC
                    LIMIT ?3
                    "#,
                )
                .bind(caller)
                .bind(TASK_EXECUTION)
                .bind(limit)
                .fetch_all(&self.pool)
                .await
            }
        }
        .map_err(|e| AuditError::QueryFailed(format!("Recent lookup failed: {e}")))?;

        rows.iter().map(Self::row_to_record).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use taskpilot_core::task::TaskResult;

    async fn test_store() -> SqliteAudit {
        SqliteAudit::new("sqlite::memory:").await.unwrap()
    }

    fn summary(task: &str, conversation: Option<&str>) -> ExecutionSummary {
        let mut failed = ToolOutcome::failed("send_notification", "No valid recipients for the notification.");
        failed.duration_ms = 3;
        ExecutionSummary {
            task: task.into(),
            caller: "ann@example.com".into(),
            conversation_id: conversation.map(ConversationId::from),
            iterations: 2,
            result: TaskResult::partial("partial", vec![failed]),
            error_message: None,
            duration_ms: 120,
        }
    }

    #[tokio::test]
    async fn record_writes_task_and_tool_rows() {
        let store = test_store().await;
        let s = summary("Notify the team", None);
        store.record(&s, &s.result.actions).await.unwrap();
        assert_eq!(store.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn recent_round_trips_fields() {
        let store = test_store().await;
        let s = summary("Notify the team", Some("chat-1"));
        store.record(&s, &s.result.actions).await.unwrap();

        let recent = store.recent("ann@example.com", None, 5).await.unwrap();
        assert_eq!(recent.len(), 1);
        let r = &recent[0];
        assert_eq!(r.action_type, TASK_EXECUTION);
        assert_eq!(r.task_text(), "Notify the team");
        assert_eq!(r.status, "partial_success");
        assert_eq!(r.duration_ms, 120);
        assert_eq!(r.conversation_id.as_deref(), Some("chat-1"));
        assert_eq!(r.input["iterations"], 2);
        assert_eq!(r.output["actions"][0]["status"], "failed");
    }

    #[tokio::test]
    async fn recent_is_newest_first_and_limited() {
        let store = test_store().await;
        for task in ["a", "b", "c"] {
            let s = summary(task, None);
            store.record(&s, &s.result.actions).await.unwrap();
        }
        let recent = store.recent("ann@example.com", None, 2).await.unwrap();
        let tasks: Vec<&str> = recent.iter().map(|r| r.task_text()).collect();
        assert_eq!(tasks, vec!["c", "b"]);
    }

    #[tokio::test]
    async fn recent_scoped_by_conversation_and_caller() {
        let store = test_store().await;
        let a = summary("in a", Some("a"));
        let b = summary("in b", Some("b"));
        store.record(&a, &[]).await.unwrap();
        store.record(&b, &[]).await.unwrap();

        let scoped = store
            .recent("ann@example.com", Some(&ConversationId::from("b")), 10)
            .await
            .unwrap();
        assert_eq!(scoped.len(), 1);
        assert_eq!(scoped[0].task_text(), "in b");

        assert!(store.recent("bob@example.com", None, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn file_database_persists_between_opens() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("audit.db");

        {
            let store = SqliteAudit::open(&path).await.unwrap();
            let s = summary("persist me", None);
            store.record(&s, &s.result.actions).await.unwrap();
        }

        let reopened = SqliteAudit::open(&path).await.unwrap();
        assert_eq!(reopened.count().await.unwrap(), 2);
        let recent = reopened.recent("ann@example.com", None, 1).await.unwrap();
        assert_eq!(recent[0].task_text(), "persist me");
    }
}
