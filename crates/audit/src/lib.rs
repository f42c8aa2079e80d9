//! Audit storage for taskpilot.
//!
//! Every backend implements both [`AuditRecorder`] (append execution records)
//! and [`ActionHistory`] (recent task lookup for prompt grounding).

pub mod in_memory;

#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use in_memory::InMemoryAudit;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteAudit;

pub use taskpilot_core::audit::{ActionHistory, AuditRecorder, ExecutionRecord, ExecutionSummary};
