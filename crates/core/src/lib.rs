//! # taskpilot core
//!
//! Domain types, traits, and error definitions for the taskpilot agent
//! execution loop. This crate has **no framework dependencies**: it defines
//! the domain model that every other crate implements against.
//!
//! ## Design Philosophy
//!
//! Every external collaborator of the loop is a trait here:
//! - [`Provider`]: the model call
//! - [`Tool`]: one capability the model may invoke, held in a [`ToolRegistry`]
//! - [`AuditRecorder`] / [`ActionHistory`]: execution records
//! - [`UserDirectory`]: caller profile and known counterparts
//!
//! Implementations live in their respective crates, so the loop can be driven
//! end to end with scripted stand-ins in tests.

pub mod agent;
pub mod audit;
pub mod directory;
pub mod error;
pub mod event;
pub mod message;
pub mod provider;
pub mod task;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use agent::AgentSettings;
pub use audit::{ActionHistory, AuditRecorder, ExecutionRecord, ExecutionSummary};
pub use directory::{StaticDirectory, UserDirectory, UserProfile};
pub use error::{Error, Result};
pub use event::{DomainEvent, EventBus};
pub use message::{ConversationId, HistoryEntry, MessageToolCall, Role, Turn};
pub use provider::{Provider, ProviderRequest, ProviderResponse};
pub use task::{TaskRequest, TaskResult, TaskStatus};
pub use tool::{InvocationKey, OutcomeStatus, Tool, ToolInvocation, ToolOutcome, ToolRegistry};
