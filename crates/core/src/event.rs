//! Domain events published while a task executes.
//!
//! The conversation loop publishes events as it moves through its states.
//! The CLI's verbose mode and the tests subscribe to them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

/// All domain events in the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DomainEvent {
    /// A task execution began
    TaskStarted {
        execution_id: String,
        caller: String,
        task_preview: String,
        timestamp: DateTime<Utc>,
    },

    /// The model answered one round-trip
    ModelResponded {
        execution_id: String,
        iteration: u32,
        invocations: usize,
        timestamp: DateTime<Utc>,
    },

    /// A tool was dispatched
    ToolExecuted {
        execution_id: String,
        tool_name: String,
        success: bool,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },

    /// A repeated invocation was answered from the earlier outcome
    DuplicateSuppressed {
        execution_id: String,
        tool_name: String,
        timestamp: DateTime<Utc>,
    },

    /// A task execution reached its terminal state
    TaskFinished {
        execution_id: String,
        status: String,
        iterations: u32,
        actions: usize,
        timestamp: DateTime<Utc>,
    },
}

/// A broadcast-based event bus for domain events.
///
/// Uses `tokio::sync::broadcast` for multi-consumer pub/sub.
pub struct EventBus {
    sender: broadcast::Sender<Arc<DomainEvent>>,
}

impl EventBus {
    /// Create a new event bus with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, event: DomainEvent) {
        // No subscribers is fine
        let _ = self.sender.send(Arc::new(event));
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Arc<DomainEvent>> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
