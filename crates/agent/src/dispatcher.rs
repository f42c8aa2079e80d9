//! Deduplicating dispatcher.
//!
//! Runs invocations against the [`ToolRegistry`] and owns the per-execution
//! dedup state: every `(name, raw_arguments)` key dispatched so far, mapped
//! to its outcome in `actions`. A repeated key is never run again; the
//! caller gets the earlier outcome back instead.
//!
//! One dispatcher lives for exactly one task execution.

use serde_json::{Map, Value};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use taskpilot_core::error::ToolError;
use taskpilot_core::tool::{InvocationKey, ToolInvocation, ToolOutcome, ToolRegistry};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// What happened to one invocation.
#[derive(Debug, Clone)]
pub enum Dispatch {
    /// The handler ran (or failed before running); a new action was recorded.
    Executed(ToolOutcome),

    /// The same key was dispatched earlier in this execution.
    Duplicate(ToolOutcome),
}

impl Dispatch {
    pub fn outcome(&self) -> &ToolOutcome {
        match self {
            Self::Executed(o) | Self::Duplicate(o) => o,
        }
    }

    pub fn is_duplicate(&self) -> bool {
        matches!(self, Self::Duplicate(_))
    }
}

pub struct Dispatcher<'a> {
    registry: &'a ToolRegistry,
    caller: String,
    tool_timeout: Duration,
    cancel: CancellationToken,
    attempted: HashMap<InvocationKey, usize>,
    actions: Vec<ToolOutcome>,
}

impl<'a> Dispatcher<'a> {
    pub fn new(registry: &'a ToolRegistry, caller: impl Into<String>) -> Self {
        Self {
            registry,
            caller: caller.into(),
            tool_timeout: Duration::from_secs(30),
            cancel: CancellationToken::new(),
            attempted: HashMap::new(),
            actions: Vec::new(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.tool_timeout = timeout;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Dispatch one invocation, or answer it from the earlier outcome.
    pub async fn dispatch(&mut self, invocation: &ToolInvocation) -> Dispatch {
        let key = invocation.key();
        if let Some(&index) = self.attempted.get(&key) {
            warn!(tool = %invocation.name, "Duplicate invocation suppressed");
            return Dispatch::Duplicate(self.actions[index].clone());
        }

        let outcome = self.run(invocation).await;
        self.attempted.insert(key, self.actions.len());
        self.actions.push(outcome.clone());
        Dispatch::Executed(outcome)
    }

    async fn run(&self, invocation: &ToolInvocation) -> ToolOutcome {
        let started = Instant::now();
        let name = invocation.name.as_str();

        let arguments = match parse_arguments(&invocation.raw_arguments) {
            Ok(arguments) => arguments,
            Err(message) => {
                warn!(tool = name, "Unparsable tool arguments: {message}");
                return finish(ToolOutcome::failed(name, message), Map::new(), started);
            }
        };

        let tool = match self.registry.resolve(name) {
            Ok(tool) => tool,
            Err(e) => {
                warn!(tool = name, "Model requested an unregistered tool");
                return finish(ToolOutcome::failed(name, e.to_string()), arguments, started);
            }
        };

        info!(tool = name, "Executing tool");
        let result = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(ToolError::Failed("Cancelled before completion".into())),
            r = tokio::time::timeout(self.tool_timeout, tool.execute(&arguments, &self.caller)) => {
                r.unwrap_or_else(|_| {
                    Err(ToolError::Timeout {
                        tool_name: name.to_string(),
                        timeout_secs: self.tool_timeout.as_secs(),
                    })
                })
            }
        };

        let outcome = match result {
            Ok(text) => {
                debug!(tool = name, "Tool completed");
                ToolOutcome::completed(name, text)
            }
            Err(e) => {
                warn!(tool = name, error = %e, "Tool failed");
                ToolOutcome::failed(name, e.to_string())
            }
        };
        finish(outcome, arguments, started)
    }

    /// Outcomes in first-dispatch order.
    pub fn actions(&self) -> &[ToolOutcome] {
        &self.actions
    }

    pub fn into_actions(self) -> Vec<ToolOutcome> {
        self.actions
    }
}

fn parse_arguments(raw: &str) -> Result<Map<String, Value>, String> {
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err("Could not parse tool arguments: expected a JSON object".into()),
        Err(e) => Err(format!("Could not parse tool arguments: {e}")),
    }
}

fn finish(mut outcome: ToolOutcome, arguments: Map<String, Value>, started: Instant) -> ToolOutcome {
    outcome.arguments = arguments;
    outcome.duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
    outcome
}
