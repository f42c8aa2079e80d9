//! The conversation loop.
//!
//! One call to [`TaskRunner::execute_task`] is one task execution:
//!
//! 1. Seed the conversation: system prompt, caller history, the request
//! 2. Call the model
//! 3. Interpret the reply; with no invocations, it is the final answer
//! 4. Dispatch invocations, append the tool results, go back to 2
//!
//! The number of model calls is capped by `max_iterations`. Whatever
//! happens, the caller gets a [`TaskResult`] and the execution is handed to
//! the audit recorder.

use chrono::{Local, Utc};
use std::sync::Arc;
use std::time::Instant;
use taskpilot_core::agent::AgentSettings;
use taskpilot_core::audit::{ActionHistory, AuditRecorder, ExecutionRecord, ExecutionSummary};
use taskpilot_core::directory::{UserDirectory, UserProfile};
use taskpilot_core::error::ProviderError;
use taskpilot_core::event::{DomainEvent, EventBus};
use taskpilot_core::message::{InvocationRef, Turn};
use taskpilot_core::provider::{Provider, ProviderRequest, ProviderResponse};
use taskpilot_core::task::{TaskRequest, TaskResult};
use taskpilot_core::tool::{ToolOutcome, ToolRegistry};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::dispatcher::{Dispatch, Dispatcher};
use crate::interpreter::{self, InvocationSource};
use crate::prompt::{self, PromptContext};

/// Final answer when the model's terminal text is empty.
pub const COMPLETED_TEXT: &str = "Task completed.";

pub const ITERATION_LIMIT_TEXT: &str = "Task partially completed: the iteration limit was reached.";

pub const EMPTY_RESPONSE_TEXT: &str = "Sorry, the request could not be completed: the model produced no usable output. Try rephrasing the request.";

pub const RATE_LIMIT_TEXT: &str = "The model provider's request limit was exceeded. Check the rate limits of your API key and try again later.";

pub const CANCELLED_TEXT: &str = "Task cancelled.";

/// How the loop ended.
enum Terminal {
    Answer(String),
    IterationLimit,
    EmptyResponse,
    ModelFailure(ProviderError),
    Cancelled,
}

/// Runs task executions against one provider and tool registry.
///
/// Cheap to share: executions keep their own conversation and dedup state,
/// so many can run concurrently on one runner.
pub struct TaskRunner {
    /// The model provider
    provider: Arc<dyn Provider>,

    /// The model to request
    model: String,

    temperature: f32,

    max_tokens: Option<u32>,

    tools: Arc<ToolRegistry>,

    /// Caller profiles and known users for the system prompt
    directory: Arc<dyn UserDirectory>,

    /// Recent executions for the system prompt
    history: Option<Arc<dyn ActionHistory>>,

    recorder: Option<Arc<dyn AuditRecorder>>,

    settings: AgentSettings,

    event_bus: Arc<EventBus>,
}

impl TaskRunner {
    pub fn new(
        provider: Arc<dyn Provider>,
        model: impl Into<String>,
        tools: Arc<ToolRegistry>,
        directory: Arc<dyn UserDirectory>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature: 0.7,
            max_tokens: None,
            tools,
            directory,
            history: None,
            recorder: None,
            settings: AgentSettings::default(),
            event_bus,
        }
    }

    pub fn with_settings(mut self, settings: AgentSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Set the maximum number of model calls per task.
    pub fn with_max_iterations(mut self, max: u32) -> Self {
        self.settings.max_iterations = max;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Set the default max tokens per model response.
    pub fn with_max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = Some(max);
        self
    }

    /// Source of the recent-task block in the system prompt.
    pub fn with_history(mut self, history: Arc<dyn ActionHistory>) -> Self {
        self.history = Some(history);
        self
    }

    pub fn with_recorder(mut self, recorder: Arc<dyn AuditRecorder>) -> Self {
        self.recorder = Some(recorder);
        self
    }

    pub fn settings(&self) -> &AgentSettings {
        &self.settings
    }

    /// Execute one task to completion.
    pub async fn execute_task(&self, request: TaskRequest) -> TaskResult {
        self.execute_task_with_cancel(request, CancellationToken::new()).await
    }

    /// Execute one task, stopping at the next model or tool call once
    /// `cancel` fires. A cancelled execution is still recorded.
    pub async fn execute_task_with_cancel(
        &self,
        request: TaskRequest,
        cancel: CancellationToken,
    ) -> TaskResult {
        let started = Instant::now();
        let execution_id = Uuid::new_v4().to_string();

        info!(
            execution_id = %execution_id,
            caller = %request.caller,
            model = %self.model,
            "Task started"
        );
        self.event_bus.publish(DomainEvent::TaskStarted {
            execution_id: execution_id.clone(),
            caller: request.caller.clone(),
            task_preview: request.task.chars().take(80).collect(),
            timestamp: Utc::now(),
        });

        let mut turns = self.seed(&request).await;
        let mut dispatcher = Dispatcher::new(&self.tools, request.caller.as_str())
            .with_timeout(self.settings.tool_timeout())
            .with_cancellation(cancel.clone());

        let (terminal, iterations) = self
            .run_loop(&execution_id, &mut turns, &mut dispatcher, &cancel)
            .await;
        let (result, error_message) = self.conclude(terminal, iterations, dispatcher.into_actions());
        let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        info!(
            execution_id = %execution_id,
            status = %result.status,
            iterations,
            actions = result.actions.len(),
            duration_ms,
            "Task finished"
        );

        self.record(ExecutionSummary {
            task: request.task,
            caller: request.caller,
            conversation_id: request.conversation_id,
            iterations,
            result: result.clone(),
            error_message,
            duration_ms,
        })
        .await;

        self.event_bus.publish(DomainEvent::TaskFinished {
            execution_id,
            status: result.status.to_string(),
            iterations,
            actions: result.actions.len(),
            timestamp: Utc::now(),
        });

        result
    }

    /// System prompt, trusted history, then the request itself.
    async fn seed(&self, request: &TaskRequest) -> Vec<Turn> {
        let caller = request.caller.as_str();

        let profile = match self.directory.profile(caller).await {
            Ok(Some(profile)) => profile,
            Ok(None) => {
                warn!(caller, "Caller is not in the user directory; continuing with email only");
                UserProfile::email_only(caller)
            }
            Err(e) => {
                warn!(caller, "User lookup failed: {e}");
                UserProfile::email_only(caller)
            }
        };

        let recent: Vec<ExecutionRecord> = match &self.history {
            Some(history) => history
                .recent(
                    caller,
                    request.conversation_id.as_ref(),
                    self.settings.recent_actions_limit,
                )
                .await
                .unwrap_or_else(|e| {
                    warn!(caller, "Recent action lookup failed: {e}");
                    Vec::new()
                }),
            None => Vec::new(),
        };

        let known_users = self
            .directory
            .known_identities(self.settings.known_users_limit)
            .await
            .unwrap_or_else(|e| {
                warn!("Known user lookup failed: {e}");
                Vec::new()
            });

        let definitions = self.tools.definitions();
        let system = prompt::build_system_prompt(&PromptContext {
            profile: &profile,
            recent: &recent,
            tools: &definitions,
            known_users: &known_users,
            today: Local::now().date_naive(),
            preview_chars: self.settings.recent_task_preview_chars,
        });

        let history: Vec<Turn> = request.history.iter().filter_map(|entry| entry.to_turn()).collect();
        let skip = history.len().saturating_sub(self.settings.history_limit);

        let mut turns = vec![Turn::system(system)];
        turns.extend(history.into_iter().skip(skip));
        turns.push(Turn::user(request.task.as_str()));

        debug!(
            turns = turns.len(),
            recent = recent.len(),
            known_users = known_users.len(),
            "Conversation seeded"
        );
        turns
    }

    async fn run_loop(
        &self,
        execution_id: &str,
        turns: &mut Vec<Turn>,
        dispatcher: &mut Dispatcher<'_>,
        cancel: &CancellationToken,
    ) -> (Terminal, u32) {
        let max_iterations = self.settings.max_iterations;
        let mut iteration = 0;

        while iteration < max_iterations {
            iteration += 1;
            debug!(iteration, max_iterations, "Agent iteration");

            let response = match self.call_model(turns, cancel).await {
                Ok(response) => response,
                Err(terminal) => return (terminal, iteration),
            };

            let interpretation = interpreter::interpret(&response.message);
            for diagnostic in &interpretation.diagnostics {
                warn!(iteration, "Dropped malformed tool call: {diagnostic}");
            }

            self.event_bus.publish(DomainEvent::ModelResponded {
                execution_id: execution_id.to_string(),
                iteration,
                invocations: interpretation.invocations.len(),
                timestamp: Utc::now(),
            });

            if !interpretation.has_invocations() {
                if response.message.is_blank() {
                    // A nudge needs a model call left to answer it.
                    if iteration < self.settings.empty_response_retry_limit
                        && iteration < max_iterations
                    {
                        warn!(iteration, "Model returned an empty response; nudging");
                        turns.push(Turn::system(prompt::nudge()));
                        continue;
                    }
                    error!(iteration, "Model returned no usable output");
                    return (Terminal::EmptyResponse, iteration);
                }

                let text = if interpretation.text.is_empty() {
                    COMPLETED_TEXT.to_string()
                } else {
                    interpretation.text
                };
                return (Terminal::Answer(text), iteration);
            }

            debug!(
                iteration,
                invocations = interpretation.invocations.len(),
                source = ?interpretation.source,
                "Model requested tools"
            );

            // Only the calls that are actually answered below stay attached.
            let mut assistant = Turn::assistant(response.message.content.as_str());
            if interpretation.source == InvocationSource::Structured {
                assistant.tool_calls = response
                    .message
                    .tool_calls
                    .into_iter()
                    .filter(|call| call.name.as_deref().is_some_and(|n| !n.trim().is_empty()))
                    .collect();
            }
            turns.push(assistant);

            for invocation in &interpretation.invocations {
                if cancel.is_cancelled() {
                    return (Terminal::Cancelled, iteration);
                }

                let reference = InvocationRef {
                    name: invocation.name.clone(),
                    call_id: invocation.call_id.clone(),
                };

                match dispatcher.dispatch(invocation).await {
                    Dispatch::Executed(outcome) => {
                        self.event_bus.publish(DomainEvent::ToolExecuted {
                            execution_id: execution_id.to_string(),
                            tool_name: outcome.name.clone(),
                            success: outcome.is_completed(),
                            duration_ms: outcome.duration_ms,
                            timestamp: Utc::now(),
                        });
                        turns.push(Turn::tool_result(reference, outcome.summary()));
                    }
                    Dispatch::Duplicate(prior) => {
                        self.event_bus.publish(DomainEvent::DuplicateSuppressed {
                            execution_id: execution_id.to_string(),
                            tool_name: prior.name.clone(),
                            timestamp: Utc::now(),
                        });
                        turns.push(Turn::tool_result(reference, duplicate_reminder(&prior)));
                    }
                }
            }

            if cancel.is_cancelled() {
                return (Terminal::Cancelled, iteration);
            }
        }

        warn!(max_iterations, "Iteration limit reached");
        (Terminal::IterationLimit, iteration)
    }

    async fn call_model(
        &self,
        turns: &[Turn],
        cancel: &CancellationToken,
    ) -> Result<ProviderResponse, Terminal> {
        let request = ProviderRequest {
            model: self.model.clone(),
            messages: turns.to_vec(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            tools: self.tools.definitions(),
        };
        let timeout = self.settings.model_timeout();

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(Terminal::Cancelled),
            r = tokio::time::timeout(timeout, self.provider.complete(request)) => match r {
                Ok(Ok(response)) => Ok(response),
                Ok(Err(e)) => Err(Terminal::ModelFailure(e)),
                Err(_) => Err(Terminal::ModelFailure(ProviderError::Timeout(format!(
                    "no response from {} within {}s",
                    self.provider.name(),
                    timeout.as_secs()
                )))),
            },
        }
    }

    /// Turn the terminal state into the caller's result plus the cause to
    /// keep for operators.
    fn conclude(
        &self,
        terminal: Terminal,
        iterations: u32,
        actions: Vec<ToolOutcome>,
    ) -> (TaskResult, Option<String>) {
        match terminal {
            Terminal::Answer(text) => (TaskResult::success(text, actions), None),
            Terminal::IterationLimit => (TaskResult::partial(ITERATION_LIMIT_TEXT, actions), None),
            Terminal::EmptyResponse => (
                TaskResult::error(EMPTY_RESPONSE_TEXT, actions),
                Some(format!("Model returned an empty response after {iterations} iterations")),
            ),
            Terminal::ModelFailure(e) => {
                error!(provider = self.provider.name(), error = %e, "Model call failed");
                let shown = if e.is_rate_limited() {
                    RATE_LIMIT_TEXT.to_string()
                } else {
                    e.to_string()
                };
                (
                    TaskResult::error(format!("Error while executing the task: {shown}"), actions),
                    Some(e.to_string()),
                )
            }
            Terminal::Cancelled => {
                warn!(iterations, "Task cancelled");
                (
                    TaskResult::error(CANCELLED_TEXT, actions),
                    Some("Cancelled by caller".to_string()),
                )
            }
        }
    }

    /// Bounded by the audit timeout; a stalled store never holds back the
    /// result.
    async fn record(&self, summary: ExecutionSummary) {
        let Some(recorder) = &self.recorder else {
            return;
        };
        let timeout = self.settings.audit_timeout();
        match tokio::time::timeout(timeout, recorder.record(&summary, &summary.result.actions)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(backend = recorder.name(), "Failed to record execution: {e}"),
            Err(_) => warn!(
                backend = recorder.name(),
                timeout_secs = timeout.as_secs(),
                "Audit recorder timed out; execution not recorded"
            ),
        }
    }
}

fn duplicate_reminder(prior: &ToolOutcome) -> String {
    format!(
        "Tool {} was already called with these arguments in this task. Previous result: {}. \
         Do not call it again; use this result.",
        prior.name,
        prior.summary()
    )
}
