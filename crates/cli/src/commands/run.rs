//! `taskpilot run`: Execute one task and print the result.

use taskpilot_config::AppConfig;
use taskpilot_core::event::DomainEvent;
use taskpilot_core::message::ConversationId;
use taskpilot_core::task::{TaskRequest, TaskResult};
use tokio_util::sync::CancellationToken;

use super::runtime;

pub async fn run(
    message: String,
    caller: String,
    conversation: Option<String>,
    json: bool,
    verbose: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    // No key, no run
    if !config.has_api_key() {
        eprintln!();
        eprintln!("  ERROR: No API key configured!");
        eprintln!();
        eprintln!("  Set one of these environment variables:");
        eprintln!("    TASKPILOT_API_KEY   (generic)");
        eprintln!("    OPENROUTER_API_KEY  (recommended)");
        eprintln!("    OPENAI_API_KEY      (for OpenAI direct)");
        eprintln!();
        eprintln!("  Or add it to your config file:");
        eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
        eprintln!();
        return Err("No API key found. See above for setup instructions.".into());
    }

    let (runner, event_bus) = runtime::runner(&config).await?;

    if verbose {
        let mut rx = event_bus.subscribe();
        tokio::spawn(async move {
            while let Ok(event) = rx.recv().await {
                eprintln!("  [event] {}", describe(&event));
            }
        });
    }

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    let mut request = TaskRequest::new(message, caller);
    if let Some(id) = conversation {
        request = request.with_conversation(ConversationId(id));
    }

    let result = runner.execute_task_with_cancel(request, cancel).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_result(&result);
    }
    Ok(())
}

fn print_result(result: &TaskResult) {
    println!();
    println!("  Status: {}", result.status);
    println!();
    for line in result.result_text.lines() {
        println!("  {line}");
    }

    if !result.actions.is_empty() {
        println!();
        println!("  Actions:");
        for (i, action) in result.actions.iter().enumerate() {
            println!(
                "  {}. {} [{}] ({} ms)",
                i + 1,
                action.name,
                action.status.as_str(),
                action.duration_ms
            );
            for line in action.summary().lines() {
                println!("       {line}");
            }
        }
    }
    println!();
}

fn describe(event: &DomainEvent) -> String {
    match event {
        DomainEvent::TaskStarted { caller, task_preview, .. } => {
            format!("task started for {caller}: {task_preview}")
        }
        DomainEvent::ModelResponded { iteration, invocations, .. } => {
            format!("model replied (iteration {iteration}, {invocations} tool calls)")
        }
        DomainEvent::ToolExecuted { tool_name, success, duration_ms, .. } => {
            let status = if *success { "ok" } else { "failed" };
            format!("{tool_name} {status} in {duration_ms} ms")
        }
        DomainEvent::DuplicateSuppressed { tool_name, .. } => {
            format!("{tool_name} already ran with these arguments; skipped")
        }
        DomainEvent::TaskFinished { status, iterations, actions, .. } => {
            format!("task finished: {status} after {iterations} iterations, {actions} actions")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn describes_events() {
        let executed = DomainEvent::ToolExecuted {
            execution_id: "e1".into(),
            tool_name: "send_notification".into(),
            success: false,
            duration_ms: 12,
            timestamp: Utc::now(),
        };
        assert_eq!(describe(&executed), "send_notification failed in 12 ms");

        let finished = DomainEvent::TaskFinished {
            execution_id: "e1".into(),
            status: "partial_success".into(),
            iterations: 5,
            actions: 3,
            timestamp: Utc::now(),
        };
        assert_eq!(
            describe(&finished),
            "task finished: partial_success after 5 iterations, 3 actions"
        );
    }
}
