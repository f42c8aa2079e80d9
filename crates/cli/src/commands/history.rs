//! `taskpilot history`: Show recent task executions for a caller.

use taskpilot_config::AppConfig;
use taskpilot_core::audit::ExecutionRecord;
use taskpilot_core::message::ConversationId;

use super::runtime;

pub async fn run(
    caller: String,
    conversation: Option<String>,
    limit: usize,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let audit = runtime::audit(&config).await?;

    let conversation = conversation.map(ConversationId);
    let records = audit
        .history
        .recent(&caller, conversation.as_ref(), limit)
        .await
        .map_err(|e| format!("Failed to read history: {e}"))?;

    if records.is_empty() {
        println!("  No recorded tasks for {caller}.");
        return Ok(());
    }

    println!("  Recent tasks for {caller}:");
    println!();
    for record in &records {
        println!("  {}", format_record(record));
    }
    Ok(())
}

fn format_record(record: &ExecutionRecord) -> String {
    let mut line = format!(
        "{}  {:<15}  {}",
        record.created_at.format("%Y-%m-%d %H:%M"),
        record.status,
        record.task_text()
    );
    if let Some(error) = &record.error_message {
        line.push_str(&format!("  ({error})"));
    }
    line
}
