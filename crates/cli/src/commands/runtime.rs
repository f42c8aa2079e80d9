//! Wiring shared by the commands: directory, tools, audit store, runner.

use std::sync::Arc;
use taskpilot_agent::TaskRunner;
use taskpilot_audit::{InMemoryAudit, SqliteAudit};
use taskpilot_config::{AppConfig, AuditBackend};
use taskpilot_core::audit::{ActionHistory, AuditRecorder};
use taskpilot_core::directory::{StaticDirectory, UserDirectory};
use taskpilot_core::event::EventBus;
use taskpilot_core::tool::ToolRegistry;
use taskpilot_tools::{JitsiScheduler, LogMailer, Mailer};

/// Both views of one audit store.
pub struct Audit {
    pub recorder: Arc<dyn AuditRecorder>,
    pub history: Arc<dyn ActionHistory>,
}

pub fn directory(config: &AppConfig) -> Arc<dyn UserDirectory> {
    Arc::new(StaticDirectory::new(config.users.clone()))
}

pub fn registry(config: &AppConfig, directory: Arc<dyn UserDirectory>) -> ToolRegistry {
    let mailer: Arc<dyn Mailer> = Arc::new(LogMailer);
    let scheduler = Arc::new(JitsiScheduler::new(&config.meetings.base_url, mailer.clone()));
    taskpilot_tools::default_registry(directory, scheduler, mailer)
}

pub async fn audit(config: &AppConfig) -> Result<Audit, Box<dyn std::error::Error>> {
    match config.audit.backend {
        AuditBackend::Sqlite => {
            let store = Arc::new(
                SqliteAudit::open(&config.audit.db_path())
                    .await
                    .map_err(|e| format!("Failed to open audit store: {e}"))?,
            );
            Ok(Audit {
                recorder: store.clone(),
                history: store,
            })
        }
        AuditBackend::Memory => {
            let store = Arc::new(InMemoryAudit::new());
            Ok(Audit {
                recorder: store.clone(),
                history: store,
            })
        }
    }
}

/// A runner built from configuration, with its event bus.
pub async fn runner(
    config: &AppConfig,
) -> Result<(TaskRunner, Arc<EventBus>), Box<dyn std::error::Error>> {
    let router = taskpilot_providers::build_from_config(config);
    let (provider, model) = router.resolve(&config.default_model)?;

    let directory = directory(config);
    let tools = Arc::new(registry(config, directory.clone()));
    let audit = audit(config).await?;
    let event_bus = Arc::new(EventBus::default());

    let runner = TaskRunner::new(provider, model, tools, directory, event_bus.clone())
        .with_settings(config.agent.clone())
        .with_temperature(config.default_temperature)
        .with_max_tokens(config.default_max_tokens)
        .with_history(audit.history)
        .with_recorder(audit.recorder);

    Ok((runner, event_bus))
}
