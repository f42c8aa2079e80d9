//! Conversation loop settings.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Tunables for one task execution, loaded from the `[agent]` config section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSettings {
    /// Hard ceiling on model round-trips per task
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,

    /// Empty model responses are nudged while the iteration count is below
    /// this value, and fail the task afterwards
    #[serde(default = "default_empty_retry_limit")]
    pub empty_response_retry_limit: u32,

    #[serde(default = "default_model_timeout")]
    pub model_timeout_secs: u64,

    #[serde(default = "default_tool_timeout")]
    pub tool_timeout_secs: u64,

    /// Longest the loop waits for the audit recorder before returning
    #[serde(default = "default_audit_timeout")]
    pub audit_timeout_secs: u64,

    /// Recent tasks listed in the system prompt
    #[serde(default = "default_recent_actions")]
    pub recent_actions_limit: usize,

    /// Known user addresses listed in the system prompt
    #[serde(default = "default_known_users")]
    pub known_users_limit: usize,

    /// Prior exchanges the CLI keeps per conversation
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,

    #[serde(default = "default_preview_chars")]
    pub recent_task_preview_chars: usize,
}

fn default_max_iterations() -> u32 {
    5
}
fn default_empty_retry_limit() -> u32 {
    3
}
fn default_model_timeout() -> u64 {
    60
}
fn default_tool_timeout() -> u64 {
    30
}
fn default_audit_timeout() -> u64 {
    10
}
fn default_recent_actions() -> usize {
    5
}
fn default_known_users() -> usize {
    20
}
fn default_history_limit() -> usize {
    10
}
fn default_preview_chars() -> usize {
    100
}

impl AgentSettings {
    pub fn model_timeout(&self) -> Duration {
        Duration::from_secs(self.model_timeout_secs)
    }

    pub fn tool_timeout(&self) -> Duration {
        Duration::from_secs(self.tool_timeout_secs)
    }

    pub fn audit_timeout(&self) -> Duration {
        Duration::from_secs(self.audit_timeout_secs)
    }
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            empty_response_retry_limit: default_empty_retry_limit(),
            model_timeout_secs: default_model_timeout(),
            tool_timeout_secs: default_tool_timeout(),
            audit_timeout_secs: default_audit_timeout(),
            recent_actions_limit: default_recent_actions(),
            known_users_limit: default_known_users(),
            history_limit: default_history_limit(),
            recent_task_preview_chars: default_preview_chars(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let s = AgentSettings::default();
        assert_eq!(s.max_iterations, 5);
        assert_eq!(s.empty_response_retry_limit, 3);
        assert_eq!(s.model_timeout(), Duration::from_secs(60));
        assert_eq!(s.audit_timeout(), Duration::from_secs(10));
        assert_eq!(s.known_users_limit, 20);
    }

    #[test]
    fn partial_section_fills_defaults() {
        let s: AgentSettings = serde_json::from_str(r#"{"max_iterations": 8}"#).unwrap();
        assert_eq!(s.max_iterations, 8);
        assert_eq!(s.tool_timeout_secs, 30);
    }
}
