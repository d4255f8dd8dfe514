//! Conversation session state fed by apply responses

use crate::backend::ApplyResponse;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Session state deltas returned by the apply endpoint accumulate here
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SessionState {
    /// Agent currently driving the run
    pub active_agent: Option<String>,
    /// Trigger currently being worked
    pub current_trigger_id: Option<String>,
    /// Knowledge graph version
    pub kg_version_sha: Option<String>,
    /// Conversation messages, in arrival order
    pub messages: Vec<Value>,
}

impl SessionState {
    /// Merge an apply response: present fields replace, messages append
    pub fn merge(&mut self, delta: &ApplyResponse) {
        if let Some(agent) = &delta.active_agent {
            self.active_agent = Some(agent.clone());
        }
        if let Some(trigger) = &delta.current_trigger_id {
            self.current_trigger_id = Some(trigger.clone());
        }
        if let Some(sha) = &delta.kg_version_sha {
            self.kg_version_sha = Some(sha.clone());
        }
        self.messages.extend(delta.messages.iter().cloned());
    }
}
