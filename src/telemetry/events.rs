//! Event schema for channel telemetry.

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelEvent {
    pub ts: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: Value,
}

impl ChannelEvent {
    pub fn with_now(event_type: impl Into<String>, data: Value) -> Self {
        Self {
            ts: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            event_type: event_type.into(),
            data,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueEventData {
    pub key: String,
    pub transport: String,
    /// Requests still waiting for readiness, cancelled by a close
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queued: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthEventData {
    pub key: String,
    pub healthy: bool,
    pub consecutive_failures: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
