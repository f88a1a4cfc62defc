use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One page-visit event as reported by the service worker. The payload is
/// opaque to the relay.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Visit {
    pub data: serde_json::Value,
    pub recorded_at: DateTime<Utc>,
    #[serde(default)]
    pub ip: Option<String>,
    #[serde(default)]
    pub user_agent: Option<String>,
}
