use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A stored push subscription. `endpoint` is the primary key; everything
/// else is overwritten on re-registration except `registered_at`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subscription {
    pub endpoint: String,
    pub p256dh: String,
    pub auth: String,
    #[serde(default)]
    pub page_url: Option<String>,
    pub registered_at: DateTime<Utc>,
    #[serde(default)]
    pub expiration: Option<DateTime<Utc>>,
    #[serde(default)]
    pub ip: Option<String>,
    #[serde(default)]
    pub user_agent: Option<String>,
}
