use serde::Deserialize;

/// Body of `POST /subscribe`: the browser's `PushSubscription` JSON plus
/// the page it was captured on.
#[derive(Debug, Deserialize)]
pub struct SubscribeRequest {
    pub subscription: SubscriptionData,
    #[serde(alias = "pageUrl")]
    pub page_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SubscriptionData {
    pub endpoint: String,
    #[serde(alias = "expirationTime")]
    pub expiration_time: Option<i64>,
    pub keys: SubscriptionKeys,
}

#[derive(Debug, Deserialize)]
pub struct SubscriptionKeys {
    pub p256dh: String,
    pub auth: String,
}
