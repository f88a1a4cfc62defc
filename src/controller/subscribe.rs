use actix_web::{post, web, HttpRequest, HttpResponse, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::{
    configuration::{AppState, State},
    error::Error,
    helpers::Status,
    model, types,
};

#[post("/subscribe")]
pub async fn post_index(
    state: web::Data<AppState<State>>,
    payload: web::Json<types::SubscribeRequest>,
    req: HttpRequest,
) -> Result<HttpResponse, Error> {
    let request = payload.into_inner();
    validate(&request)?;

    let user_agent = if let Some(item) = req.headers().get("user-agent") {
        Some(item.to_str()?.to_string())
    } else {
        None
    };

    let ip = if let Some(item) = req.peer_addr() {
        Some(item.ip().to_string())
    } else {
        None
    };

    let expiration = if let Some(ms) = request.subscription.expiration_time {
        let sec = ms / 1000;

        let at = DateTime::from_timestamp(sec, 0).ok_or_else(|| {
            Error::DecodeDateTimeError(format!(
                "Subscription expiration parse {}",
                sec
            ))
        })?;

        Some(at)
    } else {
        None
    };

    let data = model::Subscription {
        endpoint: request.subscription.endpoint,
        p256dh: request.subscription.keys.p256dh,
        auth: request.subscription.keys.auth,
        page_url: request.page_url,
        registered_at: Utc::now(),
        expiration,
        ip,
        user_agent,
    };

    state.database.subscription.upsert(data).await?;

    Ok(HttpResponse::Created().json(Response {
        message: String::from(Status::Subscribed),
    }))
}

fn validate(request: &types::SubscribeRequest) -> Result<(), Error> {
    let data = &request.subscription;

    if data.endpoint.trim().is_empty() {
        return Err(Error::ValidationError(String::from(
            "subscription endpoint is required",
        )));
    }
    if data.keys.p256dh.trim().is_empty() || data.keys.auth.trim().is_empty()
    {
        return Err(Error::ValidationError(String::from(
            "subscription keys p256dh and auth are required",
        )));
    }

    Ok(())
}

#[derive(Debug, Serialize)]
pub struct Response {
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{SubscriptionData, SubscriptionKeys};

    fn request(endpoint: &str, p256dh: &str, auth: &str) -> types::SubscribeRequest {
        types::SubscribeRequest {
            subscription: SubscriptionData {
                endpoint: endpoint.to_owned(),
                expiration_time: None,
                keys: SubscriptionKeys {
                    p256dh: p256dh.to_owned(),
                    auth: auth.to_owned(),
                },
            },
            page_url: None,
        }
    }

    #[test]
    fn accepts_a_complete_subscription() {
        assert!(validate(&request("https://push.example/a", "key", "auth"))
            .is_ok());
    }

    #[test]
    fn rejects_blank_endpoint_or_keys() {
        for candidate in [
            request("  ", "key", "auth"),
            request("https://push.example/a", "", "auth"),
            request("https://push.example/a", "key", ""),
        ] {
            assert!(matches!(
                validate(&candidate),
                Err(Error::ValidationError(_))
            ));
        }
    }
}
