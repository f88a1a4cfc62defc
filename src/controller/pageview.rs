use actix_web::{post, web, HttpRequest, HttpResponse, Result};
use chrono::Utc;
use serde::Serialize;

use crate::{
    configuration::{AppState, State},
    error::Error,
    helpers::Status,
    model,
};

#[post("/pageview")]
pub async fn post_index(
    state: web::Data<AppState<State>>,
    payload: web::Json<serde_json::Value>,
    req: HttpRequest,
) -> Result<HttpResponse, Error> {
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

    let visit = model::Visit {
        data: payload.into_inner(),
        recorded_at: Utc::now(),
        ip,
        user_agent,
    };

    state.database.visit.append(&visit).await?;

    Ok(HttpResponse::Ok().json(Response {
        message: Status::Recorded.to_string(),
    }))
}

#[derive(Debug, Serialize)]
pub struct Response {
    pub message: String,
}
