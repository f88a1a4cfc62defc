use actix_web::{post, web, HttpResponse, Result};

use crate::{
    configuration::{AppState, State},
    error::Error,
    handler::broadcast,
    types::Notification,
};

#[post("/send-notification")]
pub async fn post_index(
    state: web::Data<AppState<State>>,
    payload: web::Json<Notification>,
) -> Result<HttpResponse, Error> {
    let report =
        broadcast::broadcast(state.as_ref().clone(), payload.into_inner())
            .await?;

    Ok(HttpResponse::Ok().json(report))
}
