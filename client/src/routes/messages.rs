use super::ApiError;
use crate::state::AppState;
use agora_messaging::{Message, UserId};
use axum::extract::State;
use axum::http::StatusCode;
use axum::{routing::post, Json, Router};
use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Deserialize)]
pub struct SendPayload {
    pub recipient_id: String,
    pub content: String,
}

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/messages", post(send_message))
}

async fn send_message(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<SendPayload>,
) -> Result<(StatusCode, Json<Message>), ApiError> {
    debug!(recipient = %payload.recipient_id, "send request");
    let recipient = UserId::from(payload.recipient_id);
    let message = state.messenger().send(&recipient, &payload.content).await?;
    Ok((StatusCode::CREATED, Json(message)))
}
