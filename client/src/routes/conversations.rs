use super::ApiError;
use crate::state::AppState;
use agora_messaging::{Conversation, Message, UserId};
use axum::extract::{Path, State};
use axum::{routing::get, Json, Router};
use std::sync::Arc;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/conversations", get(list_conversations))
        .route("/threads/:counterpart_id", get(open_thread))
}

async fn list_conversations(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Conversation>>, ApiError> {
    let messenger = state.messenger();
    let user = messenger.current_user()?;
    Ok(Json(messenger.load_conversations(&user).await?))
}

async fn open_thread(
    State(state): State<Arc<AppState>>,
    Path(counterpart_id): Path<String>,
) -> Result<Json<Vec<Message>>, ApiError> {
    let messenger = state.messenger();
    let user = messenger.current_user()?;
    let counterpart = UserId::from(counterpart_id);
    Ok(Json(messenger.load_thread(&user, &counterpart).await?))
}
