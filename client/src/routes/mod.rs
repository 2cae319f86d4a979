mod error;
pub mod conversations;
pub mod health;
pub mod messages;

pub use error::ApiError;

use crate::state::AppState;
use axum::Router;
use std::sync::Arc;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(health::routes())
        .merge(conversations::routes())
        .merge(messages::routes())
        .with_state(state)
}
