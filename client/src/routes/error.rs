use crate::messaging::MessagingError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::warn;

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

/// Maps messaging failures onto HTTP responses.
#[derive(Debug)]
pub struct ApiError(pub MessagingError);

impl From<MessagingError> for ApiError {
    fn from(err: MessagingError) -> Self {
        Self(err)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            MessagingError::NotAuthenticated => StatusCode::UNAUTHORIZED,
            MessagingError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            MessagingError::Fetch(_) | MessagingError::Persistence(_) => StatusCode::BAD_GATEWAY,
            MessagingError::Subscription(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            warn!(err = %self.0, %status, "request failed");
        }
        let body = ErrorBody {
            error: self.0.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::BackendError;
    use agora_messaging::ArgumentError;

    #[test]
    fn status_mapping() {
        let cases = [
            (MessagingError::NotAuthenticated, StatusCode::UNAUTHORIZED),
            (
                MessagingError::InvalidArgument(ArgumentError::EmptyContent),
                StatusCode::BAD_REQUEST,
            ),
            (
                MessagingError::Fetch(BackendError::Storage("down".into())),
                StatusCode::BAD_GATEWAY,
            ),
            (
                MessagingError::Subscription(BackendError::Subscription("closed".into())),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
        ];
        for (err, expected) in cases {
            assert_eq!(ApiError(err).status(), expected);
        }
    }
}
