use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tessera_core::CoreError;

#[derive(Debug)]
pub enum ApiError {
    Core(CoreError),
    Internal(anyhow::Error),
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        ApiError::Core(err)
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::Internal(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            ApiError::Core(err) => match &err {
                CoreError::InsufficientInventory { .. }
                | CoreError::Duplicate { .. }
                | CoreError::InvalidTransition { .. } => (StatusCode::CONFLICT, err.to_string()),
                CoreError::NotFound(_) => (StatusCode::NOT_FOUND, err.to_string()),
                CoreError::Validation(_) => (StatusCode::BAD_REQUEST, err.to_string()),
                CoreError::Unavailable(_) => {
                    tracing::error!("Upstream unavailable: {}", err);
                    (
                        StatusCode::SERVICE_UNAVAILABLE,
                        "Upstream unavailable, retry shortly".to_string(),
                    )
                }
                CoreError::DeliveryFailure(_) => {
                    tracing::error!("Relay delivery failed: {}", err);
                    (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error".to_string())
                }
            },
            ApiError::Internal(err) => {
                tracing::error!("Internal Server Error: {}", err);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error".to_string())
            }
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}
