use axum::{Json, http::StatusCode, response::IntoResponse};
use chrono::{DateTime, Utc};
use engine::EngineError;
use serde::Serialize;

pub use server::{run, run_with_listener, spawn_with_listener};

mod orders;
mod payments;
mod server;
mod tokens;
mod user;

pub mod types {
    pub mod order {
        pub use api_types::order::{OrderCreated, OrderNew};
    }

    pub mod payment {
        pub use api_types::payment::{VerifyRequest, VerifyResponse, WebhookAck, WebhookDelivery};
    }

    pub mod token {
        pub use api_types::token::{TokenResponse, TokenSource};
    }
}

pub enum ServerError {
    Engine(EngineError),
    Generic(String),
}

/// Uniform failure envelope for every endpoint.
#[derive(Serialize)]
struct Error {
    success: bool,
    error: String,
    timestamp: DateTime<Utc>,
}

fn status_for_engine_error(err: &EngineError) -> StatusCode {
    match err {
        EngineError::NotFound(_) => StatusCode::NOT_FOUND,
        EngineError::AmountMismatch(_) | EngineError::InvalidAmount(_) => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        EngineError::AlreadyFinalized(_) => StatusCode::CONFLICT,
        EngineError::AuthUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        EngineError::Gateway(_) => StatusCode::BAD_GATEWAY,
        EngineError::PersistAfterGatewaySuccess { .. }
        | EngineError::Configuration(_)
        | EngineError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn message_for_engine_error(err: EngineError) -> String {
    match err {
        EngineError::Database(db_err) => {
            tracing::error!("database error: {db_err}");
            "internal server error".to_string()
        }
        EngineError::PersistAfterGatewaySuccess { order_id, source } => {
            tracing::error!(
                %order_id,
                error = %source,
                "order persisted at gateway only, manual reconciliation required"
            );
            format!("order {order_id} created at gateway but local persist failed")
        }
        other => other.to_string(),
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> axum::response::Response {
        let (status, error) = match self {
            ServerError::Engine(err) => {
                (status_for_engine_error(&err), message_for_engine_error(err))
            }
            ServerError::Generic(err) => (StatusCode::BAD_REQUEST, err),
        };

        (
            status,
            Json(Error {
                success: false,
                error,
                timestamp: Utc::now(),
            }),
        )
            .into_response()
    }
}

impl From<EngineError> for ServerError {
    fn from(value: EngineError) -> Self {
        Self::Engine(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_maps_to_404() {
        let res = ServerError::from(EngineError::NotFound("x".to_string())).into_response();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn amount_mismatch_maps_to_422() {
        let res = ServerError::from(EngineError::AmountMismatch("x".to_string())).into_response();
        assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn already_finalized_maps_to_409() {
        let res = ServerError::from(EngineError::AlreadyFinalized("x".to_string())).into_response();
        assert_eq!(res.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn auth_unavailable_maps_to_503() {
        let res = ServerError::from(EngineError::AuthUnavailable("x".to_string())).into_response();
        assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn generic_maps_to_400() {
        let res = ServerError::Generic("bad".to_string()).into_response();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }
}
