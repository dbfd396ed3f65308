//! The module contains the errors the engine can throw.

use gateway::GatewayError;
use sea_orm::DbErr;
use thiserror::Error;

/// Engine custom errors.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Record absent, not owned by the caller, or not in the expected state.
    #[error("{0}")]
    NotFound(String),
    /// The caller-supplied amount differs from the stored invoice amount.
    #[error("amount mismatch: {0}")]
    AmountMismatch(String),
    #[error("invalid amount: {0}")]
    InvalidAmount(String),
    /// Bearer credential could not be fetched or refreshed. Retriable
    /// after backoff; carries the upstream status/body for diagnostics.
    #[error("auth token unavailable: {0}")]
    AuthUnavailable(String),
    /// The transaction already holds a different terminal status.
    #[error("transaction already finalized: {0}")]
    AlreadyFinalized(String),
    /// The gateway order was created but the local write failed. The
    /// caller must reconcile via the gateway order id instead of
    /// retrying order creation blindly.
    #[error("order {order_id} created at gateway but local persist failed: {source}")]
    PersistAfterGatewaySuccess {
        order_id: String,
        #[source]
        source: DbErr,
    },
    #[error("engine misconfigured: {0}")]
    Configuration(String),
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    #[error(transparent)]
    Database(#[from] DbErr),
}

impl PartialEq for EngineError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::NotFound(a), Self::NotFound(b)) => a == b,
            (Self::AmountMismatch(a), Self::AmountMismatch(b)) => a == b,
            (Self::InvalidAmount(a), Self::InvalidAmount(b)) => a == b,
            (Self::AuthUnavailable(a), Self::AuthUnavailable(b)) => a == b,
            (Self::AlreadyFinalized(a), Self::AlreadyFinalized(b)) => a == b,
            (Self::Configuration(a), Self::Configuration(b)) => a == b,
            (Self::Gateway(a), Self::Gateway(b)) => a.to_string() == b.to_string(),
            (Self::Database(a), Self::Database(b)) => a.to_string() == b.to_string(),
            (
                Self::PersistAfterGatewaySuccess { order_id: a, .. },
                Self::PersistAfterGatewaySuccess { order_id: b, .. },
            ) => a == b,
            _ => false,
        }
    }
}
