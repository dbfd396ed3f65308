//! Request/response types shared between the server and its clients.
//!
//! Monetary amounts cross this boundary as major-unit decimal strings
//! (e.g. `"100.00"`); the engine parses them into integer minor units.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Uniform failure envelope returned by every endpoint on error.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    pub success: bool,
    pub error: String,
    pub timestamp: DateTime<Utc>,
}

pub mod order {
    use super::*;

    /// Request body for `POST /orders`.
    #[derive(Debug, Serialize, Deserialize)]
    pub struct OrderNew {
        pub invoice_id: String,
        /// Major-unit decimal amount, must equal the stored invoice amount.
        pub amount: String,
    }

    /// Response body for a created gateway order.
    #[derive(Debug, Serialize, Deserialize)]
    pub struct OrderCreated {
        pub success: bool,
        pub order_id: String,
        pub order_token: String,
        pub transaction_id: String,
        pub merchant_ref: String,
        pub amount: String,
        pub fee: String,
        pub rewards: String,
    }
}

pub mod payment {
    use super::*;

    /// Request body for `POST /payments/verify`.
    #[derive(Debug, Serialize, Deserialize)]
    pub struct VerifyRequest {
        pub order_id: String,
    }

    /// Verification outcome for a single gateway order.
    #[derive(Debug, Serialize, Deserialize)]
    pub struct VerifyResponse {
        pub success: bool,
        pub verified: bool,
        pub transaction_id: String,
        pub status: String,
        pub gateway_status: Option<String>,
        pub order_id: String,
        pub amount: String,
        pub timestamp: DateTime<Utc>,
    }

    /// Request body for `POST /payments/webhook`.
    ///
    /// `payload` is the raw gateway callback body; duplicate deliveries
    /// are acknowledged idempotently.
    #[derive(Debug, Serialize, Deserialize)]
    pub struct WebhookDelivery {
        pub merchant_ref: String,
        pub payload: serde_json::Value,
    }

    /// Acknowledgement for a webhook delivery.
    #[derive(Debug, Serialize, Deserialize)]
    pub struct WebhookAck {
        pub success: bool,
        pub status: String,
        pub transaction_id: String,
    }
}

pub mod token {
    use super::*;

    /// Where a served bearer token came from.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    pub enum TokenSource {
        Cached,
        Fresh,
    }

    /// Response body for `GET /auth/token`.
    #[derive(Debug, Serialize, Deserialize)]
    pub struct TokenResponse {
        pub success: bool,
        pub token: String,
        pub source: TokenSource,
        pub expires_at: DateTime<Utc>,
    }
}
