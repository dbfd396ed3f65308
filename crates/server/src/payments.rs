//! Payment verification and webhook endpoints.
//!
//! Both converge on the engine's reconcile operation, so a duplicate
//! webhook delivery or a verify call racing a webhook is safe.

use api_types::payment::{VerifyRequest, VerifyResponse, WebhookAck, WebhookDelivery};
use axum::{Extension, Json, extract::State};
use chrono::Utc;
use engine::ReconcileCmd;

use crate::{ServerError, server::ServerState, user};

pub async fn verify(
    Extension(_user): Extension<user::Model>,
    State(state): State<ServerState>,
    Json(payload): Json<VerifyRequest>,
) -> Result<Json<VerifyResponse>, ServerError> {
    let outcome = state
        .engine
        .reconcile(ReconcileCmd::poll(&payload.order_id))
        .await?;

    Ok(Json(VerifyResponse {
        success: true,
        verified: outcome.verified,
        transaction_id: outcome.transaction_id.to_string(),
        status: outcome.status.as_str().to_string(),
        gateway_status: outcome.gateway_status,
        order_id: payload.order_id,
        amount: outcome.amount.to_string(),
        timestamp: Utc::now(),
    }))
}

pub async fn webhook(
    State(state): State<ServerState>,
    Json(payload): Json<WebhookDelivery>,
) -> Result<Json<WebhookAck>, ServerError> {
    let outcome = state
        .engine
        .reconcile(ReconcileCmd::pushed(&payload.merchant_ref, payload.payload))
        .await?;

    Ok(Json(WebhookAck {
        success: outcome.verified,
        status: outcome.status.as_str().to_string(),
        transaction_id: outcome.transaction_id.to_string(),
    }))
}
