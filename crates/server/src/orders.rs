//! Order creation endpoint.

use api_types::order::{OrderCreated, OrderNew};
use axum::{Extension, Json, extract::State, http::StatusCode};
use engine::{CreateOrderCmd, MoneyCents};

use crate::{ServerError, server::ServerState, user};

pub async fn create(
    Extension(user): Extension<user::Model>,
    State(state): State<ServerState>,
    Json(payload): Json<OrderNew>,
) -> Result<(StatusCode, Json<OrderCreated>), ServerError> {
    let amount: MoneyCents = payload.amount.parse()?;

    let placed = state
        .engine
        .create_order(CreateOrderCmd {
            invoice_id: payload.invoice_id,
            amount,
            user_id: user.username,
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(OrderCreated {
            success: true,
            order_id: placed.order_id,
            order_token: placed.order_token,
            transaction_id: placed.transaction_id.to_string(),
            merchant_ref: placed.merchant_ref,
            amount: placed.amount.to_string(),
            fee: placed.fee.to_string(),
            rewards: placed.rewards.to_string(),
        }),
    ))
}
