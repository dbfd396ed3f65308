//! Order orchestration: turn a pending invoice into a gateway order and
//! an `initiated` transaction.

use chrono::Utc;
use sea_orm::TransactionTrait;
use uuid::Uuid;

use gateway::OrderRequest;

use crate::{
    CreateOrderCmd, EngineError, MoneyCents, ResultEngine, Transaction, TransactionStatus,
};

use super::{Engine, with_tx};

/// Fee charged on every order, in basis points of the invoice amount.
const FEE_BPS: i64 = 200;
/// Rewards earned on every order, in basis points of the invoice amount.
const REWARDS_BPS: i64 = 150;

/// Outcome of a successful order creation.
#[derive(Clone, Debug)]
pub struct OrderPlaced {
    pub order_id: String,
    pub order_token: String,
    pub transaction_id: Uuid,
    pub merchant_ref: String,
    pub amount: MoneyCents,
    pub fee: MoneyCents,
    pub rewards: MoneyCents,
}

/// Generate a unique merchant order reference.
///
/// Time plus a random suffix keeps references unpredictable and
/// collision-free; the value doubles as the idempotency key for the
/// whole payment attempt.
fn merchant_reference(now_millis: i64) -> String {
    let suffix: String = Uuid::new_v4().simple().to_string().chars().take(9).collect();
    format!("INV_{now_millis}_{suffix}")
}

impl Engine {
    /// Create a gateway order for a pending invoice.
    ///
    /// Fees (2%) and rewards (1.5%) are derived from the validated stored
    /// invoice amount and frozen on the transaction; they are never
    /// recomputed later.
    ///
    /// If the gateway order is created but the local persist fails, the
    /// error carries the gateway order id so the caller can reconcile by
    /// reference instead of retrying blindly (which would risk a
    /// duplicate order).
    pub async fn create_order(&self, cmd: CreateOrderCmd) -> ResultEngine<OrderPlaced> {
        let invoice = self
            .pending_invoice(&cmd.invoice_id, &cmd.user_id, cmd.amount)
            .await?;

        let (token, source) = self.get_token().await?;
        tracing::debug!(?source, invoice_id = %invoice.id, "obtained gateway token");

        let now = Utc::now();
        let merchant_ref = merchant_reference(now.timestamp_millis());
        let order = self
            .gateway
            .create_order(
                &OrderRequest {
                    merchant_order_id: merchant_ref.clone(),
                    amount_minor: invoice.amount.cents(),
                    merchant_user_id: cmd.user_id.clone(),
                },
                &token.access_token,
            )
            .await?;

        let fee = invoice.amount.percent_bps(FEE_BPS);
        let rewards = invoice.amount.percent_bps(REWARDS_BPS);

        let tx = Transaction {
            id: Uuid::new_v4(),
            invoice_id: invoice.id.clone(),
            user_id: cmd.user_id,
            vendor_id: invoice.vendor_id.clone(),
            amount: invoice.amount,
            fee,
            rewards,
            status: TransactionStatus::Initiated,
            gateway_order_id: order.order_id.clone(),
            gateway_order_token: order.order_token.clone(),
            merchant_ref: merchant_ref.clone(),
            gateway_status: Some("CREATED".to_string()),
            response_data: Some(order.raw.clone()),
            status_check_count: 0,
            last_status_check_at: None,
            completed_at: None,
            failure_reason: None,
            created_at: now,
        };

        let persisted = self.persist_order(&invoice.id, &tx).await;

        let transaction_id = persisted.map_err(|err| match err {
            EngineError::Database(source) => {
                tracing::error!(
                    order_id = %order.order_id,
                    merchant_ref = %merchant_ref,
                    error = %source,
                    "gateway order created but local persist failed"
                );
                EngineError::PersistAfterGatewaySuccess {
                    order_id: order.order_id.clone(),
                    source,
                }
            }
            other => other,
        })?;

        tracing::info!(
            order_id = %order.order_id,
            %transaction_id,
            invoice_id = %invoice.id,
            "order initiated"
        );

        Ok(OrderPlaced {
            order_id: order.order_id,
            order_token: order.order_token,
            transaction_id,
            merchant_ref,
            amount: invoice.amount,
            fee,
            rewards,
        })
    }

    /// Store the transaction and flip the invoice to `payment_initiated`
    /// atomically.
    async fn persist_order(&self, invoice_id: &str, tx: &Transaction) -> ResultEngine<Uuid> {
        with_tx!(self, |db_tx| {
            let id = self.insert_transaction(&db_tx, tx).await?;
            self.mark_invoice_initiated(&db_tx, invoice_id, id).await?;
            Ok(id)
        })
    }
}
