//! Reconciliation: apply the gateway's authoritative payment status to
//! the local ledger exactly once.
//!
//! Both delivery paths (pushed webhook payload and explicit status poll)
//! converge on the same fixed mapping and the same conditional terminal
//! transition, so duplicate webhooks and concurrent polls are safe.

use chrono::Utc;
use sea_orm::TransactionTrait;
use uuid::Uuid;

use crate::{MoneyCents, ReconcileCmd, ResultEngine, Transaction, TransactionStatus};

use super::{Engine, with_tx};

/// Outcome of a reconciliation call.
#[derive(Clone, Debug)]
pub struct Reconciled {
    pub verified: bool,
    pub status: TransactionStatus,
    pub gateway_status: Option<String>,
    pub transaction_id: Uuid,
    pub invoice_id: String,
    pub amount: MoneyCents,
}

impl Reconciled {
    fn from_transaction(tx: &Transaction) -> Self {
        Self {
            verified: tx.status == TransactionStatus::Success,
            status: tx.status,
            gateway_status: tx.gateway_status.clone(),
            transaction_id: tx.id,
            invoice_id: tx.invoice_id.clone(),
            amount: tx.amount,
        }
    }
}

/// Extract the upstream status string from a pushed callback payload.
///
/// Callbacks carry the status under `status`, `state`, or (legacy shape)
/// `code`, where `PAYMENT_SUCCESS` means success. Missing or unknown
/// values fall through the total mapping to `pending`.
fn pushed_status(payload: &serde_json::Value) -> String {
    let raw = payload
        .get("status")
        .or_else(|| payload.get("state"))
        .or_else(|| payload.get("code"))
        .and_then(|v| v.as_str())
        .unwrap_or("");

    match raw {
        "PAYMENT_SUCCESS" => "SUCCESS".to_string(),
        other => other.to_string(),
    }
}

fn payload_message(payload: &serde_json::Value) -> Option<String> {
    payload
        .get("message")
        .and_then(|v| v.as_str())
        .map(ToString::to_string)
}

impl Engine {
    /// Reconcile a transaction against the gateway status, either pushed
    /// (webhook) or fetched (poll/verify).
    ///
    /// Repeated deliveries are idempotent: an already-terminal
    /// transaction short-circuits to its stored outcome.
    pub async fn reconcile(&self, cmd: ReconcileCmd) -> ResultEngine<Reconciled> {
        let tx = self.transaction_by_reference(&cmd.reference).await?;

        if tx.status.is_terminal() {
            tracing::debug!(
                transaction_id = %tx.id,
                status = tx.status.as_str(),
                "transaction already terminal, returning stored outcome"
            );
            return Ok(Reconciled::from_transaction(&tx));
        }

        let (gateway_status, raw) = match cmd.pushed {
            Some(payload) => (pushed_status(&payload), payload),
            None => {
                let (token, _) = self.get_token().await?;
                let snapshot = self
                    .gateway
                    .fetch_status(&tx.gateway_order_id, &token.access_token)
                    .await?;
                (snapshot.status, snapshot.raw)
            }
        };

        let mapped = TransactionStatus::from_gateway(&gateway_status);
        let now = Utc::now();

        if !mapped.is_terminal() {
            let updated = self
                .bump_status_check(&self.database, tx.id, &gateway_status, &raw, now)
                .await?;
            // Report the mapped status; the stored row keeps its state
            // machine position until a terminal transition lands.
            return Ok(Reconciled {
                status: mapped,
                ..Reconciled::from_transaction(&updated)
            });
        }

        let failure_reason = (mapped == TransactionStatus::Failure)
            .then(|| payload_message(&raw).unwrap_or_else(|| "payment failed".to_string()));

        let updated: ResultEngine<Transaction> = with_tx!(self, |db_tx| {
            let updated = self
                .apply_terminal_transition(
                    &db_tx,
                    tx.id,
                    tx.status_check_count,
                    mapped,
                    &gateway_status,
                    &raw,
                    now,
                    failure_reason,
                )
                .await?;

            if updated.status == TransactionStatus::Success {
                self.mark_invoice_paid(&db_tx, &updated.invoice_id, now)
                    .await?;
            }

            Ok(updated)
        });
        let updated = updated?;

        tracing::info!(
            transaction_id = %updated.id,
            status = updated.status.as_str(),
            gateway_status = %gateway_status,
            "reconciliation applied"
        );

        Ok(Reconciled::from_transaction(&updated))
    }
}
