//! Ledger read/write contracts for invoices.
//!
//! Status updates are conditional on the expected prior status; a guard
//! miss is logged and ignored because the invoice may already reflect a
//! more recent reconciliation.

use chrono::{DateTime, Utc};
use sea_orm::{
    ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, sea_query::Expr,
};
use uuid::Uuid;

use crate::{EngineError, Invoice, InvoiceStatus, MoneyCents, ResultEngine, invoices};

use super::Engine;

impl Engine {
    /// Load an invoice owned by `user_id`, regardless of status.
    pub async fn invoice(&self, invoice_id: &str, user_id: &str) -> ResultEngine<Invoice> {
        let model = invoices::Entity::find_by_id(invoice_id.to_string())
            .filter(invoices::Column::UserId.eq(user_id.to_string()))
            .one(&self.database)
            .await?
            .ok_or_else(|| EngineError::NotFound("invoice not found".to_string()))?;

        Invoice::try_from(model)
    }

    /// Load a pending invoice owned by `user_id` and check the
    /// caller-supplied amount against the stored one.
    pub(super) async fn pending_invoice(
        &self,
        invoice_id: &str,
        user_id: &str,
        amount: MoneyCents,
    ) -> ResultEngine<Invoice> {
        let model = invoices::Entity::find_by_id(invoice_id.to_string())
            .filter(invoices::Column::UserId.eq(user_id.to_string()))
            .filter(invoices::Column::Status.eq(InvoiceStatus::Pending.as_str()))
            .one(&self.database)
            .await?
            .ok_or_else(|| {
                EngineError::NotFound("invoice not found or not pending".to_string())
            })?;

        let invoice = Invoice::try_from(model)?;
        if invoice.amount != amount {
            return Err(EngineError::AmountMismatch(format!(
                "invoice {invoice_id}: expected {}, got {amount}",
                invoice.amount
            )));
        }

        Ok(invoice)
    }

    /// Advance a pending invoice to `payment_initiated`, binding it to
    /// its transaction.
    pub(super) async fn mark_invoice_initiated<C: ConnectionTrait>(
        &self,
        db: &C,
        invoice_id: &str,
        transaction_id: Uuid,
    ) -> ResultEngine<()> {
        let updated = invoices::Entity::update_many()
            .col_expr(
                invoices::Column::Status,
                Expr::value(InvoiceStatus::PaymentInitiated.as_str()),
            )
            .col_expr(
                invoices::Column::TransactionId,
                Expr::value(Some(transaction_id.to_string())),
            )
            .filter(invoices::Column::Id.eq(invoice_id.to_string()))
            .filter(invoices::Column::Status.eq(InvoiceStatus::Pending.as_str()))
            .exec(db)
            .await?;

        if updated.rows_affected == 0 {
            tracing::warn!(invoice_id, "invoice no longer pending, skipping status update");
        }

        Ok(())
    }

    /// Advance an invoice to `paid` with the given timestamp.
    pub(super) async fn mark_invoice_paid<C: ConnectionTrait>(
        &self,
        db: &C,
        invoice_id: &str,
        paid_at: DateTime<Utc>,
    ) -> ResultEngine<()> {
        let updated = invoices::Entity::update_many()
            .col_expr(
                invoices::Column::Status,
                Expr::value(InvoiceStatus::Paid.as_str()),
            )
            .col_expr(invoices::Column::PaidAt, Expr::value(Some(paid_at)))
            .filter(invoices::Column::Id.eq(invoice_id.to_string()))
            .filter(
                invoices::Column::Status.eq(InvoiceStatus::PaymentInitiated.as_str()),
            )
            .exec(db)
            .await?;

        if updated.rows_affected == 0 {
            tracing::warn!(
                invoice_id,
                "invoice not in payment_initiated, skipping paid update"
            );
        }

        Ok(())
    }
}
