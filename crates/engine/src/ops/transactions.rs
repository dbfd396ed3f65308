//! Ledger read/write contracts for transactions.
//!
//! Two store-level invariants substitute for cross-process locking:
//! the unique index on `merchant_ref` (insert-or-fetch contract) and the
//! conditional terminal-status update (compare-and-set on the current
//! status), which together make order creation and reconciliation safe
//! under concurrent invocations.

use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, EntityTrait, QueryFilter,
    sea_query::Expr,
};
use uuid::Uuid;

use crate::{EngineError, ResultEngine, Transaction, TransactionStatus, transactions};

use super::Engine;

const NON_TERMINAL: [&str; 2] = ["initiated", "pending"];

impl Engine {
    /// Find a transaction by gateway order id or merchant reference.
    pub async fn transaction_by_reference(&self, reference: &str) -> ResultEngine<Transaction> {
        self.find_transaction(&self.database, reference).await
    }

    pub(super) async fn find_transaction<C: ConnectionTrait>(
        &self,
        db: &C,
        reference: &str,
    ) -> ResultEngine<Transaction> {
        let model = transactions::Entity::find()
            .filter(
                Condition::any()
                    .add(transactions::Column::GatewayOrderId.eq(reference.to_string()))
                    .add(transactions::Column::MerchantRef.eq(reference.to_string())),
            )
            .one(db)
            .await?
            .ok_or_else(|| EngineError::NotFound("transaction not found".to_string()))?;

        Transaction::try_from(model)
    }

    pub(super) async fn transaction_by_id<C: ConnectionTrait>(
        &self,
        db: &C,
        transaction_id: Uuid,
    ) -> ResultEngine<Transaction> {
        let model = transactions::Entity::find_by_id(transaction_id.to_string())
            .one(db)
            .await?
            .ok_or_else(|| EngineError::NotFound("transaction not found".to_string()))?;

        Transaction::try_from(model)
    }

    /// Insert a transaction, or fetch the existing one when the merchant
    /// reference is already taken (uniqueness acts as the idempotency
    /// guard, so callers never need manual existence checks).
    pub(super) async fn insert_transaction<C: ConnectionTrait>(
        &self,
        db: &C,
        tx: &Transaction,
    ) -> ResultEngine<Uuid> {
        if let Err(err) = transactions::ActiveModel::from(tx).insert(db).await {
            let existing = transactions::Entity::find()
                .filter(transactions::Column::MerchantRef.eq(tx.merchant_ref.clone()))
                .one(db)
                .await?;
            if let Some(existing) = existing {
                tracing::debug!(
                    merchant_ref = %tx.merchant_ref,
                    "transaction already exists for reference, returning it"
                );
                return Uuid::parse_str(&existing.id)
                    .map_err(|_| EngineError::NotFound("transaction not exists".to_string()));
            }
            return Err(err.into());
        }

        Ok(tx.id)
    }

    /// Record a non-terminal status observation: bump the check counter
    /// and refresh the audit snapshot without touching the status.
    pub(super) async fn bump_status_check<C: ConnectionTrait>(
        &self,
        db: &C,
        transaction_id: Uuid,
        gateway_status: &str,
        raw: &serde_json::Value,
        now: DateTime<Utc>,
    ) -> ResultEngine<Transaction> {
        let current = self.transaction_by_id(db, transaction_id).await?;
        transactions::Entity::update_many()
            .col_expr(
                transactions::Column::GatewayStatus,
                Expr::value(Some(gateway_status.to_string())),
            )
            .col_expr(
                transactions::Column::ResponseData,
                Expr::value(Some(raw.to_string())),
            )
            .col_expr(
                transactions::Column::LastStatusCheckAt,
                Expr::value(Some(now)),
            )
            .col_expr(
                transactions::Column::StatusCheckCount,
                Expr::value(current.status_check_count + 1),
            )
            .filter(transactions::Column::Id.eq(transaction_id.to_string()))
            .exec(db)
            .await?;

        self.transaction_by_id(db, transaction_id).await
    }

    /// Apply a terminal transition as a single conditional update.
    ///
    /// The status filter is the compare-and-set: of two concurrent
    /// reconcilers exactly one wins; the loser observes the terminal row.
    /// Re-applying the *same* terminal status is an idempotent audit
    /// refresh; a *different* terminal status fails `AlreadyFinalized`.
    pub(super) async fn apply_terminal_transition<C: ConnectionTrait>(
        &self,
        db: &C,
        transaction_id: Uuid,
        prior_count: i32,
        new_status: TransactionStatus,
        gateway_status: &str,
        raw: &serde_json::Value,
        now: DateTime<Utc>,
        failure_reason: Option<String>,
    ) -> ResultEngine<Transaction> {
        debug_assert!(new_status.is_terminal());

        let mut update = transactions::Entity::update_many()
            .col_expr(
                transactions::Column::Status,
                Expr::value(new_status.as_str()),
            )
            .col_expr(
                transactions::Column::GatewayStatus,
                Expr::value(Some(gateway_status.to_string())),
            )
            .col_expr(
                transactions::Column::ResponseData,
                Expr::value(Some(raw.to_string())),
            )
            .col_expr(
                transactions::Column::LastStatusCheckAt,
                Expr::value(Some(now)),
            )
            .col_expr(
                transactions::Column::StatusCheckCount,
                Expr::value(prior_count + 1),
            );

        if new_status == TransactionStatus::Success {
            update = update.col_expr(transactions::Column::CompletedAt, Expr::value(Some(now)));
        }
        if let Some(reason) = failure_reason.clone() {
            update = update.col_expr(
                transactions::Column::FailureReason,
                Expr::value(Some(reason)),
            );
        }

        let result = update
            .filter(transactions::Column::Id.eq(transaction_id.to_string()))
            .filter(transactions::Column::Status.is_in(NON_TERMINAL))
            .exec(db)
            .await?;

        if result.rows_affected > 0 {
            return self.transaction_by_id(db, transaction_id).await;
        }

        let current = self.transaction_by_id(db, transaction_id).await?;
        if current.status == new_status {
            // Same terminal status delivered again: refresh audit fields only.
            return self
                .bump_status_check(db, transaction_id, gateway_status, raw, now)
                .await;
        }
        if current.status.is_terminal() {
            return Err(EngineError::AlreadyFinalized(format!(
                "transaction {transaction_id} is already {}",
                current.status.as_str()
            )));
        }

        tracing::warn!(
            %transaction_id,
            status = current.status.as_str(),
            "terminal transition lost a race, returning current row"
        );
        Ok(current)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Utc;
    use gateway::mock::MockGateway;
    use migration::MigratorTrait;
    use sea_orm::Database;
    use uuid::Uuid;

    use crate::{Engine, EngineError, MoneyCents, Transaction, TransactionStatus};

    async fn test_engine() -> Engine {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        migration::Migrator::up(&db, None).await.unwrap();
        Engine::builder()
            .database(db)
            .gateway(Arc::new(MockGateway::new()))
            .build()
            .await
            .unwrap()
    }

    fn fixture(merchant_ref: &str) -> Transaction {
        Transaction {
            id: Uuid::new_v4(),
            invoice_id: "inv-1".to_string(),
            user_id: "alice".to_string(),
            vendor_id: "vendor-1".to_string(),
            amount: MoneyCents::new(10_000),
            fee: MoneyCents::new(200),
            rewards: MoneyCents::new(150),
            status: TransactionStatus::Initiated,
            gateway_order_id: format!("{merchant_ref}-order"),
            gateway_order_token: "token".to_string(),
            merchant_ref: merchant_ref.to_string(),
            gateway_status: Some("CREATED".to_string()),
            response_data: None,
            status_check_count: 0,
            last_status_check_at: None,
            completed_at: None,
            failure_reason: None,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn duplicate_merchant_ref_returns_existing_id() {
        let engine = test_engine().await;
        let first = fixture("REF_1");
        let second = fixture("REF_1");

        let first_id = engine
            .insert_transaction(&engine.database, &first)
            .await
            .unwrap();
        let second_id = engine
            .insert_transaction(&engine.database, &second)
            .await
            .unwrap();

        assert_eq!(first_id, first.id);
        assert_eq!(second_id, first.id);
    }

    #[tokio::test]
    async fn conflicting_terminal_statuses_have_one_winner() {
        let engine = test_engine().await;
        let tx = fixture("REF_1");
        engine
            .insert_transaction(&engine.database, &tx)
            .await
            .unwrap();

        let raw = serde_json::json!({ "status": "SUCCESS" });
        let updated = engine
            .apply_terminal_transition(
                &engine.database,
                tx.id,
                0,
                TransactionStatus::Success,
                "SUCCESS",
                &raw,
                Utc::now(),
                None,
            )
            .await
            .unwrap();
        assert_eq!(updated.status, TransactionStatus::Success);
        assert!(updated.completed_at.is_some());

        let raw = serde_json::json!({ "status": "FAILURE" });
        let err = engine
            .apply_terminal_transition(
                &engine.database,
                tx.id,
                updated.status_check_count,
                TransactionStatus::Failure,
                "FAILURE",
                &raw,
                Utc::now(),
                Some("late webhook".to_string()),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::AlreadyFinalized(_)));
    }

    #[tokio::test]
    async fn reapplying_the_same_terminal_status_refreshes_audit_fields() {
        let engine = test_engine().await;
        let tx = fixture("REF_1");
        engine
            .insert_transaction(&engine.database, &tx)
            .await
            .unwrap();

        let raw = serde_json::json!({ "status": "SUCCESS" });
        let first = engine
            .apply_terminal_transition(
                &engine.database,
                tx.id,
                0,
                TransactionStatus::Success,
                "SUCCESS",
                &raw,
                Utc::now(),
                None,
            )
            .await
            .unwrap();

        let again = engine
            .apply_terminal_transition(
                &engine.database,
                tx.id,
                first.status_check_count,
                TransactionStatus::Success,
                "SUCCESS",
                &raw,
                Utc::now(),
                None,
            )
            .await
            .unwrap();
        assert_eq!(again.status, TransactionStatus::Success);
        assert_eq!(again.status_check_count, first.status_check_count + 1);
    }
}
