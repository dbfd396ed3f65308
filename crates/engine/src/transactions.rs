//! Transaction primitives.
//!
//! A `Transaction` records one payment attempt against an invoice. It is
//! created in `initiated` state when a gateway order is placed and mutated
//! only by reconciliation afterwards. Terminal statuses are absorbing:
//! once terminal, only the audit fields (raw snapshot, status check
//! counters) may be refreshed.

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use uuid::Uuid;

use crate::{EngineError, MoneyCents};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransactionStatus {
    Initiated,
    Success,
    Failure,
    Cancelled,
    Expired,
    Pending,
}

impl TransactionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Initiated => "initiated",
            Self::Success => "success",
            Self::Failure => "failure",
            Self::Cancelled => "cancelled",
            Self::Expired => "expired",
            Self::Pending => "pending",
        }
    }

    /// Terminal statuses admit no further transition.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Success | Self::Failure | Self::Cancelled | Self::Expired
        )
    }

    /// Total mapping from the raw upstream status string.
    ///
    /// Unrecognized values map to `Pending` (non-terminal), never error.
    pub fn from_gateway(raw: &str) -> Self {
        match raw {
            "SUCCESS" => Self::Success,
            "FAILURE" => Self::Failure,
            "CANCELLED" => Self::Cancelled,
            "EXPIRED" => Self::Expired,
            _ => Self::Pending,
        }
    }
}

impl TryFrom<&str> for TransactionStatus {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "initiated" => Ok(Self::Initiated),
            "success" => Ok(Self::Success),
            "failure" => Ok(Self::Failure),
            "cancelled" => Ok(Self::Cancelled),
            "expired" => Ok(Self::Expired),
            "pending" => Ok(Self::Pending),
            other => Err(EngineError::NotFound(format!(
                "invalid transaction status: {other}"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Transaction {
    pub id: Uuid,
    pub invoice_id: String,
    pub user_id: String,
    pub vendor_id: String,
    pub amount: MoneyCents,
    pub fee: MoneyCents,
    pub rewards: MoneyCents,
    pub status: TransactionStatus,
    pub gateway_order_id: String,
    pub gateway_order_token: String,
    /// Caller-generated idempotency key, unique across all transactions.
    pub merchant_ref: String,
    /// Last raw upstream status string observed.
    pub gateway_status: Option<String>,
    /// Full gateway response snapshot, kept for audit.
    pub response_data: Option<serde_json::Value>,
    pub status_check_count: i32,
    pub last_status_check_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "transactions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub invoice_id: String,
    pub user_id: String,
    pub vendor_id: String,
    pub amount_minor: i64,
    pub fee_minor: i64,
    pub rewards_minor: i64,
    pub status: String,
    pub gateway_order_id: String,
    pub gateway_order_token: String,
    pub merchant_ref: String,
    pub gateway_status: Option<String>,
    pub response_data: Option<String>,
    pub status_check_count: i32,
    pub last_status_check_at: Option<DateTimeUtc>,
    pub completed_at: Option<DateTimeUtc>,
    pub failure_reason: Option<String>,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Transaction> for ActiveModel {
    fn from(tx: &Transaction) -> Self {
        Self {
            id: ActiveValue::Set(tx.id.to_string()),
            invoice_id: ActiveValue::Set(tx.invoice_id.clone()),
            user_id: ActiveValue::Set(tx.user_id.clone()),
            vendor_id: ActiveValue::Set(tx.vendor_id.clone()),
            amount_minor: ActiveValue::Set(tx.amount.cents()),
            fee_minor: ActiveValue::Set(tx.fee.cents()),
            rewards_minor: ActiveValue::Set(tx.rewards.cents()),
            status: ActiveValue::Set(tx.status.as_str().to_string()),
            gateway_order_id: ActiveValue::Set(tx.gateway_order_id.clone()),
            gateway_order_token: ActiveValue::Set(tx.gateway_order_token.clone()),
            merchant_ref: ActiveValue::Set(tx.merchant_ref.clone()),
            gateway_status: ActiveValue::Set(tx.gateway_status.clone()),
            response_data: ActiveValue::Set(
                tx.response_data.as_ref().map(ToString::to_string),
            ),
            status_check_count: ActiveValue::Set(tx.status_check_count),
            last_status_check_at: ActiveValue::Set(tx.last_status_check_at),
            completed_at: ActiveValue::Set(tx.completed_at),
            failure_reason: ActiveValue::Set(tx.failure_reason.clone()),
            created_at: ActiveValue::Set(tx.created_at),
        }
    }
}

impl TryFrom<Model> for Transaction {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: Uuid::parse_str(&model.id)
                .map_err(|_| EngineError::NotFound("transaction not exists".to_string()))?,
            invoice_id: model.invoice_id,
            user_id: model.user_id,
            vendor_id: model.vendor_id,
            amount: MoneyCents::new(model.amount_minor),
            fee: MoneyCents::new(model.fee_minor),
            rewards: MoneyCents::new(model.rewards_minor),
            status: TransactionStatus::try_from(model.status.as_str())?,
            gateway_order_id: model.gateway_order_id,
            gateway_order_token: model.gateway_order_token,
            merchant_ref: model.merchant_ref,
            gateway_status: model.gateway_status,
            response_data: model
                .response_data
                .as_deref()
                .and_then(|s| serde_json::from_str(s).ok()),
            status_check_count: model.status_check_count,
            last_status_check_at: model.last_status_check_at,
            completed_at: model.completed_at,
            failure_reason: model.failure_reason,
            created_at: model.created_at,
        })
    }
}
