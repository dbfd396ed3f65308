//! Invoice primitives.
//!
//! An `Invoice` is created by an external invoicing flow and only ever
//! advances `pending -> payment_initiated -> paid`; the amount is
//! immutable once created.

use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use uuid::Uuid;

use crate::{EngineError, MoneyCents};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InvoiceStatus {
    Pending,
    PaymentInitiated,
    Paid,
}

impl InvoiceStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::PaymentInitiated => "payment_initiated",
            Self::Paid => "paid",
        }
    }
}

impl TryFrom<&str> for InvoiceStatus {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "pending" => Ok(Self::Pending),
            "payment_initiated" => Ok(Self::PaymentInitiated),
            "paid" => Ok(Self::Paid),
            other => Err(EngineError::NotFound(format!(
                "invalid invoice status: {other}"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Invoice {
    pub id: String,
    pub user_id: String,
    pub vendor_id: String,
    pub amount: MoneyCents,
    pub status: InvoiceStatus,
    pub transaction_id: Option<Uuid>,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "invoices")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub user_id: String,
    pub vendor_id: String,
    pub amount_minor: i64,
    pub status: String,
    pub transaction_id: Option<String>,
    pub paid_at: Option<DateTimeUtc>,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl TryFrom<Model> for Invoice {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: model.id,
            user_id: model.user_id,
            vendor_id: model.vendor_id,
            amount: MoneyCents::new(model.amount_minor),
            status: InvoiceStatus::try_from(model.status.as_str())?,
            transaction_id: model
                .transaction_id
                .and_then(|s| Uuid::parse_str(&s).ok()),
            paid_at: model.paid_at,
            created_at: model.created_at,
        })
    }
}
