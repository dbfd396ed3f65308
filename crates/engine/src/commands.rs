//! Command structs for engine operations.
//!
//! These types group parameters for the orchestration entry points,
//! keeping call sites readable.

use crate::MoneyCents;

/// Create a gateway order for a pending invoice.
#[derive(Clone, Debug)]
pub struct CreateOrderCmd {
    pub invoice_id: String,
    /// Caller-supplied amount; must equal the stored invoice amount.
    pub amount: MoneyCents,
    pub user_id: String,
}

/// Reconcile a transaction with the gateway's authoritative status.
#[derive(Clone, Debug)]
pub struct ReconcileCmd {
    /// Gateway order id or merchant reference.
    pub reference: String,
    /// Raw callback payload for the webhook path; `None` polls the
    /// gateway's status endpoint instead.
    pub pushed: Option<serde_json::Value>,
}

impl ReconcileCmd {
    #[must_use]
    pub fn poll(reference: impl Into<String>) -> Self {
        Self {
            reference: reference.into(),
            pushed: None,
        }
    }

    #[must_use]
    pub fn pushed(reference: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            reference: reference.into(),
            pushed: Some(payload),
        }
    }
}
