//! Payment orchestration core.
//!
//! The [`Engine`] ties the upstream payment gateway to the local ledger of
//! invoices and transactions: it caches OAuth bearer tokens, creates
//! gateway orders for pending invoices, and reconciles authoritative
//! gateway statuses onto the transaction state machine exactly once.

pub use auth_tokens::{BearerToken, TOKEN_FRESHNESS_MARGIN_SECS, TokenSource};
pub use commands::{CreateOrderCmd, ReconcileCmd};
pub use error::EngineError;
pub use invoices::{Invoice, InvoiceStatus};
pub use money::MoneyCents;
pub use ops::{Engine, EngineBuilder, OrderPlaced, Reconciled};
pub use transactions::{Transaction, TransactionStatus};

mod auth_tokens;
mod commands;
mod error;
mod invoices;
mod money;
mod ops;
mod transactions;

type ResultEngine<T> = Result<T, EngineError>;
