use std::sync::Arc;

use gateway::PaymentGateway;
use sea_orm::DatabaseConnection;

use crate::{EngineError, ResultEngine};

mod invoices;
mod orders;
mod reconcile;
mod tokens;
mod transactions;

pub use orders::OrderPlaced;
pub use reconcile::Reconciled;

/// Run a block inside a DB transaction, committing on success and rolling back on error.
macro_rules! with_tx {
    ($self:expr, |$tx:ident| $body:expr) => {{
        let $tx = $self.database.begin().await?;
        let result = $body;
        match result {
            Ok(value) => {
                $tx.commit().await?;
                Ok(value)
            }
            Err(err) => Err(err),
        }
    }};
}

pub(crate) use with_tx;

/// Orchestrates the payment gateway against the local ledger.
///
/// Each call is stateless: all cross-call state lives in the database.
/// Correctness under concurrent calls relies on store-level atomicity
/// (the merchant-reference uniqueness constraint and conditional status
/// updates), not on in-process locking.
pub struct Engine {
    database: DatabaseConnection,
    gateway: Arc<dyn PaymentGateway>,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine").finish_non_exhaustive()
    }
}

impl Engine {
    /// Return a builder for `Engine`.
    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }
}

/// The builder for `Engine`
#[derive(Default)]
pub struct EngineBuilder {
    database: DatabaseConnection,
    gateway: Option<Arc<dyn PaymentGateway>>,
}

impl EngineBuilder {
    /// Pass the required database
    pub fn database(mut self, db: DatabaseConnection) -> EngineBuilder {
        self.database = db;
        self
    }

    /// Pass the required gateway client
    pub fn gateway(mut self, gateway: Arc<dyn PaymentGateway>) -> EngineBuilder {
        self.gateway = Some(gateway);
        self
    }

    /// Construct `Engine`
    pub async fn build(self) -> ResultEngine<Engine> {
        let gateway = self
            .gateway
            .ok_or_else(|| EngineError::Configuration("gateway client is required".to_string()))?;

        Ok(Engine {
            database: self.database,
            gateway,
        })
    }
}
