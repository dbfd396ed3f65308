//! Bearer token storage for the upstream gateway.
//!
//! At most one row is active at a time: a refresh deactivates every
//! active row and inserts the new token inside the same database
//! transaction. A short window with zero active tokens is acceptable,
//! two active tokens never.

use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;

/// A token is served only while it stays valid for at least this margin.
pub const TOKEN_FRESHNESS_MARGIN_SECS: i64 = 5 * 60;

/// Where a served token came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TokenSource {
    Cached,
    Fresh,
}

/// A usable bearer credential for gateway calls.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BearerToken {
    pub access_token: String,
    pub token_type: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "auth_tokens")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub access_token: String,
    pub token_type: String,
    pub expires_at: DateTimeUtc,
    pub is_active: bool,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for BearerToken {
    fn from(model: Model) -> Self {
        Self {
            access_token: model.access_token,
            token_type: model.token_type,
            expires_at: model.expires_at,
        }
    }
}
