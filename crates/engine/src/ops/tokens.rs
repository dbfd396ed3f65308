//! Token cache over the `auth_tokens` table.

use chrono::{Duration, Utc};
use sea_orm::{
    ActiveModelTrait, ActiveValue, ColumnTrait, EntityTrait, QueryFilter, QueryOrder,
    TransactionTrait, sea_query::Expr,
};

use crate::{
    BearerToken, EngineError, ResultEngine, TOKEN_FRESHNESS_MARGIN_SECS, TokenSource, auth_tokens,
};

use super::{Engine, with_tx};

impl Engine {
    /// Return a usable bearer token, refreshing it from the gateway's
    /// OAuth endpoint when no stored token stays valid for at least the
    /// freshness margin.
    ///
    /// Concurrent callers may race the refresh and each perform a
    /// redundant upstream call and insert; the last writer's token
    /// remains usable. This duplication is accepted instead of
    /// cross-process locking.
    pub async fn get_token(&self) -> ResultEngine<(BearerToken, TokenSource)> {
        let margin = Duration::seconds(TOKEN_FRESHNESS_MARGIN_SECS);
        let cutoff = Utc::now() + margin;

        let cached = auth_tokens::Entity::find()
            .filter(auth_tokens::Column::IsActive.eq(true))
            .filter(auth_tokens::Column::ExpiresAt.gt(cutoff))
            .order_by_desc(auth_tokens::Column::ExpiresAt)
            .one(&self.database)
            .await?;

        if let Some(model) = cached {
            return Ok((BearerToken::from(model), TokenSource::Cached));
        }

        tracing::debug!("no fresh auth token cached, fetching from gateway");
        let issued = self
            .gateway
            .fetch_token()
            .await
            .map_err(|err| EngineError::AuthUnavailable(err.to_string()))?;

        let now = Utc::now();
        let token = BearerToken {
            access_token: issued.access_token,
            token_type: issued.token_type,
            expires_at: now + Duration::seconds(issued.expires_in),
        };

        let stored = token.clone();
        let inserted: ResultEngine<()> = with_tx!(self, |db_tx| {
            auth_tokens::Entity::update_many()
                .col_expr(auth_tokens::Column::IsActive, Expr::value(false))
                .filter(auth_tokens::Column::IsActive.eq(true))
                .exec(&db_tx)
                .await?;

            auth_tokens::ActiveModel {
                id: ActiveValue::NotSet,
                access_token: ActiveValue::Set(stored.access_token),
                token_type: ActiveValue::Set(stored.token_type),
                expires_at: ActiveValue::Set(stored.expires_at),
                is_active: ActiveValue::Set(true),
                created_at: ActiveValue::Set(now),
            }
            .insert(&db_tx)
            .await?;

            Ok(())
        });
        inserted?;

        tracing::info!(expires_at = %token.expires_at, "stored fresh gateway auth token");
        Ok((token, TokenSource::Fresh))
    }
}
