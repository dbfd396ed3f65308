//! Internal service-to-service token endpoint.

use api_types::token::{TokenResponse, TokenSource as ApiSource};
use axum::{Extension, Json, extract::State};
use engine::TokenSource;

use crate::{ServerError, server::ServerState, user};

fn map_source(source: TokenSource) -> ApiSource {
    match source {
        TokenSource::Cached => ApiSource::Cached,
        TokenSource::Fresh => ApiSource::Fresh,
    }
}

pub async fn get(
    Extension(_user): Extension<user::Model>,
    State(state): State<ServerState>,
) -> Result<Json<TokenResponse>, ServerError> {
    let (token, source) = state.engine.get_token().await?;

    Ok(Json(TokenResponse {
        success: true,
        token: token.access_token,
        source: map_source(source),
        expires_at: token.expires_at,
    }))
}
