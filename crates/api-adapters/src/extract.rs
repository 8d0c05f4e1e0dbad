//! Caller identity extraction.

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use domains::{AppError, Identity, UserId};

use crate::error::ApiError;
use crate::AppState;

/// An authenticated, provisioned caller.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: UserId,
    pub username: String,
}

fn bearer(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    /// Verifies the bearer token, then makes sure the user and their default
    /// boxes exist.
    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer(parts).ok_or(AppError::Unauthenticated)?;
        let identity: Identity = state.verifier.verify(token)?;
        let user = state.services.users.provision(&identity, None).await?;
        Ok(CurrentUser {
            id: user.id,
            username: user.username,
        })
    }
}
