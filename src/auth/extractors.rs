use std::marker::PhantomData;
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use tracing::warn;

use super::roles::{RoleAccess, RolePolicy};
use crate::{
    cache::user_key,
    error::AppError,
    state::AppState,
    users::repo_types::User,
};

const CREDENTIALS_ERROR: &str = "Could not validate credentials";

/// The user making the request, resolved from a bearer access token.
pub struct CurrentUser(pub User);

/// Looks the user up in the session cache first and falls back to the store,
/// populating the cache on a miss. Cache failures degrade to a store lookup.
pub async fn resolve_user(state: &AppState, email: &str) -> anyhow::Result<Option<User>> {
    let key = user_key(email);
    match state.cache.get(&key).await {
        Ok(Some(raw)) => match serde_json::from_str::<User>(&raw) {
            Ok(user) => return Ok(Some(user)),
            Err(e) => warn!(error = %e, %key, "discarding unreadable cache entry"),
        },
        Ok(None) => {}
        Err(e) => warn!(error = ?e, %key, "session cache read failed"),
    }

    let Some(user) = User::find_by_email(&state.db, email).await? else {
        return Ok(None);
    };

    let ttl = Duration::from_secs(state.config.cache.user_ttl_seconds);
    match serde_json::to_string(&user) {
        Ok(raw) => {
            if let Err(e) = state.cache.set(&key, &raw, ttl).await {
                warn!(error = ?e, %key, "session cache write failed");
            }
        }
        Err(e) => warn!(error = %e, %key, "serialize user for cache failed"),
    }
    Ok(Some(user))
}

fn bearer_token(parts: &Parts) -> Result<&str, AppError> {
    let header = parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::BearerRequired("Not authenticated".into()))?;

    header
        .strip_prefix("Bearer ")
        .or_else(|| header.strip_prefix("bearer "))
        .ok_or_else(|| AppError::BearerRequired("Not authenticated".into()))
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)?;

        let claims = state.jwt.verify_access(token).map_err(|e| {
            warn!(error = %e, "access token rejected");
            AppError::BearerRequired(CREDENTIALS_ERROR.into())
        })?;

        match resolve_user(state, &claims.sub).await? {
            Some(user) => Ok(CurrentUser(user)),
            None => {
                warn!(email = %claims.sub, "token subject has no account");
                Err(AppError::BearerRequired(CREDENTIALS_ERROR.into()))
            }
        }
    }
}

/// A current user whose role passed the policy `P`.
pub struct Authorized<P: RolePolicy> {
    pub user: User,
    _policy: PhantomData<P>,
}

#[async_trait]
impl<P: RolePolicy> FromRequestParts<AppState> for Authorized<P> {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let CurrentUser(user) = CurrentUser::from_request_parts(parts, state).await?;
        RoleAccess::new(P::ALLOWED).check(&user)?;
        Ok(Authorized {
            user,
            _policy: PhantomData,
        })
    }
}
