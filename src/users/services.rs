use anyhow::Context;
use bytes::Bytes;
use time::OffsetDateTime;
use tracing::{info, warn};

use super::repo_types::User;
use crate::{cache::user_key, error::AppError, state::AppState};

pub const MAX_AVATAR_BYTES: usize = 5 * 1024 * 1024;

/// Default avatar for a fresh account.
pub fn gravatar_url(email: &str) -> String {
    let digest = md5::compute(email.trim().to_lowercase().as_bytes());
    format!("https://www.gravatar.com/avatar/{:x}", digest)
}

pub fn avatar_key(username: &str) -> String {
    format!("avatars/{username}")
}

/// Drops the cached copy so the next request reloads the user from the store.
pub async fn forget_cached_user(state: &AppState, email: &str) {
    if let Err(e) = state.cache.invalidate(&user_key(email)).await {
        warn!(error = ?e, email = %email, "session cache invalidate failed");
    }
}

pub async fn upload_avatar(
    state: &AppState,
    user: &User,
    body: Bytes,
    content_type: &str,
) -> Result<User, AppError> {
    if body.is_empty() {
        return Err(AppError::invalid("file", "file is empty"));
    }
    if !content_type.starts_with("image/") {
        return Err(AppError::invalid("file", "file must be an image"));
    }

    let key = avatar_key(&user.username);
    state
        .storage
        .put_object(&key, body, content_type)
        .await
        .with_context(|| format!("put_object {key}"))?;

    // Same key on every upload, so the version parameter busts client caches.
    let url = format!(
        "{}?v={}",
        state.storage.public_url(&key),
        OffsetDateTime::now_utc().unix_timestamp()
    );
    let updated = User::update_avatar(&state.db, &user.email, &url).await?;
    forget_cached_user(state, &user.email).await;

    info!(user_id = updated.id, "avatar updated");
    Ok(updated)
}
