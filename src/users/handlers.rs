use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    middleware,
    routing::{get, patch},
    Json, Router,
};
use tracing::{instrument, warn};

use super::{
    dto::UserResponse,
    services::{upload_avatar, MAX_AVATAR_BYTES},
};
use crate::{
    auth::{
        extractors::{Authorized, CurrentUser},
        roles::AdminOnly,
    },
    error::{AppError, AppResult},
    rate_limit,
    state::AppState,
};

pub fn me_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/users/me", get(me))
        .route_layer(middleware::from_fn_with_state(state, rate_limit::limit_me))
}

pub fn avatar_routes() -> Router<AppState> {
    Router::new()
        .route("/users/avatar", patch(update_avatar))
        // Multipart framing needs a little room on top of the file itself.
        .layer(DefaultBodyLimit::max(MAX_AVATAR_BYTES + 64 * 1024))
}

#[instrument(skip(user), fields(user_id = user.id))]
pub async fn me(CurrentUser(user): CurrentUser) -> Json<UserResponse> {
    Json(UserResponse::from(&user))
}

#[instrument(skip(state, user, mp), fields(user_id = user.id))]
pub async fn update_avatar(
    State(state): State<AppState>,
    Authorized { user, .. }: Authorized<AdminOnly>,
    mut mp: Multipart,
) -> AppResult<Json<UserResponse>> {
    while let Some(field) = mp
        .next_field()
        .await
        .map_err(|e| AppError::invalid("file", e.body_text()))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let content_type = field
            .content_type()
            .map(|s| s.to_string())
            .unwrap_or_else(|| "application/octet-stream".into());
        let data = field.bytes().await.map_err(|e| {
            warn!(error = %e, "avatar upload read failed");
            AppError::invalid("file", e.body_text())
        })?;
        if data.len() > MAX_AVATAR_BYTES {
            return Err(AppError::invalid("file", "file is too large"));
        }

        let updated = upload_avatar(&state, &user, data, &content_type).await?;
        return Ok(Json(UserResponse::from(&updated)));
    }

    Err(AppError::invalid("file", "file is required"))
}

#[cfg(test)]
mod tests {
    use crate::{
        app::build_app,
        cache::user_key,
        state::AppState,
        users::{
            repo_types::{Role, User},
            testing::seed_user,
        },
    };
    use axum::{
        body::{to_bytes, Body},
        http::{header, Request, StatusCode},
    };
    use tower::ServiceExt;

    fn avatar_upload(token: &str, content_type: &str) -> Request<Body> {
        let boundary = "AVATARBOUNDARY";
        let body = format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"me.png\"\r\nContent-Type: {content_type}\r\n\r\nPNGDATA\r\n--{boundary}--\r\n"
        );
        Request::patch("/api/users/avatar")
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={boundary}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn admin_replaces_avatar_and_cache_is_dropped(db: sqlx::PgPool) {
        seed_user(&db, "root", "secret1", true, Role::Admin).await;
        let state = AppState::fake_with_pool(db.clone());
        let token = state.jwt.sign_access("root@example.com").unwrap();
        let key = user_key("root@example.com");
        let app = build_app(state.clone());
        let resp = app.oneshot(avatar_upload(&token, "image/png")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        let avatar = body["avatar"].as_str().unwrap();
        assert!(avatar.starts_with("https://fake.local/avatars-bucket/avatars/root?v="));

        let stored = User::find_by_email(&db, "root@example.com").await.unwrap().unwrap();
        assert_eq!(stored.avatar.as_deref(), Some(avatar));
        assert!(state.cache.get(&key).await.unwrap().is_none());
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn admin_upload_must_be_an_image(db: sqlx::PgPool) {
        seed_user(&db, "root", "secret1", true, Role::Admin).await;
        let state = AppState::fake_with_pool(db);
        let token = state.jwt.sign_access("root@example.com").unwrap();
        let resp = build_app(state)
            .oneshot(avatar_upload(&token, "text/plain"))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }
}
