use std::net::SocketAddr;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::json;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, instrument};

use crate::state::AppState;
use crate::{auth, contacts, users};

pub fn build_app(state: AppState) -> Router {
    Router::new()
        .nest(
            "/api",
            Router::new()
                .merge(auth::router())
                .merge(users::router(state.clone()))
                .merge(contacts::router())
                .route("/healthchecker", get(healthchecker)),
        )
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    let method = req.method().clone();
                    let uri = req.uri().clone();
                    tracing::info_span!("http_request", %method, uri = %uri, status = tracing::field::Empty)
                })
                .on_response(
                    |res: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     span: &tracing::Span| {
                        let status = res.status();
                        span.record("status", tracing::field::display(status));
                        let latency_ms = latency.as_millis() as u64;
                        if status.is_server_error() {
                            tracing::error!(%status, latency_ms, "response");
                        } else {
                            tracing::info!(%status, latency_ms, "response");
                        }
                    },
                ),
        )
}

#[instrument(skip(state))]
async fn healthchecker(State(state): State<AppState>) -> Response {
    match sqlx::query_scalar::<_, i32>("SELECT 1").fetch_one(&state.db).await {
        Ok(_) => Json(json!({ "message": "Contacts API is up" })).into_response(),
        Err(e) => {
            error!(error = %e, "health check query failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "detail": "Error connecting to database" })),
            )
                .into_response()
        }
    }
}

pub async fn serve(app: Router) -> anyhow::Result<()> {
    let addr: SocketAddr = format!(
        "{}:{}",
        std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
        std::env::var("APP_PORT").unwrap_or_else(|_| "8080".into())
    )
    .parse()?;

    tracing::info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        cache::user_key,
        users::repo_types::{Role, User},
    };
    use axum::{
        body::{to_bytes, Body},
        extract::ConnectInfo,
        http::{header, Request},
    };
    use std::time::Duration;
    use time::OffsetDateTime;
    use tower::ServiceExt;

    fn user(role: Role) -> User {
        User {
            id: 42,
            username: "ann".into(),
            email: "ann@example.com".into(),
            password_hash: "$argon2id$v=19$m=19456,t=2,p=1$c2FsdA$aGFzaA".into(),
            confirmed_email: true,
            avatar: Some("https://www.gravatar.com/avatar/x".into()),
            role,
            created_at: OffsetDateTime::now_utc(),
            updated_at: OffsetDateTime::now_utc(),
        }
    }

    /// Seeds the session cache so identity resolution never reaches the store.
    async fn signed_in(role: Role) -> (AppState, String) {
        let state = AppState::fake();
        let u = user(role);
        state
            .cache
            .set(
                &user_key(&u.email),
                &serde_json::to_string(&u).unwrap(),
                Duration::from_secs(60),
            )
            .await
            .unwrap();
        let token = state.jwt.sign_access(&u.email).unwrap();
        (state, token)
    }

    fn get_with(uri: &str, token: Option<&str>) -> Request<Body> {
        let mut req = Request::get(uri);
        if let Some(t) = token {
            req = req.header(header::AUTHORIZATION, format!("Bearer {t}"));
        }
        req.body(Body::empty()).unwrap()
    }

    async fn body_json(resp: Response) -> serde_json::Value {
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn me_without_token_is_unauthorized() {
        let app = build_app(AppState::fake());
        let resp = app.oneshot(get_with("/api/users/me", None)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(resp.headers().get(header::WWW_AUTHENTICATE).unwrap(), "Bearer");
    }

    #[tokio::test]
    async fn email_token_cannot_authenticate() {
        let (state, _) = signed_in(Role::User).await;
        let email_token = state.jwt.sign_email("ann@example.com").unwrap();
        let app = build_app(state);
        let resp = app
            .oneshot(get_with("/api/users/me", Some(&email_token)))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(resp).await["detail"], "Could not validate credentials");
    }

    #[tokio::test]
    async fn me_returns_cached_user_without_secrets() {
        let (state, token) = signed_in(Role::User).await;
        let app = build_app(state);
        let resp = app.oneshot(get_with("/api/users/me", Some(&token))).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = body_json(resp).await;
        assert_eq!(body["id"], 42);
        assert_eq!(body["username"], "ann");
        assert_eq!(body["role"], "user");
        assert!(body.get("password_hash").is_none());
    }

    #[tokio::test]
    async fn me_is_rate_limited_per_client() {
        let (state, token) = signed_in(Role::User).await;
        let app = build_app(state);
        let client: SocketAddr = "10.0.0.1:5555".parse().unwrap();

        let call = |app: Router| {
            let mut req = get_with("/api/users/me", Some(&token));
            req.extensions_mut().insert(ConnectInfo(client));
            app.oneshot(req)
        };

        for _ in 0..10 {
            let resp = call(app.clone()).await.unwrap();
            assert_eq!(resp.status(), StatusCode::OK);
        }
        let resp = call(app.clone()).await.unwrap();
        assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            body_json(resp).await["error"],
            "Too many requests. Please try again later"
        );
    }

    #[tokio::test]
    async fn avatar_upload_requires_admin() {
        let (state, token) = signed_in(Role::User).await;
        let app = build_app(state);
        let boundary = "XBOUNDARY";
        let body = format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"a.png\"\r\nContent-Type: image/png\r\n\r\nPNGDATA\r\n--{boundary}--\r\n"
        );
        let req = Request::patch("/api/users/avatar")
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={boundary}"),
            )
            .body(Body::from(body))
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            body_json(resp).await["detail"],
            "Access denied: insufficient privileges"
        );
    }

    #[tokio::test]
    async fn contact_list_rejects_out_of_range_limit() {
        let (state, token) = signed_in(Role::User).await;
        let app = build_app(state);
        let resp = app
            .oneshot(get_with("/api/contacts?limit=5000", Some(&token)))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body_json(resp).await["detail"][0]["field"], "limit");
    }

    #[tokio::test]
    async fn contact_id_must_be_positive() {
        let (state, token) = signed_in(Role::User).await;
        let app = build_app(state);
        let resp = app
            .oneshot(get_with("/api/contacts/0", Some(&token)))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let (state, token) = signed_in(Role::User).await;
        let resp = build_app(state)
            .oneshot(get_with("/api/contacts/abc", Some(&token)))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn contacts_require_authentication() {
        let app = build_app(AppState::fake());
        let resp = app
            .oneshot(get_with("/api/contacts/birthdays", None))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }
}
