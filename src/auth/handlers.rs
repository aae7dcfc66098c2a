use axum::{
    extract::{Path, State},
    http::{header::HOST, HeaderMap, StatusCode},
    response::Redirect,
    routing::{get, post},
    Json, Router,
};
use tracing::{info, instrument, warn};

use crate::{
    auth::{
        dto::{EmailRequest, LoginForm, MessageResponse, ResetPasswordForm, SignupRequest, TokenResponse},
        jwt::TokenError,
        password::{hash_password, verify_password},
    },
    error::{conflict_on_unique, AppError, AppResult},
    extract::{ValidForm, ValidJson},
    mail::{spawn_token_email, EmailPurpose},
    state::AppState,
    users::{
        dto::UserResponse,
        repo_types::{NewUser, User},
        services::{forget_cached_user, gravatar_url},
    },
};

const CHECK_EMAIL: &str = "Check your email for confirmation";

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/signup", post(signup))
        .route("/auth/login", post(login))
        .route("/auth/confirmed_email/:token", get(confirmed_email))
        .route("/auth/request_email", post(request_email))
        .route("/auth/forgot_password", post(forgot_password))
        .route(
            "/auth/reset_password/:token",
            get(reset_password_redirect).post(reset_password),
        )
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Base URL for links in outgoing email, taken from the request when possible.
pub(crate) fn request_base_url(headers: &HeaderMap, fallback: &str) -> String {
    match headers.get(HOST).and_then(|h| h.to_str().ok()) {
        Some(host) => {
            let scheme = headers
                .get("x-forwarded-proto")
                .and_then(|h| h.to_str().ok())
                .unwrap_or("http");
            format!("{scheme}://{host}/")
        }
        None => fallback.to_string(),
    }
}

fn email_token_error(e: TokenError) -> AppError {
    warn!(error = %e, "email token rejected");
    match e {
        TokenError::WrongScope => AppError::Unauthorized("Invalid scope for token".into()),
        TokenError::Invalid(_) => AppError::Unauthorized("Invalid token for email verification".into()),
    }
}

#[instrument(skip(state, headers, payload))]
pub async fn signup(
    State(state): State<AppState>,
    headers: HeaderMap,
    ValidJson(mut payload): ValidJson<SignupRequest>,
) -> AppResult<(StatusCode, Json<UserResponse>)> {
    payload.email = normalize_email(&payload.email);

    if User::find_by_email(&state.db, &payload.email).await?.is_some() {
        warn!(email = %payload.email, "email already registered");
        return Err(AppError::Conflict("User with this email already exist".into()));
    }
    if User::find_by_username(&state.db, &payload.username).await?.is_some() {
        warn!(username = %payload.username, "username already taken");
        return Err(AppError::Conflict("User with this name already exist".into()));
    }

    let hash = hash_password(&payload.password)?;
    let avatar = gravatar_url(&payload.email);
    let user = User::create(
        &state.db,
        NewUser {
            username: &payload.username,
            email: &payload.email,
            password_hash: &hash,
            avatar: Some(&avatar),
        },
    )
    .await
    // Lost a race with a concurrent signup for the same email or username.
    .map_err(|e| conflict_on_unique(e, "User with this email or name already exist"))?;

    spawn_token_email(
        state.mailer.clone(),
        &state.jwt,
        EmailPurpose::ConfirmEmail,
        user.email.clone(),
        user.username.clone(),
        request_base_url(&headers, &state.config.base_url),
    );

    info!(user_id = user.id, email = %user.email, "user registered");
    Ok((StatusCode::CREATED, Json(UserResponse::from(&user))))
}

#[instrument(skip(state, form))]
pub async fn login(
    State(state): State<AppState>,
    ValidForm(form): ValidForm<LoginForm>,
) -> AppResult<Json<TokenResponse>> {
    let user = User::find_by_username(&state.db, &form.username).await?;
    let user = match user {
        Some(u) if verify_password(&form.password, &u.password_hash)? => u,
        _ => {
            warn!(username = %form.username, "login rejected");
            return Err(AppError::Unauthorized("Invalid login or password".into()));
        }
    };

    if !user.confirmed_email {
        warn!(user_id = user.id, "login before email confirmation");
        return Err(AppError::Unauthorized("Email not confirmed".into()));
    }

    let access_token = state.jwt.sign_access(&user.email)?;
    info!(user_id = user.id, "user logged in");
    Ok(Json(TokenResponse::bearer(access_token)))
}

#[instrument(skip(state, token))]
pub async fn confirmed_email(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> AppResult<Json<MessageResponse>> {
    let email = state.jwt.verify_email(&token).map_err(email_token_error)?;

    let user = User::find_by_email(&state.db, &email)
        .await?
        .ok_or_else(|| AppError::BadRequest("Verification error".into()))?;
    if user.confirmed_email {
        return Err(AppError::Conflict("Your email is already confirmed".into()));
    }
    if !User::confirm_email(&state.db, &email).await? {
        // Confirmed by a concurrent request between the read and the update.
        return Err(AppError::Conflict("Your email is already confirmed".into()));
    }
    forget_cached_user(&state, &email).await;

    info!(user_id = user.id, "email confirmed");
    Ok(Json(MessageResponse::new("Email confirmed")))
}

#[instrument(skip(state, headers, body))]
pub async fn request_email(
    State(state): State<AppState>,
    headers: HeaderMap,
    ValidJson(body): ValidJson<EmailRequest>,
) -> AppResult<Json<MessageResponse>> {
    let email = normalize_email(&body.email);
    if let Some(user) = User::find_by_email(&state.db, &email).await? {
        if user.confirmed_email {
            return Err(AppError::Conflict("Your email is already confirmed".into()));
        }
        spawn_token_email(
            state.mailer.clone(),
            &state.jwt,
            EmailPurpose::ConfirmEmail,
            user.email,
            user.username,
            request_base_url(&headers, &state.config.base_url),
        );
    }
    Ok(Json(MessageResponse::new(CHECK_EMAIL)))
}

#[instrument(skip(state, headers, body))]
pub async fn forgot_password(
    State(state): State<AppState>,
    headers: HeaderMap,
    ValidJson(body): ValidJson<EmailRequest>,
) -> AppResult<Json<MessageResponse>> {
    let email = normalize_email(&body.email);
    let user = User::find_by_email(&state.db, &email)
        .await?
        .ok_or_else(|| AppError::BadRequest("Verification error".into()))?;
    if !user.confirmed_email {
        return Err(AppError::Unauthorized("Email not confirmed".into()));
    }

    spawn_token_email(
        state.mailer.clone(),
        &state.jwt,
        EmailPurpose::ResetPassword,
        user.email,
        user.username,
        request_base_url(&headers, &state.config.base_url),
    );
    Ok(Json(MessageResponse::new(CHECK_EMAIL)))
}

/// Hands the emailed link over to the password change page.
pub async fn reset_password_redirect(Path(token): Path<String>) -> Redirect {
    Redirect::to(&format!("/change_password/{token}"))
}

#[instrument(skip(state, token, form))]
pub async fn reset_password(
    State(state): State<AppState>,
    Path(token): Path<String>,
    ValidForm(form): ValidForm<ResetPasswordForm>,
) -> AppResult<Json<MessageResponse>> {
    let email = state.jwt.verify_email(&token).map_err(email_token_error)?;

    let user = User::find_by_email(&state.db, &email)
        .await?
        .ok_or_else(|| AppError::BadRequest("Verification error".into()))?;
    if !user.confirmed_email {
        return Err(AppError::Unauthorized("Email not confirmed".into()));
    }

    let hash = hash_password(&form.password)?;
    User::update_password(&state.db, &email, &hash).await?;
    forget_cached_user(&state, &email).await;

    info!(user_id = user.id, "password reset");
    Ok(Json(MessageResponse::new("Password successfully changed")))
}
