use axum::{
    extract::State,
    http::StatusCode,
    routing::get,
    Json, Router,
};
use tracing::instrument;

use super::{
    dto::{ContactBase, ContactQuery, ContactResponse, Pagination},
    services,
};
use crate::{
    auth::extractors::CurrentUser,
    error::AppResult,
    extract::{ValidJson, ValidPath, ValidQuery},
    state::AppState,
};

pub fn contact_routes() -> Router<AppState> {
    Router::new()
        .route("/contacts", get(list_contacts).post(create_contact))
        .route("/contacts/birthdays", get(upcoming_birthdays))
        .route(
            "/contacts/:contact_id",
            get(get_contact).put(update_contact).delete(delete_contact),
        )
}

fn to_responses(rows: Vec<super::repo_types::Contact>) -> Vec<ContactResponse> {
    rows.into_iter().map(ContactResponse::from).collect()
}

#[instrument(skip(state, user), fields(user_id = user.id))]
pub async fn list_contacts(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ValidQuery(q): ValidQuery<ContactQuery>,
) -> AppResult<Json<Vec<ContactResponse>>> {
    let rows = services::list(&state.db, user.id, &q).await?;
    Ok(Json(to_responses(rows)))
}

#[instrument(skip(state, user, body), fields(user_id = user.id))]
pub async fn create_contact(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ValidJson(body): ValidJson<ContactBase>,
) -> AppResult<(StatusCode, Json<ContactResponse>)> {
    let contact = services::create(&state.db, user.id, &body).await?;
    Ok((StatusCode::CREATED, Json(contact.into())))
}

#[instrument(skip(state, user), fields(user_id = user.id))]
pub async fn get_contact(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ValidPath(contact_id): ValidPath<i64>,
) -> AppResult<Json<ContactResponse>> {
    let contact = services::get(&state.db, user.id, contact_id).await?;
    Ok(Json(contact.into()))
}

#[instrument(skip(state, user, body), fields(user_id = user.id))]
pub async fn update_contact(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ValidPath(contact_id): ValidPath<i64>,
    ValidJson(body): ValidJson<ContactBase>,
) -> AppResult<Json<ContactResponse>> {
    let contact = services::replace(&state.db, user.id, contact_id, &body).await?;
    Ok(Json(contact.into()))
}

#[instrument(skip(state, user), fields(user_id = user.id))]
pub async fn delete_contact(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ValidPath(contact_id): ValidPath<i64>,
) -> AppResult<StatusCode> {
    services::delete(&state.db, user.id, contact_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state, user), fields(user_id = user.id))]
pub async fn upcoming_birthdays(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ValidQuery(page): ValidQuery<Pagination>,
) -> AppResult<Json<Vec<ContactResponse>>> {
    let rows = services::upcoming_birthdays(&state.db, user.id, &page).await?;
    Ok(Json(to_responses(rows)))
}
