use time::{util::is_leap_year, Date, Month, OffsetDateTime};
use tracing::{info, warn};

use super::{
    dto::{ContactBase, ContactQuery, Pagination},
    repo_types::Contact,
};
use crate::error::{conflict_on_unique, AppError, AppResult};

pub const BIRTHDAY_WINDOW_DAYS: u8 = 7;

const EMAIL_IN_USE: &str = "Email in use";
const NOT_FOUND: &str = "Contact not found";

/// Month/day pairs from `today` through `today + BIRTHDAY_WINDOW_DAYS`,
/// inclusive. In a non-leap year Feb 28 also stands in for Feb 29.
pub fn upcoming_days(today: Date) -> Vec<(u8, u8)> {
    let mut days = Vec::with_capacity(BIRTHDAY_WINDOW_DAYS as usize + 2);
    let mut day = Some(today);
    for _ in 0..=BIRTHDAY_WINDOW_DAYS {
        let Some(d) = day else { break };
        days.push((u8::from(d.month()), d.day()));
        if d.month() == Month::February && d.day() == 28 && !is_leap_year(d.year()) {
            days.push((2, 29));
        }
        day = d.next_day();
    }
    days
}

pub fn ensure_id(id: i64) -> AppResult<i64> {
    if id < 1 {
        return Err(AppError::invalid("contact_id", "contact_id must be at least 1"));
    }
    Ok(id)
}

pub async fn list(db: &sqlx::PgPool, user_id: i64, q: &ContactQuery) -> AppResult<Vec<Contact>> {
    Ok(Contact::list(db, user_id, &q.filter(), q.page()).await?)
}

pub async fn create(db: &sqlx::PgPool, user_id: i64, body: &ContactBase) -> AppResult<Contact> {
    match Contact::create(db, user_id, &body.fields()).await? {
        Some(contact) => {
            info!(user_id, contact_id = contact.id, "contact created");
            Ok(contact)
        }
        None => {
            warn!(user_id, "contact email already in use");
            Err(AppError::Conflict(EMAIL_IN_USE.into()))
        }
    }
}

pub async fn get(db: &sqlx::PgPool, user_id: i64, id: i64) -> AppResult<Contact> {
    Contact::find(db, user_id, ensure_id(id)?)
        .await?
        .ok_or_else(|| AppError::NotFound(NOT_FOUND.into()))
}

pub async fn replace(
    db: &sqlx::PgPool,
    user_id: i64,
    id: i64,
    body: &ContactBase,
) -> AppResult<Contact> {
    let updated = Contact::replace(db, user_id, ensure_id(id)?, &body.fields())
        .await
        .map_err(|e| conflict_on_unique(e, EMAIL_IN_USE))?;
    let contact = updated.ok_or_else(|| AppError::NotFound(NOT_FOUND.into()))?;
    info!(user_id, contact_id = contact.id, "contact updated");
    Ok(contact)
}

pub async fn delete(db: &sqlx::PgPool, user_id: i64, id: i64) -> AppResult<()> {
    if !Contact::delete(db, user_id, ensure_id(id)?).await? {
        return Err(AppError::NotFound(NOT_FOUND.into()));
    }
    info!(user_id, contact_id = id, "contact deleted");
    Ok(())
}

pub async fn upcoming_birthdays(
    db: &sqlx::PgPool,
    user_id: i64,
    page: &Pagination,
) -> AppResult<Vec<Contact>> {
    let today = OffsetDateTime::now_utc().date();
    let (months, days): (Vec<i32>, Vec<i32>) = upcoming_days(today)
        .into_iter()
        .map(|(m, d)| (i32::from(m), i32::from(d)))
        .unzip();
    Ok(Contact::with_birthday_on(db, user_id, &months, &days, page.page()).await?)
}
