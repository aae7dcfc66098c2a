use sqlx::FromRow;
use time::{Date, OffsetDateTime};

/// Contact row. Always loaded together with its owner's id.
#[derive(Debug, Clone, FromRow)]
pub struct Contact {
    pub id: i64,
    pub user_id: i64,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub birthday: Date,
    pub info: Option<String>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// Writable columns, shared by insert and full replace.
#[derive(Debug)]
pub struct ContactFields<'a> {
    pub first_name: &'a str,
    pub last_name: &'a str,
    pub email: &'a str,
    pub phone: &'a str,
    pub birthday: Date,
    pub info: Option<&'a str>,
}

/// Exact-match filters for listing. `None` means "don't filter".
#[derive(Debug, Default)]
pub struct ContactFilter<'a> {
    pub first_name: Option<&'a str>,
    pub last_name: Option<&'a str>,
    pub email: Option<&'a str>,
}

#[derive(Debug, Clone, Copy)]
pub struct Page {
    pub skip: i64,
    pub limit: i64,
}
