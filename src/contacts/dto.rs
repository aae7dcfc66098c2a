use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};
use validator::Validate;

use super::repo_types::{Contact, ContactFields, ContactFilter, Page};
use crate::extract::trimmed;

time::serde::format_description!(iso_date, Date, "[year]-[month]-[day]");

lazy_static! {
    static ref PHONE_RE: Regex = Regex::new(r"^\+?[0-9()\-\s]{3,20}$").unwrap();
}

/// Body of create and full replace.
#[derive(Debug, Deserialize, Validate)]
pub struct ContactBase {
    #[serde(deserialize_with = "trimmed")]
    #[validate(length(min = 2, max = 50, message = "first_name must be 2 to 50 characters"))]
    pub first_name: String,
    #[serde(deserialize_with = "trimmed")]
    #[validate(length(min = 2, max = 50, message = "last_name must be 2 to 50 characters"))]
    pub last_name: String,
    #[serde(deserialize_with = "trimmed")]
    #[validate(email(message = "invalid email"), length(max = 100))]
    pub email: String,
    #[serde(deserialize_with = "trimmed")]
    #[validate(
        length(max = 20, message = "phone must be at most 20 characters"),
        regex(path = "PHONE_RE", message = "invalid phone number")
    )]
    pub phone: String,
    #[serde(with = "iso_date")]
    pub birthday: Date,
    pub info: Option<String>,
}

impl ContactBase {
    pub fn fields(&self) -> ContactFields<'_> {
        ContactFields {
            first_name: &self.first_name,
            last_name: &self.last_name,
            email: &self.email,
            phone: &self.phone,
            birthday: self.birthday,
            info: self.info.as_deref(),
        }
    }
}

fn default_limit() -> i64 {
    10
}

#[derive(Debug, Deserialize, Validate)]
pub struct ContactQuery {
    pub name: Option<String>,
    pub surname: Option<String>,
    pub email: Option<String>,
    #[serde(default)]
    #[validate(range(min = 0, message = "skip must not be negative"))]
    pub skip: i64,
    #[serde(default = "default_limit")]
    #[validate(range(min = 1, max = 1000, message = "limit must be between 1 and 1000"))]
    pub limit: i64,
}

impl ContactQuery {
    pub fn filter(&self) -> ContactFilter<'_> {
        // An empty query parameter filters nothing.
        fn non_empty(v: &Option<String>) -> Option<&str> {
            v.as_deref().filter(|s| !s.is_empty())
        }
        ContactFilter {
            first_name: non_empty(&self.name),
            last_name: non_empty(&self.surname),
            email: non_empty(&self.email),
        }
    }

    pub fn page(&self) -> Page {
        Page {
            skip: self.skip,
            limit: self.limit,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct Pagination {
    #[serde(default)]
    #[validate(range(min = 0, message = "skip must not be negative"))]
    pub skip: i64,
    #[serde(default = "default_limit")]
    #[validate(range(min = 1, max = 1000, message = "limit must be between 1 and 1000"))]
    pub limit: i64,
}

impl Pagination {
    pub fn page(&self) -> Page {
        Page {
            skip: self.skip,
            limit: self.limit,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ContactResponse {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    #[serde(with = "iso_date")]
    pub birthday: Date,
    pub info: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl From<Contact> for ContactResponse {
    fn from(c: Contact) -> Self {
        Self {
            id: c.id,
            first_name: c.first_name,
            last_name: c.last_name,
            email: c.email,
            phone: c.phone,
            birthday: c.birthday,
            info: c.info,
            created_at: c.created_at,
            updated_at: c.updated_at,
        }
    }
}
