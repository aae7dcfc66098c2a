use anyhow::Context;
use sqlx::PgPool;

use super::repo_types::{Contact, ContactFields, ContactFilter, Page};

const CONTACT_COLUMNS: &str = "id, user_id, first_name, last_name, email, phone, birthday, info, created_at, updated_at";

impl Contact {
    /// Owner's contacts matching every given filter, ordered by id.
    pub async fn list(
        db: &PgPool,
        user_id: i64,
        filter: &ContactFilter<'_>,
        page: Page,
    ) -> anyhow::Result<Vec<Contact>> {
        let rows = sqlx::query_as::<_, Contact>(&format!(
            r#"
            SELECT {CONTACT_COLUMNS}
            FROM contacts
            WHERE user_id = $1
              AND ($2::text IS NULL OR first_name = $2)
              AND ($3::text IS NULL OR last_name = $3)
              AND ($4::text IS NULL OR email = $4)
            ORDER BY id
            LIMIT $5 OFFSET $6
            "#
        ))
        .bind(user_id)
        .bind(filter.first_name)
        .bind(filter.last_name)
        .bind(filter.email)
        .bind(page.limit)
        .bind(page.skip)
        .fetch_all(db)
        .await
        .context("list contacts")?;
        Ok(rows)
    }

    pub async fn find(db: &PgPool, user_id: i64, id: i64) -> anyhow::Result<Option<Contact>> {
        let row = sqlx::query_as::<_, Contact>(&format!(
            "SELECT {CONTACT_COLUMNS} FROM contacts WHERE id = $1 AND user_id = $2"
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(db)
        .await
        .context("find contact")?;
        Ok(row)
    }

    /// Inserts a contact for `user_id`. Returns `None` when the owner already
    /// has a contact with this email; nothing is written in that case.
    pub async fn create(
        db: &PgPool,
        user_id: i64,
        fields: &ContactFields<'_>,
    ) -> anyhow::Result<Option<Contact>> {
        let row = sqlx::query_as::<_, Contact>(&format!(
            r#"
            INSERT INTO contacts (user_id, first_name, last_name, email, phone, birthday, info)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT ON CONSTRAINT contacts_owner_email_key DO NOTHING
            RETURNING {CONTACT_COLUMNS}
            "#
        ))
        .bind(user_id)
        .bind(fields.first_name)
        .bind(fields.last_name)
        .bind(fields.email)
        .bind(fields.phone)
        .bind(fields.birthday)
        .bind(fields.info)
        .fetch_optional(db)
        .await
        .context("insert contact")?;
        Ok(row)
    }

    /// Full replace of the writable columns. `None` when the contact does not
    /// exist for this owner. A clash with another of the owner's emails comes
    /// back as a unique-violation error.
    pub async fn replace(
        db: &PgPool,
        user_id: i64,
        id: i64,
        fields: &ContactFields<'_>,
    ) -> anyhow::Result<Option<Contact>> {
        let row = sqlx::query_as::<_, Contact>(&format!(
            r#"
            UPDATE contacts
               SET first_name = $3, last_name = $4, email = $5, phone = $6,
                   birthday = $7, info = $8, updated_at = now()
             WHERE id = $1 AND user_id = $2
            RETURNING {CONTACT_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(user_id)
        .bind(fields.first_name)
        .bind(fields.last_name)
        .bind(fields.email)
        .bind(fields.phone)
        .bind(fields.birthday)
        .bind(fields.info)
        .fetch_optional(db)
        .await
        .context("update contact")?;
        Ok(row)
    }

    /// Returns false when nothing was deleted.
    pub async fn delete(db: &PgPool, user_id: i64, id: i64) -> anyhow::Result<bool> {
        let res = sqlx::query("DELETE FROM contacts WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(db)
            .await
            .context("delete contact")?;
        Ok(res.rows_affected() > 0)
    }

    /// Owner's contacts whose birthday falls on one of the given month/day
    /// pairs. `months[i]` pairs with `days[i]`.
    pub async fn with_birthday_on(
        db: &PgPool,
        user_id: i64,
        months: &[i32],
        days: &[i32],
        page: Page,
    ) -> anyhow::Result<Vec<Contact>> {
        let rows = sqlx::query_as::<_, Contact>(&format!(
            r#"
            SELECT {CONTACT_COLUMNS}
            FROM contacts
            WHERE user_id = $1
              AND (EXTRACT(MONTH FROM birthday)::int, EXTRACT(DAY FROM birthday)::int)
                  IN (SELECT m, d FROM UNNEST($2::int[], $3::int[]) AS t(m, d))
            ORDER BY id
            LIMIT $4 OFFSET $5
            "#
        ))
        .bind(user_id)
        .bind(months)
        .bind(days)
        .bind(page.limit)
        .bind(page.skip)
        .fetch_all(db)
        .await
        .context("list upcoming birthdays")?;
        Ok(rows)
    }
}
