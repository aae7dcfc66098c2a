use anyhow::Context;
use sqlx::PgPool;

use super::repo_types::{NewUser, User};

const USER_COLUMNS: &str =
    "id, username, email, password_hash, confirmed_email, avatar, role, created_at, updated_at";

impl User {
    /// Find a user by email.
    pub async fn find_by_email(db: &PgPool, email: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(db)
        .await
        .context("find user by email")?;
        Ok(user)
    }

    /// Find a user by username.
    pub async fn find_by_username(db: &PgPool, username: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE username = $1"
        ))
        .bind(username)
        .fetch_optional(db)
        .await
        .context("find user by username")?;
        Ok(user)
    }

    /// Create a new, unconfirmed user.
    pub async fn create(db: &PgPool, new: NewUser<'_>) -> anyhow::Result<User> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (username, email, password_hash, avatar)
            VALUES ($1, $2, $3, $4)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(new.username)
        .bind(new.email)
        .bind(new.password_hash)
        .bind(new.avatar)
        .fetch_one(db)
        .await
        .context("insert user")?;
        Ok(user)
    }

    /// Flip `confirmed_email` to true. Returns false when the account is
    /// missing or already confirmed; the flag is never written twice.
    pub async fn confirm_email(db: &PgPool, email: &str) -> anyhow::Result<bool> {
        let res = sqlx::query(
            r#"
            UPDATE users
               SET confirmed_email = TRUE, updated_at = now()
             WHERE email = $1 AND confirmed_email = FALSE
            "#,
        )
        .bind(email)
        .execute(db)
        .await
        .context("confirm email")?;
        Ok(res.rows_affected() == 1)
    }

    pub async fn update_avatar(db: &PgPool, email: &str, url: &str) -> anyhow::Result<User> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users SET avatar = $2, updated_at = now()
             WHERE email = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(email)
        .bind(url)
        .fetch_one(db)
        .await
        .context("update avatar")?;
        Ok(user)
    }

    pub async fn update_password(db: &PgPool, email: &str, password_hash: &str) -> anyhow::Result<()> {
        sqlx::query("UPDATE users SET password_hash = $2, updated_at = now() WHERE email = $1")
            .bind(email)
            .bind(password_hash)
            .execute(db)
            .await
            .context("update password")?;
        Ok(())
    }
}
