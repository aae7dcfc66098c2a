//! Account seeding for tests that run against a real database.

use sqlx::PgPool;

use super::repo_types::{NewUser, Role, User};
use crate::auth::password::hash_password;

pub async fn seed_user(db: &PgPool, username: &str, password: &str, confirmed: bool, role: Role) -> User {
    let email = format!("{username}@example.com");
    let hash = hash_password(password).unwrap();
    User::create(
        db,
        NewUser {
            username,
            email: &email,
            password_hash: &hash,
            avatar: None,
        },
    )
    .await
    .unwrap();
    if confirmed {
        assert!(User::confirm_email(db, &email).await.unwrap());
    }
    sqlx::query("UPDATE users SET role = $2 WHERE email = $1")
        .bind(&email)
        .bind(role)
        .execute(db)
        .await
        .unwrap();
    User::find_by_email(db, &email).await.unwrap().unwrap()
}
