use tracing::warn;

use crate::{
    error::AppError,
    users::repo_types::{Role, User},
};

/// Allow-list check over a fixed set of roles.
#[derive(Debug, Clone, Copy)]
pub struct RoleAccess {
    allowed: &'static [Role],
}

impl RoleAccess {
    pub const fn new(allowed: &'static [Role]) -> Self {
        Self { allowed }
    }

    pub fn permits(&self, role: Role) -> bool {
        self.allowed.contains(&role)
    }

    pub fn check(&self, user: &User) -> Result<(), AppError> {
        if self.permits(user.role) {
            return Ok(());
        }
        warn!(user_id = user.id, role = ?user.role, "role not permitted");
        Err(AppError::Forbidden(
            "Access denied: insufficient privileges".into(),
        ))
    }
}

/// Compile-time role allow-list for the `Authorized` extractor.
pub trait RolePolicy: Send + Sync + 'static {
    const ALLOWED: &'static [Role];
}

pub struct AdminOnly;

impl RolePolicy for AdminOnly {
    const ALLOWED: &'static [Role] = &[Role::Admin];
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::OffsetDateTime;

    fn user_with(role: Role) -> User {
        User {
            id: 7,
            username: "u".into(),
            email: "u@example.com".into(),
            password_hash: String::new(),
            confirmed_email: true,
            avatar: None,
            role,
            created_at: OffsetDateTime::now_utc(),
            updated_at: OffsetDateTime::now_utc(),
        }
    }

    #[test]
    fn admin_only_denies_standard_users() {
        let gate = RoleAccess::new(AdminOnly::ALLOWED);
        assert!(gate.check(&user_with(Role::Admin)).is_ok());
        let err = gate.check(&user_with(Role::User)).unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    #[test]
    fn multi_role_allow_list() {
        let gate = RoleAccess::new(&[Role::User, Role::Admin]);
        assert!(gate.permits(Role::User));
        assert!(gate.permits(Role::Admin));
    }

    #[test]
    fn empty_allow_list_denies_everyone() {
        let gate = RoleAccess::new(&[]);
        assert!(!gate.permits(Role::Admin));
    }
}
