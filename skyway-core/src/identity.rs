use chrono::Utc;
use serde::Deserialize;
use skyway_shared::pii::Masked;
use uuid::Uuid;

use crate::models::{Role, User};
use crate::{CoreError, CoreResult};

pub const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Clone, Deserialize)]
pub struct Registration {
    pub name: String,
    pub email: Masked<String>,
    pub password: Masked<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Credentials {
    pub email: Masked<String>,
    pub password: Masked<String>,
}

/// Emails are unique case-insensitively.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

impl Registration {
    pub fn validate(&self) -> CoreResult<()> {
        if self.name.trim().is_empty() {
            return Err(CoreError::ValidationError("Missing or empty field: name".to_string()));
        }
        let email = normalize_email(self.email.expose());
        if email.is_empty() {
            return Err(CoreError::ValidationError("Missing or empty field: email".to_string()));
        }
        match email.split_once('@') {
            Some((local, domain)) if !local.is_empty() && !domain.is_empty() => {}
            _ => return Err(CoreError::ValidationError("Invalid email address".to_string())),
        }
        if self.password.expose().trim().is_empty() {
            return Err(CoreError::ValidationError("Missing or empty field: password".to_string()));
        }
        if self.password.expose().chars().count() < MIN_PASSWORD_LEN {
            return Err(CoreError::ValidationError(format!(
                "Password must be at least {} characters",
                MIN_PASSWORD_LEN
            )));
        }
        Ok(())
    }

    /// Validates and hashes into a new account. bcrypt is CPU bound; callers on
    /// an async runtime should run this on a blocking thread.
    pub fn into_user(self, role: Role, bcrypt_cost: u32) -> CoreResult<User> {
        self.validate()?;
        let password_hash = hash_password(self.password.expose(), bcrypt_cost)?;
        Ok(User {
            id: Uuid::new_v4(),
            name: self.name.trim().to_string(),
            email: normalize_email(self.email.expose()),
            password_hash,
            role,
            created_at: Utc::now(),
        })
    }
}

pub fn hash_password(password: &str, cost: u32) -> CoreResult<String> {
    bcrypt::hash(password, cost).map_err(CoreError::internal)
}

/// A malformed stored hash counts as a mismatch.
pub fn verify_password(password: &str, password_hash: &str) -> bool {
    bcrypt::verify(password, password_hash).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registration(name: &str, email: &str, password: &str) -> Registration {
        Registration {
            name: name.to_string(),
            email: Masked::new(email.to_string()),
            password: Masked::new(password.to_string()),
        }
    }

    #[test]
    fn test_registration_validation() {
        assert!(registration("Jane", "jane@example.com", "secret1").validate().is_ok());
        assert!(registration(" ", "jane@example.com", "secret1").validate().is_err());
        assert!(registration("Jane", "", "secret1").validate().is_err());
        assert!(registration("Jane", "not-an-email", "secret1").validate().is_err());
        assert!(registration("Jane", "jane@example.com", "").validate().is_err());
        assert!(registration("Jane", "jane@example.com", "short").validate().is_err());
    }

    #[test]
    fn test_into_user_normalizes_and_hashes() {
        let user = registration(" Jane ", "  Jane@Example.COM ", "secret1")
            .into_user(Role::Customer, 4)
            .unwrap();
        assert_eq!(user.name, "Jane");
        assert_eq!(user.email, "jane@example.com");
        assert_ne!(user.password_hash, "secret1");
        assert!(verify_password("secret1", &user.password_hash));
        assert!(!verify_password("secret2", &user.password_hash));
    }

    #[test]
    fn test_garbage_hash_never_verifies() {
        assert!(!verify_password("secret1", "not-a-bcrypt-hash"));
    }
}
