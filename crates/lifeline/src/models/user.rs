//! Authenticated user identity

use serde::{Deserialize, Serialize};

/// Platform role of a user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Donor,
    Volunteer,
    Admin,
    #[serde(other)]
    Unknown,
}

/// Account status; blocked users can sign in but not act
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    Active,
    Blocked,
    #[serde(other)]
    Unknown,
}

/// Identity attached to a present session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub email: String,
    #[serde(default)]
    pub name: String,
    #[serde(default = "default_role")]
    pub role: Role,
    #[serde(default = "default_status")]
    pub status: UserStatus,
}

fn default_role() -> Role {
    Role::Donor
}

fn default_status() -> UserStatus {
    UserStatus::Active
}

impl User {
    pub fn new(email: impl Into<String>, name: impl Into<String>, role: Role) -> Self {
        Self {
            email: email.into(),
            name: name.into(),
            role,
            status: UserStatus::Active,
        }
    }

    /// Case-insensitive identity comparison against an email address
    pub fn is(&self, email: &str) -> bool {
        self.email.eq_ignore_ascii_case(email)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_user_with_unknown_role() {
        let json = r#"{"email":"a@b.org","name":"A","role":"superuser","status":"blocked"}"#;
        let user: User = serde_json::from_str(json).unwrap();
        assert_eq!(user.role, Role::Unknown);
        assert_eq!(user.status, UserStatus::Blocked);
    }

    #[test]
    fn test_defaults_when_fields_missing() {
        let user: User = serde_json::from_str(r#"{"email":"a@b.org"}"#).unwrap();
        assert_eq!(user.role, Role::Donor);
        assert_eq!(user.status, UserStatus::Active);
        assert!(user.name.is_empty());
    }

    #[test]
    fn test_identity_is_case_insensitive() {
        let user = User::new("Rahim@Example.com", "Rahim", Role::Volunteer);
        assert!(user.is("rahim@example.com"));
        assert!(!user.is("karim@example.com"));
    }
}
