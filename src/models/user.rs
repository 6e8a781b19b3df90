use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// Account role. Stored as lowercase text in the `role` column.
///
/// Access control compares roles for exact equality; there is no hierarchy
/// between them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }
}

/// A user as returned by the API.
///
/// The password hash is deliberately not a field here; queries that feed
/// this struct must not select it, so it can never be serialized to a
/// client.
#[derive(Debug, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: i32,
    pub email: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

/// Credential row used for login and password verification.
#[derive(Debug, FromRow)]
pub struct Credential {
    pub id: i32,
    pub password_hash: String,
    pub role: Role,
}

/// Partial update payload for the admin user endpoints.
///
/// Absent fields are left untouched. A provided password is re-hashed before
/// storage; a provided role must deserialize to one of the two `Role`
/// variants (anything else is rejected at the JSON layer with a 400).
#[derive(Debug, Deserialize, Validate)]
pub struct UserUpdate {
    #[validate(email)]
    pub email: Option<String>,
    pub role: Option<Role>,
    #[validate(length(min = 6))]
    pub password: Option<String>,
}

impl UserUpdate {
    pub fn is_empty(&self) -> bool {
        self.email.is_none() && self.role.is_none() && self.password.is_none()
    }
}
