pub mod blocklist;
pub mod extractors;
pub mod middleware;
pub mod password;
pub mod token;

use serde::{Deserialize, Serialize};
use validator::Validate;

// Re-export necessary items
pub use blocklist::TokenBlocklist;
pub use extractors::AuthenticatedUser;
pub use middleware::{authorize, AuthMiddleware, RequireRole};
pub use password::{hash_password, verify_password};
pub use token::{Claims, TokenAuthority};

/// Payload for a login request.
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    /// User's email address.
    #[validate(email)]
    pub email: String,
    /// User's password, at least 6 characters.
    #[validate(length(min = 6))]
    pub password: String,
}

/// Payload for a new account registration.
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    /// Email address for the new account.
    #[validate(email)]
    pub email: String,
    /// Password for the new account, at least 6 characters.
    #[validate(length(min = 6))]
    pub password: String,
}

/// Response after successful authentication (login or registration).
#[derive(Debug, Serialize, Deserialize)]
pub struct AuthResponse {
    /// The signed session token.
    pub token: String,
    /// The unique identifier of the authenticated user.
    pub user_id: i32,
}
