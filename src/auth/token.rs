use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::blocklist::TokenBlocklist;
use crate::error::AppError;
use crate::models::Role;

/// Claims encoded within a session token.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject of the token: the user's unique identifier.
    pub sub: i32,
    /// Role the subject held when the token was issued.
    pub role: Role,
    /// Unique token identifier, the unit of revocation.
    pub jti: String,
    /// Expiration timestamp (seconds since epoch).
    pub exp: usize,
}

/// Issues and validates signed session tokens.
///
/// The signing secret and token lifetime are injected at construction; the
/// authority never reads the environment. Validation checks signature and
/// expiry, then consults the revocation registry, so a revoked token fails
/// authentication even while unexpired.
pub struct TokenAuthority {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl: Duration,
    blocklist: TokenBlocklist,
}

impl TokenAuthority {
    pub fn new(secret: &str, ttl_secs: i64, blocklist: TokenBlocklist) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            ttl: Duration::seconds(ttl_secs),
            blocklist,
        }
    }

    /// Produces a signed token for the user with a fresh jti. Has no effect
    /// on the revocation registry.
    pub fn issue(&self, user_id: i32, role: Role) -> Result<String, AppError> {
        let expiration = Utc::now()
            .checked_add_signed(self.ttl)
            .ok_or_else(|| AppError::InternalServerError("Token expiry overflow".into()))?
            .timestamp() as usize;

        let claims = Claims {
            sub: user_id,
            role,
            jti: Uuid::new_v4().to_string(),
            exp: expiration,
        };

        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| AppError::InternalServerError(format!("Failed to generate token: {}", e)))
    }

    /// Verifies a token and decodes its claims.
    ///
    /// Fails with `AppError::Unauthorized` if the token is malformed, its
    /// signature is invalid, it has expired, or its jti has been revoked.
    pub fn validate(&self, token: &str) -> Result<Claims, AppError> {
        let claims = decode::<Claims>(token, &self.decoding_key, &Validation::default())
            .map(|data| data.claims)
            .map_err(|e| AppError::Unauthorized(format!("Invalid token: {}", e)))?;

        if self.blocklist.contains(&claims.jti) {
            return Err(AppError::Unauthorized("Token has been revoked".into()));
        }

        Ok(claims)
    }

    /// Revokes the token behind `claims`. Idempotent; the entry survives
    /// until pruned after the token's natural expiry.
    pub fn revoke(&self, claims: &Claims) {
        self.blocklist.insert(&claims.jti, claims.exp as i64);
    }

    pub fn blocklist(&self) -> &TokenBlocklist {
        &self.blocklist
    }
}
