use crate::{
    auth::{
        hash_password, verify_password, AuthResponse, AuthenticatedUser, LoginRequest,
        RegisterRequest, TokenAuthority,
    },
    error::AppError,
    models::{Credential, Role},
};
use actix_web::{post, web, HttpResponse, Responder};
use serde_json::json;
use sqlx::PgPool;
use validator::Validate;

/// Register a new user
///
/// Creates a new account with role `user` and returns a session token, so
/// registration doubles as the first login.
#[post("/register")]
pub async fn register(
    pool: web::Data<PgPool>,
    authority: web::Data<TokenAuthority>,
    register_data: web::Json<RegisterRequest>,
) -> Result<impl Responder, AppError> {
    register_data.validate()?;

    let existing = sqlx::query_scalar::<_, i32>("SELECT id FROM users WHERE email = $1")
        .bind(&register_data.email)
        .fetch_optional(&**pool)
        .await?;

    if existing.is_some() {
        return Err(AppError::BadRequest("Email already registered".into()));
    }

    let password_hash = hash_password(&register_data.password)?;

    let user_id = sqlx::query_scalar::<_, i32>(
        "INSERT INTO users (email, password_hash, role) VALUES ($1, $2, $3) RETURNING id",
    )
    .bind(&register_data.email)
    .bind(&password_hash)
    .bind(Role::User)
    .fetch_one(&**pool)
    .await?;

    let token = authority.issue(user_id, Role::User)?;

    Ok(HttpResponse::Created().json(AuthResponse { token, user_id }))
}

/// Login user
///
/// Verifies credentials and returns a session token.
#[post("/login")]
pub async fn login(
    pool: web::Data<PgPool>,
    authority: web::Data<TokenAuthority>,
    login_data: web::Json<LoginRequest>,
) -> Result<impl Responder, AppError> {
    login_data.validate()?;

    let credential = sqlx::query_as::<_, Credential>(
        "SELECT id, password_hash, role FROM users WHERE email = $1",
    )
    .bind(&login_data.email)
    .fetch_optional(&**pool)
    .await?;

    match credential {
        Some(credential) => {
            if verify_password(&login_data.password, &credential.password_hash)? {
                let token = authority.issue(credential.id, credential.role)?;
                Ok(HttpResponse::Ok().json(AuthResponse {
                    token,
                    user_id: credential.id,
                }))
            } else {
                Err(AppError::Unauthorized("Invalid credentials".into()))
            }
        }
        None => Err(AppError::Unauthorized("Invalid credentials".into())),
    }
}

/// Logout
///
/// Revokes the presented token's jti. The token keeps failing validation
/// for the rest of its natural lifetime, even though it is unexpired.
#[post("/logout")]
pub async fn logout(
    authority: web::Data<TokenAuthority>,
    user: AuthenticatedUser,
) -> Result<impl Responder, AppError> {
    authority.revoke(&user.0);

    Ok(HttpResponse::Ok().json(json!({ "msg": "Successfully logged out" })))
}
