//! Admin endpoints for account management.
//!
//! The whole scope is wrapped in `RequireRole::admin()`, so every handler
//! here runs with an authenticated admin. Deleting a user cascades to every
//! task that references it as creator or assignee.

use crate::{
    auth::hash_password,
    error::AppError,
    models::{User, UserUpdate},
};
use actix_web::{delete, get, put, web, HttpResponse, Responder};
use serde_json::json;
use sqlx::PgPool;
use validator::Validate;

/// A malformed identifier is a 400, distinct from the 404 of a well-formed
/// reference to a missing record.
fn parse_user_id(raw: &str) -> Result<i32, AppError> {
    raw.parse()
        .map_err(|_| AppError::BadRequest("Invalid user ID format".into()))
}

/// Lists every account. The password hash is never part of the projection.
#[get("")]
pub async fn list_users(pool: web::Data<PgPool>) -> Result<impl Responder, AppError> {
    let users =
        sqlx::query_as::<_, User>("SELECT id, email, role, created_at FROM users ORDER BY id")
            .fetch_all(&**pool)
            .await?;

    Ok(HttpResponse::Ok().json(users))
}

/// Fetches a single account by id.
#[get("/{id}")]
pub async fn get_user(
    pool: web::Data<PgPool>,
    user_id: web::Path<String>,
) -> Result<impl Responder, AppError> {
    let user_id = parse_user_id(&user_id)?;

    let user =
        sqlx::query_as::<_, User>("SELECT id, email, role, created_at FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(&**pool)
            .await?;

    match user {
        Some(user) => Ok(HttpResponse::Ok().json(user)),
        None => Err(AppError::NotFound("User not found".into())),
    }
}

/// Partially updates an account: any of email, role, and password.
///
/// A provided password is re-hashed before storage. An update that sets
/// fields to their current values still succeeds; a body with no fields at
/// all is a 400.
#[put("/{id}")]
pub async fn update_user(
    pool: web::Data<PgPool>,
    user_id: web::Path<String>,
    update: web::Json<UserUpdate>,
) -> Result<impl Responder, AppError> {
    let user_id = parse_user_id(&user_id)?;
    update.validate()?;
    let update = update.into_inner();

    if update.is_empty() {
        return Err(AppError::BadRequest("No fields provided for update".into()));
    }

    let password_hash = match &update.password {
        Some(password) => Some(hash_password(password)?),
        None => None,
    };

    // Only the provided fields appear in the SET clause.
    let mut assignments: Vec<String> = Vec::new();
    let mut param_count = 1;

    if update.email.is_some() {
        assignments.push(format!("email = ${}", param_count));
        param_count += 1;
    }
    if update.role.is_some() {
        assignments.push(format!("role = ${}", param_count));
        param_count += 1;
    }
    if password_hash.is_some() {
        assignments.push(format!("password_hash = ${}", param_count));
        param_count += 1;
    }

    let sql = format!(
        "UPDATE users SET {} WHERE id = ${}",
        assignments.join(", "),
        param_count
    );

    let mut query = sqlx::query(&sql);
    if let Some(email) = &update.email {
        query = query.bind(email);
    }
    if let Some(role) = update.role {
        query = query.bind(role);
    }
    if let Some(hash) = &password_hash {
        query = query.bind(hash);
    }
    query = query.bind(user_id);

    let result = query.execute(&**pool).await?;
    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("User not found".into()));
    }

    Ok(HttpResponse::Ok().json(json!({ "msg": "User updated successfully" })))
}

/// Removes every task created by or assigned to the user, then the user row
/// itself, in one transaction. Returns the number of tasks removed.
///
/// Tasks go first: a task referencing a missing user is worse than a user
/// row outliving its tasks by an instant. A concurrent delete of the same
/// user finds no user row and reports not-found instead of double-counting
/// the removed tasks.
pub async fn delete_user_cascade(pool: &PgPool, user_id: i32) -> Result<u64, AppError> {
    let mut tx = pool.begin().await?;

    let existing = sqlx::query_scalar::<_, i32>("SELECT id FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?;
    if existing.is_none() {
        return Err(AppError::NotFound("User not found".into()));
    }

    let tasks_removed = sqlx::query("DELETE FROM tasks WHERE user_id = $1 OR assigned_to = $1")
        .bind(user_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

    sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    Ok(tasks_removed)
}

/// Deletes an account, cascading to its tasks.
#[delete("/{id}")]
pub async fn delete_user(
    pool: web::Data<PgPool>,
    user_id: web::Path<String>,
) -> Result<impl Responder, AppError> {
    let user_id = parse_user_id(&user_id)?;
    let tasks_removed = delete_user_cascade(&pool, user_id).await?;

    log::info!(
        "Deleted user {} and {} associated task(s)",
        user_id,
        tasks_removed
    );

    Ok(HttpResponse::NoContent().finish())
}
