//!
//! # Custom Error Handling
//!
//! This module defines the custom error type `AppError` used throughout the
//! application. It centralizes error management, providing a consistent way
//! to represent the error taxonomy of the API: authentication failures (401),
//! authorization failures (403), validation failures (400), missing records
//! (404), and storage failures (500).
//!
//! `AppError` implements `actix_web::error::ResponseError` to seamlessly
//! convert application errors into HTTP responses with JSON bodies. `From`
//! implementations for `sqlx::Error`, `validator::ValidationErrors`,
//! `jsonwebtoken::errors::Error`, `bcrypt::BcryptError`, and the actix
//! blocking/multipart errors allow conversion with the `?` operator.

use actix_web::{error::ResponseError, HttpResponse};
use serde_json::json;
use std::fmt;
use validator::ValidationErrors;

/// Represents all possible errors that can occur within the application.
#[derive(Debug)]
pub enum AppError {
    /// Missing, malformed, expired, or revoked credentials (HTTP 401).
    Unauthorized(String),
    /// Valid credentials but insufficient role for the resource (HTTP 403).
    /// Deliberately distinct from `Unauthorized`.
    Forbidden(String),
    /// Malformed request input (HTTP 400).
    BadRequest(String),
    /// A requested resource was not found (HTTP 404).
    NotFound(String),
    /// Unexpected server-side error (HTTP 500). The detail is logged, not
    /// returned to the client.
    InternalServerError(String),
    /// Error originating from the underlying store (HTTP 500). Wraps errors
    /// from the `sqlx` crate; the detail is logged, not returned.
    DatabaseError(String),
    /// Failed input validation (HTTP 400): bad field values, bad role
    /// values, too many uploaded files.
    ValidationError(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            AppError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            AppError::Forbidden(msg) => write!(f, "Forbidden: {}", msg),
            AppError::BadRequest(msg) => write!(f, "Bad Request: {}", msg),
            AppError::NotFound(msg) => write!(f, "Not Found: {}", msg),
            AppError::InternalServerError(msg) => write!(f, "Internal Server Error: {}", msg),
            AppError::DatabaseError(msg) => write!(f, "Database Error: {}", msg),
            AppError::ValidationError(msg) => write!(f, "Validation Error: {}", msg),
        }
    }
}

/// Converts `AppError` variants into `HttpResponse` objects so handlers can
/// return `Result<_, AppError>` directly.
impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        match self {
            AppError::Unauthorized(msg) => HttpResponse::Unauthorized().json(json!({
                "error": msg
            })),
            AppError::Forbidden(msg) => HttpResponse::Forbidden().json(json!({
                "error": msg
            })),
            AppError::BadRequest(msg) | AppError::ValidationError(msg) => {
                HttpResponse::BadRequest().json(json!({
                    "error": msg
                }))
            }
            AppError::NotFound(msg) => HttpResponse::NotFound().json(json!({
                "error": msg
            })),
            // Store and internal failures keep their detail out of responses.
            AppError::InternalServerError(msg) | AppError::DatabaseError(msg) => {
                log::error!("internal error: {}", msg);
                HttpResponse::InternalServerError().json(json!({
                    "error": "Internal server error"
                }))
            }
        }
    }
}

/// `sqlx::Error::RowNotFound` maps to `NotFound`; everything else is a
/// database error.
impl From<sqlx::Error> for AppError {
    fn from(error: sqlx::Error) -> AppError {
        match error {
            sqlx::Error::RowNotFound => AppError::NotFound("Record not found".into()),
            _ => AppError::DatabaseError(error.to_string()),
        }
    }
}

impl From<ValidationErrors> for AppError {
    fn from(error: ValidationErrors) -> AppError {
        AppError::ValidationError(error.to_string())
    }
}

/// JWT processing failures (bad signature, expiry) are authentication
/// failures.
impl From<jsonwebtoken::errors::Error> for AppError {
    fn from(error: jsonwebtoken::errors::Error) -> AppError {
        AppError::Unauthorized(error.to_string())
    }
}

impl From<bcrypt::BcryptError> for AppError {
    fn from(error: bcrypt::BcryptError) -> AppError {
        AppError::InternalServerError(error.to_string())
    }
}

/// A cancelled blocking task (file persistence runs on the blocking pool).
impl From<actix_web::error::BlockingError> for AppError {
    fn from(error: actix_web::error::BlockingError) -> AppError {
        AppError::InternalServerError(error.to_string())
    }
}

/// Malformed multipart payloads are client errors.
impl From<actix_multipart::MultipartError> for AppError {
    fn from(error: actix_multipart::MultipartError) -> AppError {
        AppError::BadRequest(error.to_string())
    }
}
