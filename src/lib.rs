//! The `taskboard` library crate.
//!
//! Contains the domain models, the authentication/authorization stack
//! (signed session tokens with revocation, role gating), the task query
//! builder, file intake for attachments, routing configuration, and error
//! handling. The `taskboard` binary (`main.rs`) wires these together into a
//! running server.

pub mod auth;
pub mod config;
pub mod error;
pub mod files;
pub mod fsp;
pub mod models;
pub mod routes;
