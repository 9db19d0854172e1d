//! Library catalog client
//!
//! Session handling, typed REST contracts and controllers for a library
//! catalog backend: books, loans and user administration.

pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod services;
pub mod session;
pub mod token;

pub use config::AppConfig;
pub use error::{AppError, AppResult};
pub use services::Services;
