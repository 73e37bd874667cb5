//! Libris Common Library
//!
//! Shared code for the Libris catalog service including:
//! - Database models, schema and repository patterns
//! - Form validation and text normalization
//! - Image storage and resizing
//! - Error types and handling
//! - Configuration management
//! - Authentication utilities
//! - Metrics and observability

pub mod auth;
pub mod config;
pub mod db;
pub mod errors;
pub mod forms;
pub mod imaging;
pub mod metrics;
pub mod validation;

#[cfg(test)]
mod test_helpers;

// Re-export commonly used types
pub use config::AppConfig;
pub use db::{DbPool, Repository};
pub use errors::{AppError, Result};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
