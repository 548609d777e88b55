//! Common error handling utilities for the ImageVault engine
//!
//! This crate provides the platform-wide error type, the structured error
//! codes returned to API clients, and the context attached to errors when
//! they are reported.
//!
//! # Error Categories
//!
//! - **AuthenticationError**: unknown public keys, bad signatures
//! - **AccessDenied**: a public key lacks access to a resource
//! - **NotFound / Conflict**: administrative CRUD on keys, groups and rules
//! - **ValidationError**: malformed access rules and request payloads
//! - **StorageError**: backing store failures (database unavailable, ...)
//! - **ConfigError**: invalid or unreadable configuration
//!
//! # Example
//!
//! ```rust
//! use error_common::{ErrorContext, ErrorReporter, ImageVaultError};
//!
//! fn require_rule(found: bool) -> Result<(), ImageVaultError> {
//!     if !found {
//!         return Err(ImageVaultError::NotFound("access rule".to_string()));
//!     }
//!     Ok(())
//! }
//!
//! let error = require_rule(false).unwrap_err();
//! assert_eq!(error.code(), error_common::codes::access_control::NOT_FOUND);
//!
//! let context = ErrorContext::new().with_public_key("acme");
//! ErrorReporter::new().report(&error, &context);
//! ```

pub mod codes;
pub mod context;
pub mod reporting;
pub mod types;

pub use context::*;
pub use reporting::*;
pub use types::*;
