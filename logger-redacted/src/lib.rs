//! Logging for the ImageVault engine
//!
//! Installs the `tracing` subscriber used by the binaries and provides a
//! redactor that masks credential material (private keys, request
//! signatures, access tokens) before text reaches a log sink or a terminal.
//!
//! # Detected Data Types
//!
//! - **Private keys**: `privateKey=s3cr3t` → `privateKey=KEY[3q2+7w...]`
//! - **Query secrets**: `?signature=...`, `?accessToken=...` → `TOKEN[...]`
//! - **HMAC digests**: bare 64 hex digit SHA-256 digests → `SIG[...]`
//! - **Custom patterns**: configurable regex/replacement pairs
//!
//! # Example
//!
//! ```rust
//! use logger_redacted::{CredentialRedactor, LoggerConfig};
//!
//! let config = LoggerConfig::default();
//! let _ = logger_redacted::init_logging(&config);
//!
//! let redactor = CredentialRedactor::default();
//! let line = redactor.redact("GET /users/alice/images?accessToken=abc123");
//! assert!(!line.contains("abc123"));
//! ```

pub mod config;
pub mod macros;
pub mod redactor;
pub mod subscriber;

pub use config::*;
pub use redactor::*;
pub use subscriber::*;

/// Redactor matching the logger configuration
pub fn redactor_for(config: &LoggerConfig) -> CredentialRedactor {
    if !config.redaction_enabled {
        return CredentialRedactor::disabled();
    }

    CredentialRedactor::new(RedactionConfig {
        hash_for_correlation: config.hash_for_correlation,
        ..Default::default()
    })
}
