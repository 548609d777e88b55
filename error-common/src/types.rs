use thiserror::Error;

use crate::codes;

/// Platform error enum shared by the binaries and service layers
#[derive(Error, Debug)]
pub enum ImageVaultError {
    /// Authentication errors (unknown public key, bad signature)
    #[error("Authentication error: {0}")]
    AuthError(String),

    /// The public key is not allowed to access the resource
    #[error("Access denied: {0}")]
    AccessDenied(String),

    /// A key pair, group or access rule does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// A key pair or group already exists
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Validation errors
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// The access control adapter does not accept writes
    #[error("Access control adapter is immutable")]
    Immutable,

    /// Backing store errors
    #[error("Storage error: {0}")]
    StorageError(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Internal system errors
    #[error("Internal error: {0}")]
    InternalError(String),

    /// Wrapped external errors
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ImageVaultError {
    /// Structured error code for API responses and log records
    pub fn code(&self) -> &'static str {
        match self {
            Self::AuthError(_) => codes::authentication::UNKNOWN_PUBLIC_KEY,
            Self::AccessDenied(_) => codes::access_control::ACCESS_DENIED,
            Self::NotFound(_) => codes::access_control::NOT_FOUND,
            Self::Conflict(_) => codes::access_control::CONFLICT,
            Self::ValidationError(_) => codes::validation::INVALID_INPUT,
            Self::Immutable => codes::access_control::IMMUTABLE_ADAPTER,
            Self::StorageError(_) => codes::storage::BACKEND_UNAVAILABLE,
            Self::ConfigError(_) => codes::configuration::INVALID_CONFIG,
            Self::InternalError(_) | Self::Other(_) => codes::internal::INTERNAL_ERROR,
        }
    }

    /// HTTP status the surrounding API layer answers with
    pub fn status_code(&self) -> u16 {
        match self {
            Self::AuthError(_) => 401,
            Self::AccessDenied(_) => 403,
            Self::NotFound(_) => 404,
            Self::Immutable => 405,
            Self::Conflict(_) => 409,
            Self::ValidationError(_) => 400,
            Self::StorageError(_) => 503,
            Self::ConfigError(_) | Self::InternalError(_) | Self::Other(_) => 500,
        }
    }

    /// Whether the error comes from infrastructure rather than the request
    pub fn is_infrastructure(&self) -> bool {
        matches!(
            self,
            Self::StorageError(_) | Self::ConfigError(_) | Self::InternalError(_) | Self::Other(_)
        )
    }
}

/// Result type alias for ImageVault operations
pub type Result<T> = std::result::Result<T, ImageVaultError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(ImageVaultError::AuthError("x".into()).status_code(), 401);
        assert_eq!(ImageVaultError::AccessDenied("x".into()).status_code(), 403);
        assert_eq!(ImageVaultError::NotFound("x".into()).status_code(), 404);
        assert_eq!(ImageVaultError::Immutable.status_code(), 405);
        assert_eq!(ImageVaultError::Conflict("x".into()).status_code(), 409);
        assert_eq!(ImageVaultError::StorageError("x".into()).status_code(), 503);
    }

    #[test]
    fn test_infrastructure_classification() {
        assert!(ImageVaultError::StorageError("down".into()).is_infrastructure());
        assert!(!ImageVaultError::NotFound("group".into()).is_infrastructure());
        assert!(!ImageVaultError::AccessDenied("image.get".into()).is_infrastructure());
    }

    #[test]
    fn test_codes() {
        assert_eq!(
            ImageVaultError::ValidationError("bad".into()).code(),
            codes::validation::INVALID_INPUT
        );
        assert_eq!(
            ImageVaultError::Other(anyhow::anyhow!("boom")).code(),
            codes::internal::INTERNAL_ERROR
        );
    }
}
