use thiserror::Error;

/// Errors raised by the access control stores and engine
///
/// Unknown public keys, groups and rules are never errors: lookups answer
/// `None`, `false` or an empty collection. Only malformed input, invalid
/// configuration and infrastructure failures end up here.
#[derive(Error, Debug)]
pub enum AccessControlError {
    #[error("Malformed access rule: {0}")]
    MalformedRule(String),

    #[error("Unknown resource: {0}")]
    UnknownResource(String),

    #[error("Invalid access control configuration: {0}")]
    InvalidConfig(String),

    #[error("Public key declared twice in config: {0}")]
    DuplicatePublicKey(String),

    #[error("Access control adapter is immutable")]
    Immutable,

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, AccessControlError>;

impl From<AccessControlError> for error_common::ImageVaultError {
    fn from(error: AccessControlError) -> Self {
        use error_common::ImageVaultError;

        match error {
            AccessControlError::MalformedRule(message) => ImageVaultError::ValidationError(message),
            AccessControlError::UnknownResource(resource) => {
                ImageVaultError::ValidationError(format!("Unknown resource: {resource}"))
            }
            AccessControlError::InvalidConfig(message) => ImageVaultError::ConfigError(message),
            AccessControlError::DuplicatePublicKey(key) => {
                ImageVaultError::ConfigError(format!("Public key declared twice in config: {key}"))
            }
            AccessControlError::Immutable => ImageVaultError::Immutable,
            AccessControlError::StorageError(message) => ImageVaultError::StorageError(message),
            AccessControlError::InternalError(error) => ImageVaultError::Other(error),
        }
    }
}
