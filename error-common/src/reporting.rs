// Error reporting utilities
// Errors are reported as structured tracing events

use crate::{context::ErrorContext, types::ImageVaultError};

#[derive(Debug, Default, Clone, Copy)]
pub struct ErrorReporter;

impl ErrorReporter {
    pub fn new() -> Self {
        Self
    }

    pub fn report(&self, error: &ImageVaultError, context: &ErrorContext) {
        let context_json = serde_json::to_string(context).unwrap_or_default();

        if error.is_infrastructure() {
            tracing::error!(
                error_code = error.code(),
                status = error.status_code(),
                context = %context_json,
                "Error reported: {}",
                error
            );
        } else {
            tracing::warn!(
                error_code = error.code(),
                status = error.status_code(),
                context = %context_json,
                "Request failed: {}",
                error
            );
        }
    }
}
