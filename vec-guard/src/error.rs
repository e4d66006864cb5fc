//! Error taxonomy shared by the security facade and its components

use thiserror::Error;
use vec_guard_api::{InputSource, PermissionAction};

use crate::config::ConfigError;
use crate::validation::{SchemaError, ValidationError};

/// Errors surfaced by security operations
#[derive(Debug, Error)]
pub enum SecurityError {
    /// A schema rejected the value; the caller decides how to recover
    #[error("Validation failed: {0}")]
    Validation(#[from] SchemaError),

    /// Untrusted data was offered where trusted data is required
    #[error("Cannot use {input_source} input as trusted without validation")]
    TrustViolation { input_source: InputSource },

    #[error("Permission denied: {action} on {target}")]
    PermissionDenied {
        action: PermissionAction,
        target: String,
    },

    #[error("Security layer not initialized - call init() first")]
    NotInitialized,

    #[error("Token budget not configured - no tokenBudget in config")]
    BudgetNotConfigured,

    /// Loading or saving the policy document failed
    ///
    /// After an approval that created a rule, the in-memory rule is kept
    /// but should be treated as provisional.
    #[error("Persistence failure: {0}")]
    Persistence(#[from] ConfigError),
}

impl SecurityError {
    /// Errors that indicate a programming mistake in the caller
    pub fn is_programmer_error(&self) -> bool {
        matches!(self, Self::NotInitialized | Self::BudgetNotConfigured)
    }
}

impl From<ValidationError> for SecurityError {
    fn from(err: ValidationError) -> Self {
        match err {
            ValidationError::TrustViolation { input_source } => Self::TrustViolation { input_source },
            ValidationError::Schema(schema) => Self::Validation(schema),
        }
    }
}

/// Result alias for security operations
pub type Result<T> = std::result::Result<T, SecurityError>;
