//! Trust boundary for external input
//!
//! Data is tagged with where it came from ([`classify`]). Only user commands
//! are trusted as-is; everything else must pass a [`Schema`] through
//! [`sanitize_and_trust`] before it can become a [`TrustedInput`].
//!
//! [`TrustedInput`] has no public constructor, so the sanitizer functions in
//! this module are the only way to mint one.

pub mod classifier;
pub mod sanitizer;
pub mod schemas;

use thiserror::Error;
use vec_guard_api::InputSource;

pub use classifier::{classify, is_trusted, is_trusted_source, ClassifiedInput};
pub use sanitizer::{
    as_untrusted, promote_to_trusted, sanitize, sanitize_and_trust, sanitize_file_content,
    sanitize_file_path, sanitize_user_command, TrustedInput, UntrustedInput,
};
pub use schemas::{
    EnvironmentVarSchema, FileContentSchema, FilePathSchema, NetworkResponse,
    NetworkResponseSchema, Schema, UserCommandSchema,
};

/// A schema rejected a value
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("must be at least {min} characters")]
    TooShort { min: usize },

    #[error("must be at most {max} characters")]
    TooLong { max: usize },

    #[error("null bytes are not allowed")]
    NullByte,

    #[error("malformed value: {0}")]
    Malformed(String),
}

/// Failure to promote input to trusted
///
/// Wrong provenance and malformed content are distinct so callers can tell
/// them apart.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Cannot use {input_source} input as trusted without validation")]
    TrustViolation { input_source: InputSource },

    #[error("Validation failed: {0}")]
    Schema(#[from] SchemaError),
}
