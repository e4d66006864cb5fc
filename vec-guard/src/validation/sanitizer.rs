//! Promotion of validated input to trusted
//!
//! [`sanitize_and_trust`] is the single path from a raw external string to a
//! trusted value: classify, validate against a schema, relabel.

use std::ops::Deref;

use vec_guard_api::InputSource;

use super::classifier::{classify, ClassifiedInput};
use super::schemas::{FileContentSchema, FilePathSchema, Schema, UserCommandSchema};
use super::{SchemaError, ValidationError};

/// A value that passed the trust boundary
///
/// Only this module constructs it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrustedInput<T> {
    value: T,
    source: InputSource,
}

impl<T> TrustedInput<T> {
    fn new(value: T, source: InputSource) -> Self {
        Self { value, source }
    }

    pub fn value(&self) -> &T {
        &self.value
    }

    /// Where the value originally came from
    pub fn source(&self) -> InputSource {
        self.source
    }

    pub fn into_inner(self) -> T {
        self.value
    }
}

impl<T> Deref for TrustedInput<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.value
    }
}

/// A raw value that has not been validated
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UntrustedInput {
    value: String,
    source: InputSource,
}

impl UntrustedInput {
    pub fn as_str(&self) -> &str {
        &self.value
    }

    pub fn source(&self) -> InputSource {
        self.source
    }
}

/// Mark classified input as untrusted regardless of its source
pub fn as_untrusted(classified: ClassifiedInput) -> UntrustedInput {
    let source = classified.source();
    UntrustedInput {
        value: classified.into_value(),
        source,
    }
}

/// Validate untrusted input against a schema
pub fn sanitize<S: Schema>(input: &UntrustedInput, schema: &S) -> Result<S::Output, SchemaError> {
    match schema.validate(input.as_str()) {
        Ok(output) => {
            tracing::debug!(schema = schema.name(), input_length = input.value.len(), "Input validated");
            Ok(output)
        }
        Err(e) => {
            tracing::warn!(schema = schema.name(), source = %input.source, error = %e, "Input validation failed");
            Err(e)
        }
    }
}

/// Promote already-trusted input after schema validation
///
/// Fails with a trust violation for untrusted sources, and with a schema
/// error when the value is malformed.
pub fn promote_to_trusted<S: Schema>(
    classified: &ClassifiedInput,
    schema: &S,
) -> Result<TrustedInput<S::Output>, ValidationError> {
    if !classified.is_trusted() {
        tracing::error!(source = %classified.source(), "Attempted to use untrusted input as trusted");
        return Err(ValidationError::TrustViolation {
            input_source: classified.source(),
        });
    }
    let output = schema.validate(classified.value())?;
    Ok(TrustedInput::new(output, classified.source()))
}

/// Classify, validate and relabel a raw external value
pub fn sanitize_and_trust<S: Schema>(
    input: &str,
    source: InputSource,
    schema: &S,
) -> Result<TrustedInput<S::Output>, ValidationError> {
    let untrusted = as_untrusted(classify(input, source));
    let output = sanitize(&untrusted, schema)?;

    tracing::info!(
        %source,
        schema = schema.name(),
        length = input.len(),
        "Input promoted to trusted after validation"
    );
    Ok(TrustedInput::new(output, source))
}

pub fn sanitize_user_command(command: &str) -> Result<TrustedInput<String>, ValidationError> {
    sanitize_and_trust(command, InputSource::UserCommand, &UserCommandSchema)
}

/// Relative components are logged, not rejected
pub fn sanitize_file_path(path: &str) -> Result<TrustedInput<String>, ValidationError> {
    if path.contains("..") || path.contains("./") {
        tracing::warn!(path, "File path contains relative components - potential symlink");
    }
    sanitize_and_trust(path, InputSource::FileContent, &FilePathSchema)
}

pub fn sanitize_file_content(content: &str) -> Result<TrustedInput<String>, ValidationError> {
    sanitize_and_trust(content, InputSource::FileContent, &FileContentSchema)
}
