//! Provenance tagging

use vec_guard_api::InputSource;

/// Input tagged with its source and trust flag
///
/// The trust flag is derived from the source and cannot be set per value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedInput {
    value: String,
    source: InputSource,
    trusted: bool,
}

impl ClassifiedInput {
    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn source(&self) -> InputSource {
        self.source
    }

    pub fn is_trusted(&self) -> bool {
        self.trusted
    }

    pub fn into_value(self) -> String {
        self.value
    }
}

/// Only direct user commands are trusted by default
pub fn is_trusted_source(source: InputSource) -> bool {
    match source {
        InputSource::UserCommand => true,
        InputSource::FileContent | InputSource::Network | InputSource::Environment => false,
    }
}

/// Tag input with its source
pub fn classify(input: impl Into<String>, source: InputSource) -> ClassifiedInput {
    let value = input.into();
    let trusted = is_trusted_source(source);

    tracing::debug!(
        %source,
        trusted,
        length = value.chars().count(),
        "Classified input as {}",
        if trusted { "trusted" } else { "untrusted" }
    );

    ClassifiedInput {
        value,
        source,
        trusted,
    }
}

pub fn is_trusted(classified: &ClassifiedInput) -> bool {
    classified.trusted
}
