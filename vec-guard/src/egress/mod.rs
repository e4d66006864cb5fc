//! Outbound data protection
//!
//! - [`patterns`]: the detector table
//! - [`scanner`]: runs detectors and the entropy heuristic over text
//! - [`filter`]: the egress gate applying block / warn / log-only policy

pub mod filter;
pub mod patterns;
pub mod scanner;

pub use filter::{destination_action, EgressCheckResult, EgressGate, EgressMode};
pub use patterns::{all_patterns, severity_of, DetectorCategory, SecretPattern};
pub use scanner::{
    has_high_entropy, redact, scan, scan_with_defaults, shannon_entropy, ScanOptions,
    DEFAULT_ENTROPY_THRESHOLD, HIGH_ENTROPY,
};
