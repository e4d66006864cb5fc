//! Policy document persistence
//!
//! - [`schema`]: document validation, applied on every load and save
//! - [`store`]: the [`ConfigStore`] abstraction and its file and memory backends
//! - [`lock`]: the advisory directory lock guarding read-modify-write cycles

pub mod lock;
pub mod schema;
pub mod store;

use std::path::PathBuf;

use thiserror::Error;

pub use lock::{DirLock, LockOptions};
pub use schema::validate;
pub use store::{ConfigStore, FileConfigStore, MemoryConfigStore, RuleEdit};

/// Error type for policy document operations
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to access policy file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse policy file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid policy document: {0}")]
    Invalid(String),

    #[error("Timed out waiting for lock {}", .0.display())]
    LockTimeout(PathBuf),
}
