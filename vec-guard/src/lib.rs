//! vec-guard: security policy layer for conversational agent hosts
//!
//! This crate decides whether filesystem and egress actions may proceed,
//! whether outbound data carries secrets, and whether token usage has
//! crossed the configured budget.

pub mod audit;
pub mod config;
pub mod egress;
pub mod error;
pub mod logging;
pub mod monitoring;
pub mod permission;
pub mod security;
pub mod validation;

pub use error::{Result, SecurityError};
pub use security::{SecurityManager, SecurityOptions};
pub use vec_guard_api::{
    Finding, InputSource, PermissionAction, PermissionConfig, PermissionRule, ScanResult,
    Severity, TokenBudget, TokenUsageEvent,
};
