//! Permission system for filesystem and egress actions
//!
//! This module provides:
//! - Glob-based rule matching with expiry ([`rules`])
//! - Pluggable approval handlers for uncovered actions ([`approval`])
//! - The engine tying rules, approval and persistence together ([`engine`])
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    PermissionEngine                          │
//! │                                                              │
//! │  check(action, target)                                       │
//! │     │                                                        │
//! │     ▼                                                        │
//! │  match_rule ──── match ────► rule.approved                   │
//! │     │                                                        │
//! │  no match                                                    │
//! │     ▼                                                        │
//! │  ApprovalHandler ── approved + create_rule ──► ConfigStore   │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod approval;
pub mod engine;
pub mod rules;

pub use approval::{
    format_permission_prompt, ApprovalError, ApprovalHandler, ApprovalRequest, ApprovalResponse,
    AutoApprovalHandler, DenyAllApprovalHandler, RecordingApprovalHandler,
    TerminalApprovalHandler,
};
pub use engine::{Decision, PermissionEngine, PermissionEngineBuilder};
pub use rules::{glob_matches, is_expired, match_rule, NewRule};
