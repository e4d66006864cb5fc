//! Approval handling for actions no rule covers
//!
//! The engine asks an [`ApprovalHandler`] whenever no rule decides a check.
//! Hosts swap implementations to match their UI: a terminal prompt, a
//! scripted policy, or a recording double in tests.

use std::io::{self, BufRead, IsTerminal, Write};
use std::sync::Mutex;

use async_trait::async_trait;
use thiserror::Error;
use vec_guard_api::{PermissionAction, Verbosity};

/// Error type for approval requests
#[derive(Debug, Error)]
pub enum ApprovalError {
    #[error("Approval cancelled")]
    Cancelled,

    #[error("Non-interactive environment")]
    NonInteractive,

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// What the engine is asking approval for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApprovalRequest {
    pub action: PermissionAction,
    pub target: String,
    pub context: Option<String>,
}

impl ApprovalRequest {
    pub fn new(action: PermissionAction, target: impl Into<String>) -> Self {
        Self {
            action,
            target: target.into(),
            context: None,
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }
}

/// Decision returned by an approval handler
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ApprovalResponse {
    pub approved: bool,
    /// Persist an approving rule for similar requests
    pub create_rule: bool,
    /// Pattern for the new rule; the target itself when absent
    pub rule_pattern: Option<String>,
}

impl ApprovalResponse {
    pub fn deny() -> Self {
        Self::default()
    }

    pub fn approve_once() -> Self {
        Self {
            approved: true,
            ..Self::default()
        }
    }

    pub fn approve_with_rule(pattern: Option<String>) -> Self {
        Self {
            approved: true,
            create_rule: true,
            rule_pattern: pattern,
        }
    }
}

/// Capability that decides requests no rule covers
///
/// # Example
///
/// ```rust
/// use async_trait::async_trait;
/// use vec_guard::permission::{ApprovalError, ApprovalHandler, ApprovalRequest, ApprovalResponse};
///
/// struct ReadOnlyPolicy;
///
/// #[async_trait]
/// impl ApprovalHandler for ReadOnlyPolicy {
///     async fn request(&self, request: &ApprovalRequest) -> Result<ApprovalResponse, ApprovalError> {
///         if request.action.as_str() == "fs.read" {
///             Ok(ApprovalResponse::approve_once())
///         } else {
///             Ok(ApprovalResponse::deny())
///         }
///     }
/// }
/// ```
#[async_trait]
pub trait ApprovalHandler: Send + Sync {
    /// Decide a single request
    async fn request(&self, request: &ApprovalRequest) -> Result<ApprovalResponse, ApprovalError>;
}

// ============================================================================
// Deny-all Handler
// ============================================================================

/// Denies everything without prompting; the default for non-interactive use
#[derive(Debug, Default, Clone, Copy)]
pub struct DenyAllApprovalHandler;

#[async_trait]
impl ApprovalHandler for DenyAllApprovalHandler {
    async fn request(&self, _request: &ApprovalRequest) -> Result<ApprovalResponse, ApprovalError> {
        Ok(ApprovalResponse::deny())
    }
}

// ============================================================================
// Auto Handler
// ============================================================================

/// Returns a fixed response
#[derive(Debug, Clone)]
pub struct AutoApprovalHandler {
    response: ApprovalResponse,
}

impl AutoApprovalHandler {
    pub fn always_allow() -> Self {
        Self::with_response(ApprovalResponse::approve_once())
    }

    pub fn always_deny() -> Self {
        Self::with_response(ApprovalResponse::deny())
    }

    pub fn with_response(response: ApprovalResponse) -> Self {
        Self { response }
    }
}

#[async_trait]
impl ApprovalHandler for AutoApprovalHandler {
    async fn request(&self, _request: &ApprovalRequest) -> Result<ApprovalResponse, ApprovalError> {
        Ok(self.response.clone())
    }
}

// ============================================================================
// Recording Handler (for testing)
// ============================================================================

/// Records every request and returns a fixed response
#[derive(Debug, Default)]
pub struct RecordingApprovalHandler {
    requests: Mutex<Vec<ApprovalRequest>>,
    response: ApprovalResponse,
}

impl RecordingApprovalHandler {
    pub fn new(response: ApprovalResponse) -> Self {
        Self {
            requests: Mutex::new(Vec::new()),
            response,
        }
    }

    /// All requests seen so far
    pub fn requests(&self) -> Vec<ApprovalRequest> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn count(&self) -> usize {
        self.requests.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn clear(&self) {
        self.requests.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }
}

#[async_trait]
impl ApprovalHandler for RecordingApprovalHandler {
    async fn request(&self, request: &ApprovalRequest) -> Result<ApprovalResponse, ApprovalError> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(request.clone());
        Ok(self.response.clone())
    }
}

// ============================================================================
// Terminal Handler
// ============================================================================

/// Prompts on stdout and reads the answer from stdin
///
/// `y` approves once, `r` approves and creates a rule for the target,
/// anything else denies.
#[derive(Debug, Clone, Copy, Default)]
pub struct TerminalApprovalHandler {
    verbosity: Verbosity,
}

impl TerminalApprovalHandler {
    pub fn new(verbosity: Verbosity) -> Self {
        Self { verbosity }
    }

    /// Prompt with the full action description
    pub fn detailed() -> Self {
        Self::new(Verbosity::Detailed)
    }
}

#[async_trait]
impl ApprovalHandler for TerminalApprovalHandler {
    async fn request(&self, request: &ApprovalRequest) -> Result<ApprovalResponse, ApprovalError> {
        if !io::stdout().is_terminal() {
            return Err(ApprovalError::NonInteractive);
        }

        let prompt = format_permission_prompt(request.action, &request.target, self.verbosity);
        let context = request.context.clone();

        // Stdin reads block; keep them off the runtime workers.
        tokio::task::spawn_blocking(move || prompt_blocking(&prompt, context.as_deref()))
            .await
            .map_err(|_| ApprovalError::Cancelled)?
    }
}

fn prompt_blocking(prompt: &str, context: Option<&str>) -> Result<ApprovalResponse, ApprovalError> {
    let mut stdout = io::stdout();

    writeln!(stdout)?;
    if let Some(context) = context {
        writeln!(stdout, "{}", context)?;
    }
    write!(stdout, "{} ", prompt.trim_end())?;
    stdout.flush()?;

    let mut input = String::new();
    if io::stdin().lock().read_line(&mut input)? == 0 {
        return Err(ApprovalError::Cancelled);
    }

    Ok(parse_answer(&input))
}

fn parse_answer(input: &str) -> ApprovalResponse {
    match input.trim().to_lowercase().as_str() {
        "y" | "yes" => ApprovalResponse::approve_once(),
        "r" | "rule" => ApprovalResponse::approve_with_rule(None),
        _ => ApprovalResponse::deny(),
    }
}

fn describe(action: PermissionAction) -> (&'static str, &'static str) {
    match action {
        PermissionAction::FsRead => (
            "Read file or directory contents from filesystem",
            "Medium - may expose sensitive data",
        ),
        PermissionAction::FsWrite => (
            "Create or modify files/directories",
            "High - can alter system state",
        ),
        PermissionAction::FsDelete => (
            "Delete files or directories",
            "Critical - irreversible data loss",
        ),
        PermissionAction::EgressNetwork => (
            "Send data over network",
            "High - potential data exfiltration",
        ),
        PermissionAction::EgressFile => (
            "Write data to external file location",
            "High - potential data leak",
        ),
    }
}

/// Render the question shown to a human approver
pub fn format_permission_prompt(
    action: PermissionAction,
    target: &str,
    verbosity: Verbosity,
) -> String {
    if verbosity == Verbosity::Minimal {
        return format!("Allow {} on {}? [y/N/r(ule)]", action, target);
    }

    let (description, risk) = describe(action);
    format!(
        "\n=== Permission Request ===\n\
         Action: {action}\n\
         Target: {target}\n\
         \n\
         Description: {description}\n\
         Risk Level: {risk}\n\
         \n\
         Allow this operation?\n  \
         y - Approve once\n  \
         r - Approve and create rule for similar requests\n  \
         N - Deny (default)\n"
    )
}
