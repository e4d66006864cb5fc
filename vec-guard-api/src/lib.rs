//! vec-guard-api: Shared types for the vec-guard security layer
//!
//! This crate defines the data exchanged between the security core, the
//! persisted policy document, and the embedding agent host. It performs no
//! I/O; everything here is plain serde data.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Version string every persisted policy document must carry
pub const CONFIG_VERSION: &str = "1.0";

/// Alert thresholds used when a budget block omits them
pub const DEFAULT_ALERT_THRESHOLDS: [f64; 4] = [0.5, 0.7, 0.8, 1.0];

/// Token limit of the built-in default budget
pub const DEFAULT_TOKEN_LIMIT: u64 = 100_000;

// ============================================================================
// Permission rules
// ============================================================================

/// Action a permission rule governs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PermissionAction {
    #[serde(rename = "fs.read")]
    FsRead,
    #[serde(rename = "fs.write")]
    FsWrite,
    #[serde(rename = "fs.delete")]
    FsDelete,
    #[serde(rename = "egress.network")]
    EgressNetwork,
    #[serde(rename = "egress.file")]
    EgressFile,
}

impl PermissionAction {
    /// Every action, in declaration order
    pub const ALL: [PermissionAction; 5] = [
        Self::FsRead,
        Self::FsWrite,
        Self::FsDelete,
        Self::EgressNetwork,
        Self::EgressFile,
    ];

    /// Wire name of the action (e.g. `"fs.read"`)
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FsRead => "fs.read",
            Self::FsWrite => "fs.write",
            Self::FsDelete => "fs.delete",
            Self::EgressNetwork => "egress.network",
            Self::EgressFile => "egress.file",
        }
    }

    /// Whether the action sends data out of the workspace
    pub fn is_egress(&self) -> bool {
        matches!(self, Self::EgressNetwork | Self::EgressFile)
    }
}

impl fmt::Display for PermissionAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown action name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownAction(pub String);

impl fmt::Display for UnknownAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown permission action: {}", self.0)
    }
}

impl std::error::Error for UnknownAction {}

impl FromStr for PermissionAction {
    type Err = UnknownAction;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|action| action.as_str() == s)
            .ok_or_else(|| UnknownAction(s.to_string()))
    }
}

/// How much detail a permission prompt shows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verbosity {
    #[default]
    Minimal,
    Detailed,
    Custom,
}

/// Generate a fresh rule identifier
pub fn new_rule_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// A persisted permission rule
///
/// A rule whose `expires_at` lies in the past never matches, but stays in
/// the rule set until it is removed explicitly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionRule {
    /// Unique within a rule set
    #[serde(default = "new_rule_id")]
    pub id: String,
    pub action: PermissionAction,
    /// Glob matched against the action target
    pub pattern: String,
    pub approved: bool,
    #[serde(default)]
    pub verbosity: Verbosity,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl PermissionRule {
    /// Create an approving rule with a fresh id, created now
    pub fn allow(action: PermissionAction, pattern: impl Into<String>) -> Self {
        Self::new(action, pattern, true)
    }

    /// Create a denying rule with a fresh id, created now
    pub fn deny(action: PermissionAction, pattern: impl Into<String>) -> Self {
        Self::new(action, pattern, false)
    }

    fn new(action: PermissionAction, pattern: impl Into<String>, approved: bool) -> Self {
        Self {
            id: new_rule_id(),
            action,
            pattern: pattern.into(),
            approved,
            verbosity: Verbosity::Minimal,
            created_at: Utc::now(),
            expires_at: None,
        }
    }

    /// Set an expiry timestamp
    pub fn expires_at(mut self, at: DateTime<Utc>) -> Self {
        self.expires_at = Some(at);
        self
    }

    /// Set the prompt verbosity
    pub fn with_verbosity(mut self, verbosity: Verbosity) -> Self {
        self.verbosity = verbosity;
        self
    }

    /// Whether the rule had expired at `now`
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at < now)
    }
}

// ============================================================================
// Policy document
// ============================================================================

/// Overall policy posture recorded in the document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyMode {
    #[default]
    Strict,
    Permissive,
}

/// Audit settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// JSONL file receiving audit events
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_path: Option<PathBuf>,
}

fn default_true() -> bool {
    true
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            log_path: None,
        }
    }
}

/// Length of a budget period
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BudgetPeriod {
    Daily,
    Weekly,
    Monthly,
}

impl BudgetPeriod {
    /// Fixed length of the period (months are 30 days)
    pub fn duration(&self) -> Duration {
        match self {
            Self::Daily => Duration::hours(24),
            Self::Weekly => Duration::days(7),
            Self::Monthly => Duration::days(30),
        }
    }
}

/// Token budget block of the policy document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenBudget {
    pub limit: u64,
    pub period: BudgetPeriod,
    /// Fractions of `limit` at which alerts fire
    #[serde(default = "default_alert_thresholds")]
    pub alert_thresholds: Vec<f64>,
}

fn default_alert_thresholds() -> Vec<f64> {
    DEFAULT_ALERT_THRESHOLDS.to_vec()
}

impl TokenBudget {
    /// Budget with the default alert thresholds
    pub fn new(limit: u64, period: BudgetPeriod) -> Self {
        Self {
            limit,
            period,
            alert_thresholds: default_alert_thresholds(),
        }
    }

    /// Replace the alert thresholds
    pub fn with_thresholds(mut self, thresholds: Vec<f64>) -> Self {
        self.alert_thresholds = thresholds;
        self
    }
}

/// The persisted policy document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionConfig {
    pub version: String,
    #[serde(default)]
    pub mode: PolicyMode,
    /// Ordered; the first matching rule wins
    #[serde(default)]
    pub rules: Vec<PermissionRule>,
    #[serde(default)]
    pub audit: AuditConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_budget: Option<TokenBudget>,
}

impl Default for PermissionConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION.to_string(),
            mode: PolicyMode::Strict,
            rules: Vec::new(),
            audit: AuditConfig::default(),
            token_budget: Some(TokenBudget::new(DEFAULT_TOKEN_LIMIT, BudgetPeriod::Daily)),
        }
    }
}

// ============================================================================
// Input provenance
// ============================================================================

/// Where a piece of input came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputSource {
    /// Typed directly by the user
    UserCommand,
    /// Read from a file
    FileContent,
    /// Received over the network
    Network,
    /// Read from an environment variable
    Environment,
}

impl InputSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UserCommand => "user_command",
            Self::FileContent => "file_content",
            Self::Network => "network",
            Self::Environment => "environment",
        }
    }
}

impl fmt::Display for InputSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Scan results
// ============================================================================

/// Severity class of a detector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Medium,
    High,
    Critical,
}

/// A single detected occurrence of sensitive content
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Finding {
    /// Detector name (e.g. `AWS_ACCESS_KEY`)
    #[serde(rename = "type")]
    pub kind: String,
    /// 1-based line of the match start
    pub line: usize,
    /// Abbreviated match; the raw value is never kept
    pub redacted_excerpt: String,
    pub severity: Severity,
}

/// Outcome of scanning a text blob
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanResult {
    pub has_secrets: bool,
    pub findings: Vec<Finding>,
}

impl ScanResult {
    /// Build a result, deriving `has_secrets` from the findings
    pub fn from_findings(findings: Vec<Finding>) -> Self {
        Self {
            has_secrets: !findings.is_empty(),
            findings,
        }
    }

    /// No findings at all
    pub fn is_clean(&self) -> bool {
        !self.has_secrets
    }
}

// ============================================================================
// Token usage
// ============================================================================

/// Usage reported after one completed exchange with the model provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenUsageEvent {
    pub model: String,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
    pub timestamp: DateTime<Utc>,
}

impl TokenUsageEvent {
    /// Event stamped now, with `total_tokens` = prompt + completion
    pub fn new(model: impl Into<String>, prompt_tokens: u64, completion_tokens: u64) -> Self {
        Self {
            model: model.into(),
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens.saturating_add(completion_tokens),
            timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_wire_names() {
        let json = serde_json::to_string(&PermissionAction::EgressNetwork).unwrap();
        assert_eq!(json, "\"egress.network\"");

        for action in PermissionAction::ALL {
            assert_eq!(action.as_str().parse::<PermissionAction>(), Ok(action));
        }
        assert!("fs.exec".parse::<PermissionAction>().is_err());
    }

    #[test]
    fn test_rule_without_id_gets_one() {
        let json = r#"{
            "action": "fs.read",
            "pattern": "/tmp/*",
            "approved": true,
            "createdAt": "2024-01-01T00:00:00Z"
        }"#;
        let rule: PermissionRule = serde_json::from_str(json).unwrap();
        assert!(!rule.id.is_empty());
        assert_eq!(rule.verbosity, Verbosity::Minimal);
        assert!(rule.expires_at.is_none());
    }

    #[test]
    fn test_rule_expiry() {
        let now = Utc::now();
        let rule = PermissionRule::allow(PermissionAction::FsRead, "*");
        assert!(!rule.is_expired_at(now));

        let expired = rule.clone().expires_at(now - Duration::minutes(1));
        assert!(expired.is_expired_at(now));

        let future = rule.expires_at(now + Duration::minutes(1));
        assert!(!future.is_expired_at(now));
    }

    #[test]
    fn test_default_config() {
        let config = PermissionConfig::default();
        assert_eq!(config.version, CONFIG_VERSION);
        assert_eq!(config.mode, PolicyMode::Strict);
        assert!(config.rules.is_empty());
        assert!(config.audit.enabled);

        let budget = config.token_budget.unwrap();
        assert_eq!(budget.limit, 100_000);
        assert_eq!(budget.period, BudgetPeriod::Daily);
        assert_eq!(budget.alert_thresholds, vec![0.5, 0.7, 0.8, 1.0]);
    }

    #[test]
    fn test_config_document_shape() {
        let json = r#"{
            "version": "1.0",
            "rules": [],
            "tokenBudget": { "limit": 5000, "period": "weekly" }
        }"#;
        let config: PermissionConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.mode, PolicyMode::Strict);
        assert!(config.audit.enabled);
        let budget = config.token_budget.unwrap();
        assert_eq!(budget.period.duration(), Duration::days(7));
        assert_eq!(budget.alert_thresholds.len(), 4);
    }

    #[test]
    fn test_scan_result_invariant() {
        assert!(ScanResult::from_findings(vec![]).is_clean());

        let finding = Finding {
            kind: "EMAIL".into(),
            line: 1,
            redacted_excerpt: "a@b.***".into(),
            severity: Severity::Medium,
        };
        let result = ScanResult::from_findings(vec![finding]);
        assert!(result.has_secrets);

        let json = serde_json::to_string(&result).unwrap();
        assert!(json.contains("\"type\":\"EMAIL\""));
        assert!(json.contains("redactedExcerpt"));
    }

    #[test]
    fn test_usage_event_total() {
        let event = TokenUsageEvent::new("test-model", 120, 30);
        assert_eq!(event.total_tokens, 150);

        let event = TokenUsageEvent::new("test-model", u64::MAX, 1);
        assert_eq!(event.total_tokens, u64::MAX);
    }
}
