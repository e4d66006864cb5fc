//! Egress gate: scan outbound data and apply the configured policy
//!
//! # Modes
//!
//! - `block`: findings defer the decision to the permission engine; with no
//!   engine attached the data is denied
//! - `warn`: findings are surfaced but the data is allowed
//! - `log-only`: findings are recorded, the data is allowed

use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use vec_guard_api::{Finding, PermissionAction, ScanResult, Severity};

use super::scanner::{scan, ScanOptions};
use crate::audit::{emit, AuditEvent, AuditEventType, AuditSink, TracingAuditSink};
use crate::permission::PermissionEngine;

const WARN_NOTICE: &str = "Sensitive data detected but allowed through";

/// Policy applied when outbound data contains findings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EgressMode {
    #[default]
    Block,
    Warn,
    LogOnly,
}

impl EgressMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Block => "block",
            Self::Warn => "warn",
            Self::LogOnly => "log-only",
        }
    }
}

impl std::fmt::Display for EgressMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of an egress check
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EgressCheckResult {
    pub allowed: bool,
    pub findings: Vec<Finding>,
}

/// Permission action governing a destination
///
/// URLs map to network egress, everything else to file egress.
pub fn destination_action(destination: &str) -> PermissionAction {
    if destination.starts_with("http://") || destination.starts_with("https://") {
        PermissionAction::EgressNetwork
    } else {
        PermissionAction::EgressFile
    }
}

/// Gate for data leaving the agent
pub struct EgressGate {
    mode: RwLock<EgressMode>,
    permission_engine: Option<Arc<PermissionEngine>>,
    audit: Arc<dyn AuditSink>,
    scan_options: ScanOptions,
}

impl EgressGate {
    /// Create a gate with no permission engine and tracing audit
    pub fn new(mode: EgressMode) -> Self {
        Self {
            mode: RwLock::new(mode),
            permission_engine: None,
            audit: Arc::new(TracingAuditSink),
            scan_options: ScanOptions::default(),
        }
    }

    /// Defer block-mode decisions to a permission engine
    pub fn with_permission_engine(mut self, engine: Arc<PermissionEngine>) -> Self {
        self.permission_engine = Some(engine);
        self
    }

    /// Report evaluations to the given sink
    pub fn with_audit_sink(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = audit;
        self
    }

    /// Use custom scanner options
    pub fn with_scan_options(mut self, options: ScanOptions) -> Self {
        self.scan_options = options;
        self
    }

    /// Current mode
    pub fn mode(&self) -> EgressMode {
        *self.mode.read().unwrap_or_else(|e| e.into_inner())
    }

    /// Switch modes at runtime
    pub fn set_mode(&self, mode: EgressMode) {
        let mut current = self.mode.write().unwrap_or_else(|e| e.into_inner());
        tracing::info!(from = %*current, to = %mode, "Egress mode changed");
        *current = mode;
    }

    /// Scan without applying any policy
    pub fn scan_only(&self, data: &str) -> ScanResult {
        scan(data, &self.scan_options)
    }

    /// Scan `data` bound for `destination` and decide whether it may leave
    pub async fn check(&self, data: &str, destination: &str) -> EgressCheckResult {
        let mode = self.mode();
        let result = self.scan_only(data);

        if result.is_clean() {
            tracing::debug!(destination, "Egress clean");
            self.record(destination, mode, &result.findings, true, None);
            return EgressCheckResult {
                allowed: true,
                findings: Vec::new(),
            };
        }

        let (allowed, permission_checked) = match mode {
            EgressMode::LogOnly => {
                tracing::info!(
                    destination,
                    finding_count = result.findings.len(),
                    "Sensitive data in egress (log-only)"
                );
                (true, None)
            }
            EgressMode::Warn => {
                tracing::warn!(
                    destination,
                    finding_count = result.findings.len(),
                    "Sensitive data in egress"
                );
                (true, None)
            }
            EgressMode::Block => (
                self.decide_blocked(destination).await,
                Some(self.permission_engine.is_some()),
            ),
        };

        self.record(destination, mode, &result.findings, allowed, permission_checked);
        EgressCheckResult {
            allowed,
            findings: result.findings,
        }
    }

    async fn decide_blocked(&self, destination: &str) -> bool {
        let Some(engine) = &self.permission_engine else {
            tracing::warn!(destination, "Egress blocked: no permission engine attached");
            return false;
        };

        let action = destination_action(destination);
        match engine.check(action, destination).await {
            Ok(allowed) => {
                if !allowed {
                    tracing::warn!(destination, %action, "Egress denied");
                }
                allowed
            }
            Err(e) => {
                tracing::error!(destination, %action, error = %e, "Permission check failed, blocking egress");
                false
            }
        }
    }

    fn record(
        &self,
        destination: &str,
        mode: EgressMode,
        findings: &[Finding],
        allowed: bool,
        permission_checked: Option<bool>,
    ) {
        let mut finding_types: Vec<&str> = Vec::new();
        for finding in findings {
            if !finding_types.contains(&finding.kind.as_str()) {
                finding_types.push(&finding.kind);
            }
        }
        let critical_count = findings
            .iter()
            .filter(|f| f.severity == Severity::Critical)
            .count();

        let mut event = AuditEvent::new(AuditEventType::Egress, "scan")
            .with_target(destination)
            .with_approved(allowed)
            .with_detail("findingCount", findings.len())
            .with_detail(
                "findingTypes",
                Value::from(finding_types.into_iter().map(Value::from).collect::<Vec<_>>()),
            )
            .with_detail("criticalCount", critical_count)
            .with_detail("mode", mode.as_str());
        if let Some(checked) = permission_checked {
            event = event.with_detail("permissionChecked", checked);
        }
        if mode == EgressMode::Warn && !findings.is_empty() {
            event = event.with_detail("warning", WARN_NOTICE);
        }
        emit(self.audit.as_ref(), event);
    }
}

impl std::fmt::Debug for EgressGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EgressGate")
            .field("mode", &self.mode())
            .field("permission_engine", &self.permission_engine.is_some())
            .finish()
    }
}
