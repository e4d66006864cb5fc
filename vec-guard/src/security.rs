//! Security facade
//!
//! [`SecurityManager`] is the composition root: it loads the policy, builds
//! the permission engine, the egress gate wired to it and, when the policy
//! has a budget, the token tracker. It adds guard checks and nothing else.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use vec_guard::{SecurityManager, SecurityOptions};
//! use vec_guard::permission::TerminalApprovalHandler;
//! use vec_guard_api::PermissionAction;
//!
//! let mut security = SecurityManager::new(
//!     SecurityOptions::default().approval_handler(Arc::new(TerminalApprovalHandler::default())),
//! );
//! security.init().await;
//!
//! if security.check_permission(PermissionAction::FsRead, "/etc/hosts").await? {
//!     // ...
//! }
//! ```

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use vec_guard_api::{InputSource, PermissionAction, PermissionConfig, TokenUsageEvent};

use crate::audit::{
    emit, AuditEvent, AuditEventType, AuditSink, FileAuditSink, NullAuditSink, TracingAuditSink,
};
use crate::config::{ConfigStore, FileConfigStore};
use crate::egress::{EgressCheckResult, EgressGate, EgressMode};
use crate::error::{Result, SecurityError};
use crate::monitoring::{AlertCallback, BudgetUsage, TokenTracker, TrackOutcome};
use crate::permission::{ApprovalHandler, DenyAllApprovalHandler, PermissionEngine};
use crate::validation::{
    classify, sanitize_and_trust, ClassifiedInput, Schema, TrustedInput, ValidationError,
};

/// Collaborators and settings for [`SecurityManager`]
#[derive(Default)]
pub struct SecurityOptions {
    /// Policy storage; discovered from the working directory when absent
    pub config_store: Option<Arc<dyn ConfigStore>>,
    /// Approval for uncovered actions; denies everything when absent
    pub approval_handler: Option<Arc<dyn ApprovalHandler>>,
    /// Audit destination; derived from the policy's audit block when absent
    pub audit_sink: Option<Arc<dyn AuditSink>>,
    pub egress_mode: EgressMode,
    pub on_alert: Option<AlertCallback>,
}

impl SecurityOptions {
    pub fn config_store(mut self, store: Arc<dyn ConfigStore>) -> Self {
        self.config_store = Some(store);
        self
    }

    pub fn approval_handler(mut self, handler: Arc<dyn ApprovalHandler>) -> Self {
        self.approval_handler = Some(handler);
        self
    }

    pub fn audit_sink(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.audit_sink = Some(sink);
        self
    }

    pub fn egress_mode(mut self, mode: EgressMode) -> Self {
        self.egress_mode = mode;
        self
    }

    pub fn on_alert(mut self, callback: AlertCallback) -> Self {
        self.on_alert = Some(callback);
        self
    }
}

struct Components {
    config: PermissionConfig,
    audit: Arc<dyn AuditSink>,
    permission_engine: Arc<PermissionEngine>,
    egress_gate: Arc<EgressGate>,
    token_tracker: Option<Mutex<TokenTracker>>,
}

/// Single entry point for security decisions
pub struct SecurityManager {
    options: SecurityOptions,
    components: Option<Components>,
}

impl SecurityManager {
    pub fn new(options: SecurityOptions) -> Self {
        Self {
            options,
            components: None,
        }
    }

    /// Load the policy and build every component
    ///
    /// Loading never fails: an unreadable or invalid policy is logged and the
    /// default policy applies.
    pub async fn init(&mut self) {
        let store = match &self.options.config_store {
            Some(store) => store.clone(),
            None => {
                let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
                Arc::new(FileConfigStore::discover(cwd)) as Arc<dyn ConfigStore>
            }
        };
        let config = store.load().await;
        let audit = self.audit_sink_for(&config);

        let approval = self
            .options
            .approval_handler
            .clone()
            .unwrap_or_else(|| Arc::new(DenyAllApprovalHandler));

        let permission_engine = Arc::new(
            PermissionEngine::builder(store)
                .approval_handler(approval)
                .audit_sink(audit.clone())
                .rules(config.rules.clone())
                .build(),
        );

        let egress_gate = Arc::new(
            EgressGate::new(self.options.egress_mode)
                .with_permission_engine(permission_engine.clone())
                .with_audit_sink(audit.clone()),
        );

        let token_tracker = config.token_budget.clone().map(|budget| {
            let mut tracker = TokenTracker::new(budget).with_audit_sink(audit.clone());
            if let Some(callback) = &self.options.on_alert {
                tracker = tracker.with_alert_callback(callback.clone());
            }
            Mutex::new(tracker)
        });

        tracing::info!(
            mode = ?config.mode,
            rules = config.rules.len(),
            egress_mode = %self.options.egress_mode,
            budget = token_tracker.is_some(),
            "Security layer initialized"
        );

        self.components = Some(Components {
            config,
            audit,
            permission_engine,
            egress_gate,
            token_tracker,
        });
    }

    pub fn is_initialized(&self) -> bool {
        self.components.is_some()
    }

    fn audit_sink_for(&self, config: &PermissionConfig) -> Arc<dyn AuditSink> {
        if let Some(sink) = &self.options.audit_sink {
            return sink.clone();
        }
        if !config.audit.enabled {
            return Arc::new(NullAuditSink);
        }
        match &config.audit.log_path {
            Some(path) => match FileAuditSink::new(path) {
                Ok(sink) => Arc::new(sink),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Cannot open audit log, using tracing");
                    Arc::new(TracingAuditSink)
                }
            },
            None => Arc::new(TracingAuditSink),
        }
    }

    fn components(&self) -> Result<&Components> {
        self.components.as_ref().ok_or(SecurityError::NotInitialized)
    }

    fn tracker(&self) -> Result<&Mutex<TokenTracker>> {
        self.components()?
            .token_tracker
            .as_ref()
            .ok_or(SecurityError::BudgetNotConfigured)
    }

    /// Tag input with its source
    pub fn classify(&self, input: impl Into<String>, source: InputSource) -> Result<ClassifiedInput> {
        self.components()?;
        Ok(classify(input, source))
    }

    /// Validate external input and relabel it as trusted, auditing the outcome
    pub fn sanitize_and_trust<S: Schema>(
        &self,
        input: &str,
        source: InputSource,
        schema: &S,
    ) -> Result<TrustedInput<S::Output>> {
        let components = self.components()?;
        let result = sanitize_and_trust(input, source, schema);

        let mut event = AuditEvent::new(AuditEventType::Validation, schema.name())
            .with_approved(result.is_ok())
            .with_detail("source", source.as_str());
        if let Err(ValidationError::Schema(e)) = &result {
            event = event.with_detail("error", e.to_string());
        }
        emit(components.audit.as_ref(), event);

        result.map_err(SecurityError::from)
    }

    pub async fn check_permission(&self, action: PermissionAction, target: &str) -> Result<bool> {
        self.components()?.permission_engine.check(action, target).await
    }

    pub async fn check_permission_or_throw(
        &self,
        action: PermissionAction,
        target: &str,
    ) -> Result<()> {
        self.components()?
            .permission_engine
            .check_or_throw(action, target)
            .await
    }

    pub async fn check_egress(&self, data: &str, destination: &str) -> Result<EgressCheckResult> {
        Ok(self.components()?.egress_gate.check(data, destination).await)
    }

    /// Account for one completed exchange with the model provider
    pub fn track_usage(&self, event: &TokenUsageEvent) -> Result<TrackOutcome> {
        let mut tracker = self.tracker()?.lock().unwrap_or_else(|e| e.into_inner());
        Ok(tracker.track(event))
    }

    pub fn usage(&self) -> Result<BudgetUsage> {
        let tracker = self.tracker()?.lock().unwrap_or_else(|e| e.into_inner());
        Ok(tracker.usage())
    }

    pub fn permission_engine(&self) -> Result<Arc<PermissionEngine>> {
        Ok(self.components()?.permission_engine.clone())
    }

    pub fn egress_gate(&self) -> Result<Arc<EgressGate>> {
        Ok(self.components()?.egress_gate.clone())
    }

    /// The tracker, for history and snapshots
    pub fn token_tracker(&self) -> Result<&Mutex<TokenTracker>> {
        self.tracker()
    }

    /// The policy loaded by [`init`](Self::init)
    pub fn config(&self) -> Result<&PermissionConfig> {
        Ok(&self.components()?.config)
    }
}

impl std::fmt::Debug for SecurityManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecurityManager")
            .field("initialized", &self.is_initialized())
            .field("egress_mode", &self.options.egress_mode)
            .finish()
    }
}
