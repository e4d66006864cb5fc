//! Permission engine
//!
//! A check resolves in one of three ways: a live rule decides it, the
//! approval handler decides it once, or the handler approves and asks for a
//! rule, which is appended and persisted before the check returns.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::RwLock;
use vec_guard_api::{PermissionAction, PermissionRule};

use super::approval::{ApprovalHandler, ApprovalRequest, DenyAllApprovalHandler};
use super::rules::{match_rule, NewRule};
use crate::audit::{emit, AuditEvent, AuditEventType, AuditSink, TracingAuditSink};
use crate::config::{ConfigStore, RuleEdit};
use crate::error::{Result, SecurityError};

/// How a check was resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    AutoApproved,
    AutoDenied,
    ApprovedWithRule,
    ApprovedOnce,
    Denied,
}

impl Decision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AutoApproved => "auto-approved",
            Self::AutoDenied => "auto-denied",
            Self::ApprovedWithRule => "approved-with-rule",
            Self::ApprovedOnce => "approved-once",
            Self::Denied => "denied",
        }
    }

    pub fn is_allowed(&self) -> bool {
        matches!(
            self,
            Self::AutoApproved | Self::ApprovedWithRule | Self::ApprovedOnce
        )
    }
}

/// Builder for [`PermissionEngine`]
pub struct PermissionEngineBuilder {
    store: Arc<dyn ConfigStore>,
    approval: Arc<dyn ApprovalHandler>,
    audit: Arc<dyn AuditSink>,
    rules: Vec<PermissionRule>,
}

impl PermissionEngineBuilder {
    /// Handler consulted when no rule matches (default: deny all)
    pub fn approval_handler(mut self, approval: Arc<dyn ApprovalHandler>) -> Self {
        self.approval = approval;
        self
    }

    /// Sink receiving one event per decision (default: tracing)
    pub fn audit_sink(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = audit;
        self
    }

    /// Initial rule list, usually the loaded document's rules
    pub fn rules(mut self, rules: Vec<PermissionRule>) -> Self {
        self.rules = rules;
        self
    }

    pub fn build(self) -> PermissionEngine {
        PermissionEngine {
            rules: RwLock::new(self.rules),
            store: self.store,
            approval: self.approval,
            audit: self.audit,
        }
    }
}

/// Matches actions against rules and drives the approval flow
///
/// The engine owns the in-memory rule list for the session. Every mutation
/// goes through [`ConfigStore::modify`], and the persisted result is merged
/// back so rules written by other processes are picked up. Rules the store
/// does not know about (builder rules, provisional rules) are kept.
pub struct PermissionEngine {
    rules: RwLock<Vec<PermissionRule>>,
    store: Arc<dyn ConfigStore>,
    approval: Arc<dyn ApprovalHandler>,
    audit: Arc<dyn AuditSink>,
}

impl PermissionEngine {
    /// Start building an engine persisting through `store`
    pub fn builder(store: Arc<dyn ConfigStore>) -> PermissionEngineBuilder {
        PermissionEngineBuilder {
            store,
            approval: Arc::new(DenyAllApprovalHandler),
            audit: Arc::new(TracingAuditSink),
            rules: Vec::new(),
        }
    }

    /// Decide whether `action` on `target` may proceed
    ///
    /// Fails only when an approved rule could not be persisted; the rule then
    /// stays in memory and the approval should be treated as provisional.
    pub async fn check(&self, action: PermissionAction, target: &str) -> Result<bool> {
        let matched = {
            let rules = self.rules.read().await;
            match_rule(action, target, &rules, Utc::now()).map(|r| (r.id.clone(), r.approved))
        };

        if let Some((rule_id, approved)) = matched {
            let decision = if approved {
                tracing::info!(%action, target, rule_id = %rule_id, "Permission auto-approved by rule");
                Decision::AutoApproved
            } else {
                tracing::warn!(%action, target, rule_id = %rule_id, "Permission auto-denied by rule");
                Decision::AutoDenied
            };
            self.record(action, target, decision, |event| event.with_detail("ruleId", rule_id));
            return Ok(approved);
        }

        tracing::info!(%action, target, "No rule found, requesting approval");
        let request = ApprovalRequest::new(action, target);
        let response = match self.approval.request(&request).await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(%action, target, error = %e, "Approval request failed, denying");
                self.record(action, target, Decision::Denied, |event| {
                    event.with_detail("error", e.to_string())
                });
                return Ok(false);
            }
        };

        if !response.approved {
            tracing::warn!(%action, target, "Permission denied");
            self.record(action, target, Decision::Denied, |event| event);
            return Ok(false);
        }

        if !response.create_rule {
            tracing::info!(%action, target, "Permission approved once");
            self.record(action, target, Decision::ApprovedOnce, |event| event);
            return Ok(true);
        }

        let pattern = response.rule_pattern.unwrap_or_else(|| target.to_string());
        let rule = NewRule::allow(action, pattern.clone()).into_rule();
        let rule_id = rule.id.clone();
        let persisted = self.append(rule).await;

        tracing::info!(%action, target, %pattern, rule_id = %rule_id, "Permission approved and rule created");
        self.record(action, target, Decision::ApprovedWithRule, |event| {
            event
                .with_detail("ruleId", rule_id.clone())
                .with_detail("pattern", pattern.clone())
                .with_detail("persisted", persisted.is_ok())
        });

        persisted.map(|_| true)
    }

    /// Like [`check`](Self::check), but denial is an error
    pub async fn check_or_throw(&self, action: PermissionAction, target: &str) -> Result<()> {
        if self.check(action, target).await? {
            Ok(())
        } else {
            Err(SecurityError::PermissionDenied {
                action,
                target: target.to_string(),
            })
        }
    }

    /// Snapshot of the current rule list
    pub async fn rules(&self) -> Vec<PermissionRule> {
        self.rules.read().await.clone()
    }

    /// Append a rule and persist it
    pub async fn add_rule(&self, rule: NewRule) -> Result<PermissionRule> {
        let rule = rule.into_rule();
        self.append(rule.clone()).await?;
        tracing::info!(rule_id = %rule.id, action = %rule.action, pattern = %rule.pattern, "Rule added");
        Ok(rule)
    }

    /// Remove a rule by id and persist the change
    ///
    /// Returns whether the rule was present in memory.
    pub async fn remove_rule(&self, rule_id: &str) -> Result<bool> {
        let removed = {
            let mut rules = self.rules.write().await;
            let before = rules.len();
            rules.retain(|rule| rule.id != rule_id);
            rules.len() != before
        };

        self.persist(RuleEdit::Remove(rule_id.to_string())).await?;
        tracing::info!(rule_id, removed, "Rule removed");
        Ok(removed)
    }

    async fn append(&self, rule: PermissionRule) -> Result<()> {
        self.rules.write().await.push(rule.clone());
        self.persist(RuleEdit::Append(rule)).await
    }

    async fn persist(&self, edit: RuleEdit) -> Result<()> {
        match self.store.modify(edit).await {
            Ok(config) => {
                let mut rules = self.rules.write().await;
                let local = std::mem::take(&mut *rules);
                *rules = merge_rules(local, config.rules);
                Ok(())
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to persist rules; in-memory change kept");
                Err(SecurityError::Persistence(e))
            }
        }
    }

    fn record(
        &self,
        action: PermissionAction,
        target: &str,
        decision: Decision,
        extra: impl FnOnce(AuditEvent) -> AuditEvent,
    ) {
        let event = AuditEvent::new(AuditEventType::Permission, action.as_str())
            .with_target(target)
            .with_approved(decision.is_allowed())
            .with_detail("decision", decision.as_str());
        emit(self.audit.as_ref(), extra(event));
    }
}

/// Local-only rules first, in their order, then the persisted list
fn merge_rules(local: Vec<PermissionRule>, persisted: Vec<PermissionRule>) -> Vec<PermissionRule> {
    let stored: HashSet<&str> = persisted.iter().map(|rule| rule.id.as_str()).collect();
    let mut merged: Vec<PermissionRule> = local
        .into_iter()
        .filter(|rule| !stored.contains(rule.id.as_str()))
        .collect();
    merged.extend(persisted);
    merged
}

impl std::fmt::Debug for PermissionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PermissionEngine").finish_non_exhaustive()
    }
}
