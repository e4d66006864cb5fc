//! Token usage tracker
//!
//! Composes the budget and the alert manager: each tracked event may roll
//! the period over, adds to the period total, evaluates alerts and lands in
//! a bounded history.

use std::collections::VecDeque;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use vec_guard_api::{TokenBudget, TokenUsageEvent};

use super::alerts::{Alert, AlertCallback, AlertManager};
use super::budget::{BudgetManager, BudgetState, BudgetUsage};
use crate::audit::{emit, AuditEvent, AuditEventType, AuditSink, TracingAuditSink};

/// Events retained in the usage history
pub const DEFAULT_HISTORY_CAPACITY: usize = 100;

/// Result of tracking one event
#[derive(Debug, Clone, PartialEq)]
pub struct TrackOutcome {
    pub alert: Option<Alert>,
    pub usage: BudgetUsage,
}

/// Persistable tracker state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackerSnapshot {
    pub budget: BudgetState,
    pub history: Vec<TokenUsageEvent>,
}

/// Tracks token usage against a budget
pub struct TokenTracker {
    budget: BudgetManager,
    alerts: AlertManager,
    history: VecDeque<TokenUsageEvent>,
    capacity: usize,
    audit: Arc<dyn AuditSink>,
}

impl TokenTracker {
    pub fn new(budget: TokenBudget) -> Self {
        let alerts = AlertManager::new(budget.alert_thresholds.clone());
        Self {
            budget: BudgetManager::new(budget),
            alerts,
            history: VecDeque::with_capacity(DEFAULT_HISTORY_CAPACITY),
            capacity: DEFAULT_HISTORY_CAPACITY,
            audit: Arc::new(TracingAuditSink),
        }
    }

    pub fn with_alert_callback(mut self, callback: AlertCallback) -> Self {
        self.alerts.set_callback(callback);
        self
    }

    pub fn with_audit_sink(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = audit;
        self
    }

    /// Keep at most `capacity` events in the history
    pub fn with_history_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self.truncate_history();
        self
    }

    /// Account for one completed exchange
    pub fn track(&mut self, event: &TokenUsageEvent) -> TrackOutcome {
        if self.budget.check_and_reset_if_expired() {
            tracing::info!("Budget period reset");
            emit(
                self.audit.as_ref(),
                AuditEvent::new(AuditEventType::Budget, "period-reset"),
            );
        }

        self.budget.record(event.total_tokens);
        let usage = self.budget.usage();

        let alert = {
            let (alerts, budget) = (&self.alerts, &mut self.budget);
            alerts.evaluate(usage.percentage, budget.fired_thresholds_mut())
        };
        if let Some(alert) = &alert {
            emit(
                self.audit.as_ref(),
                AuditEvent::new(AuditEventType::Budget, "alert")
                    .with_detail("level", alert.level.as_str())
                    .with_detail("threshold", alert.threshold)
                    .with_detail("actual", alert.actual)
                    .with_detail("used", usage.used)
                    .with_detail("limit", usage.limit),
            );
        }

        tracing::info!(
            model = %event.model,
            tokens = event.total_tokens,
            budget_percentage = %format!("{:.1}%", usage.percentage * 100.0),
            remaining = usage.remaining,
            "Tracked {} tokens ({})",
            event.total_tokens,
            event.model
        );

        self.history.push_back(event.clone());
        self.truncate_history();

        TrackOutcome { alert, usage }
    }

    pub fn usage(&self) -> BudgetUsage {
        self.budget.usage()
    }

    /// History, oldest first
    pub fn history(&self) -> Vec<TokenUsageEvent> {
        self.history.iter().cloned().collect()
    }

    /// Start a new period and forget the history
    pub fn reset(&mut self) {
        self.budget.reset();
        self.history.clear();
        emit(
            self.audit.as_ref(),
            AuditEvent::new(AuditEventType::Budget, "reset"),
        );
    }

    pub fn budget(&self) -> &BudgetManager {
        &self.budget
    }

    pub fn snapshot(&self) -> TrackerSnapshot {
        TrackerSnapshot {
            budget: self.budget.state().clone(),
            history: self.history(),
        }
    }

    /// Resume from a snapshot, keeping only the most recent events
    pub fn restore(&mut self, snapshot: TrackerSnapshot) {
        self.budget = BudgetManager::from_state(self.budget.budget().clone(), snapshot.budget);
        self.history = snapshot.history.into();
        self.truncate_history();
    }

    fn truncate_history(&mut self) {
        while self.history.len() > self.capacity {
            self.history.pop_front();
        }
    }
}

impl std::fmt::Debug for TokenTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenTracker")
            .field("budget", &self.budget)
            .field("alerts", &self.alerts)
            .field("history", &self.history.len())
            .finish()
    }
}
