//! Period-based token budget

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use vec_guard_api::TokenBudget;

/// Alert thresholds already fired in the current period
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FiredThresholds(Vec<f64>);

impl FiredThresholds {
    pub fn contains(&self, threshold: f64) -> bool {
        self.0.iter().any(|fired| *fired == threshold)
    }

    /// Record a threshold; returns false if it had already fired
    pub fn insert(&mut self, threshold: f64) -> bool {
        if self.contains(threshold) {
            return false;
        }
        self.0.push(threshold);
        true
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Fired thresholds in firing order
    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }
}

/// Persistable state of a budget period
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BudgetState {
    pub used: u64,
    pub period_start: DateTime<Utc>,
    #[serde(default)]
    pub fired_thresholds: FiredThresholds,
}

impl BudgetState {
    /// Fresh period starting at `now`
    pub fn starting_at(now: DateTime<Utc>) -> Self {
        Self {
            used: 0,
            period_start: now,
            fired_thresholds: FiredThresholds::default(),
        }
    }
}

/// Usage figures for the current period
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BudgetUsage {
    pub used: u64,
    pub limit: u64,
    /// `used / limit`; exceeds 1.0 on overshoot
    pub percentage: f64,
    pub remaining: u64,
}

/// Accumulates usage for one budget period at a time
///
/// Periods have fixed lengths and are not calendar aligned.
#[derive(Debug, Clone)]
pub struct BudgetManager {
    budget: TokenBudget,
    state: BudgetState,
}

impl BudgetManager {
    /// Manager with a period starting now
    pub fn new(budget: TokenBudget) -> Self {
        Self::from_state(budget, BudgetState::starting_at(Utc::now()))
    }

    /// Manager resuming a persisted period
    pub fn from_state(budget: TokenBudget, state: BudgetState) -> Self {
        Self { budget, state }
    }

    /// Add tokens to the period total (no upper clamp)
    pub fn record(&mut self, tokens: u64) {
        self.state.used = self.state.used.saturating_add(tokens);
    }

    pub fn usage(&self) -> BudgetUsage {
        let used = self.state.used;
        let limit = self.budget.limit;
        let percentage = if limit == 0 {
            0.0
        } else {
            used as f64 / limit as f64
        };
        BudgetUsage {
            used,
            limit,
            percentage,
            remaining: limit.saturating_sub(used),
        }
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// Whether more than one period length has elapsed at `now`
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(self.state.period_start) > self.budget.period.duration()
    }

    /// Start a new period now: zero usage, no fired thresholds
    pub fn reset(&mut self) {
        self.state = BudgetState::starting_at(Utc::now());
    }

    /// Reset if the period has elapsed; returns whether it did
    pub fn check_and_reset_if_expired(&mut self) -> bool {
        if self.is_expired() {
            self.reset();
            return true;
        }
        false
    }

    pub fn budget(&self) -> &TokenBudget {
        &self.budget
    }

    pub fn state(&self) -> &BudgetState {
        &self.state
    }

    pub fn fired_thresholds_mut(&mut self) -> &mut FiredThresholds {
        &mut self.state.fired_thresholds
    }
}
