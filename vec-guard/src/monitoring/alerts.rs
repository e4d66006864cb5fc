//! Threshold alerts for budget monitoring

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use vec_guard_api::DEFAULT_ALERT_THRESHOLDS;

use super::budget::FiredThresholds;

/// Severity of a budget alert
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertLevel {
    Info,
    Warning,
    Critical,
}

impl AlertLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for AlertLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fired threshold
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub level: AlertLevel,
    pub threshold: f64,
    pub actual: f64,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

/// Callback invoked for every fired alert
///
/// Shared so the same callback can be installed on every tracker the
/// facade builds.
pub type AlertCallback = Arc<dyn Fn(&Alert) + Send + Sync>;

/// Evaluates usage percentages against sorted thresholds
pub struct AlertManager {
    thresholds: Vec<f64>,
    callback: Option<AlertCallback>,
}

impl AlertManager {
    pub fn new(mut thresholds: Vec<f64>) -> Self {
        thresholds.sort_by(f64::total_cmp);
        thresholds.dedup();
        Self {
            thresholds,
            callback: None,
        }
    }

    /// Install a callback for UI integration
    pub fn set_callback(&mut self, callback: AlertCallback) {
        self.callback = Some(callback);
    }

    /// Ascending thresholds
    pub fn thresholds(&self) -> &[f64] {
        &self.thresholds
    }

    pub fn level_for(threshold: f64) -> AlertLevel {
        if threshold >= 0.9 {
            AlertLevel::Critical
        } else if threshold >= 0.7 {
            AlertLevel::Warning
        } else {
            AlertLevel::Info
        }
    }

    /// Fire the highest unfired threshold at or below `percentage`
    ///
    /// Lower thresholds crossed in the same jump are skipped, not queued.
    pub fn evaluate(&self, percentage: f64, fired: &mut FiredThresholds) -> Option<Alert> {
        let threshold = self
            .thresholds
            .iter()
            .rev()
            .copied()
            .find(|t| percentage >= *t && !fired.contains(*t))?;

        fired.insert(threshold);

        let alert = Alert {
            level: Self::level_for(threshold),
            threshold,
            actual: percentage,
            message: format!(
                "Token budget at {:.1}% ({:.0}% threshold)",
                percentage * 100.0,
                threshold * 100.0
            ),
            timestamp: Utc::now(),
        };

        tracing::warn!(
            alert = true,
            level = %alert.level,
            threshold = alert.threshold,
            actual = alert.actual,
            "{}",
            alert.message
        );

        if let Some(callback) = &self.callback {
            callback(&alert);
        }

        Some(alert)
    }
}

impl Default for AlertManager {
    fn default() -> Self {
        Self::new(DEFAULT_ALERT_THRESHOLDS.to_vec())
    }
}

impl fmt::Debug for AlertManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AlertManager")
            .field("thresholds", &self.thresholds)
            .field("callback", &self.callback.is_some())
            .finish()
    }
}
