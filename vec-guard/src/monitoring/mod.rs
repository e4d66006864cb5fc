//! Token budget monitoring
//!
//! [`TokenTracker`] composes a [`BudgetManager`] (period totals and resets)
//! with an [`AlertManager`] (one alert per threshold per period).

pub mod alerts;
pub mod budget;
pub mod tracker;

pub use alerts::{Alert, AlertCallback, AlertLevel, AlertManager};
pub use budget::{BudgetManager, BudgetState, BudgetUsage, FiredThresholds};
pub use tracker::{TokenTracker, TrackOutcome, TrackerSnapshot, DEFAULT_HISTORY_CAPACITY};
