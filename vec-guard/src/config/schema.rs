//! Validation of the policy document
//!
//! A document is either valid as a whole or rejected; nothing is partially
//! applied.

use std::collections::HashSet;

use glob::Pattern;
use vec_guard_api::{PermissionConfig, PermissionRule, TokenBudget, CONFIG_VERSION};

use super::ConfigError;

/// Check a document against the schema
pub fn validate(config: &PermissionConfig) -> Result<(), ConfigError> {
    if config.version != CONFIG_VERSION {
        return Err(invalid(format!(
            "unsupported version \"{}\" (expected \"{}\")",
            config.version, CONFIG_VERSION
        )));
    }

    let mut ids = HashSet::new();
    for (index, rule) in config.rules.iter().enumerate() {
        validate_rule(index, rule)?;
        if !ids.insert(rule.id.as_str()) {
            return Err(invalid(format!("rules[{}]: duplicate id {}", index, rule.id)));
        }
    }

    if let Some(budget) = &config.token_budget {
        validate_budget(budget)?;
    }

    Ok(())
}

fn validate_rule(index: usize, rule: &PermissionRule) -> Result<(), ConfigError> {
    if rule.id.is_empty() {
        return Err(invalid(format!("rules[{}]: empty id", index)));
    }
    if rule.pattern.is_empty() {
        return Err(invalid(format!("rules[{}]: empty pattern", index)));
    }
    Pattern::new(&rule.pattern)
        .map_err(|e| invalid(format!("rules[{}]: invalid pattern {:?}: {}", index, rule.pattern, e)))?;
    Ok(())
}

fn validate_budget(budget: &TokenBudget) -> Result<(), ConfigError> {
    if budget.limit == 0 {
        return Err(invalid("tokenBudget.limit must be positive".to_string()));
    }
    for threshold in &budget.alert_thresholds {
        if !threshold.is_finite() || !(0.0..=1.0).contains(threshold) {
            return Err(invalid(format!(
                "tokenBudget.alertThresholds: {} is outside [0, 1]",
                threshold
            )));
        }
    }
    Ok(())
}

fn invalid(message: String) -> ConfigError {
    ConfigError::Invalid(message)
}
