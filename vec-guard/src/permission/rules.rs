//! Rule matching
//!
//! Rules are scanned in stored order and the first live match wins. There is
//! no ranking between a deny rule and a more specific allow rule listed after
//! it.

use chrono::{DateTime, Utc};
use glob::{MatchOptions, Pattern};
use vec_guard_api::{new_rule_id, PermissionAction, PermissionRule, Verbosity};

/// `*` and `?` stay inside one path segment; `**` spans segments
const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: true,
};

/// Whether a rule had expired at `now`
pub fn is_expired(rule: &PermissionRule, now: DateTime<Utc>) -> bool {
    rule.is_expired_at(now)
}

/// Whether `target` matches a glob pattern
///
/// An unparsable pattern matches nothing.
pub fn glob_matches(pattern: &str, target: &str) -> bool {
    match Pattern::new(pattern) {
        Ok(glob) => glob.matches_with(target, MATCH_OPTIONS),
        Err(e) => {
            tracing::warn!(pattern, error = %e, "Ignoring rule with invalid glob");
            false
        }
    }
}

/// First non-expired rule for `action` whose pattern matches `target`
pub fn match_rule<'a>(
    action: PermissionAction,
    target: &str,
    rules: &'a [PermissionRule],
    now: DateTime<Utc>,
) -> Option<&'a PermissionRule> {
    rules
        .iter()
        .filter(|rule| !is_expired(rule, now))
        .find(|rule| rule.action == action && glob_matches(&rule.pattern, target))
}

/// A rule before it is given an id and creation time
#[derive(Debug, Clone, PartialEq)]
pub struct NewRule {
    pub action: PermissionAction,
    pub pattern: String,
    pub approved: bool,
    pub verbosity: Verbosity,
    pub expires_at: Option<DateTime<Utc>>,
}

impl NewRule {
    pub fn allow(action: PermissionAction, pattern: impl Into<String>) -> Self {
        Self {
            action,
            pattern: pattern.into(),
            approved: true,
            verbosity: Verbosity::Minimal,
            expires_at: None,
        }
    }

    pub fn deny(action: PermissionAction, pattern: impl Into<String>) -> Self {
        Self {
            approved: false,
            ..Self::allow(action, pattern)
        }
    }

    pub fn expires_at(mut self, at: DateTime<Utc>) -> Self {
        self.expires_at = Some(at);
        self
    }

    pub fn with_verbosity(mut self, verbosity: Verbosity) -> Self {
        self.verbosity = verbosity;
        self
    }

    /// Stamp a fresh id and the current time
    pub fn into_rule(self) -> PermissionRule {
        PermissionRule {
            id: new_rule_id(),
            action: self.action,
            pattern: self.pattern,
            approved: self.approved,
            verbosity: self.verbosity,
            created_at: Utc::now(),
            expires_at: self.expires_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_glob_semantics() {
        assert!(glob_matches("/tmp/*", "/tmp/x.txt"));
        assert!(!glob_matches("/tmp/*", "/tmp/nested/x.txt"));
        assert!(glob_matches("/tmp/**", "/tmp/nested/x.txt"));
        assert!(glob_matches("/tmp/**/*.txt", "/tmp/a/b/x.txt"));
        assert!(!glob_matches("/tmp/*", "/tmp/.hidden"));
        assert!(glob_matches("/tmp/.*", "/tmp/.hidden"));
        assert!(glob_matches("src/?.rs", "src/a.rs"));
        assert!(glob_matches("https://api.example.com/*", "https://api.example.com/v1"));
        assert!(!glob_matches("[", "["));
    }

    #[test]
    fn test_first_match_wins() {
        let now = Utc::now();
        let rules = vec![
            PermissionRule::deny(PermissionAction::FsRead, "/etc/**"),
            PermissionRule::allow(PermissionAction::FsRead, "/etc/hosts"),
        ];
        let matched = match_rule(PermissionAction::FsRead, "/etc/hosts", &rules, now).unwrap();
        assert_eq!(matched.id, rules[0].id);
        assert!(!matched.approved);
    }

    #[test]
    fn test_action_must_match() {
        let now = Utc::now();
        let rules = vec![PermissionRule::allow(PermissionAction::FsRead, "**")];
        assert!(match_rule(PermissionAction::FsWrite, "/tmp/x", &rules, now).is_none());
        assert!(match_rule(PermissionAction::FsRead, "/tmp/x", &rules, now).is_some());
    }

    #[test]
    fn test_expired_rules_are_skipped() {
        let now = Utc::now();
        let rules = vec![
            PermissionRule::deny(PermissionAction::FsRead, "/tmp/*")
                .expires_at(now - Duration::hours(1)),
            PermissionRule::allow(PermissionAction::FsRead, "/tmp/*"),
        ];
        let matched = match_rule(PermissionAction::FsRead, "/tmp/x", &rules, now).unwrap();
        assert_eq!(matched.id, rules[1].id);
        assert!(is_expired(&rules[0], now));

        // Same list, evaluated before the expiry
        let earlier = now - Duration::hours(2);
        let matched = match_rule(PermissionAction::FsRead, "/tmp/x", &rules, earlier).unwrap();
        assert_eq!(matched.id, rules[0].id);
    }

    #[test]
    fn test_new_rule_stamping() {
        let a = NewRule::allow(PermissionAction::EgressNetwork, "https://*").into_rule();
        let b = NewRule::deny(PermissionAction::EgressNetwork, "https://*")
            .with_verbosity(Verbosity::Detailed)
            .into_rule();
        assert_ne!(a.id, b.id);
        assert!(a.approved);
        assert!(!b.approved);
        assert_eq!(b.verbosity, Verbosity::Detailed);
    }
}
