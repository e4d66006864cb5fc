//! Detector table for credentials and personal data
//!
//! Detectors are data, not code: adding one means adding a row.

use once_cell::sync::Lazy;
use regex::Regex;
use vec_guard_api::Severity;

/// Which scan category a detector belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectorCategory {
    Credential,
    Pii,
}

/// A named detection rule
#[derive(Debug)]
pub struct SecretPattern {
    pub name: &'static str,
    pub category: DetectorCategory,
    pub severity: Severity,
    pub regex: Regex,
    /// Extra check a raw match must pass (for rules the regex engine
    /// cannot express)
    pub validator: Option<fn(&str) -> bool>,
}

impl SecretPattern {
    /// Whether a raw match is accepted by this detector
    pub fn accepts(&self, matched: &str) -> bool {
        self.validator.map_or(true, |validate| validate(matched))
    }
}

struct PatternDef {
    name: &'static str,
    category: DetectorCategory,
    severity: Severity,
    pattern: &'static str,
    validator: Option<fn(&str) -> bool>,
}

static PATTERN_DEFS: &[PatternDef] = &[
    // Credentials
    PatternDef {
        name: "AWS_ACCESS_KEY",
        category: DetectorCategory::Credential,
        severity: Severity::Critical,
        pattern: r"AKIA[0-9A-Z]{16}",
        validator: None,
    },
    PatternDef {
        name: "AWS_SECRET_KEY",
        category: DetectorCategory::Credential,
        severity: Severity::Critical,
        pattern: r"(?i)(?:aws_secret_access_key|secret_key)\s*[=:]\s*[A-Za-z0-9/+=]{40}",
        validator: None,
    },
    PatternDef {
        name: "GITHUB_TOKEN",
        category: DetectorCategory::Credential,
        severity: Severity::Critical,
        pattern: r"gh[pousr]_[A-Za-z0-9]{36,}",
        validator: None,
    },
    PatternDef {
        name: "GITHUB_PAT",
        category: DetectorCategory::Credential,
        severity: Severity::Critical,
        pattern: r"github_pat_[A-Za-z0-9]{22}_[A-Za-z0-9]{59}",
        validator: None,
    },
    PatternDef {
        name: "PRIVATE_KEY",
        category: DetectorCategory::Credential,
        severity: Severity::Critical,
        pattern: r"-----BEGIN (?:RSA|OPENSSH|EC|DSA|PGP) PRIVATE KEY-----",
        validator: None,
    },
    PatternDef {
        name: "JWT",
        category: DetectorCategory::Credential,
        severity: Severity::High,
        pattern: r"eyJ[A-Za-z0-9_-]{10,}\.[A-Za-z0-9_-]{10,}\.[A-Za-z0-9_-]{10,}",
        validator: None,
    },
    PatternDef {
        name: "GENERIC_API_KEY",
        category: DetectorCategory::Credential,
        severity: Severity::High,
        pattern: r#"(?i)(?:api[_-]?key|apikey)\s*[=:]\s*['"]?[A-Za-z0-9]{20,}['"]?"#,
        validator: None,
    },
    PatternDef {
        name: "GENERIC_SECRET",
        category: DetectorCategory::Credential,
        severity: Severity::High,
        pattern: r#"(?i)(?:secret|password|passwd|pwd)\s*[=:]\s*['"]?[^\s'"]{8,}['"]?"#,
        validator: None,
    },
    PatternDef {
        name: "SLACK_TOKEN",
        category: DetectorCategory::Credential,
        severity: Severity::High,
        pattern: r"xox[baprs]-[0-9]{10,}-[A-Za-z0-9-]+",
        validator: None,
    },
    PatternDef {
        name: "STRIPE_KEY",
        category: DetectorCategory::Credential,
        severity: Severity::Critical,
        pattern: r"sk_(?:test|live)_[A-Za-z0-9]{24,}",
        validator: None,
    },
    // Personal data
    PatternDef {
        name: "EMAIL",
        category: DetectorCategory::Pii,
        severity: Severity::Medium,
        pattern: r"[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}",
        validator: None,
    },
    PatternDef {
        name: "PHONE_US",
        category: DetectorCategory::Pii,
        severity: Severity::Medium,
        pattern: r"\b[0-9]{3}[-.]?[0-9]{3}[-.]?[0-9]{4}\b",
        validator: None,
    },
    PatternDef {
        name: "SSN",
        category: DetectorCategory::Pii,
        severity: Severity::Critical,
        pattern: r"\b[0-9]{3}-?[0-9]{2}-?[0-9]{4}\b",
        validator: Some(is_plausible_ssn),
    },
    PatternDef {
        name: "IP_ADDRESS",
        category: DetectorCategory::Pii,
        severity: Severity::Medium,
        pattern: r"\b[0-9]{1,3}\.[0-9]{1,3}\.[0-9]{1,3}\.[0-9]{1,3}\b",
        validator: None,
    },
];

/// Area 000, 666 and 9xx, group 00 and serial 0000 are never issued
fn is_plausible_ssn(matched: &str) -> bool {
    let digits: String = matched.chars().filter(char::is_ascii_digit).collect();
    if digits.len() != 9 {
        return false;
    }
    let (area, rest) = digits.split_at(3);
    let (group, serial) = rest.split_at(2);
    area != "000" && area != "666" && !area.starts_with('9') && group != "00" && serial != "0000"
}

static PATTERNS: Lazy<Vec<SecretPattern>> = Lazy::new(|| {
    PATTERN_DEFS
        .iter()
        .filter_map(|def| match Regex::new(def.pattern) {
            Ok(regex) => Some(SecretPattern {
                name: def.name,
                category: def.category,
                severity: def.severity,
                regex,
                validator: def.validator,
            }),
            Err(e) => {
                tracing::error!(detector = def.name, error = %e, "Invalid detector pattern");
                None
            }
        })
        .collect()
});

/// All detectors, in table order
pub fn all_patterns() -> &'static [SecretPattern] {
    &PATTERNS
}

/// Detectors of one category, in table order
pub fn patterns_in(category: DetectorCategory) -> impl Iterator<Item = &'static SecretPattern> {
    PATTERNS.iter().filter(move |p| p.category == category)
}

/// Severity of a detector by name (`HIGH_ENTROPY` included)
pub fn severity_of(name: &str) -> Option<Severity> {
    if name == super::scanner::HIGH_ENTROPY {
        return Some(Severity::High);
    }
    PATTERNS.iter().find(|p| p.name == name).map(|p| p.severity)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_pattern_compiles() {
        assert_eq!(all_patterns().len(), PATTERN_DEFS.len());
    }

    #[test]
    fn test_category_order() {
        let names: Vec<_> = patterns_in(DetectorCategory::Pii).map(|p| p.name).collect();
        assert_eq!(names, vec!["EMAIL", "PHONE_US", "SSN", "IP_ADDRESS"]);
        assert_eq!(patterns_in(DetectorCategory::Credential).count(), 10);
    }

    #[test]
    fn test_ssn_validator() {
        assert!(is_plausible_ssn("123-45-6789"));
        assert!(is_plausible_ssn("123456789"));
        assert!(!is_plausible_ssn("000-45-6789"));
        assert!(!is_plausible_ssn("666-45-6789"));
        assert!(!is_plausible_ssn("912-45-6789"));
        assert!(!is_plausible_ssn("123-00-6789"));
        assert!(!is_plausible_ssn("123-45-0000"));
    }

    #[test]
    fn test_severity_lookup() {
        assert_eq!(severity_of("AWS_ACCESS_KEY"), Some(Severity::Critical));
        assert_eq!(severity_of("EMAIL"), Some(Severity::Medium));
        assert_eq!(severity_of("HIGH_ENTROPY"), Some(Severity::High));
        assert_eq!(severity_of("NOPE"), None);
    }
}
