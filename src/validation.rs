//! Row-level validation rules shared by the form-based ledgers.
//!
//! Every check pushes into a `Vec<ValidationIssue>` instead of returning early so
//! that a rejected insertion reports all of its problems at once.

use log::error;
use regex::Regex;
use std::fmt;
use std::sync::OnceLock;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq)]
pub enum ValidationIssue {
    MissingField {
        field: &'static str,
    },
    InvalidTaxId {
        field: &'static str,
        value: String,
    },
    InvalidEmail {
        value: String,
    },
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },
    ShareCeilingExceeded {
        field: &'static str,
        current_total: f64,
        attempted: f64,
    },
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationIssue::MissingField { field } => {
                write!(f, "'{}' is required", field)
            }
            ValidationIssue::InvalidTaxId { field, value } => {
                write!(f, "'{}' must have exactly 11 digits (got '{}')", field, value)
            }
            ValidationIssue::InvalidEmail { value } => {
                write!(f, "'{}' does not look like an e-mail address", value)
            }
            ValidationIssue::OutOfRange {
                field,
                value,
                min,
                max,
            } => write!(f, "'{}' must be between {} and {} (got {})", field, min, max, value),
            ValidationIssue::ShareCeilingExceeded {
                field,
                current_total,
                attempted,
            } => write!(
                f,
                "sum of '{}' cannot exceed 100% (already {:.2}%, adding {:.2}%)",
                field, current_total, attempted
            ),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
#[error("Row rejected by ledger '{ledger}': {}", format_issues(.issues))]
pub struct ValidationError {
    pub ledger: String,
    pub issues: Vec<ValidationIssue>,
}

fn format_issues(issues: &[ValidationIssue]) -> String {
    issues
        .iter()
        .map(|i| i.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Compiles `source` once. A pattern that fails to compile matches nothing.
fn compiled(cell: &'static OnceLock<Option<Regex>>, source: &str) -> Option<&'static Regex> {
    cell.get_or_init(|| match Regex::new(source) {
        Ok(re) => Some(re),
        Err(e) => {
            error!("Pattern '{}' does not compile: {}", source, e);
            None
        }
    })
    .as_ref()
}

fn pattern_matches(cell: &'static OnceLock<Option<Regex>>, source: &str, value: &str) -> bool {
    compiled(cell, source).is_some_and(|re| re.is_match(value))
}

static TAX_ID_RE: OnceLock<Option<Regex>> = OnceLock::new();
static EMAIL_RE: OnceLock<Option<Regex>> = OnceLock::new();

pub fn is_valid_tax_id(value: &str) -> bool {
    pattern_matches(&TAX_ID_RE, r"^\d{11}$", value.trim())
}

fn is_valid_email(value: &str) -> bool {
    pattern_matches(&EMAIL_RE, r"^[^@\s]+@[^@\s]+\.[^@\s]+$", value)
}

pub fn require_text(issues: &mut Vec<ValidationIssue>, field: &'static str, value: &str) {
    if value.trim().is_empty() {
        issues.push(ValidationIssue::MissingField { field });
    }
}

pub fn require_tax_id(issues: &mut Vec<ValidationIssue>, field: &'static str, value: &str) {
    if !is_valid_tax_id(value) {
        issues.push(ValidationIssue::InvalidTaxId {
            field,
            value: value.trim().to_string(),
        });
    }
}

/// Empty addresses are accepted; only a non-empty malformed one is an issue.
pub fn optional_email(issues: &mut Vec<ValidationIssue>, value: &str) {
    let value = value.trim();
    if !value.is_empty() && !is_valid_email(value) {
        issues.push(ValidationIssue::InvalidEmail {
            value: value.to_string(),
        });
    }
}

pub fn require_range(
    issues: &mut Vec<ValidationIssue>,
    field: &'static str,
    value: f64,
    min: f64,
    max: f64,
) {
    if !value.is_finite() || value < min || value > max {
        issues.push(ValidationIssue::OutOfRange {
            field,
            value,
            min,
            max,
        });
    }
}

/// Rounds to cents so that percentage sums like 33.33 + 33.33 + 33.34 land on 100.00.
pub fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
