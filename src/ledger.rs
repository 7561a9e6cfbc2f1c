//! Repeating-row collections.
//!
//! A [`Ledger`] keeps rows in insertion order and gives each one a stable
//! [`RowId`]. Positions are only a display concern: deleting by position is
//! supported for form buttons, but a stale position never corrupts the list.

use crate::error::{IntakeError, Result};
use crate::validation::{round_cents, ValidationError, ValidationIssue};
use log::{debug, warn};
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct RowId(Uuid);

impl RowId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RowId {
    fn default() -> Self {
        Self::new()
    }
}

/// Behaviour every ledger row type provides.
pub trait LedgerRow: Clone + Serialize + DeserializeOwned {
    /// Human title of the ledger, used in messages and as the export sheet name.
    const LEDGER: &'static str;

    /// Canonical column labels, in display order. Serialized rows use these keys.
    const COLUMNS: &'static [&'static str];

    /// Columns that hold numbers; grid input is coerced on these.
    const NUMERIC_COLUMNS: &'static [&'static str] = &[];

    /// Per-row rules checked on [`Ledger::append`]. Grid ledgers keep the default.
    fn validate(&self) -> Vec<ValidationIssue> {
        Vec::new()
    }

    /// Percentage this row contributes to a ledger-wide 100% ceiling, if any.
    fn share(&self) -> Option<f64> {
        None
    }

    /// Column label of the share, for messages.
    fn share_field() -> &'static str {
        "%"
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Entry<R> {
    #[serde(default)]
    pub id: RowId,
    #[serde(flatten)]
    pub row: R,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ShareStatus {
    /// Below 100%: allowed, but the form is not finished.
    Incomplete(f64),
    Complete,
    /// Above 100%: only reachable through bulk replacement.
    Exceeded(f64),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct Ledger<R> {
    entries: Vec<Entry<R>>,
}

impl<R> Default for Ledger<R> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<R: LedgerRow> Ledger<R> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_rows(rows: Vec<R>) -> Self {
        let mut ledger = Self::new();
        ledger.replace_all(rows);
        ledger
    }

    /// Validates `row` against its own rules and the running-share ceiling,
    /// then appends it. On error the ledger is left untouched.
    pub fn append(&mut self, row: R) -> std::result::Result<RowId, ValidationError> {
        let mut issues = row.validate();

        if let Some(share) = row.share() {
            let current_total = self.share_total();
            if exceeds_ceiling(current_total + share) {
                issues.push(ValidationIssue::ShareCeilingExceeded {
                    field: R::share_field(),
                    current_total,
                    attempted: share,
                });
            }
        }

        if !issues.is_empty() {
            debug!("Rejected row for '{}': {} issue(s)", R::LEDGER, issues.len());
            return Err(ValidationError {
                ledger: R::LEDGER.to_string(),
                issues,
            });
        }

        let id = RowId::new();
        self.entries.push(Entry { id, row });
        Ok(id)
    }

    /// Removes the row currently displayed at `position`.
    pub fn remove(&mut self, position: usize) -> Result<R> {
        if position >= self.entries.len() {
            return Err(IntakeError::RowIndexOutOfBounds {
                ledger: R::LEDGER.to_string(),
                position,
                len: self.entries.len(),
            });
        }
        Ok(self.entries.remove(position).row)
    }

    /// Like [`Ledger::remove`], but a stale position is a logged no-op.
    pub fn discard(&mut self, position: usize) -> Option<R> {
        match self.remove(position) {
            Ok(row) => Some(row),
            Err(e) => {
                warn!("Ignoring stale delete: {}", e);
                None
            }
        }
    }

    pub fn remove_id(&mut self, id: RowId) -> Option<R> {
        let position = self.entries.iter().position(|e| e.id == id);
        match position {
            Some(position) => Some(self.entries.remove(position).row),
            None => {
                warn!("Ignoring delete of unknown row {:?} in '{}'", id, R::LEDGER);
                None
            }
        }
    }

    /// Bulk replacement used by grid editors. Skips insert-time validation, so
    /// the share ceiling can be transiently violated; see [`Ledger::share_status`].
    pub fn replace_all(&mut self, rows: Vec<R>) {
        self.entries = rows
            .into_iter()
            .map(|row| Entry {
                id: RowId::new(),
                row,
            })
            .collect();
    }

    pub fn snapshot(&self) -> Vec<R> {
        self.entries.iter().map(|e| e.row.clone()).collect()
    }

    pub fn rows(&self) -> impl Iterator<Item = &R> {
        self.entries.iter().map(|e| &e.row)
    }

    pub fn entries(&self) -> &[Entry<R>] {
        &self.entries
    }

    pub fn get(&self, id: RowId) -> Option<&R> {
        self.entries.iter().find(|e| e.id == id).map(|e| &e.row)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn share_total(&self) -> f64 {
        self.rows().filter_map(|r| r.share()).sum()
    }

    pub fn share_status(&self) -> ShareStatus {
        let total = self.share_total();
        if exceeds_ceiling(total) {
            ShareStatus::Exceeded(round_cents(total))
        } else if total >= SHARE_CEILING - SHARE_TOLERANCE {
            ShareStatus::Complete
        } else {
            ShareStatus::Incomplete(round_cents(total))
        }
    }
}

/// Summed participation may not go past this, beyond float noise.
const SHARE_CEILING: f64 = 100.0;
const SHARE_TOLERANCE: f64 = 1e-9;

fn exceeds_ceiling(total: f64) -> bool {
    total > SHARE_CEILING + SHARE_TOLERANCE
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::require_text;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Holder {
        name: String,
        pct: f64,
    }

    impl LedgerRow for Holder {
        const LEDGER: &'static str = "Holders";
        const COLUMNS: &'static [&'static str] = &["name", "pct"];
        const NUMERIC_COLUMNS: &'static [&'static str] = &["pct"];

        fn validate(&self) -> Vec<ValidationIssue> {
            let mut issues = Vec::new();
            require_text(&mut issues, "name", &self.name);
            issues
        }

        fn share(&self) -> Option<f64> {
            Some(self.pct)
        }
    }

    fn holder(name: &str, pct: f64) -> Holder {
        Holder {
            name: name.to_string(),
            pct,
        }
    }

    #[test]
    fn test_append_respects_share_ceiling() {
        let mut ledger = Ledger::new();
        ledger.append(holder("a", 60.0)).unwrap();

        let err = ledger.append(holder("b", 50.0)).unwrap_err();
        assert_eq!(err.issues.len(), 1);
        assert_eq!(ledger.len(), 1);

        ledger.append(holder("c", 40.0)).unwrap();
        assert_eq!(ledger.share_status(), ShareStatus::Complete);
    }

    #[test]
    fn test_share_ceiling_has_no_rounding_slack() {
        let mut ledger = Ledger::new();
        ledger.append(holder("a", 60.0)).unwrap();
        assert!(ledger.append(holder("b", 40.004)).is_err());
        assert_eq!(ledger.share_total(), 60.0);

        ledger.append(holder("b", 33.33)).unwrap();
        ledger.append(holder("c", 6.67)).unwrap();
        assert_eq!(ledger.share_status(), ShareStatus::Complete);
        assert!(ledger.share_total() <= 100.0 + 1e-9);
    }

    #[test]
    fn test_append_collects_every_issue() {
        let mut ledger = Ledger::new();
        ledger.append(holder("a", 90.0)).unwrap();

        let err = ledger.append(holder(" ", 20.0)).unwrap_err();
        assert_eq!(err.issues.len(), 2);
        assert_eq!(err.ledger, "Holders");
    }

    #[test]
    fn test_share_status_thresholds() {
        let mut ledger = Ledger::new();
        assert_eq!(ledger.share_status(), ShareStatus::Incomplete(0.0));

        ledger.replace_all(vec![holder("a", 70.0), holder("b", 45.5)]);
        assert_eq!(ledger.share_status(), ShareStatus::Exceeded(115.5));
    }

    #[test]
    fn test_remove_out_of_bounds() {
        let mut ledger = Ledger::new();
        ledger.append(holder("a", 10.0)).unwrap();

        assert!(matches!(
            ledger.remove(3),
            Err(IntakeError::RowIndexOutOfBounds { position: 3, len: 1, .. })
        ));
        assert!(ledger.discard(3).is_none());
        assert_eq!(ledger.len(), 1);

        assert_eq!(ledger.remove(0).unwrap().name, "a");
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_remove_by_stable_id() {
        let mut ledger = Ledger::new();
        let first = ledger.append(holder("a", 10.0)).unwrap();
        let second = ledger.append(holder("b", 10.0)).unwrap();

        ledger.remove(0).unwrap();
        assert!(ledger.remove_id(first).is_none());
        assert_eq!(ledger.get(second).unwrap().name, "b");
        assert_eq!(ledger.remove_id(second).unwrap().name, "b");
    }

    #[test]
    fn test_serialized_entries_are_flat_row_maps() {
        let mut ledger = Ledger::new();
        ledger.append(holder("a", 10.0)).unwrap();

        let value = serde_json::to_value(&ledger).unwrap();
        let first = &value.as_array().unwrap()[0];
        assert_eq!(first["name"], "a");
        assert!(first.get("id").is_some());

        let legacy = serde_json::json!([{ "name": "x", "pct": 5.0 }]);
        let restored: Ledger<Holder> = serde_json::from_value(legacy).unwrap();
        assert_eq!(restored.snapshot(), vec![holder("x", 5.0)]);
    }
}
