//! Typing of untyped grid records.
//!
//! Grid editors hand over rows as loose JSON objects keyed by column label.
//! This is the one place where absent or blank numeric cells silently become
//! zero; everything past this boundary works on typed rows.

use crate::error::{IntakeError, Result};
use crate::ledger::LedgerRow;
use log::{debug, warn};
use serde_json::{Map, Value};
use std::collections::BTreeSet;

pub type GridRecord = Map<String, Value>;

#[derive(Debug, Default)]
pub struct IngestionReport {
    pub rows_read: usize,
    pub rows_accepted: usize,
    /// Records that could not be typed, with the reason.
    pub rejected: Vec<IntakeError>,
    /// Canonical numeric columns absent from at least one record.
    pub missing_columns: BTreeSet<String>,
    /// Columns present in the input but unknown to the ledger.
    pub ignored_columns: BTreeSet<String>,
    /// Numeric cells that were blank or absent and were read as zero.
    pub zeroed_cells: usize,
}

impl IngestionReport {
    pub fn is_clean(&self) -> bool {
        self.rejected.is_empty() && self.missing_columns.is_empty()
    }
}

/// Rewrites `text` with `.` as the only decimal separator and no grouping.
///
/// With both `.` and `,` present the last one is the decimal mark, so
/// "1.234,5" and "1,234.5" both read as 1234.5. A lone separator that
/// repeats is grouping ("1.234.567"); a single comma is a decimal mark.
/// `None` when the marks contradict each other.
fn normalize_separators(text: &str) -> Option<String> {
    let last_dot = text.rfind('.');
    let last_comma = text.rfind(',');

    let (decimal, grouping) = match (last_dot, last_comma) {
        (None, None) => return Some(text.to_string()),
        (Some(d), Some(c)) => {
            if d > c {
                ('.', ',')
            } else {
                (',', '.')
            }
        }
        (Some(_), None) => {
            if text.matches('.').count() > 1 {
                return grouped(text, '.').then(|| text.replace('.', ""));
            }
            return Some(text.to_string());
        }
        (None, Some(_)) => {
            if text.matches(',').count() > 1 {
                return grouped(text, ',').then(|| text.replace(',', ""));
            }
            return Some(text.replace(',', "."));
        }
    };

    if text.matches(decimal).count() > 1 {
        return None;
    }
    let (whole, fraction) = text.split_once(decimal)?;
    if fraction.contains(grouping) || !grouped(whole, grouping) {
        return None;
    }
    Some(format!("{}.{}", whole.replace(grouping, ""), fraction))
}

/// True when every group after the first has exactly three digits.
fn grouped(whole: &str, grouping: char) -> bool {
    whole
        .split(grouping)
        .skip(1)
        .all(|group| group.len() == 3 && group.chars().all(|c| c.is_ascii_digit()))
}

/// Reads a numeric cell. Blank cells are `Ok(None)`; text that is not a number is an error.
pub fn parse_number(value: &Value) -> std::result::Result<Option<f64>, String> {
    match value {
        Value::Null => Ok(None),
        Value::Number(n) => Ok(n.as_f64()),
        Value::Bool(b) => Ok(Some(if *b { 1.0 } else { 0.0 })),
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return Ok(None);
            }
            let normalized = normalize_separators(trimmed)
                .ok_or_else(|| format!("'{}' has ambiguous separators", s))?;
            normalized
                .parse::<f64>()
                .map(Some)
                .map_err(|_| format!("'{}' is not a number", s))
        }
        other => Err(format!("unexpected value {}", other)),
    }
}

fn normalize_record<R: LedgerRow>(
    index: usize,
    record: &GridRecord,
    report: &mut IngestionReport,
) -> Result<GridRecord> {
    let mut normalized = GridRecord::new();

    for (column, value) in record {
        if !R::COLUMNS.contains(&column.as_str()) {
            report.ignored_columns.insert(column.clone());
            continue;
        }

        if R::NUMERIC_COLUMNS.contains(&column.as_str()) {
            let number = parse_number(value).map_err(|details| IntakeError::Ingestion {
                ledger: R::LEDGER.to_string(),
                index,
                details: format!("{}: {}", column, details),
            })?;
            if number.is_none() {
                report.zeroed_cells += 1;
            }
            normalized.insert(column.clone(), Value::from(number.unwrap_or(0.0)));
            continue;
        }

        match value {
            // Leaves the field to its default.
            Value::Null => {}
            Value::String(_) => {
                normalized.insert(column.clone(), value.clone());
            }
            other => {
                normalized.insert(column.clone(), Value::String(other.to_string()));
            }
        }
    }

    for column in R::NUMERIC_COLUMNS {
        if !normalized.contains_key(*column) {
            report.missing_columns.insert(column.to_string());
            report.zeroed_cells += 1;
            normalized.insert(column.to_string(), Value::from(0.0));
        }
    }

    Ok(normalized)
}

fn type_record<R: LedgerRow>(
    index: usize,
    record: &GridRecord,
    report: &mut IngestionReport,
) -> Result<R> {
    let normalized = normalize_record::<R>(index, record, report)?;
    serde_json::from_value(Value::Object(normalized)).map_err(|e| IntakeError::Ingestion {
        ledger: R::LEDGER.to_string(),
        index,
        details: e.to_string(),
    })
}

/// Types every record it can; untypeable records are skipped and reported.
pub fn ingest_records<R: LedgerRow>(records: &[GridRecord]) -> (Vec<R>, IngestionReport) {
    let mut report = IngestionReport {
        rows_read: records.len(),
        ..Default::default()
    };
    let mut rows = Vec::with_capacity(records.len());

    for (index, record) in records.iter().enumerate() {
        match type_record::<R>(index, record, &mut report) {
            Ok(row) => rows.push(row),
            Err(e) => {
                warn!("{}", e);
                report.rejected.push(e);
            }
        }
    }

    report.rows_accepted = rows.len();

    if !report.missing_columns.is_empty() {
        warn!(
            "'{}' grid is missing column(s) {:?}; read as zero",
            R::LEDGER,
            report.missing_columns
        );
    }
    if !report.ignored_columns.is_empty() {
        debug!(
            "'{}' grid ignored column(s) {:?}",
            R::LEDGER,
            report.ignored_columns
        );
    }

    (rows, report)
}

/// Like [`ingest_records`], but the first untypeable record fails the whole batch.
pub fn ingest_records_strict<R: LedgerRow>(records: &[GridRecord]) -> Result<Vec<R>> {
    let mut report = IngestionReport::default();
    records
        .iter()
        .enumerate()
        .map(|(index, record)| type_record::<R>(index, record, &mut report))
        .collect()
}
