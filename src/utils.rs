use crate::schema::Month;
use chrono::{Datelike, NaiveDate};

/// First day of the given calendar month, or `None` for an invalid month.
pub fn month_start(year: i32, month: u32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, 1)
}

pub fn prev_month_start(date: NaiveDate) -> Option<NaiveDate> {
    let (year, month) = if date.month() == 1 {
        (date.year() - 1, 12)
    } else {
        (date.year(), date.month() - 1)
    };
    month_start(year, month)
}

/// Maps a (year offset, month label) pair of a monthly grid to a calendar month.
///
/// Offset 0 is the year of `today`, offset 1 the year before, and so on.
pub fn offset_month_date(today: NaiveDate, offset: u32, month: Month) -> Option<NaiveDate> {
    month_start(today.year() - offset as i32, month.number())
}

/// The `count` month starts ending with the month containing `today`, oldest first.
pub fn trailing_month_starts(today: NaiveDate, count: usize) -> Vec<NaiveDate> {
    let mut months = Vec::with_capacity(count);
    let mut current = month_start(today.year(), today.month());

    while let Some(date) = current {
        if months.len() == count {
            break;
        }
        months.push(date);
        current = prev_month_start(date);
    }

    months.reverse();
    months
}

/// Column label of a pivot row, e.g. "Marzo 2025".
pub fn month_year_label(date: NaiveDate) -> String {
    match Month::from_number(date.month()) {
        Some(month) => format!("{} {}", month.label(), date.year()),
        None => date.format("%m/%Y").to_string(),
    }
}
