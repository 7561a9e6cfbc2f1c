//! Month-based rollups of the sales and purchases grids.

use crate::ledger::Ledger;
use crate::schema::{Activity, Month, MonthlyLine, MonthlyRow, YearAmounts};
use crate::utils::{offset_month_date, trailing_month_starts};
use chrono::NaiveDate;
use log::{debug, warn};
use std::collections::HashSet;

pub const WINDOW_MONTHS: usize = 12;

pub const WINDOW_CATEGORIES: [&str; 4] = [
    "Ventas Mercado Interno",
    "Ventas Mercado Externo",
    "Total Ventas",
    "Compras",
];

/// Keeps the first row for each month label, dropping later duplicates.
pub fn dedup_months<R: MonthlyLine>(ledger: &Ledger<R>) -> Vec<&MonthlyRow> {
    let mut seen: HashSet<Month> = HashSet::new();
    let mut kept = Vec::new();

    for row in ledger.rows().map(|r| r.line()) {
        if seen.insert(row.month) {
            kept.push(row);
        } else {
            warn!(
                "Dropping duplicate '{}' row from '{}' before rollup",
                row.month,
                R::LEDGER
            );
        }
    }

    kept
}

/// A month × category matrix. Every (month, category) cell is present.
#[derive(Debug, Clone, PartialEq)]
pub struct MonthlyPivot {
    pub months: Vec<NaiveDate>,
    pub categories: Vec<String>,
    /// `values[month][category]`
    pub values: Vec<Vec<f64>>,
}

impl MonthlyPivot {
    pub fn value(&self, month: NaiveDate, category: &str) -> Option<f64> {
        let m = self.months.iter().position(|d| *d == month)?;
        let c = self.categories.iter().position(|k| k == category)?;
        self.values.get(m)?.get(c).copied()
    }

    pub fn column(&self, category: &str) -> Vec<f64> {
        match self.categories.iter().position(|k| k == category) {
            Some(c) => self.values.iter().map(|row| row[c]).collect(),
            None => vec![0.0; self.months.len()],
        }
    }
}

/// Per-month amounts of `rows` over `window`, zero where nothing falls.
fn window_amounts(today: NaiveDate, rows: &[&MonthlyRow], window: &[NaiveDate]) -> Vec<f64> {
    let mut amounts = vec![0.0; window.len()];

    for row in rows {
        for offset in YearAmounts::OFFSETS {
            let Some(date) = offset_month_date(today, offset, row.month) else {
                continue;
            };
            if let Some(slot) = window.iter().position(|d| *d == date) {
                amounts[slot] += row.amounts.by_offset(offset);
            }
        }
    }

    amounts
}

/// Trailing 12-month view of sales and purchases ending with the month of `today`.
pub fn rolling_window<D, E, P>(
    today: NaiveDate,
    domestic: &Ledger<D>,
    export: &Ledger<E>,
    purchases: &Ledger<P>,
) -> MonthlyPivot
where
    D: MonthlyLine,
    E: MonthlyLine,
    P: MonthlyLine,
{
    let window = trailing_month_starts(today, WINDOW_MONTHS);

    let domestic = window_amounts(today, &dedup_months(domestic), &window);
    let export = window_amounts(today, &dedup_months(export), &window);
    let purchases = window_amounts(today, &dedup_months(purchases), &window);

    let values: Vec<Vec<f64>> = (0..window.len())
        .map(|i| {
            vec![
                domestic[i],
                export[i],
                domestic[i] + export[i],
                purchases[i],
            ]
        })
        .collect();

    debug!(
        "Built {}-month window ending {}",
        window.len(),
        window.last().map(|d| d.to_string()).unwrap_or_default()
    );

    MonthlyPivot {
        months: window,
        categories: WINDOW_CATEGORIES.iter().map(|c| c.to_string()).collect(),
        values,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SectorTotal {
    pub sector: &'static str,
    pub amounts: YearAmounts,
}

/// Sums the four year columns per "Tipo", in the order the form lists sectors.
/// Only sectors with at least one row are reported.
pub fn sector_totals<R: MonthlyLine>(ledger: &Ledger<R>) -> Vec<SectorTotal> {
    Activity::SECTOR_LABELS
        .into_iter()
        .filter_map(|sector| {
            let mut rows = ledger
                .rows()
                .map(|r| r.line())
                .filter(|line| line.activity.sector_label() == sector)
                .peekable();
            rows.peek()?;
            let mut amounts = YearAmounts::default();
            for line in rows {
                amounts.add(&line.amounts);
            }
            Some(SectorTotal { sector, amounts })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{AgroBranch, DomesticSale, ExportSale, Purchase};

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 4, 18).unwrap()
    }

    fn sale(month: Month, activity: Activity, amounts: YearAmounts) -> DomesticSale {
        DomesticSale(MonthlyRow::new(month, activity, amounts))
    }

    #[test]
    fn test_window_is_complete_and_zero_filled() {
        let domestic = Ledger::from_rows(vec![
            sale(Month::Enero, Activity::Industry, YearAmounts::new(100.0, 0.0, 0.0, 0.0)),
            sale(Month::Marzo, Activity::Industry, YearAmounts::new(50.0, 0.0, 0.0, 0.0)),
        ]);
        let export: Ledger<ExportSale> = Ledger::new();
        let purchases: Ledger<Purchase> = Ledger::new();

        let pivot = rolling_window(today(), &domestic, &export, &purchases);
        assert_eq!(pivot.months.len(), 12);
        assert_eq!(pivot.categories.len(), 4);
        assert!(pivot.values.iter().all(|row| row.len() == 4));

        let jan = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        let mar = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();
        assert_eq!(pivot.value(jan, "Ventas Mercado Interno"), Some(100.0));
        assert_eq!(pivot.value(mar, "Total Ventas"), Some(50.0));

        let zero_months = pivot
            .column("Ventas Mercado Interno")
            .iter()
            .filter(|v| **v == 0.0)
            .count();
        assert_eq!(zero_months, 10);
    }

    #[test]
    fn test_window_uses_previous_year_column() {
        // Diciembre of "Año 1" is December 2024, inside the window.
        let domestic = Ledger::from_rows(vec![sale(
            Month::Diciembre,
            Activity::Commerce,
            YearAmounts::new(999.0, 70.0, 5.0, 0.0),
        )]);
        let export: Ledger<ExportSale> = Ledger::new();
        let purchases: Ledger<Purchase> = Ledger::new();

        let pivot = rolling_window(today(), &domestic, &export, &purchases);
        let dec = NaiveDate::from_ymd_opt(2024, 12, 1).unwrap();
        assert_eq!(pivot.value(dec, "Ventas Mercado Interno"), Some(70.0));
        let total: f64 = pivot.column("Ventas Mercado Interno").iter().sum();
        assert_eq!(total, 70.0);
    }

    #[test]
    fn test_dedup_keeps_first_month() {
        let ledger = Ledger::from_rows(vec![
            sale(Month::Enero, Activity::Industry, YearAmounts::new(1.0, 0.0, 0.0, 0.0)),
            sale(Month::Febrero, Activity::Industry, YearAmounts::default()),
            sale(Month::Enero, Activity::Commerce, YearAmounts::new(2.0, 0.0, 0.0, 0.0)),
        ]);

        let kept = dedup_months(&ledger);
        assert_eq!(kept.len(), 2);
        let januaries: Vec<_> = kept.iter().filter(|r| r.month == Month::Enero).collect();
        assert_eq!(januaries.len(), 1);
        assert_eq!(januaries[0].amounts.current, 1.0);
    }

    #[test]
    fn test_sector_totals() {
        let ledger = Ledger::from_rows(vec![
            sale(
                Month::Enero,
                Activity::Agro(AgroBranch::Agriculture),
                YearAmounts::new(1.0, 2.0, 3.0, 4.0),
            ),
            sale(
                Month::Febrero,
                Activity::Agro(AgroBranch::Dairy),
                YearAmounts::new(1.0, 1.0, 1.0, 1.0),
            ),
            sale(Month::Marzo, Activity::Services, YearAmounts::new(10.0, 0.0, 0.0, 0.0)),
        ]);

        let totals = sector_totals(&ledger);
        assert_eq!(totals.len(), 2);
        assert_eq!(totals[0].sector, "AGROPECUARIO");
        assert_eq!(totals[0].amounts, YearAmounts::new(2.0, 3.0, 4.0, 5.0));
        assert_eq!(totals[1].sector, "SERVICIOS");
    }
}
