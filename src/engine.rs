//! Recomputes every summary table from the current ledgers.
//!
//! Nothing here mutates the session and nothing is cached: summaries are
//! rebuilt on every export so they can never drift from the rows.

use crate::agro::{CampaignSet, CropResult, HerdKind, HerdMatrix, HerdTotals, PlanActivity};
use crate::debt::{summarize, DebtSummary};
use crate::ledger::{Ledger, LedgerRow, ShareStatus};
use crate::monthly::{rolling_window, sector_totals, MonthlyPivot, SectorTotal};
use crate::schema::{
    ControllingCompany, DomesticSale, ExportSale, LinkedCompany, MonthlyLine, Purchase, Shareholder,
};
use crate::session::{PersistableState, Section};
use chrono::NaiveDate;
use log::{debug, warn};
use std::borrow::Cow;

#[derive(Debug, Clone, PartialEq)]
pub struct LedgerSectors {
    pub ledger: &'static str,
    pub sectors: Vec<SectorTotal>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LedgerShare {
    pub ledger: &'static str,
    pub status: ShareStatus,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionSummary {
    pub debts: DebtSummary,
    pub sales_window: MonthlyPivot,
    /// Whether any monthly ledger has rows; the window is all zeros otherwise.
    pub has_monthly_rows: bool,
    pub sectors: Vec<LedgerSectors>,
    pub guarantee_total: f64,
    pub shares: Vec<LedgerShare>,
    pub crops: Vec<CropResult>,
    pub herds: Vec<(HerdKind, HerdTotals)>,
    pub plan_totals: Vec<(PlanActivity, Vec<(String, f64)>)>,
}

impl SessionSummary {
    pub fn share(&self, ledger: &str) -> Option<ShareStatus> {
        self.shares
            .iter()
            .find(|s| s.ledger == ledger)
            .map(|s| s.status)
    }

    pub fn sectors_of(&self, ledger: &str) -> &[SectorTotal] {
        self.sectors
            .iter()
            .find(|s| s.ledger == ledger)
            .map(|s| s.sectors.as_slice())
            .unwrap_or(&[])
    }

    pub fn herd(&self, kind: HerdKind) -> Option<&HerdTotals> {
        self.herds.iter().find(|(k, _)| *k == kind).map(|(_, t)| t)
    }
}

fn ledger_of<R: LedgerRow>(section: &Section<Ledger<R>>) -> Cow<'_, Ledger<R>> {
    section.value_or_default()
}

fn share_of<R: LedgerRow>(section: &Section<Ledger<R>>) -> LedgerShare {
    let status = ledger_of(section).share_status();
    if let ShareStatus::Exceeded(total) = status {
        warn!("'{}' shares add up to {}%", R::LEDGER, total);
    }
    LedgerShare {
        ledger: R::LEDGER,
        status,
    }
}

fn sectors_of<R: MonthlyLine>(section: &Section<Ledger<R>>) -> LedgerSectors {
    LedgerSectors {
        ledger: R::LEDGER,
        sectors: sector_totals(&ledger_of(section)),
    }
}

pub struct RollupEngine {
    today: NaiveDate,
}

impl RollupEngine {
    /// `today` anchors the trailing sales window.
    pub fn new(today: NaiveDate) -> Self {
        Self { today }
    }

    pub fn today(&self) -> NaiveDate {
        self.today
    }

    pub fn summarize(&self, state: &PersistableState) -> SessionSummary {
        let debts = summarize(
            &ledger_of(&state.bancos),
            &ledger_of(&state.mercado),
            &ledger_of(&state.deudas_comerciales),
        );

        let domestic = ledger_of(&state.ventas_interno);
        let export = ledger_of(&state.ventas_externo);
        let purchases = ledger_of(&state.compras);
        let sales_window = rolling_window(self.today, &domestic, &export, &purchases);
        let has_monthly_rows = !(domestic.is_empty() && export.is_empty() && purchases.is_empty());

        let sectors = vec![
            sectors_of::<DomesticSale>(&state.ventas_interno),
            sectors_of::<ExportSale>(&state.ventas_externo),
            sectors_of::<Purchase>(&state.compras),
        ];

        let guarantee_total = state
            .avales
            .get()
            .map(|l| l.rows().map(|g| g.amount).sum::<f64>())
            .unwrap_or(0.0);

        let shares = vec![
            share_of::<Shareholder>(&state.filiatorios),
            share_of::<ControllingCompany>(&state.empresas_controlantes),
            share_of::<LinkedCompany>(&state.empresas_vinculadas),
        ];

        let crops = state
            .agricultura_por_campania
            .get()
            .map(CampaignSet::results)
            .unwrap_or_default();

        let herds = HerdKind::ALL
            .into_iter()
            .map(|kind| {
                let matrix = state.herd(kind).value_or_else(|| HerdMatrix::new(kind));
                (kind, matrix.totals())
            })
            .collect();

        let plan_totals = state
            .planes_guardados_por_actividad
            .get()
            .map(|plans| {
                plans
                    .iter()
                    .map(|(activity, plan)| (*activity, plan.annual_totals()))
                    .collect()
            })
            .unwrap_or_default();

        debug!(
            "Summarized session: {} crop result(s), guarantee total {}",
            crops.len(),
            guarantee_total
        );

        SessionSummary {
            debts,
            sales_window,
            has_monthly_rows,
            sectors,
            guarantee_total,
            shares,
            crops,
            herds,
            plan_totals,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agro::{CampaignSlot, CropIndicator};
    use crate::schema::{
        Activity, CommercialDebt, Currency, Guarantee, Month, MonthlyRow, YearAmounts,
    };

    fn engine() -> RollupEngine {
        RollupEngine::new(NaiveDate::from_ymd_opt(2025, 4, 18).unwrap())
    }

    #[test]
    fn test_empty_state_summarizes_to_zero() {
        let summary = engine().summarize(&PersistableState::default());

        let total = summary.debts.total.currency(Currency::Ars);
        assert_eq!(total.total, 0.0);
        assert_eq!(total.weighted_rate, 0.0);
        assert_eq!(summary.sales_window.months.len(), 12);
        assert!(!summary.has_monthly_rows);
        assert!(summary.sectors_of("Ventas Interno").is_empty());
        assert_eq!(summary.guarantee_total, 0.0);
        assert_eq!(summary.share("Filiatorios"), Some(ShareStatus::Incomplete(0.0)));
        assert!(summary.crops.is_empty());
        assert_eq!(summary.herd(HerdKind::Dairy), Some(&HerdTotals::default()));
        assert!(summary.plan_totals.is_empty());
    }

    #[test]
    fn test_summary_reflects_ledgers() {
        let mut state = PersistableState::default();
        state.deudas_comerciales.set(Ledger::from_rows(vec![
            CommercialDebt {
                amount: 100.0,
                rate: 10.0,
                currency: Currency::Ars,
                ..Default::default()
            },
            CommercialDebt {
                amount: 300.0,
                rate: 20.0,
                currency: Currency::Ars,
                ..Default::default()
            },
        ]));
        state.avales.set(Ledger::from_rows(vec![
            Guarantee::new("Comercial", "", 1000.0, "Prenda", ""),
            Guarantee::new("Otros", "Aduana", 500.0, "Hipoteca", ""),
        ]));
        state.ventas_interno.set(Ledger::from_rows(vec![DomesticSale(MonthlyRow::new(
            Month::Enero,
            Activity::Industry,
            YearAmounts::new(10.0, 20.0, 0.0, 0.0),
        ))]));
        state.filiatorios.set(Ledger::from_rows(vec![
            Shareholder::new("Ana", "20111111112", 70.0),
            Shareholder::new("Luis", "20222222223", 30.0),
        ]));

        let mut campaigns = CampaignSet::default();
        let current = campaigns.slot_mut(CampaignSlot::Current);
        current
            .set("Soja", CropIndicator::AdministeredHectares, 100.0)
            .unwrap();
        state.agricultura_por_campania.set(campaigns);

        state.herd_mut(HerdKind::Breeding).set("Propias", "Vacas", 50.0).unwrap();

        let summary = engine().summarize(&state);
        let commercial = summary.debts.commercial.currency(Currency::Ars);
        assert_eq!(commercial.total, 400.0);
        assert!((commercial.weighted_rate - 17.5).abs() < 1e-9);
        assert_eq!(summary.guarantee_total, 1500.0);
        assert!(summary.has_monthly_rows);
        assert_eq!(summary.sectors_of("Ventas Interno")[0].sector, "INDUSTRIA");
        assert_eq!(summary.share("Filiatorios"), Some(ShareStatus::Complete));
        assert_eq!(summary.crops.len(), 27);
        assert_eq!(summary.herd(HerdKind::Breeding).unwrap().own_heads, 50.0);
    }
}
