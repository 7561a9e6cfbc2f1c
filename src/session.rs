//! The applicant session: business state that is persisted, and widget-only
//! state that never is.

use crate::agro::{
    CampaignSet, ForageRow, HerdKind, HerdMatrix, IndexTable, LeasedField, OtherActivity,
    OwnField, PlanActivity, SalesPlan, ThirdPartyCattle,
};
use crate::error::{IntakeError, Result};
use crate::ingestion::{ingest_records, GridRecord, IngestionReport};
use crate::ledger::{Ledger, LedgerRow};
use crate::schema::{
    AnswerValue, BankDebt, BankReference, CommercialDebt, Competitor, ControllingCompany,
    Customer, DiscountDrawer, DomesticSale, ExportSale, Guarantee, LinkedCompany, MarketDebt,
    Purchase, Shareholder, Supplier,
};
use log::{debug, info};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;

/// An 11-digit tax identifier. The only input used to address stored progress.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ApplicantId(String);

impl ApplicantId {
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        if trimmed.len() == 11 && trimmed.bytes().all(|b| b.is_ascii_digit()) {
            Ok(Self(trimmed.to_string()))
        } else {
            Err(IntakeError::InvalidApplicantId(raw.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ApplicantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A piece of business state that is absent until the applicant first touches it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct Section<T>(Option<T>);

impl<T> Default for Section<T> {
    fn default() -> Self {
        Self(None)
    }
}

impl<T> Section<T> {
    pub fn new(value: T) -> Self {
        Self(Some(value))
    }

    pub fn is_present(&self) -> bool {
        self.0.is_some()
    }

    pub fn is_absent(&self) -> bool {
        self.0.is_none()
    }

    pub fn get(&self) -> Option<&T> {
        self.0.as_ref()
    }

    pub fn set(&mut self, value: T) {
        self.0 = Some(value);
    }

    pub fn take(&mut self) -> Option<T> {
        self.0.take()
    }

    pub fn get_or_insert_with(&mut self, f: impl FnOnce() -> T) -> &mut T {
        self.0.get_or_insert_with(f)
    }

    /// Copies `other` in only when this section is absent. Returns whether it did.
    fn fill_from(&mut self, other: Section<T>) -> bool {
        if self.0.is_none() && other.0.is_some() {
            self.0 = other.0;
            true
        } else {
            false
        }
    }
}

impl<T: Clone> Section<T> {
    /// Borrowed value, or `f()` when absent.
    pub fn value_or_else(&self, f: impl FnOnce() -> T) -> Cow<'_, T> {
        match &self.0 {
            Some(value) => Cow::Borrowed(value),
            None => Cow::Owned(f()),
        }
    }
}

impl<T: Default> Section<T> {
    pub fn get_or_init(&mut self) -> &mut T {
        self.0.get_or_insert_with(T::default)
    }
}

impl<T: Default + Clone> Section<T> {
    pub fn value_or_default(&self) -> Cow<'_, T> {
        self.value_or_else(T::default)
    }
}

pub type Answers = BTreeMap<String, AnswerValue>;
pub type SalesPlans = BTreeMap<PlanActivity, SalesPlan>;

/// Everything that is saved to and restored from a snapshot. Keys match the
/// snapshot keys of the original form, so older snapshots keep loading.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
pub struct PersistableState {
    #[serde(default, skip_serializing_if = "Section::is_absent")]
    pub respuestas: Section<Answers>,
    #[serde(default, skip_serializing_if = "Section::is_absent")]
    pub avales: Section<Ledger<Guarantee>>,
    #[serde(default, skip_serializing_if = "Section::is_absent")]
    pub filiatorios: Section<Ledger<Shareholder>>,
    #[serde(default, skip_serializing_if = "Section::is_absent")]
    pub empresas_controlantes: Section<Ledger<ControllingCompany>>,
    #[serde(default, skip_serializing_if = "Section::is_absent")]
    pub empresas_vinculadas: Section<Ledger<LinkedCompany>>,
    #[serde(default, skip_serializing_if = "Section::is_absent")]
    pub clientes_descontar: Section<Ledger<DiscountDrawer>>,
    #[serde(default, skip_serializing_if = "Section::is_absent")]
    pub proveedores: Section<Ledger<Supplier>>,
    #[serde(default, skip_serializing_if = "Section::is_absent")]
    pub clientes: Section<Ledger<Customer>>,
    #[serde(default, skip_serializing_if = "Section::is_absent")]
    pub competidores: Section<Ledger<Competitor>>,
    #[serde(default, skip_serializing_if = "Section::is_absent")]
    pub referencias_bancarias: Section<Ledger<BankReference>>,
    #[serde(default, skip_serializing_if = "Section::is_absent")]
    pub bancos: Section<Ledger<BankDebt>>,
    #[serde(default, skip_serializing_if = "Section::is_absent")]
    pub mercado: Section<Ledger<MarketDebt>>,
    #[serde(default, skip_serializing_if = "Section::is_absent")]
    pub deudas_comerciales: Section<Ledger<CommercialDebt>>,
    #[serde(default, skip_serializing_if = "Section::is_absent")]
    pub ventas_interno: Section<Ledger<DomesticSale>>,
    #[serde(default, skip_serializing_if = "Section::is_absent")]
    pub ventas_externo: Section<Ledger<ExportSale>>,
    #[serde(default, skip_serializing_if = "Section::is_absent")]
    pub compras: Section<Ledger<Purchase>>,
    #[serde(default, skip_serializing_if = "Section::is_absent")]
    pub planes_guardados_por_actividad: Section<SalesPlans>,
    #[serde(default, skip_serializing_if = "Section::is_absent")]
    pub df_campos: Section<Ledger<OwnField>>,
    #[serde(default, skip_serializing_if = "Section::is_absent")]
    pub df_campos_arrendados: Section<Ledger<LeasedField>>,
    #[serde(default, skip_serializing_if = "Section::is_absent")]
    pub agricultura_por_campania: Section<CampaignSet>,
    #[serde(default, skip_serializing_if = "Section::is_absent")]
    pub df_cria: Section<HerdMatrix>,
    #[serde(default, skip_serializing_if = "Section::is_absent")]
    pub indices_cria: Section<IndexTable>,
    #[serde(default, skip_serializing_if = "Section::is_absent")]
    pub df_invernada: Section<HerdMatrix>,
    #[serde(default, skip_serializing_if = "Section::is_absent")]
    pub indices_invernada: Section<IndexTable>,
    #[serde(default, skip_serializing_if = "Section::is_absent")]
    pub df_feedlot: Section<HerdMatrix>,
    #[serde(default, skip_serializing_if = "Section::is_absent")]
    pub indices_feedlot: Section<IndexTable>,
    #[serde(default, skip_serializing_if = "Section::is_absent")]
    pub df_tambo: Section<HerdMatrix>,
    #[serde(default, skip_serializing_if = "Section::is_absent")]
    pub indices_tambo: Section<IndexTable>,
    #[serde(default, skip_serializing_if = "Section::is_absent")]
    pub df_base_forrajera: Section<Ledger<ForageRow>>,
    #[serde(default, skip_serializing_if = "Section::is_absent")]
    pub df_hacienda: Section<Ledger<ThirdPartyCattle>>,
    #[serde(default, skip_serializing_if = "Section::is_absent")]
    pub df_otros: Section<Ledger<OtherActivity>>,
}

impl PersistableState {
    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(PersistableState)
    }

    pub fn schema_as_json() -> std::result::Result<String, serde_json::Error> {
        let schema = Self::generate_json_schema();
        serde_json::to_string_pretty(&schema)
    }

    pub fn herd(&self, kind: HerdKind) -> &Section<HerdMatrix> {
        match kind {
            HerdKind::Breeding => &self.df_cria,
            HerdKind::Wintering => &self.df_invernada,
            HerdKind::Feedlot => &self.df_feedlot,
            HerdKind::Dairy => &self.df_tambo,
        }
    }

    pub fn herd_mut(&mut self, kind: HerdKind) -> &mut HerdMatrix {
        let section = match kind {
            HerdKind::Breeding => &mut self.df_cria,
            HerdKind::Wintering => &mut self.df_invernada,
            HerdKind::Feedlot => &mut self.df_feedlot,
            HerdKind::Dairy => &mut self.df_tambo,
        };
        section.get_or_insert_with(|| HerdMatrix::new(kind))
    }

    pub fn indices(&self, kind: HerdKind) -> &Section<IndexTable> {
        match kind {
            HerdKind::Breeding => &self.indices_cria,
            HerdKind::Wintering => &self.indices_invernada,
            HerdKind::Feedlot => &self.indices_feedlot,
            HerdKind::Dairy => &self.indices_tambo,
        }
    }

    pub fn indices_mut(&mut self, kind: HerdKind) -> &mut IndexTable {
        let section = match kind {
            HerdKind::Breeding => &mut self.indices_cria,
            HerdKind::Wintering => &mut self.indices_invernada,
            HerdKind::Feedlot => &mut self.indices_feedlot,
            HerdKind::Dairy => &mut self.indices_tambo,
        };
        section.get_or_insert_with(|| IndexTable::new(kind))
    }

    /// Snapshot keys of the sections currently present.
    pub fn present_keys(&self) -> Vec<String> {
        match serde_json::to_value(self) {
            Ok(serde_json::Value::Object(map)) => {
                let mut keys: Vec<String> = map.keys().cloned().collect();
                keys.sort();
                keys
            }
            _ => Vec::new(),
        }
    }

    /// Fills every absent section from `other`; present sections always win.
    /// Answers are merged key by key under the same rule. Returns the keys filled.
    pub fn fill_absent_from(&mut self, other: PersistableState) -> Vec<&'static str> {
        let mut filled = Vec::new();
        let mut note = |did: bool, key: &'static str| {
            if did {
                filled.push(key);
            }
        };

        if let Some(loaded) = other.respuestas.0 {
            if self.respuestas.is_absent() {
                self.respuestas = Section::new(loaded);
                note(true, "respuestas");
            } else if let Some(current) = self.respuestas.0.as_mut() {
                let mut added = false;
                for (key, value) in loaded {
                    if !current.contains_key(&key) {
                        current.insert(key, value);
                        added = true;
                    }
                }
                note(added, "respuestas");
            }
        }

        note(self.avales.fill_from(other.avales), "avales");
        note(self.filiatorios.fill_from(other.filiatorios), "filiatorios");
        note(
            self.empresas_controlantes.fill_from(other.empresas_controlantes),
            "empresas_controlantes",
        );
        note(
            self.empresas_vinculadas.fill_from(other.empresas_vinculadas),
            "empresas_vinculadas",
        );
        note(
            self.clientes_descontar.fill_from(other.clientes_descontar),
            "clientes_descontar",
        );
        note(self.proveedores.fill_from(other.proveedores), "proveedores");
        note(self.clientes.fill_from(other.clientes), "clientes");
        note(self.competidores.fill_from(other.competidores), "competidores");
        note(
            self.referencias_bancarias.fill_from(other.referencias_bancarias),
            "referencias_bancarias",
        );
        note(self.bancos.fill_from(other.bancos), "bancos");
        note(self.mercado.fill_from(other.mercado), "mercado");
        note(
            self.deudas_comerciales.fill_from(other.deudas_comerciales),
            "deudas_comerciales",
        );
        note(self.ventas_interno.fill_from(other.ventas_interno), "ventas_interno");
        note(self.ventas_externo.fill_from(other.ventas_externo), "ventas_externo");
        note(self.compras.fill_from(other.compras), "compras");
        note(
            self.planes_guardados_por_actividad
                .fill_from(other.planes_guardados_por_actividad),
            "planes_guardados_por_actividad",
        );
        note(self.df_campos.fill_from(other.df_campos), "df_campos");
        note(
            self.df_campos_arrendados.fill_from(other.df_campos_arrendados),
            "df_campos_arrendados",
        );
        note(
            self.agricultura_por_campania
                .fill_from(other.agricultura_por_campania),
            "agricultura_por_campania",
        );
        note(self.df_cria.fill_from(other.df_cria), "df_cria");
        note(self.indices_cria.fill_from(other.indices_cria), "indices_cria");
        note(self.df_invernada.fill_from(other.df_invernada), "df_invernada");
        note(
            self.indices_invernada.fill_from(other.indices_invernada),
            "indices_invernada",
        );
        note(self.df_feedlot.fill_from(other.df_feedlot), "df_feedlot");
        note(self.indices_feedlot.fill_from(other.indices_feedlot), "indices_feedlot");
        note(self.df_tambo.fill_from(other.df_tambo), "df_tambo");
        note(self.indices_tambo.fill_from(other.indices_tambo), "indices_tambo");
        note(
            self.df_base_forrajera.fill_from(other.df_base_forrajera),
            "df_base_forrajera",
        );
        note(self.df_hacienda.fill_from(other.df_hacienda), "df_hacienda");
        note(self.df_otros.fill_from(other.df_otros), "df_otros");

        filled
    }
}

/// Grid ledgers that are edited as a whole and committed in bulk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum GridKind {
    BankDebts,
    MarketDebts,
    CommercialDebts,
    DomesticSales,
    ExportSales,
    Purchases,
    OwnFields,
    LeasedFields,
    Forage,
    ThirdPartyCattle,
    OtherActivities,
}

impl GridKind {
    pub const ALL: [GridKind; 11] = [
        GridKind::BankDebts,
        GridKind::MarketDebts,
        GridKind::CommercialDebts,
        GridKind::DomesticSales,
        GridKind::ExportSales,
        GridKind::Purchases,
        GridKind::OwnFields,
        GridKind::LeasedFields,
        GridKind::Forage,
        GridKind::ThirdPartyCattle,
        GridKind::OtherActivities,
    ];

    pub fn ledger(&self) -> &'static str {
        match self {
            GridKind::BankDebts => BankDebt::LEDGER,
            GridKind::MarketDebts => MarketDebt::LEDGER,
            GridKind::CommercialDebts => CommercialDebt::LEDGER,
            GridKind::DomesticSales => DomesticSale::LEDGER,
            GridKind::ExportSales => ExportSale::LEDGER,
            GridKind::Purchases => Purchase::LEDGER,
            GridKind::OwnFields => OwnField::LEDGER,
            GridKind::LeasedFields => LeasedField::LEDGER,
            GridKind::Forage => ForageRow::LEDGER,
            GridKind::ThirdPartyCattle => ThirdPartyCattle::LEDGER,
            GridKind::OtherActivities => OtherActivity::LEDGER,
        }
    }
}

/// Widget-only state. Never serialized.
#[derive(Debug, Clone, Default)]
pub struct TransientState {
    /// Grid edits not yet committed with the grid's save button.
    pub drafts: BTreeMap<GridKind, Vec<GridRecord>>,
    pub download_confirmed: bool,
}

#[derive(Debug, Clone)]
pub struct ApplicantSession {
    id: ApplicantId,
    pub state: PersistableState,
    pub transient: TransientState,
}

fn commit<R: LedgerRow>(section: &mut Section<Ledger<R>>, records: &[GridRecord]) -> IngestionReport {
    let (rows, report) = ingest_records::<R>(records);
    section.get_or_init().replace_all(rows);
    report
}

impl ApplicantSession {
    pub fn new(id: ApplicantId) -> Self {
        Self {
            id,
            state: PersistableState::default(),
            transient: TransientState::default(),
        }
    }

    pub fn id(&self) -> &ApplicantId {
        &self.id
    }

    pub fn set_answer(&mut self, key: impl Into<String>, value: impl Into<AnswerValue>) {
        self.state
            .respuestas
            .get_or_init()
            .insert(key.into(), value.into());
    }

    pub fn answer(&self, key: &str) -> Option<&AnswerValue> {
        self.state.respuestas.get().and_then(|a| a.get(key))
    }

    /// Holds grid edits without touching the committed ledger.
    pub fn stage_grid(&mut self, kind: GridKind, records: Vec<GridRecord>) {
        debug!("Staged {} record(s) for '{}'", records.len(), kind.ledger());
        self.transient.drafts.insert(kind, records);
    }

    pub fn discard_grid(&mut self, kind: GridKind) -> bool {
        self.transient.drafts.remove(&kind).is_some()
    }

    /// Replaces the grid's ledger with its staged draft. Untypeable records are
    /// dropped and listed in the report.
    pub fn commit_grid(&mut self, kind: GridKind) -> Result<IngestionReport> {
        let records = self.transient.drafts.remove(&kind).ok_or_else(|| {
            IntakeError::InvalidTransition(format!("no staged edits for '{}'", kind.ledger()))
        })?;
        let state = &mut self.state;

        let report = match kind {
            GridKind::BankDebts => commit(&mut state.bancos, &records),
            GridKind::MarketDebts => commit(&mut state.mercado, &records),
            GridKind::CommercialDebts => commit(&mut state.deudas_comerciales, &records),
            GridKind::DomesticSales => commit(&mut state.ventas_interno, &records),
            GridKind::ExportSales => commit(&mut state.ventas_externo, &records),
            GridKind::Purchases => commit(&mut state.compras, &records),
            GridKind::OwnFields => commit(&mut state.df_campos, &records),
            GridKind::LeasedFields => commit(&mut state.df_campos_arrendados, &records),
            GridKind::Forage => commit(&mut state.df_base_forrajera, &records),
            GridKind::ThirdPartyCattle => commit(&mut state.df_hacienda, &records),
            GridKind::OtherActivities => commit(&mut state.df_otros, &records),
        };

        info!(
            "Committed '{}': {}/{} row(s) accepted",
            kind.ledger(),
            report.rows_accepted,
            report.rows_read
        );
        Ok(report)
    }

    pub fn sales_plan_mut(
        &mut self,
        activity: PlanActivity,
        other_name: Option<&str>,
    ) -> Result<&mut SalesPlan> {
        let plans = self.state.planes_guardados_por_actividad.get_or_init();
        if !plans.contains_key(&activity) {
            plans.insert(activity, SalesPlan::for_activity(activity, other_name)?);
        }
        plans.get_mut(&activity).ok_or_else(|| {
            IntakeError::InvalidTransition(format!("no sales plan for {}", activity.label()))
        })
    }
}
