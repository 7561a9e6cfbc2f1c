//! Flattens a session into the downloadable workbook.
//!
//! Every sheet in [`Sheet::ALL`] is always written, in that order, with its
//! canonical header row. A sheet whose source cannot be flattened is written
//! header-only and logged; one bad section never fails the download.

use crate::agro::{
    CropIndicator, ForageRow, HerdKind, LeasedField, OtherActivity, OwnField, PlanActivity,
    ThirdPartyCattle, HERD_ROWS,
};
use crate::engine::{RollupEngine, SessionSummary};
use crate::error::{IntakeError, Result};
use crate::ledger::{Ledger, LedgerRow};
use crate::monthly::WINDOW_CATEGORIES;
use crate::schema::{
    AnswerValue, BankDebt, BankReference, CommercialDebt, Competitor, ControllingCompany,
    Customer, DiscountDrawer, DomesticSale, ExportSale, Guarantee, LinkedCompany, MarketDebt,
    Purchase, Shareholder, Supplier,
};
use crate::session::{ApplicantSession, PersistableState, Section};
use crate::utils::month_year_label;
use chrono::NaiveDate;
use log::{debug, info, warn};
use rust_xlsxwriter::{Workbook, Worksheet};
use serde_json::Value;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Text(String),
    Number(f64),
}

impl Cell {
    fn from_value(value: &Value) -> Cell {
        match value {
            Value::Null => Cell::Empty,
            Value::Number(n) => n.as_f64().map(Cell::Number).unwrap_or(Cell::Empty),
            Value::String(s) => Cell::Text(s.clone()),
            Value::Bool(b) => Cell::Text(if *b { "SI" } else { "NO" }.to_string()),
            other => Cell::Text(other.to_string()),
        }
    }

    fn from_answer(value: &AnswerValue) -> Cell {
        match value {
            AnswerValue::Number(n) => Cell::Number(*n),
            other => Cell::Text(other.to_string()),
        }
    }

    fn text(value: impl Into<String>) -> Cell {
        Cell::Text(value.into())
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Empty => Ok(()),
            Cell::Text(s) => f.write_str(s),
            Cell::Number(n) => write!(f, "{}", n),
        }
    }
}

/// A rectangular sheet body: a header row and rows of the same width.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl Table {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn with_labels(labels: &[&str]) -> Self {
        Self::new(labels.iter().map(|l| l.to_string()).collect())
    }

    /// Appends a row, padded or cut to the header width.
    pub fn push(&mut self, mut row: Vec<Cell>) {
        row.resize(self.columns.len(), Cell::Empty);
        self.rows.push(row);
    }

    pub fn column(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

fn labels(parts: &[&[&str]]) -> Vec<String> {
    parts
        .iter()
        .flat_map(|part| part.iter().map(|l| l.to_string()))
        .collect()
}

fn row_cells<R: LedgerRow>(row: &R) -> Result<Vec<Cell>> {
    match serde_json::to_value(row)? {
        Value::Object(map) => Ok(R::COLUMNS
            .iter()
            .map(|column| map.get(*column).map(Cell::from_value).unwrap_or(Cell::Empty))
            .collect()),
        other => Err(IntakeError::Export(format!(
            "'{}' row serialized as {} instead of a record",
            R::LEDGER,
            other
        ))),
    }
}

/// A ledger projected onto its canonical columns, in row order.
pub fn ledger_table<R: LedgerRow>(ledger: Option<&Ledger<R>>) -> Result<Table> {
    let mut table = Table::with_labels(R::COLUMNS);
    if let Some(ledger) = ledger {
        for row in ledger.rows() {
            table.push(row_cells(row)?);
        }
    }
    Ok(table)
}

/// `column: value, ...` per row, one row per line.
fn ledger_summary<R: LedgerRow>(section: &Section<Ledger<R>>) -> Result<String> {
    let table = ledger_table(section.get())?;
    let lines: Vec<String> = table
        .rows
        .iter()
        .map(|row| {
            table
                .columns
                .iter()
                .zip(row)
                .map(|(column, cell)| format!("{}: {}", column, cell))
                .collect::<Vec<_>>()
                .join(", ")
        })
        .collect();
    Ok(lines.join("\n"))
}

const SUMMARIZED_LEDGERS: [&str; 9] = [
    Guarantee::LEDGER,
    Shareholder::LEDGER,
    ControllingCompany::LEDGER,
    LinkedCompany::LEDGER,
    DiscountDrawer::LEDGER,
    Supplier::LEDGER,
    Customer::LEDGER,
    Competitor::LEDGER,
    BankReference::LEDGER,
];

const DEBT_SUMMARY_COLUMNS: [&str; 4] = ["Categoría", "Moneda", "Total", "Tasa Promedio Ponderada"];
const SECTOR_SUMMARY_COLUMNS: [&str; 6] = ["Origen", "Tipo", "Año en curso", "Año 1", "Año 2", "Año 3"];
const PLAN_COLUMNS: [&str; 4] = ["Actividad", "Mes", "Producto", "Cantidad"];
const CROP_SUMMARY_COLUMNS: [&str; 7] = [
    "Campaña",
    "Cultivo",
    "Has Propias",
    "Producción Propia (tn)",
    "Ingreso Bruto (US$)",
    "Costos Totales (US$)",
    "Margen Bruto (US$)",
];
const INDEX_COLUMNS: [&str; 2] = ["Ítem", "Valor"];

/// Sheets of the export workbook, in workbook order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Sheet {
    InfoGeneral,
    Guarantees,
    Shareholders,
    ControllingCompanies,
    LinkedCompanies,
    DiscountDrawers,
    Suppliers,
    Customers,
    Competitors,
    BankReferences,
    BankDebts,
    MarketDebts,
    CommercialDebts,
    DebtSummary,
    DomesticSales,
    ExportSales,
    Purchases,
    SalesSummary,
    SectorSummary,
    SalesPlans,
    OwnFields,
    LeasedFields,
    Agriculture,
    AgricultureSummary,
    LivestockPlan,
    Herd(HerdKind),
    Indices(HerdKind),
    Forage,
    ThirdPartyCattle,
    OtherActivities,
}

impl Sheet {
    pub const ALL: [Sheet; 36] = [
        Sheet::InfoGeneral,
        Sheet::Guarantees,
        Sheet::Shareholders,
        Sheet::ControllingCompanies,
        Sheet::LinkedCompanies,
        Sheet::DiscountDrawers,
        Sheet::Suppliers,
        Sheet::Customers,
        Sheet::Competitors,
        Sheet::BankReferences,
        Sheet::BankDebts,
        Sheet::MarketDebts,
        Sheet::CommercialDebts,
        Sheet::DebtSummary,
        Sheet::DomesticSales,
        Sheet::ExportSales,
        Sheet::Purchases,
        Sheet::SalesSummary,
        Sheet::SectorSummary,
        Sheet::SalesPlans,
        Sheet::OwnFields,
        Sheet::LeasedFields,
        Sheet::Agriculture,
        Sheet::AgricultureSummary,
        Sheet::LivestockPlan,
        Sheet::Herd(HerdKind::Breeding),
        Sheet::Herd(HerdKind::Wintering),
        Sheet::Herd(HerdKind::Feedlot),
        Sheet::Herd(HerdKind::Dairy),
        Sheet::Indices(HerdKind::Breeding),
        Sheet::Indices(HerdKind::Wintering),
        Sheet::Indices(HerdKind::Feedlot),
        Sheet::Indices(HerdKind::Dairy),
        Sheet::Forage,
        Sheet::ThirdPartyCattle,
        Sheet::OtherActivities,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Sheet::InfoGeneral => "Resumen Info General",
            Sheet::Guarantees => Guarantee::LEDGER,
            Sheet::Shareholders => Shareholder::LEDGER,
            Sheet::ControllingCompanies => ControllingCompany::LEDGER,
            Sheet::LinkedCompanies => LinkedCompany::LEDGER,
            Sheet::DiscountDrawers => DiscountDrawer::LEDGER,
            Sheet::Suppliers => Supplier::LEDGER,
            Sheet::Customers => Customer::LEDGER,
            Sheet::Competitors => Competitor::LEDGER,
            Sheet::BankReferences => BankReference::LEDGER,
            Sheet::BankDebts => BankDebt::LEDGER,
            Sheet::MarketDebts => MarketDebt::LEDGER,
            Sheet::CommercialDebts => CommercialDebt::LEDGER,
            Sheet::DebtSummary => "Resumen Deudas",
            Sheet::DomesticSales => DomesticSale::LEDGER,
            Sheet::ExportSales => ExportSale::LEDGER,
            Sheet::Purchases => Purchase::LEDGER,
            Sheet::SalesSummary => "Resumen Ventas",
            Sheet::SectorSummary => "Resumen Ventas por Tipo",
            Sheet::SalesPlans => "Plan Ventas Actividad",
            Sheet::OwnFields => OwnField::LEDGER,
            Sheet::LeasedFields => LeasedField::LEDGER,
            Sheet::Agriculture => "Agricultura",
            Sheet::AgricultureSummary => "Resumen Agricultura",
            Sheet::LivestockPlan => "Ganadería",
            Sheet::Herd(HerdKind::Breeding) => "Cría",
            Sheet::Herd(HerdKind::Wintering) => "Invernada",
            Sheet::Herd(HerdKind::Feedlot) => "Feedlot",
            Sheet::Herd(HerdKind::Dairy) => "Tambo",
            Sheet::Indices(HerdKind::Breeding) => "Índices Cría",
            Sheet::Indices(HerdKind::Wintering) => "Índices Invernada",
            Sheet::Indices(HerdKind::Feedlot) => "Índices Feedlot",
            Sheet::Indices(HerdKind::Dairy) => "Índices Tambo",
            Sheet::Forage => ForageRow::LEDGER,
            Sheet::ThirdPartyCattle => ThirdPartyCattle::LEDGER,
            Sheet::OtherActivities => OtherActivity::LEDGER,
        }
    }

    /// Header row written even when the sheet has no data. The info sheet
    /// puts the applicant's answer keys in front of these.
    pub fn columns(&self) -> Vec<String> {
        match self {
            Sheet::InfoGeneral => SUMMARIZED_LEDGERS
                .iter()
                .map(|l| format!("Resumen {}", l))
                .collect(),
            Sheet::Guarantees => labels(&[Guarantee::COLUMNS, &["Total solicitado"]]),
            Sheet::Shareholders => labels(&[Shareholder::COLUMNS]),
            Sheet::ControllingCompanies => labels(&[ControllingCompany::COLUMNS]),
            Sheet::LinkedCompanies => labels(&[LinkedCompany::COLUMNS]),
            Sheet::DiscountDrawers => labels(&[DiscountDrawer::COLUMNS]),
            Sheet::Suppliers => labels(&[Supplier::COLUMNS]),
            Sheet::Customers => labels(&[Customer::COLUMNS]),
            Sheet::Competitors => labels(&[Competitor::COLUMNS]),
            Sheet::BankReferences => labels(&[BankReference::COLUMNS]),
            Sheet::BankDebts => labels(&[BankDebt::COLUMNS]),
            Sheet::MarketDebts => labels(&[MarketDebt::COLUMNS]),
            Sheet::CommercialDebts => labels(&[CommercialDebt::COLUMNS]),
            Sheet::DebtSummary => labels(&[&DEBT_SUMMARY_COLUMNS]),
            Sheet::DomesticSales => labels(&[DomesticSale::COLUMNS]),
            Sheet::ExportSales => labels(&[ExportSale::COLUMNS]),
            Sheet::Purchases => labels(&[Purchase::COLUMNS]),
            Sheet::SalesSummary => labels(&[&["Mes"], &WINDOW_CATEGORIES]),
            Sheet::SectorSummary => labels(&[&SECTOR_SUMMARY_COLUMNS]),
            Sheet::SalesPlans => labels(&[&PLAN_COLUMNS]),
            Sheet::OwnFields => labels(&[OwnField::COLUMNS]),
            Sheet::LeasedFields => labels(&[LeasedField::COLUMNS]),
            Sheet::Agriculture => {
                let mut columns = labels(&[&["Campaña", "Cultivo"]]);
                columns.extend(CropIndicator::ALL.iter().map(|i| i.label().to_string()));
                columns
            }
            Sheet::AgricultureSummary => labels(&[&CROP_SUMMARY_COLUMNS]),
            Sheet::LivestockPlan => labels(&[&["Mes"], PlanActivity::Ganaderia.products()]),
            Sheet::Herd(kind) => labels(&[&["Concepto"], kind.categories()]),
            Sheet::Indices(_) => labels(&[&INDEX_COLUMNS]),
            Sheet::Forage => labels(&[ForageRow::COLUMNS]),
            Sheet::ThirdPartyCattle => labels(&[ThirdPartyCattle::COLUMNS]),
            Sheet::OtherActivities => labels(&[OtherActivity::COLUMNS]),
        }
    }

    fn build(&self, state: &PersistableState, summary: &SessionSummary) -> Result<Table> {
        match self {
            Sheet::InfoGeneral => info_general(state),
            Sheet::Guarantees => guarantees(state, summary.guarantee_total),
            Sheet::Shareholders => ledger_table(state.filiatorios.get()),
            Sheet::ControllingCompanies => ledger_table(state.empresas_controlantes.get()),
            Sheet::LinkedCompanies => ledger_table(state.empresas_vinculadas.get()),
            Sheet::DiscountDrawers => ledger_table(state.clientes_descontar.get()),
            Sheet::Suppliers => ledger_table(state.proveedores.get()),
            Sheet::Customers => ledger_table(state.clientes.get()),
            Sheet::Competitors => ledger_table(state.competidores.get()),
            Sheet::BankReferences => ledger_table(state.referencias_bancarias.get()),
            Sheet::BankDebts => ledger_table(state.bancos.get()),
            Sheet::MarketDebts => ledger_table(state.mercado.get()),
            Sheet::CommercialDebts => ledger_table(state.deudas_comerciales.get()),
            Sheet::DebtSummary => Ok(debt_summary(self, summary)),
            Sheet::DomesticSales => ledger_table(state.ventas_interno.get()),
            Sheet::ExportSales => ledger_table(state.ventas_externo.get()),
            Sheet::Purchases => ledger_table(state.compras.get()),
            Sheet::SalesSummary => Ok(sales_summary(self, summary)),
            Sheet::SectorSummary => Ok(sector_summary(self, summary)),
            Sheet::SalesPlans => Ok(sales_plans(self, state)),
            Sheet::OwnFields => ledger_table(state.df_campos.get()),
            Sheet::LeasedFields => ledger_table(state.df_campos_arrendados.get()),
            Sheet::Agriculture => Ok(agriculture(self, state)),
            Sheet::AgricultureSummary => Ok(agriculture_summary(self, summary)),
            Sheet::LivestockPlan => Ok(livestock_plan(self, state)),
            Sheet::Herd(kind) => Ok(herd(self, *kind, state)),
            Sheet::Indices(kind) => Ok(indices(self, *kind, state)),
            Sheet::Forage => ledger_table(state.df_base_forrajera.get()),
            Sheet::ThirdPartyCattle => ledger_table(state.df_hacienda.get()),
            Sheet::OtherActivities => ledger_table(state.df_otros.get()),
        }
    }
}

fn info_general(state: &PersistableState) -> Result<Table> {
    let mut columns = Vec::new();
    let mut cells = Vec::new();

    if let Some(answers) = state.respuestas.get() {
        let mut flat = Vec::new();
        for (key, value) in answers {
            value.flatten_into(key, &mut flat);
        }
        for (key, value) in flat {
            columns.push(key);
            cells.push(Cell::from_answer(&value));
        }
    }

    let summaries = [
        ledger_summary(&state.avales)?,
        ledger_summary(&state.filiatorios)?,
        ledger_summary(&state.empresas_controlantes)?,
        ledger_summary(&state.empresas_vinculadas)?,
        ledger_summary(&state.clientes_descontar)?,
        ledger_summary(&state.proveedores)?,
        ledger_summary(&state.clientes)?,
        ledger_summary(&state.competidores)?,
        ledger_summary(&state.referencias_bancarias)?,
    ];
    let has_data = !cells.is_empty() || summaries.iter().any(|s| !s.is_empty());

    columns.extend(Sheet::InfoGeneral.columns());
    cells.extend(summaries.into_iter().map(Cell::Text));

    let mut table = Table::new(columns);
    if has_data {
        table.push(cells);
    }
    Ok(table)
}

fn guarantees(state: &PersistableState, total: f64) -> Result<Table> {
    let mut table = Table::new(Sheet::Guarantees.columns());
    for mut row in ledger_table(state.avales.get())?.rows {
        row.push(Cell::Number(total));
        table.push(row);
    }
    Ok(table)
}

fn debt_summary(sheet: &Sheet, summary: &SessionSummary) -> Table {
    let mut table = Table::new(sheet.columns());
    for rollup in summary.debts.categories() {
        for line in rollup.by_currency.iter().filter(|l| l.total != 0.0) {
            table.push(vec![
                Cell::text(rollup.category.as_str()),
                Cell::text(line.currency.code()),
                Cell::Number(line.total),
                Cell::Number(line.weighted_rate),
            ]);
        }
    }
    table
}

fn sales_summary(sheet: &Sheet, summary: &SessionSummary) -> Table {
    let mut table = Table::new(sheet.columns());
    if !summary.has_monthly_rows {
        return table;
    }
    let window = &summary.sales_window;
    for (month, values) in window.months.iter().zip(&window.values) {
        let mut row = vec![Cell::Text(month_year_label(*month))];
        row.extend(values.iter().map(|v| Cell::Number(*v)));
        table.push(row);
    }
    table
}

fn sector_summary(sheet: &Sheet, summary: &SessionSummary) -> Table {
    let mut table = Table::new(sheet.columns());
    for ledger in &summary.sectors {
        for sector in &ledger.sectors {
            let a = &sector.amounts;
            table.push(vec![
                Cell::text(ledger.ledger),
                Cell::text(sector.sector),
                Cell::Number(a.current),
                Cell::Number(a.year_1),
                Cell::Number(a.year_2),
                Cell::Number(a.year_3),
            ]);
        }
    }
    table
}

fn sales_plans(sheet: &Sheet, state: &PersistableState) -> Table {
    let mut table = Table::new(sheet.columns());
    let Some(plans) = state.planes_guardados_por_actividad.get() else {
        return table;
    };
    for (activity, plan) in plans {
        for month in plan.months() {
            for (product, amount) in plan.products().iter().zip(&month.amounts) {
                table.push(vec![
                    Cell::text(activity.label()),
                    Cell::text(month.month.label()),
                    Cell::text(product.as_str()),
                    Cell::Number(*amount),
                ]);
            }
        }
    }
    table
}

fn agriculture(sheet: &Sheet, state: &PersistableState) -> Table {
    let mut table = Table::new(sheet.columns());
    let Some(campaigns) = state.agricultura_por_campania.get() else {
        return table;
    };
    for campaign in campaigns.iter() {
        for crop in campaign.crops() {
            let mut row = vec![Cell::text(campaign.name.as_str()), Cell::text(crop.name.as_str())];
            row.extend(
                CropIndicator::ALL
                    .iter()
                    .map(|i| Cell::Number(crop.figures.get(*i))),
            );
            table.push(row);
        }
    }
    table
}

fn agriculture_summary(sheet: &Sheet, summary: &SessionSummary) -> Table {
    let mut table = Table::new(sheet.columns());
    for result in &summary.crops {
        table.push(vec![
            Cell::text(result.campaign.as_str()),
            Cell::text(result.crop.as_str()),
            Cell::Number(result.own_hectares),
            Cell::Number(result.production_tn),
            Cell::Number(result.gross_income),
            Cell::Number(result.total_costs),
            Cell::Number(result.gross_margin),
        ]);
    }
    table
}

fn livestock_plan(sheet: &Sheet, state: &PersistableState) -> Table {
    let mut table = Table::new(sheet.columns());
    let Some(plan) = state
        .planes_guardados_por_actividad
        .get()
        .and_then(|plans| plans.get(&PlanActivity::Ganaderia))
    else {
        return table;
    };
    for month in plan.months() {
        let mut row = vec![Cell::text(month.month.label())];
        row.extend(
            PlanActivity::Ganaderia
                .products()
                .iter()
                .map(|p| plan.get(month.month, p).map(Cell::Number).unwrap_or(Cell::Empty)),
        );
        table.push(row);
    }
    table
}

fn herd(sheet: &Sheet, kind: HerdKind, state: &PersistableState) -> Table {
    let mut table = Table::new(sheet.columns());
    let Some(matrix) = state.herd(kind).get() else {
        return table;
    };
    for (index, label) in HERD_ROWS.iter().enumerate() {
        let values = matrix.row_values(index);
        let mut row = vec![Cell::text(*label)];
        row.extend(kind.categories().iter().map(|category| {
            matrix
                .categories()
                .iter()
                .position(|c| c.name == *category)
                .and_then(|p| values.get(p))
                .map(|v| Cell::Number(*v))
                .unwrap_or(Cell::Empty)
        }));
        table.push(row);
    }
    table
}

fn indices(sheet: &Sheet, kind: HerdKind, state: &PersistableState) -> Table {
    let mut table = Table::new(sheet.columns());
    if let Some(items) = state.indices(kind).get() {
        for item in items.items() {
            table.push(vec![Cell::text(item.item.as_str()), Cell::Number(item.value)]);
        }
    }
    table
}

/// The built table, or the header-only placeholder if building failed.
fn table_or_placeholder(sheet: Sheet, built: Result<Table>) -> Table {
    match built {
        Ok(table) => table,
        Err(e) => {
            warn!("Sheet '{}' written without data: {}", sheet.name(), e);
            Table::new(sheet.columns())
        }
    }
}

/// Every sheet's table, in workbook order.
pub fn build_tables(state: &PersistableState, today: NaiveDate) -> Vec<(Sheet, Table)> {
    let summary = RollupEngine::new(today).summarize(state);
    Sheet::ALL
        .into_iter()
        .map(|sheet| {
            let table = table_or_placeholder(sheet, sheet.build(state, &summary));
            debug!("Sheet '{}': {} row(s)", sheet.name(), table.rows.len());
            (sheet, table)
        })
        .collect()
}

fn position(row: usize, col: usize) -> Result<(u32, u16)> {
    let row = u32::try_from(row).map_err(|_| IntakeError::Export(format!("row {} out of range", row)))?;
    let col = u16::try_from(col).map_err(|_| IntakeError::Export(format!("column {} out of range", col)))?;
    Ok((row, col))
}

/// Longest string Excel keeps in one cell.
pub const MAX_CELL_CHARS: usize = 32_767;

/// `text` cut to what fits in a cell.
fn fit_cell(text: &str) -> &str {
    match text.char_indices().nth(MAX_CELL_CHARS) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}

fn render_sheet(sheet: Sheet, table: &Table) -> Result<Worksheet> {
    let mut worksheet = Worksheet::new();
    worksheet.set_name(sheet.name())?;

    for (c, column) in table.columns.iter().enumerate() {
        let (r, c) = position(0, c)?;
        worksheet.write_string(r, c, fit_cell(column))?;
    }

    for (r, row) in table.rows.iter().enumerate() {
        for (c, cell) in row.iter().enumerate() {
            let (r, c) = position(r + 1, c)?;
            match cell {
                Cell::Text(text) => {
                    if text.chars().count() > MAX_CELL_CHARS {
                        warn!("Sheet '{}': cell ({}, {}) truncated", sheet.name(), r, c);
                    }
                    worksheet.write_string(r, c, fit_cell(text))?;
                }
                Cell::Number(n) if n.is_finite() => {
                    worksheet.write_number(r, c, *n)?;
                }
                Cell::Number(_) | Cell::Empty => {}
            }
        }
    }

    Ok(worksheet)
}

/// Serializes the tables to XLSX bytes. A sheet that cannot be written is
/// replaced by its header row.
pub fn write_workbook(tables: &[(Sheet, Table)]) -> Result<Vec<u8>> {
    let mut workbook = Workbook::new();

    for (sheet, table) in tables {
        let worksheet = match render_sheet(*sheet, table) {
            Ok(worksheet) => worksheet,
            Err(e) => {
                warn!("Sheet '{}' written without data: {}", sheet.name(), e);
                render_sheet(*sheet, &Table::new(sheet.columns()))?
            }
        };
        workbook.push_worksheet(worksheet);
    }

    Ok(workbook.save_to_buffer()?)
}

/// Builds the full workbook for `session` as of `today`.
pub fn build_workbook(session: &ApplicantSession, today: NaiveDate) -> Result<Vec<u8>> {
    let tables = build_tables(&session.state, today);
    let bytes = write_workbook(&tables)?;
    info!(
        "Built workbook for {}: {} sheet(s), {} byte(s)",
        session.id(),
        tables.len(),
        bytes.len()
    );
    Ok(bytes)
}
