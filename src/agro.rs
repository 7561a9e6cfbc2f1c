//! Agricultural and livestock tables: fields, crop campaigns, herds, their
//! index tables and the per-activity sales plan.

use crate::error::{IntakeError, Result};
use crate::ledger::LedgerRow;
use crate::schema::Month;
use log::debug;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Grid ledgers
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct OwnField {
    #[serde(rename = "Nombre del Campo")]
    pub name: String,
    #[serde(rename = "Provincia")]
    pub province: String,
    #[serde(rename = "Partido")]
    pub district: String,
    #[serde(rename = "Localidad")]
    pub locality: String,
    #[serde(rename = "Titularidad")]
    pub ownership: String,
    #[serde(rename = "Has")]
    pub hectares: f64,
    #[serde(rename = "Valor U$/ha")]
    pub value_per_ha: f64,
    #[serde(rename = "Has Hipotecadas")]
    pub mortgaged_hectares: f64,
    #[serde(rename = "Estado Actual")]
    pub status: String,
}

impl LedgerRow for OwnField {
    const LEDGER: &'static str = "Campos Propios";
    const COLUMNS: &'static [&'static str] = &[
        "Nombre del Campo",
        "Provincia",
        "Partido",
        "Localidad",
        "Titularidad",
        "Has",
        "Valor U$/ha",
        "Has Hipotecadas",
        "Estado Actual",
    ];
    const NUMERIC_COLUMNS: &'static [&'static str] = &["Has", "Valor U$/ha", "Has Hipotecadas"];
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct LeasedField {
    #[serde(rename = "Nombre del Campo")]
    pub name: String,
    #[serde(rename = "Provincia")]
    pub province: String,
    #[serde(rename = "Partido")]
    pub district: String,
    #[serde(rename = "Localidad")]
    pub locality: String,
    #[serde(rename = "Arrendador")]
    pub lessor: String,
    #[serde(rename = "Has Arrendadas")]
    pub hectares: f64,
    #[serde(rename = "Valor U$/ha")]
    pub value_per_ha: f64,
    #[serde(rename = "Metodología de Pago")]
    pub payment_method: String,
    #[serde(rename = "Duración del Contrato")]
    pub contract_length: String,
}

impl LedgerRow for LeasedField {
    const LEDGER: &'static str = "Campos Arrendados";
    const COLUMNS: &'static [&'static str] = &[
        "Nombre del Campo",
        "Provincia",
        "Partido",
        "Localidad",
        "Arrendador",
        "Has Arrendadas",
        "Valor U$/ha",
        "Metodología de Pago",
        "Duración del Contrato",
    ];
    const NUMERIC_COLUMNS: &'static [&'static str] = &["Has Arrendadas", "Valor U$/ha"];
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct ForageRow {
    #[serde(rename = "Categoria")]
    pub category: String,
    #[serde(rename = "Has")]
    pub hectares: f64,
}

impl ForageRow {
    pub fn defaults() -> Vec<ForageRow> {
        ["Alfalfa", "Sorgo", "Maíz", "Pastura Natural"]
            .iter()
            .map(|c| ForageRow {
                category: c.to_string(),
                hectares: 0.0,
            })
            .collect()
    }
}

impl LedgerRow for ForageRow {
    const LEDGER: &'static str = "Base Forrajera";
    const COLUMNS: &'static [&'static str] = &["Categoria", "Has"];
    const NUMERIC_COLUMNS: &'static [&'static str] = &["Has"];
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct ThirdPartyCattle {
    #[serde(rename = "Categoría")]
    pub category: String,
    #[serde(rename = "Cantidad")]
    pub heads: f64,
    #[serde(rename = "Pastoreo o capitalización (Precio o % Propio)")]
    pub terms: f64,
}

impl LedgerRow for ThirdPartyCattle {
    const LEDGER: &'static str = "Hacienda de Terceros";
    const COLUMNS: &'static [&'static str] = &[
        "Categoría",
        "Cantidad",
        "Pastoreo o capitalización (Precio o % Propio)",
    ];
    const NUMERIC_COLUMNS: &'static [&'static str] =
        &["Cantidad", "Pastoreo o capitalización (Precio o % Propio)"];
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct OtherActivity {
    #[serde(rename = "Descripción")]
    pub description: String,
}

impl LedgerRow for OtherActivity {
    const LEDGER: &'static str = "Otras Actividades";
    const COLUMNS: &'static [&'static str] = &["Descripción"];
}

// ---------------------------------------------------------------------------
// Crop campaigns
// ---------------------------------------------------------------------------

pub const DEFAULT_CROPS: [&str; 9] = [
    "Maíz",
    "Soja",
    "Soja 2da",
    "Trigo",
    "Cebada",
    "Sorgo",
    "Girasol",
    "Poroto",
    "Otros Cultivos",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CropIndicator {
    AdministeredHectares,
    SharecropHectares,
    OwnPercentage,
    Yield,
    CommercialCost,
    DirectCost,
    Stock,
    Price,
}

impl CropIndicator {
    pub const ALL: [CropIndicator; 8] = [
        CropIndicator::AdministeredHectares,
        CropIndicator::SharecropHectares,
        CropIndicator::OwnPercentage,
        CropIndicator::Yield,
        CropIndicator::CommercialCost,
        CropIndicator::DirectCost,
        CropIndicator::Stock,
        CropIndicator::Price,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            CropIndicator::AdministeredHectares => "Has p/adm",
            CropIndicator::SharecropHectares => "Has a %",
            CropIndicator::OwnPercentage => "% Propio",
            CropIndicator::Yield => "Rendimiento (tn/ha)",
            CropIndicator::CommercialCost => "Gastos Comerc. y Cosecha (US$/ha)",
            CropIndicator::DirectCost => "Gastos Directos (US$/ha)",
            CropIndicator::Stock => "Stock actual (tn)",
            CropIndicator::Price => "Precio Actual/Futuro (US$/tn)",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct CropFigures {
    #[serde(rename = "Has p/adm")]
    pub administered_ha: f64,
    #[serde(rename = "Has a %")]
    pub sharecrop_ha: f64,
    #[serde(rename = "% Propio")]
    pub own_pct: f64,
    #[serde(rename = "Rendimiento (tn/ha)")]
    pub yield_tn_ha: f64,
    #[serde(rename = "Gastos Comerc. y Cosecha (US$/ha)")]
    pub commercial_cost_ha: f64,
    #[serde(rename = "Gastos Directos (US$/ha)")]
    pub direct_cost_ha: f64,
    #[serde(rename = "Stock actual (tn)")]
    pub stock_tn: f64,
    #[serde(rename = "Precio Actual/Futuro (US$/tn)")]
    pub price_tn: f64,
}

impl CropFigures {
    pub fn get(&self, indicator: CropIndicator) -> f64 {
        match indicator {
            CropIndicator::AdministeredHectares => self.administered_ha,
            CropIndicator::SharecropHectares => self.sharecrop_ha,
            CropIndicator::OwnPercentage => self.own_pct,
            CropIndicator::Yield => self.yield_tn_ha,
            CropIndicator::CommercialCost => self.commercial_cost_ha,
            CropIndicator::DirectCost => self.direct_cost_ha,
            CropIndicator::Stock => self.stock_tn,
            CropIndicator::Price => self.price_tn,
        }
    }

    pub fn set(&mut self, indicator: CropIndicator, value: f64) {
        let slot = match indicator {
            CropIndicator::AdministeredHectares => &mut self.administered_ha,
            CropIndicator::SharecropHectares => &mut self.sharecrop_ha,
            CropIndicator::OwnPercentage => &mut self.own_pct,
            CropIndicator::Yield => &mut self.yield_tn_ha,
            CropIndicator::CommercialCost => &mut self.commercial_cost_ha,
            CropIndicator::DirectCost => &mut self.direct_cost_ha,
            CropIndicator::Stock => &mut self.stock_tn,
            CropIndicator::Price => &mut self.price_tn,
        };
        *slot = value;
    }

    /// Administered hectares plus the own share of sharecropped ones.
    pub fn own_hectares(&self) -> f64 {
        self.administered_ha + self.sharecrop_ha * self.own_pct / 100.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Crop {
    #[serde(rename = "Cultivo")]
    pub name: String,
    #[serde(flatten)]
    pub figures: CropFigures,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CampaignSlot {
    Current,
    OneYearAgo,
    TwoYearsAgo,
}

impl CampaignSlot {
    pub const ALL: [CampaignSlot; 3] = [
        CampaignSlot::Current,
        CampaignSlot::OneYearAgo,
        CampaignSlot::TwoYearsAgo,
    ];

    pub fn default_name(&self) -> &'static str {
        match self {
            CampaignSlot::Current => "Campaña Actual",
            CampaignSlot::OneYearAgo => "Campaña hace 1 año",
            CampaignSlot::TwoYearsAgo => "Campaña hace 2 años",
        }
    }
}

/// One campaign: an editable display name and a crop × indicator matrix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Campaign {
    #[serde(rename = "Campaña")]
    pub name: String,
    #[serde(rename = "Cultivos", default)]
    crops: Vec<Crop>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CropResult {
    pub campaign: String,
    pub crop: String,
    pub own_hectares: f64,
    pub production_tn: f64,
    pub gross_income: f64,
    pub total_costs: f64,
    pub gross_margin: f64,
}

impl Campaign {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            crops: DEFAULT_CROPS
                .iter()
                .map(|c| Crop {
                    name: c.to_string(),
                    figures: CropFigures::default(),
                })
                .collect(),
        }
    }

    pub fn crops(&self) -> &[Crop] {
        &self.crops
    }

    pub fn crop(&self, name: &str) -> Option<&CropFigures> {
        self.crops.iter().find(|c| c.name == name).map(|c| &c.figures)
    }

    pub fn add_crop(&mut self, name: &str) -> Result<()> {
        let name = name.trim();
        if name.is_empty() {
            return Err(IntakeError::Crop("crop name cannot be empty".to_string()));
        }
        if self.crop(name).is_some() {
            return Err(IntakeError::Crop(format!(
                "'{}' already exists in {}",
                name, self.name
            )));
        }
        debug!("Adding crop '{}' to {}", name, self.name);
        self.crops.push(Crop {
            name: name.to_string(),
            figures: CropFigures::default(),
        });
        Ok(())
    }

    pub fn remove_crop(&mut self, name: &str) -> Result<CropFigures> {
        let position = self
            .crops
            .iter()
            .position(|c| c.name == name)
            .ok_or_else(|| IntakeError::Crop(format!("'{}' is not part of {}", name, self.name)))?;
        Ok(self.crops.remove(position).figures)
    }

    pub fn set(&mut self, crop: &str, indicator: CropIndicator, value: f64) -> Result<()> {
        let entry = self
            .crops
            .iter_mut()
            .find(|c| c.name == crop)
            .ok_or_else(|| IntakeError::UnknownCategory {
                table: self.name.clone(),
                name: crop.to_string(),
            })?;
        entry.figures.set(indicator, value);
        Ok(())
    }

    pub fn results(&self) -> Vec<CropResult> {
        self.crops
            .iter()
            .map(|crop| {
                let f = &crop.figures;
                let own_hectares = f.own_hectares();
                let production_tn = own_hectares * f.yield_tn_ha;
                let gross_income = production_tn * f.price_tn;
                let total_costs = own_hectares * (f.commercial_cost_ha + f.direct_cost_ha);
                CropResult {
                    campaign: self.name.clone(),
                    crop: crop.name.clone(),
                    own_hectares,
                    production_tn,
                    gross_income,
                    total_costs,
                    gross_margin: gross_income - total_costs,
                }
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CampaignSet {
    #[serde(rename = "actual")]
    pub current: Campaign,
    #[serde(rename = "hace_1")]
    pub one_year_ago: Campaign,
    #[serde(rename = "hace_2")]
    pub two_years_ago: Campaign,
}

impl Default for CampaignSet {
    fn default() -> Self {
        Self {
            current: Campaign::new(CampaignSlot::Current.default_name()),
            one_year_ago: Campaign::new(CampaignSlot::OneYearAgo.default_name()),
            two_years_ago: Campaign::new(CampaignSlot::TwoYearsAgo.default_name()),
        }
    }
}

impl CampaignSet {
    pub fn slot(&self, slot: CampaignSlot) -> &Campaign {
        match slot {
            CampaignSlot::Current => &self.current,
            CampaignSlot::OneYearAgo => &self.one_year_ago,
            CampaignSlot::TwoYearsAgo => &self.two_years_ago,
        }
    }

    pub fn slot_mut(&mut self, slot: CampaignSlot) -> &mut Campaign {
        match slot {
            CampaignSlot::Current => &mut self.current,
            CampaignSlot::OneYearAgo => &mut self.one_year_ago,
            CampaignSlot::TwoYearsAgo => &mut self.two_years_ago,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Campaign> {
        CampaignSlot::ALL.into_iter().map(move |s| self.slot(s))
    }

    pub fn results(&self) -> Vec<CropResult> {
        self.iter().flat_map(|c| c.results()).collect()
    }
}

// ---------------------------------------------------------------------------
// Herds
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum HerdKind {
    Breeding,
    Wintering,
    Feedlot,
    Dairy,
}

impl HerdKind {
    pub const ALL: [HerdKind; 4] = [
        HerdKind::Breeding,
        HerdKind::Wintering,
        HerdKind::Feedlot,
        HerdKind::Dairy,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            HerdKind::Breeding => "Cría",
            HerdKind::Wintering => "Invernada",
            HerdKind::Feedlot => "Feedlot",
            HerdKind::Dairy => "Tambo",
        }
    }

    pub fn categories(&self) -> &'static [&'static str] {
        match self {
            HerdKind::Breeding => &["Vacas", "Vaquillonas", "Terneros/as", "Toros"],
            HerdKind::Wintering | HerdKind::Feedlot => {
                &["Novillos", "Novillitos", "Vacas Descarte", "Vaquillonas"]
            }
            HerdKind::Dairy => &["Vacas (VO+VS)", "Vaquillonas", "Terneras", "Terneros", "Toros"],
        }
    }

    pub fn index_items(&self) -> &'static [&'static str] {
        match self {
            HerdKind::Breeding => &["% Preñez", "% Parición", "% Destete"],
            HerdKind::Wintering | HerdKind::Feedlot => &[
                "Compras (cabezas/año)",
                "Ventas (cabezas/año)",
                "Peso Promedio Compras",
                "Peso Promedio Ventas",
            ],
            HerdKind::Dairy => &["Lt/día", "Precio US$/Lt", "% VO", "% Grasa Butirosa"],
        }
    }
}

impl fmt::Display for HerdKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Row labels of a herd matrix.
pub const HERD_ROWS: [&str; 4] = [
    "Propias",
    "De Terceros",
    "Gasto Directo (US$/cab)",
    "Gasto Comercial (US$/cab)",
];

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct HerdFigures {
    #[serde(rename = "Propias")]
    pub own: f64,
    #[serde(rename = "De Terceros")]
    pub third_party: f64,
    #[serde(rename = "Gasto Directo (US$/cab)")]
    pub direct_cost: f64,
    #[serde(rename = "Gasto Comercial (US$/cab)")]
    pub commercial_cost: f64,
}

impl HerdFigures {
    fn by_row(&self, row: usize) -> f64 {
        match row {
            0 => self.own,
            1 => self.third_party,
            2 => self.direct_cost,
            _ => self.commercial_cost,
        }
    }

    fn row_mut(&mut self, row: &str) -> Option<&mut f64> {
        match row {
            "Propias" => Some(&mut self.own),
            "De Terceros" => Some(&mut self.third_party),
            "Gasto Directo (US$/cab)" => Some(&mut self.direct_cost),
            "Gasto Comercial (US$/cab)" => Some(&mut self.commercial_cost),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct HerdCategory {
    #[serde(rename = "Categoría")]
    pub name: String,
    #[serde(flatten)]
    pub figures: HerdFigures,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct HerdMatrix {
    categories: Vec<HerdCategory>,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct HerdTotals {
    pub own_heads: f64,
    pub third_party_heads: f64,
    pub total_heads: f64,
    pub direct_cost: f64,
    pub commercial_cost: f64,
}

impl HerdMatrix {
    pub fn new(kind: HerdKind) -> Self {
        Self {
            categories: kind
                .categories()
                .iter()
                .map(|c| HerdCategory {
                    name: c.to_string(),
                    figures: HerdFigures::default(),
                })
                .collect(),
        }
    }

    pub fn categories(&self) -> &[HerdCategory] {
        &self.categories
    }

    pub fn category(&self, name: &str) -> Option<&HerdFigures> {
        self.categories
            .iter()
            .find(|c| c.name == name)
            .map(|c| &c.figures)
    }

    /// Sets one cell, addressed by row label and category.
    pub fn set(&mut self, row: &str, category: &str, value: f64) -> Result<()> {
        let unknown = |name: &str| IntakeError::UnknownCategory {
            table: "Ganadería".to_string(),
            name: name.to_string(),
        };
        let figures = self
            .categories
            .iter_mut()
            .find(|c| c.name == category)
            .map(|c| &mut c.figures)
            .ok_or_else(|| unknown(category))?;
        let cell = figures.row_mut(row).ok_or_else(|| unknown(row))?;
        *cell = value;
        Ok(())
    }

    /// Values of one row label across categories, in category order.
    pub fn row_values(&self, row: usize) -> Vec<f64> {
        self.categories.iter().map(|c| c.figures.by_row(row)).collect()
    }

    /// Head counts and herd-wide costs (heads × per-head cost per category).
    pub fn totals(&self) -> HerdTotals {
        self.categories
            .iter()
            .fold(HerdTotals::default(), |mut acc, c| {
                let f = &c.figures;
                let heads = f.own + f.third_party;
                acc.own_heads += f.own;
                acc.third_party_heads += f.third_party;
                acc.total_heads += heads;
                acc.direct_cost += heads * f.direct_cost;
                acc.commercial_cost += heads * f.commercial_cost;
                acc
            })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct IndexItem {
    #[serde(rename = "Ítem")]
    pub item: String,
    #[serde(rename = "Valor", default)]
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct IndexTable {
    items: Vec<IndexItem>,
}

impl IndexTable {
    pub fn new(kind: HerdKind) -> Self {
        Self {
            items: kind
                .index_items()
                .iter()
                .map(|i| IndexItem {
                    item: i.to_string(),
                    value: 0.0,
                })
                .collect(),
        }
    }

    pub fn items(&self) -> &[IndexItem] {
        &self.items
    }

    pub fn get(&self, item: &str) -> Option<f64> {
        self.items.iter().find(|i| i.item == item).map(|i| i.value)
    }

    pub fn set(&mut self, item: &str, value: f64) -> Result<()> {
        let entry = self
            .items
            .iter_mut()
            .find(|i| i.item == item)
            .ok_or_else(|| IntakeError::UnknownCategory {
                table: "Índices".to_string(),
                name: item.to_string(),
            })?;
        entry.value = value;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Sales plan per activity
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
pub enum PlanActivity {
    Agricultura,
    #[serde(rename = "Ganadería")]
    Ganaderia,
    Tambo,
    Otros,
}

impl PlanActivity {
    pub const ALL: [PlanActivity; 4] = [
        PlanActivity::Agricultura,
        PlanActivity::Ganaderia,
        PlanActivity::Tambo,
        PlanActivity::Otros,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            PlanActivity::Agricultura => "Agricultura",
            PlanActivity::Ganaderia => "Ganadería",
            PlanActivity::Tambo => "Tambo",
            PlanActivity::Otros => "Otros",
        }
    }

    /// Fixed products of the activity. "Otros" has a single user-named product.
    pub fn products(&self) -> &'static [&'static str] {
        match self {
            PlanActivity::Agricultura => &["Trigo", "Maíz", "Soja", "Girasol"],
            PlanActivity::Ganaderia => &["Novillos", "Vaquillonas", "Terneros", "Vacas"],
            PlanActivity::Tambo => &["Litros"],
            PlanActivity::Otros => &[],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PlanMonth {
    #[serde(rename = "Mes")]
    pub month: Month,
    #[serde(rename = "Cantidades")]
    pub amounts: Vec<f64>,
}

/// A fixed 12-month × product grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SalesPlan {
    #[serde(rename = "Productos")]
    products: Vec<String>,
    #[serde(rename = "Meses")]
    months: Vec<PlanMonth>,
}

impl SalesPlan {
    pub fn new(products: Vec<String>) -> Self {
        let months = Month::ALL
            .iter()
            .map(|m| PlanMonth {
                month: *m,
                amounts: vec![0.0; products.len()],
            })
            .collect();
        Self { products, months }
    }

    /// Plan with the activity's products; "Otros" needs a non-empty `other_name`.
    pub fn for_activity(activity: PlanActivity, other_name: Option<&str>) -> Result<Self> {
        let products = match activity {
            PlanActivity::Otros => {
                let name = other_name.map(str::trim).unwrap_or_default();
                if name.is_empty() {
                    return Err(IntakeError::UnknownCategory {
                        table: "Plan Ventas Actividad".to_string(),
                        name: "Otros (sin nombre)".to_string(),
                    });
                }
                vec![name.to_string()]
            }
            other => other.products().iter().map(|p| p.to_string()).collect(),
        };
        Ok(Self::new(products))
    }

    pub fn products(&self) -> &[String] {
        &self.products
    }

    pub fn months(&self) -> &[PlanMonth] {
        &self.months
    }

    pub fn get(&self, month: Month, product: &str) -> Option<f64> {
        let column = self.products.iter().position(|p| p == product)?;
        self.months
            .iter()
            .find(|m| m.month == month)
            .and_then(|m| m.amounts.get(column).copied())
    }

    pub fn set(&mut self, month: Month, product: &str, value: f64) -> Result<()> {
        let column = self
            .products
            .iter()
            .position(|p| p == product)
            .ok_or_else(|| IntakeError::UnknownCategory {
                table: "Plan Ventas Actividad".to_string(),
                name: product.to_string(),
            })?;
        let width = self.products.len();
        if !self.months.iter().any(|m| m.month == month) {
            self.months.push(PlanMonth {
                month,
                amounts: vec![0.0; width],
            });
            self.months.sort_by_key(|m| m.month);
        }
        let row = self
            .months
            .iter_mut()
            .find(|m| m.month == month)
            .ok_or_else(|| IntakeError::UnknownCategory {
                table: "Plan Ventas Actividad".to_string(),
                name: month.to_string(),
            })?;
        if row.amounts.len() < width {
            row.amounts.resize(width, 0.0);
        }
        row.amounts[column] = value;
        Ok(())
    }

    /// Yearly total per product, in product order.
    pub fn annual_totals(&self) -> Vec<(String, f64)> {
        self.products
            .iter()
            .enumerate()
            .map(|(column, product)| {
                let total: f64 = self
                    .months
                    .iter()
                    .filter_map(|m| m.amounts.get(column))
                    .sum();
                (product.clone(), total)
            })
            .collect()
    }
}
