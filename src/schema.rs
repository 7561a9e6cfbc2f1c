//! Row schemas for the general-information, debt and monthly ledgers.
//!
//! Field names serialize as the column labels of the form, which makes a
//! serialized row, a grid record and an export row share one shape.

use crate::ledger::LedgerRow;
use crate::validation::{
    optional_email, require_range, require_tax_id, require_text, ValidationIssue,
};
use schemars::gen::SchemaGenerator;
use schemars::schema::Schema;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize, JsonSchema)]
pub enum Currency {
    #[default]
    #[serde(rename = "ARS")]
    Ars,
    #[serde(rename = "USD")]
    Usd,
}

impl Currency {
    pub const ALL: [Currency; 2] = [Currency::Ars, Currency::Usd];

    pub fn code(&self) -> &'static str {
        match self {
            Currency::Ars => "ARS",
            Currency::Usd => "USD",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
pub enum Month {
    Enero,
    Febrero,
    Marzo,
    Abril,
    Mayo,
    Junio,
    Julio,
    Agosto,
    Septiembre,
    Octubre,
    Noviembre,
    Diciembre,
}

impl Month {
    pub const ALL: [Month; 12] = [
        Month::Enero,
        Month::Febrero,
        Month::Marzo,
        Month::Abril,
        Month::Mayo,
        Month::Junio,
        Month::Julio,
        Month::Agosto,
        Month::Septiembre,
        Month::Octubre,
        Month::Noviembre,
        Month::Diciembre,
    ];

    /// Calendar number, 1 = January.
    pub fn number(&self) -> u32 {
        *self as u32 + 1
    }

    pub fn from_number(month: u32) -> Option<Month> {
        Month::ALL.get(month.checked_sub(1)? as usize).copied()
    }

    pub fn label(&self) -> &'static str {
        match self {
            Month::Enero => "Enero",
            Month::Febrero => "Febrero",
            Month::Marzo => "Marzo",
            Month::Abril => "Abril",
            Month::Mayo => "Mayo",
            Month::Junio => "Junio",
            Month::Julio => "Julio",
            Month::Agosto => "Agosto",
            Month::Septiembre => "Septiembre",
            Month::Octubre => "Octubre",
            Month::Noviembre => "Noviembre",
            Month::Diciembre => "Diciembre",
        }
    }
}

impl fmt::Display for Month {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ---------------------------------------------------------------------------
// Free-form answers
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum AnswerValue {
    Flag(bool),
    Number(f64),
    Text(String),
    Group(BTreeMap<String, AnswerValue>),
}

impl AnswerValue {
    /// Flattens nested groups into `parent.child` keys, in key order.
    pub fn flatten_into(&self, prefix: &str, out: &mut Vec<(String, AnswerValue)>) {
        match self {
            AnswerValue::Group(children) => {
                for (key, child) in children {
                    child.flatten_into(&format!("{}.{}", prefix, key), out);
                }
            }
            other => out.push((prefix.to_string(), other.clone())),
        }
    }
}

impl From<&str> for AnswerValue {
    fn from(value: &str) -> Self {
        AnswerValue::Text(value.to_string())
    }
}

impl From<String> for AnswerValue {
    fn from(value: String) -> Self {
        AnswerValue::Text(value)
    }
}

impl From<f64> for AnswerValue {
    fn from(value: f64) -> Self {
        AnswerValue::Number(value)
    }
}

impl From<bool> for AnswerValue {
    fn from(value: bool) -> Self {
        AnswerValue::Flag(value)
    }
}

impl fmt::Display for AnswerValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnswerValue::Flag(b) => write!(f, "{}", if *b { "SI" } else { "NO" }),
            AnswerValue::Number(n) => write!(f, "{}", n),
            AnswerValue::Text(s) => f.write_str(s),
            AnswerValue::Group(children) => {
                let parts: Vec<String> = children
                    .iter()
                    .map(|(k, v)| format!("{}: {}", k, v))
                    .collect();
                f.write_str(&parts.join(", "))
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Form-based ledgers
// ---------------------------------------------------------------------------

pub const GUARANTEE_OTHER: &str = "Otros";
pub const COUNTER_GUARANTEE_OTHER: &str = "Otras (detallar)";

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct Guarantee {
    #[serde(rename = "Tipo Aval")]
    pub guarantee_type: String,
    #[serde(rename = "Detalle Aval")]
    pub guarantee_detail: String,
    #[serde(rename = "Monto")]
    pub amount: f64,
    #[serde(rename = "Tipo Contragarantía")]
    pub counter_guarantee_type: String,
    #[serde(rename = "Detalle Contragarantía")]
    pub counter_guarantee_detail: String,
}

impl Guarantee {
    /// Details are only kept when the selected type asks for one.
    pub fn new(
        guarantee_type: impl Into<String>,
        guarantee_detail: impl Into<String>,
        amount: f64,
        counter_guarantee_type: impl Into<String>,
        counter_guarantee_detail: impl Into<String>,
    ) -> Self {
        let guarantee_type = guarantee_type.into();
        let counter_guarantee_type = counter_guarantee_type.into();
        let guarantee_detail = if guarantee_type == GUARANTEE_OTHER {
            guarantee_detail.into()
        } else {
            String::new()
        };
        let counter_guarantee_detail = if counter_guarantee_type == COUNTER_GUARANTEE_OTHER {
            counter_guarantee_detail.into()
        } else {
            String::new()
        };
        Self {
            guarantee_type,
            guarantee_detail,
            amount,
            counter_guarantee_type,
            counter_guarantee_detail,
        }
    }
}

impl LedgerRow for Guarantee {
    const LEDGER: &'static str = "Avales";
    const COLUMNS: &'static [&'static str] = &[
        "Tipo Aval",
        "Detalle Aval",
        "Monto",
        "Tipo Contragarantía",
        "Detalle Contragarantía",
    ];
    const NUMERIC_COLUMNS: &'static [&'static str] = &["Monto"];

    fn validate(&self) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();
        require_text(&mut issues, "Tipo Aval", &self.guarantee_type);
        require_range(&mut issues, "Monto", self.amount, 0.0, f64::MAX);
        issues
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct Shareholder {
    #[serde(rename = "Nombre y Apellido")]
    pub full_name: String,
    #[serde(rename = "CUIT / CUIL")]
    pub tax_id: String,
    #[serde(rename = "Cargo")]
    pub role: String,
    #[serde(rename = "% Participación")]
    pub share_pct: f64,
    #[serde(rename = "Estado Civil")]
    pub marital_status: String,
    #[serde(rename = "Nombre Cónyuge")]
    pub spouse_name: String,
    #[serde(rename = "Fiador")]
    pub guarantor: String,
}

impl Shareholder {
    pub fn new(full_name: impl Into<String>, tax_id: impl Into<String>, share_pct: f64) -> Self {
        Self {
            full_name: full_name.into().trim().to_string(),
            tax_id: tax_id.into().trim().to_string(),
            share_pct,
            guarantor: "NO".to_string(),
            ..Default::default()
        }
    }
}

impl LedgerRow for Shareholder {
    const LEDGER: &'static str = "Filiatorios";
    const COLUMNS: &'static [&'static str] = &[
        "Nombre y Apellido",
        "CUIT / CUIL",
        "Cargo",
        "% Participación",
        "Estado Civil",
        "Nombre Cónyuge",
        "Fiador",
    ];
    const NUMERIC_COLUMNS: &'static [&'static str] = &["% Participación"];

    fn validate(&self) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();
        require_text(&mut issues, "Nombre y Apellido", &self.full_name);
        require_tax_id(&mut issues, "CUIT / CUIL", &self.tax_id);
        require_range(&mut issues, "% Participación", self.share_pct, 0.0, 100.0);
        issues
    }

    fn share(&self) -> Option<f64> {
        Some(self.share_pct)
    }

    fn share_field() -> &'static str {
        "% Participación"
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct CompanyLink {
    #[serde(rename = "Razón Social")]
    pub business_name: String,
    #[serde(rename = "CUIT")]
    pub tax_id: String,
    #[serde(rename = "% de Participación")]
    pub share_pct: f64,
    #[serde(rename = "Código de la actividad principal")]
    pub activity_code: String,
}

impl CompanyLink {
    pub fn new(
        business_name: impl Into<String>,
        tax_id: impl Into<String>,
        share_pct: f64,
        activity_code: impl Into<String>,
    ) -> Self {
        Self {
            business_name: business_name.into().trim().to_string(),
            tax_id: tax_id.into().trim().to_string(),
            share_pct,
            activity_code: activity_code.into().trim().to_string(),
        }
    }

    fn issues(&self) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();
        require_text(&mut issues, "Razón Social", &self.business_name);
        require_tax_id(&mut issues, "CUIT", &self.tax_id);
        require_range(&mut issues, "% de Participación", self.share_pct, 0.0, 100.0);
        issues
    }
}

const COMPANY_COLUMNS: &[&str] = &[
    "Razón Social",
    "CUIT",
    "% de Participación",
    "Código de la actividad principal",
];

/// Company holding a controlling (ascending) stake in the applicant.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct ControllingCompany(pub CompanyLink);

/// Company in which the applicant holds more than 20%.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct LinkedCompany(pub CompanyLink);

impl LedgerRow for ControllingCompany {
    const LEDGER: &'static str = "Empresas Controlantes";
    const COLUMNS: &'static [&'static str] = COMPANY_COLUMNS;
    const NUMERIC_COLUMNS: &'static [&'static str] = &["% de Participación"];

    fn validate(&self) -> Vec<ValidationIssue> {
        self.0.issues()
    }

    fn share(&self) -> Option<f64> {
        Some(self.0.share_pct)
    }

    fn share_field() -> &'static str {
        "% de Participación"
    }
}

impl LedgerRow for LinkedCompany {
    const LEDGER: &'static str = "Empresas Vinculadas";
    const COLUMNS: &'static [&'static str] = COMPANY_COLUMNS;
    const NUMERIC_COLUMNS: &'static [&'static str] = &["% de Participación"];

    fn validate(&self) -> Vec<ValidationIssue> {
        self.0.issues()
    }

    fn share(&self) -> Option<f64> {
        Some(self.0.share_pct)
    }

    fn share_field() -> &'static str {
        "% de Participación"
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct DiscountDrawer {
    #[serde(rename = "Denominación")]
    pub name: String,
    #[serde(rename = "CUIT")]
    pub tax_id: String,
    #[serde(rename = "Tipo")]
    pub kind: String,
    #[serde(rename = "Modalidad de Cobro")]
    pub collection_terms: String,
    #[serde(rename = "Descuenta de Cheques")]
    pub discounts_checks: String,
}

impl LedgerRow for DiscountDrawer {
    const LEDGER: &'static str = "Clientes a Descontar";
    const COLUMNS: &'static [&'static str] = &[
        "Denominación",
        "CUIT",
        "Tipo",
        "Modalidad de Cobro",
        "Descuenta de Cheques",
    ];

    fn validate(&self) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();
        require_text(&mut issues, "Denominación", &self.name);
        require_tax_id(&mut issues, "CUIT", &self.tax_id);
        issues
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct Supplier {
    #[serde(rename = "Denominación")]
    pub name: String,
    #[serde(rename = "CUIT")]
    pub tax_id: String,
    #[serde(rename = "Teléfono")]
    pub phone: String,
    #[serde(rename = "Local o Exterior")]
    pub origin: String,
    #[serde(rename = "Modalidad de Pago")]
    pub payment_mode: String,
    #[serde(rename = "Plazo en Días")]
    pub term: String,
    #[serde(rename = "% Compras")]
    pub purchases_pct: f64,
}

impl LedgerRow for Supplier {
    const LEDGER: &'static str = "Proveedores";
    const COLUMNS: &'static [&'static str] = &[
        "Denominación",
        "CUIT",
        "Teléfono",
        "Local o Exterior",
        "Modalidad de Pago",
        "Plazo en Días",
        "% Compras",
    ];
    const NUMERIC_COLUMNS: &'static [&'static str] = &["% Compras"];

    fn validate(&self) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();
        require_text(&mut issues, "Denominación", &self.name);
        require_tax_id(&mut issues, "CUIT", &self.tax_id);
        require_range(&mut issues, "% Compras", self.purchases_pct, 0.0, 100.0);
        issues
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct Customer {
    #[serde(rename = "Denominación")]
    pub name: String,
    #[serde(rename = "CUIT")]
    pub tax_id: String,
    #[serde(rename = "Teléfono")]
    pub phone: String,
    #[serde(rename = "Local o Exterior")]
    pub origin: String,
    #[serde(rename = "Modalidad de Pago")]
    pub payment_mode: String,
    #[serde(rename = "Plazo en Días")]
    pub term: String,
    #[serde(rename = "% Ventas")]
    pub sales_pct: f64,
}

impl LedgerRow for Customer {
    const LEDGER: &'static str = "Clientes";
    const COLUMNS: &'static [&'static str] = &[
        "Denominación",
        "CUIT",
        "Teléfono",
        "Local o Exterior",
        "Modalidad de Pago",
        "Plazo en Días",
        "% Ventas",
    ];
    const NUMERIC_COLUMNS: &'static [&'static str] = &["% Ventas"];

    fn validate(&self) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();
        require_text(&mut issues, "Denominación", &self.name);
        require_tax_id(&mut issues, "CUIT", &self.tax_id);
        require_range(&mut issues, "% Ventas", self.sales_pct, 0.0, 100.0);
        issues
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct Competitor {
    #[serde(rename = "Denominación")]
    pub name: String,
    #[serde(rename = "CUIT")]
    pub tax_id: String,
    #[serde(rename = "Teléfono")]
    pub phone: String,
    #[serde(rename = "Segmento")]
    pub segment: String,
    #[serde(rename = "Participacion del Mercado %")]
    pub market_share_pct: f64,
    #[serde(rename = "Condiciones de ventas")]
    pub sales_terms: String,
}

impl LedgerRow for Competitor {
    const LEDGER: &'static str = "Competidores";
    const COLUMNS: &'static [&'static str] = &[
        "Denominación",
        "CUIT",
        "Teléfono",
        "Segmento",
        "Participacion del Mercado %",
        "Condiciones de ventas",
    ];
    const NUMERIC_COLUMNS: &'static [&'static str] = &["Participacion del Mercado %"];

    fn validate(&self) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();
        require_text(&mut issues, "Denominación", &self.name);
        require_tax_id(&mut issues, "CUIT", &self.tax_id);
        require_range(
            &mut issues,
            "Participacion del Mercado %",
            self.market_share_pct,
            0.0,
            100.0,
        );
        issues
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct BankReference {
    #[serde(rename = "Entidad Financiera")]
    pub institution: String,
    #[serde(rename = "Contacto")]
    pub contact: String,
    #[serde(rename = "Sucursal")]
    pub branch: String,
    #[serde(rename = "Tel")]
    pub phone: String,
    #[serde(rename = "Mail")]
    pub email: String,
}

impl LedgerRow for BankReference {
    const LEDGER: &'static str = "Referencias Bancarias";
    const COLUMNS: &'static [&'static str] = &["Entidad Financiera", "Contacto", "Sucursal", "Tel", "Mail"];

    fn validate(&self) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();
        require_text(&mut issues, "Entidad Financiera", &self.institution);
        optional_email(&mut issues, &self.email);
        issues
    }
}

// ---------------------------------------------------------------------------
// Debt grids
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct BankDebt {
    #[serde(rename = "Entidad")]
    pub institution: String,
    #[serde(rename = "Saldo Préstamos Amortizables")]
    pub amortizing_balance: f64,
    #[serde(rename = "Garantía (*)")]
    pub collateral: String,
    #[serde(rename = "Valor de la Cuota")]
    pub installment_value: f64,
    #[serde(rename = "Régimen de Amortización (**)")]
    pub amortization_regime: String,
    #[serde(rename = "Cantidad Cuotas Faltantes")]
    pub installments_left: f64,
    #[serde(rename = "Descuento de Cheques Utilizado")]
    pub check_discount: f64,
    #[serde(rename = "Adelanto en Cta Cte Utilizado")]
    pub overdraft: f64,
    #[serde(rename = "Avales SGR")]
    pub sgr_guarantees: f64,
    #[serde(rename = "Tarjeta de Crédito Utilizado")]
    pub credit_card: f64,
    #[serde(rename = "Leasing Utilizado")]
    pub leasing: f64,
    #[serde(rename = "Impo/Expo Utilizado")]
    pub trade_finance: f64,
    #[serde(rename = "Tasa Promedio $")]
    pub rate_ars: f64,
    #[serde(rename = "Tasa Promedio USD")]
    pub rate_usd: f64,
    #[serde(rename = "Tipo de Moneda")]
    pub currency: Currency,
}

impl LedgerRow for BankDebt {
    const LEDGER: &'static str = "Deuda Bancaria";
    const COLUMNS: &'static [&'static str] = &[
        "Entidad",
        "Saldo Préstamos Amortizables",
        "Garantía (*)",
        "Valor de la Cuota",
        "Régimen de Amortización (**)",
        "Cantidad Cuotas Faltantes",
        "Descuento de Cheques Utilizado",
        "Adelanto en Cta Cte Utilizado",
        "Avales SGR",
        "Tarjeta de Crédito Utilizado",
        "Leasing Utilizado",
        "Impo/Expo Utilizado",
        "Tasa Promedio $",
        "Tasa Promedio USD",
        "Tipo de Moneda",
    ];
    const NUMERIC_COLUMNS: &'static [&'static str] = &[
        "Saldo Préstamos Amortizables",
        "Valor de la Cuota",
        "Cantidad Cuotas Faltantes",
        "Descuento de Cheques Utilizado",
        "Adelanto en Cta Cte Utilizado",
        "Avales SGR",
        "Tarjeta de Crédito Utilizado",
        "Leasing Utilizado",
        "Impo/Expo Utilizado",
        "Tasa Promedio $",
        "Tasa Promedio USD",
    ];
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct MarketDebt {
    #[serde(rename = "Obligaciones Negociables")]
    pub negotiable_obligations: f64,
    #[serde(rename = "Descuento de Cheques Propios")]
    pub own_check_discount: f64,
    #[serde(rename = "Pagaré Bursátil")]
    pub promissory_notes: f64,
    #[serde(rename = "Organismos Multilaterales (CFI)")]
    pub multilateral: f64,
    #[serde(rename = "Otros (1)")]
    pub other_1: String,
    #[serde(rename = "Otros (2)")]
    pub other_2: String,
    #[serde(rename = "Tasa Promedio $")]
    pub rate_ars: f64,
    #[serde(rename = "Tasa Promedio USD")]
    pub rate_usd: f64,
    #[serde(rename = "Tipo de Moneda")]
    pub currency: Currency,
}

impl LedgerRow for MarketDebt {
    const LEDGER: &'static str = "Deuda Mercado";
    const COLUMNS: &'static [&'static str] = &[
        "Obligaciones Negociables",
        "Descuento de Cheques Propios",
        "Pagaré Bursátil",
        "Organismos Multilaterales (CFI)",
        "Otros (1)",
        "Otros (2)",
        "Tasa Promedio $",
        "Tasa Promedio USD",
        "Tipo de Moneda",
    ];
    const NUMERIC_COLUMNS: &'static [&'static str] = &[
        "Obligaciones Negociables",
        "Descuento de Cheques Propios",
        "Pagaré Bursátil",
        "Organismos Multilaterales (CFI)",
        "Tasa Promedio $",
        "Tasa Promedio USD",
    ];
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct CommercialDebt {
    #[serde(rename = "A favor de")]
    pub creditor: String,
    #[serde(rename = "Tipo de Moneda")]
    pub currency: Currency,
    #[serde(rename = "Monto")]
    pub amount: f64,
    #[serde(rename = "Garantía")]
    pub collateral: String,
    #[serde(rename = "Tasa")]
    pub rate: f64,
    #[serde(rename = "Plazo (días)")]
    pub term_days: f64,
}

impl LedgerRow for CommercialDebt {
    const LEDGER: &'static str = "Deuda Comercial";
    const COLUMNS: &'static [&'static str] = &[
        "A favor de",
        "Tipo de Moneda",
        "Monto",
        "Garantía",
        "Tasa",
        "Plazo (días)",
    ];
    const NUMERIC_COLUMNS: &'static [&'static str] = &["Monto", "Tasa", "Plazo (días)"];
}

// ---------------------------------------------------------------------------
// Monthly sales / purchases
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AgroBranch {
    Unspecified,
    Agriculture,
    Livestock,
    Dairy,
    Other,
}

impl AgroBranch {
    pub fn label(&self) -> &'static str {
        match self {
            AgroBranch::Unspecified => UNSPECIFIED,
            AgroBranch::Agriculture => "AGRICULTURA",
            AgroBranch::Livestock => "GANADERIA",
            AgroBranch::Dairy => "TAMBO",
            AgroBranch::Other => "OTROS",
        }
    }

    fn parse(label: &str) -> Option<AgroBranch> {
        match label.trim() {
            "" | UNSPECIFIED => Some(AgroBranch::Unspecified),
            "AGRICULTURA" => Some(AgroBranch::Agriculture),
            "GANADERIA" => Some(AgroBranch::Livestock),
            "TAMBO" => Some(AgroBranch::Dairy),
            "OTROS" => Some(AgroBranch::Other),
            _ => None,
        }
    }
}

const UNSPECIFIED: &str = "COMPLETAR";

/// The "Tipo" of a monthly line. Only agricultural lines carry a sub-type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum Activity {
    #[default]
    Unspecified,
    Agro(AgroBranch),
    Industry,
    Commerce,
    Services,
    Construction,
}

impl Activity {
    /// Every "Tipo" label, in the order the form offers them.
    pub const SECTOR_LABELS: [&'static str; 6] = [
        UNSPECIFIED,
        "AGROPECUARIO",
        "INDUSTRIA",
        "COMERCIO",
        "SERVICIOS",
        "CONSTRUCCION",
    ];

    pub fn from_labels(sector: &str, branch: &str) -> Option<Activity> {
        let activity = match sector.trim() {
            "" | UNSPECIFIED => Activity::Unspecified,
            "AGROPECUARIO" => Activity::Agro(AgroBranch::parse(branch)?),
            "INDUSTRIA" => Activity::Industry,
            "COMERCIO" => Activity::Commerce,
            "SERVICIOS" => Activity::Services,
            "CONSTRUCCION" => Activity::Construction,
            _ => return None,
        };
        Some(activity)
    }

    pub fn sector_label(&self) -> &'static str {
        match self {
            Activity::Unspecified => UNSPECIFIED,
            Activity::Agro(_) => "AGROPECUARIO",
            Activity::Industry => "INDUSTRIA",
            Activity::Commerce => "COMERCIO",
            Activity::Services => "SERVICIOS",
            Activity::Construction => "CONSTRUCCION",
        }
    }

    pub fn branch_label(&self) -> &'static str {
        match self {
            Activity::Agro(branch) => branch.label(),
            _ => UNSPECIFIED,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
pub struct YearAmounts {
    pub current: f64,
    pub year_1: f64,
    pub year_2: f64,
    pub year_3: f64,
}

impl YearAmounts {
    pub const OFFSETS: [u32; 4] = [0, 1, 2, 3];

    pub fn new(current: f64, year_1: f64, year_2: f64, year_3: f64) -> Self {
        Self {
            current,
            year_1,
            year_2,
            year_3,
        }
    }

    /// Amount `offset` years before the current one.
    pub fn by_offset(&self, offset: u32) -> f64 {
        match offset {
            0 => self.current,
            1 => self.year_1,
            2 => self.year_2,
            3 => self.year_3,
            _ => 0.0,
        }
    }

    pub fn add(&mut self, other: &YearAmounts) {
        self.current += other.current;
        self.year_1 += other.year_1;
        self.year_2 += other.year_2;
        self.year_3 += other.year_3;
    }
}

/// One line of a monthly sales or purchases grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "MonthlyRecord", into = "MonthlyRecord")]
pub struct MonthlyRow {
    pub month: Month,
    pub activity: Activity,
    pub amounts: YearAmounts,
    pub region: Option<String>,
}

impl MonthlyRow {
    pub fn new(month: Month, activity: Activity, amounts: YearAmounts) -> Self {
        Self {
            month,
            activity,
            amounts,
            region: None,
        }
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
struct MonthlyRecord {
    #[serde(rename = "Mes")]
    month: Month,
    #[serde(rename = "Tipo", default)]
    sector: String,
    #[serde(rename = "Subtipo", default)]
    branch: String,
    #[serde(rename = "Año en curso", default)]
    current: f64,
    #[serde(rename = "Año 1", default)]
    year_1: f64,
    #[serde(rename = "Año 2", default)]
    year_2: f64,
    #[serde(rename = "Año 3", default)]
    year_3: f64,
    #[serde(rename = "Región", default, skip_serializing_if = "Option::is_none")]
    region: Option<String>,
}

impl TryFrom<MonthlyRecord> for MonthlyRow {
    type Error = String;

    fn try_from(record: MonthlyRecord) -> Result<Self, Self::Error> {
        let activity = Activity::from_labels(&record.sector, &record.branch).ok_or_else(|| {
            format!(
                "unknown activity Tipo='{}' Subtipo='{}'",
                record.sector, record.branch
            )
        })?;
        Ok(Self {
            month: record.month,
            activity,
            amounts: YearAmounts::new(record.current, record.year_1, record.year_2, record.year_3),
            region: record.region,
        })
    }
}

impl From<MonthlyRow> for MonthlyRecord {
    fn from(row: MonthlyRow) -> Self {
        Self {
            month: row.month,
            sector: row.activity.sector_label().to_string(),
            branch: row.activity.branch_label().to_string(),
            current: row.amounts.current,
            year_1: row.amounts.year_1,
            year_2: row.amounts.year_2,
            year_3: row.amounts.year_3,
            region: row.region,
        }
    }
}

impl JsonSchema for MonthlyRow {
    fn schema_name() -> String {
        "MonthlyRow".to_string()
    }

    fn json_schema(gen: &mut SchemaGenerator) -> Schema {
        MonthlyRecord::json_schema(gen)
    }
}

const MONTHLY_COLUMNS: &[&str] = &[
    "Mes",
    "Tipo",
    "Subtipo",
    "Año en curso",
    "Año 1",
    "Año 2",
    "Año 3",
];
const MONTHLY_NUMERIC: &[&str] = &["Año en curso", "Año 1", "Año 2", "Año 3"];

/// Access to the shared line of the three monthly ledgers.
pub trait MonthlyLine: LedgerRow {
    fn line(&self) -> &MonthlyRow;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct DomesticSale(pub MonthlyRow);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct ExportSale(pub MonthlyRow);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct Purchase(pub MonthlyRow);

impl LedgerRow for DomesticSale {
    const LEDGER: &'static str = "Ventas Interno";
    const COLUMNS: &'static [&'static str] = MONTHLY_COLUMNS;
    const NUMERIC_COLUMNS: &'static [&'static str] = MONTHLY_NUMERIC;
}

impl LedgerRow for ExportSale {
    const LEDGER: &'static str = "Ventas Externo";
    const COLUMNS: &'static [&'static str] = &[
        "Mes",
        "Tipo",
        "Subtipo",
        "Año en curso",
        "Año 1",
        "Año 2",
        "Año 3",
        "Región",
    ];
    const NUMERIC_COLUMNS: &'static [&'static str] = MONTHLY_NUMERIC;
}

impl LedgerRow for Purchase {
    const LEDGER: &'static str = "Compras";
    const COLUMNS: &'static [&'static str] = MONTHLY_COLUMNS;
    const NUMERIC_COLUMNS: &'static [&'static str] = MONTHLY_NUMERIC;
}

impl MonthlyLine for DomesticSale {
    fn line(&self) -> &MonthlyRow {
        &self.0
    }
}

impl MonthlyLine for ExportSale {
    fn line(&self) -> &MonthlyRow {
        &self.0
    }
}

impl MonthlyLine for Purchase {
    fn line(&self) -> &MonthlyRow {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_month_numbers() {
        assert_eq!(Month::Enero.number(), 1);
        assert_eq!(Month::Diciembre.number(), 12);
        assert_eq!(Month::from_number(3), Some(Month::Marzo));
        assert_eq!(Month::from_number(0), None);
        assert_eq!(Month::from_number(13), None);
    }

    #[test]
    fn test_monthly_row_uses_form_labels() {
        let row = MonthlyRow::new(
            Month::Marzo,
            Activity::Agro(AgroBranch::Agriculture),
            YearAmounts::new(10.0, 20.0, 0.0, 0.0),
        );

        let json = serde_json::to_value(&row).unwrap();
        assert_eq!(json["Mes"], "Marzo");
        assert_eq!(json["Tipo"], "AGROPECUARIO");
        assert_eq!(json["Subtipo"], "AGRICULTURA");
        assert_eq!(json["Año 1"], 20.0);
        assert!(json.get("Región").is_none());

        let back: MonthlyRow = serde_json::from_value(json).unwrap();
        assert_eq!(back, row);
    }

    #[test]
    fn test_subtype_only_kept_for_agro() {
        let activity = Activity::from_labels("INDUSTRIA", "TAMBO").unwrap();
        assert_eq!(activity, Activity::Industry);
        assert_eq!(activity.branch_label(), "COMPLETAR");

        assert!(Activity::from_labels("MINERIA", "").is_none());
        assert!(Activity::from_labels("AGROPECUARIO", "PESCA").is_none());
    }

    #[test]
    fn test_guarantee_details_follow_type() {
        let aval = Guarantee::new("Aval bancario", "ignored", 1000.0, "Hipoteca", "ignored");
        assert!(aval.guarantee_detail.is_empty());
        assert!(aval.counter_guarantee_detail.is_empty());

        let other = Guarantee::new(GUARANTEE_OTHER, "detalle", 1.0, COUNTER_GUARANTEE_OTHER, "x");
        assert_eq!(other.guarantee_detail, "detalle");
        assert_eq!(other.counter_guarantee_detail, "x");
    }

    #[test]
    fn test_answer_flattening() {
        let mut representative = BTreeMap::new();
        representative.insert("Nombre".to_string(), AnswerValue::from("Ana"));
        let mut group = BTreeMap::new();
        group.insert("Declaración PEP".to_string(), AnswerValue::from("NO"));
        group.insert("Representante".to_string(), AnswerValue::Group(representative));

        let mut out = Vec::new();
        AnswerValue::Group(group).flatten_into("Prevención Lavado", &mut out);
        let keys: Vec<&str> = out.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(
            keys,
            vec![
                "Prevención Lavado.Declaración PEP",
                "Prevención Lavado.Representante.Nombre"
            ]
        );
    }

    #[test]
    fn test_bank_reference_email_rule() {
        let reference = BankReference {
            institution: "Banco Nación".to_string(),
            email: "mal".to_string(),
            ..Default::default()
        };
        assert_eq!(reference.validate().len(), 1);
    }
}
