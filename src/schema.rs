use crate::error::{CostingError, Result};
use crate::utils::parse_localized_number;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A raw spreadsheet cell as exported by the upstream sheet parsers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, Default)]
#[serde(untagged)]
pub enum CellValue {
    #[schemars(description = "A numeric cell, used as-is")]
    Number(f64),

    #[schemars(
        description = "A text cell. Numbers may use '.' as thousands separator and ',' as decimal separator (e.g. '1.234,56')"
    )]
    Text(String),

    #[default]
    #[schemars(description = "An empty cell")]
    Empty,

    #[schemars(description = "Any other JSON value (boolean, list, object). Reads as 0 and as empty text")]
    Other(serde_json::Value),
}

impl CellValue {
    /// Numeric reading of the cell. Anything unparsable reads as 0.
    pub fn as_number(&self) -> f64 {
        match self {
            CellValue::Number(n) if n.is_finite() => *n,
            CellValue::Number(_) => 0.0,
            CellValue::Text(text) => parse_localized_number(text),
            CellValue::Empty | CellValue::Other(_) => 0.0,
        }
    }

    /// Textual reading of the cell. Integral numbers render without a
    /// fractional part so a numeric code `1234` reads as `"1234"`.
    pub fn as_text(&self) -> String {
        match self {
            CellValue::Number(n) if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 => {
                format!("{}", *n as i64)
            }
            CellValue::Number(n) => n.to_string(),
            CellValue::Text(text) => text.clone(),
            CellValue::Empty | CellValue::Other(_) => String::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            CellValue::Empty | CellValue::Other(_) => true,
            CellValue::Text(text) => text.trim().is_empty(),
            CellValue::Number(_) => false,
        }
    }

    /// Text of the cell, or `None` when it reads as blank.
    pub fn non_empty_text(&self) -> Option<String> {
        if self.is_empty() {
            None
        } else {
            Some(self.as_text())
        }
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        CellValue::Number(value)
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        CellValue::Text(value.to_string())
    }
}

impl From<String> for CellValue {
    fn from(value: String) -> Self {
        CellValue::Text(value)
    }
}

/// One invoice item from the sales export.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default)]
pub struct SalesLine {
    #[serde(rename = "codigo", alias = "Codigo", default)]
    #[schemars(description = "Product code as printed on the invoice")]
    pub code: CellValue,

    #[serde(rename = "descricao", alias = "Descricao", default)]
    #[schemars(description = "Free-text product description from the invoice line")]
    pub description: CellValue,

    #[serde(rename = "quantidade", alias = "Quantidade", default)]
    pub quantity: CellValue,

    #[serde(rename = "unidade", alias = "Unidade", default)]
    pub unit: CellValue,

    #[serde(rename = "valorUnitario", alias = "ValorUnitario", default)]
    pub unit_value: CellValue,

    #[serde(rename = "valorTotal", alias = "ValorTotal", default)]
    #[schemars(description = "Line revenue (quantity times unit price, after discounts)")]
    pub total_value: CellValue,

    #[serde(rename = "mesKey", default)]
    #[schemars(
        description = "Accounting period of the invoice: 'YYYY-MM', 'MM/YYYY', a month name with year, or an Excel serial date"
    )]
    pub period: Option<CellValue>,
}

/// A row of a cost sheet. For direct-cost sheets a row is a product, for the
/// indirect-cost sheet a row is a cost center or category.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default)]
pub struct CostRecord {
    #[serde(rename = "Codigo", alias = "codigo", default)]
    pub code: CellValue,

    #[serde(rename = "Descricao", alias = "descricao", default)]
    pub description: CellValue,

    #[serde(rename = "Valores", alias = "valores", default)]
    #[schemars(
        description = "Monthly values keyed by column label (a month name such as 'Outubro', or a period such as '10/2024')"
    )]
    pub values: BTreeMap<String, CellValue>,
}

/// Everything one cost-breakdown run consumes.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default)]
pub struct CostBreakdownInput {
    #[serde(rename = "linhas", default)]
    pub lines: Vec<SalesLine>,

    #[serde(rename = "produtoDescricaoMap", default)]
    #[schemars(
        description = "Canonical product descriptions keyed by whitespace-stripped, uppercased product code"
    )]
    pub product_descriptions: BTreeMap<String, CellValue>,

    #[serde(rename = "custosDiretos", default)]
    pub direct_costs: Vec<CostRecord>,

    #[serde(rename = "custosDiretosAnoAnterior", default)]
    pub prior_direct_costs: Vec<CostRecord>,

    #[serde(rename = "custosIndiretos", default)]
    pub indirect_costs: Vec<CostRecord>,

    #[serde(rename = "mesCustoAtual", default)]
    #[schemars(description = "Free-text label of the current cost month, e.g. 'Outubro'")]
    pub current_cost_month: CellValue,
}

impl CostBreakdownInput {
    /// Parses a run input from JSON. Shape errors (e.g. an object where a list
    /// is required) are rejected here, before any computation starts.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| CostingError::InvalidInput(e.to_string()))
    }

    pub fn from_value(value: serde_json::Value) -> Result<Self> {
        serde_json::from_value(value).map_err(|e| CostingError::InvalidInput(e.to_string()))
    }

    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(CostBreakdownInput)
    }

    pub fn schema_as_json() -> std::result::Result<String, serde_json::Error> {
        let schema = Self::generate_json_schema();
        serde_json::to_string_pretty(&schema)
    }
}

/// Tunables of a run. Defaults reproduce the dashboard's behavior.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(default)]
pub struct AllocationConfig {
    #[schemars(
        description = "Residual above which a reconciliation adjustment is applied, and the verification tolerance"
    )]
    pub reconciliation_tolerance: f64,

    #[schemars(description = "Number of most profitable items reported in topItens")]
    pub top_items: usize,

    #[schemars(description = "Maximum length of the semCustoTop, zeroCostSkus and worstCases lists")]
    pub diagnostic_limit: usize,

    #[schemars(description = "Number of items in the random diagnostic sample (0 disables it)")]
    pub random_sample_size: usize,

    #[schemars(
        description = "Items whose total cost is below this fraction of their revenue are reported as worst cases"
    )]
    pub worst_case_ratio: f64,

    #[schemars(
        description = "Reference year used when no sales line carries a period. Defaults to the current calendar year."
    )]
    pub default_year: Option<i32>,
}

impl Default for AllocationConfig {
    fn default() -> Self {
        Self {
            reconciliation_tolerance: 0.01,
            top_items: 3,
            diagnostic_limit: 20,
            random_sample_size: 10,
            worst_case_ratio: 0.01,
            default_year: None,
        }
    }
}

impl AllocationConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| CostingError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.reconciliation_tolerance.is_finite() || self.reconciliation_tolerance < 0.0 {
            return Err(CostingError::InvalidConfig(format!(
                "reconciliation_tolerance must be a non-negative finite number, got {}",
                self.reconciliation_tolerance
            )));
        }

        if self.top_items == 0 {
            return Err(CostingError::InvalidConfig(
                "top_items must be at least 1".to_string(),
            ));
        }

        if !self.worst_case_ratio.is_finite() || self.worst_case_ratio < 0.0 {
            return Err(CostingError::InvalidConfig(format!(
                "worst_case_ratio must be a non-negative finite number, got {}",
                self.worst_case_ratio
            )));
        }

        Ok(())
    }
}
