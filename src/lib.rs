//! # SKU Cost Allocation
//!
//! A library for computing, for every product code (SKU) sold in a period, a
//! reconciled total cost made of its direct cost plus an apportioned share of
//! the indirect costs (CIF), and the resulting margin and markup.
//!
//! ## Core Concepts
//!
//! - **Normalized SKU**: product codes from the sales export and the cost sheets
//!   are reduced to uppercase alphanumerics and zero-padded to the most common
//!   code length, so the same product matches across sources
//! - **Direct cost fallback**: current sheet, then the prior-year sheet, then a
//!   proxy share of the current sheet's cost pool
//! - **Overhead apportionment**: the period's CIF total is split by each SKU's
//!   share of direct cost
//! - **Reconciliation**: residuals from weighting are absorbed so that
//!   `sum(cost) == sum(direct cost) + CIF total`
//!
//! Bad numbers and missing lookups never abort a run: they degrade to zero and
//! show up in the report summary instead.
//!
//! ## Example
//!
//! ```rust,ignore
//! use sku_cost_allocation::*;
//!
//! let input = CostBreakdownInput::from_json(r#"{
//!     "linhas": [{"codigo": "AB12", "quantidade": 10, "valorTotal": 1000, "mesKey": "2024-10"}],
//!     "custosDiretos": [{"Codigo": "AB12", "Valores": {"Outubro": 2}}],
//!     "custosIndiretos": [{"Codigo": "Energia", "Valores": {"Outubro": 50}}],
//!     "mesCustoAtual": "Outubro"
//! }"#).unwrap();
//!
//! let breakdown = compute_cost_breakdown(&input).unwrap();
//! assert_eq!(breakdown.total, 70.0);
//! ```

pub mod balancer;
pub mod direct_costs;
pub mod engine;
pub mod error;
pub mod indirect_costs;
pub mod ingestion;
pub mod period;
pub mod report;
pub mod schema;
pub mod sku;
pub mod utils;

pub use balancer::CostBalancer;
pub use direct_costs::{build_direct_cost_table, DirectCostEntry, DirectCostTable};
pub use engine::{apportion_overhead, finalize_items, CostAllocator};
pub use error::{CostingError, Result};
pub use indirect_costs::{build_overhead_totals, select_overhead, OverheadSelection, OverheadSource};
pub use ingestion::{aggregate_sales_lines, AggregatedItem};
pub use period::PeriodContext;
pub use report::{AllocationSummary, CostBreakdown, MissingCostEntry, SampleEntry, SkuDiagnostic};
pub use schema::*;
pub use sku::{normalize_product_code, SkuNormalizer};

use log::{debug, info};
use serde::{Deserialize, Serialize};

/// How an item's direct cost was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DirectCostSource {
    /// Positive unit cost in the current cost sheet.
    #[serde(rename = "ATUAL")]
    Current,
    /// Positive unit cost in the prior-year cost sheet.
    #[serde(rename = "FALLBACK_ANO_PASSADO")]
    PriorYearFallback,
    /// Proxy share of the current direct-cost pool.
    #[serde(rename = "TEORICO_PROXY")]
    TheoreticalProxy,
    /// Theoretical allocation. No stage assigns it today, but the balancer
    /// reconciles it against the direct-cost pool when present.
    #[serde(rename = "TEORICO")]
    Theoretical,
    /// No cost data and no proxy basis.
    #[serde(rename = "SEM_CUSTO")]
    NoCost,
}

/// One SKU of the breakdown, enriched stage by stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostedItem {
    #[serde(rename = "codigo")]
    pub code: String,
    #[serde(rename = "skuRaw")]
    pub sku_raw: String,
    #[serde(rename = "skuNormalized")]
    pub sku_normalized: String,
    #[serde(rename = "descricao")]
    pub description: String,
    #[serde(rename = "unidade")]
    pub unit: String,
    #[serde(rename = "quantidade")]
    pub quantity: f64,
    #[serde(rename = "receita")]
    pub revenue: f64,
    #[serde(rename = "custoUnitario")]
    pub unit_cost: f64,
    /// Unit cost times quantity, or the proxy amount.
    #[serde(rename = "custoDireto")]
    pub direct_cost: f64,
    #[serde(rename = "fonteDireto")]
    pub direct_source: DirectCostSource,
    #[serde(rename = "custoDiretoAtualValor")]
    pub current_unit_cost: f64,
    #[serde(rename = "custoDiretoPrevValor")]
    pub prior_unit_cost: f64,
    #[serde(rename = "custoDiretoTeorico")]
    pub proxy_cost: f64,
    /// Share of the apportionment base.
    #[serde(rename = "peso")]
    pub weight: f64,
    #[serde(rename = "cifRateado")]
    pub allocated_overhead: f64,
    /// Direct cost plus apportioned overhead.
    #[serde(rename = "custo")]
    pub total_cost: f64,
    /// Percent of revenue.
    #[serde(rename = "margem")]
    pub margin: f64,
    /// Percent over cost.
    pub markup: f64,
}

pub struct CostAllocationProcessor;

impl CostAllocationProcessor {
    pub fn process(input: &CostBreakdownInput, config: &AllocationConfig) -> Result<CostBreakdown> {
        config.validate()?;

        debug!(
            "Input contains {} sales lines, {} current and {} prior direct-cost rows, {} overhead rows",
            input.lines.len(),
            input.direct_costs.len(),
            input.prior_direct_costs.len(),
            input.indirect_costs.len()
        );

        let period = PeriodContext::resolve(
            &input.lines,
            &input.current_cost_month.as_text(),
            config.default_year,
        );

        let normalizer = SkuNormalizer::from_raw_codes(collect_raw_codes(input));

        let current_table =
            build_direct_cost_table(&input.direct_costs, period.current_month, &normalizer);
        let prior_table =
            build_direct_cost_table(&input.prior_direct_costs, period.current_month, &normalizer);
        debug!(
            "Direct cost tables: {} current entries, {} prior entries",
            current_table.len(),
            prior_table.len()
        );

        let overhead_totals = build_overhead_totals(&input.indirect_costs, period.reference_year);
        let overhead = select_overhead(&overhead_totals, period.current_period());

        let aggregated = aggregate_sales_lines(&input.lines, &input.product_descriptions, &normalizer);

        let allocator = CostAllocator::new(&current_table, &prior_table);
        let balancer = CostBalancer::new(config.reconciliation_tolerance);

        let mut items = allocator.assign_direct_costs(&aggregated);
        let pool = allocator.estimate_proxy_costs(&mut items);
        balancer.absorb_theoretical_residual(&mut items, pool);

        let apportionment_base = apportion_overhead(&mut items, overhead.total);
        balancer.absorb_overhead_residual(&mut items, overhead.total);
        finalize_items(&mut items);

        let context = report::ReportContext {
            period: &period,
            overhead: &overhead,
            apportionment_base,
        };
        let breakdown = report::build_report(items, &context, config);

        let summary = &breakdown.summary;
        info!(
            "Cost breakdown for period {}: {} SKUs, total cost {:.2}, CIF {:.2} from {} ({:?}), base {:.2}, residual {:.4}",
            summary.period,
            breakdown.items.len(),
            breakdown.total,
            summary.overhead_total,
            if summary.overhead_period.is_empty() {
                report::NO_PERIOD_LABEL
            } else {
                summary.overhead_period.as_str()
            },
            summary.overhead_source,
            summary.apportionment_base,
            summary.difference
        );
        info!("Direct cost sources: {:?}", summary.counts);

        Ok(breakdown)
    }

    pub fn process_with_verification(
        input: &CostBreakdownInput,
        config: &AllocationConfig,
    ) -> Result<CostBreakdown> {
        let breakdown = Self::process(input, config)?;

        CostBalancer::new(config.reconciliation_tolerance).verify(&breakdown)?;

        Ok(breakdown)
    }
}

pub fn compute_cost_breakdown(input: &CostBreakdownInput) -> Result<CostBreakdown> {
    CostAllocationProcessor::process(input, &AllocationConfig::default())
}

pub fn compute_with_verification(
    input: &CostBreakdownInput,
    config: &AllocationConfig,
) -> Result<CostBreakdown> {
    CostAllocationProcessor::process_with_verification(input, config)
}

/// Snapshot of every product code taken before any normalization, since the
/// pad length depends on all of them.
fn collect_raw_codes(input: &CostBreakdownInput) -> Vec<String> {
    input
        .lines
        .iter()
        .map(|line| line.code.as_text())
        .chain(input.direct_costs.iter().map(|record| record.code.as_text()))
        .chain(input.prior_direct_costs.iter().map(|record| record.code.as_text()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sale(code: &str, qty: f64, revenue: f64, period: &str) -> SalesLine {
        SalesLine {
            code: CellValue::from(code),
            description: CellValue::Empty,
            quantity: CellValue::Number(qty),
            unit: CellValue::from("UN"),
            unit_value: CellValue::Empty,
            total_value: CellValue::Number(revenue),
            period: Some(CellValue::from(period)),
        }
    }

    fn cost(code: &str, label: &str, value: f64) -> CostRecord {
        CostRecord {
            code: CellValue::from(code),
            description: CellValue::Empty,
            values: [(label.to_string(), CellValue::Number(value))].into_iter().collect(),
        }
    }

    fn config() -> AllocationConfig {
        AllocationConfig {
            default_year: Some(2024),
            ..Default::default()
        }
    }

    #[test]
    fn test_end_to_end_processing() {
        let input = CostBreakdownInput {
            lines: vec![
                sale("1001", 10.0, 1000.0, "2024-10"),
                sale("1002", 4.0, 400.0, "2024-10"),
                sale("77", 2.0, 100.0, "2024-10"),
            ],
            direct_costs: vec![
                cost("1001", "Outubro", 20.0),
                cost("2000", "Outubro", 30.0),
            ],
            prior_direct_costs: vec![cost("1002", "Outubro", 25.0)],
            indirect_costs: vec![cost("Energia", "Outubro", 170.0)],
            current_cost_month: CellValue::from("Outubro"),
            ..Default::default()
        };

        let breakdown = CostAllocationProcessor::process_with_verification(&input, &config()).unwrap();
        assert_eq!(breakdown.items.len(), 3);

        let a = breakdown.item("1001").unwrap();
        assert_eq!(a.direct_source, DirectCostSource::Current);
        assert_eq!(a.direct_cost, 200.0);

        let b = breakdown.item("1002").unwrap();
        assert_eq!(b.direct_source, DirectCostSource::PriorYearFallback);
        assert_eq!(b.direct_cost, 100.0);

        // "77" pads to "0077", has no cost anywhere, takes the whole pool
        let c = breakdown.item("0077").unwrap();
        assert_eq!(c.direct_source, DirectCostSource::TheoreticalProxy);
        assert!((c.direct_cost - 50.0).abs() < 1e-9);

        assert!((breakdown.summary.overhead_total - 170.0).abs() < 1e-9);
        assert!(breakdown.summary.difference.abs() <= 0.01);
        assert!((breakdown.total - (350.0 + 170.0)).abs() < 1e-6);
    }

    #[test]
    fn test_invalid_config_fails_before_output() {
        let bad = AllocationConfig {
            reconciliation_tolerance: f64::NAN,
            ..Default::default()
        };
        let result = CostAllocationProcessor::process(&CostBreakdownInput::default(), &bad);
        assert!(matches!(result, Err(CostingError::InvalidConfig(_))));
    }

    #[test]
    fn test_empty_input_gives_complete_report() {
        let breakdown = CostAllocationProcessor::process(&CostBreakdownInput::default(), &config()).unwrap();
        assert!(breakdown.items.is_empty());
        assert_eq!(breakdown.total, 0.0);
        assert_eq!(breakdown.summary.period, "sem periodo");
        assert_eq!(breakdown.summary.counts.len(), 4);
    }
}
