use crate::error::Result;
use crate::indirect_costs::{OverheadSelection, OverheadSource};
use crate::period::PeriodContext;
use crate::schema::AllocationConfig;
use crate::{CostedItem, DirectCostSource};
use log::{debug, warn};
use rand::seq::SliceRandom;
use rand::thread_rng;
use serde::Serialize;
use std::collections::BTreeMap;

/// Label used when a run has no accounting period.
pub const NO_PERIOD_LABEL: &str = "sem periodo";

/// Result of one cost-breakdown run.
#[derive(Debug, Clone, Serialize)]
pub struct CostBreakdown {
    /// Sum of every item's total cost.
    pub total: f64,
    #[serde(rename = "itens")]
    pub items: Vec<CostedItem>,
    #[serde(rename = "topItens")]
    pub top_items: Vec<CostedItem>,
    pub summary: AllocationSummary,
}

impl CostBreakdown {
    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn item(&self, sku_normalized: &str) -> Option<&CostedItem> {
        self.items
            .iter()
            .find(|item| item.sku_normalized == sku_normalized)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AllocationSummary {
    #[serde(rename = "periodo")]
    pub period: String,
    #[serde(rename = "periodoCif")]
    pub overhead_period: String,
    #[serde(rename = "cifTotal")]
    pub overhead_total: f64,
    #[serde(rename = "cifFonte")]
    pub overhead_source: OverheadSource,
    #[serde(rename = "baseRateioMes")]
    pub apportionment_base: f64,
    #[serde(rename = "totalDirect")]
    pub total_direct: f64,
    pub counts: BTreeMap<DirectCostSource, usize>,
    #[serde(rename = "alocado")]
    pub allocated: f64,
    /// Overhead total minus apportioned overhead; ~0 after reconciliation.
    #[serde(rename = "diferenca")]
    pub difference: f64,
    /// Total cost minus (positive direct cost + overhead total).
    #[serde(rename = "diffTotal")]
    pub total_difference: f64,
    #[serde(rename = "semCustoTop")]
    pub missing_cost_top: Vec<MissingCostEntry>,
    #[serde(rename = "zeroCostSkus")]
    pub zero_cost_skus: Vec<SkuDiagnostic>,
    #[serde(rename = "worstCases")]
    pub worst_cases: Vec<SkuDiagnostic>,
    /// Random picks for manual spot checks. Not deterministic.
    #[serde(rename = "randomSample")]
    pub random_sample: Vec<SampleEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MissingCostEntry {
    #[serde(rename = "codigo")]
    pub code: String,
    #[serde(rename = "descricao")]
    pub description: String,
    #[serde(rename = "receita")]
    pub revenue: f64,
}

/// One suspicious SKU, with the run totals it was costed against.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkuDiagnostic {
    pub sku_raw: String,
    #[serde(rename = "sku_norm")]
    pub sku_normalized: String,
    /// Only set on worst cases.
    #[serde(rename = "periodo", skip_serializing_if = "Option::is_none")]
    pub period: Option<String>,
    #[serde(rename = "qtd")]
    pub quantity: f64,
    #[serde(rename = "receita")]
    pub revenue: f64,
    #[serde(rename = "direto_atual_valor")]
    pub current_unit_cost: f64,
    #[serde(rename = "direto_passado_valor")]
    pub prior_unit_cost: f64,
    #[serde(rename = "direto_final")]
    pub direct_cost: f64,
    #[serde(rename = "fonte")]
    pub source: DirectCostSource,
    /// Positive direct-cost sum of the run.
    #[serde(rename = "sumDirectMes")]
    pub direct_sum: f64,
    #[serde(rename = "cif_total_mes")]
    pub overhead_total: f64,
    #[serde(rename = "cif_rateado")]
    pub allocated_overhead: f64,
    #[serde(rename = "custo_total")]
    pub total_cost: f64,
}

/// Run totals repeated on every diagnostic entry.
#[derive(Debug, Clone, Copy, PartialEq)]
struct RunTotals {
    direct_sum: f64,
    overhead_total: f64,
}

impl SkuDiagnostic {
    fn new(item: &CostedItem, totals: RunTotals, period: Option<&str>) -> Self {
        Self {
            sku_raw: item.sku_raw.clone(),
            sku_normalized: item.sku_normalized.clone(),
            period: period.map(str::to_string),
            quantity: item.quantity,
            revenue: item.revenue,
            current_unit_cost: item.current_unit_cost,
            prior_unit_cost: item.prior_unit_cost,
            direct_cost: item.direct_cost,
            source: item.direct_source,
            direct_sum: totals.direct_sum,
            overhead_total: totals.overhead_total,
            allocated_overhead: item.allocated_overhead,
            total_cost: item.total_cost,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SampleEntry {
    pub sku_raw: String,
    #[serde(rename = "sku_norm")]
    pub sku_normalized: String,
    #[serde(rename = "qtd")]
    pub quantity: f64,
    #[serde(rename = "receita_total")]
    pub revenue: f64,
    #[serde(rename = "custo_total")]
    pub total_cost: f64,
    #[serde(rename = "custo_direto_final")]
    pub direct_cost: f64,
    #[serde(rename = "cif_rateado")]
    pub allocated_overhead: f64,
    /// Total cost per unit, 0 without quantity.
    #[serde(rename = "custo_unitario")]
    pub unit_total_cost: f64,
}

/// Run-level figures the report needs besides the items themselves.
pub struct ReportContext<'a> {
    pub period: &'a PeriodContext,
    pub overhead: &'a OverheadSelection,
    pub apportionment_base: f64,
}

pub fn build_report(
    items: Vec<CostedItem>,
    context: &ReportContext<'_>,
    config: &AllocationConfig,
) -> CostBreakdown {
    let overhead_total = context.overhead.total;

    let total: f64 = items.iter().map(|item| item.total_cost).sum();
    let total_direct: f64 = items
        .iter()
        .map(|item| item.direct_cost)
        .filter(|cost| *cost > 0.0)
        .sum();
    let allocated: f64 = items.iter().map(|item| item.allocated_overhead).sum();

    let period = context.period.current_period().unwrap_or(NO_PERIOD_LABEL);
    let totals = RunTotals {
        direct_sum: total_direct,
        overhead_total,
    };

    let summary = AllocationSummary {
        period: period.to_string(),
        overhead_period: context.overhead.period.clone().unwrap_or_default(),
        overhead_total,
        overhead_source: context.overhead.source,
        apportionment_base: context.apportionment_base,
        total_direct,
        counts: count_sources(&items),
        allocated,
        difference: overhead_total - allocated,
        total_difference: total - (total_direct + overhead_total),
        missing_cost_top: missing_cost_top(&items, config.diagnostic_limit),
        zero_cost_skus: zero_cost_skus(&items, totals, config.diagnostic_limit),
        worst_cases: worst_cases(
            &items,
            totals,
            period,
            config.worst_case_ratio,
            config.diagnostic_limit,
        ),
        random_sample: random_sample(&items, config.random_sample_size),
    };

    if !summary.zero_cost_skus.is_empty() {
        warn!(
            "{} SKUs with revenue ended with zero cost",
            summary.zero_cost_skus.len()
        );
        for diagnostic in &summary.zero_cost_skus {
            debug!("Zero-cost SKU: {:?}", diagnostic);
        }
    }

    if !summary.worst_cases.is_empty() {
        warn!(
            "{} SKUs cost less than {}% of their revenue",
            summary.worst_cases.len(),
            config.worst_case_ratio * 100.0
        );
        for diagnostic in &summary.worst_cases {
            debug!("Worst case SKU: {:?}", diagnostic);
        }
    }

    let top_items = top_items(&items, config.top_items);

    CostBreakdown {
        total,
        items,
        top_items,
        summary,
    }
}

/// Every tag the fallback chain can end in starts at zero.
pub fn count_sources(items: &[CostedItem]) -> BTreeMap<DirectCostSource, usize> {
    let mut counts: BTreeMap<DirectCostSource, usize> = [
        DirectCostSource::Current,
        DirectCostSource::PriorYearFallback,
        DirectCostSource::TheoreticalProxy,
        DirectCostSource::NoCost,
    ]
    .into_iter()
    .map(|source| (source, 0))
    .collect();

    for item in items {
        *counts.entry(item.direct_source).or_default() += 1;
    }

    counts
}

/// Most profitable items (revenue minus cost) among items with revenue.
pub fn top_items(items: &[CostedItem], limit: usize) -> Vec<CostedItem> {
    let mut with_revenue: Vec<&CostedItem> =
        items.iter().filter(|item| item.revenue > 0.0).collect();
    with_revenue.sort_by(|a, b| {
        (b.revenue - b.total_cost).total_cmp(&(a.revenue - a.total_cost))
    });
    with_revenue.into_iter().take(limit).cloned().collect()
}

fn by_revenue_desc<'a>(mut items: Vec<&'a CostedItem>) -> Vec<&'a CostedItem> {
    items.sort_by(|a, b| b.revenue.total_cmp(&a.revenue));
    items
}

fn missing_cost_top(items: &[CostedItem], limit: usize) -> Vec<MissingCostEntry> {
    let missing = items
        .iter()
        .filter(|item| item.direct_source == DirectCostSource::NoCost)
        .collect();

    by_revenue_desc(missing)
        .into_iter()
        .take(limit)
        .map(|item| MissingCostEntry {
            code: if item.code.is_empty() {
                item.sku_normalized.clone()
            } else {
                item.code.clone()
            },
            description: item.description.clone(),
            revenue: item.revenue,
        })
        .collect()
}

fn zero_cost_skus(items: &[CostedItem], totals: RunTotals, limit: usize) -> Vec<SkuDiagnostic> {
    items
        .iter()
        .filter(|item| item.revenue > 0.0 && item.total_cost == 0.0)
        .take(limit)
        .map(|item| SkuDiagnostic::new(item, totals, None))
        .collect()
}

fn worst_cases(
    items: &[CostedItem],
    totals: RunTotals,
    period: &str,
    ratio: f64,
    limit: usize,
) -> Vec<SkuDiagnostic> {
    let suspicious = items
        .iter()
        .filter(|item| {
            item.revenue > 0.0 && item.total_cost > 0.0 && item.total_cost < item.revenue * ratio
        })
        .collect();

    by_revenue_desc(suspicious)
        .into_iter()
        .take(limit)
        .map(|item| SkuDiagnostic::new(item, totals, Some(period)))
        .collect()
}

fn random_sample(items: &[CostedItem], size: usize) -> Vec<SampleEntry> {
    if size == 0 {
        return Vec::new();
    }

    let with_revenue: Vec<&CostedItem> = items.iter().filter(|item| item.revenue > 0.0).collect();
    let mut rng = thread_rng();

    let sample: Vec<SampleEntry> = with_revenue
        .choose_multiple(&mut rng, size)
        .map(|item| SampleEntry {
            sku_raw: item.sku_raw.clone(),
            sku_normalized: item.sku_normalized.clone(),
            quantity: item.quantity,
            revenue: item.revenue,
            total_cost: item.total_cost,
            direct_cost: item.direct_cost,
            allocated_overhead: item.allocated_overhead,
            unit_total_cost: if item.quantity > 0.0 {
                item.total_cost / item.quantity
            } else {
                0.0
            },
        })
        .collect();

    debug!("Random SKU sample: {:?}", sample);
    sample
}
