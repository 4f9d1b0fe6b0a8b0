use crate::schema::CostRecord;
use crate::utils::{normalize_period, previous_year_period};
use log::debug;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Where the overhead (CIF) total of a run came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum OverheadSource {
    /// The run's own period.
    #[serde(rename = "ATUAL")]
    Current,
    /// The same month one year earlier.
    #[serde(rename = "ANO_PASSADO")]
    PriorYear,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OverheadSelection {
    pub total: f64,
    pub source: OverheadSource,
    /// Period whose bucket was used; `None` when the run has no period.
    pub period: Option<String>,
}

/// Sums every cost-center row into one bucket per `YYYY-MM` period.
/// Column labels that do not resolve to a period are skipped.
pub fn build_overhead_totals(
    records: &[CostRecord],
    reference_year: i32,
) -> BTreeMap<String, f64> {
    let mut totals: BTreeMap<String, f64> = BTreeMap::new();
    let mut skipped = 0usize;

    for record in records {
        for (label, raw) in &record.values {
            match normalize_period(label, Some(reference_year)) {
                Some(period) => *totals.entry(period).or_default() += raw.as_number(),
                None => skipped += 1,
            }
        }
    }

    debug!(
        "Aggregated overhead into {} periods ({} unresolved column labels skipped)",
        totals.len(),
        skipped
    );

    totals
}

/// Picks the overhead total of the run: the current period if present, else
/// the same month of the prior year, else the current period's (empty) bucket.
pub fn select_overhead(
    totals: &BTreeMap<String, f64>,
    current_period: Option<&str>,
) -> OverheadSelection {
    let Some(current) = current_period else {
        return OverheadSelection {
            total: 0.0,
            source: OverheadSource::Current,
            period: None,
        };
    };

    if let Some(total) = totals.get(current) {
        return OverheadSelection {
            total: *total,
            source: OverheadSource::Current,
            period: Some(current.to_string()),
        };
    }

    if let Some(previous) = previous_year_period(current) {
        if let Some(total) = totals.get(&previous) {
            return OverheadSelection {
                total: *total,
                source: OverheadSource::PriorYear,
                period: Some(previous),
            };
        }
    }

    OverheadSelection {
        total: 0.0,
        source: OverheadSource::Current,
        period: Some(current.to_string()),
    }
}
