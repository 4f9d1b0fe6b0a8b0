use crate::schema::SalesLine;
use crate::utils::{
    month_name, normalize_month, normalize_period, normalize_period_value, split_period,
    MONTHS_NORMALIZED,
};
use chrono::{Datelike, Local};
use log::{debug, warn};
use std::collections::BTreeSet;

/// The accounting period a run is computed for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeriodContext {
    /// Latest period found on the sales lines, if any.
    pub line_period: Option<String>,
    /// The single `YYYY-MM` key of the run.
    pub current_period: Option<String>,
    pub reference_year: i32,
    /// Accent-stripped month used to pick direct-cost columns.
    pub current_month: &'static str,
}

impl PeriodContext {
    /// Resolves the period from the sales lines, falling back to the cost
    /// sheet's month label. `default_year` overrides the calendar year used
    /// when no line carries a period.
    pub fn resolve(lines: &[SalesLine], cost_month_label: &str, default_year: Option<i32>) -> Self {
        let line_period = latest_line_period(lines);

        let reference_year = line_period
            .as_deref()
            .and_then(split_period)
            .map(|(year, _)| year)
            .or(default_year)
            .unwrap_or_else(|| Local::now().year());

        let current_month = normalize_month(cost_month_label)
            .or_else(|| {
                line_period
                    .as_deref()
                    .and_then(split_period)
                    .and_then(|(_, month)| month_name(month))
            })
            .unwrap_or(MONTHS_NORMALIZED[0]);

        let sheet_period = normalize_period(
            &format!("{} {}", cost_month_label.trim(), reference_year),
            Some(reference_year),
        );

        let current_period = line_period.clone().or(sheet_period);

        match &current_period {
            Some(period) => debug!(
                "Resolved period {} (lines: {:?}, month label: '{}')",
                period, line_period, cost_month_label
            ),
            None => warn!(
                "No accounting period could be resolved from sales lines or month label '{}'",
                cost_month_label
            ),
        }

        Self {
            line_period,
            current_period,
            reference_year,
            current_month,
        }
    }

    pub fn current_period(&self) -> Option<&str> {
        self.current_period.as_deref()
    }
}

/// `YYYY-MM` keys sort chronologically, so the greatest tag is the latest.
fn latest_line_period(lines: &[SalesLine]) -> Option<String> {
    let periods: BTreeSet<String> = lines
        .iter()
        .filter_map(|line| line.period.as_ref())
        .filter_map(|value| normalize_period_value(value, None))
        .collect();

    periods.into_iter().next_back()
}
