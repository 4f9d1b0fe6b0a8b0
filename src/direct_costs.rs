use crate::schema::{CellValue, CostRecord};
use crate::sku::SkuNormalizer;
use crate::utils::{normalize_month, MONTHS_NORMALIZED};
use log::debug;
use serde::Serialize;
use std::collections::BTreeMap;

/// Per-unit direct cost of one SKU in one cost sheet.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DirectCostEntry {
    pub value: f64,
    /// Month column the value was taken from.
    pub month: &'static str,
    pub description: String,
    pub raw_code: String,
}

/// Normalized SKU -> direct cost entry.
pub type DirectCostTable = BTreeMap<String, DirectCostEntry>;

/// Picks the monthly value to use for a record.
///
/// The current month wins when it holds a positive value; otherwise the
/// latest month (December backwards) with a positive value is used. Labels
/// that are not month names are ignored.
pub fn find_monthly_value(
    values: &BTreeMap<String, CellValue>,
    current_month: &str,
) -> Option<(f64, &'static str)> {
    let mut by_month: BTreeMap<&'static str, f64> = BTreeMap::new();
    for (label, raw) in values {
        if let Some(month) = normalize_month(label) {
            by_month.insert(month, raw.as_number());
        }
    }

    if let Some((&name, &value)) = by_month.get_key_value(current_month) {
        if value > 0.0 {
            return Some((value, name));
        }
    }

    MONTHS_NORMALIZED.iter().rev().find_map(|month| {
        by_month
            .get(month)
            .filter(|value| **value > 0.0)
            .map(|value| (*value, *month))
    })
}

/// Builds the lookup table of one direct-cost sheet.
pub fn build_direct_cost_table(
    records: &[CostRecord],
    current_month: &str,
    normalizer: &SkuNormalizer,
) -> DirectCostTable {
    let mut table = DirectCostTable::new();

    for record in records {
        let raw_code = record.code.as_text();
        let sku = normalizer.normalize(&raw_code);
        if sku.is_empty() {
            continue;
        }

        let Some((value, month)) = find_monthly_value(&record.values, current_month) else {
            continue;
        };

        let entry = DirectCostEntry {
            value,
            month,
            description: record.description.as_text(),
            raw_code,
        };

        if let Some(previous) = table.insert(sku.clone(), entry) {
            debug!(
                "Duplicate direct cost for SKU {} (raw '{}'), keeping the later row",
                sku, previous.raw_code
            );
        }
    }

    table
}

/// Sum of every entry of a table: the whole direct-cost pool of the sheet.
pub fn table_total(table: &DirectCostTable) -> f64 {
    table.values().map(|entry| entry.value).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(code: &str, values: &[(&str, CellValue)]) -> CostRecord {
        CostRecord {
            code: CellValue::from(code),
            description: CellValue::from(format!("Produto {}", code)),
            values: values
                .iter()
                .map(|(label, value)| (label.to_string(), value.clone()))
                .collect(),
        }
    }

    #[test]
    fn test_current_month_preferred() {
        let r = record(
            "A1",
            &[("Outubro", 2.0.into()), ("Dezembro", 9.0.into())],
        );
        assert_eq!(
            find_monthly_value(&r.values, "outubro"),
            Some((2.0, "outubro"))
        );
    }

    #[test]
    fn test_falls_back_to_latest_positive_month() {
        let r = record(
            "A1",
            &[
                ("Outubro", 0.0.into()),
                ("Março", "3,5".into()),
                ("Agosto", "7".into()),
                ("Dezembro", "-1".into()),
                ("Total", 99.0.into()),
            ],
        );
        assert_eq!(
            find_monthly_value(&r.values, "outubro"),
            Some((7.0, "agosto"))
        );
        assert_eq!(find_monthly_value(&r.values, "janeiro"), Some((7.0, "agosto")));
    }

    #[test]
    fn test_january_beats_later_months_when_current() {
        let r = record("A1", &[("Janeiro", 5.0.into()), ("Dezembro", 7.0.into())]);
        assert_eq!(find_monthly_value(&r.values, "janeiro"), Some((5.0, "janeiro")));
    }

    #[test]
    fn test_no_positive_month() {
        let r = record("A1", &[("Janeiro", 0.0.into()), ("Total", 5.0.into())]);
        assert_eq!(find_monthly_value(&r.values, "janeiro"), None);
    }

    #[test]
    fn test_build_table_normalizes_and_skips() {
        let records = vec![
            record("ab-1", &[("Outubro", 2.0.into())]),
            record("", &[("Outubro", 5.0.into())]),
            record("C3", &[("Outubro", 0.0.into())]),
            record("AB1", &[("Outubro", 4.0.into())]),
        ];

        let normalizer = SkuNormalizer::new(4);
        let table = build_direct_cost_table(&records, "outubro", &normalizer);

        assert_eq!(table.len(), 1);
        let entry = table.get("0AB1").unwrap();
        assert_eq!(entry.value, 4.0);
        assert_eq!(entry.month, "outubro");
        assert_eq!(entry.raw_code, "AB1");
        assert_eq!(table_total(&table), 4.0);
    }
}
