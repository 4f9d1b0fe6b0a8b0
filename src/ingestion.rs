use crate::schema::{CellValue, SalesLine};
use crate::sku::{normalize_product_code, SkuNormalizer};
use indexmap::IndexMap;
use log::debug;
use std::collections::BTreeMap;

/// Sales totals of one normalized SKU.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregatedItem {
    pub sku_raw: String,
    pub sku_normalized: String,
    pub description: String,
    pub quantity: f64,
    pub revenue: f64,
    pub unit: String,
}

/// Collapses invoice lines into one item per normalized SKU, in order of
/// first appearance. Lines whose code normalizes to empty are dropped.
pub fn aggregate_sales_lines(
    lines: &[SalesLine],
    product_descriptions: &BTreeMap<String, CellValue>,
    normalizer: &SkuNormalizer,
) -> IndexMap<String, AggregatedItem> {
    let mut aggregated: IndexMap<String, AggregatedItem> = IndexMap::new();
    let mut discarded = 0usize;

    for line in lines {
        let raw_code = line.code.as_text().trim().to_string();
        let sku = normalizer.normalize(&raw_code);
        if sku.is_empty() {
            discarded += 1;
            continue;
        }

        let quantity = line.quantity.as_number();
        let revenue = line.total_value.as_number();

        let item = aggregated.entry(sku.clone()).or_insert_with(|| AggregatedItem {
            description: resolve_description(line, &raw_code, &sku, product_descriptions),
            sku_raw: raw_code.clone(),
            sku_normalized: sku.clone(),
            quantity: 0.0,
            revenue: 0.0,
            unit: line.unit.as_text(),
        });

        item.quantity += quantity;
        item.revenue += revenue;
    }

    debug!(
        "Aggregated {} sales lines into {} SKUs ({} lines without a usable code)",
        lines.len(),
        aggregated.len(),
        discarded
    );

    aggregated
}

fn resolve_description(
    line: &SalesLine,
    raw_code: &str,
    sku: &str,
    product_descriptions: &BTreeMap<String, CellValue>,
) -> String {
    product_descriptions
        .get(&normalize_product_code(raw_code))
        .and_then(CellValue::non_empty_text)
        .or_else(|| product_descriptions.get(sku).and_then(CellValue::non_empty_text))
        .or_else(|| line.description.non_empty_text())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(code: &str, qty: f64, revenue: f64) -> SalesLine {
        SalesLine {
            code: CellValue::from(code),
            description: CellValue::from(format!("Linha {}", code)),
            quantity: CellValue::Number(qty),
            unit: CellValue::from("UN"),
            unit_value: CellValue::Empty,
            total_value: CellValue::Number(revenue),
            period: None,
        }
    }

    #[test]
    fn test_lines_sum_per_sku() {
        let lines = vec![
            line("AB12", 10.0, 1000.0),
            line("ab-12", 5.0, 500.0),
            line("ZZ9", 1.0, 10.0),
        ];

        let items = aggregate_sales_lines(&lines, &BTreeMap::new(), &SkuNormalizer::new(0));
        assert_eq!(items.len(), 2);

        let ab = items.get("AB12").unwrap();
        assert_eq!(ab.quantity, 15.0);
        assert_eq!(ab.revenue, 1500.0);
        assert_eq!(ab.sku_raw, "AB12");
        assert_eq!(ab.unit, "UN");

        let keys: Vec<&str> = items.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["AB12", "ZZ9"]);
    }

    #[test]
    fn test_blank_codes_discarded() {
        let lines = vec![line("  ", 3.0, 30.0), line("--", 1.0, 1.0)];
        let items = aggregate_sales_lines(&lines, &BTreeMap::new(), &SkuNormalizer::new(4));
        assert!(items.is_empty());
    }

    #[test]
    fn test_description_lookup_order() {
        let descriptions = BTreeMap::from([
            ("AB-12".to_string(), CellValue::from("Parafuso sextavado")),
            ("00ZZ9".to_string(), CellValue::from("Arruela")),
            ("QQ1".to_string(), CellValue::from("  ")),
        ]);
        let lines = vec![
            line("ab-12", 1.0, 1.0),
            line("ZZ9", 1.0, 1.0),
            line("QQ1", 1.0, 1.0),
        ];

        let items = aggregate_sales_lines(&lines, &descriptions, &SkuNormalizer::new(5));
        assert_eq!(items.get("0AB12").unwrap().description, "Parafuso sextavado");
        assert_eq!(items.get("00ZZ9").unwrap().description, "Arruela");
        assert_eq!(items.get("00QQ1").unwrap().description, "Linha QQ1");
    }

    #[test]
    fn test_numeric_description_cells_read_as_text() {
        let mut numeric = line("AB12", 1.0, 1.0);
        numeric.description = CellValue::Number(4711.0);
        numeric.unit = CellValue::Other(serde_json::Value::Bool(true));

        let items = aggregate_sales_lines(&[numeric], &BTreeMap::new(), &SkuNormalizer::new(0));
        let item = items.get("AB12").unwrap();
        assert_eq!(item.description, "4711");
        assert_eq!(item.unit, "");
    }
}
