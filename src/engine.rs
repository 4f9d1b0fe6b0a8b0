use crate::direct_costs::{table_total, DirectCostTable};
use crate::ingestion::AggregatedItem;
use crate::{CostedItem, DirectCostSource};
use indexmap::IndexMap;
use log::debug;

/// Assigns direct costs to aggregated SKUs.
///
/// Each SKU walks the fallback chain current sheet -> prior-year sheet ->
/// no cost. SKUs left without cost then receive a proxy share of the current
/// sheet's whole direct-cost pool, weighted by quantity (or by revenue when
/// no quantity basis exists).
pub struct CostAllocator<'a> {
    current: &'a DirectCostTable,
    prior: &'a DirectCostTable,
}

impl<'a> CostAllocator<'a> {
    pub fn new(current: &'a DirectCostTable, prior: &'a DirectCostTable) -> Self {
        Self { current, prior }
    }

    /// Total of every current-period entry, matched to a sale or not.
    pub fn direct_cost_pool(&self) -> f64 {
        table_total(self.current)
    }

    pub fn assign_direct_costs(
        &self,
        aggregated: &IndexMap<String, AggregatedItem>,
    ) -> Vec<CostedItem> {
        aggregated
            .values()
            .map(|item| self.assign_one(item))
            .collect()
    }

    fn assign_one(&self, item: &AggregatedItem) -> CostedItem {
        let current_unit_cost = self
            .current
            .get(&item.sku_normalized)
            .map(|entry| entry.value)
            .unwrap_or(0.0);
        let prior_unit_cost = self
            .prior
            .get(&item.sku_normalized)
            .map(|entry| entry.value)
            .unwrap_or(0.0);

        let (direct_source, unit_cost) = if current_unit_cost > 0.0 {
            (DirectCostSource::Current, current_unit_cost)
        } else if prior_unit_cost > 0.0 {
            (DirectCostSource::PriorYearFallback, prior_unit_cost)
        } else {
            (DirectCostSource::NoCost, 0.0)
        };

        CostedItem {
            code: item.sku_raw.clone(),
            sku_raw: item.sku_raw.clone(),
            sku_normalized: item.sku_normalized.clone(),
            description: item.description.clone(),
            unit: item.unit.clone(),
            quantity: item.quantity,
            revenue: item.revenue,
            unit_cost,
            direct_cost: unit_cost * item.quantity,
            direct_source,
            current_unit_cost,
            prior_unit_cost,
            proxy_cost: 0.0,
            weight: 0.0,
            allocated_overhead: 0.0,
            total_cost: 0.0,
            margin: 0.0,
            markup: 0.0,
        }
    }

    /// Spreads the direct-cost pool over the SKUs without cost data.
    /// Returns the pool that was used as the redistribution target.
    pub fn estimate_proxy_costs(&self, items: &mut [CostedItem]) -> f64 {
        let pool = self.direct_cost_pool();
        if pool <= 0.0 {
            return pool;
        }

        let (missing_quantity, missing_revenue) = items
            .iter()
            .filter(|item| item.direct_source == DirectCostSource::NoCost)
            .fold((0.0, 0.0), |(qty, rev), item| {
                (qty + item.quantity.max(0.0), rev + item.revenue)
            });

        let mut estimated = 0usize;
        for item in items
            .iter_mut()
            .filter(|item| item.direct_source == DirectCostSource::NoCost)
        {
            let proxy = if item.quantity > 0.0 && missing_quantity > 0.0 {
                (item.quantity / missing_quantity) * pool
            } else if item.revenue > 0.0 && missing_revenue > 0.0 {
                (item.revenue / missing_revenue) * pool
            } else {
                0.0
            };

            if proxy > 0.0 {
                item.direct_source = DirectCostSource::TheoreticalProxy;
                if item.quantity > 0.0 {
                    item.unit_cost = proxy / item.quantity;
                }
                item.direct_cost = proxy;
                item.proxy_cost = proxy;
                estimated += 1;
            }
        }

        debug!(
            "Estimated proxy direct cost for {} SKUs from a pool of {:.2} (missing quantity {}, missing revenue {:.2})",
            estimated, pool, missing_quantity, missing_revenue
        );

        pool
    }
}

/// Apportions the overhead total by each item's share of the positive
/// direct cost. Returns the apportionment base.
pub fn apportion_overhead(items: &mut [CostedItem], overhead_total: f64) -> f64 {
    let base: f64 = items
        .iter()
        .map(|item| item.direct_cost)
        .filter(|cost| *cost > 0.0)
        .sum();

    for item in items.iter_mut() {
        item.weight = if base > 0.0 && item.direct_cost > 0.0 {
            item.direct_cost / base
        } else {
            0.0
        };
        item.allocated_overhead = item.weight * overhead_total;
    }

    base
}

/// Computes total cost, margin and markup of every item.
pub fn finalize_items(items: &mut [CostedItem]) {
    for item in items.iter_mut() {
        if !item.allocated_overhead.is_finite() {
            item.allocated_overhead = 0.0;
        }

        item.total_cost = item.direct_cost + item.allocated_overhead;
        let profit = item.revenue - item.total_cost;

        item.margin = if item.revenue > 0.0 {
            profit / item.revenue * 100.0
        } else {
            0.0
        };
        item.markup = if item.total_cost > 0.0 {
            profit / item.total_cost * 100.0
        } else {
            0.0
        };
    }
}
