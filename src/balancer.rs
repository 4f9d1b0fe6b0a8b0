use crate::error::{CostingError, Result};
use crate::report::CostBreakdown;
use crate::{CostedItem, DirectCostSource};
use log::{debug, warn};

/// Restores the pooled totals that per-item weighting can drift away from.
///
/// Both corrections absorb the whole residual into a single item rather than
/// spreading it.
pub struct CostBalancer {
    tolerance: f64,
}

impl CostBalancer {
    pub fn new(tolerance: f64) -> Self {
        Self { tolerance }
    }

    /// Makes `Theoretical` items sum to the direct-cost pool by adding the
    /// residual to the first such item. Returns the applied adjustment.
    pub fn absorb_theoretical_residual(&self, items: &mut [CostedItem], pool: f64) -> Option<f64> {
        let allocated: f64 = items
            .iter()
            .filter(|item| item.direct_source == DirectCostSource::Theoretical)
            .map(|item| item.direct_cost)
            .sum();
        let residual = pool - allocated;

        if residual.abs() <= self.tolerance {
            return None;
        }

        let first = items
            .iter_mut()
            .find(|item| item.direct_source == DirectCostSource::Theoretical)?;

        first.direct_cost += residual;
        if first.quantity > 0.0 {
            first.unit_cost = first.direct_cost / first.quantity;
        }

        debug!(
            "Absorbed theoretical residual {:.4} into SKU {}",
            residual, first.sku_normalized
        );
        Some(residual)
    }

    /// Makes the apportioned overhead sum to `overhead_total` by adding the
    /// residual to the item with the largest share (first one on ties).
    /// Returns the applied adjustment.
    pub fn absorb_overhead_residual(
        &self,
        items: &mut [CostedItem],
        overhead_total: f64,
    ) -> Option<f64> {
        let allocated: f64 = items.iter().map(|item| item.allocated_overhead).sum();
        let residual = overhead_total - allocated;

        if residual.abs() <= self.tolerance || items.is_empty() {
            return None;
        }

        let mut target = 0;
        for (idx, item) in items.iter().enumerate().skip(1) {
            if item.allocated_overhead > items[target].allocated_overhead {
                target = idx;
            }
        }

        let item = &mut items[target];
        item.allocated_overhead += residual;

        debug!(
            "Absorbed overhead residual {:.4} into SKU {}",
            residual, item.sku_normalized
        );
        Some(residual)
    }

    /// Checks the reconciliation invariants of a finished breakdown:
    /// the apportioned overhead matches the overhead total, and every item's
    /// cost adds up to direct cost plus overhead.
    pub fn verify(&self, breakdown: &CostBreakdown) -> Result<()> {
        if breakdown.items.is_empty() {
            if breakdown.summary.overhead_total.abs() > self.tolerance {
                warn!(
                    "Overhead of {:.2} left unallocated: no SKU with sales",
                    breakdown.summary.overhead_total
                );
            }
            return Ok(());
        }

        let summary = &breakdown.summary;
        let allocated: f64 = breakdown
            .items
            .iter()
            .map(|item| item.allocated_overhead)
            .sum();
        let difference = summary.overhead_total - allocated;
        if difference.abs() > self.tolerance {
            return Err(CostingError::ReconciliationViolation {
                expected: summary.overhead_total,
                allocated,
                difference,
            });
        }

        let direct: f64 = breakdown.items.iter().map(|item| item.direct_cost).sum();
        let total: f64 = breakdown.items.iter().map(|item| item.total_cost).sum();
        let difference = total - (direct + summary.overhead_total);
        if difference.abs() > self.tolerance {
            return Err(CostingError::TotalCostMismatch {
                total,
                direct,
                overhead: summary.overhead_total,
                difference,
            });
        }

        Ok(())
    }
}
