//! Purchase history and refill suggestions.

use crate::inventory::DEFAULT_TOTAL_STOCK;
use crate::{Cabinet, Medication, Refill, Unit};

/// Unit prices within this distance of the lowest one count as best
const BEST_PRICE_TOLERANCE: f64 = 0.001;

/// A refill annotated for display
#[derive(Clone, Debug)]
pub struct PurchaseEntry {
    pub refill: Refill,
    pub unit_price: Option<f64>,
    pub is_best_price: bool,
}

/// All refills of one medication, newest first
#[derive(Clone, Debug)]
pub struct PurchaseGroup {
    pub medication_name: String,
    pub unit: Unit,
    pub entries: Vec<PurchaseEntry>,
}

/// Group every refill by medication and flag the cheapest unit price
///
/// Refills without a price are listed but never marked as best.
/// Medications without refills are left out.
pub fn purchase_history(cabinet: &Cabinet) -> Vec<PurchaseGroup> {
    let mut groups: Vec<PurchaseGroup> = cabinet
        .medications
        .iter()
        .filter(|m| !m.refills.is_empty())
        .map(|medication| {
            let lowest = medication
                .refills
                .iter()
                .filter_map(Refill::unit_price)
                .reduce(f64::min);

            let mut entries: Vec<PurchaseEntry> = medication
                .refills
                .iter()
                .map(|refill| {
                    let unit_price = refill.unit_price();
                    let is_best_price = match (unit_price, lowest) {
                        (Some(price), Some(lowest)) => price <= lowest + BEST_PRICE_TOLERANCE,
                        _ => false,
                    };
                    PurchaseEntry {
                        refill: refill.clone(),
                        unit_price,
                        is_best_price,
                    }
                })
                .collect();
            entries.sort_by(|a, b| b.refill.refilled_at.cmp(&a.refill.refilled_at));

            PurchaseGroup {
                medication_name: medication.name.clone(),
                unit: medication.unit,
                entries,
            }
        })
        .collect();

    // Most recently restocked medication first
    groups.sort_by(|a, b| {
        let latest = |g: &PurchaseGroup| g.entries.first().map(|e| e.refill.refilled_at);
        latest(b).cmp(&latest(a))
    });

    tracing::debug!("Built purchase history for {} medications", groups.len());
    groups
}

/// Medications at or below `fraction` of their display ceiling
pub fn refills_needed(cabinet: &Cabinet, fraction: f64) -> Vec<&Medication> {
    cabinet
        .medications
        .iter()
        .filter(|m| {
            let total = m.total_stock_level.unwrap_or(DEFAULT_TOTAL_STOCK);
            m.current_stock <= total * fraction
        })
        .collect()
}
