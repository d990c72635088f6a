//! Dose history across the whole cabinet.
//!
//! Flattens every medication's events into one timeline for the history
//! view, newest first.

use crate::{Cabinet, DoseEvent};

/// Default number of entries shown in the history view
pub const DEFAULT_HISTORY_LIMIT: usize = 50;

/// One event together with the medication it belongs to
#[derive(Clone, Debug)]
pub struct HistoryEntry {
    pub medication_name: String,
    pub event: DoseEvent,
}

/// Load the most recent `limit` events across all medications
///
/// Returns entries sorted by timestamp (newest first).
pub fn recent_events(cabinet: &Cabinet, limit: usize) -> Vec<HistoryEntry> {
    let mut entries: Vec<HistoryEntry> = cabinet
        .medications
        .iter()
        .flat_map(|medication| {
            medication.events.iter().map(|event| HistoryEntry {
                medication_name: medication.name.clone(),
                event: event.clone(),
            })
        })
        .collect();

    entries.sort_by(|a, b| b.event.timestamp.cmp(&a.event.timestamp));
    entries.truncate(limit);

    tracing::debug!("Loaded {} history entries", entries.len());
    entries
}
