#![forbid(unsafe_code)]

//! Core domain model and business logic for Pillbox, a personal
//! medication tracker.
//!
//! This crate provides:
//! - Domain types (dose rules, dose events, refills, medications)
//! - Supply projection
//! - Next-action resolution
//! - Inventory mutations, history and purchase views
//! - Persistence of the cabinet snapshot

pub mod types;
pub mod error;
pub mod recurrence;
pub mod config;
pub mod logging;
pub mod supply;
pub mod engine;
pub mod inventory;
pub mod history;
pub mod purchases;
pub mod state;

// Re-export commonly used types
pub use error::{Error, Result};
pub use types::*;
pub use recurrence::{parse_dose_spec, DoseTime, Recurrence, WeekdaySet};
pub use config::Config;
pub use supply::{
    describe_supply, is_low_supply, project_supply_days, SUPPLY_HORIZON_DAYS,
    UNLIMITED_SUPPLY_DAYS,
};
pub use engine::{resolve_next_action, resolve_next_action_with, ResolverPolicy, SlotMatching};
pub use history::{recent_events, HistoryEntry};
pub use purchases::{purchase_history, refills_needed, PurchaseEntry, PurchaseGroup};
