//! Core domain types for the Pillbox system.
//!
//! This module defines the fundamental types used throughout the system:
//! - Dose rules (the recurring schedule of a medication)
//! - Dose events (the append-only record of what happened)
//! - Refills (purchases that add stock)
//! - Medications and the cabinet that owns them
//! - The next-action state handed to the presentation layer

use crate::recurrence::{DoseTime, Recurrence};
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// Schedule Types
// ============================================================================

/// One scheduled administration time for a medication
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DoseRule {
    pub id: Uuid,
    pub time: DoseTime,
    pub quantity: f64,
    #[serde(default)]
    pub recurrence: Recurrence,
}

impl DoseRule {
    /// Create a rule with a fresh id
    pub fn new(time: DoseTime, quantity: f64, recurrence: Recurrence) -> Result<Self> {
        validate_quantity(quantity)?;
        Ok(Self {
            id: Uuid::new_v4(),
            time,
            quantity,
            recurrence,
        })
    }
}

/// Reject zero, negative and non-finite quantities
pub(crate) fn validate_quantity(quantity: f64) -> Result<()> {
    if !quantity.is_finite() || quantity <= 0.0 {
        return Err(Error::InvalidQuantity(format!(
            "{} must be a positive number",
            quantity
        )));
    }
    Ok(())
}

// ============================================================================
// Event Types
// ============================================================================

/// What happened to a dose
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DoseAction {
    Taken,
    Skipped,
    Lost,
}

impl std::fmt::Display for DoseAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DoseAction::Taken => write!(f, "TAKEN"),
            DoseAction::Skipped => write!(f, "SKIPPED"),
            DoseAction::Lost => write!(f, "LOST"),
        }
    }
}

/// An immutable record of an action against a medication
///
/// `dose_rule_id` is a weak reference: the rule may since have been removed.
/// It is `None` for events not tied to a scheduled slot, such as a loss.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DoseEvent {
    pub id: Uuid,
    pub action: DoseAction,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub dose_rule_id: Option<Uuid>,
}

impl DoseEvent {
    pub fn new(action: DoseAction, timestamp: DateTime<Utc>, dose_rule_id: Option<Uuid>) -> Self {
        Self {
            id: Uuid::new_v4(),
            action,
            timestamp,
            dose_rule_id,
        }
    }
}

/// A purchase that added stock
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Refill {
    pub id: Uuid,
    pub quantity: f64,
    pub price: Option<f64>,
    pub pharmacy: Option<String>,
    pub refilled_at: DateTime<Utc>,
}

impl Refill {
    /// Price per unit, when a price was recorded
    pub fn unit_price(&self) -> Option<f64> {
        match self.price {
            Some(price) if self.quantity > 0.0 => Some(price / self.quantity),
            _ => None,
        }
    }
}

// ============================================================================
// Medication and Cabinet
// ============================================================================

/// Unit the stock is counted in
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Unit {
    Mg,
    Ml,
    #[default]
    Nos,
}

impl std::str::FromStr for Unit {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "mg" => Ok(Unit::Mg),
            "ml" => Ok(Unit::Ml),
            "nos" | "pills" | "pill" => Ok(Unit::Nos),
            other => Err(Error::Config(format!("unknown unit: {}", other))),
        }
    }
}

impl std::fmt::Display for Unit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Unit::Mg => write!(f, "mg"),
            Unit::Ml => write!(f, "ml"),
            Unit::Nos => write!(f, "pills"),
        }
    }
}

/// A medication with its schedule, history and purchases
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Medication {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub unit: Unit,
    pub current_stock: f64,
    /// Display ceiling for the stock bar; not used by scheduling math
    #[serde(default)]
    pub total_stock_level: Option<f64>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub doses: Vec<DoseRule>,
    #[serde(default)]
    pub events: Vec<DoseEvent>,
    #[serde(default)]
    pub refills: Vec<Refill>,
}

/// Every medication the user tracks; the unit of persistence
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct Cabinet {
    #[serde(default)]
    pub medications: Vec<Medication>,
}

// ============================================================================
// Resolver Output
// ============================================================================

/// What the user should do next for one medication
#[derive(Clone, Debug, PartialEq)]
pub struct NextActionState {
    pub label: String,
    pub sublabel: String,
    pub is_overdue: bool,
    pub is_upcoming_tomorrow: bool,
    pub target_dose_rule: Option<DoseRule>,
}
