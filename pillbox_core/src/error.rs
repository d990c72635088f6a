//! Error types for the pillbox_core library.

use std::io;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for pillbox_core operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// IO error occurred
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// A weekday set that is present but does not describe a subset of 0..=6
    #[error("Schedule data error: {0}")]
    ScheduleData(String),

    /// A dose time that is not a zero-padded 24-hour `HH:MM`
    #[error("Invalid dose time {0:?}: expected HH:MM (24-hour, zero-padded)")]
    InvalidTime(String),

    /// Quantity that is zero, negative or not a finite number
    #[error("Invalid quantity: {0}")]
    InvalidQuantity(String),

    /// Attempted to take a dose with nothing left in stock
    #[error("{0} is out of stock")]
    OutOfStock(String),

    /// Every dose due today has already been handled
    #[error("No dose of {0} is due until tomorrow")]
    NothingDue(String),

    /// Dose rule id that the medication does not own
    #[error("Unknown dose rule: {0}")]
    UnknownDoseRule(String),

    /// No medication matched the lookup
    #[error("Medication not found: {0}")]
    MedicationNotFound(String),

    /// A medication with the same name already exists
    #[error("Medication already exists: {0}")]
    DuplicateMedication(String),

    /// Cabinet state management error
    #[error("State error: {0}")]
    State(String),
}
