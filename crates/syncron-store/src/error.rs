//! Error types for history stores.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::RecordId;

/// Errors that can occur in history-store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A row for this `(intended_at, name)` slot already exists.
    ///
    /// This is the expected admission-race signal, not a fault: another
    /// process (or a timer race within this one) claimed the occurrence
    /// first.
    #[error("run already recorded: {name} @ {intended_at}")]
    DuplicateRun {
        name: String,
        intended_at: DateTime<Utc>,
    },

    /// No row with the given id.
    #[error("run record not found: {0}")]
    NotFound(RecordId),

    /// Any other backend failure.
    #[error("store backend error: {0}")]
    Backend(String),
}

impl StoreError {
    /// Whether this error is the duplicate-key admission-race signal.
    pub fn is_duplicate(&self) -> bool {
        matches!(self, StoreError::DuplicateRun { .. })
    }
}
