//! History-row types.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Opaque identifier of a stored run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordId(pub String);

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for RecordId {
    fn from(s: &str) -> Self {
        RecordId(s.to_string())
    }
}

/// An admission row at insert time: one attempt to run one occurrence of one
/// entry.
///
/// `intended_at` carries the occurrence instant the schedule predicted,
/// truncated to whole seconds by the caller so that clock skew across
/// processes cannot split one logical occurrence into distinct slots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunRecord {
    /// Entry name; half of the uniqueness key.
    pub name: String,
    /// Predicted occurrence instant; the other half of the uniqueness key.
    pub intended_at: DateTime<Utc>,
    /// Wall-clock instant this process claimed the slot.
    pub started_at: DateTime<Utc>,
}

/// A history row as read back from the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredRun {
    pub id: RecordId,
    pub name: String,
    pub intended_at: DateTime<Utc>,
    pub started_at: DateTime<Utc>,
    /// Set once, when the job finishes (either way).
    pub finished_at: Option<DateTime<Utc>>,
    /// Opaque success payload; absent on failure.
    pub result: Option<serde_json::Value>,
    /// Failure description; absent on success.
    pub error: Option<String>,
}

/// The single permitted mutation of a history row: completion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunPatch {
    pub finished_at: DateTime<Utc>,
    pub result: Option<serde_json::Value>,
    pub error: Option<String>,
}

impl RunPatch {
    /// Build a patch from a job outcome, stamped with the given completion
    /// instant.
    pub fn from_outcome(
        finished_at: DateTime<Utc>,
        outcome: Result<serde_json::Value, String>,
    ) -> Self {
        match outcome {
            Ok(result) => RunPatch {
                finished_at,
                result: Some(result),
                error: None,
            },
            Err(error) => RunPatch {
                finished_at,
                result: None,
                error: Some(error),
            },
        }
    }
}

/// Conjunctive row filter; `None` fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunQuery {
    pub name: Option<String>,
    pub intended_at: Option<DateTime<Utc>>,
    /// Matches rows whose `started_at` is strictly before this instant.
    /// Used by retention sweeps.
    pub started_before: Option<DateTime<Utc>>,
}

impl RunQuery {
    /// All rows for one entry.
    pub fn by_name(name: impl Into<String>) -> Self {
        RunQuery {
            name: Some(name.into()),
            ..Default::default()
        }
    }

    /// The row (if any) for one occurrence slot.
    pub fn by_slot(name: impl Into<String>, intended_at: DateTime<Utc>) -> Self {
        RunQuery {
            name: Some(name.into()),
            intended_at: Some(intended_at),
            ..Default::default()
        }
    }

    /// Whether the row matches every set field.
    pub fn matches(&self, run: &StoredRun) -> bool {
        if let Some(name) = &self.name {
            if &run.name != name {
                return false;
            }
        }
        if let Some(intended_at) = &self.intended_at {
            if &run.intended_at != intended_at {
                return false;
            }
        }
        if let Some(cutoff) = &self.started_before {
            if &run.started_at >= cutoff {
                return false;
            }
        }
        true
    }
}
