//! Error types for the scheduler.

use thiserror::Error;

/// Errors from parsing or resolving a recurrence rule.
#[derive(Debug, Error)]
pub enum ScheduleError {
    /// Invalid cron expression.
    #[error("invalid cron expression: {0}")]
    Cron(#[from] cron::error::Error),

    /// Interval rules require a period of at least one millisecond.
    #[error("interval period must be at least one millisecond, got {0}ms")]
    InvalidPeriod(i64),

    /// Timezone name not present in the IANA database.
    #[error("unknown timezone: {0}")]
    UnknownTimezone(String),
}

/// Errors that can occur in scheduler operations.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Malformed entry rejected at registration time.
    #[error("invalid entry: {0}")]
    InvalidEntry(String),

    /// Recurrence rule could not be parsed or resolved.
    #[error("schedule error: {0}")]
    Schedule(#[from] ScheduleError),

    /// History-store failure.
    #[error("store error: {0}")]
    Store(#[from] syncron_store::StoreError),
}
