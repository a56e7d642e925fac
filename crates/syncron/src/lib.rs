//! syncron: a distributed cron scheduler synchronized through a shared
//! history store.
//!
//! Every cooperating process runs its own [`Scheduler`] against the same
//! [`HistoryStore`](syncron_store::HistoryStore); each scheduled occurrence of
//! a named entry runs **at most once** across the fleet. There is no lock
//! service and no leader election — the store's uniqueness constraint over
//! `(intended_at, name)` is the only coordination primitive.
//!
//! The pieces, leaf-first:
//! - [`ResolvedSchedule`]: a recurrence rule bound to a timezone, producing
//!   the next occurrence instants after any reference instant.
//! - [`LongTimer`]: fires at arbitrary future instants despite the platform's
//!   ~24.8-day single-delay bound, by chaining placeholder delays.
//! - [`RecurringTimer`]: a perpetual (or naturally terminating) recurrence
//!   loop over long-horizon timers.
//! - [`run_occurrence`]: the admission protocol — claim the
//!   `(intended_at, name)` slot with a unique insert, run the job, record the
//!   outcome.
//! - [`Scheduler`]: the entry registry and lifecycle
//!   (`stopped`/`running`/`paused`).

mod entry;
mod error;
mod executor;
mod interval;
mod schedule;
mod scheduler;
mod timer;
mod timezone;

pub use entry::{Entry, EntryBuilder, JobBody, JobContext, JobOutcome, ScheduleFn};
pub use error::{ScheduleError, SchedulerError};
pub use executor::{FiringOutcome, run_occurrence};
pub use interval::{FireCallback, RecurringTimer};
pub use schedule::{ResolvedSchedule, ScheduleParser, ScheduleSpec};
pub use scheduler::{EntryInfo, RunState, Scheduler, SchedulerConfig};
pub use timer::{LongTimer, TimerHandle};
pub use timezone::{TimezonePolicy, Zone};
