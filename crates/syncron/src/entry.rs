//! Entry definitions: a named job with a recurrence rule and a callable body.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use crate::error::{ScheduleError, SchedulerError};
use crate::schedule::{ScheduleParser, ScheduleSpec};
use crate::timezone::TimezonePolicy;

/// Opaque execution context handed to an entry's job and timezone functions.
pub type JobContext = Arc<serde_json::Value>;

/// A job's result payload on success, or a failure description.
pub type JobOutcome = Result<serde_json::Value, String>;

/// Schedule function: given the recurrence-parsing capability, produce the
/// entry's recurrence rule.
pub type ScheduleFn =
    Arc<dyn Fn(&ScheduleParser) -> Result<ScheduleSpec, ScheduleError> + Send + Sync>;

type BoxedOutcomeFuture = Pin<Box<dyn Future<Output = JobOutcome> + Send>>;

/// The job callable, in one of two execution modes.
///
/// Both modes receive the intended firing instant and the entry context, and
/// both converge on a single [`JobOutcome`] before outcome recording.
#[derive(Clone)]
pub enum JobBody {
    /// A blocking call; run on the blocking pool so it cannot stall other
    /// entries' timers.
    Sync(Arc<dyn Fn(DateTime<Utc>, JobContext) -> JobOutcome + Send + Sync>),
    /// An asynchronous call whose completion is awaited.
    Async(Arc<dyn Fn(DateTime<Utc>, JobContext) -> BoxedOutcomeFuture + Send + Sync>),
}

impl JobBody {
    /// Wrap a synchronous job function.
    pub fn sync<F>(f: F) -> Self
    where
        F: Fn(DateTime<Utc>, JobContext) -> JobOutcome + Send + Sync + 'static,
    {
        JobBody::Sync(Arc::new(f))
    }

    /// Wrap an asynchronous job function.
    pub fn async_fn<F, Fut>(f: F) -> Self
    where
        F: Fn(DateTime<Utc>, JobContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = JobOutcome> + Send + 'static,
    {
        JobBody::Async(Arc::new(move |intended_at, context| {
            Box::pin(f(intended_at, context))
        }))
    }
}

impl fmt::Debug for JobBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobBody::Sync(_) => f.write_str("JobBody::Sync"),
            JobBody::Async(_) => f.write_str("JobBody::Async"),
        }
    }
}

/// A named job definition.
///
/// Constructed through [`Entry::builder`]; the name is the unique key within
/// a scheduler, and `(intended_at, name)` is the cross-process dedup key in
/// the history store.
#[derive(Clone)]
pub struct Entry {
    pub(crate) name: String,
    pub(crate) schedule_fn: ScheduleFn,
    pub(crate) job: JobBody,
    pub(crate) context: JobContext,
    pub(crate) timezone: Option<TimezonePolicy>,
    pub(crate) schedule_offset: Duration,
    pub(crate) persist: bool,
    pub(crate) purge_after: Option<Duration>,
}

impl Entry {
    pub fn builder(name: impl Into<String>) -> EntryBuilder {
        EntryBuilder {
            name: name.into(),
            schedule_fn: None,
            job: None,
            context: Arc::new(serde_json::Value::Null),
            timezone: None,
            schedule_offset: Duration::zero(),
            persist: true,
            purge_after: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Debug for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entry")
            .field("name", &self.name)
            .field("job", &self.job)
            .field("timezone", &self.timezone)
            .field("schedule_offset", &self.schedule_offset)
            .field("persist", &self.persist)
            .field("purge_after", &self.purge_after)
            .finish_non_exhaustive()
    }
}

/// Builder for [`Entry`].
pub struct EntryBuilder {
    name: String,
    schedule_fn: Option<ScheduleFn>,
    job: Option<JobBody>,
    context: JobContext,
    timezone: Option<TimezonePolicy>,
    schedule_offset: Duration,
    persist: bool,
    purge_after: Option<Duration>,
}

impl EntryBuilder {
    /// When to run the job.
    pub fn schedule<F>(mut self, f: F) -> Self
    where
        F: Fn(&ScheduleParser) -> Result<ScheduleSpec, ScheduleError> + Send + Sync + 'static,
    {
        self.schedule_fn = Some(Arc::new(f));
        self
    }

    /// What to run.
    pub fn job(mut self, job: JobBody) -> Self {
        self.job = Some(job);
        self
    }

    /// Opaque context passed to the job and timezone functions.
    pub fn context(mut self, context: serde_json::Value) -> Self {
        self.context = Arc::new(context);
        self
    }

    /// Timezone policy for interpreting the recurrence rule.
    pub fn timezone(mut self, policy: TimezonePolicy) -> Self {
        self.timezone = Some(policy);
        self
    }

    /// Bias applied to "now" when computing due occurrences; compensates for
    /// clock skew between cooperating processes.
    pub fn schedule_offset(mut self, offset: Duration) -> Self {
        self.schedule_offset = offset;
        self
    }

    /// Whether admissions and outcomes are recorded. Disabling this also
    /// disables cross-process deduplication for the entry.
    pub fn persist(mut self, persist: bool) -> Self {
        self.persist = persist;
        self
    }

    /// Retention window for this entry's history rows, keyed on `started_at`.
    pub fn purge_after(mut self, window: Duration) -> Self {
        self.purge_after = Some(window);
        self
    }

    pub fn build(self) -> Result<Entry, SchedulerError> {
        if self.name.trim().is_empty() {
            return Err(SchedulerError::InvalidEntry(
                "entry name must not be empty".to_string(),
            ));
        }
        let schedule_fn = self.schedule_fn.ok_or_else(|| {
            SchedulerError::InvalidEntry(format!("entry '{}' has no schedule", self.name))
        })?;
        let job = self.job.ok_or_else(|| {
            SchedulerError::InvalidEntry(format!("entry '{}' has no job", self.name))
        })?;
        Ok(Entry {
            name: self.name,
            schedule_fn,
            job,
            context: self.context,
            timezone: self.timezone,
            schedule_offset: self.schedule_offset,
            persist: self.persist,
            purge_after: self.purge_after,
        })
    }
}
