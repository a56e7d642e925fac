//! Entry registry and lifecycle.
//!
//! The [`Scheduler`] owns the process-local entry map and its live timers.
//! Every cooperating process runs its own scheduler against the same shared
//! [`HistoryStore`]; there is no leader election and no inter-process
//! messaging. The store's uniqueness constraint on `(intended_at, name)` is
//! the only arbiter of which process runs a given occurrence.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;
use tracing::{error, info, warn};

use syncron_store::HistoryStore;

use crate::entry::Entry;
use crate::error::{ScheduleError, SchedulerError};
use crate::executor;
use crate::interval::RecurringTimer;
use crate::schedule::{ResolvedSchedule, ScheduleParser};
use crate::timezone::{self, TimezonePolicy};

/// Scheduler-wide configuration.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Timezone applied to entries that carry no policy of their own.
    pub default_timezone: Option<TimezonePolicy>,
    /// Occurrences closer than this to "now" are skipped in favour of the
    /// following candidate. Defaults to one second, the resolution of the
    /// dedup key; anything faster could not be told apart in the history
    /// store anyway.
    pub min_fire_gap: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        SchedulerConfig {
            default_timezone: None,
            min_fire_gap: Duration::seconds(1),
        }
    }
}

/// Registry lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Stopped,
    Running,
    Paused,
}

/// A snapshot of one registered entry, without callables or timer handles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryInfo {
    pub name: String,
    /// Whether a live timer currently exists for the entry.
    pub active: bool,
    pub persist: bool,
}

struct Slot {
    entry: Arc<Entry>,
    timer: Option<RecurringTimer>,
}

struct Inner {
    entries: HashMap<String, Slot>,
    state: RunState,
}

/// The job scheduler: entry registry, lifecycle, and timer ownership.
pub struct Scheduler {
    store: Arc<dyn HistoryStore>,
    config: SchedulerConfig,
    inner: RwLock<Inner>,
}

impl Scheduler {
    /// Create a stopped scheduler over the given history store.
    pub fn new(store: Arc<dyn HistoryStore>, config: SchedulerConfig) -> Self {
        Scheduler {
            store,
            config,
            inner: RwLock::new(Inner {
                entries: HashMap::new(),
                state: RunState::Stopped,
            }),
        }
    }

    /// Register a named entry.
    ///
    /// Re-registering an existing name is a logged no-op; the first
    /// definition wins. When the scheduler is already running, the entry is
    /// armed immediately instead of waiting for the next `start`.
    pub async fn register(&self, entry: Entry) -> Result<(), SchedulerError> {
        if entry.name().trim().is_empty() {
            return Err(SchedulerError::InvalidEntry(
                "entry name must not be empty".to_string(),
            ));
        }

        let mut inner = self.inner.write().await;
        if inner.entries.contains_key(entry.name()) {
            info!(entry = %entry.name(), "entry already registered; keeping the first definition");
            return Ok(());
        }

        let entry = Arc::new(entry);
        let timer = if inner.state == RunState::Running {
            self.arm(&entry)
        } else {
            None
        };
        inner.entries.insert(entry.name().to_string(), Slot { entry, timer });
        Ok(())
    }

    /// Arm every unarmed entry and transition to `Running`. Idempotent with
    /// respect to already-armed entries: their timers are left untouched.
    pub async fn start(&self) {
        let mut inner = self.inner.write().await;
        for slot in inner.entries.values_mut() {
            if slot.timer.is_none() {
                slot.timer = self.arm(&slot.entry);
            }
        }
        inner.state = RunState::Running;
        info!(entries = inner.entries.len(), "scheduler running");
    }

    /// Cancel every live timer but keep the entry definitions. A subsequent
    /// `start` re-arms everything with freshly resolved schedules.
    pub async fn pause(&self) {
        let mut inner = self.inner.write().await;
        for slot in inner.entries.values_mut() {
            if let Some(timer) = slot.timer.take() {
                timer.cancel();
            }
        }
        inner.state = RunState::Paused;
        info!("scheduler paused");
    }

    /// Cancel and delete one entry. A no-op for unknown names.
    pub async fn remove(&self, name: &str) {
        let mut inner = self.inner.write().await;
        if let Some(slot) = inner.entries.remove(name) {
            if let Some(timer) = slot.timer {
                timer.cancel();
            }
            info!(entry = name, "removed entry");
        }
    }

    /// Remove every entry and transition to `Stopped`.
    pub async fn stop(&self) {
        let mut inner = self.inner.write().await;
        for (name, slot) in inner.entries.drain() {
            if let Some(timer) = slot.timer {
                timer.cancel();
            }
            info!(entry = %name, "removed entry");
        }
        inner.state = RunState::Stopped;
        info!("scheduler stopped");
    }

    /// The next occurrence instant for a named entry, recomputed from the
    /// occurrence calculator without touching any timer state. `None` for
    /// unknown entries and terminal schedules.
    pub async fn next_occurrence(&self, name: &str) -> Option<DateTime<Utc>> {
        let inner = self.inner.read().await;
        let slot = inner.entries.get(name)?;
        match self.resolve(&slot.entry) {
            Ok(schedule) => {
                schedule.next_after(Utc::now() - slot.entry.schedule_offset)
            }
            Err(err) => {
                warn!(entry = name, error = %err, "failed to resolve schedule");
                None
            }
        }
    }

    /// Enumerate registered entries, sorted by name.
    pub async fn list(&self) -> Vec<EntryInfo> {
        let inner = self.inner.read().await;
        let mut infos: Vec<_> = inner
            .entries
            .values()
            .map(|slot| EntryInfo {
                name: slot.entry.name().to_string(),
                active: slot.timer.is_some(),
                persist: slot.entry.persist,
            })
            .collect();
        infos.sort_by(|a, b| a.name.cmp(&b.name));
        infos
    }

    /// Current lifecycle state.
    pub async fn state(&self) -> RunState {
        self.inner.read().await.state
    }

    pub async fn is_running(&self) -> bool {
        self.state().await == RunState::Running
    }

    /// Clear all entries and all history. Test isolation.
    pub async fn reset(&self) -> Result<(), SchedulerError> {
        self.stop().await;
        self.store.clear().await?;
        Ok(())
    }

    /// Resolve an entry's recurrence rule and timezone into an occurrence
    /// calculator.
    fn resolve(&self, entry: &Entry) -> Result<ResolvedSchedule, ScheduleError> {
        let zone = timezone::resolve_zone(
            entry.timezone.as_ref(),
            self.config.default_timezone.as_ref(),
            &entry.context,
        )?;
        let spec = (entry.schedule_fn)(&ScheduleParser::new())?;
        Ok(ResolvedSchedule::new(spec, zone))
    }

    /// Arm a self-rescheduling timer for an entry. Resolution failures are
    /// logged and leave the entry inactive; they never poison other entries.
    fn arm(&self, entry: &Arc<Entry>) -> Option<RecurringTimer> {
        let schedule = match self.resolve(entry) {
            Ok(schedule) => schedule,
            Err(err) => {
                error!(
                    entry = %entry.name(),
                    error = %err,
                    "failed to resolve schedule; entry will not run"
                );
                return None;
            }
        };

        if let Some(next) = schedule.next_after(Utc::now() - entry.schedule_offset) {
            info!(entry = %entry.name(), next_run = %next, "scheduled entry");
        }

        let store = Arc::clone(&self.store);
        let fire_entry = Arc::clone(entry);
        let callback: Arc<dyn Fn(DateTime<Utc>) + Send + Sync> = Arc::new(move |intended_at| {
            let store = Arc::clone(&store);
            let entry = Arc::clone(&fire_entry);
            // Each firing is its own task: a slow or hung job delays only its
            // own outcome recording, never other entries' timers.
            tokio::spawn(async move {
                executor::run_occurrence(store, entry, intended_at).await;
            });
        });

        Some(RecurringTimer::arm(
            entry.name().to_string(),
            schedule,
            entry.schedule_offset,
            self.config.min_fire_gap,
            callback,
        ))
    }
}
