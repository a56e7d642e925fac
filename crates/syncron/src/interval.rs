//! Self-rescheduling interval: a perpetual recurrence built from one-shot
//! long-horizon timers.
//!
//! Each pass asks the occurrence calculator for the next two instants, arms a
//! [`LongTimer`] for the chosen one, and rearms immediately after firing from
//! wall-clock now, so a slow callback never accumulates drift. A terminal
//! schedule (no further occurrences) simply stops rearming.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use crate::schedule::ResolvedSchedule;
use crate::timer::{LongTimer, TimerHandle};

/// Callback invoked with the intended instant of each firing.
pub type FireCallback = Arc<dyn Fn(DateTime<Utc>) + Send + Sync>;

/// A cancellable recurrence loop over a resolved schedule.
pub struct RecurringTimer {
    state: Arc<RecurringState>,
}

struct RecurringState {
    /// Entry name, for log context only.
    name: String,
    schedule: ResolvedSchedule,
    /// Bias applied to "now" when asking for due occurrences, compensating
    /// for clock skew between cooperating processes.
    offset: Duration,
    /// Occurrences closer than this are skipped in favour of the following
    /// candidate, so clock skew or rule artifacts cannot produce a tight
    /// firing loop.
    min_fire_gap: Duration,
    callback: FireCallback,
    done: AtomicBool,
    current: Mutex<Option<TimerHandle>>,
}

impl RecurringTimer {
    /// Arm the recurrence. Must be called within a tokio runtime.
    pub fn arm(
        name: impl Into<String>,
        schedule: ResolvedSchedule,
        offset: Duration,
        min_fire_gap: Duration,
        callback: FireCallback,
    ) -> Self {
        let state = Arc::new(RecurringState {
            name: name.into(),
            schedule,
            offset,
            min_fire_gap,
            callback,
            done: AtomicBool::new(false),
            current: Mutex::new(None),
        });
        Self::schedule_next(&state);
        RecurringTimer { state }
    }

    /// Cancel the recurrence: stops the current timer and prevents any
    /// in-flight rearm from completing. Idempotent.
    pub fn cancel(&self) {
        self.state.done.store(true, Ordering::SeqCst);
        if let Some(handle) = Self::lock_current(&self.state).take() {
            handle.cancel();
        }
    }

    fn schedule_next(state: &Arc<RecurringState>) {
        if state.done.load(Ordering::SeqCst) {
            return;
        }

        let now = Utc::now() - state.offset;
        let candidates = state.schedule.upcoming(now, 2);
        let Some(&first) = candidates.first() else {
            debug!(entry = %state.name, "schedule exhausted; no further occurrences");
            return;
        };

        let intended = if first - now < state.min_fire_gap {
            match candidates.get(1) {
                Some(&second) => {
                    debug!(
                        entry = %state.name,
                        skipped = %first,
                        next_run = %second,
                        "first occurrence too soon; using the next one"
                    );
                    second
                }
                // A lone final occurrence still fires, however close.
                None => first,
            }
        } else {
            first
        };

        let rearm_state = Arc::clone(state);
        let handle = LongTimer::arm(intended, move |intended_at| {
            if rearm_state.done.load(Ordering::SeqCst) {
                return;
            }
            (rearm_state.callback)(intended_at);
            Self::schedule_next(&rearm_state);
        });

        let mut current = Self::lock_current(state);
        *current = Some(handle);
        // cancel() may have raced between the done check above and storing
        // the handle; settle in favour of cancellation.
        if state.done.load(Ordering::SeqCst) {
            if let Some(handle) = current.take() {
                handle.cancel();
            }
        }
    }

    fn lock_current(
        state: &RecurringState,
    ) -> std::sync::MutexGuard<'_, Option<TimerHandle>> {
        state.current.lock().unwrap_or_else(|e| e.into_inner())
    }
}
