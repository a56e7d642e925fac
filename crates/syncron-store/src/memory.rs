//! In-process reference implementation of [`HistoryStore`].

use std::collections::HashSet;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tracing::warn;
use uuid::Uuid;

use crate::{HistoryStore, RecordId, RunPatch, RunQuery, RunRecord, StoreError, StoredRun};

/// Shortest expiry the store will accept, in seconds. A TTL below this could
/// expire an admission row while sibling processes are still racing for the
/// same slot, silently breaking the at-most-once guarantee.
const MIN_TTL_SECS: i64 = 300;

/// An in-memory history store with a unique `(intended_at, name)` index.
///
/// Intended for tests and single-process embeddings; it provides the full
/// contract including optional TTL expiry measured from `started_at`, applied
/// lazily on every operation the way a backend's expiry index would.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
    ttl: Option<Duration>,
}

#[derive(Default)]
struct State {
    rows: Vec<StoredRun>,
    slots: HashSet<(DateTime<Utc>, String)>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store that expires rows once `started_at` is older than
    /// `ttl`. TTLs below the 300-second floor are refused and ignored.
    pub fn with_ttl(ttl: Duration) -> Self {
        if ttl < Duration::seconds(MIN_TTL_SECS) {
            warn!(
                ttl_secs = ttl.num_seconds(),
                min_secs = MIN_TTL_SECS,
                "refusing history TTL below the safety floor; expiry disabled"
            );
            return Self::new();
        }
        MemoryStore {
            state: Mutex::new(State::default()),
            ttl: Some(ttl),
        }
    }

    /// Number of live rows. Test convenience.
    pub fn len(&self) -> usize {
        let mut state = self.lock();
        self.expire(&mut state);
        state.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        // Row state is plain data; a poisoned lock only means a panic midway
        // through a vec edit, which we accept in a reference store.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn expire(&self, state: &mut State) {
        let Some(ttl) = self.ttl else { return };
        let cutoff = Utc::now() - ttl;
        let State { rows, slots } = state;
        rows.retain(|run| {
            let live = run.started_at >= cutoff;
            if !live {
                slots.remove(&(run.intended_at, run.name.clone()));
            }
            live
        });
    }
}

#[async_trait]
impl HistoryStore for MemoryStore {
    async fn insert(&self, record: RunRecord) -> Result<RecordId, StoreError> {
        let mut state = self.lock();
        self.expire(&mut state);

        let slot = (record.intended_at, record.name.clone());
        if !state.slots.insert(slot) {
            return Err(StoreError::DuplicateRun {
                name: record.name,
                intended_at: record.intended_at,
            });
        }

        let id = RecordId(Uuid::new_v4().to_string());
        state.rows.push(StoredRun {
            id: id.clone(),
            name: record.name,
            intended_at: record.intended_at,
            started_at: record.started_at,
            finished_at: None,
            result: None,
            error: None,
        });
        Ok(id)
    }

    async fn update(&self, id: &RecordId, patch: RunPatch) -> Result<(), StoreError> {
        let mut state = self.lock();
        self.expire(&mut state);

        let run = state
            .rows
            .iter_mut()
            .find(|run| &run.id == id)
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;
        run.finished_at = Some(patch.finished_at);
        run.result = patch.result;
        run.error = patch.error;
        Ok(())
    }

    async fn find(&self, query: RunQuery) -> Result<Vec<StoredRun>, StoreError> {
        let mut state = self.lock();
        self.expire(&mut state);
        Ok(state
            .rows
            .iter()
            .filter(|run| query.matches(run))
            .cloned()
            .collect())
    }

    async fn remove(&self, query: RunQuery) -> Result<u64, StoreError> {
        let mut state = self.lock();
        self.expire(&mut state);

        let before = state.rows.len();
        let (removed, kept): (Vec<_>, Vec<_>) =
            state.rows.drain(..).partition(|run| query.matches(run));
        for run in &removed {
            state.slots.remove(&(run.intended_at, run.name.clone()));
        }
        state.rows = kept;
        Ok((before - state.rows.len()) as u64)
    }

    async fn clear(&self) -> Result<(), StoreError> {
        let mut state = self.lock();
        state.rows.clear();
        state.slots.clear();
        Ok(())
    }
}
