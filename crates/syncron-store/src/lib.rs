//! History-store contract for syncron.
//!
//! Every cooperating scheduler process records job admissions and outcomes
//! through the [`HistoryStore`] trait. The store's uniqueness constraint over
//! `(intended_at, name)` is the only cross-process coordination primitive the
//! scheduler relies on: an insert that fails with a distinguishable
//! duplicate-key error is necessary and sufficient for at-most-once execution.
//!
//! [`MemoryStore`] is an in-process reference implementation used in tests and
//! single-process embeddings.

mod error;
mod memory;
mod types;

pub use error::StoreError;
pub use memory::MemoryStore;
pub use types::{RecordId, RunPatch, RunQuery, RunRecord, StoredRun};

use async_trait::async_trait;

/// Shared history storage for job admissions and outcomes.
///
/// Implementations must enforce a uniqueness constraint over
/// `(intended_at, name)` and report violations as
/// [`StoreError::DuplicateRun`]; all other guarantees (durability,
/// replication, expiry) are backend-specific.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Insert a new admission row.
    ///
    /// Fails with [`StoreError::DuplicateRun`] when a row for the same
    /// `(intended_at, name)` pair already exists.
    async fn insert(&self, record: RunRecord) -> Result<RecordId, StoreError>;

    /// Apply an outcome patch to an existing row.
    async fn update(&self, id: &RecordId, patch: RunPatch) -> Result<(), StoreError>;

    /// Fetch all rows matching the query.
    async fn find(&self, query: RunQuery) -> Result<Vec<StoredRun>, StoreError>;

    /// Delete all rows matching the query, returning the removed count.
    async fn remove(&self, query: RunQuery) -> Result<u64, StoreError>;

    /// Delete every row. Used for test isolation via the scheduler's `reset`.
    async fn clear(&self) -> Result<(), StoreError>;
}
