//! Execution coordinator: the admission and outcome-recording protocol.
//!
//! One firing of one entry goes through `pending → admitted → running →
//! {succeeded | failed}`, or `pending → rejected` when another process claimed
//! the `(intended_at, name)` slot first. Losing the admission race is the
//! normal cross-process dedup path, not an error. No retries happen here; a
//! failed occurrence is recorded and the next scheduled occurrence proceeds
//! untouched.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};

use syncron_store::{HistoryStore, RecordId, RunPatch, RunQuery, RunRecord, StoreError};

use crate::entry::{Entry, JobBody, JobOutcome};

/// How one firing of one occurrence ended.
#[derive(Debug)]
pub enum FiringOutcome {
    /// Admitted, ran, success recorded.
    Completed(RecordId),
    /// Admitted, ran, failure recorded. Terminal for this occurrence only.
    Failed(RecordId),
    /// Lost the admission race to another process; the job did not run.
    Skipped,
    /// The store failed outside the duplicate-key path; the occurrence was
    /// abandoned without running or recording.
    StoreFailed(StoreError),
    /// `persist: false`: the job ran with no admission record and therefore
    /// no cross-process dedup.
    Unrecorded { succeeded: bool },
}

/// Truncate to whole seconds, the resolution of the dedup key. Sub-second
/// clock skew between processes must not split one logical occurrence into
/// distinct slots.
pub(crate) fn truncate_to_seconds(instant: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp(instant.timestamp(), 0).unwrap_or(instant)
}

/// Run one occurrence of `entry` at intended instant `intended_at` through
/// the admission protocol.
pub async fn run_occurrence(
    store: Arc<dyn HistoryStore>,
    entry: Arc<Entry>,
    intended_at: DateTime<Utc>,
) -> FiringOutcome {
    if !entry.persist {
        debug!(entry = %entry.name, "persistence disabled; running without admission record");
        let outcome = run_job(&entry, intended_at).await;
        let succeeded = outcome.is_ok();
        if let Err(error) = &outcome {
            warn!(entry = %entry.name, error = %error, "unrecorded job failed");
        }
        return FiringOutcome::Unrecorded { succeeded };
    }

    let intended_at = truncate_to_seconds(intended_at);
    let id = match store
        .insert(RunRecord {
            name: entry.name.clone(),
            intended_at,
            started_at: Utc::now(),
        })
        .await
    {
        Ok(id) => id,
        Err(err) if err.is_duplicate() => {
            info!(
                entry = %entry.name,
                intended_at = %intended_at,
                "occurrence already claimed; not running again"
            );
            return FiringOutcome::Skipped;
        }
        Err(err) => {
            error!(
                entry = %entry.name,
                intended_at = %intended_at,
                error = %err,
                "admission write failed; abandoning occurrence"
            );
            return FiringOutcome::StoreFailed(err);
        }
    };

    info!(entry = %entry.name, intended_at = %intended_at, "starting job");
    let outcome = run_job(&entry, intended_at).await;
    let succeeded = outcome.is_ok();
    match &outcome {
        Ok(_) => info!(entry = %entry.name, "finished job"),
        Err(error) => warn!(entry = %entry.name, error = %error, "job failed"),
    }

    if let Err(err) = store
        .update(&id, RunPatch::from_outcome(Utc::now(), outcome))
        .await
    {
        error!(
            entry = %entry.name,
            record = %id,
            error = %err,
            "failed to record job outcome"
        );
        return FiringOutcome::StoreFailed(err);
    }

    if let Some(window) = entry.purge_after {
        purge_history(store.as_ref(), &entry.name, window).await;
    }

    if succeeded {
        FiringOutcome::Completed(id)
    } else {
        FiringOutcome::Failed(id)
    }
}

/// Run the job body, converging both execution modes on one outcome. Panics
/// inside the job surface as join errors and are recorded as failures.
async fn run_job(entry: &Entry, intended_at: DateTime<Utc>) -> JobOutcome {
    match &entry.job {
        JobBody::Sync(f) => {
            let f = Arc::clone(f);
            let context = Arc::clone(&entry.context);
            match tokio::task::spawn_blocking(move || f(intended_at, context)).await {
                Ok(outcome) => outcome,
                Err(join_err) => Err(format!("job panicked: {join_err}")),
            }
        }
        JobBody::Async(f) => {
            let future = f(intended_at, Arc::clone(&entry.context));
            match tokio::spawn(future).await {
                Ok(outcome) => outcome,
                Err(join_err) => Err(format!("job panicked: {join_err}")),
            }
        }
    }
}

async fn purge_history(store: &dyn HistoryStore, name: &str, window: chrono::Duration) {
    let query = RunQuery {
        name: Some(name.to_string()),
        started_before: Some(Utc::now() - window),
        ..Default::default()
    };
    match store.remove(query).await {
        Ok(0) => {}
        Ok(removed) => debug!(entry = name, removed, "purged aged history rows"),
        Err(err) => warn!(entry = name, error = %err, "history purge failed"),
    }
}
