//! Cross-process at-most-once: two independent schedulers sharing one history
//! store must never both run the same occurrence.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::Duration;

use syncron::{Entry, JobBody, Scheduler, SchedulerConfig, TimezonePolicy};
use syncron_store::{HistoryStore, MemoryStore, RunQuery};

fn counting_entry(counter: &Arc<AtomicUsize>) -> Entry {
    let counter = Arc::clone(counter);
    Entry::builder("shared-tick")
        // Whole-second cron so both schedulers predict identical occurrence
        // instants, the same way separate hosts would.
        .schedule(|parser| parser.cron("* * * * * *"))
        .job(JobBody::sync(move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(serde_json::json!("ran"))
        }))
        .build()
        .unwrap()
}

fn interval_entry(counter: &Arc<AtomicUsize>) -> Entry {
    let counter = Arc::clone(counter);
    Entry::builder("shared-interval")
        .schedule(|parser| parser.every(Duration::seconds(1)))
        .job(JobBody::sync(move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(serde_json::json!("ran"))
        }))
        .build()
        .unwrap()
}

#[tokio::test(flavor = "multi_thread")]
async fn concurrent_schedulers_share_occurrences_without_double_runs() {
    let store = Arc::new(MemoryStore::new());
    let config = SchedulerConfig {
        default_timezone: Some(TimezonePolicy::Utc),
        min_fire_gap: Duration::zero(),
    };

    let sched_a = Scheduler::new(store.clone(), config.clone());
    let sched_b = Scheduler::new(store.clone(), config);

    let runs_a = Arc::new(AtomicUsize::new(0));
    let runs_b = Arc::new(AtomicUsize::new(0));

    sched_a.register(counting_entry(&runs_a)).await.unwrap();
    sched_b.register(counting_entry(&runs_b)).await.unwrap();
    sched_a.start().await;
    sched_b.start().await;

    tokio::time::sleep(std::time::Duration::from_millis(3_500)).await;
    sched_a.stop().await;
    sched_b.stop().await;
    // Let in-flight firings record their outcomes.
    tokio::time::sleep(std::time::Duration::from_millis(300)).await;

    let rows = store.find(RunQuery::by_name("shared-tick")).await.unwrap();
    let total_runs = runs_a.load(Ordering::SeqCst) + runs_b.load(Ordering::SeqCst);

    assert!(rows.len() >= 2, "expected several occurrences, got {}", rows.len());
    // Every admission ran the job exactly once, fleet-wide.
    assert_eq!(total_runs, rows.len());

    // Each claimed slot is unique and fully recorded.
    for row in &rows {
        assert_eq!(row.intended_at.timestamp_subsec_millis(), 0);
        assert!(row.finished_at.is_some());
        assert_eq!(row.result, Some(serde_json::json!("ran")));
        assert!(row.error.is_none());
    }
}

// Interval rules parse independently on each host; their occurrence grids
// must still agree or the dedup slots never collide.
#[tokio::test(flavor = "multi_thread")]
async fn interval_entries_share_occurrences_across_schedulers() {
    let store = Arc::new(MemoryStore::new());
    let config = SchedulerConfig {
        default_timezone: Some(TimezonePolicy::Utc),
        min_fire_gap: Duration::zero(),
    };

    let sched_a = Scheduler::new(store.clone(), config.clone());
    let sched_b = Scheduler::new(store.clone(), config);

    let runs_a = Arc::new(AtomicUsize::new(0));
    let runs_b = Arc::new(AtomicUsize::new(0));

    sched_a.register(interval_entry(&runs_a)).await.unwrap();
    // The second scheduler parses its own copy of the rule later, as a
    // separately started process would.
    tokio::time::sleep(std::time::Duration::from_millis(250)).await;
    sched_b.register(interval_entry(&runs_b)).await.unwrap();

    sched_a.start().await;
    sched_b.start().await;

    tokio::time::sleep(std::time::Duration::from_millis(3_500)).await;
    sched_a.stop().await;
    sched_b.stop().await;
    tokio::time::sleep(std::time::Duration::from_millis(300)).await;

    let rows = store.find(RunQuery::by_name("shared-interval")).await.unwrap();
    let total_runs = runs_a.load(Ordering::SeqCst) + runs_b.load(Ordering::SeqCst);

    assert!(rows.len() >= 2, "expected several occurrences, got {}", rows.len());
    // One run per claimed slot, fleet-wide, even with staggered parse times.
    assert_eq!(total_runs, rows.len());
}
