//! Registry lifecycle tests: registration, start/pause/stop transitions, and
//! occurrence queries against an in-memory history store.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::{Duration, Utc};

use syncron::{
    Entry, JobBody, ResolvedSchedule, ScheduleParser, Scheduler, SchedulerConfig,
    TimezonePolicy, Zone,
};
use syncron_store::{HistoryStore, MemoryStore, RunQuery, RunRecord};

fn scheduler(store: &Arc<MemoryStore>) -> Scheduler {
    Scheduler::new(
        store.clone(),
        SchedulerConfig {
            default_timezone: Some(TimezonePolicy::Utc),
            min_fire_gap: Duration::zero(),
        },
    )
}

fn test_entry(name: &str, cron_expr: &'static str) -> Entry {
    Entry::builder(name)
        .schedule(move |parser| parser.cron(cron_expr))
        .job(JobBody::sync(|_, _| Ok(serde_json::json!("ran"))))
        .build()
        .unwrap()
}

#[tokio::test]
async fn registering_twice_keeps_the_first_definition() {
    let store = Arc::new(MemoryStore::new());
    let sched = scheduler(&store);

    sched.register(test_entry("Test Job", "0 15 10 * * *")).await.unwrap();
    sched.register(test_entry("Test Job", "0 30 11 * * *")).await.unwrap();

    assert_eq!(sched.list().await.len(), 1);
}

#[tokio::test]
async fn stop_empties_the_registry() {
    let store = Arc::new(MemoryStore::new());
    let sched = scheduler(&store);

    sched.register(test_entry("Test Job", "0 15 10 * * *")).await.unwrap();
    sched.register(test_entry("Test Job2", "0 30 11 * * *")).await.unwrap();
    sched.start().await;
    assert_eq!(sched.list().await.len(), 2);

    sched.stop().await;
    assert!(sched.list().await.is_empty());
    assert!(!sched.is_running().await);
}

#[tokio::test]
async fn pause_preserves_definitions_and_start_rearms() {
    let store = Arc::new(MemoryStore::new());
    let sched = scheduler(&store);

    sched.register(test_entry("Test Job", "0 15 10 * * *")).await.unwrap();
    sched.register(test_entry("Test Job2", "0 30 11 * * *")).await.unwrap();
    sched.start().await;
    assert!(sched.is_running().await);

    sched.pause().await;
    let entries = sched.list().await;
    assert_eq!(entries.len(), 2);
    assert!(entries.iter().all(|info| !info.active));
    assert!(!sched.is_running().await);

    sched.start().await;
    let entries = sched.list().await;
    assert_eq!(entries.len(), 2);
    assert!(entries.iter().all(|info| info.active));
    assert!(sched.is_running().await);
}

#[tokio::test]
async fn registering_while_running_arms_immediately() {
    let store = Arc::new(MemoryStore::new());
    let sched = scheduler(&store);

    sched.start().await;
    assert!(sched.is_running().await);

    sched.register(test_entry("Late Joiner", "0 15 10 * * *")).await.unwrap();

    let entries = sched.list().await;
    assert_eq!(entries.len(), 1);
    assert!(entries[0].active);
}

#[tokio::test]
async fn registering_while_stopped_does_not_arm() {
    let store = Arc::new(MemoryStore::new());
    let sched = scheduler(&store);

    sched.register(test_entry("Early Bird", "0 15 10 * * *")).await.unwrap();

    let entries = sched.list().await;
    assert!(!entries[0].active);
}

#[tokio::test]
async fn next_occurrence_agrees_with_the_calculator() {
    let store = Arc::new(MemoryStore::new());
    let sched = scheduler(&store);

    sched.register(test_entry("Test Job", "0 15 10 * * *")).await.unwrap();
    sched.register(test_entry("Test Job2", "0 30 11 * * *")).await.unwrap();
    sched.start().await;

    let parser = ScheduleParser::new();
    let expected_b = ResolvedSchedule::new(parser.cron("0 30 11 * * *").unwrap(), Zone::Utc)
        .next_after(Utc::now());
    let expected_a = ResolvedSchedule::new(parser.cron("0 15 10 * * *").unwrap(), Zone::Utc)
        .next_after(Utc::now());

    let next_b = sched.next_occurrence("Test Job2").await;
    assert_eq!(next_b, expected_b);
    // B's next run is B's, not A's.
    assert_ne!(next_b, expected_a);
}

#[tokio::test]
async fn next_occurrence_of_unknown_entry_is_none() {
    let store = Arc::new(MemoryStore::new());
    let sched = scheduler(&store);
    assert_eq!(sched.next_occurrence("nope").await, None);
}

#[tokio::test]
async fn reset_clears_entries_and_history() {
    let store = Arc::new(MemoryStore::new());
    let sched = scheduler(&store);

    sched.register(test_entry("Test Job", "0 15 10 * * *")).await.unwrap();
    store
        .insert(RunRecord {
            name: "Test Job".to_string(),
            intended_at: Utc::now(),
            started_at: Utc::now(),
        })
        .await
        .unwrap();
    assert_eq!(store.len(), 1);

    sched.reset().await.unwrap();
    assert!(sched.list().await.is_empty());
    assert!(store.is_empty());
}

#[tokio::test]
async fn terminal_past_schedule_survives_arming() {
    let store = Arc::new(MemoryStore::new());
    let sched = scheduler(&store);

    let past = Utc::now() - Duration::hours(1);
    let entry = Entry::builder("Spent")
        .schedule(move |parser| Ok(parser.on(vec![past])))
        .job(JobBody::sync(|_, _| Ok(serde_json::json!("ran"))))
        .build()
        .unwrap();

    // Arming a schedule with no future occurrences must not panic or error.
    sched.register(entry).await.unwrap();
    sched.start().await;

    assert_eq!(sched.next_occurrence("Spent").await, None);
    tokio::time::sleep(std::time::Duration::from_millis(150)).await;
    assert!(store.is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn future_one_shot_fires_once_and_never_rearms() {
    let store = Arc::new(MemoryStore::new());
    let sched = scheduler(&store);

    let at = Utc::now() + Duration::milliseconds(150);
    let fired = Arc::new(AtomicUsize::new(0));
    let count = Arc::clone(&fired);
    let entry = Entry::builder("One Shot")
        .schedule(move |parser| Ok(parser.on(vec![at])))
        .job(JobBody::sync(move |_, _| {
            count.fetch_add(1, Ordering::SeqCst);
            Ok(serde_json::json!("ran"))
        }))
        .build()
        .unwrap();

    sched.register(entry).await.unwrap();
    sched.start().await;

    tokio::time::sleep(std::time::Duration::from_millis(600)).await;
    assert_eq!(fired.load(Ordering::SeqCst), 1);
    assert_eq!(
        store.find(RunQuery::by_name("One Shot")).await.unwrap().len(),
        1
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn persist_false_entries_leave_no_history() {
    let store = Arc::new(MemoryStore::new());
    let sched = scheduler(&store);

    let fired = Arc::new(AtomicUsize::new(0));
    let count = Arc::clone(&fired);
    let entry = Entry::builder("Ephemeral")
        .schedule(|parser| parser.every(Duration::milliseconds(100)))
        .job(JobBody::sync(move |_, _| {
            count.fetch_add(1, Ordering::SeqCst);
            Ok(serde_json::json!("ran"))
        }))
        .persist(false)
        .build()
        .unwrap();

    sched.register(entry).await.unwrap();
    sched.start().await;

    tokio::time::sleep(std::time::Duration::from_millis(450)).await;
    sched.stop().await;

    assert!(fired.load(Ordering::SeqCst) >= 2, "entry should have fired");
    assert!(store.is_empty(), "persist=false must not record history");
}
