//! Minimal embedding: two entries against an in-memory history store.
//!
//! Run with `cargo run --example demo`.

use std::sync::Arc;

use chrono::Duration;
use syncron::{Entry, JobBody, Scheduler, SchedulerConfig, TimezonePolicy};
use syncron_store::MemoryStore;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let store = Arc::new(MemoryStore::with_ttl(Duration::days(2)));
    let scheduler = Scheduler::new(
        store,
        SchedulerConfig {
            default_timezone: Some(TimezonePolicy::Utc),
            ..Default::default()
        },
    );

    scheduler
        .register(
            Entry::builder("heartbeat")
                .schedule(|parser| parser.every(Duration::seconds(5)))
                .job(JobBody::sync(|intended_at, _| {
                    println!("heartbeat intended for {intended_at}");
                    Ok(serde_json::json!("ok"))
                }))
                .build()?,
        )
        .await?;

    scheduler
        .register(
            Entry::builder("daily-report")
                .schedule(|parser| parser.cron("0 15 10 * * *"))
                .timezone(TimezonePolicy::Named("America/New_York".into()))
                .job(JobBody::async_fn(|intended_at, _| async move {
                    println!("report run for {intended_at}");
                    Ok(serde_json::json!({ "rows": 0 }))
                }))
                .purge_after(Duration::days(7))
                .build()?,
        )
        .await?;

    scheduler.start().await;
    println!(
        "next report: {:?}",
        scheduler.next_occurrence("daily-report").await
    );

    tokio::time::sleep(std::time::Duration::from_secs(30)).await;
    scheduler.stop().await;
    Ok(())
}
