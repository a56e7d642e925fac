//! Long-horizon one-shot timer.
//!
//! Platform timers cap a single delay at 2^31 - 1 milliseconds (~24.8 days).
//! [`LongTimer`] fires at arbitrarily distant instants by chaining placeholder
//! delays of the maximum length until the remaining distance fits in one real
//! delay. The callback always receives the *intended* instant, not the actual
//! fire instant, so downstream consumers observe the logically-scheduled time
//! even under timer jitter.

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::time::sleep;

/// Longest single delay a timer may be armed with, in milliseconds.
pub(crate) const MAX_TIMER_DELAY_MS: i64 = i32::MAX as i64;

/// One step in the delay chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Arm {
    /// Sleep this long, then fire.
    Fire(std::time::Duration),
    /// Sleep this long, then recompute; the target is still out of range.
    Placeholder(std::time::Duration),
}

/// Decide the next delay-chain step for `target` as seen from `now`.
///
/// Past targets clamp to a zero-length fire so a late arm still invokes the
/// callback exactly once.
pub(crate) fn next_delay(target: DateTime<Utc>, now: DateTime<Utc>) -> Arm {
    let diff_ms = (target - now).num_milliseconds();
    if diff_ms < MAX_TIMER_DELAY_MS {
        Arm::Fire(std::time::Duration::from_millis(diff_ms.max(0) as u64))
    } else {
        Arm::Placeholder(std::time::Duration::from_millis(MAX_TIMER_DELAY_MS as u64))
    }
}

/// Cancellation handle for an armed timer.
///
/// Cancelling is idempotent and safe at any point in the chain; once
/// cancelled, the timer neither fires nor rearms. Dropping the handle
/// *without* cancelling detaches the timer and lets it fire.
#[derive(Debug)]
pub struct TimerHandle {
    cancel: watch::Sender<bool>,
}

impl TimerHandle {
    /// Cancel the timer. Safe to call repeatedly, and after the timer has
    /// already fired.
    pub fn cancel(&self) {
        // Send fails only when the timer task is already gone, which is
        // exactly the state cancellation wants.
        let _ = self.cancel.send(true);
    }
}

/// A one-shot timer that can target instants beyond the platform delay bound.
pub struct LongTimer;

impl LongTimer {
    /// Arm a timer that invokes `callback` with `target` once `target` is
    /// reached. Must be called within a tokio runtime.
    pub fn arm<F>(target: DateTime<Utc>, callback: F) -> TimerHandle
    where
        F: FnOnce(DateTime<Utc>) + Send + 'static,
    {
        let (tx, mut rx) = watch::channel(false);
        tokio::spawn(async move {
            let mut callback = Some(callback);
            loop {
                match next_delay(target, Utc::now()) {
                    Arm::Fire(delay) => {
                        tokio::select! {
                            _ = cancelled(&mut rx) => return,
                            _ = sleep(delay) => {
                                if let Some(callback) = callback.take() {
                                    callback(target);
                                }
                                return;
                            }
                        }
                    }
                    Arm::Placeholder(delay) => {
                        tokio::select! {
                            _ = cancelled(&mut rx) => return,
                            _ = sleep(delay) => {}
                        }
                    }
                }
            }
        });
        TimerHandle { cancel: tx }
    }
}

/// Resolves when cancellation is signalled; pends forever if the handle was
/// dropped without cancelling.
async fn cancelled(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow() {
            return;
        }
        if rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
