//! Recurrence rules and the occurrence calculator.
//!
//! Entries describe *when* to run through a schedule function that receives a
//! [`ScheduleParser`] capability and returns a [`ScheduleSpec`]. Binding a
//! spec to a resolved [`Zone`] yields a [`ResolvedSchedule`], which can
//! produce the next occurrence instants strictly after any reference instant.

use std::str::FromStr;

use chrono::{DateTime, Duration, Local, TimeZone, Utc};

use crate::error::ScheduleError;
use crate::timezone::Zone;

/// The recurrence-parsing capability handed to each entry's schedule
/// function.
///
/// Keeping the grammar behind this capability means entries never name the
/// underlying engine; the scheduler only consumes the resulting spec.
#[derive(Debug, Default)]
pub struct ScheduleParser {
    _private: (),
}

impl ScheduleParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a cron expression (seven-field, seconds first).
    pub fn cron(&self, expr: &str) -> Result<ScheduleSpec, ScheduleError> {
        Ok(ScheduleSpec::Cron(cron::Schedule::from_str(expr)?))
    }

    /// A fixed-interval rule on the epoch-aligned grid.
    ///
    /// Anchoring at the Unix epoch makes the grid a pure function of the
    /// period, so every cooperating process computes identical occurrence
    /// instants and their `(intended_at, name)` slots collide as intended. A
    /// custom grid origin can be set by constructing
    /// [`ScheduleSpec::Every`] directly.
    pub fn every(&self, period: Duration) -> Result<ScheduleSpec, ScheduleError> {
        if period < Duration::milliseconds(1) {
            return Err(ScheduleError::InvalidPeriod(period.num_milliseconds()));
        }
        Ok(ScheduleSpec::Every {
            period,
            anchor: DateTime::UNIX_EPOCH,
        })
    }

    /// A fixed set of one-shot instants. Naturally terminal once the last
    /// instant passes.
    pub fn on(&self, mut instants: Vec<DateTime<Utc>>) -> ScheduleSpec {
        instants.sort();
        ScheduleSpec::Dates(instants)
    }
}

/// A parsed recurrence rule, not yet bound to a timezone.
#[derive(Debug, Clone)]
pub enum ScheduleSpec {
    /// Cron expression.
    Cron(cron::Schedule),
    /// Every `period`, counted from `anchor`. Periods under one millisecond
    /// yield no occurrences.
    Every {
        period: Duration,
        anchor: DateTime<Utc>,
    },
    /// Fixed instants, sorted ascending.
    Dates(Vec<DateTime<Utc>>),
}

/// A recurrence rule bound to a timezone: the occurrence calculator.
///
/// Cron rules are both *interpreted* and iterated in the bound zone, then
/// rendered back to UTC; interval and fixed-date rules are zone-independent.
#[derive(Debug, Clone)]
pub struct ResolvedSchedule {
    spec: ScheduleSpec,
    zone: Zone,
}

impl ResolvedSchedule {
    pub fn new(spec: ScheduleSpec, zone: Zone) -> Self {
        ResolvedSchedule { spec, zone }
    }

    /// The next `count` occurrence instants strictly after `after`.
    ///
    /// Terminal schedules return fewer instants (possibly none) rather than
    /// erroring.
    pub fn upcoming(&self, after: DateTime<Utc>, count: usize) -> Vec<DateTime<Utc>> {
        match &self.spec {
            ScheduleSpec::Cron(schedule) => match self.zone {
                Zone::Utc => cron_after(schedule, after.with_timezone(&Utc), count),
                Zone::Local => cron_after(schedule, after.with_timezone(&Local), count),
                Zone::Named(tz) => cron_after(schedule, after.with_timezone(&tz), count),
            },
            ScheduleSpec::Every { period, anchor } => {
                interval_after(*period, *anchor, after, count)
            }
            ScheduleSpec::Dates(instants) => instants
                .iter()
                .copied()
                .filter(|instant| *instant > after)
                .take(count)
                .collect(),
        }
    }

    /// The single next occurrence strictly after `after`, if any.
    pub fn next_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.upcoming(after, 1).into_iter().next()
    }
}

fn cron_after<Z: TimeZone>(
    schedule: &cron::Schedule,
    after: DateTime<Z>,
    count: usize,
) -> Vec<DateTime<Utc>> {
    schedule
        .after(&after)
        .take(count)
        .map(|instant| instant.with_timezone(&Utc))
        .collect()
}

fn interval_after(
    period: Duration,
    anchor: DateTime<Utc>,
    after: DateTime<Utc>,
    count: usize,
) -> Vec<DateTime<Utc>> {
    let period_ms = period.num_milliseconds();
    // Directly constructed specs can carry a sub-millisecond period; an
    // empty grid is the only safe answer for them.
    if period_ms <= 0 {
        return Vec::new();
    }
    let first = if after < anchor {
        anchor
    } else {
        // First tick strictly after `after`; exact-tick references advance a
        // full period.
        let elapsed_ms = (after - anchor).num_milliseconds();
        let steps = elapsed_ms / period_ms + 1;
        anchor + Duration::milliseconds(steps * period_ms)
    };
    (0..count as i64)
        .map(|step| first + Duration::milliseconds(step * period_ms))
        .collect()
}
