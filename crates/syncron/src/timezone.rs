//! Timezone policies and their resolution.
//!
//! An entry's timezone can be given as a fixed variant, an IANA zone name, or
//! a function of the entry's context. Policies are resolved once per
//! scheduling pass into a closed [`Zone`], so the occurrence calculator never
//! deals with dynamic configuration shapes.

use std::fmt;
use std::sync::Arc;

use crate::entry::JobContext;
use crate::error::ScheduleError;

/// How an entry's schedule is anchored to wall-clock time.
#[derive(Clone)]
pub enum TimezonePolicy {
    /// Interpret the rule in UTC.
    Utc,
    /// Interpret the rule in the process-local timezone.
    Local,
    /// Interpret the rule in a named IANA zone, e.g. `"America/New_York"`.
    Named(String),
    /// Derive a zone name from the entry's context at each scheduling pass;
    /// `None` falls through to the next policy in the resolution order.
    Dynamic(Arc<dyn Fn(&JobContext) -> Option<String> + Send + Sync>),
}

impl fmt::Debug for TimezonePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimezonePolicy::Utc => f.write_str("Utc"),
            TimezonePolicy::Local => f.write_str("Local"),
            TimezonePolicy::Named(name) => f.debug_tuple("Named").field(name).finish(),
            TimezonePolicy::Dynamic(_) => f.write_str("Dynamic(..)"),
        }
    }
}

/// A fully resolved timezone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Zone {
    Utc,
    Local,
    Named(chrono_tz::Tz),
}

fn resolve_policy(
    policy: &TimezonePolicy,
    context: &JobContext,
) -> Result<Option<Zone>, ScheduleError> {
    match policy {
        TimezonePolicy::Utc => Ok(Some(Zone::Utc)),
        TimezonePolicy::Local => Ok(Some(Zone::Local)),
        TimezonePolicy::Named(name) => parse_zone(name).map(Some),
        TimezonePolicy::Dynamic(f) => match f(context) {
            Some(name) => parse_zone(&name).map(Some),
            None => Ok(None),
        },
    }
}

fn parse_zone(name: &str) -> Result<Zone, ScheduleError> {
    name.parse::<chrono_tz::Tz>()
        .map(Zone::Named)
        .map_err(|_| ScheduleError::UnknownTimezone(name.to_string()))
}

/// Resolve the effective zone for one entry.
///
/// Resolution order: the entry's own policy (a `Dynamic` fn is evaluated
/// against the entry's context and may decline), then the scheduler-wide
/// default, then local time.
pub(crate) fn resolve_zone(
    entry_policy: Option<&TimezonePolicy>,
    default_policy: Option<&TimezonePolicy>,
    context: &JobContext,
) -> Result<Zone, ScheduleError> {
    if let Some(policy) = entry_policy {
        if let Some(zone) = resolve_policy(policy, context)? {
            return Ok(zone);
        }
    }
    if let Some(policy) = default_policy {
        if let Some(zone) = resolve_policy(policy, context)? {
            return Ok(zone);
        }
    }
    Ok(Zone::Local)
}
