//! Weekday-aware send-time assignment
//!
//! Pure functions: no database or network access. Callers persist the
//! computed timestamps in bounded batches.

use chrono::{DateTime, Datelike, Duration, Timelike, Utc, Weekday};
use thiserror::Error;
use zapline_common::types::TargetId;

/// Spacing between two messages scheduled on the same day
const SPACING_MINUTES: i64 = 1;

/// How far forward to scan for an allowed weekday
const MAX_DAY_SCAN: i64 = 14;

/// Scheduling input validation errors
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ScheduleError {
    #[error("daily_volume must be a positive integer")]
    ZeroDailyVolume,

    #[error("allowed weekday set is empty")]
    EmptyWeekdays,

    #[error("no allowed weekday within {MAX_DAY_SCAN} days of the start instant")]
    NoAllowedDay,
}

/// Assign a send timestamp to each target, in input order.
///
/// At most `daily_volume` targets land on any single day, disallowed
/// weekdays receive none, and messages within a day are spaced
/// [`SPACING_MINUTES`] apart from the day's anchor. The first allowed day
/// anchors at `start_at`'s time of day; later anchors keep the time of day
/// with seconds zeroed.
pub fn assign_send_times(
    target_ids: &[TargetId],
    start_at: DateTime<Utc>,
    daily_volume: u32,
    weekdays: &[Weekday],
) -> Result<Vec<(TargetId, DateTime<Utc>)>, ScheduleError> {
    let slots = send_time_slots(target_ids.len(), start_at, daily_volume, weekdays)?;
    Ok(target_ids.iter().copied().zip(slots).collect())
}

/// Compute `count` send timestamps without binding them to target ids.
///
/// Used at planning time, before target rows exist.
pub fn send_time_slots(
    count: usize,
    start_at: DateTime<Utc>,
    daily_volume: u32,
    weekdays: &[Weekday],
) -> Result<Vec<DateTime<Utc>>, ScheduleError> {
    if daily_volume == 0 {
        return Err(ScheduleError::ZeroDailyVolume);
    }

    let allowed = allowed_set(weekdays)?;

    let mut slots = Vec::with_capacity(count);
    let mut anchor = first_allowed_day(start_at, &allowed)?;
    let mut used = 0u32;

    for _ in 0..count {
        if used >= daily_volume {
            anchor = next_allowed_day(anchor, &allowed)?;
            used = 0;
        }
        slots.push(anchor + Duration::minutes(used as i64 * SPACING_MINUTES));
        used += 1;
    }

    Ok(slots)
}

fn allowed_set(weekdays: &[Weekday]) -> Result<[bool; 7], ScheduleError> {
    if weekdays.is_empty() {
        return Err(ScheduleError::EmptyWeekdays);
    }

    let mut allowed = [false; 7];
    for day in weekdays {
        allowed[day.num_days_from_monday() as usize] = true;
    }
    Ok(allowed)
}

fn is_allowed(instant: DateTime<Utc>, allowed: &[bool; 7]) -> bool {
    allowed[instant.weekday().num_days_from_monday() as usize]
}

/// First allowed day at or after `start_at`, preserving its time of day.
///
/// An exhausted scan means the allowed set cannot be satisfied; that is a
/// configuration error, not a fallback date.
fn first_allowed_day(
    start_at: DateTime<Utc>,
    allowed: &[bool; 7],
) -> Result<DateTime<Utc>, ScheduleError> {
    for offset in 0..=MAX_DAY_SCAN {
        let candidate = start_at + Duration::days(offset);
        if is_allowed(candidate, allowed) {
            return Ok(candidate);
        }
    }
    Err(ScheduleError::NoAllowedDay)
}

/// Next allowed day strictly after `anchor`, seconds zeroed.
fn next_allowed_day(
    anchor: DateTime<Utc>,
    allowed: &[bool; 7],
) -> Result<DateTime<Utc>, ScheduleError> {
    for offset in 1..=MAX_DAY_SCAN {
        let candidate = anchor + Duration::days(offset);
        if is_allowed(candidate, allowed) {
            return Ok(truncate_seconds(candidate));
        }
    }
    Err(ScheduleError::NoAllowedDay)
}

fn truncate_seconds(instant: DateTime<Utc>) -> DateTime<Utc> {
    instant
        .with_second(0)
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(instant)
}
