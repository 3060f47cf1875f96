//! Recurrence engine: when is a recurring task due next?
//!
//! Completion mode is an offset from the completion instant. Calendar mode
//! follows the wall-clock schedule: daily/weekly/monthly land at start of
//! day UTC, interval mode steps forward from an anchor. Month arithmetic is
//! chrono's (day-of-month clamped at short month ends).

use chrono::{DateTime, Datelike, Duration, Months, NaiveDate, NaiveTime, TimeZone, Utc};

use crate::task::{IntervalUnit, RecurrenceMode, RecurrencePattern, RecurrenceType, Task};

/// Expected gap between occurrences, in days.
pub fn expected_interval_days(pattern: &RecurrencePattern) -> f64 {
    match pattern.kind {
        RecurrenceType::Daily => 1.0,
        RecurrenceType::Weekly => 7.0,
        RecurrenceType::Monthly => 30.0,
        RecurrenceType::Interval => {
            let unit_days = match pattern.unit {
                IntervalUnit::Days => 1,
                IntervalUnit::Weeks => 7,
                IntervalUnit::Months => 30,
            };
            // a zero interval would stall the schedule
            (pattern.interval.max(1) * unit_days) as f64
        }
    }
}

fn interval_duration(pattern: &RecurrencePattern) -> Duration {
    Duration::seconds((expected_interval_days(pattern) * 86_400.0) as i64)
}

fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN))
}

/// Compute the next due instant after completing at `completed_at`.
///
/// Always strictly after `completed_at`.
pub fn next_due(
    pattern: &RecurrencePattern,
    completed_at: DateTime<Utc>,
    task: &Task,
) -> DateTime<Utc> {
    match pattern.mode {
        RecurrenceMode::Completion => completed_at + interval_duration(pattern),
        RecurrenceMode::Calendar => calendar_next(pattern, completed_at, task),
    }
}

fn calendar_next(
    pattern: &RecurrencePattern,
    completed_at: DateTime<Utc>,
    task: &Task,
) -> DateTime<Utc> {
    match pattern.kind {
        RecurrenceType::Daily => start_of_day(completed_at.date_naive() + Duration::days(1)),
        RecurrenceType::Weekly => weekly_next(pattern, completed_at),
        RecurrenceType::Monthly => {
            let date = completed_at.date_naive();
            let next = date
                .checked_add_months(Months::new(1))
                .unwrap_or(date + Duration::days(30));
            start_of_day(next)
        }
        RecurrenceType::Interval => {
            let step = interval_duration(pattern);
            let mut due = pattern.anchor.unwrap_or(task.created_at);
            while due <= completed_at {
                due += step;
            }
            due
        }
    }
}

fn weekly_next(pattern: &RecurrencePattern, completed_at: DateTime<Utc>) -> DateTime<Utc> {
    let current = completed_at.weekday().num_days_from_sunday() as i64;

    if let Some(days) = pattern.days_of_week.as_ref().filter(|d| !d.is_empty()) {
        for offset in 1..=7 {
            let date = completed_at.date_naive() + Duration::days(offset);
            let weekday = date.weekday().num_days_from_sunday() as u8;
            if days.contains(&weekday) {
                return start_of_day(date);
            }
        }
        // unreachable with a non-empty set; fall through to the generic step
        return completed_at + Duration::days(7);
    }

    if let Some(target) = pattern.day_of_week {
        let mut days_until = target as i64 - current;
        if days_until <= 0 {
            days_until += 7;
        }
        return start_of_day(completed_at.date_naive() + Duration::days(days_until));
    }

    completed_at + Duration::days(7)
}
