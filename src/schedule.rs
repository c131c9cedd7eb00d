//! Weekly draw recurrence parsing and draw/cutoff instant arithmetic.

use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Utc, Weekday};
use chrono_tz::Tz;
use thiserror::Error;
use tracing::warn;

/// Errors produced while parsing a recurrence specification.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScheduleError {
    /// No entry of the specification could be parsed.
    #[error("schedule specification contains no usable entries")]
    Empty,
    /// Two entries share the same weekday, which would make draw matching ambiguous.
    #[error("schedule declares weekday {weekday} more than once")]
    DuplicateWeekday {
        /// The weekday declared twice.
        weekday: Weekday,
    },
}

/// One draw occurrence per week: weekday plus wall-clock time in a named zone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleEntry {
    /// Weekday the draw happens on.
    pub weekday: Weekday,
    /// Hour of day (0-23) in the entry's timezone.
    pub hour: u32,
    /// Minute of hour (0-59) in the entry's timezone.
    pub minute: u32,
    /// IANA timezone the wall-clock time is expressed in.
    pub zone: Tz,
}

/// A parsed weekly recurrence, entries ordered by weekday (Monday first).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schedule {
    entries: Vec<ScheduleEntry>,
}

impl Schedule {
    /// Parse a comma-separated list of `Weekday HH:mm Zone/Id` triples,
    /// e.g. `Wed 20:30 America/Edmonton,Sat 20:30 America/Edmonton`.
    ///
    /// Malformed entries are skipped with a warning so a partially broken
    /// specification still yields the valid occurrences. An empty result and
    /// duplicate weekdays are reported as errors.
    pub fn parse(spec: &str) -> Result<Self, ScheduleError> {
        let mut entries: Vec<ScheduleEntry> = Vec::new();

        for raw in spec.split(',') {
            let raw = raw.trim();
            if raw.is_empty() {
                continue;
            }
            match parse_entry(raw) {
                Some(entry) => {
                    if entries.iter().any(|e| e.weekday == entry.weekday) {
                        return Err(ScheduleError::DuplicateWeekday {
                            weekday: entry.weekday,
                        });
                    }
                    entries.push(entry);
                }
                None => warn!(entry = raw, "skipping malformed schedule entry"),
            }
        }

        if entries.is_empty() {
            return Err(ScheduleError::Empty);
        }

        entries.sort_by_key(|e| e.weekday.num_days_from_monday());
        Ok(Self { entries })
    }

    /// Parsed entries, ordered by weekday.
    pub fn entries(&self) -> &[ScheduleEntry] {
        &self.entries
    }

    /// UTC instant of the draw on the given calendar date.
    ///
    /// Matching is exact: the date's weekday must appear in the schedule.
    /// Returns `None` when it does not, or when the wall-clock time does not
    /// exist in the entry's zone (DST gap); callers must treat such a date as
    /// unusable for timing rather than guess.
    pub fn draw_instant_utc(&self, date: NaiveDate) -> Option<DateTime<Utc>> {
        let entry = self.entries.iter().find(|e| e.weekday == date.weekday())?;
        let local = entry
            .zone
            .with_ymd_and_hms(
                date.year(),
                date.month(),
                date.day(),
                entry.hour,
                entry.minute,
                0,
            )
            .earliest()?;
        Some(local.with_timezone(&Utc))
    }

    /// Calendar date of the draw preceding `next_draw_date`.
    ///
    /// The entry before the matching one in cyclic weekday order defines the
    /// prior draw's weekday; a single-entry schedule wraps onto itself a full
    /// week back. Returns `None` when `next_draw_date`'s weekday is not in the
    /// schedule.
    pub fn previous_draw_date(&self, next_draw_date: NaiveDate) -> Option<NaiveDate> {
        let position = self
            .entries
            .iter()
            .position(|e| e.weekday == next_draw_date.weekday())?;
        let previous = &self.entries[(position + self.entries.len() - 1) % self.entries.len()];

        let next_weekday = i64::from(next_draw_date.weekday().num_days_from_monday());
        let prev_weekday = i64::from(previous.weekday.num_days_from_monday());
        let mut delta = (next_weekday - prev_weekday).rem_euclid(7);
        if delta == 0 {
            delta = 7;
        }

        next_draw_date.checked_sub_signed(Duration::days(delta))
    }

    /// UTC instant after which the submission for `draw_date` can no longer be
    /// edited: the draw instant minus `lead`.
    pub fn cutoff_instant_utc(&self, draw_date: NaiveDate, lead: Duration) -> Option<DateTime<Utc>> {
        self.draw_instant_utc(draw_date)?.checked_sub_signed(lead)
    }
}

/// Parse a single `Weekday HH:mm Zone/Id` triple, `None` when malformed.
fn parse_entry(raw: &str) -> Option<ScheduleEntry> {
    let tokens: Vec<&str> = raw.split_whitespace().collect();
    let [weekday, time, zone] = tokens.as_slice() else {
        return None;
    };

    let weekday: Weekday = weekday.parse().ok()?;

    let (hour, minute) = time.split_once(':')?;
    let hour: u32 = hour.parse().ok()?;
    let minute: u32 = minute.parse().ok()?;
    if hour > 23 || minute > 59 {
        return None;
    }

    // A zone id without a region separator is never a valid IANA name.
    if !zone.contains('/') {
        return None;
    }
    let zone: Tz = zone.parse().ok()?;

    Some(ScheduleEntry {
        weekday,
        hour,
        minute,
        zone,
    })
}
