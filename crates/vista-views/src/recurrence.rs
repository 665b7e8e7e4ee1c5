//! Rendering and stepping schedule recurrences.
//!
//! Times are stored in UTC and shown in one fixed display offset. The offset
//! does not follow daylight saving, so the same stored time always renders
//! with the same label.

use chrono::{DateTime, Datelike, Duration, Months, TimeZone, Utc};

use crate::schedule::{DAY_LABELS, Recurrence, RecurrenceType, TimeOfDay};

/// Fixed display offset and its label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayZone {
    pub offset_hours: i32,
    pub label: String,
}

impl Default for DisplayZone {
    fn default() -> Self {
        Self {
            offset_hours: -5,
            label: "EST".to_string(),
        }
    }
}

impl DisplayZone {
    pub fn new(offset_hours: i32, label: impl Into<String>) -> Self {
        Self {
            offset_hours,
            label: label.into(),
        }
    }

    /// Local display hour for a UTC hour.
    pub fn local_hour(&self, utc_hour: u32) -> u32 {
        (utc_hour as i32 + self.offset_hours).rem_euclid(24) as u32
    }

    /// UTC hour for a local display hour.
    pub fn utc_hour(&self, local_hour: u32) -> u32 {
        (local_hour as i32 - self.offset_hours).rem_euclid(24) as u32
    }
}

/// One entry of the time-of-day picker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HourOption {
    /// Stored UTC value
    pub value: TimeOfDay,
    /// Local 12-hour label, e.g. "4:00 AM"
    pub label: String,
}

fn twelve_hour(local_hour: u32, minute: u32) -> String {
    let hour12 = match local_hour {
        0 => 12,
        h if h > 12 => h - 12,
        h => h,
    };
    let meridiem = if local_hour < 12 { "AM" } else { "PM" };
    format!("{hour12}:{minute:02} {meridiem}")
}

/// The 24 selectable hours, ordered by local time starting at midnight.
pub fn hour_options(zone: &DisplayZone) -> Vec<HourOption> {
    (0..24)
        .map(|local| HourOption {
            value: TimeOfDay {
                hour: zone.utc_hour(local),
                minute: 0,
            },
            label: twelve_hour(local, 0),
        })
        .collect()
}

/// A stored UTC time as local wall-clock text with the zone label.
pub fn format_time(time: TimeOfDay, zone: &DisplayZone) -> String {
    format!(
        "{} {}",
        twelve_hour(zone.local_hour(time.hour), time.minute),
        zone.label
    )
}

fn ordinal_suffix(n: u32) -> &'static str {
    match (n % 10, n % 100) {
        (1, m) if m != 11 => "st",
        (2, m) if m != 12 => "nd",
        (3, m) if m != 13 => "rd",
        _ => "th",
    }
}

/// Human summary such as `Mon, Wed, Fri @ 4:00 AM EST`.
pub fn format_schedule(recurrence: &Recurrence, zone: &DisplayZone) -> String {
    let time = format_time(recurrence.time_of_day, zone);
    match (recurrence.recurrence_type, recurrence.day_of_month) {
        (RecurrenceType::Monthly, Some(day)) => {
            format!("Monthly on the {day}{} @ {time}", ordinal_suffix(day))
        }
        (RecurrenceType::Daily, _) => format!("Daily @ {time}"),
        _ => {
            let days: Vec<&str> = recurrence
                .days_of_week
                .iter()
                .filter_map(|d| DAY_LABELS.get(usize::from(d)).copied())
                .collect();
            format!("{} @ {time}", days.join(", "))
        }
    }
}

fn at_time(day: DateTime<Utc>, time: TimeOfDay) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(day.year(), day.month(), day.day(), time.hour, time.minute, 0)
        .single()
        .unwrap_or(day)
}

fn weekday_index(at: DateTime<Utc>) -> u8 {
    at.weekday().num_days_from_monday() as u8
}

fn next_matching_day(from: DateTime<Utc>, recurrence: &Recurrence) -> DateTime<Utc> {
    let days = recurrence.effective_days();
    (1..=7)
        .map(|offset| at_time(from + Duration::days(offset), recurrence.time_of_day))
        .find(|candidate| days.contains(weekday_index(*candidate)))
        .unwrap_or_else(|| at_time(from + Duration::days(1), recurrence.time_of_day))
}

fn with_day_of_month(at: DateTime<Utc>, day: u32) -> DateTime<Utc> {
    at.with_day(day).unwrap_or(at)
}

/// Run after `current` once a delivery at `current` has happened.
///
/// Daily and weekly step to the next matching weekday within seven days;
/// monthly moves to the same day one month later.
pub fn next_run_after(current: DateTime<Utc>, recurrence: &Recurrence) -> DateTime<Utc> {
    match (recurrence.recurrence_type, recurrence.day_of_month) {
        (RecurrenceType::Monthly, Some(day)) => {
            let next = current.checked_add_months(Months::new(1)).unwrap_or(current);
            with_day_of_month(at_time(next, recurrence.time_of_day), day)
        }
        _ => next_matching_day(current, recurrence),
    }
}

/// First run for a newly created schedule; today counts if its time is still ahead.
pub fn initial_run_after(now: DateTime<Utc>, recurrence: &Recurrence) -> DateTime<Utc> {
    match (recurrence.recurrence_type, recurrence.day_of_month) {
        (RecurrenceType::Monthly, Some(day)) => {
            let candidate = with_day_of_month(at_time(now, recurrence.time_of_day), day);
            if candidate > now {
                candidate
            } else {
                candidate.checked_add_months(Months::new(1)).unwrap_or(candidate)
            }
        }
        _ => {
            let today = at_time(now, recurrence.time_of_day);
            if recurrence.effective_days().contains(weekday_index(now)) && today > now {
                today
            } else {
                next_matching_day(now, recurrence)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::DaySet;

    fn weekly(days: &[u8], hour: u32) -> Recurrence {
        Recurrence {
            recurrence_type: RecurrenceType::Weekly,
            days_of_week: DaySet::of(days),
            day_of_month: None,
            time_of_day: TimeOfDay { hour, minute: 0 },
        }
    }

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    #[test]
    fn test_weekly_format_is_stable() {
        let recurrence = weekly(&[4, 0, 2], 9);
        let zone = DisplayZone::default();
        let first = format_schedule(&recurrence, &zone);
        assert_eq!(first, "Mon, Wed, Fri @ 4:00 AM EST");
        for _ in 0..5 {
            assert_eq!(format_schedule(&recurrence, &zone), first);
        }
    }

    #[test]
    fn test_daily_and_monthly_format() {
        let zone = DisplayZone::default();
        let mut recurrence = weekly(&[0, 1, 2, 3, 4, 5, 6], 17);
        recurrence.recurrence_type = RecurrenceType::Daily;
        assert_eq!(format_schedule(&recurrence, &zone), "Daily @ 12:00 PM EST");

        recurrence.recurrence_type = RecurrenceType::Monthly;
        recurrence.day_of_month = Some(22);
        assert_eq!(format_schedule(&recurrence, &zone), "Monthly on the 22nd @ 12:00 PM EST");
        recurrence.day_of_month = Some(11);
        assert!(format_schedule(&recurrence, &zone).contains("11th"));
    }

    #[test]
    fn test_midnight_wraps_backwards() {
        let zone = DisplayZone::default();
        assert_eq!(format_time(TimeOfDay { hour: 3, minute: 30 }, &zone), "10:30 PM EST");
        assert_eq!(format_time(TimeOfDay { hour: 5, minute: 0 }, &zone), "12:00 AM EST");
    }

    #[test]
    fn test_hour_options() {
        let options = hour_options(&DisplayZone::default());
        assert_eq!(options.len(), 24);
        assert_eq!(options[0].label, "12:00 AM");
        assert_eq!(options[0].value.to_string(), "05:00");
        assert_eq!(options[13].label, "1:00 PM");
        assert_eq!(options[13].value.to_string(), "18:00");
        assert_eq!(options[23].value.to_string(), "04:00");
    }

    #[test]
    fn test_next_weekly_run() {
        // 2026-03-02 is a Monday.
        let monday = utc(2026, 3, 2, 9, 0);
        let next = next_run_after(monday, &weekly(&[0, 2, 4], 9));
        assert_eq!(next, utc(2026, 3, 4, 9, 0));

        let friday = utc(2026, 3, 6, 9, 0);
        assert_eq!(next_run_after(friday, &weekly(&[0, 2, 4], 9)), utc(2026, 3, 9, 9, 0));
    }

    #[test]
    fn test_next_monthly_run() {
        let recurrence = Recurrence {
            recurrence_type: RecurrenceType::Monthly,
            days_of_week: DaySet::all(),
            day_of_month: Some(28),
            time_of_day: TimeOfDay { hour: 14, minute: 0 },
        };
        let next = next_run_after(utc(2026, 1, 28, 14, 0), &recurrence);
        assert_eq!(next, utc(2026, 2, 28, 14, 0));
    }

    #[test]
    fn test_initial_run_today_when_ahead() {
        let monday_morning = utc(2026, 3, 2, 6, 0);
        let recurrence = weekly(&[0], 9);
        assert_eq!(initial_run_after(monday_morning, &recurrence), utc(2026, 3, 2, 9, 0));

        let monday_evening = utc(2026, 3, 2, 20, 0);
        assert_eq!(initial_run_after(monday_evening, &recurrence), utc(2026, 3, 9, 9, 0));
    }

    #[test]
    fn test_initial_monthly_run_rolls_over() {
        let recurrence = Recurrence {
            recurrence_type: RecurrenceType::Monthly,
            days_of_week: DaySet::all(),
            day_of_month: Some(5),
            time_of_day: TimeOfDay { hour: 14, minute: 0 },
        };
        assert_eq!(initial_run_after(utc(2026, 3, 2, 0, 0), &recurrence), utc(2026, 3, 5, 14, 0));
        assert_eq!(initial_run_after(utc(2026, 3, 10, 0, 0), &recurrence), utc(2026, 4, 5, 14, 0));
    }
}
