//! Email schedules: wire models, recurrence descriptor and draft validation.

use std::collections::BTreeSet;
use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use vista_core::{Result, VistaError};
use vista_widget::WidgetStateOverride;

/// Day labels indexed 0 = Monday through 6 = Sunday.
pub const DAY_LABELS: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];

/// Highest selectable day of month; every month has it.
pub const MAX_DAY_OF_MONTH: u32 = 28;

/// Recurrence kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecurrenceType {
    Daily,
    #[default]
    Weekly,
    Monthly,
}

/// Weekdays a schedule fires on (0 = Monday).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "Vec<u8>", into = "Vec<u8>")]
pub struct DaySet(BTreeSet<u8>);

impl DaySet {
    /// Monday through Friday.
    pub fn weekdays() -> Self {
        Self((0..5).collect())
    }

    pub fn all() -> Self {
        Self((0..7).collect())
    }

    pub fn of(days: &[u8]) -> Self {
        Self::from(days.to_vec())
    }

    pub fn contains(&self, day: u8) -> bool {
        self.0.contains(&day)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = u8> + '_ {
        self.0.iter().copied()
    }

    /// Flip one day. Deselecting the only remaining day is refused.
    ///
    /// Returns whether the set changed.
    pub fn toggle(&mut self, day: u8) -> bool {
        if day > 6 {
            return false;
        }
        if self.0.contains(&day) {
            if self.0.len() == 1 {
                return false;
            }
            self.0.remove(&day);
        } else {
            self.0.insert(day);
        }
        true
    }
}

impl From<Vec<u8>> for DaySet {
    fn from(days: Vec<u8>) -> Self {
        Self(days.into_iter().filter(|d| *d <= 6).collect())
    }
}

impl From<DaySet> for Vec<u8> {
    fn from(days: DaySet) -> Self {
        days.0.into_iter().collect()
    }
}

/// Wall-clock "HH:MM".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TimeOfDay {
    pub hour: u32,
    pub minute: u32,
}

impl TimeOfDay {
    pub fn new(hour: u32, minute: u32) -> Result<Self> {
        if hour > 23 || minute > 59 {
            return Err(VistaError::validation(
                "time_of_day",
                format!("{hour:02}:{minute:02} is not a valid time"),
            ));
        }
        Ok(Self { hour, minute })
    }

    pub fn parse(text: &str) -> Result<Self> {
        let invalid = || VistaError::validation("time_of_day", format!("'{text}' is not HH:MM"));
        let (h, m) = text.trim().split_once(':').ok_or_else(invalid)?;
        let hour = h.parse().map_err(|_| invalid())?;
        let minute = m.parse().map_err(|_| invalid())?;
        Self::new(hour, minute)
    }
}

impl TryFrom<String> for TimeOfDay {
    type Error = VistaError;

    fn try_from(text: String) -> Result<Self> {
        Self::parse(&text)
    }
}

impl From<TimeOfDay> for String {
    fn from(time: TimeOfDay) -> Self {
        time.to_string()
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

/// When a schedule fires. `time_of_day` is UTC.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recurrence {
    #[serde(default)]
    pub recurrence_type: RecurrenceType,
    #[serde(default)]
    pub days_of_week: DaySet,
    #[serde(default)]
    pub day_of_month: Option<u32>,
    pub time_of_day: TimeOfDay,
}

impl Recurrence {
    /// Days the schedule can fire on; daily and monthly fire any weekday.
    pub fn effective_days(&self) -> DaySet {
        match self.recurrence_type {
            RecurrenceType::Weekly => self.days_of_week.clone(),
            RecurrenceType::Daily | RecurrenceType::Monthly => {
                if self.days_of_week.is_empty() {
                    DaySet::all()
                } else {
                    self.days_of_week.clone()
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScheduleStatus {
    #[default]
    Active,
    Paused,
    Failed,
}

/// A stored schedule. `widget_overrides` is a frozen copy taken at creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmailSchedule {
    pub schedule_id: String,
    pub owner: String,
    pub name: String,
    pub entity_type: String,
    pub entity_id: String,
    #[serde(default)]
    pub widget_ids: Option<Vec<String>>,
    pub recipients: Vec<String>,
    #[serde(flatten)]
    pub recurrence: Recurrence,
    #[serde(default)]
    pub widget_overrides: Vec<WidgetStateOverride>,
    #[serde(default)]
    pub status: ScheduleStatus,
    #[serde(default)]
    pub next_run_at: String,
    #[serde(default)]
    pub last_run_at: String,
    #[serde(default)]
    pub retry_count: u32,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub updated_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmailScheduleCreate {
    pub name: String,
    pub entity_type: String,
    pub entity_id: String,
    pub widget_ids: Option<Vec<String>>,
    pub recipients: Vec<String>,
    #[serde(flatten)]
    pub recurrence: Recurrence,
    pub widget_overrides: Vec<WidgetStateOverride>,
}

/// Partial schedule update; unset fields are left alone.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EmailScheduleUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipients: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recurrence_type: Option<RecurrenceType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub days_of_week: Option<DaySet>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub day_of_month: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_of_day: Option<TimeOfDay>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ScheduleStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub widget_overrides: Option<Vec<WidgetStateOverride>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogStatus {
    Sent,
    Failed,
}

/// Outcome of one delivery attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmailLog {
    pub log_id: String,
    pub schedule_id: String,
    pub sent_at: String,
    pub status: LogStatus,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub recipients: Vec<String>,
}

/// Schedule persistence.
#[async_trait]
pub trait ScheduleStore: Send + Sync {
    async fn create_schedule(&self, body: &EmailScheduleCreate) -> Result<EmailSchedule>;

    async fn list_schedules(
        &self,
        entity_type: Option<&str>,
        entity_id: Option<&str>,
    ) -> Result<Vec<EmailSchedule>>;

    async fn get_schedule(&self, schedule_id: &str) -> Result<EmailSchedule>;

    async fn update_schedule(
        &self,
        schedule_id: &str,
        body: &EmailScheduleUpdate,
    ) -> Result<EmailSchedule>;

    async fn delete_schedule(&self, schedule_id: &str) -> Result<()>;

    async fn schedule_logs(&self, schedule_id: &str) -> Result<Vec<EmailLog>>;

    /// Deliver immediately, outside the recurrence.
    async fn send_now(&self, schedule_id: &str) -> Result<EmailLog>;
}

/// Split a comma-separated address field, dropping blanks.
pub fn parse_recipients(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .map(str::to_string)
        .collect()
}

/// Schedule form state before submission.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleDraft {
    pub name: String,
    /// Raw comma-separated address text
    pub recipients: String,
    pub recurrence_type: RecurrenceType,
    pub days: DaySet,
    pub day_of_month: u32,
    /// UTC
    pub time_of_day: TimeOfDay,
}

impl Default for ScheduleDraft {
    fn default() -> Self {
        Self {
            name: String::new(),
            recipients: String::new(),
            recurrence_type: RecurrenceType::Weekly,
            days: DaySet::weekdays(),
            day_of_month: 1,
            time_of_day: TimeOfDay { hour: 14, minute: 0 },
        }
    }
}

/// Draft fields that passed validation.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedSchedule {
    pub name: String,
    pub recipients: Vec<String>,
    pub recurrence: Recurrence,
}

impl ScheduleDraft {
    /// Form state for editing an existing schedule.
    pub fn from_schedule(schedule: &EmailSchedule) -> Self {
        let days = if schedule.recurrence.days_of_week.is_empty() {
            DaySet::weekdays()
        } else {
            schedule.recurrence.days_of_week.clone()
        };
        Self {
            name: schedule.name.clone(),
            recipients: schedule.recipients.join(", "),
            recurrence_type: schedule.recurrence.recurrence_type,
            days,
            day_of_month: schedule.recurrence.day_of_month.unwrap_or(1),
            time_of_day: schedule.recurrence.time_of_day,
        }
    }

    /// Check the draft; nothing is sent when this fails.
    pub fn validate(&self) -> Result<ValidatedSchedule> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(VistaError::validation("name", "Schedule name is required."));
        }

        let recipients = parse_recipients(&self.recipients);
        if recipients.is_empty() {
            return Err(VistaError::validation(
                "recipients",
                "Please enter at least one recipient email.",
            ));
        }

        let recurrence = match self.recurrence_type {
            RecurrenceType::Monthly => {
                if !(1..=MAX_DAY_OF_MONTH).contains(&self.day_of_month) {
                    return Err(VistaError::validation(
                        "day_of_month",
                        format!("Day of month must be between 1 and {MAX_DAY_OF_MONTH}."),
                    ));
                }
                Recurrence {
                    recurrence_type: RecurrenceType::Monthly,
                    days_of_week: DaySet::all(),
                    day_of_month: Some(self.day_of_month),
                    time_of_day: self.time_of_day,
                }
            }
            kind @ (RecurrenceType::Daily | RecurrenceType::Weekly) => {
                if self.days.is_empty() {
                    return Err(VistaError::validation(
                        "days_of_week",
                        "Select at least one day.",
                    ));
                }
                Recurrence {
                    recurrence_type: kind,
                    days_of_week: self.days.clone(),
                    day_of_month: None,
                    time_of_day: self.time_of_day,
                }
            }
        };

        Ok(ValidatedSchedule {
            name: name.to_string(),
            recipients,
            recurrence,
        })
    }

    /// Validated create body carrying a frozen override snapshot.
    pub fn to_create(
        &self,
        entity_type: &str,
        entity_id: &str,
        widget_overrides: Vec<WidgetStateOverride>,
    ) -> Result<EmailScheduleCreate> {
        let valid = self.validate()?;
        Ok(EmailScheduleCreate {
            name: valid.name,
            entity_type: entity_type.to_string(),
            entity_id: entity_id.to_string(),
            widget_ids: None,
            recipients: valid.recipients,
            recurrence: valid.recurrence,
            widget_overrides,
        })
    }

    /// Validated update body. The override snapshot is left untouched.
    pub fn to_update(&self) -> Result<EmailScheduleUpdate> {
        let valid = self.validate()?;
        Ok(EmailScheduleUpdate {
            name: Some(valid.name),
            recipients: Some(valid.recipients),
            recurrence_type: Some(valid.recurrence.recurrence_type),
            days_of_week: Some(valid.recurrence.days_of_week),
            day_of_month: valid.recurrence.day_of_month,
            time_of_day: Some(valid.recurrence.time_of_day),
            ..Default::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn draft() -> ScheduleDraft {
        ScheduleDraft {
            name: " Daily AAPL ".into(),
            recipients: "a@example.com, ,b@example.com ".into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_parse_recipients() {
        assert_eq!(
            parse_recipients(" a@x.com,b@x.com , ,"),
            vec!["a@x.com".to_string(), "b@x.com".to_string()]
        );
        assert!(parse_recipients(" , ").is_empty());
    }

    #[test]
    fn test_valid_draft() {
        let valid = draft().validate().unwrap();
        assert_eq!(valid.name, "Daily AAPL");
        assert_eq!(valid.recipients.len(), 2);
        assert_eq!(valid.recurrence.days_of_week, DaySet::weekdays());
        assert!(valid.recurrence.day_of_month.is_none());
    }

    #[test]
    fn test_empty_recipients_rejected() {
        let mut d = draft();
        d.recipients = " , ".into();
        let err = d.validate().unwrap_err();
        assert!(err.is_validation());
        assert_eq!(err.friendly_message(), "Please enter at least one recipient email.");
    }

    #[test]
    fn test_blank_name_rejected() {
        let mut d = draft();
        d.name = "   ".into();
        assert!(d.validate().unwrap_err().is_validation());
    }

    #[test]
    fn test_day_of_month_range() {
        let mut d = draft();
        d.recurrence_type = RecurrenceType::Monthly;
        for bad in [0, 29, 31] {
            d.day_of_month = bad;
            assert!(d.validate().is_err(), "{bad} accepted");
        }
        d.day_of_month = 28;
        let valid = d.validate().unwrap();
        assert_eq!(valid.recurrence.day_of_month, Some(28));
        assert_eq!(valid.recurrence.days_of_week, DaySet::all());
    }

    #[test]
    fn test_weekly_needs_a_day() {
        let mut d = draft();
        d.days = DaySet::default();
        assert!(d.validate().is_err());
    }

    #[test]
    fn test_toggle_keeps_last_day() {
        let mut days = DaySet::of(&[2]);
        assert!(!days.toggle(2));
        assert!(days.contains(2));
        assert!(days.toggle(4));
        assert!(days.toggle(2));
        assert_eq!(days.iter().collect::<Vec<_>>(), vec![4]);
        assert!(!days.toggle(7));
    }

    #[test]
    fn test_time_of_day_parse() {
        assert_eq!(TimeOfDay::parse("09:00").unwrap(), TimeOfDay { hour: 9, minute: 0 });
        assert!(TimeOfDay::parse("24:00").is_err());
        assert!(TimeOfDay::parse("nine").is_err());
    }

    #[test]
    fn test_schedule_wire_shape() {
        let schedule: EmailSchedule = serde_json::from_value(json!({
            "schedule_id": "s1",
            "owner": "alice",
            "name": "Weekly",
            "entity_type": "stock",
            "entity_id": "AAPL",
            "recipients": ["a@example.com"],
            "recurrence_type": "weekly",
            "days_of_week": [4, 0, 2],
            "time_of_day": "09:00",
            "status": "paused"
        }))
        .unwrap();
        assert_eq!(schedule.recurrence.days_of_week, DaySet::of(&[0, 2, 4]));
        assert_eq!(schedule.status, ScheduleStatus::Paused);

        let body = draft().to_create("stock", "AAPL", Vec::new()).unwrap();
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["recurrence_type"], "weekly");
        assert_eq!(value["time_of_day"], "14:00");
        assert_eq!(value["days_of_week"], json!([0, 1, 2, 3, 4]));
        assert_eq!(value["day_of_month"], serde_json::Value::Null);
    }

    #[test]
    fn test_draft_from_schedule_round_trip() {
        let create = draft().to_create("stock", "AAPL", Vec::new()).unwrap();
        let schedule = EmailSchedule {
            schedule_id: "s1".into(),
            owner: "alice".into(),
            name: create.name.clone(),
            entity_type: create.entity_type.clone(),
            entity_id: create.entity_id.clone(),
            widget_ids: None,
            recipients: create.recipients.clone(),
            recurrence: create.recurrence.clone(),
            widget_overrides: Vec::new(),
            status: ScheduleStatus::Active,
            next_run_at: String::new(),
            last_run_at: String::new(),
            retry_count: 0,
            created_at: String::new(),
            updated_at: String::new(),
        };
        let edit = ScheduleDraft::from_schedule(&schedule);
        assert_eq!(edit.recipients, "a@example.com, b@example.com");
        let update = edit.to_update().unwrap();
        assert!(update.widget_overrides.is_none());
        assert_eq!(update.days_of_week, Some(DaySet::weekdays()));
    }
}
