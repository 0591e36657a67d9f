use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

impl Priority {
    pub const ALL: [Priority; 4] = [Priority::Low, Priority::Medium, Priority::High, Priority::Urgent];

    /// Higher is more urgent
    pub fn urgency(self) -> u8 {
        match self {
            Priority::Low => 0,
            Priority::Medium => 1,
            Priority::High => 2,
            Priority::Urgent => 3,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
            Priority::Urgent => "urgent",
        }
    }

    /// Next priority in cycling order (used by the task form)
    pub fn next(self) -> Self {
        match self {
            Priority::Low => Priority::Medium,
            Priority::Medium => Priority::High,
            Priority::High => Priority::Urgent,
            Priority::Urgent => Priority::Low,
        }
    }

    pub fn prev(self) -> Self {
        match self {
            Priority::Low => Priority::Urgent,
            Priority::Medium => Priority::Low,
            Priority::High => Priority::Medium,
            Priority::Urgent => Priority::High,
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "low" => Ok(Priority::Low),
            "medium" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            "urgent" => Ok(Priority::Urgent),
            other => Err(format!("unknown priority '{}' (expected low, medium, high or urgent)", other)),
        }
    }
}

// Stored files may carry any casing or an unknown label; those read as medium.
impl From<String> for Priority {
    fn from(value: String) -> Self {
        value.parse().unwrap_or_default()
    }
}

impl From<Priority> for String {
    fn from(value: Priority) -> Self {
        value.as_str().to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: u64,
    pub title: String,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "optional_date")]
    pub due_date: Option<NaiveDate>,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub completed: bool,
    pub created_at: NaiveDateTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<NaiveDateTime>,
}

impl Task {
    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        !self.completed && self.due_date.is_some_and(|due| due < today)
    }
}

/// Input for `TaskStore::add`
#[derive(Debug, Clone, Default)]
pub struct NewTask {
    pub title: String,
    pub description: Option<String>,
    pub due_date: Option<NaiveDate>,
    pub priority: Option<Priority>,
}

impl NewTask {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }

    pub fn due(mut self, date: NaiveDate) -> Self {
        self.due_date = Some(date);
        self
    }

    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Field edits for `TaskStore::update`. `None` leaves a field unchanged;
/// `Some(None)` clears an optional field.
#[derive(Debug, Clone, Default)]
pub struct TaskUpdate {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub due_date: Option<Option<NaiveDate>>,
    pub priority: Option<Priority>,
}

impl TaskUpdate {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.due_date.is_none()
            && self.priority.is_none()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleSlot {
    pub task: Task,
    pub suggested_start: NaiveDateTime,
    pub duration_minutes: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TaskStats {
    pub total: usize,
    pub completed: usize,
    pub pending: usize,
    pub overdue: usize,
    pub due_today: usize,
}

fn blank_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<String> = Option::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.trim().is_empty()))
}

fn optional_date<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<String> = Option::deserialize(deserializer)?;
    match value.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        // A bad date drops only the date, not the record
        Some(s) => match crate::utils::parse_date(s) {
            Ok(date) => Ok(Some(date)),
            Err(e) => {
                tracing::warn!(due_date = s, "ignoring unreadable due date: {e}");
                Ok(None)
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_parses_case_insensitively() {
        assert_eq!("HIGH".parse::<Priority>().unwrap(), Priority::High);
        assert_eq!(" urgent ".parse::<Priority>().unwrap(), Priority::Urgent);
        assert!("asap".parse::<Priority>().is_err());
    }

    #[test]
    fn urgency_orders_urgent_first() {
        let mut all = Priority::ALL.to_vec();
        all.sort_by_key(|p| std::cmp::Reverse(p.urgency()));
        assert_eq!(all, vec![Priority::Urgent, Priority::High, Priority::Medium, Priority::Low]);
    }

    #[test]
    fn legacy_records_with_blank_fields_deserialize() {
        let json = r#"{
            "id": 3,
            "title": "Read ch.3",
            "description": "",
            "due_date": "",
            "priority": "Whenever",
            "completed": false,
            "created_at": "2024-05-30T09:15:00.123456"
        }"#;
        let task: Task = serde_json::from_str(json).unwrap();
        assert_eq!(task.description, None);
        assert_eq!(task.due_date, None);
        assert_eq!(task.priority, Priority::Medium);
        assert_eq!(task.completed_at, None);
    }

    #[test]
    fn unreadable_due_date_reads_as_none() {
        for due in ["2024-13-01", "next friday"] {
            let json = format!(r#"{{"id":1,"title":"x","due_date":"{due}","created_at":"2024-05-30T09:15:00"}}"#);
            let task: Task = serde_json::from_str(&json).unwrap();
            assert_eq!(task.title, "x");
            assert_eq!(task.due_date, None);
        }
    }

    #[test]
    fn task_serializes_dates_as_iso_strings() {
        let task = Task {
            id: 1,
            title: "Essay draft".to_string(),
            description: None,
            due_date: NaiveDate::from_ymd_opt(2024, 6, 1),
            priority: Priority::Low,
            completed: false,
            created_at: NaiveDate::from_ymd_opt(2024, 5, 31)
                .unwrap()
                .and_hms_opt(8, 0, 0)
                .unwrap(),
            completed_at: None,
        };
        let value = serde_json::to_value(&task).unwrap();
        assert_eq!(value["due_date"], "2024-06-01");
        assert_eq!(value["priority"], "low");
        assert_eq!(value["created_at"], "2024-05-31T08:00:00");
        assert!(value.get("completed_at").is_none());
    }
}
