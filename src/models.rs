use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RecordKind {
    Attendance,
    Leave,
    Notice,
    Task,
    Holiday,
}

impl RecordKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Attendance => "attendance",
            Self::Leave => "leave",
            Self::Notice => "notice",
            Self::Task => "task",
            Self::Holiday => "holiday",
        }
    }

    /// Recomputes fields whose value depends on the wall-clock date.
    /// Schedule-like kinds carry a `timing` label relative to `today`;
    /// the other kinds have no computed fields.
    pub fn apply_derived_fields(
        self,
        date: NaiveDate,
        today: NaiveDate,
        fields: &mut BTreeMap<String, Value>,
    ) {
        if !matches!(self, Self::Leave | Self::Task | Self::Holiday) {
            return;
        }
        let timing = match date.cmp(&today) {
            Ordering::Less => "past",
            Ordering::Equal => "today",
            Ordering::Greater => "upcoming",
        };
        fields.insert("timing".to_string(), Value::from(timing));
    }
}

impl std::fmt::Display for RecordKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    pub id: String,
    pub date: NaiveDate,
    pub fields: BTreeMap<String, Value>,
}

impl Record {
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// String view of a field for search and dropdown purposes. Non-string
    /// scalars are rendered through their JSON form.
    pub fn field_text(&self, name: &str) -> Option<String> {
        match self.fields.get(name)? {
            Value::String(text) => Some(text.clone()),
            Value::Null => None,
            other => Some(other.to_string()),
        }
    }
}

/// Input to `RecordStore::add`; the store assigns the id.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordDraft {
    pub date: NaiveDate,
    #[serde(default)]
    pub fields: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page_number: usize,
    pub page_size: usize,
    pub total_items: usize,
    pub total_pages: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarCell {
    pub date: Option<NaiveDate>,
    pub records: Vec<Record>,
}

impl CalendarCell {
    pub fn padding() -> Self {
        Self {
            date: None,
            records: Vec::new(),
        }
    }

    pub fn is_padding(&self) -> bool {
        self.date.is_none()
    }
}

/// Emitted to subscribers after every successful store mutation.
#[derive(Debug, Clone)]
pub enum StoreEvent {
    Added(Record),
    Updated(Record),
    Removed(String),
}

#[cfg(test)]
mod tests {
    use super::RecordKind;
    use chrono::NaiveDate;
    use std::collections::BTreeMap;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    #[test]
    fn schedule_kinds_derive_timing() {
        let today = day(2025, 9, 15);
        let mut fields = BTreeMap::new();

        RecordKind::Leave.apply_derived_fields(day(2025, 9, 10), today, &mut fields);
        assert_eq!(fields.get("timing").and_then(|v| v.as_str()), Some("past"));

        RecordKind::Task.apply_derived_fields(day(2025, 9, 15), today, &mut fields);
        assert_eq!(fields.get("timing").and_then(|v| v.as_str()), Some("today"));

        RecordKind::Holiday.apply_derived_fields(day(2025, 12, 25), today, &mut fields);
        assert_eq!(fields.get("timing").and_then(|v| v.as_str()), Some("upcoming"));
    }

    #[test]
    fn notice_and_attendance_have_no_derived_fields() {
        let today = day(2025, 9, 15);
        let mut fields = BTreeMap::new();
        RecordKind::Notice.apply_derived_fields(day(2025, 9, 1), today, &mut fields);
        RecordKind::Attendance.apply_derived_fields(day(2025, 9, 1), today, &mut fields);
        assert!(fields.is_empty());
    }
}
