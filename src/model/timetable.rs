use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use utoipa::ToSchema;

#[derive(
    Debug,
    Copy,
    Clone,
    Eq,
    PartialEq,
    Ord,
    PartialOrd,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    ToSchema,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Weekday {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

/// One period of one weekday. Unique per (batch, day, period).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
#[schema(example = json!({
    "id": 9,
    "batchId": 1,
    "day": "monday",
    "period": 1,
    "subject": "Algebra",
    "teacherName": "Asha Rao",
    "startTime": "09:00:00",
    "endTime": "09:45:00"
}))]
pub struct TimetableEntry {
    pub id: u64,
    pub batch_id: u64,
    pub day: Weekday,
    pub period: u8,
    pub subject: String,
    pub teacher_name: String,
    #[schema(value_type = String)]
    pub start_time: NaiveTime,
    #[schema(value_type = String)]
    pub end_time: NaiveTime,
}

#[derive(Debug, Clone)]
pub struct TimetableInput {
    pub day: Weekday,
    pub period: u8,
    pub subject: String,
    pub teacher_name: String,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
}

/// Orders entries the way a weekly grid reads: by day, then period.
pub fn sort_entries(entries: &mut [TimetableEntry]) {
    entries.sort_by_key(|e| (e.day, e.period));
}
