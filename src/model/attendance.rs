use std::collections::HashSet;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use utoipa::ToSchema;

#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Default, Serialize, Deserialize, Display, EnumString, ToSchema,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum AttendanceStatus {
    #[default]
    Present,
    Absent,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRecord {
    pub student_id: u64,
    pub status: AttendanceStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remarks: Option<String>,
}

impl AttendanceRecord {
    pub fn present(student_id: u64) -> Self {
        Self {
            student_id,
            status: AttendanceStatus::Present,
            remarks: None,
        }
    }
}

/// One batch's attendance for one calendar day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
#[schema(example = json!({
    "id": 3,
    "batchId": 1,
    "date": "2024-01-10",
    "records": [
        {"studentId": 11, "status": "present"},
        {"studentId": 12, "status": "absent", "remarks": "sick"}
    ]
}))]
pub struct AttendanceSession {
    pub id: u64,
    pub batch_id: u64,
    #[schema(value_type = String)]
    pub date: NaiveDate,
    pub records: Vec<AttendanceRecord>,
}

impl AttendanceSession {
    pub fn record_for(&self, student_id: u64) -> Option<&AttendanceRecord> {
        self.records.iter().find(|r| r.student_id == student_id)
    }
}

/// A student's own view of one session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StudentAttendance {
    pub session_id: u64,
    #[schema(value_type = String)]
    pub date: NaiveDate,
    pub status: AttendanceStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remarks: Option<String>,
}

/// Records must name enrolled students, each at most once.
pub fn check_records(records: &[AttendanceRecord], enrolled: &HashSet<u64>) -> Result<(), String> {
    let mut seen = HashSet::with_capacity(records.len());
    for record in records {
        if !enrolled.contains(&record.student_id) {
            return Err(format!(
                "Student {} is not enrolled in this batch",
                record.student_id
            ));
        }
        if !seen.insert(record.student_id) {
            return Err(format!(
                "Duplicate attendance record for student {}",
                record.student_id
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(student_id: u64, status: AttendanceStatus) -> AttendanceRecord {
        AttendanceRecord {
            student_id,
            status,
            remarks: None,
        }
    }

    #[test]
    fn accepts_subset_of_roster() {
        let enrolled: HashSet<u64> = [1, 2, 3].into_iter().collect();
        let records = vec![record(1, AttendanceStatus::Present), record(3, AttendanceStatus::Absent)];
        assert!(check_records(&records, &enrolled).is_ok());
    }

    #[test]
    fn rejects_unknown_and_duplicate_students() {
        let enrolled: HashSet<u64> = [1, 2].into_iter().collect();

        let stranger = vec![record(9, AttendanceStatus::Present)];
        assert!(check_records(&stranger, &enrolled).unwrap_err().contains("not enrolled"));

        let twice = vec![record(1, AttendanceStatus::Present), record(1, AttendanceStatus::Absent)];
        assert!(check_records(&twice, &enrolled).unwrap_err().contains("Duplicate"));
    }

    #[test]
    fn wire_format_is_camel_case() {
        let json = serde_json::json!({
            "id": 1,
            "batchId": 4,
            "date": "2024-01-10",
            "records": [{"studentId": 2, "status": "absent", "remarks": "late bus"}]
        });
        let session: AttendanceSession = serde_json::from_value(json).unwrap();
        assert_eq!(session.batch_id, 4);
        assert_eq!(session.date, NaiveDate::from_ymd_opt(2024, 1, 10).unwrap());
        assert_eq!(session.records[0].status, AttendanceStatus::Absent);
        assert_eq!(session.records[0].remarks.as_deref(), Some("late bus"));
    }
}
