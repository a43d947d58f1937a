//! One typed accessor per service resource.

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Serialize;
use serde_json::{Value, json};

use crate::api::{
    announcement::CreateAnnouncement,
    assessment::{CreateTest, UpdateTest},
    batch::{CreateBatch, UpdateBatch},
    fee::{SaveFee, UpdateFee},
    timetable::SaveTimetableEntry,
};
use crate::client::http::take_field;
use crate::client::{ApiClient, ClientError, ClientResult, Session};
use crate::model::{
    announcement::Announcement,
    assessment::{StudentTestResult, Test},
    attendance::{AttendanceRecord, AttendanceSession, StudentAttendance},
    batch::{Batch, BatchDetail},
    fee::FeeRecord,
    timetable::TimetableEntry,
    user::StudentSummary,
};

/// What the attendance editor needs from the service.
#[async_trait]
pub trait AttendanceApi: Send + Sync {
    async fn roster(&self, batch_id: u64) -> ClientResult<Vec<StudentSummary>>;
    async fn list_sessions(&self, batch_id: u64) -> ClientResult<Vec<AttendanceSession>>;
    async fn create_session(
        &self,
        batch_id: u64,
        date: NaiveDate,
        records: &[AttendanceRecord],
    ) -> ClientResult<AttendanceSession>;
    async fn update_session(
        &self,
        batch_id: u64,
        session_id: u64,
        records: &[AttendanceRecord],
    ) -> ClientResult<AttendanceSession>;
    async fn delete_session(&self, batch_id: u64, session_id: u64) -> ClientResult<()>;
}

impl ApiClient {
    async fn get_field<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        field: &str,
    ) -> ClientResult<T> {
        let body: Value = self.get(path).await?;
        take_field(body, field)
    }

    async fn post_field<B: Serialize, T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        payload: &B,
        field: &str,
    ) -> ClientResult<T> {
        let body: Value = self.post(path, payload).await?;
        take_field(body, field)
    }

    async fn put_field<B: Serialize, T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        payload: &B,
        field: &str,
    ) -> ClientResult<T> {
        let body: Value = self.put(path, payload).await?;
        take_field(body, field)
    }

    // ---- teacher: batches and enrolment ----

    pub async fn search_students(&self, search: Option<&str>) -> ClientResult<Vec<StudentSummary>> {
        let query: Vec<(&str, &str)> = search.map(|term| ("search", term)).into_iter().collect();
        let body: Value = self.get_query("/admin/students", &query).await?;
        take_field(body, "students")
    }

    pub async fn list_batches(&self) -> ClientResult<Vec<Batch>> {
        self.get_field("/admin/batches", "batches").await
    }

    pub async fn create_batch(&self, batch: &CreateBatch) -> ClientResult<Batch> {
        self.post_field("/admin/batches", batch, "batch").await
    }

    pub async fn batch(&self, batch_id: u64) -> ClientResult<BatchDetail> {
        self.get_field(&format!("/admin/batches/{batch_id}"), "batch")
            .await
    }

    pub async fn update_batch(&self, batch_id: u64, changes: &UpdateBatch) -> ClientResult<Batch> {
        self.put_field(&format!("/admin/batches/{batch_id}"), changes, "batch")
            .await
    }

    pub async fn delete_batch(&self, batch_id: u64) -> ClientResult<()> {
        self.delete(&format!("/admin/batches/{batch_id}")).await
    }

    pub async fn enroll_student(
        &self,
        batch_id: u64,
        student_id: u64,
    ) -> ClientResult<Vec<StudentSummary>> {
        self.post_field(
            &format!("/admin/batches/{batch_id}/students"),
            &json!({ "studentId": student_id }),
            "students",
        )
        .await
    }

    pub async fn remove_student(&self, batch_id: u64, student_id: u64) -> ClientResult<()> {
        self.delete(&format!("/admin/batches/{batch_id}/students/{student_id}"))
            .await
    }

    // ---- teacher: attendance ----

    pub async fn list_attendance(&self, batch_id: u64) -> ClientResult<Vec<AttendanceSession>> {
        self.get_field(&format!("/admin/batches/{batch_id}/attendance"), "attendance")
            .await
    }

    pub async fn create_attendance(
        &self,
        batch_id: u64,
        date: NaiveDate,
        records: &[AttendanceRecord],
    ) -> ClientResult<AttendanceSession> {
        self.post_field(
            &format!("/admin/batches/{batch_id}/attendance"),
            &json!({ "date": date, "records": records }),
            "attendance",
        )
        .await
    }

    pub async fn update_attendance(
        &self,
        batch_id: u64,
        session_id: u64,
        records: &[AttendanceRecord],
    ) -> ClientResult<AttendanceSession> {
        self.put_field(
            &format!("/admin/batches/{batch_id}/attendance/{session_id}"),
            &json!({ "records": records }),
            "attendance",
        )
        .await
    }

    pub async fn delete_attendance(&self, batch_id: u64, session_id: u64) -> ClientResult<()> {
        self.delete(&format!("/admin/batches/{batch_id}/attendance/{session_id}"))
            .await
    }

    // ---- teacher: tests ----

    pub async fn list_tests(&self, batch_id: u64) -> ClientResult<Vec<Test>> {
        self.get_field(&format!("/admin/batches/{batch_id}/tests"), "tests")
            .await
    }

    pub async fn create_test(&self, batch_id: u64, test: &CreateTest) -> ClientResult<Test> {
        self.post_field(&format!("/admin/batches/{batch_id}/tests"), test, "test")
            .await
    }

    pub async fn update_test(
        &self,
        batch_id: u64,
        test_id: u64,
        changes: &UpdateTest,
    ) -> ClientResult<Test> {
        self.put_field(
            &format!("/admin/batches/{batch_id}/tests/{test_id}"),
            changes,
            "test",
        )
        .await
    }

    pub async fn delete_test(&self, batch_id: u64, test_id: u64) -> ClientResult<()> {
        self.delete(&format!("/admin/batches/{batch_id}/tests/{test_id}"))
            .await
    }

    // ---- teacher: fees ----

    pub async fn list_fees(&self, batch_id: u64) -> ClientResult<Vec<FeeRecord>> {
        self.get_field(&format!("/admin/batches/{batch_id}/fees"), "fees")
            .await
    }

    /// Creates or replaces the student's record.
    pub async fn save_fee(&self, batch_id: u64, fee: &SaveFee) -> ClientResult<FeeRecord> {
        self.post_field(&format!("/admin/batches/{batch_id}/fees"), fee, "fee")
            .await
    }

    pub async fn update_fee(
        &self,
        batch_id: u64,
        fee_id: u64,
        changes: &UpdateFee,
    ) -> ClientResult<FeeRecord> {
        self.put_field(
            &format!("/admin/batches/{batch_id}/fees/{fee_id}"),
            changes,
            "fee",
        )
        .await
    }

    pub async fn delete_fee(&self, batch_id: u64, fee_id: u64) -> ClientResult<()> {
        self.delete(&format!("/admin/batches/{batch_id}/fees/{fee_id}"))
            .await
    }

    // ---- teacher: timetable ----

    pub async fn list_timetable(&self, batch_id: u64) -> ClientResult<Vec<TimetableEntry>> {
        self.get_field(&format!("/admin/batches/{batch_id}/timetable"), "timetable")
            .await
    }

    /// Sets the entry for the (day, period) slot, replacing any previous one.
    pub async fn save_timetable_entry(
        &self,
        batch_id: u64,
        entry: &SaveTimetableEntry,
    ) -> ClientResult<TimetableEntry> {
        self.post_field(
            &format!("/admin/batches/{batch_id}/timetable"),
            entry,
            "entry",
        )
        .await
    }

    pub async fn delete_timetable_entry(&self, batch_id: u64, entry_id: u64) -> ClientResult<()> {
        self.delete(&format!("/admin/batches/{batch_id}/timetable/{entry_id}"))
            .await
    }

    // ---- teacher: announcements ----

    pub async fn list_announcements(&self, batch_id: u64) -> ClientResult<Vec<Announcement>> {
        self.get_field(
            &format!("/admin/batches/{batch_id}/announcements"),
            "announcements",
        )
        .await
    }

    pub async fn create_announcement(
        &self,
        batch_id: u64,
        announcement: &CreateAnnouncement,
    ) -> ClientResult<Announcement> {
        self.post_field(
            &format!("/admin/batches/{batch_id}/announcements"),
            announcement,
            "announcement",
        )
        .await
    }

    pub async fn delete_announcement(&self, batch_id: u64, announcement_id: u64) -> ClientResult<()> {
        self.delete(&format!(
            "/admin/batches/{batch_id}/announcements/{announcement_id}"
        ))
        .await
    }

    // ---- student and parent views ----

    /// `/user/student` or `/user/parent`, picked from the signed-in role.
    fn viewer_root(&self) -> ClientResult<&'static str> {
        match self.current_session()? {
            Session::Student(_) => Ok("/user/student"),
            Session::Parent { .. } => Ok("/user/parent"),
            other => Err(ClientError::WrongRole(other.role())),
        }
    }

    pub async fn my_batches(&self) -> ClientResult<Vec<Batch>> {
        let root = self.viewer_root()?;
        self.get_field(&format!("{root}/batches"), "batches").await
    }

    pub async fn my_batch(&self, batch_id: u64) -> ClientResult<Batch> {
        let root = self.viewer_root()?;
        self.get_field(&format!("{root}/batches/{batch_id}"), "batch")
            .await
    }

    pub async fn my_attendance(&self, batch_id: u64) -> ClientResult<Vec<StudentAttendance>> {
        let root = self.viewer_root()?;
        self.get_field(&format!("{root}/batches/{batch_id}/attendance"), "attendance")
            .await
    }

    pub async fn my_tests(&self, batch_id: u64) -> ClientResult<Vec<StudentTestResult>> {
        let root = self.viewer_root()?;
        self.get_field(&format!("{root}/batches/{batch_id}/tests"), "tests")
            .await
    }

    /// `None` when no fee is recorded yet.
    pub async fn my_fee(&self, batch_id: u64) -> ClientResult<Option<FeeRecord>> {
        let root = self.viewer_root()?;
        self.get_field(&format!("{root}/batches/{batch_id}/fees"), "fee")
            .await
    }

    pub async fn my_timetable(&self, batch_id: u64) -> ClientResult<Vec<TimetableEntry>> {
        let root = self.viewer_root()?;
        self.get_field(&format!("{root}/batches/{batch_id}/timetable"), "timetable")
            .await
    }

    pub async fn my_announcements(&self, batch_id: u64) -> ClientResult<Vec<Announcement>> {
        let root = self.viewer_root()?;
        self.get_field(
            &format!("{root}/batches/{batch_id}/announcements"),
            "announcements",
        )
        .await
    }
}

#[async_trait]
impl AttendanceApi for ApiClient {
    async fn roster(&self, batch_id: u64) -> ClientResult<Vec<StudentSummary>> {
        Ok(self.batch(batch_id).await?.students)
    }

    async fn list_sessions(&self, batch_id: u64) -> ClientResult<Vec<AttendanceSession>> {
        self.list_attendance(batch_id).await
    }

    async fn create_session(
        &self,
        batch_id: u64,
        date: NaiveDate,
        records: &[AttendanceRecord],
    ) -> ClientResult<AttendanceSession> {
        self.create_attendance(batch_id, date, records).await
    }

    async fn update_session(
        &self,
        batch_id: u64,
        session_id: u64,
        records: &[AttendanceRecord],
    ) -> ClientResult<AttendanceSession> {
        self.update_attendance(batch_id, session_id, records).await
    }

    async fn delete_session(&self, batch_id: u64, session_id: u64) -> ClientResult<()> {
        self.delete_attendance(batch_id, session_id).await
    }
}
