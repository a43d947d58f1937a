//! Storage seam for the service.
//!
//! Handlers talk to a `dyn ClassroomStore`; [`mysql::MySqlStore`] is the
//! production backend and [`memory::MemoryStore`] backs development runs
//! without a database and the test suite. Methods returning `Option`/`bool`
//! use `None`/`false` for "no such row"; uniqueness violations surface as
//! [`StoreError::Conflict`].

pub mod memory;
pub mod mysql;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use crate::model::{
    announcement::{Announcement, NewAnnouncement},
    assessment::{NewTest, Test, TestChanges},
    attendance::{AttendanceRecord, AttendanceSession},
    batch::{Batch, BatchChanges, NewBatch},
    fee::{FeeInput, FeeRecord},
    timetable::{TimetableEntry, TimetableInput},
    user::{NewUser, StudentSummary, User},
};

pub use memory::MemoryStore;
pub use mysql::MySqlStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Corrupt row: {0}")]
    Corrupt(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait ClassroomStore: Send + Sync {
    // users
    async fn create_user(&self, user: NewUser) -> StoreResult<User>;
    async fn find_user_by_username(&self, username: &str) -> StoreResult<Option<User>>;
    async fn get_user(&self, id: u64) -> StoreResult<Option<User>>;
    async fn list_students(&self, search: Option<&str>) -> StoreResult<Vec<StudentSummary>>;
    async fn touch_last_login(&self, user_id: u64) -> StoreResult<()>;

    // refresh tokens
    async fn store_refresh_token(
        &self,
        user_id: u64,
        jti: &str,
        expires_at: DateTime<Utc>,
    ) -> StoreResult<()>;
    /// Owner of a refresh token that exists and has not been revoked.
    async fn active_refresh_token(&self, jti: &str) -> StoreResult<Option<u64>>;
    async fn revoke_refresh_token(&self, jti: &str) -> StoreResult<bool>;

    // batches
    async fn create_batch(&self, batch: NewBatch) -> StoreResult<Batch>;
    async fn get_batch(&self, id: u64) -> StoreResult<Option<Batch>>;
    async fn list_batches_for_teacher(&self, teacher_id: u64) -> StoreResult<Vec<Batch>>;
    async fn list_batches_for_student(&self, student_id: u64) -> StoreResult<Vec<Batch>>;
    async fn update_batch(&self, id: u64, changes: BatchChanges) -> StoreResult<Option<Batch>>;
    /// Removes the batch and everything recorded under it.
    async fn delete_batch(&self, id: u64) -> StoreResult<bool>;

    // enrolment
    async fn batch_students(&self, batch_id: u64) -> StoreResult<Vec<StudentSummary>>;
    async fn enroll_student(&self, batch_id: u64, student_id: u64) -> StoreResult<()>;
    async fn remove_student(&self, batch_id: u64, student_id: u64) -> StoreResult<bool>;
    async fn is_enrolled(&self, batch_id: u64, student_id: u64) -> StoreResult<bool>;

    // attendance
    async fn list_attendance(&self, batch_id: u64) -> StoreResult<Vec<AttendanceSession>>;
    async fn create_attendance(
        &self,
        batch_id: u64,
        date: NaiveDate,
        records: Vec<AttendanceRecord>,
    ) -> StoreResult<AttendanceSession>;
    async fn update_attendance(
        &self,
        batch_id: u64,
        session_id: u64,
        records: Vec<AttendanceRecord>,
    ) -> StoreResult<Option<AttendanceSession>>;
    async fn delete_attendance(&self, batch_id: u64, session_id: u64) -> StoreResult<bool>;

    // tests
    async fn list_tests(&self, batch_id: u64) -> StoreResult<Vec<Test>>;
    async fn get_test(&self, batch_id: u64, test_id: u64) -> StoreResult<Option<Test>>;
    async fn create_test(&self, batch_id: u64, test: NewTest) -> StoreResult<Test>;
    async fn update_test(
        &self,
        batch_id: u64,
        test_id: u64,
        changes: TestChanges,
    ) -> StoreResult<Option<Test>>;
    async fn delete_test(&self, batch_id: u64, test_id: u64) -> StoreResult<bool>;

    // fees
    async fn list_fees(&self, batch_id: u64) -> StoreResult<Vec<FeeRecord>>;
    async fn get_fee(&self, batch_id: u64, fee_id: u64) -> StoreResult<Option<FeeRecord>>;
    async fn fee_for_student(&self, batch_id: u64, student_id: u64)
    -> StoreResult<Option<FeeRecord>>;
    /// Inserts or replaces the student's record for the batch.
    async fn upsert_fee(&self, batch_id: u64, fee: FeeInput) -> StoreResult<FeeRecord>;
    async fn update_fee(
        &self,
        batch_id: u64,
        fee_id: u64,
        fee: FeeInput,
    ) -> StoreResult<Option<FeeRecord>>;
    async fn delete_fee(&self, batch_id: u64, fee_id: u64) -> StoreResult<bool>;

    // timetable
    async fn list_timetable(&self, batch_id: u64) -> StoreResult<Vec<TimetableEntry>>;
    /// Inserts or replaces the entry for (day, period).
    async fn upsert_timetable_entry(
        &self,
        batch_id: u64,
        entry: TimetableInput,
    ) -> StoreResult<TimetableEntry>;
    async fn delete_timetable_entry(&self, batch_id: u64, entry_id: u64) -> StoreResult<bool>;

    // announcements
    /// Newest first.
    async fn list_announcements(&self, batch_id: u64) -> StoreResult<Vec<Announcement>>;
    async fn create_announcement(
        &self,
        batch_id: u64,
        announcement: NewAnnouncement,
    ) -> StoreResult<Announcement>;
    async fn delete_announcement(&self, batch_id: u64, announcement_id: u64) -> StoreResult<bool>;
}
