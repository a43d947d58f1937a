use std::sync::Arc;

use assert_matches::assert_matches;
use async_trait::async_trait;
use chrono::NaiveDate;
use parking_lot::Mutex;

use classroom::client::{AttendanceApi, ClientError};
use classroom::editor::{AttendanceEditor, Banner, EditorError, Mode};
use classroom::model::attendance::{AttendanceRecord, AttendanceSession, AttendanceStatus};
use classroom::model::user::StudentSummary;

const BATCH: u64 = 1;
const S1: u64 = 11;
const S2: u64 = 12;
const S3: u64 = 13;

#[derive(Default)]
struct Backend {
    roster: Vec<StudentSummary>,
    sessions: Vec<AttendanceSession>,
    next_id: u64,
    requests: usize,
    fail_next: Option<String>,
}

/// In-process stand-in for the service, shared with the test body.
#[derive(Clone, Default)]
struct FakeApi(Arc<Mutex<Backend>>);

impl FakeApi {
    fn with_roster(ids: &[u64]) -> Self {
        let fake = FakeApi::default();
        fake.0.lock().roster = ids
            .iter()
            .map(|&id| StudentSummary {
                id,
                name: format!("Student {id}"),
                email: format!("s{id}@example.com"),
            })
            .collect();
        fake
    }

    fn requests(&self) -> usize {
        self.0.lock().requests
    }

    fn sessions(&self) -> Vec<AttendanceSession> {
        self.0.lock().sessions.clone()
    }

    fn fail_next(&self, message: &str) {
        self.0.lock().fail_next = Some(message.to_string());
    }

    fn begin(&self) -> Result<parking_lot::MutexGuard<'_, Backend>, ClientError> {
        let mut backend = self.0.lock();
        backend.requests += 1;
        match backend.fail_next.take() {
            Some(message) => Err(ClientError::Server {
                status: 500,
                message,
            }),
            None => Ok(backend),
        }
    }
}

#[async_trait]
impl AttendanceApi for FakeApi {
    async fn roster(&self, _batch_id: u64) -> Result<Vec<StudentSummary>, ClientError> {
        Ok(self.begin()?.roster.clone())
    }

    async fn list_sessions(&self, _batch_id: u64) -> Result<Vec<AttendanceSession>, ClientError> {
        Ok(self.begin()?.sessions.clone())
    }

    async fn create_session(
        &self,
        batch_id: u64,
        date: NaiveDate,
        records: &[AttendanceRecord],
    ) -> Result<AttendanceSession, ClientError> {
        let mut backend = self.begin()?;
        if backend.sessions.iter().any(|s| s.date == date) {
            return Err(ClientError::Server {
                status: 409,
                message: format!("Attendance for {date} is already marked"),
            });
        }
        backend.next_id += 1;
        let session = AttendanceSession {
            id: backend.next_id,
            batch_id,
            date,
            records: records.to_vec(),
        };
        backend.sessions.push(session.clone());
        Ok(session)
    }

    async fn update_session(
        &self,
        _batch_id: u64,
        session_id: u64,
        records: &[AttendanceRecord],
    ) -> Result<AttendanceSession, ClientError> {
        let mut backend = self.begin()?;
        let session = backend
            .sessions
            .iter_mut()
            .find(|s| s.id == session_id)
            .ok_or_else(|| ClientError::Server {
                status: 404,
                message: "Attendance session not found".into(),
            })?;
        session.records = records.to_vec();
        Ok(session.clone())
    }

    async fn delete_session(&self, _batch_id: u64, session_id: u64) -> Result<(), ClientError> {
        let mut backend = self.begin()?;
        backend.sessions.retain(|s| s.id != session_id);
        Ok(())
    }
}

fn jan(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
}

fn status_of(editor: &AttendanceEditor<FakeApi>, student_id: u64) -> AttendanceStatus {
    editor
        .records()
        .iter()
        .find(|r| r.student_id == student_id)
        .map(|r| r.status)
        .unwrap()
}

async fn loaded(api: &FakeApi) -> AttendanceEditor<FakeApi> {
    let mut editor = AttendanceEditor::new(api.clone(), BATCH);
    editor.load().await.unwrap();
    editor
}

#[tokio::test]
async fn mark_then_correct_a_day() {
    let api = FakeApi::with_roster(&[S1, S2]);
    let mut editor = loaded(&api).await;

    editor.select_date(jan(10));
    assert_eq!(editor.mode(), Mode::Creating);
    assert!(editor.records().iter().all(|r| r.status == AttendanceStatus::Present));

    editor.set_status(S2, AttendanceStatus::Absent).unwrap();
    editor.submit().await.unwrap();
    assert_eq!(editor.mode(), Mode::Viewing);
    assert_eq!(
        editor.status_line().as_deref(),
        Some("Attendance already marked for 2024-01-10")
    );
    assert_eq!(
        editor.banner(),
        Some(&Banner::Success("Attendance saved for 2024-01-10".into()))
    );
    assert_eq!(status_of(&editor, S2), AttendanceStatus::Absent);

    editor.begin_edit().unwrap();
    editor.set_status(S2, AttendanceStatus::Present).unwrap();
    editor.submit().await.unwrap();

    let stored = api.sessions();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].date, jan(10));
    assert!(stored[0].records.iter().all(|r| r.status == AttendanceStatus::Present));
    assert_eq!(editor.sessions().len(), 1);
    assert_eq!(editor.mode(), Mode::Viewing);
    assert!(!editor.pending());
}

#[tokio::test]
async fn empty_date_is_rejected_without_a_request() {
    let api = FakeApi::with_roster(&[S1]);
    let mut editor = loaded(&api).await;
    let before = api.requests();

    assert_matches!(editor.select_date_input("   "), Err(EditorError::Validation(_)));
    assert_matches!(editor.banner(), Some(Banner::Error(msg)) if msg == "Please select a date");
    assert_matches!(editor.submit().await, Err(EditorError::Validation(_)));
    assert_matches!(editor.select_date_input("10/01/2024"), Err(EditorError::Validation(_)));

    assert_eq!(api.requests(), before);
    assert!(api.sessions().is_empty());

    assert_eq!(editor.select_date_input("2024-01-10").unwrap(), jan(10));
}

#[tokio::test]
async fn cancel_discards_edits() {
    let api = FakeApi::with_roster(&[S1, S2]);
    let mut editor = loaded(&api).await;
    editor.select_date(jan(10));
    editor.submit().await.unwrap();
    let persisted = api.sessions();
    let requests = api.requests();

    editor.begin_edit().unwrap();
    assert_eq!(editor.mode(), Mode::Editing);
    editor.set_status(S1, AttendanceStatus::Absent).unwrap();
    editor.set_remark(S1, "left early").unwrap();
    editor.cancel_edit();

    assert_eq!(editor.mode(), Mode::Viewing);
    assert_eq!(status_of(&editor, S1), AttendanceStatus::Present);
    assert_eq!(api.sessions(), persisted);
    assert_eq!(api.requests(), requests);
}

#[tokio::test]
async fn viewing_is_read_only() {
    let api = FakeApi::with_roster(&[S1]);
    let mut editor = loaded(&api).await;
    editor.select_date(jan(10));
    editor.submit().await.unwrap();

    assert!(!editor.inputs_enabled());
    assert_matches!(
        editor.set_status(S1, AttendanceStatus::Absent),
        Err(EditorError::NotEditable(Mode::Viewing))
    );
    assert_matches!(editor.submit().await, Err(EditorError::NotEditable(_)));
    assert_matches!(editor.set_remark(S1, "x"), Err(EditorError::NotEditable(_)));
}

#[tokio::test]
async fn late_enrolments_are_backfilled_as_present() {
    let api = FakeApi::with_roster(&[S1, S2]);
    let mut editor = loaded(&api).await;
    editor.select_date(jan(10));
    editor.set_status(S1, AttendanceStatus::Absent).unwrap();
    editor.submit().await.unwrap();

    // S3 joins after the session was taken
    api.0.lock().roster.push(StudentSummary {
        id: S3,
        name: "Student 13".into(),
        email: "s13@example.com".into(),
    });
    let mut editor = loaded(&api).await;
    editor.select_date(jan(10));
    assert_eq!(editor.mode(), Mode::Viewing);
    assert_eq!(editor.records().len(), 2);

    editor.begin_edit().unwrap();
    assert_eq!(editor.records().len(), 3);
    assert_eq!(status_of(&editor, S1), AttendanceStatus::Absent);
    assert_eq!(status_of(&editor, S3), AttendanceStatus::Present);

    editor.submit().await.unwrap();
    assert_eq!(api.sessions()[0].records.len(), 3);
}

#[tokio::test]
async fn delete_needs_confirmation_and_returns_to_creating() {
    let api = FakeApi::with_roster(&[S1]);
    let mut editor = loaded(&api).await;
    editor.select_date(jan(12));
    editor.submit().await.unwrap();
    let session_id = editor.current_session().unwrap().id;
    let requests = api.requests();

    assert_matches!(editor.delete(session_id, |_| false).await, Err(EditorError::Cancelled));
    assert_eq!(api.requests(), requests);
    assert_eq!(api.sessions().len(), 1);

    editor.delete(session_id, |s| s.date == jan(12)).await.unwrap();
    assert!(api.sessions().is_empty());
    assert!(editor.sessions().is_empty());
    assert_eq!(editor.mode(), Mode::Creating);
    assert_eq!(editor.date(), Some(jan(12)));
    assert!(editor.records().iter().all(|r| r.status == AttendanceStatus::Present));
}

#[tokio::test]
async fn failures_leave_state_alone() {
    let api = FakeApi::with_roster(&[S1, S2]);
    let mut editor = loaded(&api).await;
    editor.select_date(jan(10));
    editor.set_status(S2, AttendanceStatus::Absent).unwrap();

    api.fail_next("database unavailable");
    assert_matches!(editor.submit().await, Err(EditorError::Api(ClientError::Server { status: 500, .. })));
    assert_eq!(
        editor.banner(),
        Some(&Banner::Error("database unavailable".into()))
    );
    assert_eq!(editor.mode(), Mode::Creating);
    assert_eq!(status_of(&editor, S2), AttendanceStatus::Absent);
    assert!(editor.sessions().is_empty());
    assert!(!editor.pending());

    api.fail_next("timeout");
    assert!(editor.load_sessions().await.is_err());
    assert_eq!(editor.mode(), Mode::Creating);
    assert_eq!(status_of(&editor, S2), AttendanceStatus::Absent);

    // nothing was lost; the retry goes through
    editor.submit().await.unwrap();
    assert_eq!(api.sessions().len(), 1);
}

#[tokio::test]
async fn partial_record_sets_are_refused() {
    let api = FakeApi::with_roster(&[S1, S2]);
    let mut editor = loaded(&api).await;
    let requests = api.requests();

    let result = editor
        .submit_records(jan(10), vec![AttendanceRecord::present(S1)])
        .await;
    assert_matches!(result, Err(EditorError::Validation(msg)) if msg == "Every student needs a status");
    assert_eq!(api.requests(), requests);
}

#[tokio::test]
async fn clearing_the_date_blocks_submit() {
    let api = FakeApi::with_roster(&[S1, S2]);
    let mut editor = loaded(&api).await;
    editor.select_date(jan(10));
    let requests = api.requests();

    assert_matches!(editor.select_date_input(""), Err(EditorError::Validation(_)));
    assert_eq!(editor.date(), None);
    assert_matches!(editor.submit().await, Err(EditorError::Validation(msg)) if msg == "Please select a date");

    assert_matches!(editor.select_date_input("2024-13-40"), Err(EditorError::Validation(_)));
    assert_eq!(editor.date(), None);
    assert_matches!(editor.submit().await, Err(EditorError::Validation(_)));

    assert_eq!(api.requests(), requests);
    assert!(api.sessions().is_empty());
}

#[tokio::test]
async fn open_edit_survives_other_sessions_changing() {
    let api = FakeApi::with_roster(&[S1, S2]);
    let mut editor = loaded(&api).await;
    editor.select_date(jan(9));
    editor.submit().await.unwrap();
    let earlier = editor.current_session().unwrap().id;
    editor.select_date(jan(10));
    editor.submit().await.unwrap();

    editor.begin_edit().unwrap();
    editor.set_status(S2, AttendanceStatus::Absent).unwrap();

    editor.delete(earlier, |_| true).await.unwrap();
    assert_eq!(editor.mode(), Mode::Editing);
    assert_eq!(status_of(&editor, S2), AttendanceStatus::Absent);

    editor.load_sessions().await.unwrap();
    assert_eq!(editor.mode(), Mode::Editing);
    assert_eq!(status_of(&editor, S2), AttendanceStatus::Absent);

    // deleting the day being edited does end the edit
    let current = editor.current_session().unwrap().id;
    editor.delete(current, |_| true).await.unwrap();
    assert_eq!(editor.mode(), Mode::Creating);
    assert_eq!(status_of(&editor, S2), AttendanceStatus::Present);
}

#[tokio::test]
async fn restating_a_day_clears_earlier_absences() {
    let api = FakeApi::with_roster(&[S1, S2]);
    let mut editor = loaded(&api).await;
    editor.select_date(jan(10));
    editor.set_status(S1, AttendanceStatus::Absent).unwrap();
    editor.set_remark(S1, "sick").unwrap();
    editor.submit().await.unwrap();

    assert_matches!(editor.reset_to_present(), Err(EditorError::NotEditable(Mode::Viewing)));

    editor.begin_edit().unwrap();
    editor.reset_to_present().unwrap();
    editor.set_status(S2, AttendanceStatus::Absent).unwrap();
    editor.submit().await.unwrap();

    let stored = api.sessions().remove(0);
    assert_eq!(stored.record_for(S1), Some(&AttendanceRecord::present(S1)));
    assert_eq!(stored.record_for(S2).map(|r| r.status), Some(AttendanceStatus::Absent));
}
