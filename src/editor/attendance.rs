//! Attendance editor for one batch.
//!
//! Per selected date the editor is in one of three modes:
//!
//! * [`Mode::Viewing`]: a session exists for the date; inputs are read-only.
//! * [`Mode::Creating`]: no session yet; every enrolled student starts present.
//! * [`Mode::Editing`]: an existing session opened for changes, with students
//!   enrolled since it was taken added as present.
//!
//! Failed requests leave every piece of local state as it was and only set
//! the banner.

use std::collections::HashSet;

use chrono::NaiveDate;
use strum_macros::Display;
use tracing::{debug, warn};

use crate::client::{AttendanceApi, ClientError};
use crate::editor::{EditorError, EditorResult};
use crate::model::attendance::{AttendanceRecord, AttendanceSession, AttendanceStatus};
use crate::model::user::StudentSummary;

#[derive(Debug, Copy, Clone, Eq, PartialEq, Display)]
pub enum Mode {
    #[strum(serialize = "viewing")]
    Viewing,
    #[strum(serialize = "creating")]
    Creating,
    #[strum(serialize = "editing")]
    Editing,
}

/// Inline message shown above the form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Banner {
    Success(String),
    Error(String),
}

pub struct AttendanceEditor<A: AttendanceApi> {
    api: A,
    batch_id: u64,
    roster: Vec<StudentSummary>,
    sessions: Vec<AttendanceSession>,
    date: Option<NaiveDate>,
    mode: Mode,
    /// Records shown in the form, one per row.
    draft: Vec<AttendanceRecord>,
    banner: Option<Banner>,
    pending: bool,
}

impl<A: AttendanceApi> AttendanceEditor<A> {
    pub fn new(api: A, batch_id: u64) -> Self {
        Self {
            api,
            batch_id,
            roster: Vec::new(),
            sessions: Vec::new(),
            date: None,
            mode: Mode::Creating,
            draft: Vec::new(),
            banner: None,
            pending: false,
        }
    }

    pub fn batch_id(&self) -> u64 {
        self.batch_id
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn date(&self) -> Option<NaiveDate> {
        self.date
    }

    pub fn roster(&self) -> &[StudentSummary] {
        &self.roster
    }

    pub fn sessions(&self) -> &[AttendanceSession] {
        &self.sessions
    }

    pub fn records(&self) -> &[AttendanceRecord] {
        &self.draft
    }

    pub fn banner(&self) -> Option<&Banner> {
        self.banner.as_ref()
    }

    pub fn pending(&self) -> bool {
        self.pending
    }

    pub fn inputs_enabled(&self) -> bool {
        matches!(self.mode, Mode::Creating | Mode::Editing)
    }

    pub fn current_session(&self) -> Option<&AttendanceSession> {
        self.date.and_then(|date| self.session_on(date))
    }

    /// "Attendance already marked for <date>" while viewing a saved session.
    pub fn status_line(&self) -> Option<String> {
        match (self.mode, self.date) {
            (Mode::Viewing, Some(date)) => Some(format!("Attendance already marked for {date}")),
            _ => None,
        }
    }

    fn session_on(&self, date: NaiveDate) -> Option<&AttendanceSession> {
        self.sessions.iter().find(|s| s.date == date)
    }

    /// Roster and sessions together.
    pub async fn load(&mut self) -> EditorResult<()> {
        self.pending = true;
        let roster = self.api.roster(self.batch_id).await;
        let roster = match roster {
            Ok(roster) => roster,
            Err(e) => return Err(self.fail(e)),
        };
        let sessions = self.api.list_sessions(self.batch_id).await;
        self.pending = false;

        let sessions = sessions.map_err(|e| self.fail(e))?;
        self.roster = roster;
        self.sessions = sessions;
        self.settle();
        Ok(())
    }

    pub async fn load_sessions(&mut self) -> EditorResult<()> {
        self.pending = true;
        let sessions = self.api.list_sessions(self.batch_id).await;
        self.pending = false;

        self.sessions = sessions.map_err(|e| self.fail(e))?;
        self.settle();
        Ok(())
    }

    pub fn select_date(&mut self, date: NaiveDate) {
        self.date = Some(date);
        self.banner = None;
        self.reevaluate();
    }

    /// Raw `YYYY-MM-DD` input from the date field.
    pub fn select_date_input(&mut self, raw: &str) -> EditorResult<NaiveDate> {
        let raw = raw.trim();
        let parsed = if raw.is_empty() {
            Err("Please select a date".to_string())
        } else {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| format!("Invalid date: {raw}"))
        };
        match parsed {
            Ok(date) => {
                self.select_date(date);
                Ok(date)
            }
            // a cleared field means no date, not the previous one
            Err(message) => {
                self.date = None;
                self.reevaluate();
                Err(self.invalid(&message))
            }
        }
    }

    /// Viewing to Editing.
    pub fn begin_edit(&mut self) -> EditorResult<()> {
        if self.mode != Mode::Viewing {
            return Err(EditorError::NotEditable(self.mode));
        }
        let merged = match self.current_session() {
            Some(session) => merge_with_roster(&self.roster, &session.records),
            None => return Err(EditorError::NotEditable(self.mode)),
        };
        self.draft = merged;
        self.mode = Mode::Editing;
        Ok(())
    }

    /// Drops unsaved changes and returns to what the date implies.
    pub fn cancel_edit(&mut self) {
        if self.mode == Mode::Editing {
            self.banner = None;
            self.reevaluate();
        }
    }

    pub fn set_status(&mut self, student_id: u64, status: AttendanceStatus) -> EditorResult<()> {
        self.row_mut(student_id)?.status = status;
        Ok(())
    }

    pub fn set_remark(&mut self, student_id: u64, text: &str) -> EditorResult<()> {
        let text = text.trim();
        self.row_mut(student_id)?.remarks = (!text.is_empty()).then(|| text.to_string());
        Ok(())
    }

    /// Every row back to present with no remark.
    pub fn reset_to_present(&mut self) -> EditorResult<()> {
        if !self.inputs_enabled() {
            return Err(EditorError::NotEditable(self.mode));
        }
        self.draft = all_present(&self.roster);
        Ok(())
    }

    fn row_mut(&mut self, student_id: u64) -> EditorResult<&mut AttendanceRecord> {
        if !self.inputs_enabled() {
            return Err(EditorError::NotEditable(self.mode));
        }
        self.draft
            .iter_mut()
            .find(|r| r.student_id == student_id)
            .ok_or_else(|| EditorError::Validation(format!("Student {student_id} is not in this batch")))
    }

    /// Saves the form for the selected date.
    pub async fn submit(&mut self) -> EditorResult<()> {
        let Some(date) = self.date else {
            return Err(self.invalid("Please select a date"));
        };
        if !self.inputs_enabled() {
            return Err(EditorError::NotEditable(self.mode));
        }
        let records = self.draft.clone();
        self.submit_records(date, records).await
    }

    /// Updates the session for `date` if one exists, otherwise creates it.
    /// Needs exactly one record per enrolled student.
    pub async fn submit_records(
        &mut self,
        date: NaiveDate,
        records: Vec<AttendanceRecord>,
    ) -> EditorResult<()> {
        if let Err(message) = covers_roster(&self.roster, &records) {
            return Err(self.invalid(&message));
        }

        let existing = self.session_on(date).map(|s| s.id);
        self.pending = true;
        let result = match existing {
            Some(session_id) => {
                self.api
                    .update_session(self.batch_id, session_id, &records)
                    .await
            }
            None => self.api.create_session(self.batch_id, date, &records).await,
        };
        self.pending = false;
        let saved = result.map_err(|e| self.fail(e))?;

        debug!(batch_id = self.batch_id, session_id = saved.id, %date, "Attendance saved");
        self.store_session(saved);
        self.date = Some(date);

        // the saved copy is already local; a failed refetch only means stale neighbours
        self.pending = true;
        let refreshed = self.api.list_sessions(self.batch_id).await;
        self.pending = false;
        match refreshed {
            Ok(sessions) => self.sessions = sessions,
            Err(e) => warn!(error = %e, "Refetch after save failed"),
        }

        self.reevaluate();
        self.banner = Some(Banner::Success(match existing {
            Some(_) => format!("Attendance updated for {date}"),
            None => format!("Attendance saved for {date}"),
        }));
        Ok(())
    }

    /// Deletes a session once `confirm` agrees.
    pub async fn delete(
        &mut self,
        session_id: u64,
        confirm: impl FnOnce(&AttendanceSession) -> bool,
    ) -> EditorResult<()> {
        let confirmed = match self.sessions.iter().find(|s| s.id == session_id) {
            Some(session) => confirm(session),
            None => return Err(self.invalid("Attendance session not found")),
        };
        if !confirmed {
            return Err(EditorError::Cancelled);
        }

        self.pending = true;
        let result = self.api.delete_session(self.batch_id, session_id).await;
        self.pending = false;
        result.map_err(|e| self.fail(e))?;

        self.sessions.retain(|s| s.id != session_id);
        self.settle();
        self.banner = Some(Banner::Success("Attendance deleted".into()));
        Ok(())
    }

    fn store_session(&mut self, saved: AttendanceSession) {
        match self.sessions.iter_mut().find(|s| s.id == saved.id) {
            Some(slot) => *slot = saved,
            None => self.sessions.push(saved),
        }
    }

    /// Like [`Self::reevaluate`], but an open edit survives while its
    /// session is still loaded.
    fn settle(&mut self) {
        if self.mode == Mode::Editing && self.current_session().is_some() {
            return;
        }
        self.reevaluate();
    }

    /// Mode and form rows from the selected date and the loaded sessions.
    fn reevaluate(&mut self) {
        let Some(date) = self.date else {
            self.mode = Mode::Creating;
            self.draft = all_present(&self.roster);
            return;
        };
        match self.session_on(date).map(|s| s.records.clone()) {
            Some(records) => {
                self.mode = Mode::Viewing;
                self.draft = records;
            }
            None => {
                self.mode = Mode::Creating;
                self.draft = all_present(&self.roster);
            }
        }
    }

    fn invalid(&mut self, message: &str) -> EditorError {
        self.banner = Some(Banner::Error(message.to_string()));
        EditorError::Validation(message.to_string())
    }

    fn fail(&mut self, e: ClientError) -> EditorError {
        self.pending = false;
        self.banner = Some(Banner::Error(e.to_string()));
        EditorError::Api(e)
    }
}

fn all_present(roster: &[StudentSummary]) -> Vec<AttendanceRecord> {
    roster.iter().map(|s| AttendanceRecord::present(s.id)).collect()
}

/// Saved records in roster order, with anyone missing added as present.
fn merge_with_roster(
    roster: &[StudentSummary],
    saved: &[AttendanceRecord],
) -> Vec<AttendanceRecord> {
    roster
        .iter()
        .map(|student| {
            saved
                .iter()
                .find(|r| r.student_id == student.id)
                .cloned()
                .unwrap_or_else(|| AttendanceRecord::present(student.id))
        })
        .collect()
}

fn covers_roster(roster: &[StudentSummary], records: &[AttendanceRecord]) -> Result<(), String> {
    let enrolled: HashSet<u64> = roster.iter().map(|s| s.id).collect();
    let mut seen = HashSet::with_capacity(records.len());
    for record in records {
        if !enrolled.contains(&record.student_id) {
            return Err(format!("Student {} is not in this batch", record.student_id));
        }
        if !seen.insert(record.student_id) {
            return Err(format!("Student {} is listed twice", record.student_id));
        }
    }
    if seen.len() != enrolled.len() {
        return Err("Every student needs a status".to_string());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn student(id: u64) -> StudentSummary {
        StudentSummary {
            id,
            name: format!("S{id}"),
            email: format!("s{id}@example.com"),
        }
    }

    #[test]
    fn merge_backfills_new_students_as_present() {
        let roster = vec![student(1), student(2), student(3)];
        let saved = vec![AttendanceRecord {
            student_id: 2,
            status: AttendanceStatus::Absent,
            remarks: Some("sick".into()),
        }];
        let merged = merge_with_roster(&roster, &saved);
        assert_eq!(merged.len(), 3);
        assert_eq!(merged[0], AttendanceRecord::present(1));
        assert_eq!(merged[1].status, AttendanceStatus::Absent);
        assert_eq!(merged[2], AttendanceRecord::present(3));
    }

    #[test]
    fn submission_must_cover_everyone_once() {
        let roster = vec![student(1), student(2)];
        assert!(covers_roster(&roster, &all_present(&roster)).is_ok());
        assert!(covers_roster(&roster, &[AttendanceRecord::present(1)]).is_err());
        assert!(
            covers_roster(
                &roster,
                &[AttendanceRecord::present(1), AttendanceRecord::present(1)]
            )
            .is_err()
        );
        assert!(
            covers_roster(
                &roster,
                &[AttendanceRecord::present(1), AttendanceRecord::present(9)]
            )
            .is_err()
        );
    }
}
