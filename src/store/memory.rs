use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use parking_lot::RwLock;

use crate::model::{
    announcement::{Announcement, NewAnnouncement},
    assessment::{NewTest, Test, TestChanges},
    attendance::{AttendanceRecord, AttendanceSession},
    batch::{Batch, BatchChanges, NewBatch},
    fee::{FeeInput, FeeRecord},
    role::Role,
    timetable::{TimetableEntry, TimetableInput, sort_entries},
    user::{NewUser, StudentSummary, User},
};
use crate::store::{ClassroomStore, StoreError, StoreResult};

struct RefreshToken {
    user_id: u64,
    expires_at: DateTime<Utc>,
    revoked: bool,
}

#[derive(Default)]
struct State {
    next_id: u64,
    users: BTreeMap<u64, User>,
    refresh_tokens: HashMap<String, RefreshToken>,
    batches: BTreeMap<u64, Batch>,
    enrolments: BTreeMap<u64, Vec<u64>>,
    attendance: BTreeMap<u64, AttendanceSession>,
    tests: BTreeMap<u64, Test>,
    fees: BTreeMap<u64, FeeRecord>,
    timetable: BTreeMap<u64, TimetableEntry>,
    announcements: BTreeMap<u64, Announcement>,
}

impl State {
    fn allocate_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn roster(&self, batch_id: u64) -> Vec<StudentSummary> {
        let mut students: Vec<StudentSummary> = self
            .enrolments
            .get(&batch_id)
            .into_iter()
            .flatten()
            .filter_map(|id| self.users.get(id))
            .map(StudentSummary::from)
            .collect();
        students.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        students
    }
}

/// Process-local store. Everything lives behind one lock and is lost on exit.
#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ClassroomStore for MemoryStore {
    async fn create_user(&self, user: NewUser) -> StoreResult<User> {
        let mut state = self.state.write();

        let username = user.username.to_lowercase();
        if state.users.values().any(|u| u.username == username) {
            return Err(StoreError::Conflict("Username already exists".into()));
        }
        if state
            .users
            .values()
            .any(|u| u.email.eq_ignore_ascii_case(&user.email))
        {
            return Err(StoreError::Conflict("Email already registered".into()));
        }

        let id = state.allocate_id();
        let created = User {
            id,
            username,
            name: user.name,
            email: user.email,
            password: user.password,
            role: user.role,
            student_id: user.student_id,
        };
        state.users.insert(id, created.clone());
        Ok(created)
    }

    async fn find_user_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        let username = username.to_lowercase();
        Ok(self
            .state
            .read()
            .users
            .values()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn get_user(&self, id: u64) -> StoreResult<Option<User>> {
        Ok(self.state.read().users.get(&id).cloned())
    }

    async fn list_students(&self, search: Option<&str>) -> StoreResult<Vec<StudentSummary>> {
        let needle = search.map(str::to_lowercase);
        let state = self.state.read();
        let mut students: Vec<StudentSummary> = state
            .users
            .values()
            .filter(|u| u.role == Role::Student)
            .filter(|u| match &needle {
                Some(n) => {
                    u.name.to_lowercase().contains(n)
                        || u.email.to_lowercase().contains(n)
                        || u.username.contains(n)
                }
                None => true,
            })
            .map(StudentSummary::from)
            .collect();
        students.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(students)
    }

    async fn touch_last_login(&self, _user_id: u64) -> StoreResult<()> {
        Ok(())
    }

    async fn store_refresh_token(
        &self,
        user_id: u64,
        jti: &str,
        expires_at: DateTime<Utc>,
    ) -> StoreResult<()> {
        self.state.write().refresh_tokens.insert(
            jti.to_string(),
            RefreshToken {
                user_id,
                expires_at,
                revoked: false,
            },
        );
        Ok(())
    }

    async fn active_refresh_token(&self, jti: &str) -> StoreResult<Option<u64>> {
        let now = Utc::now();
        Ok(self
            .state
            .read()
            .refresh_tokens
            .get(jti)
            .filter(|t| !t.revoked && t.expires_at > now)
            .map(|t| t.user_id))
    }

    async fn revoke_refresh_token(&self, jti: &str) -> StoreResult<bool> {
        let mut state = self.state.write();
        match state.refresh_tokens.get_mut(jti) {
            Some(token) if !token.revoked => {
                token.revoked = true;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn create_batch(&self, batch: NewBatch) -> StoreResult<Batch> {
        let mut state = self.state.write();
        let id = state.allocate_id();
        let created = Batch {
            id,
            teacher_id: batch.teacher_id,
            name: batch.name,
            subject: batch.subject,
            description: batch.description,
            created_at: Utc::now(),
        };
        state.batches.insert(id, created.clone());
        Ok(created)
    }

    async fn get_batch(&self, id: u64) -> StoreResult<Option<Batch>> {
        Ok(self.state.read().batches.get(&id).cloned())
    }

    async fn list_batches_for_teacher(&self, teacher_id: u64) -> StoreResult<Vec<Batch>> {
        Ok(self
            .state
            .read()
            .batches
            .values()
            .filter(|b| b.teacher_id == teacher_id)
            .cloned()
            .collect())
    }

    async fn list_batches_for_student(&self, student_id: u64) -> StoreResult<Vec<Batch>> {
        let state = self.state.read();
        Ok(state
            .batches
            .values()
            .filter(|b| {
                state
                    .enrolments
                    .get(&b.id)
                    .is_some_and(|ids| ids.contains(&student_id))
            })
            .cloned()
            .collect())
    }

    async fn update_batch(&self, id: u64, changes: BatchChanges) -> StoreResult<Option<Batch>> {
        let mut state = self.state.write();
        Ok(state.batches.get_mut(&id).map(|batch| {
            changes.apply(batch);
            batch.clone()
        }))
    }

    async fn delete_batch(&self, id: u64) -> StoreResult<bool> {
        let mut state = self.state.write();
        if state.batches.remove(&id).is_none() {
            return Ok(false);
        }
        state.enrolments.remove(&id);
        state.attendance.retain(|_, s| s.batch_id != id);
        state.tests.retain(|_, t| t.batch_id != id);
        state.fees.retain(|_, f| f.batch_id != id);
        state.timetable.retain(|_, e| e.batch_id != id);
        state.announcements.retain(|_, a| a.batch_id != id);
        Ok(true)
    }

    async fn batch_students(&self, batch_id: u64) -> StoreResult<Vec<StudentSummary>> {
        Ok(self.state.read().roster(batch_id))
    }

    async fn enroll_student(&self, batch_id: u64, student_id: u64) -> StoreResult<()> {
        let mut state = self.state.write();
        let roster = state.enrolments.entry(batch_id).or_default();
        if roster.contains(&student_id) {
            return Err(StoreError::Conflict(
                "Student is already enrolled in this batch".into(),
            ));
        }
        roster.push(student_id);
        Ok(())
    }

    async fn remove_student(&self, batch_id: u64, student_id: u64) -> StoreResult<bool> {
        let mut state = self.state.write();
        let removed = match state.enrolments.get_mut(&batch_id) {
            Some(roster) => {
                let before = roster.len();
                roster.retain(|id| *id != student_id);
                roster.len() != before
            }
            None => false,
        };
        if removed {
            for session in state.attendance.values_mut().filter(|s| s.batch_id == batch_id) {
                session.records.retain(|r| r.student_id != student_id);
            }
            for test in state.tests.values_mut().filter(|t| t.batch_id == batch_id) {
                test.scores.retain(|s| s.student_id != student_id);
            }
            state
                .fees
                .retain(|_, f| !(f.batch_id == batch_id && f.student_id == student_id));
        }
        Ok(removed)
    }

    async fn is_enrolled(&self, batch_id: u64, student_id: u64) -> StoreResult<bool> {
        Ok(self
            .state
            .read()
            .enrolments
            .get(&batch_id)
            .is_some_and(|ids| ids.contains(&student_id)))
    }

    async fn list_attendance(&self, batch_id: u64) -> StoreResult<Vec<AttendanceSession>> {
        let mut sessions: Vec<AttendanceSession> = self
            .state
            .read()
            .attendance
            .values()
            .filter(|s| s.batch_id == batch_id)
            .cloned()
            .collect();
        sessions.sort_by(|a, b| b.date.cmp(&a.date));
        Ok(sessions)
    }

    async fn create_attendance(
        &self,
        batch_id: u64,
        date: NaiveDate,
        records: Vec<AttendanceRecord>,
    ) -> StoreResult<AttendanceSession> {
        let mut state = self.state.write();
        if state
            .attendance
            .values()
            .any(|s| s.batch_id == batch_id && s.date == date)
        {
            return Err(StoreError::Conflict(format!(
                "Attendance for {date} is already marked"
            )));
        }
        let id = state.allocate_id();
        let session = AttendanceSession {
            id,
            batch_id,
            date,
            records,
        };
        state.attendance.insert(id, session.clone());
        Ok(session)
    }

    async fn update_attendance(
        &self,
        batch_id: u64,
        session_id: u64,
        records: Vec<AttendanceRecord>,
    ) -> StoreResult<Option<AttendanceSession>> {
        let mut state = self.state.write();
        Ok(state
            .attendance
            .get_mut(&session_id)
            .filter(|s| s.batch_id == batch_id)
            .map(|session| {
                session.records = records;
                session.clone()
            }))
    }

    async fn delete_attendance(&self, batch_id: u64, session_id: u64) -> StoreResult<bool> {
        let mut state = self.state.write();
        let owned = state
            .attendance
            .get(&session_id)
            .is_some_and(|s| s.batch_id == batch_id);
        if owned {
            state.attendance.remove(&session_id);
        }
        Ok(owned)
    }

    async fn list_tests(&self, batch_id: u64) -> StoreResult<Vec<Test>> {
        let mut tests: Vec<Test> = self
            .state
            .read()
            .tests
            .values()
            .filter(|t| t.batch_id == batch_id)
            .cloned()
            .collect();
        tests.sort_by(|a, b| b.date.cmp(&a.date).then(b.id.cmp(&a.id)));
        Ok(tests)
    }

    async fn get_test(&self, batch_id: u64, test_id: u64) -> StoreResult<Option<Test>> {
        Ok(self
            .state
            .read()
            .tests
            .get(&test_id)
            .filter(|t| t.batch_id == batch_id)
            .cloned())
    }

    async fn create_test(&self, batch_id: u64, test: NewTest) -> StoreResult<Test> {
        let mut state = self.state.write();
        let id = state.allocate_id();
        let created = Test {
            id,
            batch_id,
            name: test.name,
            max_marks: test.max_marks,
            date: test.date,
            scores: test.scores,
        };
        state.tests.insert(id, created.clone());
        Ok(created)
    }

    async fn update_test(
        &self,
        batch_id: u64,
        test_id: u64,
        changes: TestChanges,
    ) -> StoreResult<Option<Test>> {
        let mut state = self.state.write();
        Ok(state
            .tests
            .get_mut(&test_id)
            .filter(|t| t.batch_id == batch_id)
            .map(|test| {
                if let Some(name) = changes.name {
                    test.name = name;
                }
                if let Some(max_marks) = changes.max_marks {
                    test.max_marks = max_marks;
                }
                if let Some(date) = changes.date {
                    test.date = date;
                }
                if let Some(scores) = changes.scores {
                    test.scores = scores;
                }
                test.clone()
            }))
    }

    async fn delete_test(&self, batch_id: u64, test_id: u64) -> StoreResult<bool> {
        let mut state = self.state.write();
        let owned = state
            .tests
            .get(&test_id)
            .is_some_and(|t| t.batch_id == batch_id);
        if owned {
            state.tests.remove(&test_id);
        }
        Ok(owned)
    }

    async fn list_fees(&self, batch_id: u64) -> StoreResult<Vec<FeeRecord>> {
        Ok(self
            .state
            .read()
            .fees
            .values()
            .filter(|f| f.batch_id == batch_id)
            .cloned()
            .collect())
    }

    async fn get_fee(&self, batch_id: u64, fee_id: u64) -> StoreResult<Option<FeeRecord>> {
        Ok(self
            .state
            .read()
            .fees
            .get(&fee_id)
            .filter(|f| f.batch_id == batch_id)
            .cloned())
    }

    async fn fee_for_student(
        &self,
        batch_id: u64,
        student_id: u64,
    ) -> StoreResult<Option<FeeRecord>> {
        Ok(self
            .state
            .read()
            .fees
            .values()
            .find(|f| f.batch_id == batch_id && f.student_id == student_id)
            .cloned())
    }

    async fn upsert_fee(&self, batch_id: u64, fee: FeeInput) -> StoreResult<FeeRecord> {
        let mut state = self.state.write();
        let existing = state
            .fees
            .values()
            .find(|f| f.batch_id == batch_id && f.student_id == fee.student_id)
            .map(|f| f.id);
        let id = match existing {
            Some(id) => id,
            None => state.allocate_id(),
        };
        let record = FeeRecord {
            id,
            batch_id,
            student_id: fee.student_id,
            amount: fee.amount,
            method: fee.method,
            status: fee.status,
            due_date: fee.due_date,
            paid_on: fee.paid_on,
        };
        state.fees.insert(id, record.clone());
        Ok(record)
    }

    async fn update_fee(
        &self,
        batch_id: u64,
        fee_id: u64,
        fee: FeeInput,
    ) -> StoreResult<Option<FeeRecord>> {
        let mut state = self.state.write();
        Ok(state
            .fees
            .get_mut(&fee_id)
            .filter(|f| f.batch_id == batch_id)
            .map(|record| {
                record.amount = fee.amount;
                record.method = fee.method;
                record.status = fee.status;
                record.due_date = fee.due_date;
                record.paid_on = fee.paid_on;
                record.clone()
            }))
    }

    async fn delete_fee(&self, batch_id: u64, fee_id: u64) -> StoreResult<bool> {
        let mut state = self.state.write();
        let owned = state
            .fees
            .get(&fee_id)
            .is_some_and(|f| f.batch_id == batch_id);
        if owned {
            state.fees.remove(&fee_id);
        }
        Ok(owned)
    }

    async fn list_timetable(&self, batch_id: u64) -> StoreResult<Vec<TimetableEntry>> {
        let mut entries: Vec<TimetableEntry> = self
            .state
            .read()
            .timetable
            .values()
            .filter(|e| e.batch_id == batch_id)
            .cloned()
            .collect();
        sort_entries(&mut entries);
        Ok(entries)
    }

    async fn upsert_timetable_entry(
        &self,
        batch_id: u64,
        entry: TimetableInput,
    ) -> StoreResult<TimetableEntry> {
        let mut state = self.state.write();
        let existing = state
            .timetable
            .values()
            .find(|e| e.batch_id == batch_id && e.day == entry.day && e.period == entry.period)
            .map(|e| e.id);
        let id = match existing {
            Some(id) => id,
            None => state.allocate_id(),
        };
        let stored = TimetableEntry {
            id,
            batch_id,
            day: entry.day,
            period: entry.period,
            subject: entry.subject,
            teacher_name: entry.teacher_name,
            start_time: entry.start_time,
            end_time: entry.end_time,
        };
        state.timetable.insert(id, stored.clone());
        Ok(stored)
    }

    async fn delete_timetable_entry(&self, batch_id: u64, entry_id: u64) -> StoreResult<bool> {
        let mut state = self.state.write();
        let owned = state
            .timetable
            .get(&entry_id)
            .is_some_and(|e| e.batch_id == batch_id);
        if owned {
            state.timetable.remove(&entry_id);
        }
        Ok(owned)
    }

    async fn list_announcements(&self, batch_id: u64) -> StoreResult<Vec<Announcement>> {
        let mut announcements: Vec<Announcement> = self
            .state
            .read()
            .announcements
            .values()
            .filter(|a| a.batch_id == batch_id)
            .cloned()
            .collect();
        announcements.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(announcements)
    }

    async fn create_announcement(
        &self,
        batch_id: u64,
        announcement: NewAnnouncement,
    ) -> StoreResult<Announcement> {
        let mut state = self.state.write();
        let id = state.allocate_id();
        let created = Announcement {
            id,
            batch_id,
            title: announcement.title,
            body: announcement.body,
            created_at: Utc::now(),
        };
        state.announcements.insert(id, created.clone());
        Ok(created)
    }

    async fn delete_announcement(&self, batch_id: u64, announcement_id: u64) -> StoreResult<bool> {
        let mut state = self.state.write();
        let owned = state
            .announcements
            .get(&announcement_id)
            .is_some_and(|a| a.batch_id == batch_id);
        if owned {
            state.announcements.remove(&announcement_id);
        }
        Ok(owned)
    }
}
