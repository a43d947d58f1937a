use std::collections::HashMap;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use sqlx::{FromRow, MySqlPool};
use tracing::debug;

use crate::model::{
    announcement::{Announcement, NewAnnouncement},
    assessment::{NewTest, Test, TestChanges, TestScore},
    attendance::{AttendanceRecord, AttendanceSession, AttendanceStatus},
    batch::{Batch, BatchChanges, NewBatch},
    fee::{FeeInput, FeeRecord, FeeStatus},
    role::Role,
    timetable::{TimetableEntry, TimetableInput, Weekday, sort_entries},
    user::{NewUser, StudentSummary, User},
};
use crate::store::{ClassroomStore, StoreError, StoreResult};
use crate::utils::db_utils::{SqlValue, UpdateBuilder, execute_update};

/// MySQL reports both unique and foreign key violations as SQLSTATE 23000.
fn is_constraint_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some("23000"))
}

fn conflict_or(e: sqlx::Error, message: &str) -> StoreError {
    if is_constraint_violation(&e) {
        StoreError::Conflict(message.to_string())
    } else {
        StoreError::Database(e)
    }
}

fn parse_enum<T: FromStr>(column: &str, raw: &str) -> StoreResult<T> {
    T::from_str(raw).map_err(|_| StoreError::Corrupt(format!("{column} = {raw:?}")))
}

#[derive(FromRow)]
struct UserRow {
    id: u64,
    username: String,
    name: String,
    email: String,
    password: String,
    role_id: u8,
    student_id: Option<u64>,
}

impl TryFrom<UserRow> for User {
    type Error = StoreError;

    fn try_from(row: UserRow) -> StoreResult<Self> {
        let role = Role::from_id(row.role_id)
            .ok_or_else(|| StoreError::Corrupt(format!("role_id = {}", row.role_id)))?;
        Ok(User {
            id: row.id,
            username: row.username,
            name: row.name,
            email: row.email,
            password: row.password,
            role,
            student_id: row.student_id,
        })
    }
}

#[derive(FromRow)]
struct SessionRow {
    id: u64,
    batch_id: u64,
    date: NaiveDate,
}

#[derive(FromRow)]
struct RecordRow {
    session_id: u64,
    student_id: u64,
    status: String,
    remarks: Option<String>,
}

#[derive(FromRow)]
struct TestRow {
    id: u64,
    batch_id: u64,
    name: String,
    max_marks: f64,
    date: NaiveDate,
}

#[derive(FromRow)]
struct ScoreRow {
    test_id: u64,
    student_id: u64,
    marks: f64,
}

#[derive(FromRow)]
struct FeeRow {
    id: u64,
    batch_id: u64,
    student_id: u64,
    amount: f64,
    method: Option<String>,
    status: String,
    due_date: Option<NaiveDate>,
    paid_on: Option<NaiveDate>,
}

impl TryFrom<FeeRow> for FeeRecord {
    type Error = StoreError;

    fn try_from(row: FeeRow) -> StoreResult<Self> {
        Ok(FeeRecord {
            id: row.id,
            batch_id: row.batch_id,
            student_id: row.student_id,
            amount: row.amount,
            method: row.method,
            status: parse_enum::<FeeStatus>("fees.status", &row.status)?,
            due_date: row.due_date,
            paid_on: row.paid_on,
        })
    }
}

#[derive(FromRow)]
struct TimetableRow {
    id: u64,
    batch_id: u64,
    day: String,
    period: u8,
    subject: String,
    teacher_name: String,
    start_time: NaiveTime,
    end_time: NaiveTime,
}

impl TryFrom<TimetableRow> for TimetableEntry {
    type Error = StoreError;

    fn try_from(row: TimetableRow) -> StoreResult<Self> {
        Ok(TimetableEntry {
            id: row.id,
            batch_id: row.batch_id,
            day: parse_enum::<Weekday>("timetable_entries.day", &row.day)?,
            period: row.period,
            subject: row.subject,
            teacher_name: row.teacher_name,
            start_time: row.start_time,
            end_time: row.end_time,
        })
    }
}

const USER_COLUMNS: &str = "id, username, name, email, password, role_id, student_id";
const BATCH_COLUMNS: &str = "id, teacher_id, name, subject, description, created_at";
const FEE_COLUMNS: &str =
    "id, batch_id, student_id, amount, method, status, due_date, paid_on";
const TIMETABLE_COLUMNS: &str =
    "id, batch_id, day, period, subject, teacher_name, start_time, end_time";

pub struct MySqlStore {
    pool: MySqlPool,
}

impl MySqlStore {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    async fn records_by_session(
        &self,
        batch_id: u64,
    ) -> StoreResult<HashMap<u64, Vec<AttendanceRecord>>> {
        let rows = sqlx::query_as::<_, RecordRow>(
            r#"
            SELECT r.session_id, r.student_id, r.status, r.remarks
            FROM attendance_records r
            JOIN attendance_sessions s ON s.id = r.session_id
            WHERE s.batch_id = ?
            ORDER BY r.session_id, r.position
            "#,
        )
        .bind(batch_id)
        .fetch_all(&self.pool)
        .await?;

        let mut grouped: HashMap<u64, Vec<AttendanceRecord>> = HashMap::new();
        for row in rows {
            grouped
                .entry(row.session_id)
                .or_default()
                .push(AttendanceRecord {
                    student_id: row.student_id,
                    status: parse_enum::<AttendanceStatus>(
                        "attendance_records.status",
                        &row.status,
                    )?,
                    remarks: row.remarks,
                });
        }
        Ok(grouped)
    }

    async fn scores_by_test(&self, batch_id: u64) -> StoreResult<HashMap<u64, Vec<TestScore>>> {
        let rows = sqlx::query_as::<_, ScoreRow>(
            r#"
            SELECT ts.test_id, ts.student_id, ts.marks
            FROM test_scores ts
            JOIN tests t ON t.id = ts.test_id
            WHERE t.batch_id = ?
            ORDER BY ts.test_id, ts.student_id
            "#,
        )
        .bind(batch_id)
        .fetch_all(&self.pool)
        .await?;

        let mut grouped: HashMap<u64, Vec<TestScore>> = HashMap::new();
        for row in rows {
            grouped.entry(row.test_id).or_default().push(TestScore {
                student_id: row.student_id,
                marks: row.marks,
            });
        }
        Ok(grouped)
    }
}

async fn insert_records(
    tx: &mut sqlx::Transaction<'_, sqlx::MySql>,
    session_id: u64,
    records: &[AttendanceRecord],
) -> Result<(), sqlx::Error> {
    for (position, record) in records.iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO attendance_records (session_id, student_id, position, status, remarks)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(session_id)
        .bind(record.student_id)
        .bind(position as u32)
        .bind(record.status.to_string())
        .bind(record.remarks.as_deref())
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}

async fn insert_scores(
    tx: &mut sqlx::Transaction<'_, sqlx::MySql>,
    test_id: u64,
    scores: &[TestScore],
) -> Result<(), sqlx::Error> {
    for score in scores {
        sqlx::query("INSERT INTO test_scores (test_id, student_id, marks) VALUES (?, ?, ?)")
            .bind(test_id)
            .bind(score.student_id)
            .bind(score.marks)
            .execute(&mut **tx)
            .await?;
    }
    Ok(())
}

#[async_trait]
impl ClassroomStore for MySqlStore {
    async fn create_user(&self, user: NewUser) -> StoreResult<User> {
        let username = user.username.to_lowercase();
        let result = sqlx::query(
            r#"
            INSERT INTO users (username, name, email, password, role_id, student_id)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&username)
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password)
        .bind(user.role.id())
        .bind(user.student_id)
        .execute(&self.pool)
        .await
        .map_err(|e| conflict_or(e, "Username or email already exists"))?;

        Ok(User {
            id: result.last_insert_id(),
            username,
            name: user.name,
            email: user.email,
            password: user.password,
            role: user.role,
            student_id: user.student_id,
        })
    }

    async fn find_user_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE username = ?");
        sqlx::query_as::<_, UserRow>(&sql)
            .bind(username.to_lowercase())
            .fetch_optional(&self.pool)
            .await?
            .map(User::try_from)
            .transpose()
    }

    async fn get_user(&self, id: u64) -> StoreResult<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?");
        sqlx::query_as::<_, UserRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(User::try_from)
            .transpose()
    }

    async fn list_students(&self, search: Option<&str>) -> StoreResult<Vec<StudentSummary>> {
        let students = match search {
            Some(search) => {
                let like = format!("%{}%", search);
                sqlx::query_as::<_, StudentSummary>(
                    r#"
                    SELECT id, name, email FROM users
                    WHERE role_id = ?
                    AND (name LIKE ? OR email LIKE ? OR username LIKE ?)
                    ORDER BY name, id
                    "#,
                )
                .bind(Role::Student.id())
                .bind(&like)
                .bind(&like)
                .bind(&like)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, StudentSummary>(
                    "SELECT id, name, email FROM users WHERE role_id = ? ORDER BY name, id",
                )
                .bind(Role::Student.id())
                .fetch_all(&self.pool)
                .await?
            }
        };
        Ok(students)
    }

    async fn touch_last_login(&self, user_id: u64) -> StoreResult<()> {
        sqlx::query("UPDATE users SET last_login_at = NOW() WHERE id = ?")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn store_refresh_token(
        &self,
        user_id: u64,
        jti: &str,
        expires_at: DateTime<Utc>,
    ) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO refresh_tokens (user_id, jti, expires_at)
            VALUES (?, ?, ?)
            "#,
        )
        .bind(user_id)
        .bind(jti)
        .bind(expires_at.naive_utc())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn active_refresh_token(&self, jti: &str) -> StoreResult<Option<u64>> {
        let user_id = sqlx::query_scalar::<_, u64>(
            r#"
            SELECT user_id FROM refresh_tokens
            WHERE jti = ? AND revoked = FALSE AND expires_at > UTC_TIMESTAMP()
            "#,
        )
        .bind(jti)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user_id)
    }

    async fn revoke_refresh_token(&self, jti: &str) -> StoreResult<bool> {
        let result =
            sqlx::query("UPDATE refresh_tokens SET revoked = TRUE WHERE jti = ? AND revoked = FALSE")
                .bind(jti)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn create_batch(&self, batch: NewBatch) -> StoreResult<Batch> {
        let result = sqlx::query(
            "INSERT INTO batches (teacher_id, name, subject, description) VALUES (?, ?, ?, ?)",
        )
        .bind(batch.teacher_id)
        .bind(&batch.name)
        .bind(&batch.subject)
        .bind(batch.description.as_deref())
        .execute(&self.pool)
        .await?;

        self.get_batch(result.last_insert_id())
            .await?
            .ok_or_else(|| StoreError::Corrupt("inserted batch not readable".into()))
    }

    async fn get_batch(&self, id: u64) -> StoreResult<Option<Batch>> {
        let sql = format!("SELECT {BATCH_COLUMNS} FROM batches WHERE id = ?");
        Ok(sqlx::query_as::<_, Batch>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn list_batches_for_teacher(&self, teacher_id: u64) -> StoreResult<Vec<Batch>> {
        let sql = format!("SELECT {BATCH_COLUMNS} FROM batches WHERE teacher_id = ? ORDER BY id");
        Ok(sqlx::query_as::<_, Batch>(&sql)
            .bind(teacher_id)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn list_batches_for_student(&self, student_id: u64) -> StoreResult<Vec<Batch>> {
        Ok(sqlx::query_as::<_, Batch>(
            r#"
            SELECT b.id, b.teacher_id, b.name, b.subject, b.description, b.created_at
            FROM batches b
            JOIN batch_students bs ON bs.batch_id = b.id
            WHERE bs.student_id = ?
            ORDER BY b.id
            "#,
        )
        .bind(student_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn update_batch(&self, id: u64, changes: BatchChanges) -> StoreResult<Option<Batch>> {
        if self.get_batch(id).await?.is_none() {
            return Ok(None);
        }

        let update = UpdateBuilder::new("batches")
            .set("name", changes.name.map(SqlValue::String))
            .set("subject", changes.subject.map(SqlValue::String))
            .set("description", changes.description.map(SqlValue::String))
            .build("id", id);

        if let Some(update) = update {
            debug!(sql = %update.sql, "Updating batch");
            let mut tx = self.pool.begin().await?;
            execute_update(&mut tx, update).await?;
            tx.commit().await?;
        }

        self.get_batch(id).await
    }

    async fn delete_batch(&self, id: u64) -> StoreResult<bool> {
        // child rows go through ON DELETE CASCADE
        let result = sqlx::query("DELETE FROM batches WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn batch_students(&self, batch_id: u64) -> StoreResult<Vec<StudentSummary>> {
        Ok(sqlx::query_as::<_, StudentSummary>(
            r#"
            SELECT u.id, u.name, u.email
            FROM batch_students bs
            JOIN users u ON u.id = bs.student_id
            WHERE bs.batch_id = ?
            ORDER BY u.name, u.id
            "#,
        )
        .bind(batch_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn enroll_student(&self, batch_id: u64, student_id: u64) -> StoreResult<()> {
        sqlx::query("INSERT INTO batch_students (batch_id, student_id) VALUES (?, ?)")
            .bind(batch_id)
            .bind(student_id)
            .execute(&self.pool)
            .await
            .map_err(|e| conflict_or(e, "Student is already enrolled in this batch"))?;
        Ok(())
    }

    async fn remove_student(&self, batch_id: u64, student_id: u64) -> StoreResult<bool> {
        let mut tx = self.pool.begin().await?;

        let removed = sqlx::query("DELETE FROM batch_students WHERE batch_id = ? AND student_id = ?")
            .bind(batch_id)
            .bind(student_id)
            .execute(&mut *tx)
            .await?
            .rows_affected()
            > 0;

        if removed {
            sqlx::query(
                r#"
                DELETE r FROM attendance_records r
                JOIN attendance_sessions s ON s.id = r.session_id
                WHERE s.batch_id = ? AND r.student_id = ?
                "#,
            )
            .bind(batch_id)
            .bind(student_id)
            .execute(&mut *tx)
            .await?;

            sqlx::query(
                r#"
                DELETE ts FROM test_scores ts
                JOIN tests t ON t.id = ts.test_id
                WHERE t.batch_id = ? AND ts.student_id = ?
                "#,
            )
            .bind(batch_id)
            .bind(student_id)
            .execute(&mut *tx)
            .await?;

            sqlx::query("DELETE FROM fees WHERE batch_id = ? AND student_id = ?")
                .bind(batch_id)
                .bind(student_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(removed)
    }

    async fn is_enrolled(&self, batch_id: u64, student_id: u64) -> StoreResult<bool> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM batch_students WHERE batch_id = ? AND student_id = ?",
        )
        .bind(batch_id)
        .bind(student_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count > 0)
    }

    async fn list_attendance(&self, batch_id: u64) -> StoreResult<Vec<AttendanceSession>> {
        let sessions = sqlx::query_as::<_, SessionRow>(
            "SELECT id, batch_id, date FROM attendance_sessions WHERE batch_id = ? ORDER BY date DESC",
        )
        .bind(batch_id)
        .fetch_all(&self.pool)
        .await?;

        let mut records = self.records_by_session(batch_id).await?;

        Ok(sessions
            .into_iter()
            .map(|row| AttendanceSession {
                records: records.remove(&row.id).unwrap_or_default(),
                id: row.id,
                batch_id: row.batch_id,
                date: row.date,
            })
            .collect())
    }

    async fn create_attendance(
        &self,
        batch_id: u64,
        date: NaiveDate,
        records: Vec<AttendanceRecord>,
    ) -> StoreResult<AttendanceSession> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query("INSERT INTO attendance_sessions (batch_id, date) VALUES (?, ?)")
            .bind(batch_id)
            .bind(date)
            .execute(&mut *tx)
            .await
            .map_err(|e| conflict_or(e, &format!("Attendance for {date} is already marked")))?;
        let session_id = result.last_insert_id();

        insert_records(&mut tx, session_id, &records).await?;
        tx.commit().await?;

        Ok(AttendanceSession {
            id: session_id,
            batch_id,
            date,
            records,
        })
    }

    async fn update_attendance(
        &self,
        batch_id: u64,
        session_id: u64,
        records: Vec<AttendanceRecord>,
    ) -> StoreResult<Option<AttendanceSession>> {
        let mut tx = self.pool.begin().await?;

        let session = sqlx::query_as::<_, SessionRow>(
            "SELECT id, batch_id, date FROM attendance_sessions WHERE id = ? AND batch_id = ? FOR UPDATE",
        )
        .bind(session_id)
        .bind(batch_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(session) = session else {
            return Ok(None);
        };

        sqlx::query("DELETE FROM attendance_records WHERE session_id = ?")
            .bind(session_id)
            .execute(&mut *tx)
            .await?;
        insert_records(&mut tx, session_id, &records).await?;
        tx.commit().await?;

        Ok(Some(AttendanceSession {
            id: session.id,
            batch_id: session.batch_id,
            date: session.date,
            records,
        }))
    }

    async fn delete_attendance(&self, batch_id: u64, session_id: u64) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM attendance_sessions WHERE id = ? AND batch_id = ?")
            .bind(session_id)
            .bind(batch_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_tests(&self, batch_id: u64) -> StoreResult<Vec<Test>> {
        let rows = sqlx::query_as::<_, TestRow>(
            "SELECT id, batch_id, name, max_marks, date FROM tests WHERE batch_id = ? ORDER BY date DESC, id DESC",
        )
        .bind(batch_id)
        .fetch_all(&self.pool)
        .await?;

        let mut scores = self.scores_by_test(batch_id).await?;

        Ok(rows
            .into_iter()
            .map(|row| Test {
                scores: scores.remove(&row.id).unwrap_or_default(),
                id: row.id,
                batch_id: row.batch_id,
                name: row.name,
                max_marks: row.max_marks,
                date: row.date,
            })
            .collect())
    }

    async fn get_test(&self, batch_id: u64, test_id: u64) -> StoreResult<Option<Test>> {
        let row = sqlx::query_as::<_, TestRow>(
            "SELECT id, batch_id, name, max_marks, date FROM tests WHERE id = ? AND batch_id = ?",
        )
        .bind(test_id)
        .bind(batch_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let scores = sqlx::query_as::<_, ScoreRow>(
            "SELECT test_id, student_id, marks FROM test_scores WHERE test_id = ? ORDER BY student_id",
        )
        .bind(test_id)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(|s| TestScore {
            student_id: s.student_id,
            marks: s.marks,
        })
        .collect();

        Ok(Some(Test {
            id: row.id,
            batch_id: row.batch_id,
            name: row.name,
            max_marks: row.max_marks,
            date: row.date,
            scores,
        }))
    }

    async fn create_test(&self, batch_id: u64, test: NewTest) -> StoreResult<Test> {
        let mut tx = self.pool.begin().await?;

        let result =
            sqlx::query("INSERT INTO tests (batch_id, name, max_marks, date) VALUES (?, ?, ?, ?)")
                .bind(batch_id)
                .bind(&test.name)
                .bind(test.max_marks)
                .bind(test.date)
                .execute(&mut *tx)
                .await?;
        let test_id = result.last_insert_id();

        insert_scores(&mut tx, test_id, &test.scores).await?;
        tx.commit().await?;

        Ok(Test {
            id: test_id,
            batch_id,
            name: test.name,
            max_marks: test.max_marks,
            date: test.date,
            scores: test.scores,
        })
    }

    async fn update_test(
        &self,
        batch_id: u64,
        test_id: u64,
        changes: TestChanges,
    ) -> StoreResult<Option<Test>> {
        if self.get_test(batch_id, test_id).await?.is_none() {
            return Ok(None);
        }

        let mut tx = self.pool.begin().await?;

        let update = UpdateBuilder::new("tests")
            .set("name", changes.name.map(SqlValue::String))
            .set("max_marks", changes.max_marks.map(SqlValue::F64))
            .set("date", changes.date.map(SqlValue::Date))
            .build("id", test_id);
        if let Some(update) = update {
            execute_update(&mut tx, update).await?;
        }

        if let Some(scores) = &changes.scores {
            sqlx::query("DELETE FROM test_scores WHERE test_id = ?")
                .bind(test_id)
                .execute(&mut *tx)
                .await?;
            insert_scores(&mut tx, test_id, scores).await?;
        }

        tx.commit().await?;
        self.get_test(batch_id, test_id).await
    }

    async fn delete_test(&self, batch_id: u64, test_id: u64) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM tests WHERE id = ? AND batch_id = ?")
            .bind(test_id)
            .bind(batch_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_fees(&self, batch_id: u64) -> StoreResult<Vec<FeeRecord>> {
        let sql = format!("SELECT {FEE_COLUMNS} FROM fees WHERE batch_id = ? ORDER BY id");
        sqlx::query_as::<_, FeeRow>(&sql)
            .bind(batch_id)
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(FeeRecord::try_from)
            .collect()
    }

    async fn get_fee(&self, batch_id: u64, fee_id: u64) -> StoreResult<Option<FeeRecord>> {
        let sql = format!("SELECT {FEE_COLUMNS} FROM fees WHERE id = ? AND batch_id = ?");
        sqlx::query_as::<_, FeeRow>(&sql)
            .bind(fee_id)
            .bind(batch_id)
            .fetch_optional(&self.pool)
            .await?
            .map(FeeRecord::try_from)
            .transpose()
    }

    async fn fee_for_student(
        &self,
        batch_id: u64,
        student_id: u64,
    ) -> StoreResult<Option<FeeRecord>> {
        let sql = format!("SELECT {FEE_COLUMNS} FROM fees WHERE batch_id = ? AND student_id = ?");
        sqlx::query_as::<_, FeeRow>(&sql)
            .bind(batch_id)
            .bind(student_id)
            .fetch_optional(&self.pool)
            .await?
            .map(FeeRecord::try_from)
            .transpose()
    }

    async fn upsert_fee(&self, batch_id: u64, fee: FeeInput) -> StoreResult<FeeRecord> {
        sqlx::query(
            r#"
            INSERT INTO fees (batch_id, student_id, amount, method, status, due_date, paid_on)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON DUPLICATE KEY UPDATE
                amount = VALUES(amount),
                method = VALUES(method),
                status = VALUES(status),
                due_date = VALUES(due_date),
                paid_on = VALUES(paid_on)
            "#,
        )
        .bind(batch_id)
        .bind(fee.student_id)
        .bind(fee.amount)
        .bind(fee.method.as_deref())
        .bind(fee.status.to_string())
        .bind(fee.due_date)
        .bind(fee.paid_on)
        .execute(&self.pool)
        .await?;

        self.fee_for_student(batch_id, fee.student_id)
            .await?
            .ok_or_else(|| StoreError::Corrupt("upserted fee not readable".into()))
    }

    async fn update_fee(
        &self,
        batch_id: u64,
        fee_id: u64,
        fee: FeeInput,
    ) -> StoreResult<Option<FeeRecord>> {
        if self.get_fee(batch_id, fee_id).await?.is_none() {
            return Ok(None);
        }

        sqlx::query(
            r#"
            UPDATE fees
            SET amount = ?, method = ?, status = ?, due_date = ?, paid_on = ?
            WHERE id = ? AND batch_id = ?
            "#,
        )
        .bind(fee.amount)
        .bind(fee.method.as_deref())
        .bind(fee.status.to_string())
        .bind(fee.due_date)
        .bind(fee.paid_on)
        .bind(fee_id)
        .bind(batch_id)
        .execute(&self.pool)
        .await?;

        self.get_fee(batch_id, fee_id).await
    }

    async fn delete_fee(&self, batch_id: u64, fee_id: u64) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM fees WHERE id = ? AND batch_id = ?")
            .bind(fee_id)
            .bind(batch_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_timetable(&self, batch_id: u64) -> StoreResult<Vec<TimetableEntry>> {
        let sql = format!("SELECT {TIMETABLE_COLUMNS} FROM timetable_entries WHERE batch_id = ?");
        let mut entries = sqlx::query_as::<_, TimetableRow>(&sql)
            .bind(batch_id)
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(TimetableEntry::try_from)
            .collect::<StoreResult<Vec<_>>>()?;
        sort_entries(&mut entries);
        Ok(entries)
    }

    async fn upsert_timetable_entry(
        &self,
        batch_id: u64,
        entry: TimetableInput,
    ) -> StoreResult<TimetableEntry> {
        let day = entry.day.to_string();
        sqlx::query(
            r#"
            INSERT INTO timetable_entries
                (batch_id, day, period, subject, teacher_name, start_time, end_time)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON DUPLICATE KEY UPDATE
                subject = VALUES(subject),
                teacher_name = VALUES(teacher_name),
                start_time = VALUES(start_time),
                end_time = VALUES(end_time)
            "#,
        )
        .bind(batch_id)
        .bind(&day)
        .bind(entry.period)
        .bind(&entry.subject)
        .bind(&entry.teacher_name)
        .bind(entry.start_time)
        .bind(entry.end_time)
        .execute(&self.pool)
        .await?;

        let sql = format!(
            "SELECT {TIMETABLE_COLUMNS} FROM timetable_entries WHERE batch_id = ? AND day = ? AND period = ?"
        );
        sqlx::query_as::<_, TimetableRow>(&sql)
            .bind(batch_id)
            .bind(&day)
            .bind(entry.period)
            .fetch_one(&self.pool)
            .await?
            .try_into()
    }

    async fn delete_timetable_entry(&self, batch_id: u64, entry_id: u64) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM timetable_entries WHERE id = ? AND batch_id = ?")
            .bind(entry_id)
            .bind(batch_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_announcements(&self, batch_id: u64) -> StoreResult<Vec<Announcement>> {
        Ok(sqlx::query_as::<_, Announcement>(
            r#"
            SELECT id, batch_id, title, body, created_at
            FROM announcements
            WHERE batch_id = ?
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(batch_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn create_announcement(
        &self,
        batch_id: u64,
        announcement: NewAnnouncement,
    ) -> StoreResult<Announcement> {
        let result = sqlx::query("INSERT INTO announcements (batch_id, title, body) VALUES (?, ?, ?)")
            .bind(batch_id)
            .bind(&announcement.title)
            .bind(&announcement.body)
            .execute(&self.pool)
            .await?;

        Ok(sqlx::query_as::<_, Announcement>(
            "SELECT id, batch_id, title, body, created_at FROM announcements WHERE id = ?",
        )
        .bind(result.last_insert_id())
        .fetch_one(&self.pool)
        .await?)
    }

    async fn delete_announcement(&self, batch_id: u64, announcement_id: u64) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM announcements WHERE id = ? AND batch_id = ?")
            .bind(announcement_id)
            .bind(batch_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
