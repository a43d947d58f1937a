use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi, openapi};

use crate::api::{
    announcement::CreateAnnouncement,
    assessment::{CreateTest, UpdateTest},
    attendance::{CreateAttendance, UpdateAttendance},
    batch::{CreateBatch, EnrollStudent, UpdateBatch},
    fee::{SaveFee, UpdateFee},
    timetable::SaveTimetableEntry,
    viewer::Viewer,
};
use crate::model::{
    announcement::Announcement,
    assessment::{StudentTestResult, Test, TestScore},
    attendance::{AttendanceRecord, AttendanceSession, AttendanceStatus, StudentAttendance},
    batch::{Batch, BatchDetail},
    fee::{FeeRecord, FeeStatus},
    role::Role,
    timetable::{TimetableEntry, Weekday},
    user::{StudentSummary, UserProfile},
};
use crate::models::{LoginReqDto, LoginResponse, RegisterReq};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Classroom API",
        version = "1.0.0",
        description = r#"
## Classroom management

Teachers run **batches** (classes): they enrol students, mark attendance per
date, record tests, track fees, publish a weekly timetable and post
announcements. Students, and parents of a linked student, read their own
records.

### 🔐 Security
Everything outside `/auth` needs a **JWT Bearer** access token.
`/admin` is teacher only; `/user/student` and `/user/parent` must match the
caller's role.

### 📦 Response Format
- `{"success": true, "<resource>": ...}` on success
- `{"success": false, "error": "<message>"}` on failure
"#,
    ),
    paths(
        crate::auth::handlers::register,
        crate::auth::handlers::login,
        crate::auth::handlers::refresh_token,
        crate::auth::handlers::logout,
        crate::auth::handlers::me,

        crate::api::batch::list_students,
        crate::api::batch::list_batches,
        crate::api::batch::create_batch,
        crate::api::batch::get_batch,
        crate::api::batch::update_batch,
        crate::api::batch::delete_batch,
        crate::api::batch::enroll_student,
        crate::api::batch::remove_student,

        crate::api::attendance::list_attendance,
        crate::api::attendance::create_attendance,
        crate::api::attendance::update_attendance,
        crate::api::attendance::delete_attendance,

        crate::api::assessment::list_tests,
        crate::api::assessment::create_test,
        crate::api::assessment::update_test,
        crate::api::assessment::delete_test,

        crate::api::fee::list_fees,
        crate::api::fee::save_fee,
        crate::api::fee::update_fee,
        crate::api::fee::delete_fee,

        crate::api::timetable::list_timetable,
        crate::api::timetable::save_timetable_entry,
        crate::api::timetable::delete_timetable_entry,

        crate::api::announcement::list_announcements,
        crate::api::announcement::create_announcement,
        crate::api::announcement::delete_announcement,

        crate::api::viewer::list_batches,
        crate::api::viewer::get_batch,
        crate::api::viewer::attendance,
        crate::api::viewer::test_results,
        crate::api::viewer::fees,
        crate::api::viewer::timetable,
        crate::api::viewer::announcements
    ),
    components(
        schemas(
            RegisterReq,
            LoginReqDto,
            LoginResponse,
            UserProfile,
            StudentSummary,
            Role,
            Batch,
            BatchDetail,
            CreateBatch,
            UpdateBatch,
            EnrollStudent,
            AttendanceStatus,
            AttendanceRecord,
            AttendanceSession,
            StudentAttendance,
            CreateAttendance,
            UpdateAttendance,
            TestScore,
            Test,
            StudentTestResult,
            CreateTest,
            UpdateTest,
            FeeStatus,
            FeeRecord,
            SaveFee,
            UpdateFee,
            Weekday,
            TimetableEntry,
            SaveTimetableEntry,
            Announcement,
            CreateAnnouncement,
            Viewer
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Auth", description = "Registration, login and token rotation"),
        (name = "Batches", description = "Teacher batch and enrolment management"),
        (name = "Attendance", description = "Attendance sessions per batch and date"),
        (name = "Tests", description = "Test scores"),
        (name = "Fees", description = "Fee records and payment status"),
        (name = "Timetable", description = "Weekly timetable"),
        (name = "Announcements", description = "Batch announcements"),
        (name = "Viewer", description = "Student and parent read-only views"),
    )
)]
pub struct ApiDoc;

pub struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_every_scope() {
        let doc = ApiDoc::openapi();
        let paths = &doc.paths.paths;
        assert!(paths.contains_key("/auth/login"));
        assert!(paths.contains_key("/admin/batches/{batch_id}/attendance/{session_id}"));
        assert!(paths.contains_key("/user/{viewer}/batches/{batch_id}/tests"));

        let schemes = doc.components.as_ref().map(|c| &c.security_schemes);
        assert!(schemes.is_some_and(|s| s.contains_key("bearer_auth")));
    }
}
