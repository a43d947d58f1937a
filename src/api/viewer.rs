//! Read-only record views for students and for parents of a linked student.
//!
//! Both audiences share the handlers below; the `{viewer}` path segment must
//! match the caller's role and every response is filtered to one student.

use actix_web::{HttpResponse, web};
use serde::Deserialize;
use serde_json::json;
use utoipa::ToSchema;

use crate::{
    auth::auth::AuthUser,
    error::{AppError, AppResult},
    model::{
        assessment::StudentTestResult,
        attendance::StudentAttendance,
        batch::Batch,
    },
    store::ClassroomStore,
};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Viewer {
    Student,
    Parent,
}

impl Viewer {
    /// The student whose records the caller may read.
    pub fn student_id(self, auth: &AuthUser) -> AppResult<u64> {
        match self {
            Viewer::Student => {
                auth.require_student()?;
                Ok(auth.user_id)
            }
            Viewer::Parent => auth.require_parent(),
        }
    }
}

/// Batches the student is not enrolled in look missing.
async fn visible_batch(
    store: &dyn ClassroomStore,
    student_id: u64,
    batch_id: u64,
) -> AppResult<Batch> {
    if !store.is_enrolled(batch_id, student_id).await? {
        return Err(AppError::not_found("Batch"));
    }
    store
        .get_batch(batch_id)
        .await?
        .ok_or_else(|| AppError::not_found("Batch"))
}

/// Batches the student is enrolled in
#[utoipa::path(
    get,
    path = "/user/{viewer}/batches",
    params(("viewer", Path, description = "`student` or `parent`, matching the caller's role")),
    responses(
        (status = 200, description = "Enrolled batches", body = Object),
        (status = 403, description = "Role does not match the path")
    ),
    security(("bearer_auth" = [])),
    tag = "Viewer"
)]
pub async fn list_batches(
    auth: AuthUser,
    store: web::Data<dyn ClassroomStore>,
    path: web::Path<Viewer>,
) -> AppResult<HttpResponse> {
    let student_id = path.into_inner().student_id(&auth)?;

    let batches = store.list_batches_for_student(student_id).await?;
    Ok(HttpResponse::Ok().json(json!({ "success": true, "batches": batches })))
}

/// One enrolled batch
#[utoipa::path(
    get,
    path = "/user/{viewer}/batches/{batch_id}",
    params(
        ("viewer", Path, description = "`student` or `parent`"),
        ("batch_id", Path, description = "Batch ID")
    ),
    responses(
        (status = 200, description = "Batch", body = Batch),
        (status = 404, description = "Not enrolled or no such batch")
    ),
    security(("bearer_auth" = [])),
    tag = "Viewer"
)]
pub async fn get_batch(
    auth: AuthUser,
    store: web::Data<dyn ClassroomStore>,
    path: web::Path<(Viewer, u64)>,
) -> AppResult<HttpResponse> {
    let (viewer, batch_id) = path.into_inner();
    let student_id = viewer.student_id(&auth)?;

    let batch = visible_batch(store.get_ref(), student_id, batch_id).await?;
    Ok(HttpResponse::Ok().json(json!({ "success": true, "batch": batch })))
}

/// The student's attendance in a batch
#[utoipa::path(
    get,
    path = "/user/{viewer}/batches/{batch_id}/attendance",
    params(
        ("viewer", Path, description = "`student` or `parent`"),
        ("batch_id", Path, description = "Batch ID")
    ),
    responses(
        (status = 200, description = "One entry per session that has a record for the student", body = Vec<StudentAttendance>),
        (status = 404, description = "Not enrolled or no such batch")
    ),
    security(("bearer_auth" = [])),
    tag = "Viewer"
)]
pub async fn attendance(
    auth: AuthUser,
    store: web::Data<dyn ClassroomStore>,
    path: web::Path<(Viewer, u64)>,
) -> AppResult<HttpResponse> {
    let (viewer, batch_id) = path.into_inner();
    let student_id = viewer.student_id(&auth)?;
    visible_batch(store.get_ref(), student_id, batch_id).await?;

    let attendance: Vec<StudentAttendance> = store
        .list_attendance(batch_id)
        .await?
        .iter()
        .filter_map(|session| {
            session.record_for(student_id).map(|r| StudentAttendance {
                session_id: session.id,
                date: session.date,
                status: r.status,
                remarks: r.remarks.clone(),
            })
        })
        .collect();

    Ok(HttpResponse::Ok().json(json!({ "success": true, "attendance": attendance })))
}

/// The student's test results in a batch
#[utoipa::path(
    get,
    path = "/user/{viewer}/batches/{batch_id}/tests",
    params(
        ("viewer", Path, description = "`student` or `parent`"),
        ("batch_id", Path, description = "Batch ID")
    ),
    responses(
        (status = 200, description = "Own marks per test", body = Vec<StudentTestResult>),
        (status = 404, description = "Not enrolled or no such batch")
    ),
    security(("bearer_auth" = [])),
    tag = "Viewer"
)]
pub async fn test_results(
    auth: AuthUser,
    store: web::Data<dyn ClassroomStore>,
    path: web::Path<(Viewer, u64)>,
) -> AppResult<HttpResponse> {
    let (viewer, batch_id) = path.into_inner();
    let student_id = viewer.student_id(&auth)?;
    visible_batch(store.get_ref(), student_id, batch_id).await?;

    let tests: Vec<StudentTestResult> = store
        .list_tests(batch_id)
        .await?
        .iter()
        .map(|t| t.result_for(student_id))
        .collect();

    Ok(HttpResponse::Ok().json(json!({ "success": true, "tests": tests })))
}

/// The student's fee record in a batch
#[utoipa::path(
    get,
    path = "/user/{viewer}/batches/{batch_id}/fees",
    params(
        ("viewer", Path, description = "`student` or `parent`"),
        ("batch_id", Path, description = "Batch ID")
    ),
    responses(
        (status = 200, description = "Own fee record, `null` when none is recorded", body = Object),
        (status = 404, description = "Not enrolled or no such batch")
    ),
    security(("bearer_auth" = [])),
    tag = "Viewer"
)]
pub async fn fees(
    auth: AuthUser,
    store: web::Data<dyn ClassroomStore>,
    path: web::Path<(Viewer, u64)>,
) -> AppResult<HttpResponse> {
    let (viewer, batch_id) = path.into_inner();
    let student_id = viewer.student_id(&auth)?;
    visible_batch(store.get_ref(), student_id, batch_id).await?;

    let fee = store.fee_for_student(batch_id, student_id).await?;
    Ok(HttpResponse::Ok().json(json!({ "success": true, "fee": fee })))
}

/// Timetable of an enrolled batch
#[utoipa::path(
    get,
    path = "/user/{viewer}/batches/{batch_id}/timetable",
    params(
        ("viewer", Path, description = "`student` or `parent`"),
        ("batch_id", Path, description = "Batch ID")
    ),
    responses(
        (status = 200, description = "Entries ordered by day and period", body = Object),
        (status = 404, description = "Not enrolled or no such batch")
    ),
    security(("bearer_auth" = [])),
    tag = "Viewer"
)]
pub async fn timetable(
    auth: AuthUser,
    store: web::Data<dyn ClassroomStore>,
    path: web::Path<(Viewer, u64)>,
) -> AppResult<HttpResponse> {
    let (viewer, batch_id) = path.into_inner();
    let student_id = viewer.student_id(&auth)?;
    visible_batch(store.get_ref(), student_id, batch_id).await?;

    let timetable = store.list_timetable(batch_id).await?;
    Ok(HttpResponse::Ok().json(json!({ "success": true, "timetable": timetable })))
}

/// Announcements of an enrolled batch
#[utoipa::path(
    get,
    path = "/user/{viewer}/batches/{batch_id}/announcements",
    params(
        ("viewer", Path, description = "`student` or `parent`"),
        ("batch_id", Path, description = "Batch ID")
    ),
    responses(
        (status = 200, description = "Announcements, newest first", body = Object),
        (status = 404, description = "Not enrolled or no such batch")
    ),
    security(("bearer_auth" = [])),
    tag = "Viewer"
)]
pub async fn announcements(
    auth: AuthUser,
    store: web::Data<dyn ClassroomStore>,
    path: web::Path<(Viewer, u64)>,
) -> AppResult<HttpResponse> {
    let (viewer, batch_id) = path.into_inner();
    let student_id = viewer.student_id(&auth)?;
    visible_batch(store.get_ref(), student_id, batch_id).await?;

    let announcements = store.list_announcements(batch_id).await?;
    Ok(HttpResponse::Ok().json(json!({ "success": true, "announcements": announcements })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::role::Role;

    fn caller(role: Role, student_id: Option<u64>) -> AuthUser {
        AuthUser {
            user_id: 40,
            username: "someone".into(),
            role,
            student_id,
        }
    }

    #[test]
    fn viewer_must_match_role() {
        assert_eq!(Viewer::Student.student_id(&caller(Role::Student, None)).unwrap(), 40);
        assert_eq!(Viewer::Parent.student_id(&caller(Role::Parent, Some(7))).unwrap(), 7);

        assert!(matches!(
            Viewer::Parent.student_id(&caller(Role::Student, None)),
            Err(AppError::Forbidden(_))
        ));
        assert!(matches!(
            Viewer::Student.student_id(&caller(Role::Teacher, None)),
            Err(AppError::Forbidden(_))
        ));
        assert!(Viewer::Parent.student_id(&caller(Role::Parent, None)).is_err());
    }
}
