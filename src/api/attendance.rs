use actix_web::{HttpResponse, web};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, instrument};
use utoipa::ToSchema;

use crate::{
    api::enrolled_ids,
    auth::auth::AuthUser,
    error::{AppError, AppResult},
    model::attendance::{AttendanceRecord, check_records},
    store::ClassroomStore,
    utils::batch_owner_cache::BatchOwnerCache,
};

#[derive(Debug, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
#[schema(example = json!({
    "date": "2024-01-10",
    "records": [
        {"studentId": 11, "status": "present"},
        {"studentId": 12, "status": "absent", "remarks": "sick"}
    ]
}))]
pub struct CreateAttendance {
    #[schema(value_type = String)]
    pub date: NaiveDate,
    pub records: Vec<AttendanceRecord>,
}

#[derive(Debug, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAttendance {
    pub records: Vec<AttendanceRecord>,
}

/// Drops blank remarks so they are not stored as empty strings.
fn tidy(records: Vec<AttendanceRecord>) -> Vec<AttendanceRecord> {
    records
        .into_iter()
        .map(|mut r| {
            r.remarks = r
                .remarks
                .map(|text| text.trim().to_string())
                .filter(|text| !text.is_empty());
            r
        })
        .collect()
}

/// All sessions of a batch, newest date first
#[utoipa::path(
    get,
    path = "/admin/batches/{batch_id}/attendance",
    params(("batch_id", Path, description = "Batch ID")),
    responses(
        (status = 200, description = "Attendance sessions", body = Object, example = json!({
            "success": true,
            "attendance": [{
                "id": 3, "batchId": 1, "date": "2024-01-10",
                "records": [{"studentId": 11, "status": "present"}]
            }]
        })),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Batch not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn list_attendance(
    auth: AuthUser,
    store: web::Data<dyn ClassroomStore>,
    owners: web::Data<BatchOwnerCache>,
    path: web::Path<u64>,
) -> AppResult<HttpResponse> {
    let batch_id = path.into_inner();
    owners.ensure_owner(store.get_ref(), &auth, batch_id).await?;

    let attendance = store.list_attendance(batch_id).await?;
    Ok(HttpResponse::Ok().json(json!({ "success": true, "attendance": attendance })))
}

/// Mark attendance for a date
#[utoipa::path(
    post,
    path = "/admin/batches/{batch_id}/attendance",
    params(("batch_id", Path, description = "Batch ID")),
    request_body = CreateAttendance,
    responses(
        (status = 201, description = "Session created", body = crate::model::attendance::AttendanceSession),
        (status = 400, description = "Record names a student outside the batch", body = Object, example = json!({
            "success": false, "error": "Student 99 is not enrolled in this batch"
        })),
        (status = 404, description = "Batch not found"),
        (status = 409, description = "Attendance already marked for the date", body = Object, example = json!({
            "success": false, "error": "Attendance for 2024-01-10 is already marked"
        }))
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
#[instrument(skip(auth, store, owners, payload), fields(date = %payload.date))]
pub async fn create_attendance(
    auth: AuthUser,
    store: web::Data<dyn ClassroomStore>,
    owners: web::Data<BatchOwnerCache>,
    path: web::Path<u64>,
    payload: web::Json<CreateAttendance>,
) -> AppResult<HttpResponse> {
    let batch_id = path.into_inner();
    owners.ensure_owner(store.get_ref(), &auth, batch_id).await?;

    let CreateAttendance { date, records } = payload.into_inner();
    let enrolled = enrolled_ids(store.get_ref(), batch_id).await?;
    check_records(&records, &enrolled).map_err(AppError::BadRequest)?;

    let session = store
        .create_attendance(batch_id, date, tidy(records))
        .await?;

    info!(batch_id, session_id = session.id, "Attendance marked");
    Ok(HttpResponse::Created().json(json!({ "success": true, "attendance": session })))
}

/// Replace the records of an existing session
#[utoipa::path(
    put,
    path = "/admin/batches/{batch_id}/attendance/{session_id}",
    params(
        ("batch_id", Path, description = "Batch ID"),
        ("session_id", Path, description = "Attendance session ID")
    ),
    request_body = UpdateAttendance,
    responses(
        (status = 200, description = "Session updated", body = crate::model::attendance::AttendanceSession),
        (status = 400, description = "Record names a student outside the batch"),
        (status = 404, description = "Batch or session not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn update_attendance(
    auth: AuthUser,
    store: web::Data<dyn ClassroomStore>,
    owners: web::Data<BatchOwnerCache>,
    path: web::Path<(u64, u64)>,
    payload: web::Json<UpdateAttendance>,
) -> AppResult<HttpResponse> {
    let (batch_id, session_id) = path.into_inner();
    owners.ensure_owner(store.get_ref(), &auth, batch_id).await?;

    let records = payload.into_inner().records;
    let enrolled = enrolled_ids(store.get_ref(), batch_id).await?;
    check_records(&records, &enrolled).map_err(AppError::BadRequest)?;

    let session = store
        .update_attendance(batch_id, session_id, tidy(records))
        .await?
        .ok_or_else(|| AppError::not_found("Attendance session"))?;

    info!(batch_id, session_id, "Attendance updated");
    Ok(HttpResponse::Ok().json(json!({ "success": true, "attendance": session })))
}

/// Delete a session
#[utoipa::path(
    delete,
    path = "/admin/batches/{batch_id}/attendance/{session_id}",
    params(
        ("batch_id", Path, description = "Batch ID"),
        ("session_id", Path, description = "Attendance session ID")
    ),
    responses(
        (status = 200, description = "Session deleted", body = Object, example = json!({
            "success": true, "message": "Attendance deleted"
        })),
        (status = 404, description = "Batch or session not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn delete_attendance(
    auth: AuthUser,
    store: web::Data<dyn ClassroomStore>,
    owners: web::Data<BatchOwnerCache>,
    path: web::Path<(u64, u64)>,
) -> AppResult<HttpResponse> {
    let (batch_id, session_id) = path.into_inner();
    owners.ensure_owner(store.get_ref(), &auth, batch_id).await?;

    if !store.delete_attendance(batch_id, session_id).await? {
        return Err(AppError::not_found("Attendance session"));
    }

    info!(batch_id, session_id, "Attendance deleted");
    Ok(HttpResponse::Ok().json(json!({ "success": true, "message": "Attendance deleted" })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::attendance::AttendanceStatus;

    #[test]
    fn blank_remarks_are_dropped() {
        let records = tidy(vec![
            AttendanceRecord {
                student_id: 1,
                status: AttendanceStatus::Absent,
                remarks: Some("  ".into()),
            },
            AttendanceRecord {
                student_id: 2,
                status: AttendanceStatus::Absent,
                remarks: Some(" sick ".into()),
            },
        ]);
        assert_eq!(records[0].remarks, None);
        assert_eq!(records[1].remarks.as_deref(), Some("sick"));
    }
}
