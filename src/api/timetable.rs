use actix_web::{HttpResponse, web};
use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    auth::auth::AuthUser,
    error::{AppError, AppResult},
    model::timetable::{TimetableInput, Weekday},
    store::ClassroomStore,
    utils::batch_owner_cache::BatchOwnerCache,
};

#[derive(Debug, Deserialize, Serialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
#[schema(example = json!({
    "day": "monday",
    "period": 1,
    "subject": "Algebra",
    "teacherName": "Asha Rao",
    "startTime": "09:00:00",
    "endTime": "09:45:00"
}))]
pub struct SaveTimetableEntry {
    pub day: Weekday,
    #[validate(range(min = 1, max = 24, message = "must be between 1 and 24"))]
    pub period: u8,
    #[validate(length(min = 1, max = 128, message = "must be 1 to 128 characters"))]
    pub subject: String,
    #[validate(length(min = 1, max = 128, message = "must be 1 to 128 characters"))]
    pub teacher_name: String,
    #[schema(value_type = String)]
    pub start_time: NaiveTime,
    #[schema(value_type = String)]
    pub end_time: NaiveTime,
}

impl SaveTimetableEntry {
    fn trimmed(self) -> Self {
        Self {
            subject: self.subject.trim().to_string(),
            teacher_name: self.teacher_name.trim().to_string(),
            ..self
        }
    }
}

/// Weekly timetable of a batch
#[utoipa::path(
    get,
    path = "/admin/batches/{batch_id}/timetable",
    params(("batch_id", Path, description = "Batch ID")),
    responses(
        (status = 200, description = "Entries ordered by day and period", body = Object),
        (status = 404, description = "Batch not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Timetable"
)]
pub async fn list_timetable(
    auth: AuthUser,
    store: web::Data<dyn ClassroomStore>,
    owners: web::Data<BatchOwnerCache>,
    path: web::Path<u64>,
) -> AppResult<HttpResponse> {
    let batch_id = path.into_inner();
    owners.ensure_owner(store.get_ref(), &auth, batch_id).await?;

    let timetable = store.list_timetable(batch_id).await?;
    Ok(HttpResponse::Ok().json(json!({ "success": true, "timetable": timetable })))
}

/// Set the entry for one (day, period) slot
#[utoipa::path(
    post,
    path = "/admin/batches/{batch_id}/timetable",
    params(("batch_id", Path, description = "Batch ID")),
    request_body = SaveTimetableEntry,
    responses(
        (status = 200, description = "Entry saved", body = crate::model::timetable::TimetableEntry),
        (status = 400, description = "Invalid slot or times"),
        (status = 404, description = "Batch not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Timetable"
)]
pub async fn save_timetable_entry(
    auth: AuthUser,
    store: web::Data<dyn ClassroomStore>,
    owners: web::Data<BatchOwnerCache>,
    path: web::Path<u64>,
    payload: web::Json<SaveTimetableEntry>,
) -> AppResult<HttpResponse> {
    let batch_id = path.into_inner();
    owners.ensure_owner(store.get_ref(), &auth, batch_id).await?;
    let payload = payload.into_inner().trimmed();
    payload.validate()?;

    if payload.start_time >= payload.end_time {
        return Err(AppError::BadRequest(
            "startTime must be before endTime".into(),
        ));
    }

    let entry = store
        .upsert_timetable_entry(
            batch_id,
            TimetableInput {
                day: payload.day,
                period: payload.period,
                subject: payload.subject,
                teacher_name: payload.teacher_name,
                start_time: payload.start_time,
                end_time: payload.end_time,
            },
        )
        .await?;

    Ok(HttpResponse::Ok().json(json!({ "success": true, "entry": entry })))
}

/// Remove a timetable entry
#[utoipa::path(
    delete,
    path = "/admin/batches/{batch_id}/timetable/{entry_id}",
    params(
        ("batch_id", Path, description = "Batch ID"),
        ("entry_id", Path, description = "Timetable entry ID")
    ),
    responses(
        (status = 200, description = "Entry deleted", body = Object),
        (status = 404, description = "Batch or entry not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Timetable"
)]
pub async fn delete_timetable_entry(
    auth: AuthUser,
    store: web::Data<dyn ClassroomStore>,
    owners: web::Data<BatchOwnerCache>,
    path: web::Path<(u64, u64)>,
) -> AppResult<HttpResponse> {
    let (batch_id, entry_id) = path.into_inner();
    owners.ensure_owner(store.get_ref(), &auth, batch_id).await?;

    if !store.delete_timetable_entry(batch_id, entry_id).await? {
        return Err(AppError::not_found("Timetable entry"));
    }
    Ok(HttpResponse::Ok().json(json!({ "success": true, "message": "Timetable entry deleted" })))
}
