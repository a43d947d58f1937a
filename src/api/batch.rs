use actix_web::{HttpResponse, web};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::{
    auth::auth::AuthUser,
    error::{AppError, AppResult},
    model::{
        batch::{BatchChanges, BatchDetail, NewBatch},
        role::Role,
    },
    store::ClassroomStore,
    utils::batch_owner_cache::BatchOwnerCache,
};

#[derive(Debug, Deserialize, Serialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateBatch {
    #[validate(length(min = 1, max = 128, message = "must be 1 to 128 characters"))]
    #[schema(example = "Grade 10 - Evening")]
    pub name: String,
    #[validate(length(min = 1, max = 128, message = "must be 1 to 128 characters"))]
    #[schema(example = "Mathematics")]
    pub subject: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Default, Deserialize, Serialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateBatch {
    #[validate(length(min = 1, max = 128, message = "must be 1 to 128 characters"))]
    pub name: Option<String>,
    #[validate(length(min = 1, max = 128, message = "must be 1 to 128 characters"))]
    pub subject: Option<String>,
    pub description: Option<String>,
}

impl CreateBatch {
    fn trimmed(self) -> Self {
        Self {
            name: self.name.trim().to_string(),
            subject: self.subject.trim().to_string(),
            description: self
                .description
                .map(|d| d.trim().to_string())
                .filter(|d| !d.is_empty()),
        }
    }
}

impl UpdateBatch {
    fn trimmed(self) -> Self {
        Self {
            name: self.name.map(|n| n.trim().to_string()),
            subject: self.subject.map(|s| s.trim().to_string()),
            description: self.description.map(|d| d.trim().to_string()),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EnrollStudent {
    pub student_id: u64,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct StudentQuery {
    /// Matches name, email or username
    pub search: Option<String>,
}

/// List student accounts
#[utoipa::path(
    get,
    path = "/admin/students",
    params(StudentQuery),
    responses(
        (status = 200, description = "Student accounts", body = Object, example = json!({
            "success": true,
            "students": [{"id": 11, "name": "Ravi", "email": "ravi@example.com"}]
        })),
        (status = 403, description = "Teacher only")
    ),
    security(("bearer_auth" = [])),
    tag = "Batches"
)]
pub async fn list_students(
    auth: AuthUser,
    store: web::Data<dyn ClassroomStore>,
    query: web::Query<StudentQuery>,
) -> AppResult<HttpResponse> {
    auth.require_teacher()?;

    let search = query
        .search
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty());
    let students = store.list_students(search).await?;

    Ok(HttpResponse::Ok().json(json!({ "success": true, "students": students })))
}

/// List the caller's batches
#[utoipa::path(
    get,
    path = "/admin/batches",
    responses(
        (status = 200, description = "Batches owned by the teacher", body = Object),
        (status = 403, description = "Teacher only")
    ),
    security(("bearer_auth" = [])),
    tag = "Batches"
)]
pub async fn list_batches(
    auth: AuthUser,
    store: web::Data<dyn ClassroomStore>,
) -> AppResult<HttpResponse> {
    auth.require_teacher()?;

    let batches = store.list_batches_for_teacher(auth.user_id).await?;
    Ok(HttpResponse::Ok().json(json!({ "success": true, "batches": batches })))
}

/// Create a batch
#[utoipa::path(
    post,
    path = "/admin/batches",
    request_body = CreateBatch,
    responses(
        (status = 201, description = "Batch created", body = Object),
        (status = 400, description = "Validation failed"),
        (status = 403, description = "Teacher only")
    ),
    security(("bearer_auth" = [])),
    tag = "Batches"
)]
pub async fn create_batch(
    auth: AuthUser,
    store: web::Data<dyn ClassroomStore>,
    owners: web::Data<BatchOwnerCache>,
    payload: web::Json<CreateBatch>,
) -> AppResult<HttpResponse> {
    auth.require_teacher()?;
    let payload = payload.into_inner().trimmed();
    payload.validate()?;

    let batch = store
        .create_batch(NewBatch {
            teacher_id: auth.user_id,
            name: payload.name,
            subject: payload.subject,
            description: payload.description,
        })
        .await?;
    owners.remember(batch.id, batch.teacher_id).await;

    info!(batch_id = batch.id, teacher_id = auth.user_id, "Batch created");
    Ok(HttpResponse::Created().json(json!({ "success": true, "batch": batch })))
}

/// Batch with its roster
#[utoipa::path(
    get,
    path = "/admin/batches/{batch_id}",
    params(("batch_id", Path, description = "Batch ID")),
    responses(
        (status = 200, description = "Batch detail", body = BatchDetail),
        (status = 404, description = "Batch not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Batches"
)]
pub async fn get_batch(
    auth: AuthUser,
    store: web::Data<dyn ClassroomStore>,
    owners: web::Data<BatchOwnerCache>,
    path: web::Path<u64>,
) -> AppResult<HttpResponse> {
    let batch_id = path.into_inner();
    owners.ensure_owner(store.get_ref(), &auth, batch_id).await?;

    let batch = store
        .get_batch(batch_id)
        .await?
        .ok_or_else(|| AppError::not_found("Batch"))?;
    let students = store.batch_students(batch_id).await?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "batch": BatchDetail { batch, students },
    })))
}

/// Update a batch
#[utoipa::path(
    put,
    path = "/admin/batches/{batch_id}",
    params(("batch_id", Path, description = "Batch ID")),
    request_body = UpdateBatch,
    responses(
        (status = 200, description = "Batch updated", body = Object),
        (status = 400, description = "Nothing to update or invalid field"),
        (status = 404, description = "Batch not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Batches"
)]
pub async fn update_batch(
    auth: AuthUser,
    store: web::Data<dyn ClassroomStore>,
    owners: web::Data<BatchOwnerCache>,
    path: web::Path<u64>,
    payload: web::Json<UpdateBatch>,
) -> AppResult<HttpResponse> {
    let batch_id = path.into_inner();
    owners.ensure_owner(store.get_ref(), &auth, batch_id).await?;
    let payload = payload.into_inner().trimmed();
    payload.validate()?;

    let changes = BatchChanges {
        name: payload.name,
        subject: payload.subject,
        description: payload.description,
    };
    if changes.is_empty() {
        return Err(AppError::BadRequest("No fields provided for update".into()));
    }

    let batch = store
        .update_batch(batch_id, changes)
        .await?
        .ok_or_else(|| AppError::not_found("Batch"))?;

    Ok(HttpResponse::Ok().json(json!({ "success": true, "batch": batch })))
}

/// Delete a batch and everything recorded under it
#[utoipa::path(
    delete,
    path = "/admin/batches/{batch_id}",
    params(("batch_id", Path, description = "Batch ID")),
    responses(
        (status = 200, description = "Batch deleted", body = Object, example = json!({
            "success": true, "message": "Batch deleted"
        })),
        (status = 404, description = "Batch not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Batches"
)]
pub async fn delete_batch(
    auth: AuthUser,
    store: web::Data<dyn ClassroomStore>,
    owners: web::Data<BatchOwnerCache>,
    path: web::Path<u64>,
) -> AppResult<HttpResponse> {
    let batch_id = path.into_inner();
    owners.ensure_owner(store.get_ref(), &auth, batch_id).await?;

    if !store.delete_batch(batch_id).await? {
        return Err(AppError::not_found("Batch"));
    }
    owners.forget(batch_id).await;

    info!(batch_id, "Batch deleted");
    Ok(HttpResponse::Ok().json(json!({ "success": true, "message": "Batch deleted" })))
}

/// Enrol a student
#[utoipa::path(
    post,
    path = "/admin/batches/{batch_id}/students",
    params(("batch_id", Path, description = "Batch ID")),
    request_body = EnrollStudent,
    responses(
        (status = 201, description = "Student enrolled", body = Object),
        (status = 400, description = "No such student"),
        (status = 404, description = "Batch not found"),
        (status = 409, description = "Already enrolled")
    ),
    security(("bearer_auth" = [])),
    tag = "Batches"
)]
pub async fn enroll_student(
    auth: AuthUser,
    store: web::Data<dyn ClassroomStore>,
    owners: web::Data<BatchOwnerCache>,
    path: web::Path<u64>,
    payload: web::Json<EnrollStudent>,
) -> AppResult<HttpResponse> {
    let batch_id = path.into_inner();
    owners.ensure_owner(store.get_ref(), &auth, batch_id).await?;

    let student = match store.get_user(payload.student_id).await? {
        Some(user) if user.role == Role::Student => user,
        _ => return Err(AppError::BadRequest("studentId: no such student".into())),
    };

    store.enroll_student(batch_id, student.id).await?;
    let students = store.batch_students(batch_id).await?;

    Ok(HttpResponse::Created().json(json!({ "success": true, "students": students })))
}

/// Remove a student from a batch, dropping their records in it
#[utoipa::path(
    delete,
    path = "/admin/batches/{batch_id}/students/{student_id}",
    params(
        ("batch_id", Path, description = "Batch ID"),
        ("student_id", Path, description = "Student ID")
    ),
    responses(
        (status = 200, description = "Student removed", body = Object),
        (status = 404, description = "Batch or enrolment not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Batches"
)]
pub async fn remove_student(
    auth: AuthUser,
    store: web::Data<dyn ClassroomStore>,
    owners: web::Data<BatchOwnerCache>,
    path: web::Path<(u64, u64)>,
) -> AppResult<HttpResponse> {
    let (batch_id, student_id) = path.into_inner();
    owners.ensure_owner(store.get_ref(), &auth, batch_id).await?;

    if !store.remove_student(batch_id, student_id).await? {
        return Err(AppError::not_found("Enrolment"));
    }
    let students = store.batch_students(batch_id).await?;

    Ok(HttpResponse::Ok().json(json!({ "success": true, "students": students })))
}
