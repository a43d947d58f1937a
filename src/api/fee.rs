use actix_web::{HttpResponse, web};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    auth::auth::AuthUser,
    error::{AppError, AppResult},
    model::fee::{FeeChanges, FeeInput, FeeStatus},
    store::ClassroomStore,
    utils::batch_owner_cache::BatchOwnerCache,
};

#[derive(Debug, Deserialize, Serialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
#[schema(example = json!({
    "studentId": 11,
    "amount": 1500.0,
    "method": "upi",
    "status": "pending",
    "dueDate": "2024-01-31"
}))]
pub struct SaveFee {
    pub student_id: u64,
    #[validate(range(min = 0.0, message = "must not be negative"))]
    pub amount: f64,
    pub method: Option<String>,
    #[serde(default)]
    pub status: FeeStatus,
    #[schema(value_type = Option<String>)]
    pub due_date: Option<NaiveDate>,
    #[schema(value_type = Option<String>)]
    pub paid_on: Option<NaiveDate>,
}

#[derive(Debug, Default, Deserialize, Serialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateFee {
    #[validate(range(min = 0.0, message = "must not be negative"))]
    pub amount: Option<f64>,
    pub method: Option<String>,
    pub status: Option<FeeStatus>,
    #[schema(value_type = Option<String>)]
    pub due_date: Option<NaiveDate>,
    #[schema(value_type = Option<String>)]
    pub paid_on: Option<NaiveDate>,
}

fn clean_method(method: Option<String>) -> Option<String> {
    method
        .map(|m| m.trim().to_string())
        .filter(|m| !m.is_empty())
}

/// Fee records of a batch
#[utoipa::path(
    get,
    path = "/admin/batches/{batch_id}/fees",
    params(("batch_id", Path, description = "Batch ID")),
    responses(
        (status = 200, description = "Fee records", body = Object),
        (status = 404, description = "Batch not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Fees"
)]
pub async fn list_fees(
    auth: AuthUser,
    store: web::Data<dyn ClassroomStore>,
    owners: web::Data<BatchOwnerCache>,
    path: web::Path<u64>,
) -> AppResult<HttpResponse> {
    let batch_id = path.into_inner();
    owners.ensure_owner(store.get_ref(), &auth, batch_id).await?;

    let fees = store.list_fees(batch_id).await?;
    Ok(HttpResponse::Ok().json(json!({ "success": true, "fees": fees })))
}

/// Create or replace a student's fee record
#[utoipa::path(
    post,
    path = "/admin/batches/{batch_id}/fees",
    params(("batch_id", Path, description = "Batch ID")),
    request_body = SaveFee,
    responses(
        (status = 200, description = "Fee record saved", body = crate::model::fee::FeeRecord),
        (status = 400, description = "Invalid amount or student outside the batch"),
        (status = 404, description = "Batch not found"),
        (status = 409, description = "Paid fees cannot be reopened")
    ),
    security(("bearer_auth" = [])),
    tag = "Fees"
)]
pub async fn save_fee(
    auth: AuthUser,
    store: web::Data<dyn ClassroomStore>,
    owners: web::Data<BatchOwnerCache>,
    path: web::Path<u64>,
    payload: web::Json<SaveFee>,
) -> AppResult<HttpResponse> {
    let batch_id = path.into_inner();
    owners.ensure_owner(store.get_ref(), &auth, batch_id).await?;
    payload.validate()?;

    let payload = payload.into_inner();
    if !store.is_enrolled(batch_id, payload.student_id).await? {
        return Err(AppError::BadRequest(format!(
            "Student {} is not enrolled in this batch",
            payload.student_id
        )));
    }

    if let Some(existing) = store.fee_for_student(batch_id, payload.student_id).await? {
        if !existing.status.can_become(payload.status) {
            return Err(AppError::Conflict(format!(
                "Fee status cannot change from {} to {}",
                existing.status, payload.status
            )));
        }
    }

    let input = FeeInput {
        student_id: payload.student_id,
        amount: payload.amount,
        method: clean_method(payload.method),
        status: payload.status,
        due_date: payload.due_date,
        paid_on: payload.paid_on,
    }
    .stamp_paid(Utc::now().date_naive());

    let fee = store.upsert_fee(batch_id, input).await?;

    info!(batch_id, fee_id = fee.id, status = %fee.status, "Fee saved");
    Ok(HttpResponse::Ok().json(json!({ "success": true, "fee": fee })))
}

/// Update a fee record
#[utoipa::path(
    put,
    path = "/admin/batches/{batch_id}/fees/{fee_id}",
    params(
        ("batch_id", Path, description = "Batch ID"),
        ("fee_id", Path, description = "Fee record ID")
    ),
    request_body = UpdateFee,
    responses(
        (status = 200, description = "Fee record updated", body = crate::model::fee::FeeRecord),
        (status = 404, description = "Batch or fee record not found"),
        (status = 409, description = "Illegal status transition", body = Object, example = json!({
            "success": false, "error": "Fee status cannot change from paid to pending"
        }))
    ),
    security(("bearer_auth" = [])),
    tag = "Fees"
)]
pub async fn update_fee(
    auth: AuthUser,
    store: web::Data<dyn ClassroomStore>,
    owners: web::Data<BatchOwnerCache>,
    path: web::Path<(u64, u64)>,
    payload: web::Json<UpdateFee>,
) -> AppResult<HttpResponse> {
    let (batch_id, fee_id) = path.into_inner();
    owners.ensure_owner(store.get_ref(), &auth, batch_id).await?;
    payload.validate()?;

    let payload = payload.into_inner();
    let current = store
        .get_fee(batch_id, fee_id)
        .await?
        .ok_or_else(|| AppError::not_found("Fee record"))?;

    let changes = FeeChanges {
        amount: payload.amount,
        method: clean_method(payload.method),
        status: payload.status,
        due_date: payload.due_date,
        paid_on: payload.paid_on,
    };
    let next = current
        .apply(&changes, Utc::now().date_naive())
        .map_err(AppError::Conflict)?;

    let fee = store
        .update_fee(batch_id, fee_id, next)
        .await?
        .ok_or_else(|| AppError::not_found("Fee record"))?;

    info!(batch_id, fee_id, status = %fee.status, "Fee updated");
    Ok(HttpResponse::Ok().json(json!({ "success": true, "fee": fee })))
}

/// Delete a fee record
#[utoipa::path(
    delete,
    path = "/admin/batches/{batch_id}/fees/{fee_id}",
    params(
        ("batch_id", Path, description = "Batch ID"),
        ("fee_id", Path, description = "Fee record ID")
    ),
    responses(
        (status = 200, description = "Fee record deleted", body = Object),
        (status = 404, description = "Batch or fee record not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Fees"
)]
pub async fn delete_fee(
    auth: AuthUser,
    store: web::Data<dyn ClassroomStore>,
    owners: web::Data<BatchOwnerCache>,
    path: web::Path<(u64, u64)>,
) -> AppResult<HttpResponse> {
    let (batch_id, fee_id) = path.into_inner();
    owners.ensure_owner(store.get_ref(), &auth, batch_id).await?;

    if !store.delete_fee(batch_id, fee_id).await? {
        return Err(AppError::not_found("Fee record"));
    }
    Ok(HttpResponse::Ok().json(json!({ "success": true, "message": "Fee record deleted" })))
}
