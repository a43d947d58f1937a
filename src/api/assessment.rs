use actix_web::{HttpResponse, web};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    api::enrolled_ids,
    auth::auth::AuthUser,
    error::{AppError, AppResult},
    model::assessment::{NewTest, TestChanges, TestScore, check_scores},
    store::ClassroomStore,
    utils::batch_owner_cache::BatchOwnerCache,
};

#[derive(Debug, Deserialize, Serialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
#[schema(example = json!({
    "name": "Unit test 1",
    "maxMarks": 50.0,
    "date": "2024-02-01",
    "scores": [{"studentId": 11, "marks": 42.5}]
}))]
pub struct CreateTest {
    #[validate(length(min = 1, max = 128, message = "must be 1 to 128 characters"))]
    pub name: String,
    pub max_marks: f64,
    #[schema(value_type = String)]
    pub date: NaiveDate,
    #[serde(default)]
    pub scores: Vec<TestScore>,
}

#[derive(Debug, Default, Deserialize, Serialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTest {
    #[validate(length(min = 1, max = 128, message = "must be 1 to 128 characters"))]
    pub name: Option<String>,
    pub max_marks: Option<f64>,
    #[schema(value_type = Option<String>)]
    pub date: Option<NaiveDate>,
    /// Replaces the whole score sheet
    pub scores: Option<Vec<TestScore>>,
}

impl CreateTest {
    fn trimmed(self) -> Self {
        Self {
            name: self.name.trim().to_string(),
            ..self
        }
    }
}

impl UpdateTest {
    fn trimmed(self) -> Self {
        Self {
            name: self.name.map(|n| n.trim().to_string()),
            ..self
        }
    }
}

/// Tests of a batch
#[utoipa::path(
    get,
    path = "/admin/batches/{batch_id}/tests",
    params(("batch_id", Path, description = "Batch ID")),
    responses(
        (status = 200, description = "Tests, newest first", body = Object),
        (status = 404, description = "Batch not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Tests"
)]
pub async fn list_tests(
    auth: AuthUser,
    store: web::Data<dyn ClassroomStore>,
    owners: web::Data<BatchOwnerCache>,
    path: web::Path<u64>,
) -> AppResult<HttpResponse> {
    let batch_id = path.into_inner();
    owners.ensure_owner(store.get_ref(), &auth, batch_id).await?;

    let tests = store.list_tests(batch_id).await?;
    Ok(HttpResponse::Ok().json(json!({ "success": true, "tests": tests })))
}

/// Record a test
#[utoipa::path(
    post,
    path = "/admin/batches/{batch_id}/tests",
    params(("batch_id", Path, description = "Batch ID")),
    request_body = CreateTest,
    responses(
        (status = 201, description = "Test created", body = crate::model::assessment::Test),
        (status = 400, description = "Invalid marks or student outside the batch"),
        (status = 404, description = "Batch not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Tests"
)]
pub async fn create_test(
    auth: AuthUser,
    store: web::Data<dyn ClassroomStore>,
    owners: web::Data<BatchOwnerCache>,
    path: web::Path<u64>,
    payload: web::Json<CreateTest>,
) -> AppResult<HttpResponse> {
    let batch_id = path.into_inner();
    owners.ensure_owner(store.get_ref(), &auth, batch_id).await?;
    let payload = payload.into_inner().trimmed();
    payload.validate()?;

    let enrolled = enrolled_ids(store.get_ref(), batch_id).await?;
    check_scores(&payload.scores, payload.max_marks, &enrolled).map_err(AppError::BadRequest)?;

    let test = store
        .create_test(
            batch_id,
            NewTest {
                name: payload.name,
                max_marks: payload.max_marks,
                date: payload.date,
                scores: payload.scores,
            },
        )
        .await?;

    info!(batch_id, test_id = test.id, "Test recorded");
    Ok(HttpResponse::Created().json(json!({ "success": true, "test": test })))
}

/// Update a test
#[utoipa::path(
    put,
    path = "/admin/batches/{batch_id}/tests/{test_id}",
    params(
        ("batch_id", Path, description = "Batch ID"),
        ("test_id", Path, description = "Test ID")
    ),
    request_body = UpdateTest,
    responses(
        (status = 200, description = "Test updated", body = crate::model::assessment::Test),
        (status = 400, description = "Invalid marks or nothing to update"),
        (status = 404, description = "Batch or test not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Tests"
)]
pub async fn update_test(
    auth: AuthUser,
    store: web::Data<dyn ClassroomStore>,
    owners: web::Data<BatchOwnerCache>,
    path: web::Path<(u64, u64)>,
    payload: web::Json<UpdateTest>,
) -> AppResult<HttpResponse> {
    let (batch_id, test_id) = path.into_inner();
    owners.ensure_owner(store.get_ref(), &auth, batch_id).await?;
    let payload = payload.into_inner().trimmed();
    payload.validate()?;

    if payload.name.is_none()
        && payload.max_marks.is_none()
        && payload.date.is_none()
        && payload.scores.is_none()
    {
        return Err(AppError::BadRequest("No fields provided for update".into()));
    }

    let current = store
        .get_test(batch_id, test_id)
        .await?
        .ok_or_else(|| AppError::not_found("Test"))?;

    // lowering maxMarks must still fit the scores that stay
    let max_marks = payload.max_marks.unwrap_or(current.max_marks);
    let scores = payload.scores.as_deref().unwrap_or(&current.scores);
    let enrolled = enrolled_ids(store.get_ref(), batch_id).await?;
    check_scores(scores, max_marks, &enrolled).map_err(AppError::BadRequest)?;

    let changes = TestChanges {
        name: payload.name,
        max_marks: payload.max_marks,
        date: payload.date,
        scores: payload.scores,
    };
    let test = store
        .update_test(batch_id, test_id, changes)
        .await?
        .ok_or_else(|| AppError::not_found("Test"))?;

    Ok(HttpResponse::Ok().json(json!({ "success": true, "test": test })))
}

/// Delete a test
#[utoipa::path(
    delete,
    path = "/admin/batches/{batch_id}/tests/{test_id}",
    params(
        ("batch_id", Path, description = "Batch ID"),
        ("test_id", Path, description = "Test ID")
    ),
    responses(
        (status = 200, description = "Test deleted", body = Object),
        (status = 404, description = "Batch or test not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Tests"
)]
pub async fn delete_test(
    auth: AuthUser,
    store: web::Data<dyn ClassroomStore>,
    owners: web::Data<BatchOwnerCache>,
    path: web::Path<(u64, u64)>,
) -> AppResult<HttpResponse> {
    let (batch_id, test_id) = path.into_inner();
    owners.ensure_owner(store.get_ref(), &auth, batch_id).await?;

    if !store.delete_test(batch_id, test_id).await? {
        return Err(AppError::not_found("Test"));
    }
    Ok(HttpResponse::Ok().json(json!({ "success": true, "message": "Test deleted" })))
}
