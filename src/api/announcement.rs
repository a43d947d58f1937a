use actix_web::{HttpResponse, web};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    auth::auth::AuthUser,
    error::{AppError, AppResult},
    model::announcement::NewAnnouncement,
    store::ClassroomStore,
    utils::batch_owner_cache::BatchOwnerCache,
};

#[derive(Debug, Deserialize, Serialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateAnnouncement {
    #[validate(length(min = 1, max = 200, message = "must be 1 to 200 characters"))]
    #[schema(example = "Test postponed")]
    pub title: String,
    #[validate(length(min = 1, message = "must not be empty"))]
    #[schema(example = "Friday's unit test moves to Monday.")]
    pub body: String,
}

/// Announcements of a batch, newest first
#[utoipa::path(
    get,
    path = "/admin/batches/{batch_id}/announcements",
    params(("batch_id", Path, description = "Batch ID")),
    responses(
        (status = 200, description = "Announcements", body = Object),
        (status = 404, description = "Batch not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Announcements"
)]
pub async fn list_announcements(
    auth: AuthUser,
    store: web::Data<dyn ClassroomStore>,
    owners: web::Data<BatchOwnerCache>,
    path: web::Path<u64>,
) -> AppResult<HttpResponse> {
    let batch_id = path.into_inner();
    owners.ensure_owner(store.get_ref(), &auth, batch_id).await?;

    let announcements = store.list_announcements(batch_id).await?;
    Ok(HttpResponse::Ok().json(json!({ "success": true, "announcements": announcements })))
}

/// Post an announcement
#[utoipa::path(
    post,
    path = "/admin/batches/{batch_id}/announcements",
    params(("batch_id", Path, description = "Batch ID")),
    request_body = CreateAnnouncement,
    responses(
        (status = 201, description = "Announcement posted", body = crate::model::announcement::Announcement),
        (status = 400, description = "Validation failed"),
        (status = 404, description = "Batch not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Announcements"
)]
pub async fn create_announcement(
    auth: AuthUser,
    store: web::Data<dyn ClassroomStore>,
    owners: web::Data<BatchOwnerCache>,
    path: web::Path<u64>,
    payload: web::Json<CreateAnnouncement>,
) -> AppResult<HttpResponse> {
    let batch_id = path.into_inner();
    owners.ensure_owner(store.get_ref(), &auth, batch_id).await?;

    let payload = payload.into_inner();
    let payload = CreateAnnouncement {
        title: payload.title.trim().to_string(),
        body: payload.body.trim().to_string(),
    };
    payload.validate()?;

    let announcement = store
        .create_announcement(
            batch_id,
            NewAnnouncement {
                title: payload.title,
                body: payload.body,
            },
        )
        .await?;

    info!(batch_id, announcement_id = announcement.id, "Announcement posted");
    Ok(HttpResponse::Created().json(json!({ "success": true, "announcement": announcement })))
}

/// Delete an announcement
#[utoipa::path(
    delete,
    path = "/admin/batches/{batch_id}/announcements/{announcement_id}",
    params(
        ("batch_id", Path, description = "Batch ID"),
        ("announcement_id", Path, description = "Announcement ID")
    ),
    responses(
        (status = 200, description = "Announcement deleted", body = Object),
        (status = 404, description = "Batch or announcement not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Announcements"
)]
pub async fn delete_announcement(
    auth: AuthUser,
    store: web::Data<dyn ClassroomStore>,
    owners: web::Data<BatchOwnerCache>,
    path: web::Path<(u64, u64)>,
) -> AppResult<HttpResponse> {
    let (batch_id, announcement_id) = path.into_inner();
    owners.ensure_owner(store.get_ref(), &auth, batch_id).await?;

    if !store.delete_announcement(batch_id, announcement_id).await? {
        return Err(AppError::not_found("Announcement"));
    }
    Ok(HttpResponse::Ok().json(json!({ "success": true, "message": "Announcement deleted" })))
}
