use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};

use murmur_types::api::{MessageResponse, NotificationResponse};

use crate::error::ApiError;
use crate::middleware::CurrentUser;
use crate::{AppState, responses, run_blocking, validation};

/// The caller's notifications, newest first. Everything listed is marked read
/// afterwards; the response still shows the state before marking.
pub async fn get_notifications(
    State(state): State<AppState>,
    Extension(CurrentUser(me)): Extension<CurrentUser>,
) -> Result<impl IntoResponse, ApiError> {
    let rows = run_blocking(&state, move |db| {
        let rows = db.list_notifications(&me.id)?;
        db.mark_notifications_read(&me.id)?;
        Ok(rows)
    })
    .await?;

    let notifications: Vec<NotificationResponse> =
        rows.into_iter().map(responses::notification_response).collect();

    Ok(Json(notifications))
}

pub async fn delete_notifications(
    State(state): State<AppState>,
    Extension(CurrentUser(me)): Extension<CurrentUser>,
) -> Result<impl IntoResponse, ApiError> {
    run_blocking(&state, move |db| db.delete_notifications(&me.id)).await?;
    Ok(Json(MessageResponse::new("Notifications deleted successfully")))
}

pub async fn delete_notification(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Extension(CurrentUser(me)): Extension<CurrentUser>,
) -> Result<impl IntoResponse, ApiError> {
    let notification_id = validation::id(&id)?;

    let nid = notification_id.clone();
    let notification = run_blocking(&state, move |db| db.get_notification(&nid))
        .await?
        .ok_or(ApiError::NotificationNotFound)?;

    if notification.to_id != me.id {
        return Err(ApiError::NotNotificationOwner);
    }

    run_blocking(&state, move |db| db.delete_notification(&notification_id)).await?;
    Ok(Json(MessageResponse::new("Notification deleted successfully")))
}
