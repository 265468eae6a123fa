use axum::{
    extract::{Path, Query, State},
    response::sse::{Event, Sse},
    Json,
};

use crate::{
    app::AppState,
    error::{AppError, AppResult},
    ops::notify,
    repo::notifications::{self as repo_notifications, ListParams, NotificationRecord},
};

pub async fn list_notifications(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> AppResult<Json<Vec<NotificationRecord>>> {
    let items = repo_notifications::list_notifications(&state.pool, &params).await?;
    Ok(Json(items))
}

pub async fn mark_read(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<serde_json::Value>> {
    if repo_notifications::mark_read(&state.pool, id).await? == 0 {
        return Err(AppError::NotFound(format!("notification {id} not found")));
    }
    Ok(Json(serde_json::json!({ "ok": true })))
}

pub async fn stream_notifications(
    State(state): State<AppState>,
) -> Sse<impl futures::Stream<Item = Result<Event, std::convert::Infallible>>> {
    notify::sse_response(&state.notifications)
}
