use axum::{extract::State, Extension, Json};

use crate::{
    app::AppState,
    auth::{CoordinatorIdentity, SessionToken},
    error::AppResult,
    model::{ThresholdOut, ThresholdPayload},
    service,
};

pub async fn get_threshold(
    Extension(identity): Extension<CoordinatorIdentity>,
) -> Json<ThresholdOut> {
    Json(ThresholdOut {
        threshold: identity.threshold,
    })
}

pub async fn update_threshold(
    State(state): State<AppState>,
    Extension(token): Extension<SessionToken>,
    Json(payload): Json<ThresholdPayload>,
) -> AppResult<Json<ThresholdOut>> {
    let out = service::settings::set_threshold(&state.sessions, &token.0, payload.threshold).await?;
    Ok(Json(out))
}
