use axum::{extract::State, Json};

use crate::{app::AppState, auth, error::AppResult, model};

pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<model::LoginPayload>,
) -> AppResult<Json<model::LoginResponse>> {
    if !state
        .sessions
        .verify_credentials(&payload.username, &payload.password)
    {
        tracing::warn!(username = payload.username, "coordinator login rejected");
        return Err(auth::invalid_credentials_error());
    }

    let token = state.sessions.issue_session().await;
    tracing::info!(username = payload.username, "coordinator logged in");

    Ok(Json(model::LoginResponse {
        token,
        expires_in: state.sessions.ttl_secs(),
    }))
}

pub async fn logout(
    State(state): State<AppState>,
    Json(payload): Json<model::LogoutPayload>,
) -> AppResult<Json<serde_json::Value>> {
    state.sessions.revoke_session(&payload.token).await;
    Ok(Json(serde_json::json!({ "ok": true })))
}
