use axum::{
    extract::{Path, Query, State},
    http::header,
    response::IntoResponse,
    Extension, Json,
};

use crate::{
    app::AppState,
    auth::CoordinatorIdentity,
    error::{AppError, AppResult},
    model::{
        OverviewQuery, OverviewResp, ReportDuplicateOut, ReportDuplicatePayload, VerificationOut,
        VerifyPayload,
    },
    repo,
    service::{
        self,
        verification::{ReportDuplicateCommand, VerifyCommand},
    },
};

pub async fn overview(
    State(state): State<AppState>,
    Extension(identity): Extension<CoordinatorIdentity>,
    Query(query): Query<OverviewQuery>,
) -> AppResult<Json<OverviewResp>> {
    let threshold =
        service::settings::effective_threshold(identity.threshold, query.threshold)?;
    let overview = service::analysis::overview(&state.pool, threshold).await?;
    Ok(Json(overview))
}

pub async fn export(
    State(state): State<AppState>,
    Extension(identity): Extension<CoordinatorIdentity>,
    Query(query): Query<OverviewQuery>,
) -> AppResult<impl IntoResponse> {
    let threshold =
        service::settings::effective_threshold(identity.threshold, query.threshold)?;
    let csv = service::report::export(&state.pool, threshold).await?;

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"thesis-title-duplicates.csv\"",
            ),
        ],
        csv,
    ))
}

pub async fn verify(
    State(state): State<AppState>,
    Extension(identity): Extension<CoordinatorIdentity>,
    Path(id): Path<i64>,
    payload: Option<Json<VerifyPayload>>,
) -> AppResult<Json<VerificationOut>> {
    if repo::titles::get_title(&state.pool, id).await?.is_none() {
        return Err(AppError::NotFound(format!("thesis {id} not found")));
    }

    let payload = payload.map(|Json(p)| p).unwrap_or_default();
    let record = service::verification::verify_unique(
        &state.collaborators(),
        VerifyCommand {
            thesis_id: id,
            coordinator_id: identity.coordinator_id,
            notes: payload.notes,
        },
    )
    .await?;

    Ok(Json(VerificationOut { ok: true, record }))
}

pub async fn report_duplicate(
    State(state): State<AppState>,
    Extension(identity): Extension<CoordinatorIdentity>,
    Path(id): Path<i64>,
    Json(payload): Json<ReportDuplicatePayload>,
) -> AppResult<Json<ReportDuplicateOut>> {
    let title = repo::titles::get_title(&state.pool, id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("thesis {id} not found")))?;

    let advisor_id = payload
        .advisor_id
        .or(title.advisor_id)
        .ok_or_else(|| AppError::BadRequest(format!("thesis {id} has no advisor assigned")))?;

    let outcome = service::verification::report_duplicate(
        &state.collaborators(),
        ReportDuplicateCommand {
            thesis_id: id,
            thesis_title: title.thesis_title,
            group_name: title.group_name,
            advisor_id,
            coordinator_id: identity.coordinator_id,
            reason: payload.reason,
            evidence: payload.evidence,
        },
    )
    .await?;

    Ok(Json(ReportDuplicateOut {
        ok: true,
        email_sent: outcome.email_sent,
        record: outcome.record,
    }))
}

pub async fn verification_status(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<serde_json::Value>> {
    let record = repo::verifications::get_verification(&state.pool, id).await?;
    Ok(Json(serde_json::json!({ "thesis_id": id, "record": record })))
}
