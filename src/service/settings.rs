use crate::{
    auth::SessionManager,
    error::{AppError, AppResult},
    model::{Threshold, ThresholdOut},
};

/// Validate `raw` and store it as the threshold of the session behind `token`.
pub async fn set_threshold(
    sessions: &SessionManager,
    token: &str,
    raw: i64,
) -> AppResult<ThresholdOut> {
    let threshold = Threshold::new(raw)?;

    if !sessions.set_threshold(token, threshold).await {
        return Err(AppError::Unauthorized("session expired".into()));
    }

    tracing::info!(threshold = threshold.value(), "similarity threshold updated");
    Ok(ThresholdOut { threshold })
}

/// Threshold for one analysis run: an explicit override wins over the session value.
pub fn effective_threshold(session: Threshold, requested: Option<i64>) -> AppResult<Threshold> {
    match requested {
        Some(raw) => Ok(Threshold::new(raw)?),
        None => Ok(session),
    }
}
