use axum::{
    body::Body,
    extract::State,
    http::{HeaderValue, Request},
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

use crate::{
    app::AppState,
    ops::notify::{self, Severity},
};

#[derive(Debug, Clone)]
pub struct TraceId(pub String);

pub async fn assign_trace_id(mut req: Request<Body>, next: Next) -> Response {
    let trace_id = Uuid::new_v4().to_string();
    req.extensions_mut().insert(TraceId(trace_id.clone()));
    let mut res = next.run(req).await;
    if let Ok(value) = HeaderValue::from_str(&trace_id) {
        res.headers_mut().insert("X-Trace-Id", value);
    }
    res
}

/// Leave a coordinator-visible notification for every 5xx response.
pub async fn report_internal_errors(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let path = req.uri().path().to_string();
    let method = req.method().to_string();
    let trace_id = req
        .extensions()
        .get::<TraceId>()
        .map(|t| t.0.clone())
        .unwrap_or_default();

    let res = next.run(req).await;
    if res.status().is_server_error() {
        let message = format!("{} on {method} {path} (trace {trace_id})", res.status());
        if let Err(err) = notify::emit(
            &state.pool,
            &state.notifications,
            "Internal server error",
            &message,
            Severity::Error,
            None,
        )
        .await
        {
            tracing::warn!(error = %err, "failed to record internal error notification");
        }
    }
    res
}
