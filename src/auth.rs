use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};

use axum::{
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{app::AppState, error::AppError, model::Threshold};

struct Session {
    coordinator_id: i64,
    threshold: Threshold,
    expires_at: Instant,
}

/// In-memory coordinator sessions. Each session keeps its own similarity
/// threshold, so two coordinators may analyze with different settings.
#[derive(Clone)]
pub struct SessionManager {
    username: Arc<str>,
    password: Arc<str>,
    coordinator_id: i64,
    default_threshold: Threshold,
    session_ttl: Duration,
    sessions: Arc<RwLock<HashMap<String, Session>>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Valid(CoordinatorIdentity),
    Expired,
    Invalid,
}

/// Inserted into request extensions by [`require_coordinator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoordinatorIdentity {
    pub coordinator_id: i64,
    pub threshold: Threshold,
}

/// Bearer token of the current request.
#[derive(Debug, Clone)]
pub struct SessionToken(pub String);

impl SessionManager {
    pub fn new(
        username: String,
        password: String,
        coordinator_id: i64,
        default_threshold: Threshold,
        session_ttl: Duration,
    ) -> Self {
        let ttl = if session_ttl.is_zero() {
            Duration::from_secs(300)
        } else {
            session_ttl
        };

        Self {
            username: Arc::from(username.trim().to_string()),
            password: Arc::from(password),
            coordinator_id,
            default_threshold,
            session_ttl: ttl,
            sessions: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn verify_credentials(&self, username: &str, password: &str) -> bool {
        username == self.username.as_ref() && password == self.password.as_ref()
    }

    pub fn ttl_secs(&self) -> u64 {
        self.session_ttl.as_secs()
    }

    pub async fn issue_session(&self) -> String {
        self.prune_expired().await;
        let token = Uuid::new_v4().to_string();
        let session = Session {
            coordinator_id: self.coordinator_id,
            threshold: self.default_threshold,
            expires_at: Instant::now() + self.session_ttl,
        };
        self.sessions.write().await.insert(token.clone(), session);
        token
    }

    pub async fn validate_session(&self, token: &str) -> SessionStatus {
        let mut guard = self.sessions.write().await;
        let now = Instant::now();
        if let Some(session) = guard.get_mut(token) {
            if session.expires_at > now {
                session.expires_at = now + self.session_ttl;
                return SessionStatus::Valid(CoordinatorIdentity {
                    coordinator_id: session.coordinator_id,
                    threshold: session.threshold,
                });
            }
            guard.remove(token);
            return SessionStatus::Expired;
        }
        SessionStatus::Invalid
    }

    /// Store a new threshold on the session. Returns `false` for unknown tokens.
    pub async fn set_threshold(&self, token: &str, threshold: Threshold) -> bool {
        match self.sessions.write().await.get_mut(token) {
            Some(session) => {
                session.threshold = threshold;
                true
            }
            None => false,
        }
    }

    pub async fn revoke_session(&self, token: &str) {
        self.sessions.write().await.remove(token);
    }

    async fn prune_expired(&self) {
        let now = Instant::now();
        self.sessions
            .write()
            .await
            .retain(|_, session| session.expires_at > now);
    }
}

pub async fn require_coordinator(
    axum::extract::State(state): axum::extract::State<AppState>,
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    let token = extract_bearer(req.headers())
        .or_else(|| {
            // EventSource cannot set headers, so SSE clients pass `token` in the query
            req.uri().query().and_then(|q| {
                form_urlencoded::parse(q.as_bytes())
                    .find(|(k, _)| k == "token")
                    .map(|(_, v)| v.trim().to_string())
                    .filter(|v| !v.is_empty())
            })
        })
        .ok_or(StatusCode::UNAUTHORIZED)?;

    match state.sessions.validate_session(&token).await {
        SessionStatus::Valid(identity) => {
            req.extensions_mut().insert(identity);
            req.extensions_mut().insert(SessionToken(token));
            Ok(next.run(req).await)
        }
        SessionStatus::Expired => {
            tracing::info!("coordinator session expired");
            Err(StatusCode::UNAUTHORIZED)
        }
        SessionStatus::Invalid => Err(StatusCode::UNAUTHORIZED),
    }
}

fn extract_bearer(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(header::AUTHORIZATION)?;
    let raw = value.to_str().ok()?;
    let token = raw
        .strip_prefix("Bearer ")
        .or_else(|| raw.strip_prefix("bearer "))?;
    if token.trim().is_empty() {
        None
    } else {
        Some(token.trim().to_string())
    }
}

pub fn invalid_credentials_error() -> AppError {
    AppError::Unauthorized("invalid username or password".to_string())
}
