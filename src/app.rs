use std::{sync::Arc, time::Duration};

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use sqlx::{postgres::PgPoolOptions, PgPool};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{
    api, auth,
    config::AppConfig,
    middleware as app_middleware,
    ops::notify::NotificationHub,
    repo,
    service::verification::Collaborators,
    util::mailer::HttpMailer,
};

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub sessions: auth::SessionManager,
    pub mailer: Arc<HttpMailer>,
    pub notifications: NotificationHub,
}

impl AppState {
    pub fn collaborators(&self) -> Collaborators<'_> {
        Collaborators {
            pool: &self.pool,
            mailer: &self.mailer,
            hub: &self.notifications,
        }
    }
}

pub async fn build_router(config: &AppConfig) -> anyhow::Result<Router> {
    let pool = PgPoolOptions::new()
        .max_connections(config.db.max_connections)
        .acquire_timeout(Duration::from_secs(5))
        .connect(&config.db.url)
        .await?;

    repo::migrations::ensure_schema(&pool).await?;

    let mailer = Arc::new(HttpMailer::new(&config.mail)?);
    if !mailer.is_configured() {
        tracing::warn!("mail endpoint not configured, duplicate alerts will not be emailed");
    }

    let sessions = auth::SessionManager::new(
        config.coordinator.username.clone(),
        config.coordinator.password.clone(),
        config.coordinator.id,
        config.analysis.default_threshold,
        Duration::from_secs(std::cmp::max(60_u64, config.coordinator.session_ttl_secs)),
    );

    let state = AppState {
        pool,
        sessions,
        mailer,
        notifications: NotificationHub::new(64),
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);
    let layers = ServiceBuilder::new()
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    let coordinator_api = Router::new()
        .route("/titles/overview", get(api::titles::overview))
        .route("/titles/export", get(api::titles::export))
        .route("/titles/:id/verify", post(api::titles::verify))
        .route(
            "/titles/:id/report-duplicate",
            post(api::titles::report_duplicate),
        )
        .route(
            "/titles/:id/verification",
            get(api::titles::verification_status),
        )
        .route(
            "/settings/threshold",
            get(api::settings::get_threshold).post(api::settings::update_threshold),
        )
        .route(
            "/notifications",
            get(api::notifications::list_notifications),
        )
        .route(
            "/notifications/stream",
            get(api::notifications::stream_notifications),
        )
        .route(
            "/notifications/:id/read",
            post(api::notifications::mark_read),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_coordinator,
        ))
        .with_state(state.clone());

    let router = Router::new()
        .route("/healthz", get(api::health::health_check))
        .route("/auth/login", post(api::auth::login))
        .route("/auth/logout", post(api::auth::logout))
        .nest("/api", coordinator_api)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            app_middleware::report_internal_errors,
        ))
        .layer(middleware::from_fn(app_middleware::assign_trace_id))
        .layer(layers)
        .with_state(state);

    Ok(router)
}
