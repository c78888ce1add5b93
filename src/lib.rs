pub mod actions;
pub mod auth;
pub mod backend;
pub mod cache;
pub mod clock;
pub mod error;
pub mod handlers;
pub mod ical;
pub mod models;
pub mod openapi;
pub mod registration;
pub mod settings;
pub mod task_slot;
pub mod timestamp;
pub mod view_model;

#[cfg(test)]
mod fake_backend;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Router,
    routing::{delete, get, post},
};
use handlers::{
    cancel_session, clear_session_error, get_my_classes, get_my_classes_ical, get_schedule,
    healthz_live, healthz_ready, join_session, logout, refresh_schedule, root,
};
use tower_http::LatencyUnit;
use tower_http::cors::CorsLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::{Level, info, warn};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::backend::{HttpScheduleBackend, StaticTokenProvider};
use crate::cache::DateRangeCache;
use crate::clock::GymClock;
use crate::ical::ICalExporter;
use crate::openapi::ApiDoc;
use crate::settings::Settings;
use crate::view_model::ScheduleViewModel;

#[derive(Clone)]
pub struct AppState {
    pub settings: Settings,
    pub view_model: ScheduleViewModel,
    pub exporter: Arc<ICalExporter>,
}

impl AppState {
    /// Wires the HTTP backend, gym clock and cache margins from `settings`.
    pub fn from_settings(settings: Settings) -> Result<Self, config::ConfigError> {
        let tokens = Arc::new(StaticTokenProvider::new(settings.access_token.clone()));
        let backend = Arc::new(HttpScheduleBackend::new(
            settings.api_base_url.clone(),
            settings.gym_id.clone(),
            tokens,
        ));
        let clock = Arc::new(GymClock::new(settings.tz()?));
        let cache = DateRangeCache::new(settings.window_days_before, settings.window_days_after);
        Ok(Self {
            view_model: ScheduleViewModel::new(backend, clock, cache),
            exporter: Arc::new(ICalExporter::new(settings.calendar_name.clone())),
            settings,
        })
    }
}

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let settings = Settings::from_env()?;

    let env_filter = if settings.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .without_time()
        .init();

    if settings.access_token.is_none() {
        warn!("APP_ACCESS_TOKEN is not set, backend calls will be rejected until it is");
    }

    let state = AppState::from_settings(settings)?;
    let app = build_router(state.clone());

    let addr = SocketAddr::from(([0, 0, 0, 0], state.settings.port));
    info!(
        gym_id = %state.settings.gym_id,
        backend = %state.settings.api_base_url,
        "Starting gym schedule client on {addr}"
    );
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

pub fn build_router(state: AppState) -> Router {
    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_response(
            DefaultOnResponse::new()
                .level(Level::INFO)
                .latency_unit(LatencyUnit::Millis),
        );

    let mut router = Router::new()
        .route("/", get(root))
        .route("/healthz/live", get(healthz_live))
        .route("/healthz/ready", get(healthz_ready))
        .route("/schedule", get(get_schedule))
        .route("/schedule/refresh", post(refresh_schedule))
        .route("/my-classes", get(get_my_classes))
        .route("/my-classes.ical", get(get_my_classes_ical))
        .route("/sessions/{id}/join", post(join_session))
        .route("/sessions/{id}/cancel", post(cancel_session))
        .route("/sessions/{id}/error", delete(clear_session_error))
        .route("/logout", post(logout))
        .with_state(state.clone());

    if state.settings.enable_swagger {
        let openapi = ApiDoc::openapi();
        let swagger = SwaggerUi::new("/docs").url("/openapi.json", openapi);
        router = router.merge(swagger);
    }

    router.layer(CorsLayer::permissive()).layer(trace_layer)
}
