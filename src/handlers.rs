use axum::extract::{Path, Query, State};
use axum::{Json, http::StatusCode, response::IntoResponse};
use axum_extra::extract::TypedHeader;
use axum_extra::headers::{Authorization, authorization::Bearer};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::{
    AppState, auth::verify_token, error::ApiError, models::MyClassEntry, models::SessionId,
    view_model::ScheduleSnapshot,
};

type BearerHeader = Option<TypedHeader<Authorization<Bearer>>>;

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ScheduleQuery {
    /// Day to show, `YYYY-MM-DD`; defaults to today in the gym's zone.
    #[param(value_type = Option<String>, format = "date")]
    pub date: Option<NaiveDate>,
    /// Authentication token (alternative to Bearer header)
    pub token: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct TokenQuery {
    /// Authentication token (alternative to Bearer header)
    pub token: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RegistrationResponse {
    pub session_id: SessionId,
    pub is_registered: bool,
}

fn authorize(state: &AppState, auth: BearerHeader, token: Option<&str>) -> Result<(), ApiError> {
    verify_token(&state.settings.auth_token, auth, token)
}

#[utoipa::path(get, path = "/", tag = "schedule")]
pub async fn root() -> impl IntoResponse {
    Json(serde_json::json!({
        "message": "Gym schedule client API",
        "endpoints": {
            "/schedule": "Sessions for a day, loading the surrounding window when needed",
            "/schedule/refresh": "Drop cached data and reload",
            "/my-classes": "Current registrations",
            "/my-classes.ical": "Registered classes as an iCal file",
            "/sessions/{id}/join": "Register for a session",
            "/sessions/{id}/cancel": "Cancel a registration"
        }
    }))
}

#[utoipa::path(get, path = "/healthz/live", tag = "schedule")]
pub async fn healthz_live() -> impl IntoResponse {
    Json(serde_json::json!({"status": "ok"}))
}

#[utoipa::path(get, path = "/healthz/ready", tag = "schedule")]
pub async fn healthz_ready(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "loaded_range": state.view_model.loaded_range(),
    }))
}

#[utoipa::path(
    get,
    path = "/schedule",
    params(ScheduleQuery),
    responses(
        (status = 200, description = "Sessions of the day", body = ScheduleSnapshot),
        (status = 400, description = "No schedule window fits around the date"),
        (status = 401, description = "Invalid authentication token"),
        (status = 502, description = "Schedule backend failed")
    ),
    security(("bearer_auth" = []), ("query_token" = [])),
    tag = "schedule"
)]
pub async fn get_schedule(
    State(state): State<AppState>,
    auth: BearerHeader,
    Query(query): Query<ScheduleQuery>,
) -> Result<Json<ScheduleSnapshot>, ApiError> {
    authorize(&state, auth, query.token.as_deref())?;
    let date = query.date.unwrap_or_else(|| state.view_model.today());
    ApiError::check_load(state.view_model.load_sessions_for_date(date).await)?;
    Ok(Json(state.view_model.snapshot(Some(date))))
}

#[utoipa::path(
    post,
    path = "/schedule/refresh",
    params(ScheduleQuery),
    responses(
        (status = 200, description = "Reloaded sessions of the day", body = ScheduleSnapshot),
        (status = 400, description = "No schedule window fits around the date"),
        (status = 401, description = "Invalid authentication token"),
        (status = 502, description = "Schedule backend failed")
    ),
    security(("bearer_auth" = []), ("query_token" = [])),
    tag = "schedule"
)]
pub async fn refresh_schedule(
    State(state): State<AppState>,
    auth: BearerHeader,
    Query(query): Query<ScheduleQuery>,
) -> Result<Json<ScheduleSnapshot>, ApiError> {
    authorize(&state, auth, query.token.as_deref())?;
    let date = query.date.unwrap_or_else(|| state.view_model.today());
    ApiError::check_load(state.view_model.refresh(date).await)?;
    Ok(Json(state.view_model.snapshot(Some(date))))
}

#[utoipa::path(
    get,
    path = "/my-classes",
    params(TokenQuery),
    responses(
        (status = 200, description = "Registrations of the current user", body = [MyClassEntry]),
        (status = 401, description = "Invalid authentication token"),
        (status = 502, description = "Schedule backend failed")
    ),
    security(("bearer_auth" = []), ("query_token" = [])),
    tag = "schedule"
)]
pub async fn get_my_classes(
    State(state): State<AppState>,
    auth: BearerHeader,
    Query(query): Query<TokenQuery>,
) -> Result<Json<Vec<MyClassEntry>>, ApiError> {
    authorize(&state, auth, query.token.as_deref())?;
    ApiError::check_load(state.view_model.fetch_my_classes().await)?;
    Ok(Json(state.view_model.my_classes()))
}

#[utoipa::path(
    get,
    path = "/my-classes.ical",
    params(TokenQuery),
    responses(
        (status = 200, description = "iCal file", content_type = "text/calendar"),
        (status = 401, description = "Invalid authentication token"),
        (status = 404, description = "No registered classes in the loaded window")
    ),
    security(("bearer_auth" = []), ("query_token" = [])),
    tag = "schedule"
)]
pub async fn get_my_classes_ical(
    State(state): State<AppState>,
    auth: BearerHeader,
    Query(query): Query<TokenQuery>,
) -> Result<impl IntoResponse, ApiError> {
    authorize(&state, auth, query.token.as_deref())?;
    let view_model = &state.view_model;
    ApiError::check_load(view_model.load_sessions_for_date(view_model.today()).await)?;
    ApiError::check_load(view_model.fetch_my_classes().await)?;

    let sessions = view_model.registered_sessions();
    if sessions.is_empty() {
        return Err(ApiError::NotFound("No registered classes found".into()));
    }

    let body = state.exporter.generate(&sessions);
    Ok((
        StatusCode::OK,
        [
            ("content-type", "text/calendar"),
            ("content-disposition", "attachment; filename=my_classes.ics"),
        ],
        body,
    ))
}

#[utoipa::path(
    post,
    path = "/sessions/{id}/join",
    params(("id" = i64, Path, description = "Session id"), TokenQuery),
    responses(
        (status = 200, description = "Registered", body = RegistrationResponse),
        (status = 401, description = "Invalid authentication token"),
        (status = 409, description = "Another action for this session is in progress"),
        (status = 502, description = "Backend refused the registration")
    ),
    security(("bearer_auth" = []), ("query_token" = [])),
    tag = "schedule"
)]
pub async fn join_session(
    State(state): State<AppState>,
    auth: BearerHeader,
    Path(id): Path<SessionId>,
    Query(query): Query<TokenQuery>,
) -> Result<Json<RegistrationResponse>, ApiError> {
    authorize(&state, auth, query.token.as_deref())?;
    let is_registered = ApiError::check_action(state.view_model.join_session(id).await)?;
    Ok(Json(RegistrationResponse {
        session_id: id,
        is_registered,
    }))
}

#[utoipa::path(
    post,
    path = "/sessions/{id}/cancel",
    params(("id" = i64, Path, description = "Session id"), TokenQuery),
    responses(
        (status = 200, description = "Registration cancelled", body = RegistrationResponse),
        (status = 401, description = "Invalid authentication token"),
        (status = 409, description = "Another action for this session is in progress"),
        (status = 502, description = "Backend refused the cancellation")
    ),
    security(("bearer_auth" = []), ("query_token" = [])),
    tag = "schedule"
)]
pub async fn cancel_session(
    State(state): State<AppState>,
    auth: BearerHeader,
    Path(id): Path<SessionId>,
    Query(query): Query<TokenQuery>,
) -> Result<Json<RegistrationResponse>, ApiError> {
    authorize(&state, auth, query.token.as_deref())?;
    let is_registered =
        ApiError::check_action(state.view_model.cancel_registration(id).await)?;
    Ok(Json(RegistrationResponse {
        session_id: id,
        is_registered,
    }))
}

#[utoipa::path(
    delete,
    path = "/sessions/{id}/error",
    params(("id" = i64, Path, description = "Session id"), TokenQuery),
    responses(
        (status = 204, description = "Error message dismissed"),
        (status = 404, description = "No error recorded for this session")
    ),
    security(("bearer_auth" = []), ("query_token" = [])),
    tag = "schedule"
)]
pub async fn clear_session_error(
    State(state): State<AppState>,
    auth: BearerHeader,
    Path(id): Path<SessionId>,
    Query(query): Query<TokenQuery>,
) -> Result<StatusCode, ApiError> {
    authorize(&state, auth, query.token.as_deref())?;
    match state.view_model.clear_action_error(id) {
        Some(_) => Ok(StatusCode::NO_CONTENT),
        None => Err(ApiError::NotFound("No error recorded for this session".into())),
    }
}

#[utoipa::path(
    post,
    path = "/logout",
    params(TokenQuery),
    responses((status = 204, description = "Local schedule state cleared")),
    security(("bearer_auth" = []), ("query_token" = [])),
    tag = "schedule"
)]
pub async fn logout(
    State(state): State<AppState>,
    auth: BearerHeader,
    Query(query): Query<TokenQuery>,
) -> Result<StatusCode, ApiError> {
    authorize(&state, auth, query.token.as_deref())?;
    state.view_model.reset();
    Ok(StatusCode::NO_CONTENT)
}
