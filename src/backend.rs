use std::sync::Arc;

use async_trait::async_trait;
use http::StatusCode;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, instrument, warn};
use url::Url;

use crate::cache::DateRange;
use crate::models::{ErrorDetail, MyClassEntry, SessionId, SessionWithClass};

pub const GYM_HEADER: &str = "X-Gym-ID";
const ALREADY_REGISTERED_MARKER: &str = "already registered";

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("No valid access token available")]
    Unauthenticated,
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("Invalid request URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("Already registered for this session")]
    AlreadyRegistered,
    #[error("Server returned {status}: {detail}")]
    Server { status: StatusCode, detail: String },
}

impl BackendError {
    /// Text shown to the user for this failure.
    pub fn user_message(&self) -> String {
        match self {
            BackendError::Unauthenticated => "You are not signed in. Please log in again.".into(),
            BackendError::Http(_) => {
                "Network error. Please check your connection and try again.".into()
            }
            BackendError::Decode(_) => "Received an unexpected response from the server.".into(),
            BackendError::InvalidUrl(_) => "The schedule service address is invalid.".into(),
            BackendError::AlreadyRegistered => "You are already registered for this class.".into(),
            BackendError::Server { detail, .. } => detail.clone(),
        }
    }
}

/// Source of bearer tokens for the backend. Implementations refresh expired
/// tokens themselves; `None` means the user has to sign in again.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn valid_access_token(&self) -> Option<String>;
}

#[derive(Debug, Clone)]
pub struct StaticTokenProvider {
    token: Option<String>,
}

impl StaticTokenProvider {
    pub fn new(token: Option<String>) -> Self {
        Self {
            token: token.filter(|t| !t.trim().is_empty()),
        }
    }
}

#[async_trait]
impl TokenProvider for StaticTokenProvider {
    async fn valid_access_token(&self) -> Option<String> {
        self.token.clone()
    }
}

#[async_trait]
pub trait ScheduleBackend: Send + Sync {
    async fn sessions_in_range(&self, range: DateRange)
    -> Result<Vec<SessionWithClass>, BackendError>;
    async fn my_classes(&self) -> Result<Vec<MyClassEntry>, BackendError>;
    async fn register(&self, id: SessionId) -> Result<(), BackendError>;
    async fn cancel_registration(&self, id: SessionId) -> Result<(), BackendError>;
}

#[derive(Clone)]
pub struct HttpScheduleBackend {
    client: reqwest::Client,
    base_url: Arc<Url>,
    gym_id: String,
    tokens: Arc<dyn TokenProvider>,
}

impl HttpScheduleBackend {
    pub fn new(base_url: Url, gym_id: impl Into<String>, tokens: Arc<dyn TokenProvider>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: Arc::new(base_url),
            gym_id: gym_id.into(),
            tokens,
        }
    }

    fn endpoint(&self, path: &str, params: &[(&str, String)]) -> Result<Url, BackendError> {
        let raw = format!("{}/{}", self.base_url.as_str().trim_end_matches('/'), path);
        if params.is_empty() {
            Ok(Url::parse(&raw)?)
        } else {
            Ok(Url::parse_with_params(&raw, params)?)
        }
    }

    async fn send(
        &self,
        method: reqwest::Method,
        url: Url,
    ) -> Result<(StatusCode, String), BackendError> {
        let token = self
            .tokens
            .valid_access_token()
            .await
            .ok_or(BackendError::Unauthenticated)?;

        debug!(%method, %url, "calling schedule backend");
        let response = self
            .client
            .request(method, url.as_str())
            .bearer_auth(token)
            .header(GYM_HEADER, &self.gym_id)
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await?;
        Ok((status, body))
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, BackendError> {
        let (status, body) = self.send(reqwest::Method::GET, url).await?;
        if !status.is_success() {
            return Err(server_error(status, &body));
        }
        Ok(serde_json::from_str(&body)?)
    }
}

fn server_error(status: StatusCode, body: &str) -> BackendError {
    let detail = serde_json::from_str::<ErrorDetail>(body)
        .map(|parsed| parsed.detail)
        .unwrap_or_else(|_| {
            status
                .canonical_reason()
                .unwrap_or("Unexpected server response")
                .to_string()
        });
    warn!(%status, %detail, "schedule backend returned an error");
    BackendError::Server { status, detail }
}

/// The backend reports a duplicate registration only through its detail
/// text; this is the one place that text is inspected.
fn classify_register_failure(error: BackendError) -> BackendError {
    match error {
        BackendError::Server { status, detail }
            if status.is_client_error()
                && detail.to_lowercase().contains(ALREADY_REGISTERED_MARKER) =>
        {
            BackendError::AlreadyRegistered
        }
        other => other,
    }
}

#[async_trait]
impl ScheduleBackend for HttpScheduleBackend {
    #[instrument(skip(self))]
    async fn sessions_in_range(
        &self,
        range: DateRange,
    ) -> Result<Vec<SessionWithClass>, BackendError> {
        let url = self.endpoint(
            "schedule/sessions/date-range",
            &[
                ("start_date", range.start.format("%Y-%m-%d").to_string()),
                ("end_date", range.end.format("%Y-%m-%d").to_string()),
            ],
        )?;
        let sessions: Vec<SessionWithClass> = self.get_json(url).await?;
        debug!(count = sessions.len(), "fetched sessions");
        Ok(sessions)
    }

    #[instrument(skip(self))]
    async fn my_classes(&self) -> Result<Vec<MyClassEntry>, BackendError> {
        let url = self.endpoint("schedule/participation/my-classes-simple", &[])?;
        self.get_json(url).await
    }

    #[instrument(skip(self))]
    async fn register(&self, id: SessionId) -> Result<(), BackendError> {
        let url = self.endpoint(&format!("schedule/participation/register/{id}"), &[])?;
        let (status, body) = self.send(reqwest::Method::POST, url).await?;
        if status.is_success() {
            Ok(())
        } else {
            Err(classify_register_failure(server_error(status, &body)))
        }
    }

    #[instrument(skip(self))]
    async fn cancel_registration(&self, id: SessionId) -> Result<(), BackendError> {
        let url = self.endpoint(
            &format!("schedule/participation/cancel-registration/{id}"),
            &[],
        )?;
        let (status, body) = self.send(reqwest::Method::POST, url).await?;
        if status.is_success() {
            Ok(())
        } else {
            Err(server_error(status, &body))
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use httpmock::prelude::*;
    use serde_json::json;

    use super::*;

    fn backend(server: &MockServer, token: Option<&str>) -> HttpScheduleBackend {
        HttpScheduleBackend::new(
            Url::parse(&server.base_url()).unwrap(),
            "7",
            Arc::new(StaticTokenProvider::new(token.map(str::to_string))),
        )
    }

    fn session_json(id: i64, start: &str) -> serde_json::Value {
        json!({
            "session": {
                "id": id,
                "class_id": 2,
                "trainer_id": 5,
                "start_time": start,
                "end_time": "2025-11-24T07:00:00Z",
                "status": "scheduled"
            },
            "class": {
                "id": 2,
                "name": "WOD",
                "duration": 60,
                "difficulty_level": "beginner",
                "max_capacity": 12
            }
        })
    }

    #[tokio::test]
    async fn test_sessions_in_range_sends_dates_token_and_gym() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/schedule/sessions/date-range")
                    .query_param("start_date", "2025-11-21")
                    .query_param("end_date", "2025-12-01")
                    .header("authorization", "Bearer abc")
                    .header("x-gym-id", "7");
                then.status(200).json_body(json!([
                    session_json(1, "2025-11-24T06:00:00"),
                    session_json(2, "2025-11-24T06:00:00.123Z"),
                ]));
            })
            .await;

        let range = DateRange::new(
            NaiveDate::from_ymd_opt(2025, 11, 21).unwrap(),
            NaiveDate::from_ymd_opt(2025, 12, 1).unwrap(),
        );
        let sessions = backend(&server, Some("abc"))
            .sessions_in_range(range)
            .await
            .unwrap();
        mock.assert_async().await;
        assert_eq!(sessions.len(), 2);
        assert_eq!(sessions[1].id(), 2);
    }

    #[tokio::test]
    async fn test_missing_token_short_circuits() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.any_request();
                then.status(200).json_body(json!([]));
            })
            .await;

        let err = backend(&server, None).my_classes().await.unwrap_err();
        assert!(matches!(err, BackendError::Unauthenticated));
        mock.assert_hits_async(0).await;
    }

    #[tokio::test]
    async fn test_register_conflict_becomes_typed_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/schedule/participation/register/12");
                then.status(400)
                    .json_body(json!({"detail": "User is already registered for this session"}));
            })
            .await;

        let err = backend(&server, Some("abc")).register(12).await.unwrap_err();
        assert!(matches!(err, BackendError::AlreadyRegistered));
    }

    #[tokio::test]
    async fn test_register_other_failure_keeps_detail() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/schedule/participation/register/12");
                then.status(400).json_body(json!({"detail": "Session is full"}));
            })
            .await;

        let err = backend(&server, Some("abc")).register(12).await.unwrap_err();
        assert_eq!(err.user_message(), "Session is full");
    }

    #[tokio::test]
    async fn test_cancel_registration_posts_to_endpoint() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/schedule/participation/cancel-registration/9");
                then.status(200).json_body(json!({"message": "ok"}));
            })
            .await;

        backend(&server, Some("abc"))
            .cancel_registration(9)
            .await
            .unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_bad_timestamp_is_a_decode_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/schedule/sessions/date-range");
                then.status(200)
                    .json_body(json!([session_json(1, "Monday morning")]));
            })
            .await;

        let day = NaiveDate::from_ymd_opt(2025, 11, 24).unwrap();
        let err = backend(&server, Some("abc"))
            .sessions_in_range(DateRange::new(day, day))
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::Decode(_)));
        assert!(err.to_string().contains("Monday morning"));
    }

    #[tokio::test]
    async fn test_non_json_error_body_uses_status_reason() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/schedule/participation/my-classes-simple");
                then.status(503).body("upstream down");
            })
            .await;

        let err = backend(&server, Some("abc")).my_classes().await.unwrap_err();
        match err {
            BackendError::Server { status, detail } => {
                assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
                assert_eq!(detail, "Service Unavailable");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_https_base_url_is_supported() {
        let backend = HttpScheduleBackend::new(
            Url::parse("https://127.0.0.1:9/").unwrap(),
            "7",
            Arc::new(StaticTokenProvider::new(Some("abc".into()))),
        );

        let err = backend.my_classes().await.unwrap_err();
        let BackendError::Http(err) = err else {
            panic!("expected a transport error, got {err:?}");
        };
        assert!(err.is_connect());
        assert!(!format!("{err:?}").contains("scheme is not http"));
    }

    #[test]
    fn test_endpoint_without_params_has_no_query() {
        let backend = HttpScheduleBackend::new(
            Url::parse("https://api.example.com/v1/").unwrap(),
            "7",
            Arc::new(StaticTokenProvider::new(None)),
        );

        let plain = backend
            .endpoint("schedule/participation/my-classes-simple", &[])
            .unwrap();
        assert_eq!(
            plain.as_str(),
            "https://api.example.com/v1/schedule/participation/my-classes-simple"
        );
        assert_eq!(plain.query(), None);

        let with_dates = backend
            .endpoint("schedule/sessions/date-range", &[("start_date", "2025-11-21".into())])
            .unwrap();
        assert_eq!(with_dates.query(), Some("start_date=2025-11-21"));
    }

    #[test]
    fn test_conflict_marker_requires_client_error() {
        let err = classify_register_failure(BackendError::Server {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            detail: "already registered".into(),
        });
        assert!(matches!(err, BackendError::Server { .. }));
    }
}
