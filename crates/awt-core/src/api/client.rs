//! Tracking API client
//!
//! Token-authenticated HTTP client for the AWT tracking API.

use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};

use super::error::ApiError;
use crate::config::ApiCredentials;

/// Token field names accepted in the auth response, in priority order
///
/// The API has answered with each of these at some point; the first
/// non-empty one wins.
pub const TOKEN_FIELDS: &[&str] = &["access_token", "token", "bearer_token"];

/// Date format for `start_date` / `end_date` query parameters
const QUERY_DATE_FORMAT: &str = "%Y-%m-%d";

/// Source of tracking data for a date range
#[async_trait]
pub trait TrackingSource: Send + Sync {
    /// Fetch tracking records between two dates
    ///
    /// `None` leaves that end of the range to the API's default. The JSON
    /// body is returned as-is (array or single object).
    async fn fetch(
        &self,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<Value, ApiError>;
}

#[derive(Serialize)]
struct TokenRequest<'a> {
    api_key: &'a str,
    username: &'a str,
    password: &'a str,
}

/// Client for the AWT tracking API
///
/// Holds no token state: every fetch authenticates first.
pub struct AwtClient {
    http: Client,
    credentials: ApiCredentials,
}

impl AwtClient {
    /// Create a client; `timeout` applies to every request
    pub fn new(credentials: ApiCredentials, timeout: Duration) -> Result<Self, ApiError> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("awt-sync/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(ApiError::Client)?;

        Ok(Self { http, credentials })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.credentials.base_url, path)
    }

    /// Exchange API key, username and password for a bearer token
    pub async fn authenticate(&self) -> Result<String, ApiError> {
        let request = TokenRequest {
            api_key: &self.credentials.api_key,
            username: &self.credentials.username,
            password: &self.credentials.password,
        };

        let response = self
            .http
            .post(self.url("/token"))
            .json(&request)
            .send()
            .await
            .map_err(ApiError::AuthTransport)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::AuthRejected { status, body });
        }

        let body: Value = response
            .json()
            .await
            .map_err(ApiError::InvalidAuthResponse)?;

        let token = extract_token(&body).ok_or_else(|| ApiError::MissingToken {
            expected: TOKEN_FIELDS.join(", "),
        })?;
        debug!("Obtained access token");
        Ok(token)
    }
}

#[async_trait]
impl TrackingSource for AwtClient {
    async fn fetch(
        &self,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<Value, ApiError> {
        let token = self.authenticate().await?;

        info!(
            "Fetching tracking data from {} to {}",
            display_date(start),
            display_date(end)
        );

        let response = self
            .http
            .get(self.url("/api/v1/tracking-data"))
            .bearer_auth(token)
            .header("X-API-Key", &self.credentials.api_key)
            .query(&date_range_query(start, end))
            .send()
            .await
            .map_err(ApiError::FetchTransport)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::FetchRejected { status, body });
        }

        response.json().await.map_err(ApiError::InvalidPayload)
    }
}

/// Pick the token out of an auth response body
pub fn extract_token(body: &Value) -> Option<String> {
    TOKEN_FIELDS
        .iter()
        .filter_map(|field| body.get(*field).and_then(Value::as_str))
        .find(|token| !token.is_empty())
        .map(str::to_string)
}

/// Build query parameters, omitting unset ends of the range
pub fn date_range_query(
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
) -> Vec<(&'static str, String)> {
    let mut params = Vec::new();
    if let Some(start) = start {
        params.push(("start_date", start.format(QUERY_DATE_FORMAT).to_string()));
    }
    if let Some(end) = end {
        params.push(("end_date", end.format(QUERY_DATE_FORMAT).to_string()));
    }
    params
}

fn display_date(date: Option<NaiveDate>) -> String {
    date.map(|d| d.to_string())
        .unwrap_or_else(|| "(unbounded)".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    use axum::extract::{Query, State};
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use serde_json::json;
    use tokio::net::TcpListener;

    /// Requests the fake API has received
    #[derive(Default)]
    struct Received {
        token_bodies: Vec<Value>,
        data_requests: Vec<(HeaderMap, HashMap<String, String>)>,
    }

    /// Fake tracking API with canned answers for both endpoints
    #[derive(Clone)]
    struct FakeApi {
        token: (StatusCode, &'static str),
        data: (StatusCode, &'static str),
        received: Arc<Mutex<Received>>,
    }

    impl FakeApi {
        fn new(token: (StatusCode, &'static str), data: (StatusCode, &'static str)) -> Self {
            Self {
                token,
                data,
                received: Arc::default(),
            }
        }
    }

    async fn token_route(
        State(api): State<FakeApi>,
        Json(body): Json<Value>,
    ) -> (StatusCode, &'static str) {
        api.received.lock().unwrap().token_bodies.push(body);
        api.token
    }

    async fn data_route(
        State(api): State<FakeApi>,
        headers: HeaderMap,
        Query(query): Query<HashMap<String, String>>,
    ) -> (StatusCode, &'static str) {
        api.received
            .lock()
            .unwrap()
            .data_requests
            .push((headers, query));
        api.data
    }

    /// Serve the fake API on a random local port, returning its base URL
    async fn serve(api: FakeApi) -> String {
        let app = Router::new()
            .route("/token", post(token_route))
            .route("/api/v1/tracking-data", get(data_route))
            .with_state(api);

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        format!("http://{}", addr)
    }

    fn client(base_url: String) -> AwtClient {
        let credentials = ApiCredentials {
            base_url,
            username: "ranger".to_string(),
            password: "s3cret".to_string(),
            api_key: "key-123".to_string(),
        };
        AwtClient::new(credentials, Duration::from_secs(5)).unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_extract_token_priority() {
        let body = json!({"token": "second", "access_token": "first"});
        assert_eq!(extract_token(&body), Some("first".to_string()));

        let body = json!({"access_token": "", "bearer_token": "third"});
        assert_eq!(extract_token(&body), Some("third".to_string()));

        let body = json!({"access_token": 42, "token": "second"});
        assert_eq!(extract_token(&body), Some("second".to_string()));

        assert_eq!(extract_token(&json!({"jwt": "nope"})), None);
        assert_eq!(extract_token(&json!(["access_token"])), None);
    }

    #[test]
    fn test_date_range_query() {
        assert!(date_range_query(None, None).is_empty());

        let params = date_range_query(Some(date(2024, 1, 1)), None);
        assert_eq!(params, vec![("start_date", "2024-01-01".to_string())]);

        let params = date_range_query(Some(date(2024, 1, 1)), Some(date(2024, 3, 31)));
        assert_eq!(
            params,
            vec![
                ("start_date", "2024-01-01".to_string()),
                ("end_date", "2024-03-31".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_fetch_authenticates_then_requests_data() {
        let api = FakeApi::new(
            (StatusCode::OK, r#"{"access_token":"tok-1"}"#),
            (StatusCode::OK, r#"[{"id":1},{"id":2}]"#),
        );
        let received = Arc::clone(&api.received);
        let client = client(serve(api).await);

        let data = client
            .fetch(Some(date(2024, 1, 1)), Some(date(2024, 1, 2)))
            .await
            .unwrap();
        assert_eq!(data, json!([{"id": 1}, {"id": 2}]));

        let received = received.lock().unwrap();
        assert_eq!(
            received.token_bodies,
            vec![json!({"api_key": "key-123", "username": "ranger", "password": "s3cret"})]
        );

        assert_eq!(received.data_requests.len(), 1);
        let (headers, query) = &received.data_requests[0];
        assert_eq!(headers["authorization"], "Bearer tok-1");
        assert_eq!(headers["x-api-key"], "key-123");
        assert_eq!(query.get("start_date").map(String::as_str), Some("2024-01-01"));
        assert_eq!(query.get("end_date").map(String::as_str), Some("2024-01-02"));
    }

    #[tokio::test]
    async fn test_fetch_without_dates_sends_no_query() {
        let api = FakeApi::new(
            (StatusCode::OK, r#"{"token":"tok-2"}"#),
            (StatusCode::OK, r#"{"id":7}"#),
        );
        let received = Arc::clone(&api.received);
        let client = client(serve(api).await);

        let data = client.fetch(None, None).await.unwrap();
        assert_eq!(data, json!({"id": 7}));

        let received = received.lock().unwrap();
        let (headers, query) = &received.data_requests[0];
        assert!(query.is_empty());
        assert_eq!(headers["authorization"], "Bearer tok-2");
    }

    #[tokio::test]
    async fn test_unauthorized_is_auth_error() {
        let api = FakeApi::new(
            (StatusCode::UNAUTHORIZED, r#"{"detail":"bad credentials"}"#),
            (StatusCode::OK, "[]"),
        );
        let received = Arc::clone(&api.received);
        let client = client(serve(api).await);

        let err = client.fetch(None, None).await.unwrap_err();

        assert!(err.is_auth());
        match err {
            ApiError::AuthRejected { status, body } => {
                assert_eq!(status.as_u16(), 401);
                assert!(body.contains("bad credentials"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(received.lock().unwrap().data_requests.is_empty());
    }

    #[tokio::test]
    async fn test_missing_token_field() {
        let api = FakeApi::new(
            (StatusCode::OK, r#"{"expires_in":3600}"#),
            (StatusCode::OK, "[]"),
        );
        let client = client(serve(api).await);

        let err = client.authenticate().await.unwrap_err();

        assert!(matches!(err, ApiError::MissingToken { .. }));
        assert!(err.to_string().contains("access_token, token, bearer_token"));
    }

    #[tokio::test]
    async fn test_non_json_token_response() {
        let api = FakeApi::new((StatusCode::OK, "<html>login</html>"), (StatusCode::OK, "[]"));
        let client = client(serve(api).await);

        let err = client.fetch(None, None).await.unwrap_err();
        assert!(err.is_auth());
        assert!(matches!(err, ApiError::InvalidAuthResponse(_)));
    }

    #[tokio::test]
    async fn test_data_error_status_is_fetch_error() {
        let api = FakeApi::new(
            (StatusCode::OK, r#"{"bearer_token":"tok-3"}"#),
            (StatusCode::INTERNAL_SERVER_ERROR, r#"{"detail":"boom"}"#),
        );
        let client = client(serve(api).await);

        let err = client.fetch(None, None).await.unwrap_err();

        assert!(!err.is_auth());
        assert!(matches!(err, ApiError::FetchRejected { .. }));
    }

    #[tokio::test]
    async fn test_non_json_data_is_fetch_error() {
        let api = FakeApi::new(
            (StatusCode::OK, r#"{"access_token":"tok-4"}"#),
            (StatusCode::OK, "not json"),
        );
        let client = client(serve(api).await);

        let err = client.fetch(None, None).await.unwrap_err();
        assert!(!err.is_auth());
        assert!(matches!(err, ApiError::InvalidPayload(_)));
    }

    #[tokio::test]
    async fn test_unreachable_api_is_auth_transport_error() {
        // Bind then drop to get a port nothing listens on
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = client(format!("http://{}", addr))
            .fetch(None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::AuthTransport(_)));
    }
}
