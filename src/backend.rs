use crate::stats::{SocialStats, SOCIAL_STATS_PATH};
use axum::{
    extract::State,
    http::{header, HeaderMap, HeaderValue, Method, StatusCode, Uri},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use futures_util::future::join;
use serde::Serialize;
use serde_json::Value;
use std::{
    sync::atomic::{AtomicU64, Ordering as AtomicOrdering},
    time::{Duration, Instant, SystemTime, UNIX_EPOCH},
};
use tower_http::services::{ServeDir, ServeFile};
use url::Url;

const DEFAULT_PORT: u16 = 8080;
const DEFAULT_STATIC_DIR: &str = "dist";
const DEFAULT_INSTAGRAM_GRAPH_BASE_URL: &str = "https://graph.facebook.com/v18.0/";
const DEFAULT_YOUTUBE_DATA_BASE_URL: &str = "https://www.googleapis.com/youtube/v3/";
const DEFAULT_UPSTREAM_REQUEST_TIMEOUT_MS: u64 = 8_000;
const DEFAULT_UPSTREAM_CONNECT_TIMEOUT_MS: u64 = 3_000;
const DEFAULT_LOG_LEVEL: LogLevel = LogLevel::Info;

const UPSTREAM_REQUEST_TIMEOUT_MS_BOUNDS: (u64, u64) = (100, 60_000);
const UPSTREAM_CONNECT_TIMEOUT_MS_BOUNDS: (u64, u64) = (100, 30_000);
const USER_AGENT: &str = "studio-site-stats/1.0";
const REQUEST_ID_HEADER: &str = "x-request-id";
const INSTAGRAM_FIELDS: &str = "followers_count,media_count";
const STATS_FAILURE_MESSAGE: &str = "Failed to fetch social stats";

static REQUEST_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug)]
enum LogLevel {
    Debug,
    Info,
    Error,
}

impl LogLevel {
    fn as_str(self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Error => "error",
        }
    }
}

#[derive(Clone)]
struct InstagramCredentials {
    user_id: String,
    access_token: String,
}

#[derive(Clone)]
struct YoutubeCredentials {
    api_key: String,
    channel_id: String,
}

#[derive(Clone)]
struct StatsRuntimeConfig {
    instagram: Option<InstagramCredentials>,
    youtube: Option<YoutubeCredentials>,
    instagram_base_url: String,
    youtube_base_url: String,
    request_timeout: Duration,
    connect_timeout: Duration,
    log_level: LogLevel,
}

impl StatsRuntimeConfig {
    fn from_env() -> Self {
        let instagram = match (
            parse_env_non_empty_string("IG_USER_ID"),
            parse_env_non_empty_string("IG_ACCESS_TOKEN"),
        ) {
            (Some(user_id), Some(access_token)) => Some(InstagramCredentials {
                user_id,
                access_token,
            }),
            _ => None,
        };
        let youtube = match (
            parse_env_non_empty_string("YT_API_KEY"),
            parse_env_non_empty_string("YT_CHANNEL_ID"),
        ) {
            (Some(api_key), Some(channel_id)) => Some(YoutubeCredentials {
                api_key,
                channel_id,
            }),
            _ => None,
        };
        let instagram_base_url = parse_env_http_url("IG_GRAPH_BASE_URL")
            .map(|url| url.to_string())
            .unwrap_or_else(|| DEFAULT_INSTAGRAM_GRAPH_BASE_URL.to_string());
        let youtube_base_url = parse_env_http_url("YT_DATA_BASE_URL")
            .map(|url| url.to_string())
            .unwrap_or_else(|| DEFAULT_YOUTUBE_DATA_BASE_URL.to_string());
        let request_timeout_ms = parse_env_u64_with_bounds(
            "UPSTREAM_REQUEST_TIMEOUT_MS",
            DEFAULT_UPSTREAM_REQUEST_TIMEOUT_MS,
            UPSTREAM_REQUEST_TIMEOUT_MS_BOUNDS,
        );
        let connect_timeout_ms = parse_env_u64_with_bounds(
            "UPSTREAM_CONNECT_TIMEOUT_MS",
            DEFAULT_UPSTREAM_CONNECT_TIMEOUT_MS,
            UPSTREAM_CONNECT_TIMEOUT_MS_BOUNDS,
        );

        Self {
            instagram,
            youtube,
            instagram_base_url,
            youtube_base_url,
            request_timeout: Duration::from_millis(request_timeout_ms),
            connect_timeout: Duration::from_millis(connect_timeout_ms),
            log_level: parse_log_level("LOG_LEVEL", DEFAULT_LOG_LEVEL),
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    client: reqwest::Client,
    config: StatsRuntimeConfig,
}

#[derive(Debug, thiserror::Error)]
enum UpstreamError {
    #[error("upstream URL could not be built")]
    InvalidUrl,
    #[error("upstream request failed: {0}")]
    Request(reqwest::Error),
    #[error("upstream body was not JSON: {0}")]
    Decode(serde_json::Error),
}

impl UpstreamError {
    fn error_class(&self) -> &'static str {
        match self {
            Self::InvalidUrl => "invalid_upstream_url",
            Self::Request(error) if error.is_timeout() => "upstream_timeout",
            Self::Request(_) => "upstream_request_failed",
            Self::Decode(_) => "upstream_decode_failed",
        }
    }
}

/// What one upstream contributed to a stats response. `Unconfigured` and
/// `Rejected` both end up as `null` in the payload and differ only in logs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum UpstreamOutcome<T> {
    Unconfigured,
    Rejected,
    Fetched(T),
}

impl<T> UpstreamOutcome<T> {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Unconfigured => "unconfigured",
            Self::Rejected => "rejected",
            Self::Fetched(_) => "fetched",
        }
    }

    fn fetched(&self) -> Option<&T> {
        match self {
            Self::Fetched(value) => Some(value),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct InstagramStats {
    followers: Option<u64>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct YoutubeStats {
    subscribers: Option<u64>,
    views: Option<u64>,
}

struct SocialStatsReport {
    instagram: UpstreamOutcome<InstagramStats>,
    youtube: UpstreamOutcome<YoutubeStats>,
}

impl SocialStatsReport {
    fn payload(&self) -> SocialStats {
        let instagram = self.instagram.fetched();
        let youtube = self.youtube.fetched();

        SocialStats {
            instagram_followers: instagram.and_then(|stats| stats.followers),
            youtube_subscribers: youtube.and_then(|stats| stats.subscribers),
            youtube_views: youtube.and_then(|stats| stats.views),
        }
    }
}

#[derive(Serialize)]
struct StatsErrorPayload {
    error: &'static str,
}

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let port = std::env::var("PORT")
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(DEFAULT_PORT);
    let bind_address = format!("0.0.0.0:{port}");
    let static_dir =
        parse_env_non_empty_string("STATIC_DIR").unwrap_or_else(|| DEFAULT_STATIC_DIR.to_string());
    let config = StatsRuntimeConfig::from_env();
    let client = build_upstream_client(&config)?;

    let static_service = ServeDir::new(&static_dir)
        .not_found_service(ServeFile::new(format!("{static_dir}/index.html")));

    let app = Router::new()
        .route(SOCIAL_STATS_PATH, get(get_social_stats))
        .fallback_service(static_service)
        .with_state(AppState {
            client,
            config: config.clone(),
        });

    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    log_event(
        &config,
        LogLevel::Info,
        "server_started",
        serde_json::json!({
            "address": format!("http://127.0.0.1:{port}"),
            "static_dir": static_dir.as_str(),
            "instagram_configured": config.instagram.is_some(),
            "youtube_configured": config.youtube.is_some(),
        }),
    );

    axum::serve(listener, app).await?;
    Ok(())
}

async fn get_social_stats(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
) -> axum::response::Response {
    let request_started_at = Instant::now();
    let request_id = resolve_request_id(&headers);

    log_event(
        &state.config,
        LogLevel::Info,
        "social_stats_request_start",
        serde_json::json!({
            "request_id": request_id.as_str(),
            "method": method.as_str(),
            "path": uri.path(),
        }),
    );

    match collect_social_stats(&state).await {
        Ok(report) => {
            log_event(
                &state.config,
                LogLevel::Debug,
                "social_stats_upstream",
                serde_json::json!({
                    "request_id": request_id.as_str(),
                    "instagram": report.instagram.as_str(),
                    "youtube": report.youtube.as_str(),
                }),
            );
            log_event(
                &state.config,
                LogLevel::Info,
                "social_stats_request_complete",
                serde_json::json!({
                    "request_id": request_id.as_str(),
                    "status": StatusCode::OK.as_u16(),
                    "duration_ms": request_started_at.elapsed().as_millis(),
                }),
            );

            let mut response_headers = HeaderMap::new();
            response_headers.insert(
                header::ACCESS_CONTROL_ALLOW_ORIGIN,
                HeaderValue::from_static("*"),
            );
            response_headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
            response_with_request_id(
                StatusCode::OK,
                response_headers,
                Json(report.payload()),
                &request_id,
            )
        }
        Err(error) => {
            log_event(
                &state.config,
                LogLevel::Error,
                "social_stats_request_failed",
                serde_json::json!({
                    "request_id": request_id.as_str(),
                    "error_class": error.error_class(),
                    "message": error.to_string(),
                    "status": StatusCode::INTERNAL_SERVER_ERROR.as_u16(),
                    "duration_ms": request_started_at.elapsed().as_millis(),
                }),
            );

            let mut response_headers = HeaderMap::new();
            response_headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
            response_with_request_id(
                StatusCode::INTERNAL_SERVER_ERROR,
                response_headers,
                Json(StatsErrorPayload {
                    error: STATS_FAILURE_MESSAGE,
                }),
                &request_id,
            )
        }
    }
}

/// Queries both upstreams side by side. Either upstream failing at the
/// transport or decode level fails the whole report.
async fn collect_social_stats(state: &AppState) -> Result<SocialStatsReport, UpstreamError> {
    let (instagram, youtube) = join(
        fetch_instagram_stats(&state.client, &state.config),
        fetch_youtube_stats(&state.client, &state.config),
    )
    .await;

    Ok(SocialStatsReport {
        instagram: instagram?,
        youtube: youtube?,
    })
}

async fn fetch_instagram_stats(
    client: &reqwest::Client,
    config: &StatsRuntimeConfig,
) -> Result<UpstreamOutcome<InstagramStats>, UpstreamError> {
    let Some(credentials) = config.instagram.as_ref() else {
        return Ok(UpstreamOutcome::Unconfigured);
    };

    let url = instagram_profile_url(&config.instagram_base_url, credentials)?;
    let body = fetch_json(client, url).await?;
    Ok(extract_instagram_stats(&body))
}

async fn fetch_youtube_stats(
    client: &reqwest::Client,
    config: &StatsRuntimeConfig,
) -> Result<UpstreamOutcome<YoutubeStats>, UpstreamError> {
    let Some(credentials) = config.youtube.as_ref() else {
        return Ok(UpstreamOutcome::Unconfigured);
    };

    let url = youtube_channels_url(&config.youtube_base_url, credentials)?;
    let body = fetch_json(client, url).await?;
    Ok(extract_youtube_stats(&body))
}

/// Upstream error payloads arrive with 4xx statuses, so the body is decoded
/// regardless of status and judged by its content.
async fn fetch_json(client: &reqwest::Client, url: Url) -> Result<Value, UpstreamError> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|error| UpstreamError::Request(error.without_url()))?;
    let body = response
        .bytes()
        .await
        .map_err(|error| UpstreamError::Request(error.without_url()))?;

    serde_json::from_slice(&body).map_err(UpstreamError::Decode)
}

fn instagram_profile_url(
    base_url: &str,
    credentials: &InstagramCredentials,
) -> Result<Url, UpstreamError> {
    let mut url = Url::parse(base_url).map_err(|_| UpstreamError::InvalidUrl)?;
    url.path_segments_mut()
        .map_err(|_| UpstreamError::InvalidUrl)?
        .pop_if_empty()
        .push(&credentials.user_id);
    url.query_pairs_mut()
        .append_pair("fields", INSTAGRAM_FIELDS)
        .append_pair("access_token", &credentials.access_token);
    Ok(url)
}

fn youtube_channels_url(
    base_url: &str,
    credentials: &YoutubeCredentials,
) -> Result<Url, UpstreamError> {
    let mut url = Url::parse(base_url).map_err(|_| UpstreamError::InvalidUrl)?;
    url.path_segments_mut()
        .map_err(|_| UpstreamError::InvalidUrl)?
        .pop_if_empty()
        .push("channels");
    url.query_pairs_mut()
        .append_pair("part", "statistics")
        .append_pair("id", &credentials.channel_id)
        .append_pair("key", &credentials.api_key);
    Ok(url)
}

fn extract_instagram_stats(body: &Value) -> UpstreamOutcome<InstagramStats> {
    if body.is_null() || body.get("error").is_some_and(is_truthy) {
        return UpstreamOutcome::Rejected;
    }

    UpstreamOutcome::Fetched(InstagramStats {
        followers: coerce_count(body.get("followers_count")),
    })
}

fn extract_youtube_stats(body: &Value) -> UpstreamOutcome<YoutubeStats> {
    let Some(statistics) = body
        .get("items")
        .and_then(|items| items.get(0))
        .and_then(|item| item.get("statistics"))
        .filter(|statistics| is_truthy(statistics))
    else {
        return UpstreamOutcome::Rejected;
    };

    UpstreamOutcome::Fetched(YoutubeStats {
        subscribers: coerce_count(statistics.get("subscriberCount")),
        views: coerce_count(statistics.get("viewCount")),
    })
}

/// Reads a count that may arrive as a JSON number or a numeric string.
/// Absent and falsy values count as zero; anything non-numeric is `None`.
fn coerce_count(value: Option<&Value>) -> Option<u64> {
    let Some(value) = value.filter(|value| is_truthy(value)) else {
        return Some(0);
    };

    match value {
        Value::Number(number) => number
            .as_u64()
            .or_else(|| number.as_f64().and_then(whole_count)),
        Value::String(text) => {
            let text = text.trim();
            if text.is_empty() {
                return Some(0);
            }
            text.parse::<u64>()
                .ok()
                .or_else(|| text.parse::<f64>().ok().and_then(whole_count))
        }
        Value::Bool(true) => Some(1),
        _ => None,
    }
}

fn whole_count(value: f64) -> Option<u64> {
    (value.is_finite() && value >= 0.0 && value <= u64::MAX as f64).then(|| value.trunc() as u64)
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_some_and(|value| value != 0.0),
        Value::String(text) => !text.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn build_upstream_client(config: &StatsRuntimeConfig) -> Result<reqwest::Client, &'static str> {
    reqwest::Client::builder()
        .timeout(config.request_timeout)
        .connect_timeout(config.connect_timeout)
        .user_agent(USER_AGENT)
        .build()
        .map_err(|_| "failed to prepare upstream client")
}

fn parse_env_u64_with_bounds(name: &str, default: u64, bounds: (u64, u64)) -> u64 {
    std::env::var(name)
        .ok()
        .and_then(|value| value.trim().parse::<u64>().ok())
        .filter(|value| (bounds.0..=bounds.1).contains(value))
        .unwrap_or(default)
}

fn parse_env_non_empty_string(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse_env_http_url(name: &str) -> Option<Url> {
    let value = parse_env_non_empty_string(name)?;
    let parsed = Url::parse(&value).ok()?;

    if parsed.scheme() == "http" || parsed.scheme() == "https" {
        Some(parsed)
    } else {
        None
    }
}

fn parse_log_level(name: &str, default: LogLevel) -> LogLevel {
    match parse_env_non_empty_string(name)
        .unwrap_or_else(|| default.as_str().to_string())
        .to_ascii_lowercase()
        .as_str()
    {
        "debug" => LogLevel::Debug,
        "info" => LogLevel::Info,
        "error" => LogLevel::Error,
        _ => default,
    }
}

fn now_unix_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|value| value.as_millis())
        .unwrap_or(0)
}

fn now_unix_seconds() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|value| value.as_secs())
        .unwrap_or(0)
}

fn generate_request_id() -> String {
    let counter = REQUEST_ID_COUNTER.fetch_add(1, AtomicOrdering::Relaxed);
    format!("req-{}-{counter}", now_unix_millis())
}

fn resolve_request_id(headers: &HeaderMap) -> String {
    let value = headers
        .get(REQUEST_ID_HEADER)
        .and_then(|raw| raw.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(ToString::to_string);

    value.unwrap_or_else(generate_request_id)
}

fn response_with_request_id(
    status: StatusCode,
    mut headers: HeaderMap,
    payload: impl IntoResponse,
    request_id: &str,
) -> axum::response::Response {
    if let Ok(request_id_header) = HeaderValue::from_str(request_id) {
        headers.insert(REQUEST_ID_HEADER, request_id_header);
    }
    (status, headers, payload).into_response()
}

fn log_event(config: &StatsRuntimeConfig, level: LogLevel, event: &str, fields: Value) {
    if level < config.log_level {
        return;
    }

    let mut payload = serde_json::Map::new();
    payload.insert(
        "ts".to_string(),
        Value::Number(serde_json::Number::from(now_unix_seconds())),
    );
    payload.insert("level".to_string(), Value::String(level.as_str().to_string()));
    payload.insert("event".to_string(), Value::String(event.to_string()));

    if let Value::Object(extra) = fields {
        for (key, value) in extra {
            payload.insert(key, value);
        }
    }

    println!("{}", Value::Object(payload));
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{any, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_runtime_config(base_uri: &str) -> StatsRuntimeConfig {
        StatsRuntimeConfig {
            instagram: Some(InstagramCredentials {
                user_id: "17841400000000000".to_string(),
                access_token: "ig-token".to_string(),
            }),
            youtube: Some(YoutubeCredentials {
                api_key: "yt-key".to_string(),
                channel_id: "UC-studio".to_string(),
            }),
            instagram_base_url: format!("{base_uri}/v18.0/"),
            youtube_base_url: format!("{base_uri}/youtube/v3/"),
            request_timeout: Duration::from_millis(DEFAULT_UPSTREAM_REQUEST_TIMEOUT_MS),
            connect_timeout: Duration::from_millis(DEFAULT_UPSTREAM_CONNECT_TIMEOUT_MS),
            log_level: DEFAULT_LOG_LEVEL,
        }
    }

    fn test_state(config: StatsRuntimeConfig) -> AppState {
        AppState {
            client: build_upstream_client(&config).expect("client builds"),
            config,
        }
    }

    async fn call_handler(state: AppState) -> (StatusCode, HeaderMap, String) {
        let response = get_social_stats(
            State(state),
            Method::GET,
            Uri::from_static(SOCIAL_STATS_PATH),
            HeaderMap::new(),
        )
        .await;
        let status = response.status();
        let headers = response.headers().clone();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body reads");

        (
            status,
            headers,
            String::from_utf8(body.to_vec()).expect("utf-8 body"),
        )
    }

    async fn mount_instagram(server: &MockServer, body: Value) {
        Mock::given(method("GET"))
            .and(path("/v18.0/17841400000000000"))
            .and(query_param("fields", INSTAGRAM_FIELDS))
            .and(query_param("access_token", "ig-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .expect(1)
            .mount(server)
            .await;
    }

    async fn mount_youtube(server: &MockServer, body: Value) {
        Mock::given(method("GET"))
            .and(path("/youtube/v3/channels"))
            .and(query_param("part", "statistics"))
            .and(query_param("id", "UC-studio"))
            .and(query_param("key", "yt-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .expect(1)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn aggregates_both_upstreams_into_flat_payload() {
        let server = MockServer::start().await;
        mount_instagram(&server, serde_json::json!({ "followers_count": 1234, "id": "1784" })).await;
        mount_youtube(
            &server,
            serde_json::json!({
                "items": [{ "statistics": { "subscriberCount": "500", "viewCount": "9999" } }]
            }),
        )
        .await;

        let (status, headers, body) = call_handler(test_state(test_runtime_config(&server.uri()))).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            r#"{"instagramFollowers":1234,"youtubeSubscribers":500,"youtubeViews":9999}"#
        );
        assert_eq!(
            headers.get(header::ACCESS_CONTROL_ALLOW_ORIGIN),
            Some(&HeaderValue::from_static("*"))
        );
        assert_eq!(
            headers.get(header::CONTENT_TYPE),
            Some(&HeaderValue::from_static("application/json"))
        );
        assert!(headers.contains_key(REQUEST_ID_HEADER));
    }

    #[tokio::test]
    async fn missing_configuration_returns_nulls_without_outbound_calls() {
        let server = MockServer::start().await;
        Mock::given(any())
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let mut config = test_runtime_config(&server.uri());
        config.instagram = None;
        config.youtube = None;

        let (status, _, body) = call_handler(test_state(config)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            r#"{"instagramFollowers":null,"youtubeSubscribers":null,"youtubeViews":null}"#
        );
    }

    #[tokio::test]
    async fn upstream_error_payload_only_nulls_its_own_fields() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v18.0/17841400000000000"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error": { "message": "Invalid OAuth access token.", "code": 190 }
            })))
            .expect(1)
            .mount(&server)
            .await;
        mount_youtube(
            &server,
            serde_json::json!({
                "items": [{ "statistics": { "subscriberCount": "12", "viewCount": "340" } }]
            }),
        )
        .await;

        let (status, _, body) = call_handler(test_state(test_runtime_config(&server.uri()))).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            r#"{"instagramFollowers":null,"youtubeSubscribers":12,"youtubeViews":340}"#
        );
    }

    #[tokio::test]
    async fn unreachable_upstream_returns_generic_500() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind probe port");
        let unreachable_uri = format!("http://{}", listener.local_addr().expect("probe address"));
        drop(listener);

        let mut config = test_runtime_config(&unreachable_uri);
        config.youtube = None;

        let (status, headers, body) = call_handler(test_state(config)).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, r#"{"error":"Failed to fetch social stats"}"#);
        assert!(headers.get(header::ACCESS_CONTROL_ALLOW_ORIGIN).is_none());
    }

    #[tokio::test]
    async fn non_json_upstream_body_discards_the_other_result() {
        let server = MockServer::start().await;
        mount_instagram(&server, serde_json::json!({ "followers_count": 10 })).await;
        Mock::given(method("GET"))
            .and(path("/youtube/v3/channels"))
            .respond_with(ResponseTemplate::new(502).set_body_string("<html>Bad Gateway</html>"))
            .expect(1)
            .mount(&server)
            .await;

        let (status, _, body) = call_handler(test_state(test_runtime_config(&server.uri()))).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, r#"{"error":"Failed to fetch social stats"}"#);
    }

    #[test]
    fn instagram_url_carries_fields_and_token() {
        let credentials = InstagramCredentials {
            user_id: "1784".to_string(),
            access_token: "secret token".to_string(),
        };

        let url = instagram_profile_url(DEFAULT_INSTAGRAM_GRAPH_BASE_URL, &credentials)
            .expect("valid base URL");
        assert_eq!(
            url.as_str(),
            "https://graph.facebook.com/v18.0/1784?fields=followers_count%2Cmedia_count&access_token=secret+token"
        );
    }

    #[test]
    fn youtube_url_targets_channels_statistics() {
        let credentials = YoutubeCredentials {
            api_key: "key-1".to_string(),
            channel_id: "UC123".to_string(),
        };

        let url = youtube_channels_url(DEFAULT_YOUTUBE_DATA_BASE_URL, &credentials)
            .expect("valid base URL");
        assert_eq!(
            url.as_str(),
            "https://www.googleapis.com/youtube/v3/channels?part=statistics&id=UC123&key=key-1"
        );
    }

    #[test]
    fn invalid_base_url_is_reported() {
        let credentials = YoutubeCredentials {
            api_key: "key-1".to_string(),
            channel_id: "UC123".to_string(),
        };

        let error = youtube_channels_url("not a url", &credentials).expect_err("invalid base");
        assert_eq!(error.error_class(), "invalid_upstream_url");
    }

    #[test]
    fn instagram_without_followers_defaults_to_zero() {
        let outcome = extract_instagram_stats(&serde_json::json!({ "media_count": 3 }));

        assert_eq!(
            outcome,
            UpstreamOutcome::Fetched(InstagramStats { followers: Some(0) })
        );
        assert_eq!(
            extract_instagram_stats(&Value::Null),
            UpstreamOutcome::Rejected
        );
    }

    #[test]
    fn youtube_without_items_is_rejected() {
        assert_eq!(
            extract_youtube_stats(&serde_json::json!({ "items": [] })),
            UpstreamOutcome::Rejected
        );
        assert_eq!(
            extract_youtube_stats(&serde_json::json!({ "pageInfo": { "totalResults": 0 } })),
            UpstreamOutcome::Rejected
        );
        assert_eq!(
            extract_youtube_stats(&serde_json::json!({ "items": [{ "statistics": {} }] })),
            UpstreamOutcome::Fetched(YoutubeStats {
                subscribers: Some(0),
                views: Some(0),
            })
        );
    }

    #[test]
    fn coerce_count_follows_number_coercion() {
        assert_eq!(coerce_count(None), Some(0));
        assert_eq!(coerce_count(Some(&Value::Null)), Some(0));
        assert_eq!(coerce_count(Some(&serde_json::json!(""))), Some(0));
        assert_eq!(coerce_count(Some(&serde_json::json!(1234))), Some(1234));
        assert_eq!(coerce_count(Some(&serde_json::json!(" 500 "))), Some(500));
        assert_eq!(coerce_count(Some(&serde_json::json!("1e3"))), Some(1000));
        assert_eq!(coerce_count(Some(&serde_json::json!("many"))), None);
        assert_eq!(coerce_count(Some(&serde_json::json!(-4))), None);
    }

    #[test]
    fn request_id_header_is_reused_when_present() {
        let mut headers = HeaderMap::new();
        headers.insert(REQUEST_ID_HEADER, HeaderValue::from_static("  edge-42 "));
        assert_eq!(resolve_request_id(&headers), "edge-42");

        assert!(resolve_request_id(&HeaderMap::new()).starts_with("req-"));
    }
}
