//! Planfix REST client.
//!
//! Everything that talks to Planfix goes through the [`PlanfixApi`] trait so
//! tools, the directory resolver and the metadata cache can be exercised
//! against an in-process mock.

use async_trait::async_trait;
use reqwest::Client;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};

use super::cache::{RequestCache, cache_key};
use super::error::{PlanfixError, PlanfixResult};
use crate::core::config::PlanfixConfig;

/// HTTP verb of a Planfix call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    #[default]
    Post,
    Delete,
}

impl HttpMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Delete => "DELETE",
        }
    }
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single call: path relative to the REST root, verb, JSON body and an
/// optional cache lifetime in seconds.
#[derive(Debug, Clone, PartialEq)]
pub struct PlanfixRequest {
    pub path: String,
    pub method: HttpMethod,
    pub body: Option<Value>,
    pub cache_time: Option<u64>,
}

impl PlanfixRequest {
    pub fn new(method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            method,
            body: None,
            cache_time: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, path)
    }

    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self::new(HttpMethod::Post, path).with_body(body)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Delete, path)
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Cache the response for `seconds`; zero disables caching.
    pub fn with_cache(mut self, seconds: u64) -> Self {
        self.cache_time = Some(seconds).filter(|s| *s > 0);
        self
    }

    pub fn cache_key(&self) -> String {
        cache_key(&self.path, self.method.as_str(), self.body.as_ref())
    }
}

/// Append URL-encoded query parameters to a path.
pub fn with_query(path: &str, params: &[(&str, &str)]) -> String {
    if params.is_empty() {
        return path.to_string();
    }
    match serde_urlencoded::to_string(params) {
        Ok(query) => format!("{}?{}", path, query),
        Err(_) => path.to_string(),
    }
}

#[async_trait]
pub trait PlanfixApi: Send + Sync {
    /// Issue a request and return the parsed JSON body.
    async fn request(&self, request: PlanfixRequest) -> PlanfixResult<Value>;
}

/// Shared handle to whatever implements the API.
pub type SharedApi = Arc<dyn PlanfixApi>;

// ============================================================================
// HTTP implementation
// ============================================================================

/// Async reqwest client authenticated with a bearer token.
pub struct PlanfixClient {
    http: Client,
    base_url: String,
    token: String,
}

impl std::fmt::Debug for PlanfixClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlanfixClient")
            .field("base_url", &self.base_url)
            .field("token", &"[REDACTED]")
            .finish()
    }
}

impl PlanfixClient {
    pub fn from_config(config: &PlanfixConfig) -> PlanfixResult<Self> {
        let base_url = config
            .rest_url()
            .ok_or_else(|| PlanfixError::not_configured("set PLANFIX_ACCOUNT or PLANFIX_BASE_URL"))?;
        let token = config
            .token
            .clone()
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| PlanfixError::not_configured("set PLANFIX_TOKEN"))?;

        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

#[async_trait]
impl PlanfixApi for PlanfixClient {
    #[instrument(skip_all, fields(method = %request.method, path = %request.path))]
    async fn request(&self, request: PlanfixRequest) -> PlanfixResult<Value> {
        let url = self.url(&request.path);
        let builder = match request.method {
            HttpMethod::Get => self.http.get(&url),
            HttpMethod::Post => self.http.post(&url),
            HttpMethod::Delete => self.http.delete(&url),
        };
        let builder = builder
            .bearer_auth(&self.token)
            .header(reqwest::header::ACCEPT, "application/json");
        let builder = match &request.body {
            Some(body) if request.method != HttpMethod::Get => builder.json(body),
            _ => builder,
        };

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let text = response.text().await?;
        debug!("Planfix responded {} ({} bytes)", status, text.len());

        parse_response(status, &text)
    }
}

/// Turn a raw Planfix response into JSON or an API error.
pub fn parse_response(status: u16, text: &str) -> PlanfixResult<Value> {
    let body: Option<Value> = if text.trim().is_empty() {
        None
    } else {
        serde_json::from_str(text).ok()
    };

    if !(200..300).contains(&status) {
        let message = body
            .as_ref()
            .and_then(error_message)
            .unwrap_or_else(|| {
                if text.trim().is_empty() {
                    format!("HTTP {}", status)
                } else {
                    text.trim().to_string()
                }
            });
        return Err(PlanfixError::api(status, message));
    }

    let Some(body) = body else {
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        return Err(PlanfixError::invalid_response("response body is not JSON"));
    };

    if body.get("result").and_then(Value::as_str) == Some("fail") {
        let message = error_message(&body).unwrap_or_else(|| "request failed".to_string());
        return Err(PlanfixError::api(status, message));
    }

    Ok(body)
}

fn error_message(body: &Value) -> Option<String> {
    ["error", "message"]
        .iter()
        .find_map(|key| body.get(*key).and_then(Value::as_str))
        .map(str::to_string)
}

/// Stand-in used when credentials are missing; every call fails with
/// [`PlanfixError::NotConfigured`].
pub struct Unconfigured {
    reason: String,
}

impl Unconfigured {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl PlanfixApi for Unconfigured {
    async fn request(&self, _request: PlanfixRequest) -> PlanfixResult<Value> {
        Err(PlanfixError::not_configured(self.reason.clone()))
    }
}

// ============================================================================
// Caching decorator
// ============================================================================

/// Serves requests that carry a `cache_time` from the request cache and
/// stores fresh responses there.
pub struct CachingApi {
    inner: SharedApi,
    cache: RequestCache,
}

impl CachingApi {
    pub fn new(inner: SharedApi, cache: RequestCache) -> Self {
        Self { inner, cache }
    }

    pub fn cache(&self) -> &RequestCache {
        &self.cache
    }
}

#[async_trait]
impl PlanfixApi for CachingApi {
    async fn request(&self, request: PlanfixRequest) -> PlanfixResult<Value> {
        let Some(ttl) = request.cache_time.filter(|t| *t > 0) else {
            return self.inner.request(request).await;
        };

        let key = request.cache_key();
        if let Some(cached) = self.cache.get_async::<Value>(&key).await {
            return Ok(cached);
        }

        let response = self.inner.request(request).await?;
        self.cache.set_async(&key, response.clone(), Some(ttl)).await;
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::planfix::mock::MockApi;
    use serde_json::json;
    use tokio_test::{assert_err, assert_ok};

    #[test]
    fn test_parse_success() {
        let body = assert_ok!(parse_response(200, r#"{"result":"success","id":5}"#));
        assert_eq!(body["id"], 5);
        assert_eq!(assert_ok!(parse_response(204, "")), Value::Null);
    }

    #[test]
    fn test_parse_error_status_uses_body_message() {
        let err = assert_err!(parse_response(400, r#"{"result":"fail","error":"Bad filter"}"#));
        match err {
            PlanfixError::Api { status, message } => {
                assert_eq!(status, 400);
                assert_eq!(message, "Bad filter");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_parse_error_status_without_body() {
        let err = assert_err!(parse_response(502, ""));
        assert_eq!(err.to_string(), "Planfix API error (502): HTTP 502");
        assert!(assert_err!(parse_response(404, "not here")).is_not_found());
    }

    #[test]
    fn test_parse_fail_result_on_ok_status() {
        let err = assert_err!(parse_response(200, r#"{"result":"fail","error":"No access"}"#));
        assert!(err.to_string().contains("No access"));
    }

    #[test]
    fn test_parse_garbage_body() {
        assert!(matches!(
            parse_response(200, "<html>"),
            Err(PlanfixError::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_with_query_encodes_values() {
        assert_eq!(
            with_query("directory/7", &[("fields", "id,name,fields")]),
            "directory/7?fields=id%2Cname%2Cfields"
        );
        assert_eq!(with_query("task/1", &[]), "task/1");
    }

    #[test]
    fn test_with_cache_zero_disables() {
        assert_eq!(PlanfixRequest::get("report/list").with_cache(0).cache_time, None);
        assert_eq!(PlanfixRequest::get("report/list").with_cache(60).cache_time, Some(60));
    }

    #[test]
    fn test_client_requires_credentials() {
        let config = PlanfixConfig::default();
        assert!(matches!(
            PlanfixClient::from_config(&config),
            Err(PlanfixError::NotConfigured(_))
        ));
    }

    #[tokio::test]
    async fn test_caching_api_serves_second_call_from_cache() {
        let mock = Arc::new(MockApi::new());
        mock.on(HttpMethod::Post, "report/list", json!({"reports": [{"id": 1}]}));
        let api = CachingApi::new(mock.clone(), RequestCache::memory());

        let request = PlanfixRequest::post("report/list", json!({"offset": 0})).with_cache(300);
        let first = assert_ok!(api.request(request.clone()).await);
        let second = assert_ok!(api.request(request).await);

        assert_eq!(first, second);
        assert_eq!(mock.calls("report/list"), 1);
    }

    #[tokio::test]
    async fn test_caching_api_skips_uncached_requests() {
        let mock = Arc::new(MockApi::new());
        mock.on(HttpMethod::Post, "task/", json!({"id": 10}));
        let api = CachingApi::new(mock.clone(), RequestCache::memory());

        let request = PlanfixRequest::post("task/", json!({"name": "Lead"}));
        assert_ok!(api.request(request.clone()).await);
        assert_ok!(api.request(request).await);

        assert_eq!(mock.calls("task/"), 2);
    }

    #[tokio::test]
    async fn test_caching_api_does_not_cache_errors() {
        let mock = Arc::new(MockApi::new());
        mock.fail(HttpMethod::Get, "report/list", 500, "boom");
        let api = CachingApi::new(mock.clone(), RequestCache::memory());

        let request = PlanfixRequest::get("report/list").with_cache(60);
        assert_err!(api.request(request.clone()).await);
        assert_err!(api.request(request).await);
        assert_eq!(mock.calls("report/list"), 2);
    }
}
