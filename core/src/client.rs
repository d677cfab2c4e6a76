//! The request client: URL building, retries, timeout and envelope unwrapping.
//!
//! # Design
//! Each call is split into three steps. `build_request` turns a path and
//! `RequestOptions` into an `HttpRequest` without I/O, the `Transport` sends
//! it (retried under the `RetryPolicy`), and `parse_response` unwraps the
//! envelope, again without I/O. The whole send phase, including backoff
//! sleeps, runs under one `tokio::time::timeout`; dropping the future on
//! expiry cancels whatever attempt is in flight and releases the timer.
//!
//! Every failure except a request that could not be built is passed to the
//! injected `Notifier` once before it is returned.

use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::config::ClientConfig;
use crate::endpoint::build_url;
use crate::envelope::Envelope;
use crate::error::ApiError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse};
use crate::notify::{Notifier, TracingNotifier};
use crate::retry::RetryPolicy;
use crate::transport::{ReqwestTransport, Transport};

/// Headers sent with every request unless overridden per call.
pub const DEFAULT_HEADERS: [(&str, &str); 2] = [
    ("accept", "application/json"),
    ("content-type", "application/json"),
];

/// Per-call options: query mapping, JSON body, header overrides, timeout.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestOptions {
    /// Must be a JSON object when present.
    pub query: Option<Value>,
    pub body: Option<Value>,
    /// Merged over `DEFAULT_HEADERS`; names compare case-insensitively.
    pub headers: Vec<(String, String)>,
    /// Overrides the client's default timeout.
    pub timeout: Option<Duration>,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn query(mut self, query: Value) -> Self {
        self.query = Some(query);
        self
    }

    /// Serialize a typed value into the query mapping.
    pub fn query_from<Q: Serialize + ?Sized>(self, query: &Q) -> Result<Self, ApiError> {
        let value = serde_json::to_value(query).map_err(|e| ApiError::Serialization(e.to_string()))?;
        Ok(self.query(value))
    }

    pub fn body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Serialize a typed value into the JSON body.
    pub fn json_body<B: Serialize + ?Sized>(self, body: &B) -> Result<Self, ApiError> {
        let value = serde_json::to_value(body).map_err(|e| ApiError::Serialization(e.to_string()))?;
        Ok(self.body(value))
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Asynchronous client for the envelope API.
///
/// Cheap to clone; clones share the transport and notifier. Concurrent
/// calls are fully independent.
#[derive(Clone)]
pub struct RequestClient {
    base_url: String,
    timeout: Duration,
    retry: RetryPolicy,
    transport: Arc<dyn Transport>,
    notifier: Arc<dyn Notifier>,
}

impl std::fmt::Debug for RequestClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestClient")
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

impl RequestClient {
    /// Client with default timeout, retry policy, `reqwest` transport and
    /// `tracing` notifier.
    pub fn new(base_url: &str) -> Result<Self, ApiError> {
        Self::builder(base_url).build()
    }

    pub fn from_config(config: &ClientConfig) -> Result<Self, ApiError> {
        Self::builder(&config.base_url)
            .timeout(config.timeout())
            .retry_policy(config.retry.clone())
            .build()
    }

    pub fn builder(base_url: &str) -> RequestClientBuilder {
        RequestClientBuilder {
            base_url: base_url.to_string(),
            timeout: Duration::from_millis(crate::config::DEFAULT_TIMEOUT_MS),
            retry: RetryPolicy::default(),
            transport: None,
            notifier: None,
        }
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str, options: RequestOptions) -> Result<T, ApiError> {
        self.request(HttpMethod::Get, path, options).await
    }

    pub async fn post<T: DeserializeOwned>(&self, path: &str, options: RequestOptions) -> Result<T, ApiError> {
        self.request(HttpMethod::Post, path, options).await
    }

    pub async fn put<T: DeserializeOwned>(&self, path: &str, options: RequestOptions) -> Result<T, ApiError> {
        self.request(HttpMethod::Put, path, options).await
    }

    pub async fn delete<T: DeserializeOwned>(&self, path: &str, options: RequestOptions) -> Result<T, ApiError> {
        self.request(HttpMethod::Delete, path, options).await
    }

    /// Build, send and unwrap one call.
    pub async fn request<T: DeserializeOwned>(
        &self,
        method: HttpMethod,
        path: &str,
        options: RequestOptions,
    ) -> Result<T, ApiError> {
        let request = self.build_request(method, path, &options)?;
        let result = self.execute(&request).await;
        if let Err(err) = &result {
            if err.is_reported() {
                self.notifier.notify_error(&err.to_string());
            }
        }
        result
    }

    /// Produce the `HttpRequest` for a call without touching the network.
    pub fn build_request(
        &self,
        method: HttpMethod,
        path: &str,
        options: &RequestOptions,
    ) -> Result<HttpRequest, ApiError> {
        let url = build_url(&self.base_url, path, options.query.as_ref())?;
        let body = options
            .body
            .as_ref()
            .filter(|body| !body.is_null())
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| ApiError::Serialization(e.to_string()))?;
        Ok(HttpRequest {
            method,
            url,
            headers: merge_headers(&options.headers),
            body,
            timeout: options.timeout.unwrap_or(self.timeout),
        })
    }

    /// Unwrap a response: non-2xx becomes `HttpStatus`, a non-success
    /// envelope becomes `Application`, otherwise `data` is returned.
    pub fn parse_response<T: DeserializeOwned>(&self, response: HttpResponse) -> Result<T, ApiError> {
        if !response.is_success() {
            return Err(ApiError::http_status(response.status, &response.body));
        }
        let envelope: Envelope<Option<Value>> = serde_json::from_str(&response.body)
            .map_err(|e| ApiError::Deserialization(e.to_string()))?;
        if !envelope.code.is_success() {
            return Err(ApiError::Application {
                code: envelope.code,
                message: envelope.message,
            });
        }
        serde_json::from_value(envelope.data.unwrap_or(Value::Null))
            .map_err(|e| ApiError::Deserialization(e.to_string()))
    }

    async fn execute<T: DeserializeOwned>(&self, request: &HttpRequest) -> Result<T, ApiError> {
        tracing::debug!(method = %request.method, url = %request.url, "sending request");
        let response = match tokio::time::timeout(request.timeout, self.send_with_retry(request)).await {
            Ok(outcome) => outcome.inspect_err(|err| {
                if let ApiError::Transport { message, .. } | ApiError::Request { message, .. } = err {
                    tracing::error!(url = %request.url, error = %message, "request error");
                }
            })?,
            Err(_) => {
                tracing::error!(url = %request.url, timeout_ms = request.timeout.as_millis() as u64, "request timed out");
                return Err(ApiError::Timeout {
                    url: request.url.clone(),
                    timeout: request.timeout,
                });
            }
        };
        self.parse_response(response)
    }

    async fn send_with_retry(&self, request: &HttpRequest) -> Result<HttpResponse, ApiError> {
        let mut attempt = 0;
        loop {
            let outcome = self.transport.send(request).await;
            let Some(delay) = self.retry.next_delay(request.method, &outcome, attempt) else {
                return outcome;
            };
            attempt += 1;
            match &outcome {
                Ok(response) => tracing::warn!(
                    url = %request.url,
                    status = response.status,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "retrying request"
                ),
                Err(err) => tracing::warn!(
                    url = %request.url,
                    error = %err,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "retrying request"
                ),
            }
            tokio::time::sleep(delay).await;
        }
    }
}

/// Builder for `RequestClient`. Unset transport and notifier fall back to
/// `ReqwestTransport` and `TracingNotifier`.
pub struct RequestClientBuilder {
    base_url: String,
    timeout: Duration,
    retry: RetryPolicy,
    transport: Option<Arc<dyn Transport>>,
    notifier: Option<Arc<dyn Notifier>>,
}

impl RequestClientBuilder {
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn build(self) -> Result<RequestClient, ApiError> {
        let transport = match self.transport {
            Some(transport) => transport,
            None => Arc::new(ReqwestTransport::new()?),
        };
        Ok(RequestClient {
            base_url: self.base_url,
            timeout: self.timeout,
            retry: self.retry,
            transport,
            notifier: self.notifier.unwrap_or_else(|| Arc::new(TracingNotifier)),
        })
    }
}

fn merge_headers(overrides: &[(String, String)]) -> Vec<(String, String)> {
    let mut headers: Vec<(String, String)> = DEFAULT_HEADERS
        .iter()
        .map(|(name, value)| (name.to_string(), value.to_string()))
        .collect();
    for (name, value) in overrides {
        match headers.iter_mut().find(|(key, _)| key.eq_ignore_ascii_case(name)) {
            Some(slot) => slot.1 = value.clone(),
            None => headers.push((name.clone(), value.clone())),
        }
    }
    headers
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use serde_json::json;

    use super::*;
    use crate::envelope::ResponseCode;

    struct Unreachable;

    #[async_trait]
    impl Transport for Unreachable {
        async fn send(&self, _request: &HttpRequest) -> Result<HttpResponse, ApiError> {
            panic!("transport must not be called");
        }
    }

    fn client() -> RequestClient {
        RequestClient::builder("http://localhost:8000/")
            .transport(Arc::new(Unreachable))
            .build()
            .unwrap()
    }

    fn ok(body: &str) -> HttpResponse {
        HttpResponse::new(200, body)
    }

    #[test]
    fn build_request_applies_defaults() {
        let req = client()
            .build_request(HttpMethod::Get, "apps", &RequestOptions::new())
            .unwrap();
        assert_eq!(req.method, HttpMethod::Get);
        assert_eq!(req.url, "http://localhost:8000/apps");
        assert_eq!(req.header("accept"), Some("application/json"));
        assert_eq!(req.header("content-type"), Some("application/json"));
        assert!(req.body.is_none());
        assert_eq!(req.timeout, Duration::from_secs(30));
    }

    #[test]
    fn from_config_applies_timeout_and_base() {
        let config = ClientConfig {
            base_url: "http://10.0.0.2:9000".to_string(),
            timeout_ms: 1500,
            retry: RetryPolicy::none(),
        };
        let client = RequestClient::from_config(&config).unwrap();
        let req = client
            .build_request(HttpMethod::Delete, "/apps/1", &RequestOptions::new())
            .unwrap();
        assert_eq!(req.url, "http://10.0.0.2:9000/apps/1");
        assert_eq!(req.timeout, Duration::from_millis(1500));
    }

    #[test]
    fn per_call_headers_override_defaults_case_insensitively() {
        let options = RequestOptions::new()
            .header("Content-Type", "text/plain")
            .header("x-trace", "abc");
        let req = client()
            .build_request(HttpMethod::Post, "/apps", &options)
            .unwrap();
        assert_eq!(req.headers.len(), 3);
        assert_eq!(req.header("content-type"), Some("text/plain"));
        assert_eq!(req.header("accept"), Some("application/json"));
        assert_eq!(req.header("x-trace"), Some("abc"));
    }

    #[test]
    fn build_request_serializes_body_and_query() {
        let options = RequestOptions::new()
            .query(json!({"page": 2}))
            .body(json!({"query": "hi"}))
            .timeout(Duration::from_millis(10));
        let req = client()
            .build_request(HttpMethod::Post, "/app/1/debug", &options)
            .unwrap();
        assert_eq!(req.url, "http://localhost:8000/app/1/debug?page=2");
        assert_eq!(req.body.as_deref(), Some(r#"{"query":"hi"}"#));
        assert_eq!(req.timeout, Duration::from_millis(10));
    }

    #[test]
    fn null_body_is_omitted() {
        let options = RequestOptions::new().body(Value::Null);
        let req = client()
            .build_request(HttpMethod::Put, "/apps/1", &options)
            .unwrap();
        assert!(req.body.is_none());
    }

    #[test]
    fn build_request_rejects_non_object_query() {
        let options = RequestOptions::new().query(json!([1, 2]));
        let err = client()
            .build_request(HttpMethod::Get, "/apps", &options)
            .unwrap_err();
        assert!(matches!(err, ApiError::InvalidInput(_)));
    }

    #[test]
    fn parse_response_unwraps_success() {
        #[derive(serde::Deserialize, Debug, PartialEq)]
        struct Content {
            content: String,
        }
        let content: Content = client()
            .parse_response(ok(r#"{"code":"success","message":"","data":{"content":"hi"}}"#))
            .unwrap();
        assert_eq!(content.content, "hi");
    }

    #[test]
    fn parse_response_surfaces_application_failure() {
        let err = client()
            .parse_response::<Value>(ok(r#"{"code":"fail","message":"bad input","data":null}"#))
            .unwrap_err();
        match err {
            ApiError::Application { code, message } => {
                assert_eq!(code, ResponseCode::Fail);
                assert_eq!(message, "bad input");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn failure_code_wins_over_mismatched_data() {
        #[derive(serde::Deserialize, Debug)]
        #[allow(dead_code)]
        struct Strict {
            id: u64,
        }
        let err = client()
            .parse_response::<Strict>(ok(r#"{"code":"unauthorized","message":"login first","data":{}}"#))
            .unwrap_err();
        assert_eq!(err.to_string(), "login first");
    }

    #[test]
    fn parse_response_maps_non_2xx_to_http_status() {
        let err = client()
            .parse_response::<Value>(HttpResponse::new(404, "no such route"))
            .unwrap_err();
        assert!(matches!(err, ApiError::HttpStatus { status: 404, ref body } if body == "no such route"));

        let err = client()
            .parse_response::<Value>(HttpResponse::new(500, ""))
            .unwrap_err();
        assert_eq!(err.to_string(), "request failed with status 500");
    }

    #[test]
    fn parse_response_rejects_malformed_envelope() {
        let err = client().parse_response::<Value>(ok("not json")).unwrap_err();
        assert!(matches!(err, ApiError::Deserialization(_)));
    }

    #[test]
    fn unit_payload_accepts_null_data() {
        client()
            .parse_response::<()>(ok(r#"{"code":"success","message":"deleted","data":null}"#))
            .unwrap();
    }
}
