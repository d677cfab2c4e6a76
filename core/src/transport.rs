//! The I/O seam between the client and the network.

use async_trait::async_trait;
use reqwest::redirect;

use crate::error::{ApiError, UNKNOWN_ERROR};
use crate::http::{HttpMethod, HttpRequest, HttpResponse};

/// Maximum redirect hops followed by `ReqwestTransport`.
pub const MAX_REDIRECTS: usize = 10;

/// Executes one HTTP exchange.
///
/// Implementations return `ApiError::Transport` when no response was
/// obtained; every received status, including 4xx/5xx, is an `Ok`.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &HttpRequest) -> Result<HttpResponse, ApiError>;
}

/// Production transport backed by `reqwest`.
///
/// Cookies set by the server are stored and sent back on later calls, and
/// redirects are followed.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .cookie_store(true)
            .redirect(redirect::Policy::limited(MAX_REDIRECTS))
            .build()
            .map_err(|e| ApiError::InvalidInput(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

fn to_reqwest_method(method: HttpMethod) -> reqwest::Method {
    match method {
        HttpMethod::Get => reqwest::Method::GET,
        HttpMethod::Post => reqwest::Method::POST,
        HttpMethod::Put => reqwest::Method::PUT,
        HttpMethod::Delete => reqwest::Method::DELETE,
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: &HttpRequest) -> Result<HttpResponse, ApiError> {
        let mut builder = self
            .client
            .request(to_reqwest_method(request.method), &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_builder() {
                ApiError::Request {
                    url: request.url.clone(),
                    message: e.to_string(),
                }
            } else {
                ApiError::Transport {
                    url: request.url.clone(),
                    message: e.to_string(),
                }
            }
        })?;

        let status = response.status();

        let body = match response.text().await {
            Ok(body) => body,
            Err(_) if !status.is_success() => UNKNOWN_ERROR.to_string(),
            Err(e) => {
                return Err(ApiError::Transport {
                    url: request.url.clone(),
                    message: format!("failed to read response body: {e}"),
                })
            }
        };

        Ok(HttpResponse {
            status: status.as_u16(),
            body,
        })
    }
}
