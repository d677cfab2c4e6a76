//! Asynchronous client core for the envelope API.
//!
//! # Overview
//! `RequestClient` offers `get` / `post` / `put` / `delete` against a
//! configured base prefix. Each call builds the full URL, merges default
//! headers, sends through a pluggable `Transport` with retry and backoff,
//! enforces a timeout, and unwraps the server's `{code, message, data}`
//! envelope into the caller's type.
//!
//! # Design
//! - Request building and response parsing are pure; only the `Transport`
//!   performs I/O.
//! - Retry behavior is a `RetryPolicy` value, not hidden middleware.
//! - Failures are `ApiError` variants, and each reported failure also goes
//!   to the injected `Notifier`.
//! - DTOs are defined independently from the mock-server crate; the live
//!   integration test catches schema drift.

pub mod client;
pub mod config;
pub mod endpoint;
pub mod envelope;
pub mod error;
pub mod http;
pub mod notify;
pub mod retry;
pub mod services;
pub mod transport;
pub mod types;

pub use client::{RequestClient, RequestClientBuilder, RequestOptions};
pub use config::ClientConfig;
pub use envelope::{Envelope, Paginated, PaginatedData, Paginator, ResponseCode};
pub use error::{ApiError, ErrorKind};
pub use http::{HttpMethod, HttpRequest, HttpResponse};
pub use notify::{ChannelNotifier, Notifier, TracingNotifier};
pub use retry::RetryPolicy;
pub use services::AppService;
pub use transport::{ReqwestTransport, Transport};
pub use types::{App, CreateApp, DebugReply, PageQuery, UpdateApp};
