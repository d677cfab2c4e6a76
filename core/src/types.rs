//! Domain DTOs for the app endpoints.
//!
//! # Design
//! These mirror the mock-server's schema but are defined independently;
//! the live integration test catches drift between the two crates.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An app as returned by the API.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct App {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub description: String,
}

/// Request payload for creating an app.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateApp {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

/// Request payload for updating an app. Omitted fields remain unchanged on
/// the server.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateApp {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Body of `POST /app/{id}/debug`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DebugRequest {
    pub query: String,
}

/// Payload of a successful debug call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DebugReply {
    pub content: String,
}

/// Query for a page of the app list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageQuery {
    pub current_page: u64,
    pub page_size: u64,
}

impl Default for PageQuery {
    fn default() -> Self {
        Self {
            current_page: 1,
            page_size: 20,
        }
    }
}
