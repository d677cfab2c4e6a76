//! The server's response envelope.
//!
//! Every body the backend returns is `{"code", "message", "data"}`. Only
//! `code == "success"` hands `data` to the caller.

use serde::{Deserialize, Serialize};

/// Application-level outcome carried in every envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseCode {
    Success,
    Fail,
    NotFound,
    Unauthorized,
    Forbidden,
    ValidateError,
    /// Any code outside the known set; treated as a failure.
    #[serde(other)]
    Unknown,
}

impl ResponseCode {
    pub fn is_success(self) -> bool {
        self == ResponseCode::Success
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub code: ResponseCode,
    #[serde(default)]
    pub message: String,
    pub data: T,
}

/// Page bookkeeping returned alongside a list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Paginator {
    pub total: u64,
    pub total_page: u64,
    pub current_page: u64,
    pub page_size: u64,
}

impl Paginator {
    pub fn has_next(&self) -> bool {
        self.current_page < self.total_page
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaginatedData<T> {
    pub list: Vec<T>,
    pub paginator: Paginator,
}

/// Envelope whose payload is one page of a list.
pub type Paginated<T> = Envelope<PaginatedData<T>>;
