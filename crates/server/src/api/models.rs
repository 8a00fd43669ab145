//! Request and response data transfer objects for the REST API.
//!
//! Domain request bodies (`BootcampInput`, `CourseInput`, `RegisterInput`)
//! live in `devcamper_core::model`; this module holds the envelopes.

use devcamper_core::document::Document;
use devcamper_core::query::{PageResult, Pagination};
use serde::{Deserialize, Serialize};

pub use devcamper_core::model::bootcamp::BootcampInput;
pub use devcamper_core::model::course::CourseInput;
pub use devcamper_core::model::user::RegisterInput;

/// `{success, count, pagination, data}` for advanced-results listings.
#[derive(Debug, Serialize)]
pub struct ListResponse {
    pub success: bool,
    pub count: usize,
    pub pagination: Pagination,
    pub data: Vec<serde_json::Value>,
}

impl From<PageResult> for ListResponse {
    fn from(page: PageResult) -> Self {
        Self {
            success: true,
            count: page.count,
            pagination: page.pagination,
            data: page.data.iter().map(Document::to_json).collect(),
        }
    }
}

/// `{success, count, data}` for plain, unpaginated listings.
#[derive(Debug, Serialize)]
pub struct PlainListResponse {
    pub success: bool,
    pub count: usize,
    pub data: Vec<serde_json::Value>,
}

impl PlainListResponse {
    pub fn new(docs: &[Document]) -> Self {
        Self {
            success: true,
            count: docs.len(),
            data: docs.iter().map(Document::to_json).collect(),
        }
    }
}

/// `{success, data}` for a single document; `data` is `{}` after a delete.
#[derive(Debug, Serialize)]
pub struct DataResponse {
    pub success: bool,
    pub data: serde_json::Value,
}

impl DataResponse {
    pub fn document(doc: &Document) -> Self {
        Self {
            success: true,
            data: doc.to_json(),
        }
    }

    pub fn empty() -> Self {
        Self {
            success: true,
            data: serde_json::json!({}),
        }
    }
}

/// `{success, token}` after register or login.
#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub success: bool,
    pub token: String,
}

/// Request body for `POST /auth/login`.
#[derive(Debug, Default, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

/// Response for `GET /health`.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub collections_count: usize,
    pub total_documents: usize,
    pub wal_size_bytes: u64,
}
