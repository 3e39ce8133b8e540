//! Wire DTOs for the REST boundary (§6). Kept distinct from the engine's own snapshot types so
//! the API shape can evolve independently of internal representations.

use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddDownloadRequest {
    pub url: String,
    pub filename: String,
    pub chunks: u32,
    pub connect_timeout: String,
    pub read_timeout: String,
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: String,
}

impl ApiError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }
}
