use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Serialize, Deserialize)]
pub struct GenerateResponse {
    /// Provider output passed through as-is, normally a list of image URLs.
    #[serde(rename = "imageUrl")]
    pub image_url: Value,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}
