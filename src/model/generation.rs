use reqwest::Url;
use serde::{Deserialize, Serialize};

/// The two user inputs forwarded to the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub url: String,
    pub prompt: String,
}

impl GenerationRequest {
    pub fn new(url: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            prompt: prompt.into(),
        }
    }

    /// Checks both fields are present and that `url` is an absolute URL.
    pub fn validate(&self) -> Result<(), String> {
        let url = self.url.trim();
        if url.is_empty() {
            return Err("url is required".into());
        }
        if self.prompt.trim().is_empty() {
            return Err("prompt is required".into());
        }
        Url::parse(url).map_err(|e| format!("url is not a valid URL: {e}"))?;
        Ok(())
    }
}
