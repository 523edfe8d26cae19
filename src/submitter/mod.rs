//! Client side of the generate exchange: one request, one displayable state.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex, MutexGuard,
};
use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::model::GenerationRequest;

pub const FALLBACK_ERROR: &str = "something went wrong while generating the image";
pub const NO_IMAGE_ERROR: &str = "the API returned no image";

/// What the user currently sees.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SubmitterState {
    #[default]
    Idle,
    Loading,
    Failed(String),
    /// URL of the first generated image.
    Ready(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SubmitError {
    /// A submission is already in flight.
    #[error("a generation is already in progress")]
    Busy,

    #[error("{0} is required")]
    MissingField(&'static str),

    #[error("{0}")]
    Failed(String),
}

#[derive(Debug, Default, Deserialize)]
struct ProxyBody {
    #[serde(default, rename = "imageUrl")]
    image_url: Option<Value>,
    #[serde(default)]
    error: Option<String>,
}

/// Map a proxy reply to the first image URL or a user-facing message.
pub fn interpret_response(status: u16, body: &str) -> Result<String, String> {
    let parsed: ProxyBody = serde_json::from_str(body).unwrap_or_default();

    if !(200..300).contains(&status) {
        return Err(parsed
            .error
            .filter(|e| !e.is_empty())
            .unwrap_or_else(|| FALLBACK_ERROR.to_string()));
    }

    parsed
        .image_url
        .as_ref()
        .and_then(Value::as_array)
        .and_then(|urls| urls.first())
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| NO_IMAGE_ERROR.to_string())
}

fn lock(state: &Mutex<SubmitterState>) -> MutexGuard<'_, SubmitterState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Holds the in-flight slot for one `submit` call.
///
/// Dropping it releases the slot, even when the `submit` future is abandoned
/// mid-request; an unfinished call leaves the state `Idle`.
struct InFlight<'a> {
    flag: &'a AtomicBool,
    state: &'a Mutex<SubmitterState>,
    outcome: Option<SubmitterState>,
}

impl<'a> InFlight<'a> {
    fn acquire(flag: &'a AtomicBool, state: &'a Mutex<SubmitterState>) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()?;
        *lock(state) = SubmitterState::Loading;
        Some(Self {
            flag,
            state,
            outcome: None,
        })
    }

    fn finish(mut self, outcome: SubmitterState) {
        self.outcome = Some(outcome);
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        *lock(self.state) = self.outcome.take().unwrap_or_default();
        self.flag.store(false, Ordering::SeqCst);
    }
}

/// Sends generation requests to the proxy and tracks the result.
///
/// Only one request may be in flight; a second `submit` while loading is
/// rejected instead of racing the first.
#[derive(Debug, Clone)]
pub struct Submitter {
    http: Client,
    endpoint: String,
    in_flight: Arc<AtomicBool>,
    state: Arc<Mutex<SubmitterState>>,
}

impl Submitter {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            in_flight: Arc::new(AtomicBool::new(false)),
            state: Arc::new(Mutex::new(SubmitterState::Idle)),
        }
    }

    pub fn with_http_client(mut self, client: Client) -> Self {
        self.http = client;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn state(&self) -> SubmitterState {
        lock(&self.state).clone()
    }

    pub fn is_loading(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Issue one generate call and return the first image URL.
    pub async fn submit(&self, request: &GenerationRequest) -> Result<String, SubmitError> {
        if request.url.trim().is_empty() {
            return Err(SubmitError::MissingField("url"));
        }
        if request.prompt.trim().is_empty() {
            return Err(SubmitError::MissingField("prompt"));
        }

        let Some(slot) = InFlight::acquire(&self.in_flight, &self.state) else {
            return Err(SubmitError::Busy);
        };

        let outcome = self.send(request).await;

        slot.finish(match &outcome {
            Ok(url) => SubmitterState::Ready(url.clone()),
            Err(message) => SubmitterState::Failed(message.clone()),
        });

        outcome.map_err(SubmitError::Failed)
    }

    async fn send(&self, request: &GenerationRequest) -> Result<String, String> {
        let url = format!("{}/api/generate", self.endpoint);
        // Generous: the proxy holds the connection until the prediction is terminal.
        let resp = self
            .http
            .post(&url)
            .timeout(Duration::from_secs(300))
            .json(request)
            .send()
            .await
            .map_err(|e| e.to_string())?;

        let status = resp.status().as_u16();
        let body = resp.text().await.map_err(|e| e.to_string())?;
        interpret_response(status, &body)
    }
}
