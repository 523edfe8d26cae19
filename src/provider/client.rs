use std::time::{Duration, Instant};

use reqwest::Client;
use tracing::debug;

use crate::config::{GenerationConfig, PollPolicy, DEFAULT_REQUEST_TIMEOUT};
use crate::model::generation::GenerationRequest;
use crate::provider::error::{ProviderError, Result};
use crate::provider::types::*;

fn normalize(api_base: String) -> String {
    api_base.trim_end_matches('/').to_string()
}

/// Async client for the hosted prediction API.
///
/// Cloning is cheap; clones share the underlying connection pool.
#[derive(Debug, Clone)]
pub struct PredictionClient {
    http: Client,
    api_base: String,
    token: String,
    request_timeout: Duration,
}

impl PredictionClient {
    pub fn new(api_base: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            api_base: normalize(api_base.into()),
            token: token.into(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Use a custom `reqwest::Client` (shared pool, proxies, TLS settings).
    pub fn with_http_client(mut self, client: Client) -> Self {
        self.http = client;
        self
    }

    /// Limit applied to each create and poll call.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    /// Submit one prediction for `request` using the fixed `config` parameters.
    pub async fn create_prediction(
        &self,
        config: &GenerationConfig,
        request: &GenerationRequest,
    ) -> Result<Prediction> {
        let url = format!("{}/predictions", self.api_base);
        let body = CreatePrediction {
            version: config.version_id(),
            input: PredictionInput {
                url: &request.url,
                prompt: &request.prompt,
                params: config,
            },
        };

        let resp = self
            .http
            .post(&url)
            .bearer_auth(&self.token)
            .timeout(self.request_timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::Network {
                context: format!("Cannot reach prediction API at {}", self.api_base),
                source: e,
            })?;

        Self::read_prediction(resp, "create").await
    }

    /// Fetch the current state of a prediction.
    pub async fn get_prediction(&self, id: &str) -> Result<Prediction> {
        let url = format!("{}/predictions/{}", self.api_base, id);
        let resp = self
            .http
            .get(&url)
            .bearer_auth(&self.token)
            .timeout(self.request_timeout)
            .send()
            .await
            .map_err(|e| ProviderError::Network {
                context: format!("Failed to poll prediction {id}"),
                source: e,
            })?;

        Self::read_prediction(resp, "poll").await
    }

    /// Poll until `prediction` is terminal or `policy.timeout` elapses.
    ///
    /// The delay between polls starts at `policy.interval` and grows
    /// geometrically up to `policy.max_interval`, never dropping below
    /// [`MIN_POLL_INTERVAL`](crate::config::MIN_POLL_INTERVAL).
    pub async fn wait_for_completion(
        &self,
        mut prediction: Prediction,
        policy: &PollPolicy,
    ) -> Result<WaitOutcome> {
        let start = Instant::now();
        let mut delay = policy.first_interval();

        loop {
            if prediction.status.is_terminal() {
                return Ok(WaitOutcome::Finished(prediction));
            }

            let elapsed = start.elapsed();
            let sleep_for = match policy.timeout {
                Some(limit) if elapsed >= limit => {
                    return Ok(WaitOutcome::TimedOut {
                        prediction_id: prediction.id,
                        elapsed,
                    });
                }
                Some(limit) => delay.min(limit - elapsed),
                None => delay,
            };

            tokio::time::sleep(sleep_for).await;
            prediction = self.get_prediction(&prediction.id).await?;
            debug!(
                prediction_id = %prediction.id,
                status = prediction.status.as_str(),
                "polled prediction"
            );
            delay = policy.next_interval(delay);
        }
    }

    async fn read_prediction(resp: reqwest::Response, op: &str) -> Result<Prediction> {
        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(ProviderError::Http { status, body });
        }

        let text = resp.text().await.map_err(|e| ProviderError::Network {
            context: format!("Failed to read prediction {op} response"),
            source: e,
        })?;

        serde_json::from_str(&text)
            .map_err(|e| ProviderError::InvalidResponse(format!("{op}: {e}")))
    }
}
