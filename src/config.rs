use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::Serialize;

pub const DEFAULT_API_BASE: &str = "https://api.replicate.com/v1";
pub const DEFAULT_BIND: &str = "0.0.0.0:3000";

/// Shortest delay ever slept between two polls of the same prediction.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(100);
/// Per-call limit for create and poll requests to the provider.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const QR_MODEL_VERSION: &str = "zylim0702/qr_code_controlnet:628e604e13cf63d8ec58bd4d238474e8986b054bc5e1326e50995fdbc851c557";
const NEGATIVE_PROMPT: &str = "blurry, low quality, ugly, disfigured";

/// Fixed model and sampling parameters sent with every prediction.
///
/// None of these are derived from user input; the request only contributes
/// `url` and `prompt`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationConfig {
    #[serde(skip)]
    pub model_version: String,
    pub qr_conditioning_scale: f64,
    pub num_inference_steps: u32,
    pub guidance_scale: f64,
    pub negative_prompt: String,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            model_version: QR_MODEL_VERSION.to_string(),
            qr_conditioning_scale: 1.3,
            num_inference_steps: 20,
            guidance_scale: 7.5,
            negative_prompt: NEGATIVE_PROMPT.to_string(),
        }
    }
}

impl GenerationConfig {
    /// The version id the predictions endpoint expects.
    ///
    /// `owner/name:version` collapses to `version`; a bare id is returned as is.
    pub fn version_id(&self) -> &str {
        match self.model_version.rsplit_once(':') {
            Some((_, id)) if !id.is_empty() => id,
            _ => &self.model_version,
        }
    }
}

/// How long and how often to poll a prediction before giving up.
#[derive(Debug, Clone, PartialEq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_interval: Duration,
    pub multiplier: f64,
    /// `None` waits until the provider reports a terminal status.
    pub timeout: Option<Duration>,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            max_interval: Duration::from_secs(8),
            multiplier: 2.0,
            timeout: Some(Duration::from_secs(120)),
        }
    }
}

impl PollPolicy {
    /// Delay before the first poll, never below [`MIN_POLL_INTERVAL`].
    pub fn first_interval(&self) -> Duration {
        self.interval.max(MIN_POLL_INTERVAL)
    }

    /// Delay to use after `current`, grown by `multiplier` and capped at `max_interval`.
    ///
    /// A multiplier that is NaN, infinite or below 1 keeps the delay constant.
    pub fn next_interval(&self, current: Duration) -> Duration {
        let multiplier = if self.multiplier.is_finite() && self.multiplier >= 1.0 {
            self.multiplier
        } else {
            1.0
        };
        let cap = self.max_interval.max(MIN_POLL_INTERVAL);
        current
            .max(MIN_POLL_INTERVAL)
            .mul_f64(multiplier)
            .min(cap)
    }
}

/// Process configuration, read once at startup.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind: String,
    pub api_base: String,
    /// Absence is not a startup error: every generate request fails instead.
    pub api_token: Option<String>,
    pub request_timeout: Duration,
    pub generation: GenerationConfig,
    pub poll: PollPolicy,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self> {
        let api_token = dotenvy::var("REPLICATE_API_TOKEN")
            .ok()
            .map(|token| token.trim().to_string())
            .filter(|token| !token.is_empty());

        let api_base = dotenvy::var("REPLICATE_API_BASE")
            .ok()
            .map(|value| value.trim().trim_end_matches('/').to_string())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string());

        let bind = dotenvy::var("QRCRAFT_BIND").unwrap_or_else(|_| DEFAULT_BIND.to_string());

        let mut poll = PollPolicy::default();
        if let Some(ms) = env_u64("QRCRAFT_POLL_INTERVAL_MS")? {
            if ms == 0 {
                bail!("QRCRAFT_POLL_INTERVAL_MS must be greater than zero");
            }
            poll.interval = Duration::from_millis(ms);
        }
        if let Some(ms) = env_u64("QRCRAFT_POLL_MAX_INTERVAL_MS")? {
            poll.max_interval = Duration::from_millis(ms);
        }
        if let Some(secs) = env_u64("QRCRAFT_POLL_TIMEOUT_SECS")? {
            poll.timeout = (secs > 0).then(|| Duration::from_secs(secs));
        }
        if poll.max_interval < poll.interval {
            poll.max_interval = poll.interval;
        }

        let request_timeout = match env_u64("QRCRAFT_PROVIDER_TIMEOUT_SECS")? {
            Some(0) => bail!("QRCRAFT_PROVIDER_TIMEOUT_SECS must be greater than zero"),
            Some(secs) => Duration::from_secs(secs),
            None => DEFAULT_REQUEST_TIMEOUT,
        };

        Ok(Self {
            bind,
            api_base,
            api_token,
            request_timeout,
            generation: GenerationConfig::default(),
            poll,
        })
    }
}

fn env_u64(key: &str) -> Result<Option<u64>> {
    match dotenvy::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<u64>()
            .map(Some)
            .with_context(|| format!("{key} must be a non-negative integer, got {raw:?}")),
        Err(_) => Ok(None),
    }
}
