use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::GenerationConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PredictionStatus {
    #[serde(alias = "pending")]
    Starting,
    Processing,
    Succeeded,
    Failed,
    Canceled,
}

impl PredictionStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Canceled)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Starting => "starting",
            Self::Processing => "processing",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Canceled => "canceled",
        }
    }
}

/// A job as reported by the provider. Only read, never written back.
#[derive(Debug, Clone, Deserialize)]
pub struct Prediction {
    pub id: String,
    pub status: PredictionStatus,
    /// Kept as raw JSON so it can be handed back to the caller untouched.
    #[serde(default)]
    pub output: Option<Value>,
    #[serde(default)]
    pub error: Option<Value>,
}

impl Prediction {
    /// Provider error detail as text, for logging.
    pub fn error_detail(&self) -> String {
        match &self.error {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Null) | None => "no detail".to_string(),
            Some(other) => other.to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct CreatePrediction<'a> {
    pub version: &'a str,
    pub input: PredictionInput<'a>,
}

#[derive(Debug, Serialize)]
pub(crate) struct PredictionInput<'a> {
    pub url: &'a str,
    pub prompt: &'a str,
    #[serde(flatten)]
    pub params: &'a GenerationConfig,
}

/// Result of waiting on a prediction.
#[derive(Debug, Clone)]
pub enum WaitOutcome {
    /// The prediction reached a terminal status.
    Finished(Prediction),
    /// The poll budget ran out first.
    TimedOut {
        prediction_id: String,
        elapsed: Duration,
    },
}
