//! Client for the hosted image-generation provider (Replicate predictions API).

pub mod client;
pub mod error;
pub mod types;

pub use client::PredictionClient;
pub use error::ProviderError;
pub use types::{Prediction, PredictionStatus, WaitOutcome};
