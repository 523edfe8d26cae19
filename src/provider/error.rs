use thiserror::Error;

/// Errors returned while talking to the prediction API.
#[derive(Error, Debug)]
pub enum ProviderError {
    /// The provider answered with a non-success HTTP status.
    #[error("provider returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// The response body was not the prediction shape we expect.
    #[error("invalid provider response: {0}")]
    InvalidResponse(String),

    /// Network-level request failure with context.
    #[error("{context}: {source}")]
    Network {
        context: String,
        source: reqwest::Error,
    },
}

pub type Result<T> = std::result::Result<T, ProviderError>;
