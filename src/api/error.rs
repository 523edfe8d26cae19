use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::api::types::ErrorResponse;
use crate::provider::ProviderError;

/// Every way `/api/generate` can fail. All of them answer HTTP 500.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("missing credential")]
    MissingCredential,

    #[error("{0}")]
    InvalidRequest(String),

    /// The provider reported `failed` or `canceled`. Detail is logged, not returned.
    #[error("generation failed")]
    GenerationFailed,

    #[error("generation timed out")]
    TimedOut,

    #[error(transparent)]
    Provider(#[from] ProviderError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}
