use axum::{
    extract::{rejection::JsonRejection, State},
    response::Html,
    Json,
};
use serde_json::Value;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{
    api::{error::ApiError, types::GenerateResponse, AppState},
    model::GenerationRequest,
    provider::{PredictionClient, PredictionStatus, WaitOutcome},
};

const INDEX_HTML: &str = include_str!("../../static/index.html");

pub async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

/// `POST /api/generate`: one prediction per call, answered once it is terminal.
#[tracing::instrument(skip_all, fields(request_id = %Uuid::new_v4()))]
pub async fn generate(
    State(state): State<AppState>,
    payload: Result<Json<GenerationRequest>, JsonRejection>,
) -> Result<Json<GenerateResponse>, ApiError> {
    // Checked before the body so a misconfigured server never touches the network.
    let Some(token) = state.config.api_token.as_deref() else {
        error!("REPLICATE_API_TOKEN is not set; refusing generate request");
        return Err(ApiError::MissingCredential);
    };

    let req = match payload
        .map_err(|e| e.body_text())
        .and_then(|Json(req)| req.validate().map(|()| req))
    {
        Ok(req) => req,
        Err(reason) => {
            warn!(%reason, "rejected generate request");
            return Err(ApiError::InvalidRequest(reason));
        }
    };

    let client = PredictionClient::new(state.config.api_base.clone(), token)
        .with_http_client(state.http.clone())
        .with_request_timeout(state.config.request_timeout);

    match run_generation(&state, &client, &req).await {
        Ok(output) => Ok(Json(GenerateResponse { image_url: output })),
        Err(err) => {
            if let ApiError::Provider(source) = &err {
                error!(error = %source, "generation request failed");
            }
            Err(err)
        }
    }
}

async fn run_generation(
    state: &AppState,
    client: &PredictionClient,
    req: &GenerationRequest,
) -> Result<Value, ApiError> {
    info!(url = %req.url, "creating prediction");
    let prediction = client
        .create_prediction(&state.config.generation, req)
        .await?;
    info!(prediction_id = %prediction.id, "prediction created");

    let prediction = match client
        .wait_for_completion(prediction, &state.config.poll)
        .await?
    {
        WaitOutcome::Finished(prediction) => prediction,
        WaitOutcome::TimedOut {
            prediction_id,
            elapsed,
        } => {
            warn!(%prediction_id, ?elapsed, "gave up waiting for prediction");
            return Err(ApiError::TimedOut);
        }
    };

    info!(
        prediction_id = %prediction.id,
        status = prediction.status.as_str(),
        "prediction finished"
    );

    match prediction.status {
        PredictionStatus::Succeeded => {
            let output = prediction.output.unwrap_or(Value::Null);
            info!(output = %output, "generation succeeded");
            Ok(output)
        }
        _ => {
            warn!(
                prediction_id = %prediction.id,
                detail = %prediction.error_detail(),
                "provider reported failure"
            );
            Err(ApiError::GenerationFailed)
        }
    }
}
