//! Route handlers.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;

use bookchat_core::types::{ChatRequest, ChatResponse};

use crate::error::ApiError;
use crate::state::AppState;

/// POST /chat - answer one customer question.
///
/// Once the body parses, the response is always 200; failures inside the
/// pipeline surface as fixed messages in `content`.
pub async fn chat(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, ApiError> {
    let Json(request) = payload.map_err(|rejection| {
        tracing::debug!(error = %rejection, "Rejected chat request body");
        ApiError::from(rejection)
    })?;

    let response = state.orchestrator.handle(&request).await;
    Ok(Json(response))
}
