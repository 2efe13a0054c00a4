use axum::{extract::State, Json};

use crate::api::middleware::AppError;
use crate::api::routes::AppState;
use crate::models::{AskRequest, AskResponse};

/// Answer a natural-language question about the connected data source.
pub async fn ask(
    State(state): State<AppState>,
    Json(payload): Json<AskRequest>,
) -> Result<Json<AskResponse>, AppError> {
    let question = payload.question.trim();
    if question.is_empty() {
        return Err(AppError::Validation("Question cannot be empty".to_string()));
    }

    tracing::info!("Processing question: {}", question);
    let response = state.ask_service.ask(&state.session, question).await?;
    Ok(Json(response))
}
