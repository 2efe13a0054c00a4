use axum::{extract::State, Json};
use base64::Engine;
use serde::Deserialize;

use crate::api::middleware::AppError;
use crate::api::routes::AppState;
use crate::services::backend::{SourceDescriptor, UploadFormat};

/// Connect request: either a named relational source or an uploaded
/// tabular byte stream with a declared format.
#[derive(Debug, Deserialize)]
#[serde(tag = "source", rename_all = "lowercase")]
pub enum ConnectRequest {
    Relational {
        #[serde(default)]
        path: Option<String>,
    },
    Upload {
        format: String,
        /// Base64-encoded file contents.
        data: String,
    },
}

/// Connect the session to a data source, replacing any previous one.
pub async fn connect(
    State(state): State<AppState>,
    Json(payload): Json<ConnectRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let source = match payload {
        ConnectRequest::Relational { path } => SourceDescriptor::Relational {
            path: path.unwrap_or_else(|| state.config.database.path.clone()),
        },
        ConnectRequest::Upload { format, data } => {
            let format = match format.to_lowercase().as_str() {
                "csv" => UploadFormat::Csv,
                "spreadsheet" | "xlsx" | "xls" => UploadFormat::Spreadsheet,
                other => {
                    return Err(AppError::Connection(format!(
                        "Unsupported upload format: {}",
                        other
                    )))
                }
            };
            let bytes = base64::engine::general_purpose::STANDARD
                .decode(data.as_bytes())
                .map_err(|e| AppError::Connection(format!("Invalid upload payload: {}", e)))?;
            SourceDescriptor::Upload { format, bytes }
        }
    };

    tracing::info!("Connecting session to new source");
    let schema_text = state.session.connect(source).await?;

    Ok(Json(serde_json::json!({
        "schema": schema_text,
    })))
}

/// Reset the session to its initial empty state.
pub async fn disconnect(State(state): State<AppState>) -> Json<serde_json::Value> {
    state.session.disconnect().await;
    Json(serde_json::json!({ "disconnected": true }))
}

/// Report the current session state.
pub async fn status(State(state): State<AppState>) -> Json<serde_json::Value> {
    let status = state.session.status().await;
    Json(serde_json::to_value(status).unwrap_or_default())
}
