use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::chart::ChartRecommendation;

/// Maximum rows shipped to the presentation layer per response.
pub const TRANSPORT_ROW_CAP: usize = 100;

/// Where the executed query came from. Template queries are a last-resort
/// path and must never masquerade as collaborator output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryProvenance {
    Llm,
    Template,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AskStatus {
    Ok,
    Empty,
    QueryError,
    Chat,
}

#[derive(Debug, Deserialize)]
pub struct AskRequest {
    pub question: String,
}

/// Response contract consumed by the presentation layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AskResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sql: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provenance: Option<QueryProvenance>,
    /// Result rows, capped at [`TRANSPORT_ROW_CAP`]; absent on failure and
    /// on the chat path.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rows: Option<Vec<Map<String, Value>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub row_count: Option<usize>,
    pub summary: String,
    /// Ordered chart recommendations; index 0 is the primary one.
    pub charts: Vec<ChartRecommendation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chat_answer: Option<String>,
    pub status: AskStatus,
    /// True when the in-memory backend substituted a data prefix for a
    /// failed query.
    pub degraded: bool,
}

impl AskResponse {
    pub fn chat(question_answer: String) -> Self {
        Self {
            sql: None,
            provenance: None,
            rows: None,
            row_count: None,
            summary: question_answer.clone(),
            charts: Vec::new(),
            chat_answer: Some(question_answer),
            status: AskStatus::Chat,
            degraded: false,
        }
    }

    pub fn query_failed(sql: String, provenance: QueryProvenance, summary: String) -> Self {
        Self {
            sql: Some(sql),
            provenance: Some(provenance),
            rows: None,
            row_count: None,
            summary,
            charts: Vec::new(),
            chat_answer: None,
            status: AskStatus::QueryError,
            degraded: false,
        }
    }
}

/// Session status snapshot for the presentation layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStatus {
    pub connected: bool,
    pub backend: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connection_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connected_at: Option<chrono::DateTime<chrono::Utc>>,
    pub turns: usize,
}
