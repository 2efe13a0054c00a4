use reqwest::Client as HttpClient;
use serde_json::json;

use crate::config::Config;
use crate::models::ConversationLog;
use crate::services::backend::BackendKind;

/// Client for the external natural-language-to-SQL collaborator.
///
/// The collaborator is an opaque dependency: it receives the question,
/// schema text, bounded history and a source-type hint, and returns raw
/// text. A missing gateway, an HTTP error or non-query text all surface as
/// `None`, and the caller falls back to template queries.
pub struct TranslationService {
    gateway_url: String,
    api_key: Option<String>,
    http_client: HttpClient,
}

impl TranslationService {
    pub fn new(config: &Config) -> Self {
        Self {
            gateway_url: config.llm.gateway_url.clone(),
            api_key: config.llm.api_key.clone(),
            http_client: HttpClient::new(),
        }
    }

    fn configured(&self) -> bool {
        !self.gateway_url.is_empty()
    }

    /// Generate a SQL query for a question, or `None` when no usable query
    /// could be obtained.
    pub async fn generate_sql(
        &self,
        question: &str,
        schema_text: &str,
        history: &ConversationLog,
        kind: BackendKind,
    ) -> Option<String> {
        if !self.configured() {
            tracing::warn!("Translation gateway not configured; using template fallback");
            return None;
        }

        let prompt = sql_prompt(question, schema_text, history, kind);
        match self.call_gateway(&prompt).await {
            Ok(raw) => {
                let query = extract_query(&raw);
                if query.is_none() {
                    tracing::warn!("Translation response contained no query-shaped text");
                }
                query
            }
            Err(e) => {
                tracing::warn!("Translation call failed: {}", e);
                None
            }
        }
    }

    /// Free-text answer for chat-style questions. `None` on any failure.
    pub async fn generate_chat_answer(
        &self,
        question: &str,
        schema_text: &str,
        history: &ConversationLog,
    ) -> Option<String> {
        if !self.configured() {
            return None;
        }

        let prompt = format!(
            "You are a helpful data analyst assistant. Answer the user's question based on \
             the database schema and conversation history. Be concise and helpful.\n\
             **Schema:**\n{}\n\
             **History:**\n{}\n\
             **User's Question:** \"{}\"\n\
             **Your Answer:**",
            schema_text,
            history.format_for_chat_prompt(),
            question
        );

        match self.call_gateway(&prompt).await {
            Ok(raw) => {
                let answer = raw.trim().to_string();
                if answer.is_empty() {
                    None
                } else {
                    Some(answer)
                }
            }
            Err(e) => {
                tracing::warn!("Chat answer call failed: {}", e);
                None
            }
        }
    }

    async fn call_gateway(&self, prompt: &str) -> Result<String, String> {
        let mut request = self.http_client.post(&self.gateway_url).json(&json!({
            "prompt": prompt,
            "max_tokens": 500,
            "temperature": 0.1,
        }));

        if let Some(api_key) = &self.api_key {
            request = request.header("Authorization", format!("Bearer {}", api_key));
        }

        let response = request
            .send()
            .await
            .map_err(|e| format!("Failed to call translation gateway: {}", e))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(format!("Gateway returned {}: {}", status, error_text));
        }

        let result: serde_json::Value = response
            .json()
            .await
            .map_err(|e| format!("Failed to parse gateway response: {}", e))?;

        // Tolerate the common payload field names.
        result["text"]
            .as_str()
            .or_else(|| result["content"].as_str())
            .or_else(|| result["response"].as_str())
            .map(|s| s.to_string())
            .ok_or_else(|| "Gateway response carried no text payload".to_string())
    }
}

fn sql_prompt(
    question: &str,
    schema_text: &str,
    history: &ConversationLog,
    kind: BackendKind,
) -> String {
    let dialect_hints = match kind {
        BackendKind::InMemoryTable => {
            "- The data lives in a single table named df\n\
             - Use standard SQL (SELECT, WHERE, GROUP BY, ORDER BY, LIMIT, aggregates)\n\
             - Do not reference any table other than df"
        }
        _ => {
            "- Your query must be compatible with SQLite syntax\n\
             - Use LIMIT syntax (not TOP or FETCH FIRST)\n\
             - Use double quotes for identifier quoting if needed: \"table_name\""
        }
    };

    format!(
        "You are an expert SQL data analyst. Generate a single SELECT query based on a \
         user's question about the data.\n\
         **Rules:**\n\
         1. Only output the SQL query. No other text, explanations, or markdown.\n\
         2. The query should be a single line of text.\n\
         {dialect_hints}\n\
         **Schema:**\n{schema_text}\n\
         **History:**\n{history}\n\
         **User's Question:** \"{question}\"\n\
         **Generated SQL Query:**",
        dialect_hints = dialect_hints,
        schema_text = schema_text,
        history = history.format_for_sql_prompt(),
        question = question,
    )
}

/// Extract the query payload from collaborator output, stripping markdown
/// fences and surrounding noise. Only SELECT/WITH-shaped text counts.
pub fn extract_query(raw: &str) -> Option<String> {
    let cleaned = raw
        .trim()
        .trim_start_matches("```sql")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();

    if cleaned.is_empty() {
        return None;
    }

    let upper = cleaned.to_uppercase();
    if upper.starts_with("SELECT") || upper.starts_with("WITH") {
        Some(cleaned.to_string())
    } else {
        None
    }
}
