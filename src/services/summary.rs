use reqwest::Client as HttpClient;
use serde_json::json;

use crate::config::Config;
use crate::models::ResultTable;

/// Fallback text when the summary collaborator is unavailable or fails.
pub const FALLBACK_SUMMARY: &str = "Here are the results for your query.";

/// Fixed summaries for the non-success paths; these never come from the
/// collaborator.
pub const EMPTY_RESULT_SUMMARY: &str =
    "The query ran successfully but returned no data.";
pub const QUERY_FAILED_SUMMARY: &str = "I couldn't run that query against your data.";

/// Rows from the shaped table included in the summary request.
const SAMPLE_ROWS: usize = 5;

/// Client for the external insight-summary collaborator. It receives the
/// *shaped* table (counts plus a small sample) and returns a one-sentence
/// summary; any failure degrades to fixed text, never an error.
pub struct SummaryService {
    gateway_url: String,
    api_key: Option<String>,
    http_client: HttpClient,
}

impl SummaryService {
    pub fn new(config: &Config) -> Self {
        Self {
            gateway_url: config.llm.gateway_url.clone(),
            api_key: config.llm.api_key.clone(),
            http_client: HttpClient::new(),
        }
    }

    pub async fn summarize(&self, question: &str, table: &ResultTable) -> String {
        if self.gateway_url.is_empty() {
            return FALLBACK_SUMMARY.to_string();
        }

        let sample: Vec<_> = table.rows.iter().take(SAMPLE_ROWS).collect();
        let prompt = format!(
            "You are a principal data analyst. Provide a concise, one-sentence summary of \
             the main finding in this query result.\n\
             **User's Request:** \"{}\"\n\
             **Columns:** {:?}\n\
             **Row Count:** {}\n\
             **Data Sample:**\n{}\n\
             **Your Summary:**",
            question,
            table.column_names(),
            table.row_count(),
            serde_json::to_string(&sample).unwrap_or_default(),
        );

        let mut request = self.http_client.post(&self.gateway_url).json(&json!({
            "prompt": prompt,
            "max_tokens": 120,
            "temperature": 0.2,
        }));
        if let Some(api_key) = &self.api_key {
            request = request.header("Authorization", format!("Bearer {}", api_key));
        }

        let response = match request.send().await {
            Ok(r) if r.status().is_success() => r,
            Ok(r) => {
                tracing::warn!("Summary gateway returned {}", r.status());
                return FALLBACK_SUMMARY.to_string();
            }
            Err(e) => {
                tracing::warn!("Summary call failed: {}", e);
                return FALLBACK_SUMMARY.to_string();
            }
        };

        let payload: serde_json::Value = match response.json().await {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!("Failed to parse summary response: {}", e);
                return FALLBACK_SUMMARY.to_string();
            }
        };

        payload["text"]
            .as_str()
            .or_else(|| payload["content"].as_str())
            .or_else(|| payload["response"].as_str())
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| FALLBACK_SUMMARY.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unconfigured_gateway_uses_fallback_text() {
        let config = Config::for_tests();
        let service = SummaryService::new(&config);
        let summary = service.summarize("anything", &ResultTable::empty()).await;
        assert_eq!(summary, FALLBACK_SUMMARY);
    }
}
