// Query orchestration: question -> (translate | template) -> validate ->
// execute -> shape -> recommend -> summarize.
//
// Every backend and collaborator fault is converted to a typed outcome
// here; the presentation layer only ever sees an AskResponse or an
// AppError with a plain-language message.

use crate::api::middleware::AppError;
use crate::config::Config;
use crate::models::{
    AskResponse, AskStatus, ConversationTurn, QueryProvenance, TRANSPORT_ROW_CAP,
};
use crate::services::charts::recommend;
use crate::services::fallback::template_query;
use crate::services::session::Session;
use crate::services::shaping::shape;
use crate::services::summary::{
    SummaryService, EMPTY_RESULT_SUMMARY, QUERY_FAILED_SUMMARY,
};
use crate::services::translator::TranslationService;
use crate::validation::{SqlValidator, DEFAULT_ROW_LIMIT};

/// Reply for chat questions when the collaborator is unavailable.
const CHAT_FALLBACK: &str = "Sorry, I couldn't answer that right now.";

pub struct AskService {
    translator: TranslationService,
    summarizer: SummaryService,
}

impl AskService {
    pub fn new(config: &Config) -> Self {
        Self {
            translator: TranslationService::new(config),
            summarizer: SummaryService::new(config),
        }
    }

    pub async fn ask(&self, session: &Session, question: &str) -> Result<AskResponse, AppError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(AppError::Validation("Question cannot be empty".to_string()));
        }

        let (kind, schema, schema_text, history) =
            session.translation_context().await.ok_or_else(|| {
                AppError::NotFound("No active data source. Connect to one first.".to_string())
            })?;

        // Chat path: interrogative questions get a free-text answer, not a
        // query.
        if is_chat_question(question) {
            let answer = self
                .translator
                .generate_chat_answer(question, &schema_text, &history)
                .await
                .unwrap_or_else(|| CHAT_FALLBACK.to_string());
            session
                .record_turn(ConversationTurn::chat_turn(
                    question.to_string(),
                    answer.clone(),
                ))
                .await;
            return Ok(AskResponse::chat(answer));
        }

        // Translate; anything short of a usable query falls back to the
        // template strategy, tagged as such.
        let collaborator_sql = self
            .translator
            .generate_sql(question, &schema_text, &history, kind)
            .await
            .and_then(|sql| match SqlValidator::validate_and_prepare(&sql, DEFAULT_ROW_LIMIT) {
                Ok(prepared) => Some((sql, prepared)),
                Err(e) => {
                    tracing::warn!("Collaborator query rejected ({}); using template", e);
                    None
                }
            });

        let (sql, (prepared_sql, limit_applied), provenance) = match collaborator_sql {
            Some((sql, prepared)) => (sql, prepared, QueryProvenance::Llm),
            None => {
                let sql = template_query(question, &schema).ok_or_else(|| {
                    AppError::Validation(
                        "The connected data source has no tables to query".to_string(),
                    )
                })?;
                let prepared = SqlValidator::validate_and_prepare(&sql, DEFAULT_ROW_LIMIT)?;
                (sql, prepared, QueryProvenance::Template)
            }
        };

        if limit_applied {
            tracing::debug!("Row cap appended to generated query");
        }
        tracing::info!("Executing {:?} query: {}", provenance, prepared_sql);

        // One turn per successful question, recorded once a query exists.
        session
            .record_turn(ConversationTurn::sql_turn(
                question.to_string(),
                sql.clone(),
            ))
            .await;

        let outcome = match session.execute(&prepared_sql).await {
            Ok(outcome) => outcome,
            Err(AppError::QueryExecution(detail)) => {
                // Internal detail is logged, never shown.
                tracing::error!("Query execution failed: {}", detail);
                return Ok(AskResponse::query_failed(
                    sql,
                    provenance,
                    QUERY_FAILED_SUMMARY.to_string(),
                ));
            }
            Err(other) => return Err(other),
        };

        if outcome.table.row_count() == 0 {
            return Ok(AskResponse {
                sql: Some(sql),
                provenance: Some(provenance),
                rows: Some(Vec::new()),
                row_count: Some(0),
                summary: EMPTY_RESULT_SUMMARY.to_string(),
                charts: Vec::new(),
                chat_answer: None,
                status: AskStatus::Empty,
                degraded: outcome.fallback_prefix,
            });
        }

        let shaped = shape(outcome.table, question);
        let charts = recommend(&shaped, question);
        let summary = self.summarizer.summarize(question, &shaped).await;

        let row_count = shaped.row_count();
        let rows: Vec<_> = shaped.rows.into_iter().take(TRANSPORT_ROW_CAP).collect();

        Ok(AskResponse {
            sql: Some(sql),
            provenance: Some(provenance),
            rows: Some(rows),
            row_count: Some(row_count),
            summary,
            charts,
            chat_answer: None,
            status: AskStatus::Ok,
            degraded: outcome.fallback_prefix,
        })
    }
}

/// Simple intent detection: interrogative prefixes take the chat path.
fn is_chat_question(question: &str) -> bool {
    let lowered = question.to_lowercase();
    ["what is", "is this", "why", "who", "explain"]
        .iter()
        .any(|prefix| lowered.starts_with(prefix))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        ChartKind, ResultTable, SchemaDescriptor, SCHEMA_UNAVAILABLE,
    };
    use crate::services::backend::{BackendKind, QueryBackend, QueryOutcome};
    use serde_json::json;

    /// Backend double with a fixed schema and canned responses.
    struct CannedBackend {
        schema: SchemaDescriptor,
        response: CannedResponse,
    }

    enum CannedResponse {
        Table(ResultTable),
        Failure(String),
    }

    #[async_trait::async_trait]
    impl QueryBackend for CannedBackend {
        fn kind(&self) -> BackendKind {
            BackendKind::Relational
        }

        fn schema(&self) -> &SchemaDescriptor {
            &self.schema
        }

        fn schema_text(&self) -> String {
            if self.schema.is_empty() {
                SCHEMA_UNAVAILABLE.to_string()
            } else {
                self.schema.to_schema_text()
            }
        }

        async fn run_query(&self, _sql: &str) -> Result<QueryOutcome, AppError> {
            match &self.response {
                CannedResponse::Table(table) => Ok(QueryOutcome::full(table.clone())),
                CannedResponse::Failure(msg) => Err(AppError::QueryExecution(msg.clone())),
            }
        }
    }

    fn sales_schema() -> SchemaDescriptor {
        use crate::models::{ColumnDescriptor, TableDescriptor};
        let column = |name: &str, ty: &str| ColumnDescriptor {
            name: name.to_string(),
            data_type: ty.to_string(),
        };
        SchemaDescriptor::new(vec![
            TableDescriptor {
                name: "products".to_string(),
                columns: vec![column("product_id", "TEXT"), column("category", "TEXT")],
            },
            TableDescriptor {
                name: "sales".to_string(),
                columns: vec![
                    column("product_id", "TEXT"),
                    column("quantity_sold", "INTEGER"),
                    column("sale_price", "REAL"),
                ],
            },
        ])
    }

    fn category_table() -> ResultTable {
        let rows = vec![
            [
                ("category".to_string(), json!("Electronics")),
                ("total_sales".to_string(), json!(10750.0)),
            ]
            .into_iter()
            .collect(),
            [
                ("category".to_string(), json!("Books")),
                ("total_sales".to_string(), json!(910.0)),
            ]
            .into_iter()
            .collect(),
        ];
        ResultTable::new(
            vec!["category".to_string(), "total_sales".to_string()],
            rows,
        )
    }

    async fn session_with(backend: CannedBackend) -> Session {
        let session = Session::new();
        session
            .install_backend(Box::new(backend), "test".to_string())
            .await;
        session
    }

    fn ask_service() -> AskService {
        AskService::new(&Config::for_tests())
    }

    #[tokio::test]
    async fn test_template_path_end_to_end() {
        let session = session_with(CannedBackend {
            schema: sales_schema(),
            response: CannedResponse::Table(category_table()),
        })
        .await;

        let response = ask_service()
            .ask(&session, "total sales by category")
            .await
            .unwrap();

        assert_eq!(response.status, AskStatus::Ok);
        assert_eq!(response.provenance, Some(QueryProvenance::Template));
        let sql = response.sql.unwrap();
        assert!(sql.starts_with("SELECT p.category, SUM(s.sale_price * s.quantity_sold)"));
        assert_eq!(response.row_count, Some(2));
        assert!(!response.degraded);

        // Primary recommendation is a bar over the first dimension/measure.
        assert_eq!(response.charts[0].kind, ChartKind::Bar);
        assert_eq!(response.charts[0].label_column, "category");
        assert_eq!(response.charts[0].value_column, "total_sales");

        // The turn was recorded.
        assert_eq!(session.status().await.turns, 1);
    }

    #[tokio::test]
    async fn test_chat_path_records_answer_turn() {
        let session = session_with(CannedBackend {
            schema: sales_schema(),
            response: CannedResponse::Table(category_table()),
        })
        .await;

        let response = ask_service()
            .ask(&session, "what is this database about?")
            .await
            .unwrap();

        assert_eq!(response.status, AskStatus::Chat);
        assert!(response.sql.is_none());
        assert!(response.charts.is_empty());
        assert_eq!(response.chat_answer.as_deref(), Some(CHAT_FALLBACK));
        assert_eq!(session.status().await.turns, 1);
    }

    #[tokio::test]
    async fn test_query_failure_is_a_summary_not_an_error() {
        let session = session_with(CannedBackend {
            schema: sales_schema(),
            response: CannedResponse::Failure("no such table: categories".to_string()),
        })
        .await;

        let response = ask_service()
            .ask(&session, "total sales by category")
            .await
            .unwrap();

        assert_eq!(response.status, AskStatus::QueryError);
        assert_eq!(response.summary, QUERY_FAILED_SUMMARY);
        // Internal detail is not exposed.
        assert!(!response.summary.contains("no such table"));
        assert!(response.rows.is_none());
    }

    #[tokio::test]
    async fn test_empty_result_is_distinct_from_failure() {
        let empty = ResultTable::new(vec!["category".to_string()], Vec::new());
        let session = session_with(CannedBackend {
            schema: sales_schema(),
            response: CannedResponse::Table(empty),
        })
        .await;

        let response = ask_service()
            .ask(&session, "total sales by category")
            .await
            .unwrap();

        assert_eq!(response.status, AskStatus::Empty);
        assert_eq!(response.summary, EMPTY_RESULT_SUMMARY);
        assert_eq!(response.rows, Some(Vec::new()));
        assert!(response.charts.is_empty());
    }

    #[tokio::test]
    async fn test_disconnected_session_is_not_found() {
        let session = Session::new();
        let result = ask_service().ask(&session, "anything").await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_empty_question_is_rejected() {
        let session = Session::new();
        let result = ask_service().ask(&session, "   ").await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_fallback_query_is_stable_across_turns() {
        let session = session_with(CannedBackend {
            schema: sales_schema(),
            response: CannedResponse::Table(category_table()),
        })
        .await;
        let service = ask_service();

        let mut seen = None;
        for _ in 0..3 {
            let response = service
                .ask(&session, "total sales by category")
                .await
                .unwrap();
            let sql = response.sql.unwrap();
            if let Some(prev) = &seen {
                assert_eq!(&sql, prev, "fallback generation must be history-independent");
            }
            seen = Some(sql);
        }
    }
}
