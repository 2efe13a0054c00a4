use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::api::middleware::AppError;
use crate::models::{ConversationLog, ConversationTurn, SchemaDescriptor, SessionStatus};
use crate::services::backend::{
    create_backend, BackendKind, QueryBackend, QueryOutcome, SourceDescriptor,
};

/// Process-wide session state: which backend is active, its schema, and the
/// conversation history.
///
/// Exactly one session exists; there is no per-user isolation. The backend
/// handle is exclusively owned here and dropped (disposed) on disconnect or
/// when a reconnect replaces it. A `connect` arriving during an in-flight
/// query serializes on the internal lock; the design does not otherwise
/// resolve that race.
pub struct Session {
    inner: Mutex<SessionInner>,
}

struct SessionInner {
    backend: Option<Box<dyn QueryBackend>>,
    schema_text: String,
    history: ConversationLog,
    connection_id: Option<String>,
    source: Option<String>,
    connected_at: Option<DateTime<Utc>>,
}

impl SessionInner {
    fn empty() -> Self {
        Self {
            backend: None,
            schema_text: String::new(),
            history: ConversationLog::new(),
            connection_id: None,
            source: None,
            connected_at: None,
        }
    }
}

impl Session {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(SessionInner::empty()),
        }
    }

    /// Connect to a source, replacing any previous backend wholesale.
    ///
    /// The new backend is built completely before the swap, so a failed
    /// connect leaves the previous session state untouched. Returns the
    /// schema text for the new source.
    pub async fn connect(&self, source: SourceDescriptor) -> Result<String, AppError> {
        let label = match &source {
            SourceDescriptor::Relational { path } => path.clone(),
            SourceDescriptor::Upload { format, .. } => format!("upload ({:?})", format),
        };
        let backend = create_backend(&source).await?;
        Ok(self.install_backend(backend, label).await)
    }

    /// Install a fully-built backend, disposing the previous handle.
    pub(crate) async fn install_backend(
        &self,
        backend: Box<dyn QueryBackend>,
        source: String,
    ) -> String {
        let schema_text = backend.schema_text();
        let mut inner = self.inner.lock().await;
        let previous = inner.backend.take();
        inner.backend = Some(backend);
        inner.schema_text = schema_text.clone();
        inner.history.clear();
        inner.connection_id = Some(uuid::Uuid::new_v4().to_string());
        inner.source = Some(source);
        inner.connected_at = Some(Utc::now());
        // Old handle dropped here, after the new one is installed.
        drop(previous);
        tracing::info!("Session connected to {:?}", inner.source);
        schema_text
    }

    /// Reset to the initial empty state, disposing the backend handle.
    pub async fn disconnect(&self) {
        let mut inner = self.inner.lock().await;
        *inner = SessionInner::empty();
        tracing::info!("Session disconnected");
    }

    pub async fn status(&self) -> SessionStatus {
        let inner = self.inner.lock().await;
        SessionStatus {
            connected: inner.backend.is_some(),
            backend: inner
                .backend
                .as_ref()
                .map(|b| b.kind())
                .unwrap_or(BackendKind::None)
                .as_str()
                .to_string(),
            connection_id: inner.connection_id.clone(),
            source: inner.source.clone(),
            connected_at: inner.connected_at,
            turns: inner.history.len(),
        }
    }

    /// Context needed to translate a question: backend kind, schema
    /// descriptor, schema text and history. `None` when disconnected.
    pub async fn translation_context(
        &self,
    ) -> Option<(BackendKind, SchemaDescriptor, String, ConversationLog)> {
        let inner = self.inner.lock().await;
        inner.backend.as_ref().map(|b| {
            (
                b.kind(),
                b.schema().clone(),
                inner.schema_text.clone(),
                inner.history.clone(),
            )
        })
    }

    /// Execute a query on the active backend.
    pub async fn execute(&self, sql: &str) -> Result<QueryOutcome, AppError> {
        let inner = self.inner.lock().await;
        let backend = inner
            .backend
            .as_ref()
            .ok_or_else(|| AppError::NotFound("No active data source".to_string()))?;
        backend.run_query(sql).await
    }

    pub async fn record_turn(&self, turn: ConversationTurn) {
        let mut inner = self.inner.lock().await;
        inner.history.record(turn);
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ResultTable, SCHEMA_UNAVAILABLE};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    /// Disposal-tracking double: flips its flag when dropped.
    struct TrackedBackend {
        disposed: Arc<AtomicBool>,
        schema: SchemaDescriptor,
    }

    impl TrackedBackend {
        fn new(disposed: Arc<AtomicBool>) -> Self {
            Self {
                disposed,
                schema: SchemaDescriptor::default(),
            }
        }
    }

    impl Drop for TrackedBackend {
        fn drop(&mut self) {
            self.disposed.store(true, Ordering::SeqCst);
        }
    }

    #[async_trait::async_trait]
    impl QueryBackend for TrackedBackend {
        fn kind(&self) -> BackendKind {
            BackendKind::Relational
        }

        fn schema(&self) -> &SchemaDescriptor {
            &self.schema
        }

        fn schema_text(&self) -> String {
            SCHEMA_UNAVAILABLE.to_string()
        }

        async fn run_query(&self, _sql: &str) -> Result<QueryOutcome, AppError> {
            Ok(QueryOutcome::full(ResultTable::empty()))
        }
    }

    #[tokio::test]
    async fn test_reconnect_disposes_previous_handle() {
        let session = Session::new();
        let first_disposed = Arc::new(AtomicBool::new(false));
        let second_disposed = Arc::new(AtomicBool::new(false));

        session
            .install_backend(
                Box::new(TrackedBackend::new(first_disposed.clone())),
                "first".to_string(),
            )
            .await;
        assert!(!first_disposed.load(Ordering::SeqCst));

        session
            .install_backend(
                Box::new(TrackedBackend::new(second_disposed.clone())),
                "second".to_string(),
            )
            .await;

        // Exactly one live handle: the first is disposed, the second not.
        assert!(first_disposed.load(Ordering::SeqCst));
        assert!(!second_disposed.load(Ordering::SeqCst));

        let status = session.status().await;
        assert!(status.connected);
        assert_eq!(status.source.as_deref(), Some("second"));
    }

    #[tokio::test]
    async fn test_disconnect_resets_to_initial_state() {
        let session = Session::new();
        let disposed = Arc::new(AtomicBool::new(false));
        session
            .install_backend(
                Box::new(TrackedBackend::new(disposed.clone())),
                "source".to_string(),
            )
            .await;
        session
            .record_turn(ConversationTurn::sql_turn("q".to_string(), "SELECT 1".to_string()))
            .await;

        session.disconnect().await;

        assert!(disposed.load(Ordering::SeqCst));
        let status = session.status().await;
        assert!(!status.connected);
        assert_eq!(status.backend, "none");
        assert_eq!(status.turns, 0);
    }

    #[tokio::test]
    async fn test_reconnect_clears_history() {
        let session = Session::new();
        session
            .install_backend(
                Box::new(TrackedBackend::new(Arc::new(AtomicBool::new(false)))),
                "a".to_string(),
            )
            .await;
        session
            .record_turn(ConversationTurn::sql_turn("q".to_string(), "SELECT 1".to_string()))
            .await;
        assert_eq!(session.status().await.turns, 1);

        session
            .install_backend(
                Box::new(TrackedBackend::new(Arc::new(AtomicBool::new(false)))),
                "b".to_string(),
            )
            .await;
        assert_eq!(session.status().await.turns, 0);
    }

    #[tokio::test]
    async fn test_execute_without_backend_is_not_found() {
        let session = Session::new();
        let result = session.execute("SELECT 1").await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }
}
