use rusqlite::types::ValueRef;
use rusqlite::Connection;
use serde_json::{Map, Number, Value};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::api::middleware::AppError;
use crate::models::{
    ColumnDescriptor, ResultTable, SchemaDescriptor, TableDescriptor, SCHEMA_UNAVAILABLE,
};
use crate::services::backend::{BackendKind, QueryBackend, QueryOutcome};

/// Persistent relational backend over a local SQLite database.
///
/// The connection is exclusively owned by the session that installed it and
/// is closed when the backend is dropped (disconnect or reconnect).
/// Uses tokio::Mutex for async-friendly locking.
pub struct SqliteBackend {
    conn: Arc<Mutex<Connection>>,
    schema: SchemaDescriptor,
    schema_ok: bool,
}

impl SqliteBackend {
    /// Open a database and introspect its schema once.
    ///
    /// A missing or unopenable file is a connection failure; a schema that
    /// cannot be read is not (the sentinel text stands in for it).
    pub async fn open<P: AsRef<Path>>(db_path: P) -> Result<Self, AppError> {
        // Handle SQLite URL format (sqlite:./path or sqlite://path)
        let path_str = db_path.as_ref().to_string_lossy();
        let clean_path: &str = if path_str.starts_with("sqlite:") {
            path_str.trim_start_matches("sqlite:").trim_start_matches("//")
        } else {
            path_str.as_ref()
        };

        if !Path::new(clean_path).exists() {
            return Err(AppError::Connection(format!(
                "Database file not found: {}",
                clean_path
            )));
        }

        let conn = Connection::open(clean_path)
            .map_err(|e| AppError::Connection(format!("Failed to open database: {}", e)))?;
        conn.execute_batch("PRAGMA foreign_keys = ON")
            .map_err(|e| AppError::Connection(format!("Failed to configure database: {}", e)))?;

        let (schema, schema_ok) = match introspect(&conn) {
            Ok(schema) => (schema, true),
            Err(e) => {
                tracing::warn!("Schema introspection failed: {}", e);
                (SchemaDescriptor::default(), false)
            }
        };

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            schema,
            schema_ok,
        })
    }
}

#[async_trait::async_trait]
impl QueryBackend for SqliteBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Relational
    }

    fn schema(&self) -> &SchemaDescriptor {
        &self.schema
    }

    fn schema_text(&self) -> String {
        if self.schema_ok {
            self.schema.to_schema_text()
        } else {
            SCHEMA_UNAVAILABLE.to_string()
        }
    }

    /// Send the query string verbatim to the engine. Any execution error
    /// (syntax, missing table/column) comes back as a typed failure carrying
    /// the engine's message; no retries on this path.
    async fn run_query(&self, sql: &str) -> Result<QueryOutcome, AppError> {
        let conn = self.conn.lock().await;

        let mut stmt = conn
            .prepare(sql)
            .map_err(|e| AppError::QueryExecution(e.to_string()))?;
        let column_names: Vec<String> =
            stmt.column_names().iter().map(|s| s.to_string()).collect();
        let column_count = column_names.len();

        let mut rows = stmt
            .query([])
            .map_err(|e| AppError::QueryExecution(e.to_string()))?;

        let mut out: Vec<Map<String, Value>> = Vec::new();
        loop {
            let row = match rows.next() {
                Ok(Some(row)) => row,
                Ok(None) => break,
                Err(e) => return Err(AppError::QueryExecution(e.to_string())),
            };
            let mut obj = Map::with_capacity(column_count);
            for (idx, name) in column_names.iter().enumerate() {
                let value = row
                    .get_ref(idx)
                    .map_err(|e| AppError::QueryExecution(e.to_string()))?;
                obj.insert(name.clone(), value_ref_to_json(value));
            }
            out.push(obj);
        }

        Ok(QueryOutcome::full(ResultTable::new(column_names, out)))
    }
}

fn value_ref_to_json(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Number(Number::from(i)),
        ValueRef::Real(f) => Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        ValueRef::Text(t) => Value::String(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => {
            let hex: String = b.iter().map(|byte| format!("{:02x}", byte)).collect();
            Value::String(hex)
        }
    }
}

/// Enumerate tables in creation order, columns in declared (cid) order.
fn introspect(conn: &Connection) -> Result<SchemaDescriptor, rusqlite::Error> {
    let mut tables = Vec::new();

    let mut stmt = conn.prepare(
        "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY rowid",
    )?;
    let names: Vec<String> = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<Result<_, _>>()?;

    for name in names {
        let mut col_stmt = conn.prepare(&format!("PRAGMA table_info(\"{}\")", name))?;
        let columns: Vec<ColumnDescriptor> = col_stmt
            .query_map([], |row| {
                Ok(ColumnDescriptor {
                    name: row.get::<_, String>(1)?,
                    data_type: row.get::<_, String>(2)?,
                })
            })?
            .collect::<Result<_, _>>()?;
        tables.push(TableDescriptor { name, columns });
    }

    Ok(SchemaDescriptor::new(tables))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ColumnRole;

    async fn sales_fixture() -> (tempfile::TempDir, SqliteBackend) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sales.db");
        {
            let conn = Connection::open(&path).unwrap();
            conn.execute_batch(
                r#"
                CREATE TABLE products (
                    product_id TEXT PRIMARY KEY,
                    category TEXT NOT NULL,
                    name TEXT NOT NULL,
                    cost REAL NOT NULL
                );
                CREATE TABLE sales (
                    sale_id INTEGER PRIMARY KEY AUTOINCREMENT,
                    sale_date TEXT NOT NULL,
                    product_id TEXT NOT NULL,
                    quantity_sold INTEGER NOT NULL,
                    sale_price REAL NOT NULL
                );
                INSERT INTO products VALUES
                    ('P001', 'Electronics', 'Laptop', 800.0),
                    ('P002', 'Books', 'Python for Data Analysis', 45.5);
                INSERT INTO sales (sale_date, product_id, quantity_sold, sale_price) VALUES
                    ('2024-01-15', 'P001', 5, 950.0),
                    ('2024-03-20', 'P002', 20, 45.5);
                "#,
            )
            .unwrap();
        }
        let backend = SqliteBackend::open(&path).await.unwrap();
        (dir, backend)
    }

    #[tokio::test]
    async fn test_schema_text_lists_tables_in_creation_order() {
        let (_dir, backend) = sales_fixture().await;
        let text = backend.schema_text();
        let products_pos = text.find("Table 'products'").unwrap();
        let sales_pos = text.find("Table 'sales'").unwrap();
        assert!(products_pos < sales_pos);
        assert!(text.contains("category (TEXT)"));
        assert!(text.contains("sale_price (REAL)"));
    }

    #[tokio::test]
    async fn test_run_query_classifies_columns() {
        let (_dir, backend) = sales_fixture().await;
        let outcome = backend
            .run_query("SELECT product_id, category, cost FROM products ORDER BY product_id")
            .await
            .unwrap();
        assert!(!outcome.fallback_prefix);
        let table = outcome.table;
        assert_eq!(table.row_count(), 2);
        assert_eq!(table.columns[0].role, ColumnRole::Identifier);
        assert_eq!(table.columns[1].role, ColumnRole::Categorical);
        assert_eq!(table.columns[2].role, ColumnRole::Numeric);
    }

    #[tokio::test]
    async fn test_execution_error_is_typed_failure() {
        let (_dir, backend) = sales_fixture().await;
        let err = backend.run_query("SELECT * FROM no_such_table").await;
        match err {
            Err(AppError::QueryExecution(msg)) => assert!(msg.contains("no_such_table")),
            other => panic!("expected QueryExecution error, got {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn test_empty_result_is_not_an_error() {
        let (_dir, backend) = sales_fixture().await;
        let outcome = backend
            .run_query("SELECT category FROM products WHERE cost > 10000")
            .await
            .unwrap();
        assert_eq!(outcome.table.row_count(), 0);
        // Columns survive even with zero rows.
        assert_eq!(outcome.table.column_count(), 1);
    }

    #[tokio::test]
    async fn test_missing_file_is_connection_failure() {
        let result = SqliteBackend::open("/nonexistent/nowhere.db").await;
        assert!(matches!(result, Err(AppError::Connection(_))));
    }
}
