// In-memory SQL backend for uploaded tabular sources.
//
// Uploaded bytes are parsed into Arrow record batches and registered with a
// DataFusion session as a single table named `df`, so the same SQL surface
// works against files without materializing a database.

use calamine::{open_workbook_auto_from_rs, Data, Range, Reader};
use datafusion::arrow::array::{
    Array, ArrayRef, BooleanArray, Float32Array, Float64Array, Int16Array, Int32Array, Int64Array,
    Int8Array, LargeStringArray, RecordBatch, StringArray, UInt16Array, UInt32Array, UInt64Array,
    UInt8Array,
};
use datafusion::arrow::csv::reader::Format;
use datafusion::arrow::csv::ReaderBuilder;
use datafusion::arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use datafusion::arrow::util::display::array_value_to_string;
use datafusion::datasource::MemTable;
use datafusion::prelude::SessionContext;
use serde_json::{Map, Number, Value};
use std::io::Cursor;
use std::sync::Arc;

use crate::api::middleware::AppError;
use crate::models::{
    normalize_column_name, ColumnDescriptor, ResultTable, SchemaDescriptor, TableDescriptor,
    UPLOAD_TABLE_NAME,
};
use crate::services::backend::{BackendKind, QueryBackend, QueryOutcome, UploadFormat};

/// Rows returned by the bounded fallback when a query against the
/// in-memory table fails.
const FALLBACK_PREFIX_ROWS: usize = 20;

/// Sample size for CSV schema inference.
const INFER_RECORDS: usize = 100;

pub struct DataFrameBackend {
    ctx: SessionContext,
    schema: SchemaDescriptor,
    /// Original table contents, kept for the prefix fallback.
    batches: Vec<RecordBatch>,
    arrow_schema: SchemaRef,
}

impl DataFrameBackend {
    /// Build a backend from uploaded bytes with a declared format.
    ///
    /// Empty or unparseable uploads are connection failures; the session is
    /// never left holding a half-built backend.
    pub fn from_upload(format: UploadFormat, bytes: &[u8]) -> Result<Self, AppError> {
        if bytes.is_empty() {
            return Err(AppError::Connection("Uploaded file is empty".to_string()));
        }

        let (arrow_schema, batches) = match format {
            UploadFormat::Csv => parse_csv(bytes)?,
            UploadFormat::Spreadsheet => parse_spreadsheet(bytes)?,
        };

        if arrow_schema.fields().is_empty() {
            return Err(AppError::Connection(
                "Uploaded file contains no columns".to_string(),
            ));
        }

        let config = datafusion::execution::context::SessionConfig::new()
            .with_batch_size(8192)
            .with_target_partitions(num_cpus::get());
        let ctx = SessionContext::new_with_config(config);

        let table = MemTable::try_new(arrow_schema.clone(), vec![batches.clone()])
            .map_err(|e| AppError::Connection(format!("Failed to build in-memory table: {}", e)))?;
        ctx.register_table(UPLOAD_TABLE_NAME, Arc::new(table))
            .map_err(|e| AppError::Connection(format!("Failed to register table: {}", e)))?;

        let schema = SchemaDescriptor::new(vec![TableDescriptor {
            name: UPLOAD_TABLE_NAME.to_string(),
            columns: arrow_schema
                .fields()
                .iter()
                .map(|f| ColumnDescriptor {
                    name: f.name().clone(),
                    data_type: f.data_type().to_string(),
                })
                .collect(),
        }]);

        Ok(Self {
            ctx,
            schema,
            batches,
            arrow_schema,
        })
    }

    async fn execute(&self, sql: &str) -> Result<ResultTable, AppError> {
        let df = self
            .ctx
            .sql(sql)
            .await
            .map_err(|e| AppError::QueryExecution(e.to_string()))?;
        let result_schema: Schema = df.schema().as_arrow().clone();
        let batches = df
            .collect()
            .await
            .map_err(|e| AppError::QueryExecution(e.to_string()))?;
        batches_to_table(&result_schema, &batches)
    }

    fn prefix_table(&self) -> Result<ResultTable, AppError> {
        let table = batches_to_table(self.arrow_schema.as_ref(), &self.batches)?;
        Ok(table.head(FALLBACK_PREFIX_ROWS))
    }
}

#[async_trait::async_trait]
impl QueryBackend for DataFrameBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::InMemoryTable
    }

    fn schema(&self) -> &SchemaDescriptor {
        &self.schema
    }

    fn schema_text(&self) -> String {
        self.schema.to_schema_text()
    }

    /// Execute against the in-memory table. On failure, perform exactly one
    /// bounded fallback: return the first rows of the original table,
    /// flagged as a prefix, instead of propagating the error.
    async fn run_query(&self, sql: &str) -> Result<QueryOutcome, AppError> {
        match self.execute(sql).await {
            Ok(table) => Ok(QueryOutcome::full(table)),
            Err(e) => {
                tracing::warn!(
                    "In-memory query failed ({}); returning first {} rows instead",
                    e,
                    FALLBACK_PREFIX_ROWS
                );
                let table = self.prefix_table()?;
                Ok(QueryOutcome {
                    table,
                    fallback_prefix: true,
                })
            }
        }
    }
}

fn parse_csv(bytes: &[u8]) -> Result<(SchemaRef, Vec<RecordBatch>), AppError> {
    let format = Format::default().with_header(true);
    let (inferred, _) = format
        .infer_schema(Cursor::new(bytes), Some(INFER_RECORDS))
        .map_err(|e| AppError::Connection(format!("Failed to parse CSV: {}", e)))?;

    // Re-key the schema with normalized column names so schema text and
    // generated queries agree on one spelling.
    let fields: Vec<Field> = inferred
        .fields()
        .iter()
        .enumerate()
        .map(|(i, f)| {
            Field::new(
                normalize_column_name(f.name(), i),
                f.data_type().clone(),
                f.is_nullable(),
            )
        })
        .collect();
    let schema = Arc::new(Schema::new(fields));

    let reader = ReaderBuilder::new(schema.clone())
        .with_format(format)
        .build(Cursor::new(bytes))
        .map_err(|e| AppError::Connection(format!("Failed to read CSV: {}", e)))?;
    let batches: Vec<RecordBatch> = reader
        .collect::<Result<_, _>>()
        .map_err(|e| AppError::Connection(format!("Failed to read CSV: {}", e)))?;

    Ok((schema, batches))
}

fn parse_spreadsheet(bytes: &[u8]) -> Result<(SchemaRef, Vec<RecordBatch>), AppError> {
    let cursor = Cursor::new(bytes.to_vec());
    let mut workbook = open_workbook_auto_from_rs(cursor)
        .map_err(|e| AppError::Connection(format!("Failed to open spreadsheet: {}", e)))?;
    let sheet_name = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| AppError::Connection("Spreadsheet has no sheets".to_string()))?;
    let range = workbook
        .worksheet_range(&sheet_name)
        .map_err(|e| AppError::Connection(format!("Failed to read sheet: {}", e)))?;
    batch_from_range(&range)
}

/// First row is the header; each column becomes Float64 when every
/// populated cell is numeric, Utf8 otherwise.
fn batch_from_range(range: &Range<Data>) -> Result<(SchemaRef, Vec<RecordBatch>), AppError> {
    let mut rows = range.rows();
    let header = rows
        .next()
        .ok_or_else(|| AppError::Connection("Spreadsheet is empty".to_string()))?;

    let names: Vec<String> = header
        .iter()
        .enumerate()
        .map(|(i, cell)| normalize_column_name(&cell.to_string(), i))
        .collect();
    if names.is_empty() {
        return Err(AppError::Connection(
            "Spreadsheet has no header row".to_string(),
        ));
    }

    let body: Vec<&[Data]> = rows.collect();

    let mut fields = Vec::with_capacity(names.len());
    let mut arrays: Vec<ArrayRef> = Vec::with_capacity(names.len());
    for (col, name) in names.iter().enumerate() {
        let numeric = body.iter().all(|row| {
            matches!(
                row.get(col),
                None | Some(Data::Empty)
                    | Some(Data::Float(_))
                    | Some(Data::Int(_))
            )
        });
        if numeric {
            let values: Float64Array = body
                .iter()
                .map(|row| match row.get(col) {
                    Some(Data::Float(f)) => Some(*f),
                    Some(Data::Int(i)) => Some(*i as f64),
                    _ => None,
                })
                .collect();
            fields.push(Field::new(name.clone(), DataType::Float64, true));
            arrays.push(Arc::new(values));
        } else {
            let values: StringArray = body
                .iter()
                .map(|row| match row.get(col) {
                    None | Some(Data::Empty) => None,
                    Some(cell) => Some(cell.to_string()),
                })
                .collect();
            fields.push(Field::new(name.clone(), DataType::Utf8, true));
            arrays.push(Arc::new(values));
        }
    }

    let schema = Arc::new(Schema::new(fields));
    let batch = RecordBatch::try_new(schema.clone(), arrays)
        .map_err(|e| AppError::Connection(format!("Failed to build table: {}", e)))?;
    Ok((schema, vec![batch]))
}

/// Convert record batches to the uniform result table, keeping numbers and
/// booleans typed and rendering everything else (dates, timestamps) as text.
fn batches_to_table(schema: &Schema, batches: &[RecordBatch]) -> Result<ResultTable, AppError> {
    let column_names: Vec<String> = schema.fields().iter().map(|f| f.name().clone()).collect();

    let mut rows = Vec::new();
    for batch in batches {
        for row_idx in 0..batch.num_rows() {
            let mut obj = Map::with_capacity(column_names.len());
            for (col_idx, name) in column_names.iter().enumerate() {
                let value = array_value_to_json(batch.column(col_idx), row_idx)
                    .map_err(AppError::Internal)?;
                obj.insert(name.clone(), value);
            }
            rows.push(obj);
        }
    }

    Ok(ResultTable::new(column_names, rows))
}

fn array_value_to_json(array: &ArrayRef, row_idx: usize) -> Result<Value, String> {
    if array.is_null(row_idx) {
        return Ok(Value::Null);
    }

    macro_rules! int_value {
        ($ty:ty) => {{
            let arr = array
                .as_any()
                .downcast_ref::<$ty>()
                .ok_or_else(|| "array type mismatch".to_string())?;
            Ok(Value::Number(Number::from(arr.value(row_idx) as i64)))
        }};
    }

    match array.data_type() {
        DataType::Boolean => {
            let arr = array
                .as_any()
                .downcast_ref::<BooleanArray>()
                .ok_or_else(|| "array type mismatch".to_string())?;
            Ok(Value::Bool(arr.value(row_idx)))
        }
        DataType::Int8 => int_value!(Int8Array),
        DataType::Int16 => int_value!(Int16Array),
        DataType::Int32 => int_value!(Int32Array),
        DataType::Int64 => int_value!(Int64Array),
        DataType::UInt8 => int_value!(UInt8Array),
        DataType::UInt16 => int_value!(UInt16Array),
        DataType::UInt32 => int_value!(UInt32Array),
        DataType::UInt64 => {
            let arr = array
                .as_any()
                .downcast_ref::<UInt64Array>()
                .ok_or_else(|| "array type mismatch".to_string())?;
            Ok(Value::Number(Number::from(arr.value(row_idx))))
        }
        DataType::Float32 => {
            let arr = array
                .as_any()
                .downcast_ref::<Float32Array>()
                .ok_or_else(|| "array type mismatch".to_string())?;
            Ok(Number::from_f64(arr.value(row_idx) as f64)
                .map(Value::Number)
                .unwrap_or(Value::Null))
        }
        DataType::Float64 => {
            let arr = array
                .as_any()
                .downcast_ref::<Float64Array>()
                .ok_or_else(|| "array type mismatch".to_string())?;
            Ok(Number::from_f64(arr.value(row_idx))
                .map(Value::Number)
                .unwrap_or(Value::Null))
        }
        DataType::Utf8 => {
            let arr = array
                .as_any()
                .downcast_ref::<StringArray>()
                .ok_or_else(|| "array type mismatch".to_string())?;
            Ok(Value::String(arr.value(row_idx).to_string()))
        }
        DataType::LargeUtf8 => {
            let arr = array
                .as_any()
                .downcast_ref::<LargeStringArray>()
                .ok_or_else(|| "array type mismatch".to_string())?;
            Ok(Value::String(arr.value(row_idx).to_string()))
        }
        // Dates, timestamps, decimals: render as display text. ISO date
        // text still classifies as temporal downstream.
        _ => array_value_to_string(array, row_idx)
            .map(Value::String)
            .map_err(|e| e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ColumnRole;

    const CSV: &str = "category,revenue,units\n\
                       Electronics,950.5,5\n\
                       Books,45.5,20\n\
                       Electronics,600.0,10\n";

    fn csv_backend() -> DataFrameBackend {
        DataFrameBackend::from_upload(UploadFormat::Csv, CSV.as_bytes()).unwrap()
    }

    #[test]
    fn test_schema_text_names_synthetic_table() {
        let backend = csv_backend();
        let text = backend.schema_text();
        assert!(text.starts_with("Table 'df':"));
        assert!(text.contains("category (Utf8)"));
        assert!(text.contains("revenue (Float64)"));
    }

    #[tokio::test]
    async fn test_group_by_over_upload() {
        let backend = csv_backend();
        let outcome = backend
            .run_query(
                "SELECT category, SUM(revenue) AS total FROM df GROUP BY category ORDER BY category",
            )
            .await
            .unwrap();
        assert!(!outcome.fallback_prefix);
        let table = outcome.table;
        assert_eq!(table.row_count(), 2);
        assert_eq!(table.columns[0].role, ColumnRole::Categorical);
        assert_eq!(table.columns[1].role, ColumnRole::Numeric);
        assert_eq!(table.rows[0]["category"], "Books");
        assert_eq!(table.rows[0]["total"], 45.5);
    }

    #[tokio::test]
    async fn test_failed_query_degrades_to_prefix() {
        let backend = csv_backend();
        let outcome = backend
            .run_query("SELECT no_such_column FROM df")
            .await
            .unwrap();
        assert!(outcome.fallback_prefix);
        assert_eq!(outcome.table.row_count(), 3);
        assert_eq!(
            outcome.table.column_names(),
            vec!["category", "revenue", "units"]
        );
    }

    #[test]
    fn test_empty_upload_is_connection_failure() {
        let result = DataFrameBackend::from_upload(UploadFormat::Csv, b"");
        assert!(matches!(result, Err(AppError::Connection(_))));
    }

    #[test]
    fn test_header_normalization() {
        let csv = "Unit Price,qty\n1.5,2\n";
        let backend = DataFrameBackend::from_upload(UploadFormat::Csv, csv.as_bytes()).unwrap();
        let text = backend.schema_text();
        assert!(text.contains("Unit_Price"));
    }

    #[test]
    fn test_batch_from_range_types_columns() {
        let mut range: Range<Data> = Range::new((0, 0), (2, 1));
        range.set_value((0, 0), Data::String("region".to_string()));
        range.set_value((0, 1), Data::String("sales".to_string()));
        range.set_value((1, 0), Data::String("North".to_string()));
        range.set_value((1, 1), Data::Float(10.0));
        range.set_value((2, 0), Data::String("South".to_string()));
        range.set_value((2, 1), Data::Int(7));

        let (schema, batches) = batch_from_range(&range).unwrap();
        assert_eq!(schema.field(0).name(), "region");
        assert_eq!(schema.field(0).data_type(), &DataType::Utf8);
        assert_eq!(schema.field(1).data_type(), &DataType::Float64);
        assert_eq!(batches[0].num_rows(), 2);
    }
}
