// Data shaping: post-processes a raw query result into something chartable.
//
// A raw 500-row result is unchartable; the ladder below trades generality
// for a deterministic, explainable reduction.

use serde_json::{Map, Number, Value};
use std::collections::HashMap;

use crate::models::ResultTable;

/// Row count above which a result is considered too raw to chart.
pub const SHAPING_ROW_THRESHOLD: usize = 50;

/// Shape a result table for visualization. The question participates only
/// in logging; the transformation is a pure function of the table.
///
/// Policy, in order: empty tables and tables that already carry a "count"
/// column pass through; oversized tables are grouped by their first
/// non-identifier dimension column, summing numeric columns or counting
/// occurrences; a table with no usable dimension is returned unshaped.
pub fn shape(table: ResultTable, question: &str) -> ResultTable {
    if table.is_empty() {
        return table;
    }

    // Cheap heuristic: a "count" column means the query already grouped
    // its result; reshaping would double-aggregate.
    if table.has_count_column() {
        tracing::debug!("Result already aggregated; shaping skipped");
        return table;
    }

    if table.row_count() <= SHAPING_ROW_THRESHOLD {
        return table;
    }

    let group_column = match table.dimension_columns().first() {
        Some(meta) => meta.name.clone(),
        None => {
            tracing::warn!(
                "Oversized result ({} rows) has no usable categorical column; returning unshaped (question: {})",
                table.row_count(),
                question
            );
            return table;
        }
    };

    let numeric_columns: Vec<String> = table
        .numeric_columns()
        .iter()
        .map(|c| c.name.clone())
        .collect();

    tracing::debug!(
        "Shaping {} rows: grouping by '{}' over {} numeric column(s)",
        table.row_count(),
        group_column,
        numeric_columns.len()
    );

    if numeric_columns.is_empty() {
        count_by(&table, &group_column)
    } else {
        sum_by(&table, &group_column, &numeric_columns)
    }
}

/// Group by the dimension column and sum every numeric column, one output
/// row per distinct value, in first-seen order.
fn sum_by(table: &ResultTable, group_column: &str, numeric_columns: &[String]) -> ResultTable {
    let mut order: Vec<String> = Vec::new();
    let mut sums: HashMap<String, Vec<f64>> = HashMap::new();

    for row in &table.rows {
        let key = group_key(row, group_column);
        let entry = sums.entry(key.clone()).or_insert_with(|| {
            order.push(key);
            vec![0.0; numeric_columns.len()]
        });
        for (i, col) in numeric_columns.iter().enumerate() {
            if let Some(v) = row.get(col).and_then(Value::as_f64) {
                entry[i] += v;
            }
        }
    }

    let rows = order
        .into_iter()
        .map(|key| {
            let totals = &sums[&key];
            let mut obj = Map::with_capacity(1 + numeric_columns.len());
            obj.insert(group_column.to_string(), Value::String(key));
            for (i, col) in numeric_columns.iter().enumerate() {
                let value = Number::from_f64(totals[i])
                    .map(Value::Number)
                    .unwrap_or(Value::Null);
                obj.insert(col.clone(), value);
            }
            obj
        })
        .collect();

    let mut columns = vec![group_column.to_string()];
    columns.extend(numeric_columns.iter().cloned());
    ResultTable::new(columns, rows)
}

/// Group by the dimension column and emit occurrence counts per value.
fn count_by(table: &ResultTable, group_column: &str) -> ResultTable {
    let mut order: Vec<String> = Vec::new();
    let mut counts: HashMap<String, i64> = HashMap::new();

    for row in &table.rows {
        let key = group_key(row, group_column);
        let entry = counts.entry(key.clone()).or_insert_with(|| {
            order.push(key);
            0
        });
        *entry += 1;
    }

    let rows = order
        .into_iter()
        .map(|key| {
            let mut obj = Map::with_capacity(2);
            let n = counts[&key];
            obj.insert(group_column.to_string(), Value::String(key));
            obj.insert("count".to_string(), Value::Number(Number::from(n)));
            obj
        })
        .collect();

    ResultTable::new(vec![group_column.to_string(), "count".to_string()], rows)
}

fn group_key(row: &Map<String, Value>, column: &str) -> String {
    match row.get(column) {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}
