use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Semantic role of a result column, computed once after query execution
/// and carried alongside the table so downstream consumers never re-inspect
/// values ad hoc.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnRole {
    Numeric,
    Categorical,
    Temporal,
    /// Categorical/temporal column whose name ends in `_id`. Treated as a
    /// key, never as a chart dimension or group-by candidate.
    Identifier,
    Unknown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnMeta {
    pub name: String,
    pub role: ColumnRole,
}

/// Uniform tabular result produced by either backend.
///
/// All rows share the column set; zero rows is a valid state distinct from
/// execution failure (which is an absent table at the orchestration layer).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultTable {
    pub columns: Vec<ColumnMeta>,
    pub rows: Vec<Map<String, Value>>,
}

impl ResultTable {
    /// Build a table from raw column names and rows, classifying every
    /// column by runtime value type.
    pub fn new(column_names: Vec<String>, rows: Vec<Map<String, Value>>) -> Self {
        let columns = column_names
            .into_iter()
            .map(|name| {
                let role = classify_column(&name, &rows);
                ColumnMeta { name, role }
            })
            .collect();
        Self { columns, rows }
    }

    pub fn empty() -> Self {
        Self {
            columns: Vec::new(),
            rows: Vec::new(),
        }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty() || self.columns.is_empty()
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Columns usable as chart labels or group-by keys: categorical and
    /// temporal, with identifiers excluded.
    pub fn dimension_columns(&self) -> Vec<&ColumnMeta> {
        self.columns
            .iter()
            .filter(|c| matches!(c.role, ColumnRole::Categorical | ColumnRole::Temporal))
            .collect()
    }

    pub fn numeric_columns(&self) -> Vec<&ColumnMeta> {
        self.columns
            .iter()
            .filter(|c| c.role == ColumnRole::Numeric)
            .collect()
    }

    /// True when any column name normalizes to "count" (case-insensitive),
    /// the cheap signal that the query already grouped its result.
    pub fn has_count_column(&self) -> bool {
        self.columns
            .iter()
            .any(|c| c.name.trim().eq_ignore_ascii_case("count"))
    }

    /// First `n` rows as a new table, preserving column roles.
    pub fn head(&self, n: usize) -> ResultTable {
        ResultTable {
            columns: self.columns.clone(),
            rows: self.rows.iter().take(n).cloned().collect(),
        }
    }
}

fn classify_column(name: &str, rows: &[Map<String, Value>]) -> ColumnRole {
    let mut saw_value = false;
    let mut all_numeric = true;
    let mut all_temporal = true;

    for row in rows {
        match row.get(name) {
            None | Some(Value::Null) => continue,
            Some(value) => {
                saw_value = true;
                if !value.is_number() {
                    all_numeric = false;
                }
                let temporal = value
                    .as_str()
                    .map(looks_like_iso_date)
                    .unwrap_or(false);
                if !temporal {
                    all_temporal = false;
                }
                if !all_numeric && !all_temporal {
                    break;
                }
            }
        }
    }

    if !saw_value {
        return ColumnRole::Unknown;
    }
    if all_numeric {
        return ColumnRole::Numeric;
    }
    let base = if all_temporal {
        ColumnRole::Temporal
    } else {
        ColumnRole::Categorical
    };
    if name.to_ascii_lowercase().ends_with("_id") {
        ColumnRole::Identifier
    } else {
        base
    }
}

/// `YYYY-MM-DD` prefix check, enough to catch SQLite date text and RFC 3339
/// timestamps without pulling in a parser.
fn looks_like_iso_date(s: &str) -> bool {
    let bytes = s.as_bytes();
    if bytes.len() < 10 {
        return false;
    }
    bytes[..4].iter().all(u8::is_ascii_digit)
        && bytes[4] == b'-'
        && bytes[5..7].iter().all(u8::is_ascii_digit)
        && bytes[7] == b'-'
        && bytes[8..10].iter().all(u8::is_ascii_digit)
}
