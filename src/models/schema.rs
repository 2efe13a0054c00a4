use serde::{Deserialize, Serialize};

/// Sentinel returned when introspection fails. Callers treat this as
/// valid-but-useless schema text, not as an execution failure.
pub const SCHEMA_UNAVAILABLE: &str = "unable to extract schema";

/// Synthetic table name used for uploaded tabular sources.
pub const UPLOAD_TABLE_NAME: &str = "df";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    pub name: String,
    pub data_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableDescriptor {
    pub name: String,
    pub columns: Vec<ColumnDescriptor>,
}

/// Ordered description of every table visible to the active backend.
///
/// Tables appear in backend-native declaration order; columns in their
/// declared order. Upload sources always contain exactly one table, `df`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchemaDescriptor {
    pub tables: Vec<TableDescriptor>,
}

impl SchemaDescriptor {
    pub fn new(tables: Vec<TableDescriptor>) -> Self {
        Self { tables }
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    pub fn table(&self, name: &str) -> Option<&TableDescriptor> {
        self.tables.iter().find(|t| t.name == name)
    }

    pub fn first_table(&self) -> Option<&TableDescriptor> {
        self.tables.first()
    }

    /// Find the first table containing a column with the given name.
    pub fn table_with_column(&self, column: &str) -> Option<&TableDescriptor> {
        self.tables
            .iter()
            .find(|t| t.columns.iter().any(|c| c.name == column))
    }

    /// Render the schema as the text handed to the translation collaborator.
    ///
    /// One line per table: `Table 'name': col (TYPE), col (TYPE)`.
    pub fn to_schema_text(&self) -> String {
        self.tables
            .iter()
            .map(|table| {
                let columns = table
                    .columns
                    .iter()
                    .map(|c| format!("{} ({})", c.name, c.data_type))
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("Table '{}': {}", table.name, columns)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Quote an identifier for use in generated SQL when it contains anything
/// beyond `[A-Za-z0-9_]` or starts with a digit. Embedded quotes are doubled.
pub fn quote_ident(name: &str) -> String {
    let plain = !name.is_empty()
        && !name.chars().next().unwrap().is_ascii_digit()
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if plain {
        name.to_string()
    } else {
        format!("\"{}\"", name.replace('"', "\"\""))
    }
}

/// Normalize an uploaded column header so schema text and generated queries
/// agree on one spelling: trim, collapse internal whitespace to `_`, and
/// give blank headers a positional name.
pub fn normalize_column_name(raw: &str, position: usize) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return format!("column_{}", position + 1);
    }
    let mut out = String::with_capacity(trimmed.len());
    let mut last_was_sep = false;
    for c in trimmed.chars() {
        if c.is_whitespace() {
            if !last_was_sep {
                out.push('_');
                last_was_sep = true;
            }
        } else {
            out.push(c);
            last_was_sep = false;
        }
    }
    out
}
