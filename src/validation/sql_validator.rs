use crate::api::middleware::AppError;
use sqlparser::ast::Statement;
use sqlparser::dialect::GenericDialect;
use sqlparser::parser::Parser;

/// Row cap appended to generated queries that do not carry their own LIMIT.
pub const DEFAULT_ROW_LIMIT: u64 = 1000;

/// SQL validation for queries produced by the translation collaborator or
/// the template fallback. Both backends speak a SELECT-only surface, so
/// anything else is rejected before it reaches an engine.
pub struct SqlValidator;

impl SqlValidator {
    /// Validate SQL and ensure every statement is a SELECT.
    ///
    /// Uses the generic dialect so both SQLite-flavored and
    /// DataFusion-flavored query text parse.
    pub fn validate_select_only(sql: &str) -> Result<String, AppError> {
        let dialect = GenericDialect {};
        let mut parser = Parser::new(&dialect)
            .try_with_sql(sql)
            .map_err(|e| AppError::InvalidSql(format!("SQL parsing error: {}", e)))?;

        let ast = parser
            .parse_statements()
            .map_err(|e| AppError::InvalidSql(format!("SQL parsing error: {}", e)))?;

        if ast.is_empty() {
            return Err(AppError::InvalidSql("Empty SQL query".to_string()));
        }

        for stmt in ast {
            match stmt {
                Statement::Query(_) => {}
                other => {
                    return Err(AppError::InvalidSql(format!(
                        "Only SELECT queries are permitted. Found: {}",
                        statement_kind(&other)
                    )));
                }
            }
        }

        Ok(sql.to_string())
    }

    /// Append a LIMIT clause when the query has none.
    ///
    /// LIMIT detection parses the AST rather than scanning text, so a table
    /// named `table_limit` or a comment never counts.
    pub fn ensure_limit(sql: &str, default_limit: u64) -> Result<String, AppError> {
        if Self::has_limit(sql)? {
            Ok(sql.to_string())
        } else {
            let trimmed_sql = sql.trim_end_matches(';').trim();
            Ok(format!("{} LIMIT {}", trimmed_sql, default_limit))
        }
    }

    /// Validate SELECT-only and enforce the row cap in one step. Returns the
    /// prepared SQL and whether a LIMIT was appended.
    pub fn validate_and_prepare(sql: &str, default_limit: u64) -> Result<(String, bool), AppError> {
        let validated_sql = Self::validate_select_only(sql)?;
        let had_limit = Self::has_limit(&validated_sql)?;
        let final_sql = Self::ensure_limit(&validated_sql, default_limit)?;
        Ok((final_sql, !had_limit))
    }

    fn has_limit(sql: &str) -> Result<bool, AppError> {
        let dialect = GenericDialect {};
        let mut parser = Parser::new(&dialect)
            .try_with_sql(sql)
            .map_err(|e| AppError::InvalidSql(format!("SQL parsing error: {}", e)))?;
        let ast = parser
            .parse_statements()
            .map_err(|e| AppError::InvalidSql(format!("SQL parsing error: {}", e)))?;

        Ok(match ast.first() {
            Some(Statement::Query(query)) => query.limit_clause.is_some(),
            _ => false,
        })
    }
}

fn statement_kind(stmt: &Statement) -> &'static str {
    match stmt {
        Statement::Insert { .. } => "INSERT",
        Statement::Update { .. } => "UPDATE",
        Statement::Delete { .. } => "DELETE",
        Statement::Drop { .. } => "DROP",
        Statement::CreateTable { .. } => "CREATE TABLE",
        Statement::AlterTable { .. } => "ALTER TABLE",
        _ => "a non-SELECT statement",
    }
}
