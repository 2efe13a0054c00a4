// Last-resort query templates, used when the translation collaborator is
// unavailable or returns nothing query-shaped.
//
// Pure and history-independent: the same question and schema always produce
// the same query. Responses carrying one of these are tagged with template
// provenance so they never masquerade as collaborator output.

use crate::models::{quote_ident, SchemaDescriptor};

/// Pick a hand-written template query for a question. Returns `None` only
/// when the schema is empty.
pub fn template_query(question: &str, schema: &SchemaDescriptor) -> Option<String> {
    let first_table = schema.first_table()?;
    let lowered = question.to_lowercase();

    if lowered.contains("category") {
        if let Some(sql) = category_query(schema) {
            return Some(sql);
        }
    }

    if lowered.contains("count") || lowered.contains("how many") {
        return Some(format!(
            "SELECT COUNT(*) AS count FROM {}",
            quote_ident(&first_table.name)
        ));
    }

    Some(format!(
        "SELECT * FROM {} LIMIT 50",
        quote_ident(&first_table.name)
    ))
}

/// Fixed grouping query for "category"-flavored questions.
///
/// When the classic products/sales pair is present, produce the join
/// aggregate over revenue; otherwise group whichever table carries a
/// `category` column.
fn category_query(schema: &SchemaDescriptor) -> Option<String> {
    let products = schema.table("products");
    let sales = schema.table("sales");
    if let (Some(products), Some(sales)) = (products, sales) {
        let joinable = products.columns.iter().any(|c| c.name == "product_id")
            && sales.columns.iter().any(|c| c.name == "product_id")
            && products.columns.iter().any(|c| c.name == "category");
        if joinable {
            return Some(
                "SELECT p.category, SUM(s.sale_price * s.quantity_sold) AS total_sales \
                 FROM products AS p JOIN sales AS s ON p.product_id = s.product_id \
                 GROUP BY p.category"
                    .to_string(),
            );
        }
    }

    let table = schema.table_with_column("category")?;
    Some(format!(
        "SELECT category, COUNT(*) AS count FROM {} GROUP BY category",
        quote_ident(&table.name)
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ColumnDescriptor, TableDescriptor};

    fn column(name: &str, data_type: &str) -> ColumnDescriptor {
        ColumnDescriptor {
            name: name.to_string(),
            data_type: data_type.to_string(),
        }
    }

    fn sales_schema() -> SchemaDescriptor {
        SchemaDescriptor::new(vec![
            TableDescriptor {
                name: "products".to_string(),
                columns: vec![
                    column("product_id", "TEXT"),
                    column("category", "TEXT"),
                    column("name", "TEXT"),
                    column("cost", "REAL"),
                ],
            },
            TableDescriptor {
                name: "sales".to_string(),
                columns: vec![
                    column("sale_id", "INTEGER"),
                    column("sale_date", "TEXT"),
                    column("product_id", "TEXT"),
                    column("quantity_sold", "INTEGER"),
                    column("sale_price", "REAL"),
                ],
            },
        ])
    }

    #[test]
    fn test_category_question_produces_fixed_join() {
        let schema = sales_schema();
        let sql = template_query("total sales by category", &schema).unwrap();
        assert_eq!(
            sql,
            "SELECT p.category, SUM(s.sale_price * s.quantity_sold) AS total_sales \
             FROM products AS p JOIN sales AS s ON p.product_id = s.product_id \
             GROUP BY p.category"
        );
    }

    #[test]
    fn test_fallback_is_deterministic_and_history_free() {
        let schema = sales_schema();
        let first = template_query("total sales by category", &schema).unwrap();
        for _ in 0..5 {
            assert_eq!(template_query("total sales by category", &schema).unwrap(), first);
        }
    }

    #[test]
    fn test_category_without_join_pair_groups_single_table() {
        let schema = SchemaDescriptor::new(vec![TableDescriptor {
            name: "df".to_string(),
            columns: vec![column("category", "Utf8"), column("revenue", "Float64")],
        }]);
        let sql = template_query("split by category", &schema).unwrap();
        assert_eq!(
            sql,
            "SELECT category, COUNT(*) AS count FROM df GROUP BY category"
        );
    }

    #[test]
    fn test_count_question() {
        let schema = sales_schema();
        let sql = template_query("how many products are there", &schema).unwrap();
        assert_eq!(sql, "SELECT COUNT(*) AS count FROM products");
    }

    #[test]
    fn test_default_is_bounded_select_all() {
        let schema = sales_schema();
        let sql = template_query("show me everything", &schema).unwrap();
        assert_eq!(sql, "SELECT * FROM products LIMIT 50");
    }

    #[test]
    fn test_empty_schema_yields_nothing() {
        let schema = SchemaDescriptor::default();
        assert!(template_query("anything", &schema).is_none());
    }
}
