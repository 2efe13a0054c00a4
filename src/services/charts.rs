// Visualization recommendation: deterministic column-role driven selection
// of up to four complementary chart types.
//
// The engine never inspects data values beyond role classification and
// row/column counts; recommendations name columns, and the rendering layer
// binds them to literal values at draw time.

use crate::models::{ChartKind, ChartRecommendation, ResultTable};

/// Upper bound on recommendations per result.
pub const MAX_RECOMMENDATIONS: usize = 4;

/// Recommend charts for a shaped result table.
///
/// Emission order is fixed: bar, line, pie, doughnut; index 0 is the
/// primary recommendation. Every kind requires at least one non-identifier
/// dimension column and one numeric column. Zero rows or zero columns is a
/// normal outcome yielding no recommendations.
pub fn recommend(table: &ResultTable, question: &str) -> Vec<ChartRecommendation> {
    if table.row_count() == 0 || table.column_count() == 0 {
        return Vec::new();
    }

    let dims = table.dimension_columns();
    let nums = table.numeric_columns();

    if dims.is_empty() || nums.is_empty() {
        tracing::debug!(
            "No chart for '{}': needs a categorical and a numeric column ({} dims, {} nums)",
            question,
            dims.len(),
            nums.len()
        );
        return Vec::new();
    }

    let label = dims[0].name.as_str();
    let value = nums[0].name.as_str();
    let mut charts = Vec::with_capacity(MAX_RECOMMENDATIONS);

    charts.push(ChartRecommendation::new(
        ChartKind::Bar,
        format!("{} by {}", title_case(value), title_case(label)),
        label.to_string(),
        value.to_string(),
    ));

    // Trend view over the same dimension. With the strict dimension+measure
    // gate above, the dimension always supplies the x-axis.
    charts.push(ChartRecommendation::new(
        ChartKind::Line,
        format!("{} trend", title_case(value)),
        label.to_string(),
        value.to_string(),
    ));

    charts.push(ChartRecommendation::new(
        ChartKind::Pie,
        format!("{} share by {}", title_case(value), title_case(label)),
        label.to_string(),
        value.to_string(),
    ));

    if dims.len() >= 2 {
        charts.push(ChartRecommendation::new(
            ChartKind::Doughnut,
            format!("{} by {}", title_case(value), title_case(&dims[1].name)),
            dims[1].name.clone(),
            value.to_string(),
        ));
    } else if nums.len() >= 2 {
        charts.push(ChartRecommendation::new(
            ChartKind::Doughnut,
            format!("{} by {}", title_case(&nums[1].name), title_case(label)),
            label.to_string(),
            nums[1].name.clone(),
        ));
    }

    charts.truncate(MAX_RECOMMENDATIONS);
    charts
}

/// `total_sales` -> `Total Sales`, for chart titles.
fn title_case(name: &str) -> String {
    name.split(['_', ' '])
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
