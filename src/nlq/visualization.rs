use once_cell::sync::Lazy;
use regex::Regex;

use super::sql_text::code_only;
use super::types::Visualization;

static AGGREGATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(COUNT|SUM|AVG|MIN|MAX)\s*\(").expect("aggregate pattern is valid")
});
static GROUP_BY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bGROUP\s+BY\b").expect("group by pattern is valid"));
static ORDER_BY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bORDER\s+BY\b").expect("order by pattern is valid"));

/// Chart hint for a query's result shape. Grouped aggregates win over ordering.
/// Literals and comments are ignored.
pub fn suggest_visualization(sql: &str) -> Visualization {
    let code = code_only(sql);
    let aggregated = AGGREGATE.is_match(&code);

    if aggregated && GROUP_BY.is_match(&code) {
        Visualization::Bar
    } else if aggregated {
        Visualization::Table
    } else if ORDER_BY.is_match(&code) {
        Visualization::Line
    } else {
        Visualization::Table
    }
}
