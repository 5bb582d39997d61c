use super::schema::{SchemaDescriptor, TypeFamily};
use super::sql_text::quote_ident;
use super::types::{Dialect, QuerySuggestion};

const TABLES_CONSIDERED: usize = 3;

/// Starter queries derived from the schema alone, in generation order: per
/// table a count, a sample, numeric totals/averages and a recent-rows filter.
/// The SQL is not tenant-scoped.
pub fn generate_query_suggestions(schema: &SchemaDescriptor, limit: usize) -> Vec<QuerySuggestion> {
    let mut suggestions = Vec::new();

    for table in schema.tables.iter().take(TABLES_CONSIDERED) {
        let name = &table.name;
        let quoted = quote_ident(name, Dialect::Postgresql);

        suggestions.push(QuerySuggestion {
            question: format!("How many records are in {name}?"),
            sql: format!("SELECT COUNT(*) FROM {quoted}"),
            confidence: 0.95,
            description: format!("Count all records in {name}"),
        });
        suggestions.push(QuerySuggestion {
            question: format!("Show me the {name} records"),
            sql: format!("SELECT * FROM {quoted} LIMIT 100"),
            confidence: 0.9,
            description: format!("Browse the first 100 rows of {name}"),
        });

        if let Some(column) = table.first_column_of(|family| family.is_numeric()) {
            let col = &column.name;
            let quoted_col = quote_ident(col, Dialect::Postgresql);
            suggestions.push(QuerySuggestion {
                question: format!("What is the total {col} in {name}?"),
                sql: format!("SELECT SUM({quoted_col}) FROM {quoted}"),
                confidence: 0.85,
                description: format!("Sum of {col} across {name}"),
            });
            suggestions.push(QuerySuggestion {
                question: format!("What is the average {col} in {name}?"),
                sql: format!("SELECT AVG({quoted_col}) FROM {quoted}"),
                confidence: 0.85,
                description: format!("Average {col} across {name}"),
            });
        }

        if let Some(column) = table.first_column_of(|family| family == TypeFamily::Temporal) {
            let col = &column.name;
            let quoted_col = quote_ident(col, Dialect::Postgresql);
            suggestions.push(QuerySuggestion {
                question: format!("Show {name} records from the last 30 days"),
                sql: format!(
                    "SELECT * FROM {quoted} WHERE {quoted_col} >= CURRENT_DATE - INTERVAL '30 days' ORDER BY {quoted_col} DESC LIMIT 100"
                ),
                confidence: 0.8,
                description: format!("Recent {name} records by {col}"),
            });
        }
    }

    suggestions.truncate(limit);
    suggestions
}
