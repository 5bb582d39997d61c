use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::schema::SchemaDescriptor;
use super::sql_text::{bare_identifier, code_only};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfidenceFactors {
    pub has_joins: bool,
    pub has_aggregations: bool,
    pub has_filters: bool,
    pub has_order_by: bool,
    pub table_count: usize,
    pub column_count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfidenceScore {
    pub overall: f64,
    pub schema_match: f64,
    pub syntax_valid: bool,
    pub semantic_valid: bool,
    pub complexity_score: f64,
    pub factors: ConfidenceFactors,
}

static SELECT: Lazy<Regex> = Lazy::new(|| pattern(r"(?i)\bSELECT\b"));
static FROM: Lazy<Regex> = Lazy::new(|| pattern(r"(?i)\bFROM\b"));
static DESTRUCTIVE: Lazy<Regex> = Lazy::new(|| {
    pattern(r"(?i)\b(DROP|DELETE|UPDATE|TRUNCATE|ALTER|CREATE|INSERT)\b")
});
static JOIN: Lazy<Regex> = Lazy::new(|| pattern(r"(?i)\bJOIN\b"));
static AGGREGATE: Lazy<Regex> =
    Lazy::new(|| pattern(r"(?i)\b(COUNT|SUM|AVG|MIN|MAX)\s*\(|\bGROUP\s+BY\b"));
static WHERE: Lazy<Regex> = Lazy::new(|| pattern(r"(?i)\bWHERE\b"));
static ORDER_BY: Lazy<Regex> = Lazy::new(|| pattern(r"(?i)\bORDER\s+BY\b"));
static TABLE_REFERENCE: Lazy<Regex> = Lazy::new(|| {
    let part = r#"(?:"[^"]+"|`[^`]+`|\[[^\]]+\]|[A-Za-z_][A-Za-z0-9_$]*)"#;
    pattern(&format!(r"(?i)\b(?:FROM|JOIN)\s+({part}(?:\.{part})*)"))
});

static SUBQUERY_START: Lazy<Regex> = Lazy::new(|| pattern(r"(?i)^\s*(?:SELECT|WITH)\b"));

fn pattern(re: &str) -> Regex {
    Regex::new(re).expect("confidence pattern is a valid regex literal")
}

/// Score a piece of SQL from its text alone.
///
/// Every signal is a keyword or regex test on the SQL with string literals and
/// comments blanked out, so the same input always produces the same score.
pub fn calculate_confidence_score(sql: &str, schema: Option<&SchemaDescriptor>) -> ConfidenceScore {
    let code = code_only(sql);

    let syntax_valid = SELECT.is_match(&code) && !DESTRUCTIVE.is_match(&code);
    let semantic_valid = syntax_valid && FROM.is_match(&code);

    let tables = referenced_tables(&code);
    let factors = ConfidenceFactors {
        has_joins: JOIN.is_match(&code),
        has_aggregations: AGGREGATE.is_match(&code),
        has_filters: WHERE.is_match(&code),
        has_order_by: ORDER_BY.is_match(&code),
        table_count: tables.len(),
        column_count: select_list_width(&code),
    };

    let schema = schema.filter(|s| !s.is_empty());
    let schema_match = match schema {
        Some(schema) => schema_match(&tables, schema),
        None => 0.5,
    };

    let mut overall: f64 = 0.5;
    if syntax_valid {
        overall += 0.2;
    }
    if semantic_valid {
        overall += 0.1;
    }
    if schema_match > 0.7 {
        overall += 0.1;
    }
    if factors.has_filters {
        overall += 0.05;
    }
    if factors.has_order_by {
        overall += 0.05;
    }
    if schema.is_none() && (factors.has_joins || factors.table_count > 2) {
        overall -= 0.1;
    }

    let mut complexity_score: f64 = 0.0;
    if factors.has_joins {
        complexity_score += 0.3;
    }
    if factors.has_aggregations {
        complexity_score += 0.3;
    }
    if factors.table_count > 1 {
        complexity_score += 0.2;
    }
    if factors.column_count > 5 {
        complexity_score += 0.2;
    }

    ConfidenceScore {
        overall: overall.clamp(0.0, 1.0),
        schema_match,
        syntax_valid,
        semantic_valid,
        complexity_score: complexity_score.clamp(0.0, 1.0),
        factors,
    }
}

/// Identifiers after a FROM or JOIN that opens a relation. The FROM inside
/// `EXTRACT(MONTH FROM x)`, `SUBSTRING(x FROM 1)` or `TRIM(y FROM x)` does not.
fn referenced_tables(code: &str) -> Vec<String> {
    let at_query_level = query_levels(code);
    TABLE_REFERENCE
        .captures_iter(code)
        .filter(|caps| {
            caps.get(0)
                .is_some_and(|m| at_query_level.get(m.start()).copied().unwrap_or(true))
        })
        .filter_map(|caps| caps.get(1))
        .map(|m| bare_identifier(m.as_str()))
        .collect()
}

/// Per byte: true at the top level or directly inside a parenthesised query,
/// false inside any other parentheses (function arguments, expression groups).
fn query_levels(code: &str) -> Vec<bool> {
    let mut levels = Vec::with_capacity(code.len());
    let mut stack: Vec<bool> = Vec::new();
    for (i, c) in code.char_indices() {
        let here = stack.last().copied().unwrap_or(true);
        levels.extend(std::iter::repeat(here).take(c.len_utf8()));
        match c {
            '(' => stack.push(SUBQUERY_START.is_match(&code[i + 1..])),
            ')' => {
                stack.pop();
            }
            _ => {}
        }
    }
    levels
}

fn schema_match(tables: &[String], schema: &SchemaDescriptor) -> f64 {
    let referenced: BTreeSet<String> = tables.iter().map(|t| t.to_uppercase()).collect();
    if referenced.is_empty() {
        return 0.0;
    }
    let known: BTreeSet<String> = schema
        .tables
        .iter()
        .map(|t| t.name.to_uppercase())
        .collect();
    let matched = referenced.intersection(&known).count();
    matched as f64 / referenced.len() as f64
}

/// Number of top-level items between the first SELECT and its FROM.
fn select_list_width(code: &str) -> usize {
    let Some(select) = SELECT.find(code) else {
        return 0;
    };
    let list = &code[select.end()..];
    let from_starts: Vec<usize> = FROM.find_iter(list).map(|m| m.start()).collect();

    let mut depth = 0i32;
    let mut items = 1;
    let mut end = list.len();
    for (i, c) in list.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => depth -= 1,
            ',' if depth == 0 => items += 1,
            _ if depth == 0 && from_starts.contains(&i) => {
                end = i;
                break;
            }
            _ => {}
        }
    }

    if list[..end].trim().is_empty() {
        0
    } else {
        items
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nlq::schema::{ColumnDescriptor, TableDescriptor};

    fn schema(tables: &[&str]) -> SchemaDescriptor {
        SchemaDescriptor::new(
            tables
                .iter()
                .map(|name| TableDescriptor::new(*name, vec![ColumnDescriptor::new("id", "uuid")]))
                .collect(),
        )
    }

    #[test]
    fn scores_a_simple_filtered_query_against_its_schema() {
        let score = calculate_confidence_score(
            "SELECT COUNT(*) FROM \"SalesOpportunity\" WHERE status = 'won'",
            Some(&schema(&["SalesOpportunity"])),
        );
        assert!(score.syntax_valid);
        assert!(score.semantic_valid);
        assert_eq!(score.schema_match, 1.0);
        assert!(score.factors.has_aggregations);
        assert!(score.factors.has_filters);
        assert!(!score.factors.has_joins);
        assert_eq!(score.factors.table_count, 1);
        assert_eq!(score.factors.column_count, 1);
        assert!((score.overall - 0.95).abs() < 1e-9);
        assert!((score.complexity_score - 0.3).abs() < 1e-9);
    }

    #[test]
    fn destructive_sql_is_not_syntax_valid() {
        let score = calculate_confidence_score("DROP TABLE \"SalesLead\"", None);
        assert!(!score.syntax_valid);
        assert!(!score.semantic_valid);
        assert_eq!(score.overall, 0.5);

        let hidden = calculate_confidence_score("SELECT 1 FROM x; DELETE FROM x", None);
        assert!(!hidden.syntax_valid);
    }

    #[test]
    fn keywords_inside_literals_are_ignored() {
        let score = calculate_confidence_score(
            "SELECT name FROM \"SalesLead\" WHERE note = 'drop from accounts'",
            Some(&schema(&["SalesLead"])),
        );
        assert!(score.syntax_valid);
        assert_eq!(score.factors.table_count, 1);
        assert_eq!(score.schema_match, 1.0);
    }

    #[test]
    fn missing_schema_defaults_match_and_penalises_joins() {
        let sql = "SELECT a.name, c.email FROM \"SalesAccount\" a JOIN \"SalesContact\" c ON c.\"accountId\" = a.id";
        let score = calculate_confidence_score(sql, None);
        assert_eq!(score.schema_match, 0.5);
        assert_eq!(score.factors.table_count, 2);
        assert!((score.overall - 0.7).abs() < 1e-9);
        assert!((score.complexity_score - 0.5).abs() < 1e-9);
    }

    #[test]
    fn adding_a_filter_never_lowers_confidence() {
        let schema = schema(&["SalesLead"]);
        let base = calculate_confidence_score("SELECT * FROM \"SalesLead\"", Some(&schema));
        let filtered = calculate_confidence_score(
            "SELECT * FROM \"SalesLead\" WHERE status = 'new'",
            Some(&schema),
        );
        assert!(filtered.overall >= base.overall);
    }

    #[test]
    fn date_part_filters_do_not_count_as_tables() {
        let schema = schema(&["SalesOpportunity"]);
        let base = calculate_confidence_score("SELECT COUNT(*) FROM \"SalesOpportunity\"", Some(&schema));
        let filtered = calculate_confidence_score(
            "SELECT COUNT(*) FROM \"SalesOpportunity\" WHERE EXTRACT(MONTH FROM \"closeDate\") = 5",
            Some(&schema),
        );
        assert_eq!(filtered.factors.table_count, 1);
        assert_eq!(filtered.schema_match, 1.0);
        assert!(filtered.overall >= base.overall);
        assert_eq!(filtered.complexity_score, base.complexity_score);

        let functions = calculate_confidence_score(
            "SELECT SUBSTRING(name FROM 1 FOR 3), TRIM(BOTH ' ' FROM email) FROM \"SalesContact\"",
            None,
        );
        assert_eq!(functions.factors.table_count, 1);
    }

    #[test]
    fn subqueries_inside_expressions_still_count() {
        let score = calculate_confidence_score(
            "SELECT name FROM \"SalesAccount\" a WHERE a.id IN (SELECT \"accountId\" FROM \"SalesOpportunity\") \
             AND EXISTS ((SELECT 1 FROM \"SalesContact\"))",
            None,
        );
        assert_eq!(score.factors.table_count, 3);
    }

    #[test]
    fn unknown_tables_never_raise_schema_match() {
        let schema = schema(&["SalesLead"]);
        let known = calculate_confidence_score("SELECT * FROM \"SalesLead\"", Some(&schema));
        let mixed = calculate_confidence_score(
            "SELECT * FROM \"SalesLead\" l JOIN \"Invoice\" i ON i.lead_id = l.id",
            Some(&schema),
        );
        assert_eq!(known.schema_match, 1.0);
        assert_eq!(mixed.schema_match, 0.5);
    }

    #[test]
    fn counts_top_level_select_items() {
        let sql = "SELECT id, name, COALESCE(email, phone), status, owner, \"createdAt\" FROM \"SalesLead\"";
        let score = calculate_confidence_score(sql, None);
        assert_eq!(score.factors.column_count, 6);
        assert!((score.complexity_score - 0.2).abs() < 1e-9);

        assert_eq!(calculate_confidence_score("SELECT * FROM x", None).factors.column_count, 1);
        assert_eq!(calculate_confidence_score("no sql here", None).factors.column_count, 0);
    }

    #[test]
    fn derived_tables_are_not_counted_as_references() {
        let score = calculate_confidence_score(
            "SELECT COUNT(*) FROM (SELECT id FROM \"SalesLead\") t",
            None,
        );
        assert_eq!(score.factors.table_count, 1);
    }

    #[test]
    fn scoring_is_reproducible() {
        let sql = "SELECT stage, SUM(amount) FROM \"SalesOpportunity\" GROUP BY stage ORDER BY 2 DESC";
        let schema = schema(&["SalesOpportunity"]);
        assert_eq!(
            calculate_confidence_score(sql, Some(&schema)),
            calculate_confidence_score(sql, Some(&schema))
        );
    }
}
