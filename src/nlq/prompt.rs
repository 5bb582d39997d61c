//! Prompt assembly and completion parsing for the generation and refinement
//! calls.

use tracing::{debug, info};

use super::schema::describe_schema;
use super::types::{Dialect, NlqRequest, RefinementRequest, UserFeedback};
use crate::config::NlqConfig;
use crate::llm::ChatMessage;

/// Marker the model is told to answer with for questions that are not about
/// application data.
pub const NOT_DATA_MARKER: &str = "ERROR: NOT_DATA_QUESTION";

pub fn generation_messages(request: &NlqRequest, config: &NlqConfig) -> Vec<ChatMessage> {
    let system = system_prompt(request.tenant_id.as_deref(), request.dialect, config);
    let user = format!(
        r#"### Schema:
{}

### Question:
{}

### Response:
Return a single {} SELECT statement in a ```sql code block, or exactly `{}`."#,
        describe_schema(request.schema.as_ref()),
        request.question.trim(),
        request.dialect,
        NOT_DATA_MARKER,
    );

    debug!("Prepared NLQ prompt:\n{}\n\n{}", system, user);
    vec![ChatMessage::system(system), ChatMessage::user(user)]
}

pub fn refinement_messages(request: &RefinementRequest, config: &NlqConfig) -> Vec<ChatMessage> {
    let system = system_prompt(request.tenant_id.as_deref(), request.dialect, config);

    let feedback = match request.user_feedback {
        UserFeedback::Correct => {
            "The user confirmed this query is correct. Keep its structure and return it, \
             only tidying formatting if needed."
                .to_string()
        }
        UserFeedback::Incorrect => match (&request.corrected_sql, &request.error_message) {
            (Some(corrected), _) => format!(
                "The user marked the query as incorrect and supplied this corrected SQL. \
                 Learn from it and return an improved query that follows the same approach:\n{}",
                corrected
            ),
            (None, Some(error)) => format!(
                "Executing the query failed with this error. Fix the cause and return a \
                 working query:\n{}",
                error
            ),
            (None, None) => "The user marked the query as incorrect. Re-read the question \
                             and return a query that answers it."
                .to_string(),
        },
        UserFeedback::NeedsImprovement => {
            let mut text = "The user says the query needs improvement. Make it more precise, \
                            readable and efficient without changing what it answers."
                .to_string();
            if let Some(error) = &request.error_message {
                text.push_str(&format!("\nReported problem: {}", error));
            }
            if let Some(corrected) = &request.corrected_sql {
                text.push_str(&format!("\nThe user suggested:\n{}", corrected));
            }
            text
        }
    };

    let user = format!(
        r#"### Original question:
{}

### Original SQL:
```sql
{}
```

### Feedback:
{}

### Response:
Return only the refined SELECT statement in a ```sql code block."#,
        request.original_question.trim(),
        request.original_sql.trim(),
        feedback,
    );

    debug!("Prepared refinement prompt:\n{}", user);
    vec![ChatMessage::system(system), ChatMessage::user(user)]
}

fn system_prompt(tenant_id: Option<&str>, dialect: Dialect, config: &NlqConfig) -> String {
    let column = &config.tenant_column;
    let tenant_rule = match tenant_id {
        Some(tenant_id) => format!(
            "- **Every table reference MUST be filtered with `<alias>.\"{column}\" = '{}'`.** \
             This is mandatory. Never query data for any other tenant.",
            tenant_id.replace('\'', "''")
        ),
        None => format!(
            "- **Every table reference MUST be filtered with `<alias>.\"{column}\" = '{}'`.** \
             Write the placeholder literally; it is replaced before execution.",
            config.tenant_placeholder
        ),
    };

    let mappings = config
        .table_mappings
        .iter()
        .map(|m| format!("- {} -> \"{}\"", m.pattern.replace('|', " / "), m.canonical))
        .collect::<Vec<_>>()
        .join("\n");

    let forbidden = config
        .denied_keywords
        .iter()
        .map(|k| k.to_uppercase())
        .collect::<Vec<_>>()
        .join(", ");

    let (limit_rule, quote_rule) = match dialect {
        Dialect::Postgresql => (
            "Add `LIMIT 100` to queries that list rows without aggregation",
            "Quote table and column identifiers with double quotes, e.g. \"SalesLead\"",
        ),
        Dialect::Mysql => (
            "Add `LIMIT 100` to queries that list rows without aggregation",
            "Quote table and column identifiers with backticks, e.g. `SalesLead`",
        ),
        Dialect::Sqlserver => (
            "Use `SELECT TOP 100` for queries that list rows without aggregation",
            "Quote table and column identifiers with square brackets, e.g. [SalesLead]",
        ),
    };

    format!(
        r#"### Instructions:
You translate questions about a business application's data into one read-only SQL query for {dialect}.

### Tenant isolation:
{tenant_rule}

### Table names:
Use these canonical table names instead of colloquial ones:
{mappings}

### Forbidden:
Never generate {forbidden} or any other statement that changes data or schema.

### Format:
- Generate exactly one SELECT statement (CTEs are allowed)
- {quote_rule}
- {limit_rule}
- Use table aliases when joining
- Use only tables and columns from the schema

### Not a data question:
If the question is general knowledge or not about the application's data, answer exactly `{NOT_DATA_MARKER}` and nothing else.

Examples:
- "How many leads did we convert last quarter?" -> SQL
- "Top 5 accounts by won opportunity value" -> SQL
- "What is artificial intelligence?" -> {NOT_DATA_MARKER}
- "Write me a poem about sales" -> {NOT_DATA_MARKER}"#
    )
}

/// True when the completion says the question is not about application data.
pub fn is_not_data_response(content: &str) -> bool {
    let upper = content.trim().to_uppercase();
    upper.starts_with("ERROR")
        || upper.contains("NOT_DATA_QUESTION")
        || upper.contains("NOT ABOUT APPLICATION DATA")
}

/// Pull the SQL statement out of a completion: a ```sql block, a plain fence,
/// or the first line that starts with a statement keyword. A trailing
/// semicolon is dropped.
pub fn extract_sql(content: &str) -> String {
    let sql = if let Some(sql) = fenced(content, "```sql") {
        info!("Extracted SQL from sql code block");
        sql
    } else if let Some(sql) = fenced(content, "```") {
        info!("Extracted SQL from plain code block");
        sql
    } else if let Some(sql) = scan_lines(content) {
        info!("Extracted SQL using line scanning");
        sql
    } else {
        info!("No SQL markers in completion, using full content");
        content.trim().to_string()
    };

    let sql = sql.trim().trim_end_matches(';').trim_end().to_string();
    debug!("Extracted SQL: {}", sql);
    sql
}

fn fenced(content: &str, open: &str) -> Option<String> {
    let start = content.find(open)? + open.len();
    let end = content[start..].find("```")? + start;
    Some(content[start..end].trim().to_string())
}

fn scan_lines(content: &str) -> Option<String> {
    const KEYWORDS: [&str; 8] = [
        "SELECT", "WITH", "INSERT", "UPDATE", "DELETE", "CREATE", "ALTER", "DROP",
    ];

    let lines: Vec<&str> = content.lines().collect();
    let first = lines.iter().position(|line| {
        let upper = line.trim().to_uppercase();
        KEYWORDS.iter().any(|kw| upper.starts_with(kw))
    })?;

    let mut sql = lines[first].trim().to_string();
    if sql.ends_with(';') {
        return Some(sql);
    }
    for line in &lines[first + 1..] {
        let line = line.trim();
        if line.is_empty() || line.starts_with("```") {
            break;
        }
        sql.push(' ');
        sql.push_str(line);
        if line.ends_with(';') {
            break;
        }
    }
    Some(sql)
}
