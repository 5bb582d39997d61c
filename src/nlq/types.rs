use serde::{Deserialize, Serialize};
use std::fmt;

use super::confidence::ConfidenceScore;
use super::schema::SchemaDescriptor;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    #[default]
    Postgresql,
    Mysql,
    Sqlserver,
}

impl Dialect {
    pub fn as_str(&self) -> &'static str {
        match self {
            Dialect::Postgresql => "postgresql",
            Dialect::Mysql => "mysql",
            Dialect::Sqlserver => "sqlserver",
        }
    }

    /// Quote character for identifiers the engine emits itself.
    pub fn quote_char(&self) -> char {
        match self {
            Dialect::Postgresql => '"',
            Dialect::Mysql => '`',
            Dialect::Sqlserver => '[',
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visualization {
    Bar,
    Line,
    Pie,
    Table,
    Scatter,
}

/// Why a response carries no usable SQL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NlqErrorCode {
    #[serde(rename = "NOT_DATA_QUESTION")]
    NotDataQuestion,
    #[serde(rename = "DANGEROUS_OPERATION")]
    DangerousOperation,
    #[serde(rename = "TENANT_FILTER_ERROR")]
    TenantFilterError,
    /// Model or transport failure; carries the raw message.
    #[serde(untagged)]
    Unclassified(String),
}

impl NlqErrorCode {
    pub fn as_str(&self) -> &str {
        match self {
            NlqErrorCode::NotDataQuestion => "NOT_DATA_QUESTION",
            NlqErrorCode::DangerousOperation => "DANGEROUS_OPERATION",
            NlqErrorCode::TenantFilterError => "TENANT_FILTER_ERROR",
            NlqErrorCode::Unclassified(msg) => msg,
        }
    }
}

impl fmt::Display for NlqErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NlqRequest {
    pub question: String,
    #[serde(default)]
    pub schema: Option<SchemaDescriptor>,
    #[serde(default)]
    pub dialect: Dialect,
    #[serde(default)]
    pub tenant_id: Option<String>,
}

impl NlqRequest {
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            ..Self::default()
        }
    }

    pub fn with_schema(mut self, schema: SchemaDescriptor) -> Self {
        self.schema = Some(schema);
        self
    }

    pub fn with_tenant(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_id = Some(tenant_id.into());
        self
    }

    pub fn with_dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = dialect;
        self
    }
}

/// Result of every NLQ entry point. `sql` is only executable when `error`
/// is unset and `sql` is non-empty.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NlqResponse {
    pub sql: String,
    pub confidence: f64,
    pub explanation: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_visualization: Option<Visualization>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence_details: Option<ConfidenceScore>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<NlqErrorCode>,
}

impl NlqResponse {
    /// A response that must not be executed.
    pub fn rejected(code: NlqErrorCode, explanation: impl Into<String>) -> Self {
        Self {
            sql: String::new(),
            confidence: 0.0,
            explanation: explanation.into(),
            suggested_visualization: None,
            confidence_details: None,
            error: Some(code),
        }
    }

    pub fn is_executable(&self) -> bool {
        self.error.is_none() && !self.sql.trim().is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserFeedback {
    Correct,
    Incorrect,
    NeedsImprovement,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefinementRequest {
    pub original_question: String,
    #[serde(rename = "originalSQL", alias = "originalSql")]
    pub original_sql: String,
    pub user_feedback: UserFeedback,
    #[serde(default, rename = "correctedSQL", alias = "correctedSql")]
    pub corrected_sql: Option<String>,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub tenant_id: Option<String>,
    #[serde(default)]
    pub dialect: Dialect,
}

impl RefinementRequest {
    pub fn new(
        original_question: impl Into<String>,
        original_sql: impl Into<String>,
        user_feedback: UserFeedback,
    ) -> Self {
        Self {
            original_question: original_question.into(),
            original_sql: original_sql.into(),
            user_feedback,
            corrected_sql: None,
            error_message: None,
            tenant_id: None,
            dialect: Dialect::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuerySuggestion {
    pub question: String,
    pub sql: String,
    pub confidence: f64,
    pub description: String,
}
