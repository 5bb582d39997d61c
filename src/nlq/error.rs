use sqlparser::parser::ParserError;
use thiserror::Error;

use crate::llm::LlmError;

/// Why a query could not be scoped to a tenant. Every variant means the SQL
/// must be discarded.
#[derive(Debug, Error)]
pub enum TenantFilterError {
    #[error("tenant id must not be empty")]
    EmptyTenantId,
    #[error("could not parse SQL: {0}")]
    Parse(#[from] ParserError),
    #[error("expected exactly one statement, found {0}")]
    StatementCount(usize),
    #[error("only SELECT queries can be scoped to a tenant")]
    NotAQuery,
    #[error("SELECT ... INTO is not allowed")]
    SelectInto,
    #[error("unsupported table source: {0}")]
    UnsupportedSource(String),
    #[error("tenant predicate on {qualifier} targets a different tenant")]
    ConflictingTenant { qualifier: String },
    #[error("found {found} table references but only {reached} could be scoped")]
    UnreachableRelation { found: usize, reached: usize },
}

#[derive(Debug, Error)]
pub enum NlqError {
    #[error("invalid pattern in NLQ configuration: {0}")]
    Pattern(#[from] regex::Error),
    #[error("invalid NLQ configuration: {0}")]
    Config(String),
    #[error(transparent)]
    Llm(#[from] LlmError),
    #[error(transparent)]
    TenantFilter(#[from] TenantFilterError),
}

pub type Result<T> = std::result::Result<T, NlqError>;
