//! Natural-language query engine: question screening, SQL generation through
//! a completion model, and the rewrite/validation chain every generated
//! statement passes before it is returned.

pub mod classifier;
pub mod confidence;
pub mod error;
pub mod generator;
pub mod normalizer;
pub mod prompt;
pub mod refinement;
pub mod safety;
pub mod schema;
pub mod sql_text;
pub mod suggestions;
pub mod tenant;
pub mod types;
pub mod visualization;

use std::sync::Arc;
use tracing::warn;

use crate::config::NlqConfig;
use crate::llm::{CompletionClient, CompletionOptions};

pub use classifier::{is_question_suitable, QuestionCheck};
pub use confidence::{calculate_confidence_score, ConfidenceFactors, ConfidenceScore};
pub use error::{NlqError, TenantFilterError};
pub use schema::{ColumnDescriptor, SchemaDescriptor, TableDescriptor};
pub use suggestions::generate_query_suggestions;
pub use tenant::{secure_query_for_tenant, TenantScope};
pub use types::{
    Dialect, NlqErrorCode, NlqRequest, NlqResponse, QuerySuggestion, RefinementRequest,
    UserFeedback, Visualization,
};

use normalizer::TableNameNormalizer;
use safety::SafetyValidator;

/// Entry point for every NLQ operation.
///
/// Holds only immutable, compiled settings and a shared completion client,
/// so one engine can serve any number of concurrent requests for any tenant.
pub struct NlqEngine {
    client: Arc<dyn CompletionClient>,
    config: NlqConfig,
    normalizer: TableNameNormalizer,
    safety: SafetyValidator,
    tenant: TenantScope,
}

impl NlqEngine {
    pub fn new(client: Arc<dyn CompletionClient>, config: NlqConfig) -> error::Result<Self> {
        if config.tenant_column.trim().is_empty() {
            return Err(NlqError::Config("tenant_column must not be empty".to_string()));
        }
        if config.tenant_placeholder.trim().is_empty() {
            return Err(NlqError::Config(
                "tenant_placeholder must not be empty".to_string(),
            ));
        }

        Ok(Self {
            normalizer: TableNameNormalizer::new(&config.table_mappings)?,
            safety: SafetyValidator::new(&config.denied_keywords)?,
            tenant: TenantScope::from_config(&config),
            client,
            config,
        })
    }

    pub fn config(&self) -> &NlqConfig {
        &self.config
    }

    pub fn check_question(&self, question: &str) -> QuestionCheck {
        is_question_suitable(question)
    }

    pub fn score(&self, sql: &str, schema: Option<&SchemaDescriptor>) -> ConfidenceScore {
        calculate_confidence_score(sql, schema)
    }

    /// Starter queries for `schema`. With a tenant id every suggestion is
    /// scoped, and any that cannot be scoped is dropped.
    pub fn suggestions(
        &self,
        schema: &SchemaDescriptor,
        limit: usize,
        tenant_id: Option<&str>,
    ) -> Vec<QuerySuggestion> {
        let suggestions = generate_query_suggestions(schema, limit);
        let Some(tenant_id) = tenant_id else {
            return suggestions;
        };

        suggestions
            .into_iter()
            .filter_map(|mut suggestion| match self.tenant.secure(&suggestion.sql, tenant_id) {
                Ok(sql) => {
                    suggestion.sql = sql;
                    Some(suggestion)
                }
                Err(e) => {
                    warn!("Dropping suggestion {:?}: {}", suggestion.question, e);
                    None
                }
            })
            .collect()
    }

    pub fn secure_for_tenant(
        &self,
        sql: &str,
        tenant_id: &str,
        dialect: Dialect,
    ) -> Result<String, TenantFilterError> {
        self.tenant.clone().with_dialect(dialect).secure(sql, tenant_id)
    }

    /// Bind the placeholder in SQL generated without a tenant id.
    pub fn bind_tenant(
        &self,
        sql: &str,
        tenant_id: &str,
        dialect: Dialect,
    ) -> Result<String, TenantFilterError> {
        self.tenant.clone().with_dialect(dialect).bind(sql, tenant_id)
    }

    fn completion_options(&self) -> CompletionOptions {
        CompletionOptions {
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        }
    }

    /// Normalize, validate and (with a tenant id) scope model output. The
    /// error side is the response to return instead.
    fn harden(
        &self,
        sql: &str,
        tenant_id: Option<&str>,
        dialect: Dialect,
    ) -> Result<String, NlqResponse> {
        let sql = self.normalizer.normalize(sql, dialect);

        if let Some(keyword) = self.safety.find_violation(&sql) {
            warn!("Rejected generated SQL containing {}", keyword);
            return Err(NlqResponse::rejected(
                NlqErrorCode::DangerousOperation,
                format!("The generated query contains a forbidden operation: {keyword}"),
            ));
        }

        match tenant_id {
            Some(tenant_id) => self
                .secure_for_tenant(&sql, tenant_id, dialect)
                .map_err(|e| {
                    warn!("Tenant filter could not be applied: {}", e);
                    NlqResponse::rejected(
                        NlqErrorCode::TenantFilterError,
                        format!("The query could not be restricted to your data: {e}"),
                    )
                }),
            None => Ok(sql),
        }
    }
}
