use tracing::{error, info, warn};

use super::classifier::is_question_suitable;
use super::confidence::calculate_confidence_score;
use super::prompt::{extract_sql, generation_messages, is_not_data_response};
use super::types::{NlqErrorCode, NlqRequest, NlqResponse};
use super::visualization::suggest_visualization;
use super::NlqEngine;

impl NlqEngine {
    /// Turn a question into tenant-scoped SQL.
    ///
    /// Never fails: every rejection or model failure comes back as a response
    /// with `error` set and no SQL.
    pub async fn generate_sql(&self, request: &NlqRequest) -> NlqResponse {
        let check = is_question_suitable(&request.question);
        if !check.valid {
            let reason = check.reason.unwrap_or_default();
            warn!("Question rejected before generation: {}", reason);
            let explanation = match check.suggestion {
                Some(suggestion) => format!("{reason}. {suggestion}"),
                None => reason,
            };
            return NlqResponse::rejected(NlqErrorCode::NotDataQuestion, explanation);
        }

        info!(
            "Generating SQL for question ({} dialect, tenant scoped: {})",
            request.dialect,
            request.tenant_id.is_some()
        );

        let messages = generation_messages(request, self.config());
        let content = match self
            .client
            .complete(&messages, &self.completion_options())
            .await
        {
            Ok(content) => content,
            Err(e) => {
                error!("SQL generation failed: {}", e);
                return NlqResponse::rejected(
                    NlqErrorCode::Unclassified(e.to_string()),
                    format!("Failed to generate SQL: {e}"),
                );
            }
        };

        if is_not_data_response(&content) {
            warn!("Model classified the question as not about application data");
            return NlqResponse::rejected(
                NlqErrorCode::NotDataQuestion,
                "This question is not about your application data. Ask about records such as \
                 leads, opportunities, contacts or accounts.",
            );
        }

        let sql = extract_sql(&content);
        if sql.is_empty() {
            error!("Completion did not contain any SQL");
            return NlqResponse::rejected(
                NlqErrorCode::Unclassified("Model returned no SQL".to_string()),
                "The model response did not contain a query.",
            );
        }

        let sql = match self.harden(&sql, request.tenant_id.as_deref(), request.dialect) {
            Ok(sql) => sql,
            Err(rejection) => return rejection,
        };

        let visualization = suggest_visualization(&sql);
        let score = calculate_confidence_score(&sql, request.schema.as_ref());

        let explanation = match &request.tenant_id {
            Some(_) => format!(
                "Query generated for \"{}\" and restricted to your tenant.",
                request.question.trim()
            ),
            None => format!(
                "Query generated for \"{}\". It is not tenant-scoped: replace {} with the \
                 tenant id and apply the tenant filter before executing it.",
                request.question.trim(),
                self.config().tenant_placeholder
            ),
        };

        info!(
            "Generated SQL with confidence {:.2} ({:?} chart)",
            score.overall, visualization
        );

        NlqResponse {
            sql,
            confidence: score.overall,
            explanation,
            suggested_visualization: Some(visualization),
            confidence_details: Some(score),
            error: None,
        }
    }
}
