use tracing::{error, info};

use super::confidence::calculate_confidence_score;
use super::prompt::{extract_sql, refinement_messages};
use super::types::{NlqErrorCode, NlqResponse, RefinementRequest};
use super::visualization::suggest_visualization;
use super::NlqEngine;

impl NlqEngine {
    /// Ask the model to improve a previous query using the user's feedback.
    ///
    /// When the model call fails the original SQL comes back untouched with a
    /// neutral confidence of 0.5, so the caller keeps its last working query.
    /// Refined SQL goes through the same checks as freshly generated SQL.
    pub async fn refine_query(&self, request: &RefinementRequest) -> NlqResponse {
        info!("Refining query with {:?} feedback", request.user_feedback);

        let messages = refinement_messages(request, self.config());
        let completion = self
            .client
            .complete(&messages, &self.completion_options())
            .await;

        let sql = match completion.map(|content| extract_sql(&content)) {
            Ok(sql) if !sql.is_empty() => sql,
            Ok(_) => return keep_original(request, "the model returned no SQL".to_string()),
            Err(e) => return keep_original(request, e.to_string()),
        };

        let sql = match self.harden(&sql, request.tenant_id.as_deref(), request.dialect) {
            Ok(sql) => sql,
            Err(rejection) => return rejection,
        };

        // No schema travels with a refinement request
        let score = calculate_confidence_score(&sql, None);
        NlqResponse {
            suggested_visualization: Some(suggest_visualization(&sql)),
            confidence: score.overall,
            confidence_details: Some(score),
            explanation: "Query refined using your feedback.".to_string(),
            error: None,
            sql,
        }
    }
}

fn keep_original(request: &RefinementRequest, message: String) -> NlqResponse {
    error!("Query refinement failed: {}", message);
    NlqResponse {
        sql: request.original_sql.clone(),
        confidence: 0.5,
        explanation: format!("Refinement failed ({message}); the original query is unchanged."),
        suggested_visualization: None,
        confidence_details: None,
        error: Some(NlqErrorCode::Unclassified(message)),
    }
}
