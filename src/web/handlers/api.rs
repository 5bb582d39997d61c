use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    Json,
};

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::nlq::{
    ConfidenceScore, Dialect, NlqRequest, NlqResponse, QuerySuggestion, QuestionCheck,
    RefinementRequest, SchemaDescriptor,
};
use crate::web::state::AppState;

pub const TENANT_HEADER: &str = "x-tenant-id";

const DEFAULT_SUGGESTION_LIMIT: usize = 5;

// Request types

#[derive(Debug, Deserialize)]
pub struct ValidateQuestionRequest {
    pub question: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuggestionsRequest {
    pub schema: SchemaDescriptor,
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub tenant_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ConfidenceRequest {
    pub sql: String,
    #[serde(default)]
    pub schema: Option<SchemaDescriptor>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecureQueryRequest {
    pub sql: String,
    #[serde(default)]
    pub tenant_id: Option<String>,
    #[serde(default)]
    pub dialect: Dialect,
    /// Substitute the placeholder token before scoping.
    #[serde(default)]
    pub bind_placeholder: bool,
}

#[derive(Debug, Serialize)]
pub struct SecureQueryResponse {
    pub sql: String,
}

// System status

#[derive(Debug, Serialize)]
pub struct SystemStatus {
    pub version: String,
    pub uptime_seconds: i64,
    pub llm_backend: String,
    pub tenant_column: String,
}

/// Tenant from the header and/or the body. Both may be given but must agree.
fn resolve_tenant(
    headers: &HeaderMap,
    body_tenant: Option<String>,
) -> Result<Option<String>, (StatusCode, String)> {
    let header_tenant = match headers.get(TENANT_HEADER) {
        Some(value) => Some(
            value
                .to_str()
                .map_err(|_| {
                    (
                        StatusCode::BAD_REQUEST,
                        format!("Invalid {} header", TENANT_HEADER),
                    )
                })?
                .trim()
                .to_string(),
        ),
        None => None,
    };

    match (header_tenant, body_tenant) {
        (Some(header), Some(body)) if header != body => {
            warn!("Tenant header and request body disagree");
            Err((
                StatusCode::BAD_REQUEST,
                "Tenant id in header and body do not match".to_string(),
            ))
        }
        (Some(header), _) => Ok(Some(header)),
        (None, body) => Ok(body),
    }
}

fn require_text(value: &str, field: &str) -> Result<(), (StatusCode, String)> {
    if value.trim().is_empty() {
        return Err((StatusCode::BAD_REQUEST, format!("{} must not be empty", field)));
    }
    Ok(())
}

// API Implementations

pub async fn nl_query(
    state: State<Arc<AppState>>,
    headers: HeaderMap,
    Json(mut payload): Json<NlqRequest>,
) -> Result<Json<NlqResponse>, (StatusCode, String)> {
    require_text(&payload.question, "question")?;
    payload.tenant_id = resolve_tenant(&headers, payload.tenant_id.take())?;

    info!("Received NL query");
    debug!("Question: {}", payload.question);

    Ok(Json(state.engine.generate_sql(&payload).await))
}

pub async fn refine_query(
    state: State<Arc<AppState>>,
    headers: HeaderMap,
    Json(mut payload): Json<RefinementRequest>,
) -> Result<Json<NlqResponse>, (StatusCode, String)> {
    require_text(&payload.original_sql, "originalSQL")?;
    payload.tenant_id = resolve_tenant(&headers, payload.tenant_id.take())?;

    Ok(Json(state.engine.refine_query(&payload).await))
}

pub async fn validate_question(
    state: State<Arc<AppState>>,
    Json(payload): Json<ValidateQuestionRequest>,
) -> Json<QuestionCheck> {
    Json(state.engine.check_question(&payload.question))
}

pub async fn confidence(
    state: State<Arc<AppState>>,
    Json(payload): Json<ConfidenceRequest>,
) -> Result<Json<ConfidenceScore>, (StatusCode, String)> {
    require_text(&payload.sql, "sql")?;
    Ok(Json(state.engine.score(&payload.sql, payload.schema.as_ref())))
}

pub async fn suggestions(
    state: State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<SuggestionsRequest>,
) -> Result<Json<Vec<QuerySuggestion>>, (StatusCode, String)> {
    let tenant_id = resolve_tenant(&headers, payload.tenant_id)?;
    let limit = payload.limit.unwrap_or(DEFAULT_SUGGESTION_LIMIT);

    Ok(Json(state.engine.suggestions(
        &payload.schema,
        limit,
        tenant_id.as_deref(),
    )))
}

pub async fn secure_query(
    state: State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<SecureQueryRequest>,
) -> Result<Json<SecureQueryResponse>, (StatusCode, String)> {
    require_text(&payload.sql, "sql")?;
    let tenant_id = resolve_tenant(&headers, payload.tenant_id)?.ok_or((
        StatusCode::BAD_REQUEST,
        "A tenant id is required".to_string(),
    ))?;

    let secured = if payload.bind_placeholder {
        state
            .engine
            .bind_tenant(&payload.sql, &tenant_id, payload.dialect)
    } else {
        state
            .engine
            .secure_for_tenant(&payload.sql, &tenant_id, payload.dialect)
    };

    match secured {
        Ok(sql) => Ok(Json(SecureQueryResponse { sql })),
        Err(e) => {
            warn!("Refusing to scope query: {}", e);
            Err((StatusCode::BAD_REQUEST, format!("Tenant filter error: {}", e)))
        }
    }
}

pub async fn system_status(state: State<Arc<AppState>>) -> Json<SystemStatus> {
    let now = chrono::Utc::now();
    let uptime = now.signed_duration_since(state.startup_time).num_seconds();

    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: uptime,
        llm_backend: state.llm_backend.clone(),
        tenant_column: state.config.nlq.tenant_column.clone(),
    })
}
