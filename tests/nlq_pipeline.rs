use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use nlq_studio::config::NlqConfig;
use nlq_studio::llm::{ChatMessage, CompletionClient, CompletionOptions, LlmError};
use nlq_studio::nlq::{
    generate_query_suggestions, ColumnDescriptor, NlqEngine, NlqErrorCode, NlqRequest,
    RefinementRequest, SchemaDescriptor, TableDescriptor, UserFeedback,
};

/// Deterministic completion client: always answers with the same text.
struct CannedClient {
    reply: Result<String, String>,
    calls: AtomicUsize,
}

impl CannedClient {
    fn ok(reply: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: Ok(reply.to_string()),
            calls: AtomicUsize::new(0),
        })
    }

    fn failing(message: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: Err(message.to_string()),
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl CompletionClient for CannedClient {
    async fn complete(
        &self,
        _messages: &[ChatMessage],
        options: &CompletionOptions,
    ) -> Result<String, LlmError> {
        assert!(options.temperature <= 0.2);
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.reply.clone().map_err(LlmError::ConnectionError)
    }
}

fn engine(client: Arc<CannedClient>) -> NlqEngine {
    NlqEngine::new(client, NlqConfig::default()).expect("default configuration is valid")
}

fn opportunity_schema() -> SchemaDescriptor {
    SchemaDescriptor::new(vec![TableDescriptor::new(
        "SalesOpportunity",
        vec![
            ColumnDescriptor::new("status", "varchar"),
            ColumnDescriptor::new("tenantId", "varchar"),
        ],
    )])
}

#[tokio::test]
async fn won_opportunities_this_month() {
    let client = CannedClient::ok(
        "Here is the query:\n```sql\nSELECT COUNT(*) FROM opportunities o \
         WHERE o.status = 'won' AND o.\"createdAt\" >= date_trunc('month', CURRENT_DATE);\n```",
    );
    let request = NlqRequest::new("How many opportunities were won this month?")
        .with_schema(opportunity_schema())
        .with_tenant("tid-42");

    let response = engine(client.clone()).generate_sql(&request).await;

    assert_eq!(response.error, None, "{}", response.explanation);
    assert!(response.sql.contains("\"SalesOpportunity\""));
    assert!(response.sql.contains("o.\"tenantId\" = 'tid-42'"));
    assert!(response.sql.contains("status"));
    assert!(response.confidence > 0.5);
    assert!(response.is_executable());
    assert_eq!(client.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn deny_listed_keywords_always_reject() {
    for reply in [
        "SELECT * FROM \"SalesLead\" WHERE id IN (SELECT id FROM x); DROP TABLE \"SalesLead\"",
        "SELECT name FROM \"SalesLead\" -- delete later",
        "WITH x AS (SELECT 1) update \"SalesLead\" SET name = 'y'",
        "SELECT 1 FROM \"SalesLead\" WHERE note = 'Insert here'",
    ] {
        let response = engine(CannedClient::ok(reply))
            .generate_sql(&NlqRequest::new("List all leads by owner").with_tenant("tid-42"))
            .await;
        assert_eq!(
            response.error,
            Some(NlqErrorCode::DangerousOperation),
            "{reply}"
        );
        assert!(response.sql.is_empty());
        assert_eq!(response.confidence, 0.0);
    }
}

#[tokio::test]
async fn general_knowledge_is_refused_without_a_model_call() {
    let client = CannedClient::ok("SELECT 1");
    let response = engine(client.clone())
        .generate_sql(&NlqRequest::new("Tell me about the history of Rome"))
        .await;

    assert_eq!(response.error, Some(NlqErrorCode::NotDataQuestion));
    assert_eq!(client.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn model_failures_are_reported_not_raised() {
    let response = engine(CannedClient::failing("connection reset"))
        .generate_sql(&NlqRequest::new("Show revenue by month for 2025").with_tenant("tid-42"))
        .await;

    assert_eq!(
        response.error,
        Some(NlqErrorCode::Unclassified("LLM connection error: connection reset".to_string()))
    );
    assert!(response.sql.is_empty());
    assert_eq!(response.confidence, 0.0);
}

#[tokio::test]
async fn refinement_failure_preserves_the_original_sql() {
    let original = "SELECT status, COUNT(*) FROM \"SalesOpportunity\" GROUP BY status";
    let request =
        RefinementRequest::new("won deals by status", original, UserFeedback::NeedsImprovement);

    let response = engine(CannedClient::failing("timeout"))
        .refine_query(&request)
        .await;

    assert_eq!(response.sql, original);
    assert_eq!(response.confidence, 0.5);
    assert!(response.explanation.contains("timeout"));
}

#[test]
fn suggestions_respect_the_limit() {
    let schema = SchemaDescriptor::new(vec![
        TableDescriptor::new(
            "SalesOpportunity",
            vec![
                ColumnDescriptor::new("amount", "decimal"),
                ColumnDescriptor::new("closeDate", "timestamp"),
            ],
        ),
        TableDescriptor::new("SalesLead", vec![ColumnDescriptor::new("score", "int")]),
    ]);

    assert_eq!(generate_query_suggestions(&schema, 3).len(), 3);
    assert_eq!(generate_query_suggestions(&schema, 50).len(), 9);
    assert!(generate_query_suggestions(&SchemaDescriptor::default(), 3).is_empty());
}
