use crate::config::AppConfig;
use crate::llm::LlmManager;
use crate::nlq::NlqEngine;
use tracing::info;

/// Shared application state for the web server
pub struct AppState {
    pub config: AppConfig,
    pub engine: NlqEngine,
    pub llm_backend: String,
    pub startup_time: chrono::DateTime<chrono::Utc>,
}

impl AppState {
    pub fn new(config: AppConfig, llm_manager: &LlmManager, engine: NlqEngine) -> Self {
        info!(
            "Application state ready (LLM backend: {}, tenant column: {})",
            llm_manager.backend(),
            config.nlq.tenant_column
        );

        Self {
            llm_backend: llm_manager.backend().to_string(),
            config,
            engine,
            startup_time: chrono::Utc::now(),
        }
    }
}
