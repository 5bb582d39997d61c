use clap::Parser;
use std::sync::Arc;
use tracing::{error, info};

use nlq_studio::config::{AppConfig, CliArgs};
use nlq_studio::llm::LlmManager;
use nlq_studio::nlq::NlqEngine;
use nlq_studio::util::logging::init_tracing;
use nlq_studio::web;
use nlq_studio::web::state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse command line arguments
    let args = CliArgs::parse();

    // Initialize logging
    init_tracing(args.log_json);

    // Load configuration
    let config = match AppConfig::new(&args) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    // Initialize LLM manager
    info!("Initializing LLM manager with backend: {}", config.llm.backend);
    let llm_manager = LlmManager::new(&config.llm)?;

    info!(
        "Initializing NLQ engine ({} table mappings, {} denied keywords)",
        config.nlq.table_mappings.len(),
        config.nlq.denied_keywords.len()
    );
    let engine = NlqEngine::new(llm_manager.client(), config.nlq.clone())?;

    let app_state = Arc::new(AppState::new(config.clone(), &llm_manager, engine));

    // Start the web server
    info!("Starting NLQ Studio server on {}:{}", config.web.host, config.web.port);
    match web::run_server(config.web, app_state).await {
        Ok(_) => info!("Server stopped gracefully"),
        Err(e) => {
            error!("Server error: {}", e);
            return Err(e.into());
        }
    }

    Ok(())
}
