use clap::Parser;
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct WebConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    pub backend: String, // "remote" or "ollama"
    pub model: String,   // Model name
    pub api_key: Option<String>,
    pub api_url: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// A colloquial table reference and the canonical identifier it is rewritten to.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct TableMapping {
    /// Regex alternation of bare names, e.g. `leads|lead`.
    pub pattern: String,
    /// Canonical table name, emitted double-quoted.
    pub canonical: String,
}

impl TableMapping {
    pub fn new(pattern: &str, canonical: &str) -> Self {
        Self {
            pattern: pattern.to_string(),
            canonical: canonical.to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct NlqConfig {
    #[serde(default = "default_tenant_column")]
    pub tenant_column: String,
    #[serde(default = "default_tenant_placeholder")]
    pub tenant_placeholder: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,
    #[serde(default = "default_table_mappings")]
    pub table_mappings: Vec<TableMapping>,
    #[serde(default = "default_denied_keywords")]
    pub denied_keywords: Vec<String>,
    /// Tables shared by every tenant; they never receive a tenant predicate.
    #[serde(default)]
    pub global_tables: Vec<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub web: WebConfig,
    pub llm: LlmConfig,
    #[serde(default)]
    pub nlq: NlqConfig,
}

#[derive(Parser, Debug, Default)]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Host to bind to
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Completion backend ("remote" or "ollama")
    #[arg(long)]
    pub llm_backend: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long)]
    pub log_json: bool,
}

impl AppConfig {
    pub fn new(args: &CliArgs) -> Result<Self, ConfigError> {
        let defaults = AppConfig::default();

        // Start with built-in defaults so a partial file is enough
        let mut config_builder = Config::builder()
            .set_default("web.host", defaults.web.host.clone())?
            .set_default("web.port", defaults.web.port as i64)?
            .set_default("llm.backend", defaults.llm.backend.clone())?
            .set_default("llm.model", defaults.llm.model.clone())?;

        // Add configuration from file if specified
        if let Some(config_path) = &args.config {
            config_builder = config_builder.add_source(File::from(config_path.as_path()));
        } else {
            // Check for config in default locations
            let default_locations = vec![
                "config.toml",
                "config/config.toml",
                "/etc/nlq-studio/config.toml",
            ];

            for location in default_locations {
                if Path::new(location).exists() {
                    config_builder =
                        config_builder.add_source(File::new(location, config::FileFormat::Toml));
                    break;
                }
            }
        }

        // NLQ_STUDIO__LLM__API_KEY and friends
        config_builder = config_builder.add_source(
            Environment::with_prefix("NLQ_STUDIO")
                .prefix_separator("__")
                .separator("__"),
        );

        // Build the config
        let mut config: AppConfig = config_builder.build()?.try_deserialize()?;

        // Override with command line args if provided
        if let Some(host) = &args.host {
            config.web.host = host.clone();
        }
        if let Some(port) = args.port {
            config.web.port = port;
        }
        if let Some(backend) = &args.llm_backend {
            config.llm.backend = backend.clone();
        }

        Ok(config)
    }
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_tenant_column() -> String {
    "tenantId".to_string()
}

fn default_tenant_placeholder() -> String {
    "{{TENANT_ID}}".to_string()
}

fn default_temperature() -> f32 {
    0.1
}

fn default_max_tokens() -> usize {
    1000
}

pub fn default_table_mappings() -> Vec<TableMapping> {
    vec![
        TableMapping::new("leads|lead", "SalesLead"),
        TableMapping::new("opportunities|opportunity", "SalesOpportunity"),
        TableMapping::new("contacts|contact", "SalesContact"),
        TableMapping::new("accounts|account", "SalesAccount"),
    ]
}

pub fn default_denied_keywords() -> Vec<String> {
    ["DROP", "DELETE", "UPDATE", "TRUNCATE", "ALTER", "CREATE", "INSERT"]
        .iter()
        .map(|k| k.to_string())
        .collect()
}

impl Default for NlqConfig {
    fn default() -> Self {
        Self {
            tenant_column: default_tenant_column(),
            tenant_placeholder: default_tenant_placeholder(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            table_mappings: default_table_mappings(),
            denied_keywords: default_denied_keywords(),
            global_tables: Vec::new(),
        }
    }
}

// Default implementation
impl Default for AppConfig {
    fn default() -> Self {
        Self {
            web: WebConfig {
                host: "127.0.0.1".to_string(),
                port: 3000,
            },
            llm: LlmConfig {
                backend: "remote".to_string(),
                model: "gpt-4o-mini".to_string(),
                api_key: None,
                api_url: None,
                timeout_secs: default_timeout_secs(),
            },
            nlq: NlqConfig::default(),
        }
    }
}
