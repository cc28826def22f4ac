pub mod cli;
pub mod client;
pub mod config;
pub mod fallback;
pub mod history;
pub mod llm;
pub mod models;
pub mod server;
pub mod ui;

use cli::Args;
use config::ServerConfig;
use log::{ info, warn };
use server::api::AppState;
use server::Server;
use std::error::Error;

pub async fn run(args: Args) -> Result<(), Box<dyn Error + Send + Sync>> {
    let config = ServerConfig::from_args(&args)?;

    info!("--- Core Configuration ---");
    info!("Server Address: {}", config.bind_addr());
    info!("Gemini Model: {}", config.llm.model);
    info!("Gemini Base URL: {}", config.llm.base_url);
    info!("Gemini API Key: {}", if config.llm.api_key.is_some() { "set" } else { "not set" });
    info!("Upstream Timeout: {}s", config.llm.timeout.as_secs());
    info!("Rate Limit: {} requests/minute per client", config.rate_limit_per_minute);
    match &config.cors_origins {
        Some(origins) => info!("CORS Origins: {}", origins.join(", ")),
        None => info!("CORS Origins: any"),
    }
    info!("Prompts Path: {}", config.prompts_path.as_deref().unwrap_or("built-in"));
    info!("TLS Enabled: {}", config.tls.is_some());
    info!("-------------------------");

    if config.llm.api_key.is_none() {
        warn!("GEMINI_API_KEY is not set; /api/chat will answer 500 until it is configured");
    }

    let state = AppState::new(&config)?;
    let server = Server::new(config, state);
    server.run().await?;

    Ok(())
}
