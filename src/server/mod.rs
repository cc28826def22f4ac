pub mod api;
pub mod error;
pub mod rate_limit;

use crate::config::ServerConfig;
use api::{ build_router, AppState };
use log::{ error, info };
use std::error::Error;
use std::net::SocketAddr;
use std::time::Duration;

const RATE_LIMIT_PRUNE_INTERVAL: Duration = Duration::from_secs(60);

pub struct Server {
    config: ServerConfig,
    state: AppState,
}

impl Server {
    pub fn new(config: ServerConfig, state: AppState) -> Self {
        Self { config, state }
    }

    pub async fn run(&self) -> Result<(), Box<dyn Error + Send + Sync>> {
        let addr = tokio::net
            ::lookup_host(self.config.bind_addr()).await?
            .next()
            .ok_or_else(|| format!("Could not resolve bind address {}", self.config.bind_addr()))?;

        self.spawn_limiter_pruning();
        let app = build_router(self.state.clone());

        match &self.config.tls {
            Some(tls) => {
                info!(
                    "TLS enabled. Loading certificate from '{}' and key from '{}'",
                    tls.cert_path,
                    tls.key_path
                );
                let tls_config = axum_server::tls_rustls::RustlsConfig
                    ::from_pem_file(&tls.cert_path, &tls.key_path).await
                    .map_err(|e| format!("Failed to load TLS certificate/key: {}", e))?;

                info!("🚀 HTTPS server listening on: https://{}", addr);
                self.log_endpoints("https", addr);
                axum_server
                    ::bind_rustls(addr, tls_config)
                    .serve(app.into_make_service_with_connect_info::<SocketAddr>()).await?;
            }
            None => {
                let listener = tokio::net::TcpListener::bind(addr).await.map_err(|e| {
                    error!("Failed to bind HTTP server to {}: {}. Try a different port.", addr, e);
                    e
                })?;
                info!("🚀 HTTP server listening on: http://{}", addr);
                self.log_endpoints("http", addr);
                axum
                    ::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
                    .with_graceful_shutdown(shutdown_signal()).await?;
            }
        }

        info!("Server stopped");
        Ok(())
    }

    fn log_endpoints(&self, scheme: &str, addr: SocketAddr) {
        info!("✅ Health check: {}://{}/health", scheme, addr);
        info!(
            "✅ Chat endpoint: {}://{}/api/chat ({} requests per {}s per client)",
            scheme,
            addr,
            self.state.rate_limiter.limit(),
            self.state.rate_limiter.window().as_secs()
        );
    }

    fn spawn_limiter_pruning(&self) {
        let limiter = self.state.rate_limiter.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(RATE_LIMIT_PRUNE_INTERVAL);
            loop {
                ticker.tick().await;
                limiter.prune();
            }
        });
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
