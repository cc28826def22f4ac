pub mod prompt;

use crate::cli::Args;
use crate::llm::LlmConfig;
use std::time::Duration;

/// Runtime settings for the proxy, detached from the process environment so
/// tests can build one directly.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub cors_origins: Option<Vec<String>>,
    pub rate_limit_per_minute: u32,
    pub llm: LlmConfig,
    pub prompts_path: Option<String>,
    pub tls: Option<TlsPaths>,
}

#[derive(Clone, Debug)]
pub struct TlsPaths {
    pub cert_path: String,
    pub key_path: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3001,
            cors_origins: None,
            rate_limit_per_minute: 10,
            llm: LlmConfig::default(),
            prompts_path: None,
            tls: None,
        }
    }
}

impl ServerConfig {
    pub fn from_args(args: &Args) -> Result<Self, String> {
        let tls = if args.enable_tls {
            match (&args.tls_cert_path, &args.tls_key_path) {
                (Some(cert), Some(key)) =>
                    Some(TlsPaths { cert_path: cert.clone(), key_path: key.clone() }),
                _ => {
                    return Err(
                        "Both --tls-cert-path and --tls-key-path must be provided to enable TLS.".into()
                    );
                }
            }
        } else {
            None
        };

        if args.rate_limit_per_minute == 0 {
            return Err("RATE_LIMIT_PER_MINUTE must be at least 1".into());
        }

        Ok(Self {
            host: args.host.clone(),
            port: args.port,
            cors_origins: args.cors_origins.clone().filter(|o| !o.is_empty()),
            rate_limit_per_minute: args.rate_limit_per_minute,
            llm: LlmConfig {
                api_key: args.gemini_api_key.clone().filter(|k| !k.trim().is_empty()),
                model: args.gemini_model.clone(),
                base_url: args.gemini_base_url.clone(),
                temperature: args.temperature,
                max_output_tokens: args.max_output_tokens,
                timeout: Duration::from_secs(args.upstream_timeout_secs),
            },
            prompts_path: args.prompts_path.clone(),
            tls,
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn blank_api_key_counts_as_missing() {
        let args = Args::try_parse_from([
            "lumi-server",
            "--gemini-api-key",
            " ",
            "--port",
            "4000",
        ]).unwrap();
        let config = ServerConfig::from_args(&args).unwrap();
        assert!(config.llm.api_key.is_none());
        assert_eq!(config.port, 4000);
    }

    #[test]
    fn tls_requires_both_paths() {
        let args = Args::try_parse_from([
            "lumi-server",
            "--enable-tls",
            "--tls-cert-path",
            "cert.pem",
        ]).unwrap();
        assert!(ServerConfig::from_args(&args).is_err());
    }
}
