use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "Lumi chat proxy server", long_about = None)]
pub struct Args {
    // --- Server Args ---
    /// Interface the HTTP server binds to.
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port the HTTP server listens on.
    #[arg(long, env = "PORT", default_value = "3001")]
    pub port: u16,

    /// Comma-separated list of allowed CORS origins. Any origin is allowed when unset.
    #[arg(long, env = "CORS_ORIGINS", value_delimiter = ',')]
    pub cors_origins: Option<Vec<String>>,

    /// Maximum chat requests per client IP per minute.
    #[arg(long, env = "RATE_LIMIT_PER_MINUTE", default_value = "10")]
    pub rate_limit_per_minute: u32,

    // --- Gemini Args ---
    /// Google Gemini API key. Kept server-side only.
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    pub gemini_api_key: Option<String>,

    /// Gemini model name (e.g., gemini-1.5-flash)
    #[arg(long, env = "GEMINI_MODEL", default_value = "gemini-1.5-flash")]
    pub gemini_model: String,

    /// Base URL of the Generative Language API.
    #[arg(long, env = "GEMINI_BASE_URL", default_value = "https://generativelanguage.googleapis.com")]
    pub gemini_base_url: String,

    /// Sampling temperature sent with every request.
    #[arg(long, env = "GEMINI_TEMPERATURE", default_value = "0.8")]
    pub temperature: f32,

    /// Upper bound on tokens in each generated reply.
    #[arg(long, env = "GEMINI_MAX_OUTPUT_TOKENS", default_value = "400")]
    pub max_output_tokens: u32,

    /// Seconds to wait for the upstream API before giving up.
    #[arg(long, env = "UPSTREAM_TIMEOUT_SECS", default_value = "30")]
    pub upstream_timeout_secs: u64,

    // --- General App Args ---
    /// Optional JSON file overriding the built-in system prompts ({"general": ..., "diary": ...}).
    #[arg(long, env = "PROMPTS_PATH")]
    pub prompts_path: Option<String>,

    /// Enable debug logging/output
    #[arg(long, env = "DEBUG", default_value = "false")]
    pub debug: bool,

    /// Optional path to the TLS certificate file (PEM format). Requires --tls-key-path.
    #[arg(long, env = "TLS_CERT_PATH")]
    pub tls_cert_path: Option<String>,

    /// Optional path to the TLS private key file (PEM format). Requires --tls-cert-path.
    #[arg(long, env = "TLS_KEY_PATH")]
    pub tls_key_path: Option<String>,

    #[arg(long, env = "ENABLE_TLS", default_value = "false")]
    pub enable_tls: bool,
}

#[derive(Parser, Debug, Clone)]
#[command(name = "lumi", author, version, about = "Terminal client for the Lumi chat proxy", long_about = None)]
pub struct ClientArgs {
    /// Base URL of the Lumi chat proxy.
    #[arg(long, env = "LUMI_SERVER_URL", default_value = "http://127.0.0.1:3001")]
    pub server_url: String,

    /// Seconds to wait for a reply before answering from the fallback responder.
    #[arg(long, env = "LUMI_TIMEOUT_SECS", default_value = "30")]
    pub timeout_secs: u64,

    /// Seed for the fallback responder, for reproducible replies.
    #[arg(long, env = "LUMI_SEED")]
    pub seed: Option<u64>,

    /// Enable debug logging/output
    #[arg(long, env = "DEBUG", default_value = "false")]
    pub debug: bool,
}
