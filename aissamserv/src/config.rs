//! Environment-derived configuration, read once at startup and injected
//! into the services that need it.

use base64::engine::general_purpose::URL_SAFE_NO_PAD as BASE64_URL_SAFE;
use base64::Engine as _;
use uuid::Uuid;

pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";

#[derive(Clone)]
pub struct Config {
    pub database_url: String,
    pub gemini_api_key: String,
    pub gemini_model: String,
    pub gemini_base_url: String,
    pub token_secret: String,
    pub token_ttl_secs: u64,
    pub allowed_origins: Vec<String>,
    pub uploads_dir: String,
    pub public_base_url: String,
    pub bind_addr: String,
}

impl Config {
    pub fn from_env() -> Self {
        let gemini_api_key = std::env::var("GEMINI_API_KEY").unwrap_or_default();
        if gemini_api_key.is_empty() {
            tracing::warn!("⚠️ GEMINI_API_KEY not set; model calls will fail and apologies will be served");
        }

        let token_secret = match std::env::var("AISSAM_SECRET") {
            Ok(secret) if !secret.is_empty() => secret,
            _ => {
                tracing::warn!(
                    "⚠️ AISSAM_SECRET not set; using an ephemeral signing secret, tokens will not survive restarts"
                );
                let random_bytes: [u8; 16] = rand::random();
                format!(
                    "{}{}",
                    BASE64_URL_SAFE.encode(random_bytes),
                    Uuid::new_v4().simple()
                )
            }
        };

        let token_ttl_secs = std::env::var("ACCESS_TOKEN_TTL_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(1800); // 30 minutes

        let allowed_origins = std::env::var("ALLOWED_ORIGINS")
            .unwrap_or_else(|_| "*".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        Config {
            database_url: std::env::var("DATABASE_URL").unwrap_or_else(|_| "aissam.db".to_string()),
            gemini_api_key,
            gemini_model: std::env::var("GEMINI_MODEL")
                .unwrap_or_else(|_| "gemini-2.5-flash-preview-05-20".to_string()),
            gemini_base_url: std::env::var("GEMINI_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_GEMINI_BASE_URL.to_string()),
            token_secret,
            token_ttl_secs,
            allowed_origins,
            uploads_dir: std::env::var("UPLOADS_DIR").unwrap_or_else(|_| "uploads".to_string()),
            public_base_url: std::env::var("PUBLIC_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:8000".to_string()),
            bind_addr: std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8000".to_string()),
        }
    }
}
