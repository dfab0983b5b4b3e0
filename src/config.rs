use anyhow::{Context, bail};
use serde::{Deserialize, Serialize};
use std::fs;
use std::time::Duration;

/// Minimum key length for HS256 access tokens
pub const MIN_SYMMETRIC_KEY_LEN: usize = 32;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AppConfig {
    pub log_level: String,
    pub log_dir: String,
    pub log_file: String,
    pub use_json: bool,
    pub rotation: String,
    pub gateway: GatewayConfig,
    pub postgres: PostgresConfig,
    pub token: TokenConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
    /// Upper bound for a single request, including its database transaction
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Browser origins allowed by the CORS policy; empty allows none
    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

impl GatewayConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

fn default_request_timeout_ms() -> u64 {
    5000
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PostgresConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_acquire_timeout_secs")]
    pub acquire_timeout_secs: u64,
}

fn default_max_connections() -> u32 {
    10
}

fn default_acquire_timeout_secs() -> u64 {
    5
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TokenConfig {
    pub symmetric_key: String,
    pub access_token_duration_secs: i64,
}

impl AppConfig {
    /// Load `config/{env}.yaml`, then apply environment overrides.
    pub fn load(env: &str) -> anyhow::Result<Self> {
        let config_path = format!("config/{}.yaml", env);
        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path))?;
        let mut config = Self::from_yaml(&content)?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml(content: &str) -> anyhow::Result<Self> {
        serde_yaml::from_str(content).context("Failed to parse config yaml")
    }

    /// DATABASE_URL, TOKEN_SYMMETRIC_KEY, ACCESS_TOKEN_DURATION_SECS, SERVER_PORT and
    /// ALLOWED_ORIGINS (comma separated) take precedence over the file.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("DATABASE_URL") {
            self.postgres.url = url;
        }
        if let Some(key) = lookup("TOKEN_SYMMETRIC_KEY") {
            self.token.symmetric_key = key;
        }
        if let Some(secs) = lookup("ACCESS_TOKEN_DURATION_SECS").and_then(|s| s.parse().ok()) {
            self.token.access_token_duration_secs = secs;
        }
        if let Some(port) = lookup("SERVER_PORT").and_then(|p| p.parse().ok()) {
            self.gateway.port = port;
        }
        if let Some(origins) = lookup("ALLOWED_ORIGINS") {
            self.gateway.allowed_origins = origins
                .split(',')
                .map(str::trim)
                .filter(|o| !o.is_empty())
                .map(String::from)
                .collect();
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.token.symmetric_key.len() < MIN_SYMMETRIC_KEY_LEN {
            bail!(
                "token.symmetric_key must be at least {} bytes, got {}",
                MIN_SYMMETRIC_KEY_LEN,
                self.token.symmetric_key.len()
            );
        }
        if self.token.access_token_duration_secs <= 0 {
            bail!("token.access_token_duration_secs must be positive");
        }
        Ok(())
    }
}
