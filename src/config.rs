use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

use crate::annict::og_image::{FETCH_TIMEOUT, MAX_WORKERS};
use crate::annict::{DEFAULT_ENDPOINT, DEFAULT_SITE_URL};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,

    pub annict: AnnictConfig,

    pub enrichment: EnrichmentConfig,

    pub server: ServerConfig,

    pub slack: SlackConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    pub log_level: String,

    /// Emit logs as JSON lines instead of the human-readable format.
    pub log_json: bool,

    /// Number of tokio worker threads (default: 2)
    /// Set to 0 to use the number of CPU cores
    pub worker_threads: usize,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_json: false,
            worker_threads: 2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnnictConfig {
    /// Personal access token, usually provided through `ANNICT_TOKEN`.
    #[serde(skip_serializing)]
    pub token: String,

    pub endpoint: String,

    /// Public site that serves the work pages scraped for preview images.
    pub site_url: String,

    pub request_timeout_seconds: u64,
}

impl Default for AnnictConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            site_url: DEFAULT_SITE_URL.to_string(),
            request_timeout_seconds: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrichmentConfig {
    /// Upper bound on concurrent work page fetches across all requests.
    pub max_workers: usize,

    pub fetch_timeout_ms: u64,
}

impl EnrichmentConfig {
    #[must_use]
    pub const fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            max_workers: MAX_WORKERS,
            fetch_timeout_ms: u64::try_from(FETCH_TIMEOUT.as_millis()).unwrap_or(3000),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub enabled: bool,

    pub port: u16,

    pub cors_enabled: bool,

    /// Upper bound for a single API request, upstream calls included.
    pub request_timeout_seconds: u64,

    /// How long shutdown waits for slash commands and again for in-flight
    /// image fetches.
    pub shutdown_timeout_seconds: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: 8080,
            cors_enabled: false,
            request_timeout_seconds: 30,
            shutdown_timeout_seconds: 1,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SlackConfig {
    pub enabled: bool,

    #[serde(skip_serializing)]
    pub signing_secret: String,

    #[serde(skip_serializing)]
    pub webhook_url: String,
}

impl Config {
    /// Loads the first config file found, then applies environment overrides.
    pub fn load() -> Result<Self> {
        // A missing .env file is fine.
        let _ = dotenvy::dotenv();

        let mut config = Self::load_file()?;
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    fn load_file() -> Result<Self> {
        for path in &Self::config_paths() {
            if path.exists() {
                info!("Loading config from: {}", path.display());
                return Self::load_from_path(path);
            }
        }

        info!("No config file found, using defaults");
        Ok(Self::default())
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    fn config_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from("config.toml")];

        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("shiori").join("config.toml"));
        }

        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".shiori").join("config.toml"));
        }

        paths
    }

    /// Applies environment overrides through `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(token) = lookup("ANNICT_TOKEN") {
            self.annict.token = token;
        }
        if let Some(endpoint) = lookup("ANNICT_ENDPOINT") {
            self.annict.endpoint = endpoint;
        }
        if let Some(secret) = lookup("SLACK_SIGNING_SECRET") {
            self.slack.signing_secret = secret;
            self.slack.enabled = true;
        }
        if let Some(url) = lookup("SLACK_WEBHOOK_URL") {
            self.slack.webhook_url = url;
        }
        if let Some(port) = lookup("PORT") {
            self.server.port = port
                .parse()
                .with_context(|| format!("Invalid PORT value: {port}"))?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.annict.token.is_empty() {
            anyhow::bail!("Annict token is required (set ANNICT_TOKEN)");
        }

        if self.annict.endpoint.is_empty() {
            anyhow::bail!("Annict endpoint cannot be empty");
        }

        if self.enrichment.max_workers == 0 {
            anyhow::bail!("enrichment.max_workers must be > 0");
        }

        if self.slack.enabled
            && (self.slack.signing_secret.is_empty() || self.slack.webhook_url.is_empty())
        {
            anyhow::bail!("Slack needs both a signing secret and a webhook URL when enabled");
        }

        Ok(())
    }
}
