use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Public restcountries v2 endpoint, restricted to the fields the refresh reads.
pub const DEFAULT_COUNTRIES_API_URL: &str =
    "https://restcountries.com/v2/all?fields=name,capital,region,population,flag,currencies";
/// Public exchange-rate endpoint quoting every currency against USD.
pub const DEFAULT_EXCHANGE_API_URL: &str = "https://open.er-api.com/v6/latest/USD";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Postgres connection string. `None` selects the in-memory store.
    pub database_url: Option<String>,
    pub port: u16,
    pub countries_api_url: String,
    pub exchange_api_url: String,
    pub source_timeout: Duration,
    pub cache_dir: PathBuf,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            database_url: std::env::var("DB_URL")
                .or_else(|_| std::env::var("DATABASE_URL"))
                .ok()
                .filter(|s| !s.trim().is_empty())
                .map(|url| {
                    if !url.starts_with("postgresql://") && !url.starts_with("postgres://") {
                        anyhow::bail!("DATABASE_URL must start with postgresql:// or postgres://");
                    }
                    Ok(url)
                })
                .transpose()?,
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number between 1-65535"))?,
            countries_api_url: source_url("COUNTRIES_API_URL", DEFAULT_COUNTRIES_API_URL)?,
            exchange_api_url: source_url("EXCHANGE_API_URL", DEFAULT_EXCHANGE_API_URL)?,
            source_timeout: std::env::var("SOURCE_TIMEOUT_SECS")
                .unwrap_or_else(|_| "10".to_string())
                .parse::<u64>()
                .ok()
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs)
                .ok_or_else(|| anyhow::anyhow!("SOURCE_TIMEOUT_SECS must be a positive integer"))?,
            cache_dir: std::env::var("CACHE_DIR")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("cache")),
        };

        // Log successful configuration load (without credentials)
        tracing::info!("Configuration loaded successfully");
        match config.database_url {
            Some(ref url) => tracing::debug!(
                "Database URL: {}...",
                url.chars().take(20).collect::<String>()
            ),
            None => tracing::warn!("DATABASE_URL not set, countries are kept in memory"),
        }
        tracing::debug!("Countries API URL: {}", config.countries_api_url);
        tracing::debug!("Exchange API URL: {}", config.exchange_api_url);
        tracing::debug!("Source timeout: {:?}", config.source_timeout);
        tracing::debug!("Cache dir: {}", config.cache_dir.display());
        tracing::debug!("Server Port: {}", config.port);

        Ok(config)
    }
}

impl Config {
    /// Connection string for callers that cannot fall back to the in-memory store.
    pub fn require_database_url(&self) -> anyhow::Result<&str> {
        self.database_url.as_deref().ok_or_else(|| {
            anyhow::anyhow!("DATABASE_URL (or DB_URL) must be set; an in-memory refresh would be discarded on exit")
        })
    }
}

/// Reads an optional source URL override, falling back to `default`.
fn source_url(var: &str, default: &str) -> anyhow::Result<String> {
    let raw = std::env::var(var)
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| default.to_string());
    validate_http_url(var, &raw)?;
    Ok(raw)
}

fn validate_http_url(var: &str, raw: &str) -> anyhow::Result<()> {
    let parsed =
        url::Url::parse(raw).map_err(|e| anyhow::anyhow!("{} is not a valid URL: {}", var, e))?;
    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        anyhow::bail!("{} must start with http:// or https://", var);
    }
    Ok(())
}
