//! Clients for the two external data sources read by a refresh.
//!
//! Every failure carries the [`DataSource`] it came from, so callers never have
//! to guess the culprit from a URL.

use std::fmt;
use std::time::Duration;

use reqwest::Client;
use serde::de::DeserializeOwned;

use crate::config::Config;
use crate::models::{ExchangeRatesResponse, SourceCountry};

/// Logical origin of a refresh failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataSource {
    /// The countries directory (restcountries).
    Countries,
    /// The USD exchange-rate feed (open.er-api).
    ExchangeRates,
    /// Failure not attributable to either source.
    Unknown,
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataSource::Countries => write!(f, "restcountries.com"),
            DataSource::ExchangeRates => write!(f, "open.er-api.com"),
            DataSource::Unknown => write!(f, "unknown"),
        }
    }
}

/// A source read failed: network error, timeout, non-success status or bad payload.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{data_source} unavailable: {reason}")]
pub struct SourceError {
    pub data_source: DataSource,
    pub reason: String,
}

impl SourceError {
    fn new(data_source: DataSource, reason: impl Into<String>) -> Self {
        Self {
            data_source,
            reason: reason.into(),
        }
    }
}

/// Builds the process-wide outbound HTTP client. Every request it sends is
/// bounded by `timeout`.
pub fn build_http_client(timeout: Duration) -> reqwest::Result<Client> {
    Client::builder()
        .timeout(timeout)
        .user_agent(concat!("country-currency-api/", env!("CARGO_PKG_VERSION")))
        .build()
}

/// Reads the country directory and the exchange-rate table.
#[derive(Clone)]
pub struct DataSourceClient {
    client: Client,
    countries_url: String,
    exchange_url: String,
}

impl DataSourceClient {
    pub fn new(client: Client, countries_url: String, exchange_url: String) -> Self {
        Self {
            client,
            countries_url,
            exchange_url,
        }
    }

    pub fn from_config(client: Client, config: &Config) -> Self {
        Self::new(
            client,
            config.countries_api_url.clone(),
            config.exchange_api_url.clone(),
        )
    }

    /// Fetch every country from the directory, in feed order.
    pub async fn fetch_countries(&self) -> Result<Vec<SourceCountry>, SourceError> {
        let countries: Vec<SourceCountry> = self
            .fetch_json(DataSource::Countries, &self.countries_url)
            .await?;
        tracing::info!("Fetched {} countries from {}", countries.len(), DataSource::Countries);
        Ok(countries)
    }

    /// Fetch the USD-based exchange-rate table.
    pub async fn fetch_exchange_rates(&self) -> Result<ExchangeRatesResponse, SourceError> {
        let rates: ExchangeRatesResponse = self
            .fetch_json(DataSource::ExchangeRates, &self.exchange_url)
            .await?;

        if rates.result.as_deref() == Some("error") {
            return Err(SourceError::new(
                DataSource::ExchangeRates,
                "exchange-rate feed reported result=error",
            ));
        }

        tracing::info!(
            "Fetched {} exchange rates from {}",
            rates.rates.len(),
            DataSource::ExchangeRates
        );
        Ok(rates)
    }

    async fn fetch_json<T: DeserializeOwned>(
        &self,
        source: DataSource,
        url: &str,
    ) -> Result<T, SourceError> {
        tracing::debug!("GET {} ({})", url, source);

        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                tracing::warn!("{} timed out", source);
                SourceError::new(source, format!("request timed out: {}", e))
            } else {
                SourceError::new(source, format!("request failed: {}", e))
            }
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            tracing::error!("{} returned error {}: {}", source, status, error_text);
            return Err(SourceError::new(
                source,
                format!("returned status {}", status),
            ));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| SourceError::new(source, format!("failed to parse response: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_source_names_match_public_hosts() {
        assert_eq!(DataSource::Countries.to_string(), "restcountries.com");
        assert_eq!(DataSource::ExchangeRates.to_string(), "open.er-api.com");
        assert_eq!(DataSource::Unknown.to_string(), "unknown");
    }

    #[test]
    fn http_client_builds_with_timeout() {
        assert!(build_http_client(Duration::from_secs(10)).is_ok());
    }
}
