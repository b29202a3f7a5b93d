//! Country refresh pipeline
//!
//! One run:
//! 1. Fetch the country directory and the USD exchange rates (concurrently)
//! 2. Stamp the run time
//! 3. Derive currency, rate and GDP estimate per country
//! 4. Upsert every country by name
//! 5. Re-render the summary image
//!
//! Nothing is written unless both sources answered. Nothing is retried.

use std::collections::HashMap;
use std::ops::RangeInclusive;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rand::Rng;

use crate::models::{Country, SourceCountry};
use crate::sources::{DataSource, DataSourceClient, SourceError};
use crate::store::{CountryStore, StoreError};
use crate::summary::{RenderError, SummaryRenderer};

/// Range the per-country GDP multiplier is drawn from. The draw is repeated on
/// every run, so estimates change between refreshes of identical data.
pub const GDP_MULTIPLIER: RangeInclusive<u32> = 1000..=2000;

#[derive(Debug, thiserror::Error)]
pub enum RefreshError {
    #[error(transparent)]
    SourceUnavailable(#[from] SourceError),
    #[error("failed to store countries: {0}")]
    Store(#[from] StoreError),
    #[error(transparent)]
    Render(#[from] RenderError),
}

impl RefreshError {
    /// Source to blame in the client-facing message.
    pub fn failing_source(&self) -> DataSource {
        match self {
            RefreshError::SourceUnavailable(e) => e.data_source,
            RefreshError::Store(_) | RefreshError::Render(_) => DataSource::Unknown,
        }
    }
}

/// Outcome of a successful run.
#[derive(Debug, Clone)]
pub struct RefreshReport {
    pub countries_written: usize,
    pub refreshed_at: DateTime<Utc>,
}

/// Code of the first listed currency. A missing or empty code counts as no currency.
pub fn first_currency_code(country: &SourceCountry) -> Option<String> {
    country
        .currencies
        .first()
        .and_then(|c| c.code.clone())
        .filter(|code| !code.is_empty())
}

/// Rate for `code`, if the feed has one that can be divided by.
pub fn usable_rate(rates: &HashMap<String, f64>, code: &str) -> Option<f64> {
    rates
        .get(code)
        .copied()
        .filter(|rate| rate.is_finite() && *rate > 0.0)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.is_empty())
}

/// Turns one directory entry into the record stored for this run.
///
/// - no currency: GDP is `0`, rate absent
/// - currency without a usable rate: GDP and rate absent
/// - otherwise: `population * multiplier / rate`
pub fn build_country<R: Rng + ?Sized>(
    source: SourceCountry,
    rates: &HashMap<String, f64>,
    refreshed_at: DateTime<Utc>,
    rng: &mut R,
) -> Country {
    let currency_code = first_currency_code(&source);

    let (exchange_rate, estimated_gdp) = match currency_code.as_deref() {
        None => (None, Some(0.0)),
        Some(code) => match usable_rate(rates, code) {
            Some(rate) => {
                let multiplier = rng.gen_range(GDP_MULTIPLIER);
                let gdp = source.population as f64 * f64::from(multiplier) / rate;
                (Some(rate), Some(gdp))
            }
            None => (None, None),
        },
    };

    Country {
        name: source.name,
        capital: non_empty(source.capital),
        region: non_empty(source.region),
        population: source.population,
        currency_code,
        exchange_rate,
        estimated_gdp,
        flag_url: non_empty(source.flag),
        last_refreshed_at: refreshed_at,
    }
}

/// Fetch, transform, persist, render.
pub struct RefreshPipeline {
    sources: DataSourceClient,
    store: Arc<dyn CountryStore>,
    renderer: SummaryRenderer,
}

impl RefreshPipeline {
    pub fn new(
        sources: DataSourceClient,
        store: Arc<dyn CountryStore>,
        renderer: SummaryRenderer,
    ) -> Self {
        Self {
            sources,
            store,
            renderer,
        }
    }

    pub fn renderer(&self) -> &SummaryRenderer {
        &self.renderer
    }

    /// Runs one refresh. See the module docs for the steps.
    pub async fn refresh(&self) -> Result<RefreshReport, RefreshError> {
        tracing::info!("Starting country refresh");

        let (directory, rates) = tokio::try_join!(
            self.sources.fetch_countries(),
            self.sources.fetch_exchange_rates()
        )
        .map_err(|e| {
            tracing::error!("Refresh aborted before writing: {}", e);
            e
        })?;

        let refreshed_at = Utc::now();

        let countries: Vec<Country> = {
            let mut rng = rand::thread_rng();
            directory
                .into_iter()
                .map(|c| build_country(c, &rates.rates, refreshed_at, &mut rng))
                .collect()
        };

        let without_currency = countries
            .iter()
            .filter(|c| c.currency_code.is_none())
            .count();
        let without_rate = countries
            .iter()
            .filter(|c| c.currency_code.is_some() && c.exchange_rate.is_none())
            .count();
        tracing::debug!(
            "Prepared {} countries ({} without currency, {} without exchange rate)",
            countries.len(),
            without_currency,
            without_rate
        );

        self.store.upsert_many(&countries).await?;
        self.renderer.render(self.store.as_ref()).await?;

        tracing::info!(
            "Country refresh complete: {} countries at {}",
            countries.len(),
            refreshed_at
        );

        Ok(RefreshReport {
            countries_written: countries.len(),
            refreshed_at,
        })
    }
}
