//! Country persistence seam.
//!
//! [`CountryStore`] is what the refresh pipeline, the summary renderer and the
//! HTTP handlers talk to. Postgres lives in [`crate::db_storage`]; the
//! in-memory backend below serves local runs without a database and tests.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::models::{Country, CountryQuery, SortOrder};

/// Persistence failure.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No country with this exact name.
    #[error("country '{0}' not found")]
    NotFound(String),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

#[async_trait]
pub trait CountryStore: Send + Sync {
    /// Insert each record, or replace every field of the record with the same name.
    async fn upsert_many(&self, countries: &[Country]) -> Result<(), StoreError>;

    /// Filtered scan. Absent GDP values sort last for both GDP orderings.
    async fn list(&self, query: &CountryQuery) -> Result<Vec<Country>, StoreError>;

    async fn get(&self, name: &str) -> Result<Option<Country>, StoreError>;

    /// Fails with [`StoreError::NotFound`] when no record matches.
    async fn delete(&self, name: &str) -> Result<(), StoreError>;

    async fn count(&self) -> Result<i64, StoreError>;

    /// Latest `last_refreshed_at` over all records.
    async fn last_refreshed_at(&self) -> Result<Option<DateTime<Utc>>, StoreError>;

    /// Up to `limit` records with a GDP estimate, highest first.
    async fn top_by_gdp(&self, limit: usize) -> Result<Vec<Country>, StoreError>;
}

/// Orders GDP values with absent estimates after every present one.
pub(crate) fn cmp_gdp_nulls_last(a: Option<f64>, b: Option<f64>, descending: bool) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => {
            if descending {
                y.total_cmp(&x)
            } else {
                x.total_cmp(&y)
            }
        }
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Process-local store keyed by country name.
#[derive(Default)]
pub struct MemoryCountryStore {
    countries: RwLock<BTreeMap<String, Country>>,
}

impl MemoryCountryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CountryStore for MemoryCountryStore {
    async fn upsert_many(&self, countries: &[Country]) -> Result<(), StoreError> {
        let mut map = self.countries.write().await;
        for country in countries {
            map.insert(country.name.clone(), country.clone());
        }
        Ok(())
    }

    async fn list(&self, query: &CountryQuery) -> Result<Vec<Country>, StoreError> {
        let map = self.countries.read().await;
        let mut countries: Vec<Country> = map
            .values()
            .filter(|c| {
                query
                    .region
                    .as_ref()
                    .map_or(true, |r| c.region.as_ref() == Some(r))
            })
            .filter(|c| {
                query
                    .currency_code
                    .as_ref()
                    .map_or(true, |code| c.currency_code.as_ref() == Some(code))
            })
            .cloned()
            .collect();

        match query.sort {
            Some(SortOrder::GdpDesc) => countries
                .sort_by(|a, b| cmp_gdp_nulls_last(a.estimated_gdp, b.estimated_gdp, true)),
            Some(SortOrder::GdpAsc) => countries
                .sort_by(|a, b| cmp_gdp_nulls_last(a.estimated_gdp, b.estimated_gdp, false)),
            Some(SortOrder::Name) => countries.sort_by(|a, b| a.name.cmp(&b.name)),
            None => {}
        }

        Ok(countries)
    }

    async fn get(&self, name: &str) -> Result<Option<Country>, StoreError> {
        Ok(self.countries.read().await.get(name).cloned())
    }

    async fn delete(&self, name: &str) -> Result<(), StoreError> {
        match self.countries.write().await.remove(name) {
            Some(_) => Ok(()),
            None => Err(StoreError::NotFound(name.to_string())),
        }
    }

    async fn count(&self) -> Result<i64, StoreError> {
        Ok(self.countries.read().await.len() as i64)
    }

    async fn last_refreshed_at(&self) -> Result<Option<DateTime<Utc>>, StoreError> {
        Ok(self
            .countries
            .read()
            .await
            .values()
            .map(|c| c.last_refreshed_at)
            .max())
    }

    async fn top_by_gdp(&self, limit: usize) -> Result<Vec<Country>, StoreError> {
        let mut ranked: Vec<Country> = self
            .countries
            .read()
            .await
            .values()
            .filter(|c| c.estimated_gdp.is_some())
            .cloned()
            .collect();
        ranked.sort_by(|a, b| cmp_gdp_nulls_last(a.estimated_gdp, b.estimated_gdp, true));
        ranked.truncate(limit);
        Ok(ranked)
    }
}
