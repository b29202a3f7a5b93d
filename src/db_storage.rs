use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder};

use crate::models::{Country, CountryQuery, SortOrder};
use crate::store::{CountryStore, StoreError};

const COUNTRY_COLUMNS: &str = "name, capital, region, population, currency_code, \
     exchange_rate, estimated_gdp, flag_url, last_refreshed_at";

/// Postgres-backed country storage.
pub struct PgCountryStore {
    pool: PgPool,
}

impl PgCountryStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CountryStore for PgCountryStore {
    /// Writes the whole batch in one transaction; every column is overwritten on conflict.
    async fn upsert_many(&self, countries: &[Country]) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        for country in countries {
            sqlx::query(
                r#"
                INSERT INTO countries (
                    name, capital, region, population, currency_code,
                    exchange_rate, estimated_gdp, flag_url, last_refreshed_at
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                ON CONFLICT (name) DO UPDATE
                SET capital = EXCLUDED.capital,
                    region = EXCLUDED.region,
                    population = EXCLUDED.population,
                    currency_code = EXCLUDED.currency_code,
                    exchange_rate = EXCLUDED.exchange_rate,
                    estimated_gdp = EXCLUDED.estimated_gdp,
                    flag_url = EXCLUDED.flag_url,
                    last_refreshed_at = EXCLUDED.last_refreshed_at
                "#,
            )
            .bind(&country.name)
            .bind(&country.capital)
            .bind(&country.region)
            .bind(country.population)
            .bind(&country.currency_code)
            .bind(country.exchange_rate)
            .bind(country.estimated_gdp)
            .bind(&country.flag_url)
            .bind(country.last_refreshed_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        tracing::debug!("Upserted {} countries", countries.len());
        Ok(())
    }

    async fn list(&self, query: &CountryQuery) -> Result<Vec<Country>, StoreError> {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {} FROM countries WHERE TRUE", COUNTRY_COLUMNS));

        if let Some(region) = &query.region {
            builder.push(" AND region = ").push_bind(region.clone());
        }
        if let Some(code) = &query.currency_code {
            builder.push(" AND currency_code = ").push_bind(code.clone());
        }

        match query.sort {
            Some(SortOrder::GdpDesc) => builder.push(" ORDER BY estimated_gdp DESC NULLS LAST"),
            Some(SortOrder::GdpAsc) => builder.push(" ORDER BY estimated_gdp ASC NULLS LAST"),
            Some(SortOrder::Name) => builder.push(" ORDER BY name ASC"),
            None => &mut builder,
        };

        let countries = builder
            .build_query_as::<Country>()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Database error listing countries with {:?}: {:?}", query, e);
                StoreError::Database(e)
            })?;

        Ok(countries)
    }

    async fn get(&self, name: &str) -> Result<Option<Country>, StoreError> {
        let country = sqlx::query_as::<_, Country>(&format!(
            "SELECT {} FROM countries WHERE name = $1",
            COUNTRY_COLUMNS
        ))
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        Ok(country)
    }

    async fn delete(&self, name: &str) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM countries WHERE name = $1")
            .bind(name)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(name.to_string()));
        }
        Ok(())
    }

    async fn count(&self) -> Result<i64, StoreError> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM countries")
            .fetch_one(&self.pool)
            .await?;
        Ok(total)
    }

    async fn last_refreshed_at(&self) -> Result<Option<DateTime<Utc>>, StoreError> {
        let last: Option<DateTime<Utc>> =
            sqlx::query_scalar("SELECT MAX(last_refreshed_at) FROM countries")
                .fetch_one(&self.pool)
                .await?;
        Ok(last)
    }

    async fn top_by_gdp(&self, limit: usize) -> Result<Vec<Country>, StoreError> {
        let countries = sqlx::query_as::<_, Country>(&format!(
            "SELECT {} FROM countries
             WHERE estimated_gdp IS NOT NULL
             ORDER BY estimated_gdp DESC
             LIMIT $1",
            COUNTRY_COLUMNS
        ))
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;

        Ok(countries)
    }
}
