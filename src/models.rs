use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::collections::HashMap;
use std::str::FromStr;
use utoipa::{IntoParams, ToSchema};

// ============ Database Models ============

/// A country as mirrored from the directory source, enriched with a GDP estimate.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize, ToSchema)]
pub struct Country {
    /// Country name as given by the directory source. Unique key.
    pub name: String,
    /// Capital city.
    pub capital: Option<String>,
    /// Geographic region (e.g., "Africa", "Europe").
    pub region: Option<String>,
    /// Population as reported upstream.
    pub population: i64,
    /// Code of the first currency listed for the country.
    pub currency_code: Option<String>,
    /// Units of `currency_code` per one USD.
    pub exchange_rate: Option<f64>,
    /// Derived estimate in USD; `0` when the country has no currency.
    pub estimated_gdp: Option<f64>,
    /// Flag image URL.
    pub flag_url: Option<String>,
    /// Start time of the refresh run that last wrote this record.
    #[schema(value_type = String, format = DateTime)]
    pub last_refreshed_at: DateTime<Utc>,
}

// ============ Query Models ============

/// Ordering accepted by `GET /countries`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    GdpDesc,
    GdpAsc,
    Name,
}

impl FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "gdp_desc" => Ok(SortOrder::GdpDesc),
            "gdp_asc" => Ok(SortOrder::GdpAsc),
            "name" => Ok(SortOrder::Name),
            other => Err(format!(
                "Invalid sort '{}': expected one of gdp_desc, gdp_asc, name",
                other
            )),
        }
    }
}

/// Raw query parameters of `GET /countries`.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct CountryQueryParams {
    /// Exact region to match.
    pub region: Option<String>,
    /// Exact currency code to match.
    pub currency: Option<String>,
    /// One of `gdp_desc`, `gdp_asc`, `name`.
    pub sort: Option<String>,
}

/// Validated filter handed to the store.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CountryQuery {
    pub region: Option<String>,
    pub currency_code: Option<String>,
    pub sort: Option<SortOrder>,
}

impl TryFrom<CountryQueryParams> for CountryQuery {
    type Error = String;

    fn try_from(params: CountryQueryParams) -> Result<Self, Self::Error> {
        let sort = params
            .sort
            .as_deref()
            .filter(|s| !s.is_empty())
            .map(SortOrder::from_str)
            .transpose()?;

        Ok(Self {
            region: params.region.filter(|s| !s.is_empty()),
            currency_code: params.currency.filter(|s| !s.is_empty()),
            sort,
        })
    }
}

// ============ Response Models ============

/// Body of `GET /status`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct StatusResponse {
    pub total_countries: i64,
    #[schema(value_type = Option<String>, format = DateTime)]
    pub last_refreshed_at: Option<DateTime<Utc>>,
}

/// Body of a successful `POST /countries/refresh`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RefreshResponse {
    pub message: String,
}

/// Body of a failed `POST /countries/refresh`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SourceErrorResponse {
    pub error: String,
    pub details: String,
}

/// Generic `{ "error": ... }` body.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
}

// ============ Upstream Source Models ============

/// One entry of the restcountries v2 directory.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SourceCountry {
    pub name: String,
    #[serde(default)]
    pub capital: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub population: i64,
    #[serde(default)]
    pub flag: Option<String>,
    #[serde(default)]
    pub currencies: Vec<SourceCurrency>,
}

/// Currency entry attached to a [`SourceCountry`].
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SourceCurrency {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub symbol: Option<String>,
}

/// Payload of the open.er-api `latest/USD` endpoint.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExchangeRatesResponse {
    /// `"success"` or `"error"`; some mirrors omit it.
    #[serde(default)]
    pub result: Option<String>,
    #[serde(default)]
    pub base_code: Option<String>,
    #[serde(default)]
    pub rates: HashMap<String, f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sort_order_parses_known_values() {
        assert_eq!("gdp_desc".parse::<SortOrder>(), Ok(SortOrder::GdpDesc));
        assert_eq!("gdp_asc".parse::<SortOrder>(), Ok(SortOrder::GdpAsc));
        assert_eq!("name".parse::<SortOrder>(), Ok(SortOrder::Name));
        assert!("population".parse::<SortOrder>().is_err());
    }

    #[test]
    fn query_params_map_currency_to_currency_code() {
        let query = CountryQuery::try_from(CountryQueryParams {
            region: Some("Africa".to_string()),
            currency: Some("NGN".to_string()),
            sort: Some("gdp_desc".to_string()),
        })
        .unwrap();

        assert_eq!(query.region.as_deref(), Some("Africa"));
        assert_eq!(query.currency_code.as_deref(), Some("NGN"));
        assert_eq!(query.sort, Some(SortOrder::GdpDesc));
    }

    #[test]
    fn empty_query_params_mean_no_filter() {
        let query = CountryQuery::try_from(CountryQueryParams {
            region: Some(String::new()),
            currency: None,
            sort: Some(String::new()),
        })
        .unwrap();
        assert_eq!(query, CountryQuery::default());
    }

    #[test]
    fn source_country_tolerates_missing_fields() {
        let raw: SourceCountry = serde_json::from_value(serde_json::json!({
            "name": "Wakanda"
        }))
        .unwrap();
        assert_eq!(raw.population, 0);
        assert!(raw.currencies.is_empty());
        assert!(raw.capital.is_none());
    }

    #[test]
    fn exchange_rates_default_to_empty() {
        let raw: ExchangeRatesResponse = serde_json::from_str("{}").unwrap();
        assert!(raw.rates.is_empty());
        assert!(raw.result.is_none());
    }
}
