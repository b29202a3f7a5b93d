use crate::config::Config;
use crate::db::Database;
use crate::db_storage::PgCountryStore;
use crate::errors::AppError;
use crate::models::*;
use crate::refresh::RefreshPipeline;
use crate::sources::{build_http_client, DataSourceClient};
use crate::store::{CountryStore, MemoryCountryStore};
use crate::summary::SummaryRenderer;
use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::sync::Arc;

/// Shared application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    /// Country persistence (Postgres or in-memory).
    pub store: Arc<dyn CountryStore>,
    /// Refresh pipeline; also owns the summary image location.
    pub pipeline: Arc<RefreshPipeline>,
}

impl AppState {
    /// Builds the process-wide store, HTTP client and pipeline from `config`,
    /// and makes sure the cache directory exists.
    pub async fn from_config(config: &Config) -> anyhow::Result<Self> {
        let store: Arc<dyn CountryStore> = match config.database_url {
            Some(ref url) => {
                let db = Database::new(url).await?;
                tracing::info!("Database connection pool established");
                Arc::new(PgCountryStore::new(db.pool))
            }
            None => {
                tracing::warn!("Using in-memory country store; data is lost on restart");
                Arc::new(MemoryCountryStore::new())
            }
        };

        let http = build_http_client(config.source_timeout)?;
        let sources = DataSourceClient::from_config(http, config);

        let renderer = SummaryRenderer::new(config.cache_dir.clone());
        renderer.ensure_cache_dir().await?;
        tracing::info!("Cache directory ready: {}", renderer.cache_dir().display());

        let pipeline = Arc::new(RefreshPipeline::new(sources, store.clone(), renderer));
        Ok(Self { store, pipeline })
    }
}

/// Health check endpoint.
///
/// Does not touch the store or the external sources.
///
/// # Returns
///
/// * `(StatusCode, Json<serde_json::Value>)` - HTTP 200 OK with service name and version.
pub async fn health() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": "country-currency-api",
            "version": env!("CARGO_PKG_VERSION")
        })),
    )
}

/// POST /countries/refresh
///
/// Pulls both external sources, rewrites every country and re-renders the
/// summary image.
///
/// # Arguments
///
/// * `state` - The application state; its pipeline performs the run.
///
/// # Returns
///
/// * `Result<Json<RefreshResponse>, AppError>` - The success message, a 503 naming the
///   source that failed (`unknown` when the image could not be written), or a 500 when
///   the store failed.
#[utoipa::path(
    post,
    path = "/countries/refresh",
    tag = "countries",
    responses(
        (status = 200, description = "Countries refreshed", body = RefreshResponse),
        (status = 503, description = "External data source unavailable", body = SourceErrorResponse),
        (status = 500, description = "Store failure", body = ErrorResponse)
    )
)]
pub async fn refresh_countries(
    State(state): State<Arc<AppState>>,
) -> Result<Json<RefreshResponse>, AppError> {
    tracing::info!("POST /countries/refresh");

    let report = state.pipeline.refresh().await?;

    tracing::info!(
        "Refreshed {} countries (run started {})",
        report.countries_written,
        report.refreshed_at
    );
    Ok(Json(RefreshResponse {
        message: "Countries refreshed successfully".to_string(),
    }))
}

/// GET /countries
///
/// Lists countries, optionally filtered by `region` / `currency` and sorted.
///
/// # Arguments
///
/// * `state` - The application state.
/// * `params` - Raw query string values; empty values mean "no filter".
///
/// # Returns
///
/// * `Result<Json<Vec<Country>>, AppError>` - Matching countries, or 400 for an unknown `sort`.
#[utoipa::path(
    get,
    path = "/countries",
    tag = "countries",
    params(CountryQueryParams),
    responses(
        (status = 200, description = "Matching countries", body = [Country]),
        (status = 400, description = "Unknown sort order", body = ErrorResponse),
        (status = 500, description = "Store failure", body = ErrorResponse)
    )
)]
pub async fn list_countries(
    State(state): State<Arc<AppState>>,
    Query(params): Query<CountryQueryParams>,
) -> Result<Json<Vec<Country>>, AppError> {
    tracing::info!("GET /countries - params: {:?}", params);

    let query = CountryQuery::try_from(params).map_err(AppError::BadRequest)?;
    let countries = state.store.list(&query).await?;

    tracing::debug!("Returning {} countries", countries.len());
    Ok(Json(countries))
}

/// GET /countries/image
///
/// Serves the summary PNG written by the last successful refresh.
#[utoipa::path(
    get,
    path = "/countries/image",
    tag = "countries",
    responses(
        (status = 200, description = "Summary image (image/png)"),
        (status = 404, description = "No refresh has rendered an image yet", body = ErrorResponse)
    )
)]
pub async fn get_country_image(State(state): State<Arc<AppState>>) -> Result<Response, AppError> {
    let image = state
        .pipeline
        .renderer()
        .read_image()
        .await
        .map_err(|e| AppError::InternalError(format!("Failed to read summary image: {}", e)))?
        .ok_or_else(|| AppError::NotFound("Summary image not found".to_string()))?;

    Ok((StatusCode::OK, [(header::CONTENT_TYPE, "image/png")], image).into_response())
}

/// GET /countries/:name
///
/// Looks a country up by its exact, case-sensitive name.
///
/// # Returns
///
/// * `Result<Json<Country>, AppError>` - The stored record or 404.
#[utoipa::path(
    get,
    path = "/countries/{name}",
    tag = "countries",
    params(("name" = String, Path, description = "Exact, case-sensitive country name")),
    responses(
        (status = 200, description = "The country", body = Country),
        (status = 404, description = "Country not found", body = ErrorResponse)
    )
)]
pub async fn get_country(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<Country>, AppError> {
    tracing::info!("GET /countries/{}", name);

    let country = state
        .store
        .get(&name)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Country '{}' not found", name)))?;

    Ok(Json(country))
}

/// DELETE /countries/:name
///
/// Removes one country. The summary image is left as it is until the next refresh.
#[utoipa::path(
    delete,
    path = "/countries/{name}",
    tag = "countries",
    params(("name" = String, Path, description = "Exact, case-sensitive country name")),
    responses(
        (status = 204, description = "Country deleted"),
        (status = 404, description = "Country not found", body = ErrorResponse)
    )
)]
pub async fn delete_country(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<StatusCode, AppError> {
    tracing::info!("DELETE /countries/{}", name);

    state.store.delete(&name).await?;

    tracing::info!("Deleted country {}", name);
    Ok(StatusCode::NO_CONTENT)
}

/// GET /status
///
/// Total countries and the time of the latest refresh (`null` before the first).
#[utoipa::path(
    get,
    path = "/status",
    tag = "status",
    responses(
        (status = 200, description = "Store summary", body = StatusResponse),
        (status = 500, description = "Store failure", body = ErrorResponse)
    )
)]
pub async fn get_status(State(state): State<Arc<AppState>>) -> Result<Json<StatusResponse>, AppError> {
    let total_countries = state.store.count().await?;
    let last_refreshed_at = state.store.last_refreshed_at().await?;

    Ok(Json(StatusResponse {
        total_countries,
        last_refreshed_at,
    }))
}
