//! Runs a single country refresh without starting the HTTP server.

use country_currency_api::config::Config;
use country_currency_api::handlers::AppState;

/// Loads the same configuration as the server, refreshes once and exits.
///
/// Exits non-zero when no database is configured, either source is unavailable
/// or the store fails.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let config = Config::from_env()?;
    config.require_database_url()?;
    let state = AppState::from_config(&config).await?;

    let report = state.pipeline.refresh().await.map_err(|e| {
        tracing::error!(
            "Refresh failed (source: {}): {}",
            e.failing_source(),
            e
        );
        anyhow::anyhow!(e)
    })?;

    tracing::info!(
        "Refresh complete. Wrote {} countries at {}. Summary image: {}",
        report.countries_written,
        report.refreshed_at,
        state.pipeline.renderer().image_path().display()
    );

    Ok(())
}
