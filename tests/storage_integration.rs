use std::env;

use chrono::{Duration, Utc};
use country_currency_api::db::Database;
use country_currency_api::db_storage::PgCountryStore;
use country_currency_api::models::{Country, CountryQuery, SortOrder};
use country_currency_api::store::{CountryStore, StoreError};

/// Integration smoke test for the Postgres country store.
/// Marked ignored so it never runs against a real database by accident; set TEST_DATABASE_URL to run.
#[tokio::test]
#[ignore]
async fn pg_country_store_smoke_test() -> anyhow::Result<()> {
    let db_url = env::var("TEST_DATABASE_URL")
        .map_err(|_| anyhow::anyhow!("Set TEST_DATABASE_URL to run this test"))?;

    let db = Database::new(&db_url).await?;
    let store = PgCountryStore::new(db.pool.clone());

    // Unique region so repeated runs and other rows do not interfere.
    let region = format!("smoke-{}", Utc::now().timestamp_nanos_opt().unwrap_or_default());
    let refreshed_at = Utc::now();
    let country = |name: &str, gdp: Option<f64>| Country {
        name: format!("{}-{}", region, name),
        capital: None,
        region: Some(region.clone()),
        population: 10,
        currency_code: Some("SMK".to_string()),
        exchange_rate: gdp.map(|_| 2.0),
        estimated_gdp: gdp,
        flag_url: None,
        last_refreshed_at: refreshed_at,
    };

    store
        .upsert_many(&[country("a", Some(5.0)), country("b", None), country("c", Some(50.0))])
        .await?;

    // Full overwrite on conflict.
    let mut updated = country("a", Some(500.0));
    updated.last_refreshed_at = refreshed_at + Duration::seconds(1);
    store.upsert_many(&[updated.clone()]).await?;

    let fetched = store.get(&updated.name).await?.expect("upserted country");
    assert_eq!(fetched.estimated_gdp, Some(500.0));

    let listed = store
        .list(&CountryQuery {
            region: Some(region.clone()),
            sort: Some(SortOrder::GdpDesc),
            ..Default::default()
        })
        .await?;
    let names: Vec<String> = listed.into_iter().map(|c| c.name).collect();
    assert_eq!(
        names,
        vec![
            format!("{}-a", region),
            format!("{}-c", region),
            format!("{}-b", region)
        ]
    );

    assert!(store.count().await? >= 3);
    assert!(store.last_refreshed_at().await?.is_some());
    assert!(!store.top_by_gdp(5).await?.is_empty());

    for name in ["a", "b", "c"] {
        store.delete(&format!("{}-{}", region, name)).await?;
    }
    assert!(matches!(
        store.delete(&format!("{}-a", region)).await,
        Err(StoreError::NotFound(_))
    ));

    Ok(())
}
