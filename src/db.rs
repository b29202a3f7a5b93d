use sqlx::{postgres::PgPoolOptions, PgPool};

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS countries (
        name              TEXT PRIMARY KEY,
        capital           TEXT,
        region            TEXT,
        population        BIGINT NOT NULL,
        currency_code     TEXT,
        exchange_rate     DOUBLE PRECISION,
        estimated_gdp     DOUBLE PRECISION,
        flag_url          TEXT,
        last_refreshed_at TIMESTAMPTZ NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS countries_region_idx ON countries (region)",
    "CREATE INDEX IF NOT EXISTS countries_currency_code_idx ON countries (currency_code)",
];

pub struct Database {
    pub pool: PgPool,
}

impl Database {
    pub async fn new(database_url: &str) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await?;

        for statement in SCHEMA {
            sqlx::query(statement).execute(&pool).await?;
        }
        tracing::debug!("countries schema ensured");

        Ok(Self { pool })
    }
}
