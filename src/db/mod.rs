pub mod models;
pub mod readings;

use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

pub async fn create_pool(database_url: &str, max_connections: u32) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await
        .context("failed to connect to the database")?;
    Ok(pool)
}

/// Statements run by [`ensure_schema`], in order. Each one is a no-op when
/// the object already exists.
const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS sensor_data (
        id          SERIAL PRIMARY KEY,
        temperature DOUBLE PRECISION,
        humidity    DOUBLE PRECISION,
        "timestamp" TIMESTAMP NOT NULL,
        source      TEXT
    )
    "#,
    r#"CREATE INDEX IF NOT EXISTS ix_sensor_data_source ON sensor_data (source)"#,
    r#"CREATE INDEX IF NOT EXISTS ix_sensor_data_timestamp ON sensor_data ("timestamp")"#,
];

/// Create the `sensor_data` table and its indexes if they are missing.
///
/// Safe to call on every start; existing data is left untouched.
pub async fn ensure_schema(pool: &PgPool) -> Result<()> {
    for statement in SCHEMA {
        sqlx::query(statement)
            .execute(pool)
            .await
            .context("failed to create sensor_data schema")?;
    }
    Ok(())
}
