use futures::{Stream, TryStreamExt};
use sqlx::{
    postgres::PgArguments,
    query::QueryAs,
    PgPool, Postgres,
};

use super::models::{NewReading, ReadingFilter, SensorReading};

const SELECT_MATCHING: &str = r#"
    SELECT id, temperature, humidity, "timestamp", source
    FROM sensor_data
    WHERE ($1::text      IS NULL OR source = $1)
      AND ($2::timestamp IS NULL OR "timestamp" >= $2)
      AND ($3::timestamp IS NULL OR "timestamp" <= $3)
    ORDER BY "timestamp" DESC, id DESC
    LIMIT $4::bigint
"#;

/// `limit = None` binds `NULL`, which Postgres treats as `LIMIT ALL`.
fn select_matching(
    filter: &ReadingFilter,
    limit: Option<i64>,
) -> QueryAs<'_, Postgres, SensorReading, PgArguments> {
    sqlx::query_as::<_, SensorReading>(SELECT_MATCHING)
        .bind(filter.source.as_deref())
        .bind(filter.from)
        .bind(filter.to)
        .bind(limit)
}

/// Insert every reading inside one transaction and return how many rows
/// were written. Either all readings become visible or none do.
pub async fn insert_all(pool: &PgPool, readings: &[NewReading]) -> Result<u64, sqlx::Error> {
    let mut tx = pool.begin().await?;
    let mut stored = 0;

    for reading in readings {
        // An error here drops `tx`, which rolls the whole batch back.
        stored += sqlx::query(
            r#"
            INSERT INTO sensor_data (temperature, humidity, "timestamp", source)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(reading.temperature)
        .bind(reading.humidity)
        .bind(reading.timestamp)
        .bind(&reading.source)
        .execute(&mut *tx)
        .await?
        .rows_affected();
    }

    tx.commit().await?;
    Ok(stored)
}

/// The `limit` most recent readings matching `filter`, newest first.
pub async fn fetch_recent(
    pool: &PgPool,
    filter: &ReadingFilter,
    limit: u32,
) -> Result<Vec<SensorReading>, sqlx::Error> {
    select_matching(filter, Some(i64::from(limit)))
        .fetch_all(pool)
        .await
}

/// Every reading matching `filter`, newest first, pulled from a database
/// cursor as the stream is polled.
///
/// The stream owns its pool handle, so the connection it checks out is
/// returned when the stream finishes or is dropped.
pub fn stream_matching(
    pool: PgPool,
    filter: ReadingFilter,
) -> impl Stream<Item = Result<SensorReading, sqlx::Error>> + Send + 'static {
    async_stream::try_stream! {
        let mut rows = select_matching(&filter, None).fetch(&pool);
        while let Some(row) = rows.try_next().await? {
            yield row;
        }
    }
}
