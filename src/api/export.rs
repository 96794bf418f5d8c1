use futures::{Stream, TryStreamExt};
use thiserror::Error;

use crate::db::models::SensorReading;

pub const CSV_HEADER: [&str; 5] = ["id", "temperature", "humidity", "timestamp", "source"];

/// Buffered CSV is handed to the response body once it grows past this.
const CHUNK_SIZE: usize = 8 * 1024;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("reading rows failed: {0}")]
    Storage(#[from] sqlx::Error),
    #[error("writing CSV failed: {0}")]
    Csv(#[from] csv::Error),
}

impl From<std::io::Error> for ExportError {
    fn from(e: std::io::Error) -> Self {
        Self::Csv(e.into())
    }
}

impl From<csv::IntoInnerError<csv::Writer<Vec<u8>>>> for ExportError {
    fn from(e: csv::IntoInnerError<csv::Writer<Vec<u8>>>) -> Self {
        e.into_error().into()
    }
}

fn chunk_writer() -> csv::Writer<Vec<u8>> {
    csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::with_capacity(CHUNK_SIZE))
}

/// Swap in an empty writer and return everything the old one buffered.
fn take_chunk(writer: &mut csv::Writer<Vec<u8>>) -> Result<Vec<u8>, ExportError> {
    let full = std::mem::replace(writer, chunk_writer());
    Ok(full.into_inner()?)
}

/// Encode `readings` as CSV: the header first, then one record per reading
/// in the order received. Rows are serialised through `SensorReading`'s
/// serde impl, so the timestamp is ISO-8601 and `None` is an empty field.
pub fn csv_stream<S>(readings: S) -> impl Stream<Item = Result<Vec<u8>, ExportError>> + Send
where
    S: Stream<Item = Result<SensorReading, sqlx::Error>> + Send,
{
    async_stream::try_stream! {
        let mut readings = Box::pin(readings);
        let mut writer = chunk_writer();
        writer.write_record(CSV_HEADER)?;

        while let Some(reading) = readings.try_next().await? {
            writer.serialize(&reading)?;
            writer.flush()?;
            if writer.get_ref().len() >= CHUNK_SIZE {
                yield take_chunk(&mut writer)?;
            }
        }

        let rest = take_chunk(&mut writer)?;
        if !rest.is_empty() {
            yield rest;
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use futures::stream;

    use super::*;

    fn reading(id: i32, temperature: Option<f64>, source: Option<&str>) -> SensorReading {
        SensorReading {
            id,
            temperature,
            humidity: Some(40.5),
            timestamp: NaiveDate::from_ymd_opt(2024, 1, 1)
                .unwrap()
                .and_hms_opt(12, 0, 0)
                .unwrap(),
            source: source.map(str::to_owned),
        }
    }

    async fn collect(readings: Vec<Result<SensorReading, sqlx::Error>>) -> Result<String, ExportError> {
        let chunks: Vec<Vec<u8>> = csv_stream(stream::iter(readings)).try_collect().await?;
        Ok(String::from_utf8(chunks.concat()).unwrap())
    }

    #[tokio::test]
    async fn empty_export_is_header_only() {
        let csv = collect(vec![]).await.unwrap();
        assert_eq!(csv, "id,temperature,humidity,timestamp,source\n");
    }

    #[tokio::test]
    async fn rows_follow_header() {
        let csv = collect(vec![
            Ok(reading(2, Some(21.5), Some("kitchen"))),
            Ok(reading(1, None, None)),
        ])
        .await
        .unwrap();

        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[1], "2,21.5,40.5,2024-01-01T12:00:00,kitchen");
        assert_eq!(lines[2], "1,,40.5,2024-01-01T12:00:00,");
    }

    #[tokio::test]
    async fn fields_are_quoted_when_needed() {
        let csv = collect(vec![Ok(reading(1, Some(1.5), Some("hall, \"north\"")))])
            .await
            .unwrap();
        assert!(csv.contains(r#""hall, ""north""""#), "{csv}");
    }

    #[tokio::test]
    async fn large_exports_are_chunked() {
        let rows: Vec<Result<SensorReading, sqlx::Error>> = (0..2_000)
            .map(|i| Ok(reading(i, Some(20.0), Some("bulk"))))
            .collect();
        let chunks: Vec<Vec<u8>> = csv_stream(stream::iter(rows)).try_collect().await.unwrap();
        assert!(chunks.len() > 1);
        let text = String::from_utf8(chunks.concat()).unwrap();
        assert_eq!(text.lines().count(), 2_001);
    }

    #[tokio::test]
    async fn chunks_end_on_record_boundaries() {
        let rows: Vec<Result<SensorReading, sqlx::Error>> = (0..1_000)
            .map(|i| Ok(reading(i, Some(20.0), Some("bulk"))))
            .collect();
        let chunks: Vec<Vec<u8>> = csv_stream(stream::iter(rows)).try_collect().await.unwrap();

        let (last, full) = chunks.split_last().unwrap();
        assert!(!last.is_empty());
        for chunk in full {
            assert!(chunk.len() >= CHUNK_SIZE);
            assert_eq!(chunk.last(), Some(&b'\n'));
        }
        let text = String::from_utf8(chunks.concat()).unwrap();
        assert!(text.starts_with("id,temperature,humidity,timestamp,source\n0,"));
        assert!(text.ends_with("2024-01-01T12:00:00,bulk\n"));
        assert_eq!(text.lines().count(), 1_001);
    }

    #[tokio::test]
    async fn storage_error_ends_the_stream() {
        let err = collect(vec![Ok(reading(1, Some(1.0), None)), Err(sqlx::Error::RowNotFound)])
            .await
            .unwrap_err();
        assert!(matches!(err, ExportError::Storage(_)));
    }
}
