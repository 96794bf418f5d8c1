use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SensorReadingDto {
    pub id: i32,
    /// Degrees Celsius
    pub temperature: Option<f64>,
    /// Relative humidity percentage
    pub humidity: Option<f64>,
    /// UTC, without offset.
    pub timestamp: NaiveDateTime,
    pub source: Option<String>,
}

impl From<crate::db::models::SensorReading> for SensorReadingDto {
    fn from(r: crate::db::models::SensorReading) -> Self {
        Self {
            id: r.id,
            temperature: r.temperature,
            humidity: r.humidity,
            timestamp: r.timestamp,
            source: r.source,
        }
    }
}

/// Response for `POST /log`.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct LogResponse {
    /// Always `"success"`.
    pub status: String,
    /// Number of rows written.
    pub stored: u64,
}

impl LogResponse {
    pub fn success(stored: u64) -> Self {
        Self {
            status: "success".to_owned(),
            stored,
        }
    }
}

/// Body of every `4xx`/`5xx` JSON response.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
}
