use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// One row of `sensor_data`.
///
/// `timestamp` carries no offset; every value written by this service has
/// been converted to UTC first.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct SensorReading {
    pub id: i32,
    /// Degrees Celsius
    pub temperature: Option<f64>,
    /// Relative humidity percentage
    pub humidity: Option<f64>,
    pub timestamp: NaiveDateTime,
    pub source: Option<String>,
}

/// A validated reading that has not been stored yet.
#[derive(Debug, Clone, PartialEq)]
pub struct NewReading {
    pub temperature: f64,
    pub humidity: Option<f64>,
    pub timestamp: NaiveDateTime,
    pub source: String,
}

/// Row selection shared by the HTML view, the JSON view and the CSV export.
///
/// Both bounds are inclusive; `None` leaves that side open.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReadingFilter {
    pub source: Option<String>,
    pub from: Option<NaiveDateTime>,
    pub to: Option<NaiveDateTime>,
}
