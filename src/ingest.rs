//! Validation of incoming readings.
//!
//! `POST /log` accepts three body shapes:
//!
//! * a single reading object,
//! * an array of reading objects,
//! * a fixed batch: one `source` and `timestamp` shared by exactly
//!   [`BATCH_LEN`] `temperatures` and [`BATCH_LEN`] `humidities`.
//!
//! Everything here is pure; the caller supplies the current time and the
//! fallback source so the rules can be tested without a clock or a socket.

use chrono::NaiveDateTime;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use utoipa::ToSchema;

use crate::{db::models::NewReading, timestamp};

/// Number of values in each array of a fixed batch.
pub const BATCH_LEN: usize = 5;

/// A rejected input, reported to the caller as `400 Bad Request`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    /// Path of the offending field, e.g. `readings[2].timestamp`.
    pub field: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Values applied to fields the caller left out.
#[derive(Debug, Clone)]
pub struct Defaults {
    pub now: NaiveDateTime,
    pub source: String,
}

/// One reading as sent by a sensor.
///
/// Fields are kept as raw JSON so that validation can quote the offending
/// value back to the caller.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct ReadingPayload {
    /// Degrees Celsius. Required.
    #[serde(default)]
    #[schema(value_type = f64)]
    pub temperature: Option<Value>,
    /// Relative humidity percentage.
    #[serde(default)]
    #[schema(value_type = Option<f64>)]
    pub humidity: Option<Value>,
    /// ISO-8601 text (an offset is converted to UTC) or Unix seconds.
    /// Defaults to the time the request is handled.
    #[serde(default)]
    #[schema(value_type = Option<String>, example = "2024-06-01T08:00:00Z")]
    pub timestamp: Option<Value>,
    /// Free-text sensor identifier.
    #[serde(default)]
    #[schema(value_type = Option<String>, example = "kitchen")]
    pub source: Option<Value>,
}

/// Five readings taken at the same moment by the same source.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct FixedBatchPayload {
    #[serde(default)]
    #[schema(value_type = Option<String>)]
    pub source: Option<Value>,
    #[serde(default)]
    #[schema(value_type = Option<String>)]
    pub timestamp: Option<Value>,
    /// Exactly five values.
    #[serde(default)]
    #[schema(value_type = Vec<f64>)]
    pub temperatures: Option<Value>,
    /// Exactly five values.
    #[serde(default)]
    #[schema(value_type = Vec<f64>)]
    pub humidities: Option<Value>,
}

/// A request body after its shape has been recognised.
#[derive(Debug)]
pub enum Payload {
    Single(ReadingPayload),
    List(Vec<ReadingPayload>),
    FixedBatch(FixedBatchPayload),
}

impl Payload {
    /// Recognise which of the accepted shapes `body` has.
    pub fn from_json(body: Value) -> Result<Self, ValidationError> {
        match body {
            Value::Array(items) => items
                .into_iter()
                .enumerate()
                .map(|(i, item)| reading_object(item, &format!("readings[{i}]")))
                .collect::<Result<Vec<_>, _>>()
                .map(Self::List),
            Value::Object(ref map) if is_fixed_batch(map) => {
                serde_json::from_value(body)
                    .map(Self::FixedBatch)
                    .map_err(|e| ValidationError::new("body", e.to_string()))
            }
            Value::Object(_) => reading_object(body, "body").map(Self::Single),
            other => Err(ValidationError::new(
                "body",
                format!(
                    "expected a reading object, an array of readings or a fixed batch, got {}",
                    kind(&other)
                ),
            )),
        }
    }

    /// Validate every reading and fill in defaults. Fails on the first
    /// invalid reading; nothing is returned for a partially valid body.
    pub fn into_readings(self, defaults: &Defaults) -> Result<Vec<NewReading>, ValidationError> {
        match self {
            Self::Single(reading) => Ok(vec![validate_reading(reading, "", defaults)?]),
            Self::List(readings) => {
                if readings.is_empty() {
                    return Err(ValidationError::new(
                        "readings",
                        "at least one reading is required",
                    ));
                }
                readings
                    .into_iter()
                    .enumerate()
                    .map(|(i, r)| validate_reading(r, &format!("readings[{i}]."), defaults))
                    .collect()
            }
            Self::FixedBatch(batch) => validate_batch(batch, defaults),
        }
    }
}

/// A non-null `temperatures` or `humidities` marks the fixed-batch shape.
fn is_fixed_batch(map: &serde_json::Map<String, Value>) -> bool {
    ["temperatures", "humidities"]
        .iter()
        .any(|key| map.get(*key).is_some_and(|v| !v.is_null()))
}

fn reading_object(value: Value, field: &str) -> Result<ReadingPayload, ValidationError> {
    if !value.is_object() {
        return Err(ValidationError::new(
            field,
            format!("expected a reading object, got {}", kind(&value)),
        ));
    }
    serde_json::from_value(value).map_err(|e| ValidationError::new(field, e.to_string()))
}

fn validate_reading(
    reading: ReadingPayload,
    prefix: &str,
    defaults: &Defaults,
) -> Result<NewReading, ValidationError> {
    let temperature = match reading.temperature {
        None | Some(Value::Null) => {
            return Err(ValidationError::new(
                format!("{prefix}temperature"),
                "field is required",
            ))
        }
        Some(v) => number(&v, &format!("{prefix}temperature"))?,
    };
    let humidity = match reading.humidity {
        None | Some(Value::Null) => None,
        Some(v) => Some(number(&v, &format!("{prefix}humidity"))?),
    };

    Ok(NewReading {
        temperature,
        humidity,
        timestamp: resolve_timestamp(reading.timestamp, &format!("{prefix}timestamp"), defaults)?,
        source: resolve_source(reading.source, &format!("{prefix}source"), defaults)?,
    })
}

fn validate_batch(
    batch: FixedBatchPayload,
    defaults: &Defaults,
) -> Result<Vec<NewReading>, ValidationError> {
    let temperatures = fixed_array(batch.temperatures, "temperatures")?;
    let humidities = fixed_array(batch.humidities, "humidities")?;
    let timestamp = resolve_timestamp(batch.timestamp, "timestamp", defaults)?;
    let source = resolve_source(batch.source, "source", defaults)?;

    Ok(temperatures
        .into_iter()
        .zip(humidities)
        .map(|(temperature, humidity)| NewReading {
            temperature,
            humidity: Some(humidity),
            timestamp,
            source: source.clone(),
        })
        .collect())
}

fn fixed_array(value: Option<Value>, field: &str) -> Result<Vec<f64>, ValidationError> {
    let items = match value {
        None | Some(Value::Null) => {
            return Err(ValidationError::new(
                field,
                format!("field is required and must hold exactly {BATCH_LEN} numbers"),
            ))
        }
        Some(Value::Array(items)) => items,
        Some(other) => {
            return Err(ValidationError::new(
                field,
                format!("expected an array of {BATCH_LEN} numbers, got {other}"),
            ))
        }
    };
    if items.len() != BATCH_LEN {
        return Err(ValidationError::new(
            field,
            format!(
                "expected exactly {BATCH_LEN} values, got {}",
                items.len()
            ),
        ));
    }
    items
        .iter()
        .enumerate()
        .map(|(i, v)| number(v, &format!("{field}[{i}]")))
        .collect()
}

fn number(value: &Value, field: &str) -> Result<f64, ValidationError> {
    value
        .as_f64()
        .ok_or_else(|| ValidationError::new(field, format!("expected a number, got {value}")))
}

fn resolve_timestamp(
    value: Option<Value>,
    field: &str,
    defaults: &Defaults,
) -> Result<NaiveDateTime, ValidationError> {
    match value {
        None | Some(Value::Null) => Ok(defaults.now),
        Some(Value::String(text)) => timestamp::parse_datetime(&text).ok_or_else(|| {
            ValidationError::new(field, format!("cannot parse {text:?} as an ISO-8601 date-time"))
        }),
        Some(Value::Number(n)) => n
            .as_f64()
            .and_then(timestamp::from_epoch_seconds)
            .ok_or_else(|| {
                ValidationError::new(field, format!("{n} is out of range for Unix seconds"))
            }),
        Some(other) => Err(ValidationError::new(
            field,
            format!("expected ISO-8601 text or Unix seconds, got {other}"),
        )),
    }
}

fn resolve_source(
    value: Option<Value>,
    field: &str,
    defaults: &Defaults,
) -> Result<String, ValidationError> {
    match value {
        None | Some(Value::Null) => Ok(defaults.source.clone()),
        Some(Value::String(text)) => match text.trim() {
            "" => Ok(defaults.source.clone()),
            trimmed => Ok(trimmed.to_owned()),
        },
        Some(other) => Err(ValidationError::new(
            field,
            format!("expected a string, got {other}"),
        )),
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
