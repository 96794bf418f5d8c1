use chrono::NaiveDateTime;
use serde::Deserialize;
use utoipa::IntoParams;

use crate::{
    db::models::ReadingFilter,
    ingest::ValidationError,
    timestamp::{end_of_day, parse_date, parse_datetime, start_of_day},
};

/// Query string shared by the view and export endpoints.
///
/// Values are kept as text so that a bad value is reported with its field
/// name, and so that the empty fields an HTML form submits count as absent.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct FilterParams {
    /// Exact match on `source`.
    pub source: Option<String>,
    /// A single day, `YYYY-MM-DD`. Cannot be combined with `from_date`/`to_date`.
    pub date: Option<String>,
    /// Inclusive lower bound: a date (start of day) or an ISO-8601 date-time.
    pub from_date: Option<String>,
    /// Inclusive upper bound: a date (end of day) or an ISO-8601 date-time.
    pub to_date: Option<String>,
    /// Maximum number of rows to show. Ignored by the export.
    pub limit: Option<String>,
}

impl FilterParams {
    /// Build the row filter, rejecting values that do not parse.
    pub fn filter(&self) -> Result<ReadingFilter, ValidationError> {
        let source = present(&self.source).map(str::to_owned);
        let from_date = present(&self.from_date);
        let to_date = present(&self.to_date);

        if let Some(date) = present(&self.date) {
            if from_date.is_some() || to_date.is_some() {
                return Err(ValidationError::new(
                    "date",
                    "cannot be combined with from_date or to_date",
                ));
            }
            let day = parse_date(date).ok_or_else(|| {
                ValidationError::new("date", format!("cannot parse {date:?} as YYYY-MM-DD"))
            })?;
            return Ok(ReadingFilter {
                source,
                from: Some(start_of_day(day)),
                to: Some(end_of_day(day)),
            });
        }

        let from = from_date
            .map(|v| bound(v, "from_date", Bound::Lower))
            .transpose()?;
        let to = to_date
            .map(|v| bound(v, "to_date", Bound::Upper))
            .transpose()?;

        if let (Some(from), Some(to)) = (from, to) {
            if from > to {
                return Err(ValidationError::new(
                    "from_date",
                    format!("{from} is later than to_date {to}"),
                ));
            }
        }

        Ok(ReadingFilter { source, from, to })
    }

    /// The requested row count: `default` when absent, clamped to `max`.
    pub fn limit(&self, default: u32, max: u32) -> Result<u32, ValidationError> {
        let Some(raw) = present(&self.limit) else {
            return Ok(default.min(max));
        };
        match raw.parse::<u32>() {
            Ok(0) | Err(_) => Err(ValidationError::new(
                "limit",
                format!("expected a positive integer, got {raw:?}"),
            )),
            Ok(n) => Ok(n.min(max)),
        }
    }
}

#[derive(Clone, Copy)]
enum Bound {
    Lower,
    Upper,
}

/// A bare date widens to the whole day on the side it bounds.
fn bound(text: &str, field: &str, side: Bound) -> Result<NaiveDateTime, ValidationError> {
    if let Some(day) = parse_date(text) {
        return Ok(match side {
            Bound::Lower => start_of_day(day),
            Bound::Upper => end_of_day(day),
        });
    }
    parse_datetime(text).ok_or_else(|| {
        ValidationError::new(
            field,
            format!("cannot parse {text:?} as a date or ISO-8601 date-time"),
        )
    })
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> FilterParams {
        let mut p = FilterParams::default();
        for (key, value) in pairs {
            let value = Some(value.to_string());
            match *key {
                "source" => p.source = value,
                "date" => p.date = value,
                "from_date" => p.from_date = value,
                "to_date" => p.to_date = value,
                "limit" => p.limit = value,
                other => panic!("unknown param {other}"),
            }
        }
        p
    }

    fn ts(text: &str) -> NaiveDateTime {
        parse_datetime(text).unwrap()
    }

    #[test]
    fn empty_params_mean_no_filter() {
        let filter = params(&[("source", ""), ("date", " "), ("limit", "")])
            .filter()
            .unwrap();
        assert_eq!(filter, ReadingFilter::default());
    }

    #[test]
    fn single_day_covers_whole_day() {
        let filter = params(&[("date", "2024-06-01"), ("source", "kitchen")])
            .filter()
            .unwrap();
        assert_eq!(filter.source.as_deref(), Some("kitchen"));
        assert_eq!(filter.from, Some(ts("2024-06-01T00:00:00")));
        assert_eq!(filter.to, Some(ts("2024-06-01T23:59:59.999999")));
    }

    #[test]
    fn date_with_range_is_rejected() {
        let err = params(&[("date", "2024-06-01"), ("to_date", "2024-06-02")])
            .filter()
            .unwrap_err();
        assert_eq!(err.field, "date");
    }

    #[test]
    fn malformed_date_is_rejected() {
        let err = params(&[("date", "June 1st")]).filter().unwrap_err();
        assert_eq!(err.field, "date");
        assert!(err.message.contains("\"June 1st\""));
    }

    #[test]
    fn range_dates_widen_to_day_bounds() {
        let filter = params(&[("from_date", "2024-06-01"), ("to_date", "2024-06-03")])
            .filter()
            .unwrap();
        assert_eq!(filter.from, Some(ts("2024-06-01T00:00:00")));
        assert_eq!(filter.to, Some(ts("2024-06-03T23:59:59.999999")));
    }

    #[test]
    fn range_accepts_datetimes_with_offset() {
        let filter = params(&[("from_date", "2024-06-01T10:00:00+02:00")])
            .filter()
            .unwrap();
        assert_eq!(filter.from, Some(ts("2024-06-01T08:00:00")));
        assert_eq!(filter.to, None);
    }

    #[test]
    fn inverted_range_is_rejected() {
        let err = params(&[("from_date", "2024-06-03"), ("to_date", "2024-06-01")])
            .filter()
            .unwrap_err();
        assert_eq!(err.field, "from_date");
    }

    #[test]
    fn bound_past_year_9999_is_rejected() {
        let err = params(&[("from_date", "+12000-01-01T00:00:00")])
            .filter()
            .unwrap_err();
        assert_eq!(err.field, "from_date");
    }

    #[test]
    fn malformed_bound_is_rejected() {
        let err = params(&[("to_date", "soon")]).filter().unwrap_err();
        assert_eq!(err.field, "to_date");
    }

    #[test]
    fn limit_defaults_and_clamps() {
        assert_eq!(params(&[]).limit(100, 1000).unwrap(), 100);
        assert_eq!(params(&[("limit", "5")]).limit(100, 1000).unwrap(), 5);
        assert_eq!(params(&[("limit", "50000")]).limit(100, 1000).unwrap(), 1000);
    }

    #[test]
    fn bad_limit_is_rejected() {
        assert_eq!(params(&[("limit", "0")]).limit(100, 1000).unwrap_err().field, "limit");
        assert_eq!(params(&[("limit", "-3")]).limit(100, 1000).unwrap_err().field, "limit");
        assert_eq!(params(&[("limit", "ten")]).limit(100, 1000).unwrap_err().field, "limit");
    }
}
