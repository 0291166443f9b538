//! Value transformations for Terna responses
//!
//! Helpers that turn raw JSON records into table cells.
//!
//! # Transformations
//!
//! 1. **Record flattening**: `{"a": {"b": 1}}` → `a.b = 1`
//! 2. **Timestamp parsing**: `"2024-10-27 02:15:00"`, `"27/10/2024 02:15"`, ISO-8601 ...
//! 3. **Europe/Rome localisation** including the repeated autumn hour
//! 4. **Cell coercion**: JSON value → [`Cell`]
//! 5. **Numeric coercion**: a column of numeric strings becomes numbers
//!
//! # Example
//!
//! ```rust
//! use terna_transparency::transformations::*;
//! use chrono::Timelike;
//!
//! let ts = parse_date_value("2024-10-24 06:30:00").unwrap();
//! assert_eq!(ts.hour(), 6);
//! assert_eq!(ts.to_rfc3339(), "2024-10-24T06:30:00+02:00");
//! ```

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Timelike};
use chrono_tz::Europe::Rome;
use chrono_tz::Tz;
use serde_json::{Map, Value};

use crate::error::ParseError;
use crate::table::Cell;

/// Local wall-clock formats, tried in order
const NAIVE_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
];

const NAIVE_DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y"];

// ============================================================================
// Transformation 1: Record Flattening
// ============================================================================

/// Flatten a JSON record into dotted column names
///
/// Nested objects are walked recursively; arrays are kept whole.
///
/// # Examples
///
/// ```
/// # use terna_transparency::transformations::flatten_record;
/// # use serde_json::json;
/// let record = json!({"date": "2024-01-01", "load": {"value": 1.5, "unit": "MW"}});
/// let flat = flatten_record(record.as_object().unwrap());
/// let names: Vec<&str> = flat.iter().map(|(k, _)| k.as_str()).collect();
/// assert_eq!(names, vec!["date", "load.value", "load.unit"]);
/// ```
pub fn flatten_record(record: &Map<String, Value>) -> Vec<(String, Value)> {
    let mut out = Vec::with_capacity(record.len());
    flatten_into(None, record, &mut out);
    out
}

fn flatten_into(prefix: Option<&str>, record: &Map<String, Value>, out: &mut Vec<(String, Value)>) {
    for (key, value) in record {
        let name = match prefix {
            Some(prefix) => format!("{}.{}", prefix, key),
            None => key.clone(),
        };
        match value {
            Value::Object(inner) if !inner.is_empty() => flatten_into(Some(&name), inner, out),
            other => out.push((name, other.clone())),
        }
    }
}

// ============================================================================
// Transformation 2: Timestamp Parsing
// ============================================================================

/// Parse a wall-clock timestamp without offset
///
/// Plain dates mean midnight.
///
/// # Examples
///
/// ```
/// # use terna_transparency::transformations::parse_api_timestamp;
/// let a = parse_api_timestamp("2024-10-24T06:30:00").unwrap();
/// let b = parse_api_timestamp("24/10/2024 06:30").unwrap();
/// assert_eq!(a, b);
/// assert_eq!(
///     parse_api_timestamp("2024-10-24").unwrap().to_string(),
///     "2024-10-24 00:00:00"
/// );
/// assert!(parse_api_timestamp("yesterday").is_err());
/// ```
pub fn parse_api_timestamp(value: &str) -> Result<NaiveDateTime, ParseError> {
    let trimmed = value.trim();

    NAIVE_DATETIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(trimmed, format).ok())
        .or_else(|| {
            NAIVE_DATE_FORMATS
                .iter()
                .find_map(|format| NaiveDate::parse_from_str(trimmed, format).ok())
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
        .ok_or_else(|| ParseError::InvalidTimestamp(value.to_string()))
}

/// Parse a `Date` value into a Europe/Rome timestamp
///
/// Values carrying an offset (`Z`, `+01:00`) are converted directly;
/// wall-clock values go through [`localize_rome`].
pub fn parse_date_value(value: &str) -> Result<DateTime<Tz>, ParseError> {
    let trimmed = value.trim();

    if let Ok(with_offset) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(with_offset.with_timezone(&Rome));
    }

    localize_rome(parse_api_timestamp(trimmed)?)
}

// ============================================================================
// Transformation 3: Europe/Rome Localisation
// ============================================================================

/// Attach the Europe/Rome zone to a wall-clock timestamp
///
/// Quarter-hour values (minute divisible by 15) take the daylight-saving
/// reading when the local time is ambiguous. Values off the quarter-hour
/// grid encode the repeated hour of the autumn change-over: with
/// `delta = minute % 15` they are moved back by `delta + 15 * (4 - delta)`
/// minutes and take the standard-time reading.
///
/// # Examples
///
/// ```
/// # use terna_transparency::transformations::{localize_rome, parse_api_timestamp};
/// // 27 Oct 2024: 02:00-02:59 happens twice
/// let first = localize_rome(parse_api_timestamp("2024-10-27 02:00:00").unwrap()).unwrap();
/// assert_eq!(first.to_rfc3339(), "2024-10-27T02:00:00+02:00");
///
/// let repeated = localize_rome(parse_api_timestamp("2024-10-27 02:46:00").unwrap()).unwrap();
/// assert_eq!(repeated.to_rfc3339(), "2024-10-27T02:00:00+01:00");
/// ```
pub fn localize_rome(naive: NaiveDateTime) -> Result<DateTime<Tz>, ParseError> {
    let delta = i64::from(naive.minute() % 15);

    let localized = if delta == 0 {
        naive.and_local_timezone(Rome).earliest()
    } else {
        let shifted = naive - Duration::minutes(delta + 15 * (4 - delta));
        shifted.and_local_timezone(Rome).latest()
    };

    localized.ok_or_else(|| {
        ParseError::InvalidTimestamp(format!(
            "{} does not exist in Europe/Rome",
            naive.format("%Y-%m-%d %H:%M:%S")
        ))
    })
}

// ============================================================================
// Transformation 4: Cell Coercion
// ============================================================================

/// Convert a flattened JSON value to a cell
///
/// # Examples
///
/// ```
/// # use terna_transparency::transformations::coerce_cell;
/// # use terna_transparency::Cell;
/// # use serde_json::json;
/// assert_eq!(coerce_cell(&json!(12.5)), Cell::Number(12.5));
/// assert_eq!(coerce_cell(&json!(null)), Cell::Null);
/// assert_eq!(coerce_cell(&json!("North")), Cell::Text("North".to_string()));
/// assert_eq!(coerce_cell(&json!([1, 2])), Cell::Text("[1,2]".to_string()));
/// ```
pub fn coerce_cell(value: &Value) -> Cell {
    match value {
        Value::Null => Cell::Null,
        Value::Bool(flag) => Cell::Bool(*flag),
        Value::Number(number) => number.as_f64().map_or(Cell::Null, Cell::Number),
        Value::String(text) => Cell::Text(text.clone()),
        Value::Array(_) | Value::Object(_) => Cell::Text(value.to_string()),
    }
}

// ============================================================================
// Transformation 5: Numeric Coercion
// ============================================================================

fn parse_number(text: &str) -> Option<f64> {
    text.trim().parse::<f64>().ok()
}

/// Turn a column into numbers when every value allows it
///
/// Numbers, nulls, blank strings and numeric strings qualify; any other
/// value leaves the column untouched. Returns whether the column changed.
///
/// # Examples
///
/// ```
/// # use terna_transparency::transformations::coerce_numeric_column;
/// # use terna_transparency::Cell;
/// let mut cells = vec![Cell::Text("1.5".into()), Cell::Number(2.0), Cell::Text(" ".into())];
/// assert!(coerce_numeric_column(&mut cells));
/// assert_eq!(cells, vec![Cell::Number(1.5), Cell::Number(2.0), Cell::Null]);
///
/// let mut mixed = vec![Cell::Text("1.5".into()), Cell::Text("North".into())];
/// assert!(!coerce_numeric_column(&mut mixed));
/// assert_eq!(mixed[0], Cell::Text("1.5".into()));
/// ```
pub fn coerce_numeric_column(cells: &mut [Cell]) -> bool {
    let convertible = cells.iter().all(|cell| match cell {
        Cell::Null | Cell::Number(_) => true,
        Cell::Text(text) => text.trim().is_empty() || parse_number(text).is_some(),
        Cell::Bool(_) => false,
    });

    let has_text = cells.iter().any(|cell| matches!(cell, Cell::Text(_)));
    if !convertible || !has_text {
        return false;
    }

    for cell in cells.iter_mut() {
        if let Cell::Text(text) = cell {
            *cell = parse_number(text).map_or(Cell::Null, Cell::Number);
        }
    }

    true
}

/// Read a `Year` value as an integer
pub fn parse_year(cell: &Cell) -> Result<i32, ParseError> {
    let invalid = || ParseError::InvalidYear(cell.to_string());
    match cell {
        Cell::Number(value) if value.fract() == 0.0 => {
            let rounded = value.round();
            if rounded >= f64::from(i32::MIN) && rounded <= f64::from(i32::MAX) {
                Ok(rounded as i32)
            } else {
                Err(invalid())
            }
        }
        Cell::Text(text) => text.trim().parse::<i32>().map_err(|_| invalid()),
        _ => Err(invalid()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_flatten_nested_record() {
        let record = json!({
            "Date": "2024-01-01 00:00:00",
            "zone": {"name": "North", "meta": {"code": "NORD"}},
            "values": [1, 2],
            "empty": {}
        });

        let flat = flatten_record(record.as_object().unwrap());

        assert_eq!(
            flat,
            vec![
                ("Date".to_string(), json!("2024-01-01 00:00:00")),
                ("zone.name".to_string(), json!("North")),
                ("zone.meta.code".to_string(), json!("NORD")),
                ("values".to_string(), json!([1, 2])),
                ("empty".to_string(), json!({})),
            ]
        );
    }

    #[test]
    fn test_parse_api_timestamp_formats() {
        let expected = NaiveDate::from_ymd_opt(2024, 3, 5)
            .unwrap()
            .and_hms_opt(13, 45, 0)
            .unwrap();

        for input in [
            "2024-03-05T13:45:00",
            "2024-03-05T13:45:00.000",
            "2024-03-05T13:45",
            "2024-03-05 13:45:00",
            "2024-03-05 13:45",
            "05/03/2024 13:45:00",
            "05/03/2024 13:45",
            "  2024-03-05 13:45:00  ",
        ] {
            assert_eq!(parse_api_timestamp(input).unwrap(), expected, "{}", input);
        }
    }

    #[test]
    fn test_parse_api_timestamp_invalid() {
        assert!(parse_api_timestamp("").is_err());
        assert!(parse_api_timestamp("31/02/2024 10:00").is_err());
        assert!(parse_api_timestamp("2024-13-01").is_err());
    }

    #[test]
    fn test_parse_date_value_with_offset() {
        let ts = parse_date_value("2024-01-15T10:00:00Z").unwrap();
        assert_eq!(ts.to_rfc3339(), "2024-01-15T11:00:00+01:00");
    }

    #[test]
    fn test_localize_winter_and_summer() {
        let winter = localize_rome(parse_api_timestamp("2024-01-15 10:00").unwrap()).unwrap();
        assert_eq!(winter.to_rfc3339(), "2024-01-15T10:00:00+01:00");

        let summer = localize_rome(parse_api_timestamp("2024-07-15 10:15").unwrap()).unwrap();
        assert_eq!(summer.to_rfc3339(), "2024-07-15T10:15:00+02:00");
    }

    #[test]
    fn test_localize_repeated_hour_sequence() {
        // Second pass through 02:xx on the autumn change-over day
        let inputs = ["2024-10-27 03:01", "2024-10-27 03:16", "2024-10-27 03:31"];
        let outputs: Vec<String> = inputs
            .iter()
            .map(|s| {
                localize_rome(parse_api_timestamp(s).unwrap())
                    .unwrap()
                    .to_rfc3339()
            })
            .collect();

        assert_eq!(
            outputs,
            vec![
                "2024-10-27T02:15:00+01:00",
                "2024-10-27T02:30:00+01:00",
                "2024-10-27T02:45:00+01:00",
            ]
        );
    }

    #[test]
    fn test_localize_nonexistent_time() {
        // 31 Mar 2024: clocks jump from 02:00 to 03:00
        let result = localize_rome(parse_api_timestamp("2024-03-31 02:30").unwrap());
        assert!(matches!(result, Err(ParseError::InvalidTimestamp(_))));
    }

    #[test]
    fn test_coerce_numeric_column_all_null_unchanged() {
        let mut cells = vec![Cell::Null, Cell::Null];
        assert!(!coerce_numeric_column(&mut cells));
    }

    #[test]
    fn test_coerce_numeric_column_rejects_bools() {
        let mut cells = vec![Cell::Bool(true), Cell::Text("1".into())];
        assert!(!coerce_numeric_column(&mut cells));
        assert_eq!(cells[1], Cell::Text("1".into()));
    }

    #[test]
    fn test_coerce_numeric_negative_and_exponent() {
        let mut cells = vec![Cell::Text("-12.5".into()), Cell::Text("1e3".into())];
        assert!(coerce_numeric_column(&mut cells));
        assert_eq!(cells, vec![Cell::Number(-12.5), Cell::Number(1000.0)]);
    }

    #[test]
    fn test_parse_year() {
        assert_eq!(parse_year(&Cell::Number(2023.0)).unwrap(), 2023);
        assert_eq!(parse_year(&Cell::Text(" 2022 ".into())).unwrap(), 2022);
        assert!(parse_year(&Cell::Number(2023.5)).is_err());
        assert!(parse_year(&Cell::Null).is_err());
        assert!(parse_year(&Cell::Text("last year".into())).is_err());
    }
}
