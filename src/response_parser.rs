//! Response normalisation
//!
//! Every transparency endpoint answers with the same envelope:
//!
//! ```json
//! {
//!   "result": {"status": "OK", "message": "..."},
//!   "total_load": [
//!     {"Date": "2024-10-01 00:00:00", "Bidding_Zone": "North", "Total_Load_MW": "1234.5"}
//!   ]
//! }
//! ```
//!
//! The data key differs per endpoint, so it is located by position: the
//! first key that is not `result`.

use std::collections::HashMap;

use serde_json::Value;
use tracing::debug;

use crate::error::ParseError;
use crate::table::{Cell, IndexKind, RowKey, Table};
use crate::transformations::{
    coerce_cell, coerce_numeric_column, flatten_record, parse_date_value, parse_year,
};

/// Status envelope key present on every successful response
pub const ENVELOPE_KEY: &str = "result";

/// Timestamp column used as index
pub const DATE_COLUMN: &str = "Date";

/// Index column for annual data
pub const YEAR_COLUMN: &str = "Year";

/// Parse a response body into a table
///
/// # Returns
///
/// * `Ok(None)` - body has no `result` envelope (no data for the request)
/// * `Ok(Some(table))` - parsed table, possibly empty
/// * `Err(ParseError)` - invalid JSON, unexpected shape or bad index values
///
/// # Examples
///
/// ```
/// # use terna_transparency::response_parser::parse_response;
/// let body = r#"{
///     "result": {"status": "OK"},
///     "total_load": [
///         {"date": "2024-10-01 00:15:00", "Total_Load_MW": "21500.2"},
///         {"date": "2024-10-01 00:00:00", "Total_Load_MW": "21934.0"}
///     ]
/// }"#;
///
/// let table = parse_response(body).unwrap().unwrap();
/// assert_eq!(table.columns(), &["Total_Load_MW"]);
/// assert_eq!(
///     table.numeric_column("Total_Load_MW").unwrap(),
///     vec![Some(21934.0), Some(21500.2)]
/// );
/// ```
pub fn parse_response(body: &str) -> Result<Option<Table>, ParseError> {
    let value: Value =
        serde_json::from_str(body).map_err(|e| ParseError::InvalidJson(e.to_string()))?;

    let object = value.as_object().ok_or_else(|| {
        ParseError::UnexpectedShape(format!("expected a JSON object, got {}", kind_of(&value)))
    })?;

    if !object.contains_key(ENVELOPE_KEY) {
        debug!("response has no '{}' envelope, skipping", ENVELOPE_KEY);
        return Ok(None);
    }

    let data = object
        .iter()
        .find(|(key, _)| key.as_str() != ENVELOPE_KEY);

    let records: &[Value] = match data {
        None => &[],
        Some((_, Value::Array(items))) => items,
        Some((key, other)) => {
            return Err(ParseError::UnexpectedShape(format!(
                "'{}' should be an array of records, got {}",
                key,
                kind_of(other)
            )))
        }
    };

    debug!(
        data_key = data.map(|(key, _)| key.as_str()).unwrap_or(""),
        records = records.len(),
        "parsing response"
    );

    let (columns, rows) = collect_records(records)?;
    Ok(Some(build_table(columns, rows)?))
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Flatten records into columns (first-seen order) and aligned rows
fn collect_records(records: &[Value]) -> Result<(Vec<String>, Vec<Vec<Cell>>), ParseError> {
    let mut columns: Vec<String> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();
    let mut rows: Vec<Vec<Cell>> = Vec::with_capacity(records.len());

    for (i, record) in records.iter().enumerate() {
        let object = record.as_object().ok_or_else(|| {
            ParseError::UnexpectedShape(format!(
                "record {} should be an object, got {}",
                i,
                kind_of(record)
            ))
        })?;

        let mut cells = vec![Cell::Null; columns.len()];
        for (name, value) in flatten_record(object) {
            let pos = match positions.get(&name) {
                Some(pos) => *pos,
                None => {
                    columns.push(name.clone());
                    positions.insert(name, columns.len() - 1);
                    columns.len() - 1
                }
            };
            if pos >= cells.len() {
                cells.resize(pos + 1, Cell::Null);
            }
            cells[pos] = coerce_cell(&value);
        }
        rows.push(cells);
    }

    for cells in &mut rows {
        cells.resize(columns.len(), Cell::Null);
    }

    if !columns.iter().any(|c| c == DATE_COLUMN) {
        if let Some(lower) = columns.iter_mut().find(|c| c.as_str() == "date") {
            *lower = DATE_COLUMN.to_string();
        }
    }

    Ok((columns, rows))
}

/// Pick the index, drop its column and coerce the rest
fn build_table(mut columns: Vec<String>, rows: Vec<Vec<Cell>>) -> Result<Table, ParseError> {
    let date_idx = columns.iter().position(|c| c == DATE_COLUMN);
    let year_idx = columns.iter().position(|c| c == YEAR_COLUMN);

    let (index, mut keyed): (IndexKind, Vec<(RowKey, Vec<Cell>)>) = match (date_idx, year_idx) {
        (Some(idx), _) => {
            columns.remove(idx);
            let keyed = rows
                .into_iter()
                .map(|mut cells| {
                    let raw = cells.remove(idx);
                    let ts = match &raw {
                        Cell::Text(text) => parse_date_value(text)?,
                        other => return Err(ParseError::InvalidTimestamp(other.to_string())),
                    };
                    Ok((RowKey::Timestamp(ts), cells))
                })
                .collect::<Result<Vec<_>, ParseError>>()?;
            (IndexKind::Timestamp, keyed)
        }
        (None, Some(idx)) => {
            columns.remove(idx);
            let keyed = rows
                .into_iter()
                .map(|mut cells| {
                    let year = parse_year(&cells.remove(idx))?;
                    Ok((RowKey::Year(year), cells))
                })
                .collect::<Result<Vec<_>, ParseError>>()?;
            (IndexKind::Year, keyed)
        }
        (None, None) => {
            let keyed = rows
                .into_iter()
                .enumerate()
                .map(|(pos, cells)| (RowKey::Position(pos), cells))
                .collect();
            (IndexKind::Position, keyed)
        }
    };

    if index == IndexKind::Timestamp {
        keyed.sort_by(|a, b| a.0.cmp(&b.0));
    }

    for col in 0..columns.len() {
        let mut cells: Vec<Cell> = keyed
            .iter_mut()
            .map(|(_, row)| std::mem::replace(&mut row[col], Cell::Null))
            .collect();
        coerce_numeric_column(&mut cells);
        for ((_, row), cell) in keyed.iter_mut().zip(cells) {
            row[col] = cell;
        }
    }

    let mut table = Table::new(index, columns);
    for (key, cells) in keyed {
        table.push_row(key, cells);
    }
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use chrono_tz::Europe::Rome;

    #[test]
    fn test_missing_envelope_is_no_data() {
        assert!(parse_response(r#"{"total_load": []}"#).unwrap().is_none());
    }

    #[test]
    fn test_envelope_only_is_empty_table() {
        let table = parse_response(r#"{"result": {"status": "OK"}}"#)
            .unwrap()
            .unwrap();
        assert!(table.is_empty());
        assert!(table.columns().is_empty());
    }

    #[test]
    fn test_empty_data_array() {
        let table = parse_response(r#"{"result": {}, "actual_generation": []}"#)
            .unwrap()
            .unwrap();
        assert!(table.is_empty());
    }

    #[test]
    fn test_data_key_after_envelope_regardless_of_position() {
        let body = r#"{
            "physical_foreign_flow": [{"Date": "2024-01-01 00:00:00", "Flow": "5"}],
            "result": {"status": "OK"}
        }"#;
        let table = parse_response(body).unwrap().unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.numeric_column("Flow").unwrap(), vec![Some(5.0)]);
    }

    #[test]
    fn test_invalid_json() {
        assert!(matches!(
            parse_response("<html>gateway timeout</html>"),
            Err(ParseError::InvalidJson(_))
        ));
    }

    #[test]
    fn test_non_object_body() {
        assert!(matches!(
            parse_response("[1, 2, 3]"),
            Err(ParseError::UnexpectedShape(_))
        ));
    }

    #[test]
    fn test_data_not_array() {
        let err = parse_response(r#"{"result": {}, "total_load": "none"}"#).unwrap_err();
        match err {
            ParseError::UnexpectedShape(msg) => assert!(msg.contains("total_load")),
            other => panic!("Expected UnexpectedShape, got {:?}", other),
        }
    }

    #[test]
    fn test_record_not_object() {
        assert!(matches!(
            parse_response(r#"{"result": {}, "total_load": [1]}"#),
            Err(ParseError::UnexpectedShape(_))
        ));
    }

    #[test]
    fn test_timestamp_index_sorted_and_localised() {
        let body = r#"{
            "result": {"status": "OK"},
            "total_load": [
                {"Date": "2024-10-27 03:00:00", "Bidding_Zone": "North", "Total_Load_MW": "3"},
                {"Date": "2024-10-27 02:00:00", "Bidding_Zone": "North", "Total_Load_MW": "1"},
                {"Date": "2024-10-27 02:46:00", "Bidding_Zone": "North", "Total_Load_MW": "2"}
            ]
        }"#;

        let table = parse_response(body).unwrap().unwrap();

        assert_eq!(table.index(), IndexKind::Timestamp);
        assert_eq!(table.columns(), &["Bidding_Zone", "Total_Load_MW"]);
        let keys: Vec<String> = table.keys().map(|k| k.to_string()).collect();
        assert_eq!(
            keys,
            vec![
                "2024-10-27T02:00:00+02:00",
                "2024-10-27T02:00:00+01:00",
                "2024-10-27T03:00:00+01:00",
            ]
        );
        assert_eq!(
            table.numeric_column("Total_Load_MW").unwrap(),
            vec![Some(1.0), Some(2.0), Some(3.0)]
        );
        assert_eq!(
            table.column("Bidding_Zone").unwrap()[0],
            &Cell::Text("North".to_string())
        );
    }

    #[test]
    fn test_lowercase_date_renamed() {
        let body = r#"{"result": {}, "market_load": [{"date": "2024-02-01T10:00:00", "MW": 1}]}"#;
        let table = parse_response(body).unwrap().unwrap();

        assert_eq!(table.columns(), &["MW"]);
        assert_eq!(
            table.rows()[0].key,
            RowKey::Timestamp(Rome.with_ymd_and_hms(2024, 2, 1, 10, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_lowercase_date_kept_when_date_present() {
        let body = r#"{
            "result": {},
            "market_load": [
                {"Date": "2024-02-01 10:00:00", "date": "published", "MW": "1"}
            ]
        }"#;
        let table = parse_response(body).unwrap().unwrap();

        assert_eq!(table.index(), IndexKind::Timestamp);
        assert_eq!(table.columns(), &["date", "MW"]);
        assert_eq!(
            table.column("date").unwrap(),
            vec![&Cell::Text("published".to_string())]
        );
        assert_eq!(
            table.rows()[0].key,
            RowKey::Timestamp(Rome.with_ymd_and_hms(2024, 2, 1, 10, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_date_index_wins_over_year() {
        let body = r#"{
            "result": {},
            "energy_balance": [
                {"Year": "2023", "Date": "2023-03-01 00:00:00", "GWh": "7"},
                {"Year": "2023", "Date": "2023-02-01 00:00:00", "GWh": "5"}
            ]
        }"#;
        let table = parse_response(body).unwrap().unwrap();

        assert_eq!(table.index(), IndexKind::Timestamp);
        assert_eq!(table.columns(), &["Year", "GWh"]);
        assert_eq!(
            table.numeric_column("Year").unwrap(),
            vec![Some(2023.0), Some(2023.0)]
        );
        assert_eq!(table.numeric_column("GWh").unwrap(), vec![Some(5.0), Some(7.0)]);
    }

    #[test]
    fn test_year_index() {
        let body = r#"{
            "result": {},
            "installed_capacity": [
                {"Year": "2022", "Type": "Wind", "Installed_Capacity_GW": "11.8"},
                {"Year": 2023, "Type": "Wind", "Installed_Capacity_GW": "12.3"}
            ]
        }"#;
        let table = parse_response(body).unwrap().unwrap();

        assert_eq!(table.index(), IndexKind::Year);
        assert_eq!(table.columns(), &["Type", "Installed_Capacity_GW"]);
        let keys: Vec<&RowKey> = table.keys().collect();
        assert_eq!(keys, vec![&RowKey::Year(2022), &RowKey::Year(2023)]);
    }

    #[test]
    fn test_position_index_without_date_or_year() {
        let body = r#"{"result": {}, "items": [{"Unit": "A", "MW": "1"}, {"Unit": "B"}]}"#;
        let table = parse_response(body).unwrap().unwrap();

        assert_eq!(table.index(), IndexKind::Position);
        assert_eq!(table.rows()[1].key, RowKey::Position(1));
        assert_eq!(table.numeric_column("MW").unwrap(), vec![Some(1.0), None]);
    }

    #[test]
    fn test_nested_records_flattened_and_missing_fields_null() {
        let body = r#"{
            "result": {},
            "offers": [
                {"Date": "2024-05-01 00:00:00", "unit": {"code": "UP_1", "mw": "10"}},
                {"Date": "2024-05-01 01:00:00", "extra": "x"}
            ]
        }"#;
        let table = parse_response(body).unwrap().unwrap();

        assert_eq!(table.columns(), &["unit.code", "unit.mw", "extra"]);
        assert_eq!(table.numeric_column("unit.mw").unwrap(), vec![Some(10.0), None]);
        assert_eq!(table.rows()[0].cells[2], Cell::Null);
        assert_eq!(table.rows()[1].cells[0], Cell::Null);
    }

    #[test]
    fn test_bad_date_is_error() {
        let body = r#"{"result": {}, "total_load": [{"Date": "not a date", "MW": 1}]}"#;
        assert!(matches!(
            parse_response(body),
            Err(ParseError::InvalidTimestamp(_))
        ));

        let body = r#"{"result": {}, "total_load": [{"Date": null, "MW": 1}]}"#;
        assert!(matches!(
            parse_response(body),
            Err(ParseError::InvalidTimestamp(_))
        ));
    }

    #[test]
    fn test_bad_year_is_error() {
        let body = r#"{"result": {}, "installed_capacity": [{"Year": "20x2"}]}"#;
        assert!(matches!(
            parse_response(body),
            Err(ParseError::InvalidYear(_))
        ));
    }
}
