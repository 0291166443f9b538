//! Query router for the Terna client
//!
//! Turns an [`EndpointQuery`] into the concrete HTTP requests to send.
//!
//! # Routing Logic
//!
//! - Parameters are checked against the endpoint descriptor and enumerated
//!   values are rewritten to their canonical spelling.
//! - Date ranges longer than the maximum span are split into consecutive
//!   chunks, one request each.
//! - Dates go on the wire as `dateFrom`/`dateTo` in `dd/mm/YYYY`, both ends
//!   inclusive.
//!
//! # Example
//!
//! ```rust
//! use chrono::NaiveDate;
//! use terna_transparency::endpoints::Endpoint;
//! use terna_transparency::query_router::{route_query, EndpointQuery};
//!
//! let query = EndpointQuery::new(Endpoint::TotalLoad)
//!     .dates(
//!         NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
//!         NaiveDate::from_ymd_opt(2024, 3, 31).unwrap(),
//!     )
//!     .param("biddingZone", "north");
//!
//! let plans = route_query(&query, "https://api.terna.it/", 60).unwrap();
//! assert_eq!(plans.len(), 2); // 91 days split into 60 + 31
//! assert_eq!(plans[0].query[0], ("dateFrom".to_string(), "01/01/2024".to_string()));
//! assert_eq!(plans[0].query[2], ("biddingZone".to_string(), "North".to_string()));
//! ```

use chrono::{Duration, NaiveDate};

use crate::endpoints::Endpoint;
use crate::error::QueryError;

/// Wire format for `dateFrom` / `dateTo`
pub const API_DATE_FORMAT: &str = "%d/%m/%Y";

// ============================================================================
// Data Structures
// ============================================================================

/// Inclusive calendar date range
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    /// Create a range, rejecting `start > end`
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, QueryError> {
        let range = Self { start, end };
        range.validate()?;
        Ok(range)
    }

    /// Ensure `start <= end`
    pub fn validate(&self) -> Result<(), QueryError> {
        if self.start > self.end {
            return Err(QueryError::InvalidDateRange {
                start: self.start.to_string(),
                end: self.end.to_string(),
            });
        }
        Ok(())
    }

    /// Number of calendar days covered, both ends included
    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }
}

/// One request against one endpoint, before routing
#[derive(Debug, Clone, PartialEq)]
pub struct EndpointQuery {
    pub endpoint: Endpoint,
    pub range: Option<DateRange>,

    /// (name, value) pairs in insertion order; names may repeat
    pub params: Vec<(String, String)>,
}

impl EndpointQuery {
    pub fn new(endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            range: None,
            params: Vec::new(),
        }
    }

    /// Set the inclusive date range
    ///
    /// Ordering is checked by [`EndpointQuery::validate`].
    pub fn dates(mut self, start: NaiveDate, end: NaiveDate) -> Self {
        self.range = Some(DateRange { start, end });
        self
    }

    /// Add a query parameter; repeated names become repeated query keys
    pub fn param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((name.into(), value.into()));
        self
    }

    /// Add the parameter only when a value is present
    pub fn optional_param(self, name: &str, value: Option<&str>) -> Self {
        match value {
            Some(value) => self.param(name, value),
            None => self,
        }
    }

    /// Add one parameter per value
    pub fn multi_param<I, S>(self, name: &str, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        values
            .into_iter()
            .fold(self, |query, value| query.param(name, value))
    }

    /// Check the query against the endpoint descriptor
    ///
    /// Returns the parameters with enumerated values canonicalised.
    pub fn validate(&self) -> Result<Vec<(String, String)>, QueryError> {
        let endpoint = self.endpoint;

        match (&self.range, endpoint.requires_date_range()) {
            (None, true) => return Err(QueryError::MissingDateRange(endpoint.to_string())),
            (Some(_), false) => {
                return Err(QueryError::UnexpectedDateRange(endpoint.to_string()))
            }
            (Some(range), true) => range.validate()?,
            (None, false) => {}
        }

        self.params
            .iter()
            .map(|(name, value)| {
                let spec = endpoint
                    .param(name)
                    .ok_or_else(|| QueryError::UnknownParameter {
                        endpoint: endpoint.to_string(),
                        param: name.clone(),
                        allowed: allowed_names(endpoint),
                    })?;
                Ok((name.clone(), spec.canonicalize(value)?))
            })
            .collect()
    }
}

fn allowed_names(endpoint: Endpoint) -> String {
    let names: Vec<&str> = endpoint.params().iter().map(|spec| spec.name).collect();
    if names.is_empty() {
        "none".to_string()
    } else {
        names.join(", ")
    }
}

/// Query plan for a single API request
///
/// Represents one HTTP GET request to the Terna API.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryPlan {
    pub endpoint: Endpoint,

    /// Date chunk covered by this request (`None` for year/month endpoints)
    pub range: Option<DateRange>,

    /// Query string pairs, dates first
    pub query: Vec<(String, String)>,

    /// Full API URL without query string
    ///
    /// Example: `https://api.terna.it/load/v2.0/total-load`
    pub api_url: String,
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Join base URL and endpoint path with exactly one slash
///
/// # Examples
///
/// ```
/// # use terna_transparency::query_router::build_api_url;
/// assert_eq!(
///     build_api_url("https://api.terna.it/", "load/v2.0/total-load"),
///     "https://api.terna.it/load/v2.0/total-load"
/// );
/// assert_eq!(
///     build_api_url("http://localhost:8080", "/market/v1.0/output/prices"),
///     "http://localhost:8080/market/v1.0/output/prices"
/// );
/// ```
pub fn build_api_url(base_url: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// Parse a user-supplied date (YYYY-MM-DD or dd/mm/YYYY)
///
/// # Examples
///
/// ```
/// # use terna_transparency::query_router::parse_date;
/// # use chrono::NaiveDate;
/// let expected = NaiveDate::from_ymd_opt(2024, 10, 24).unwrap();
/// assert_eq!(parse_date("2024-10-24").unwrap(), expected);
/// assert_eq!(parse_date("24/10/2024").unwrap(), expected);
/// assert!(parse_date("10/24/2024").is_err());
/// ```
pub fn parse_date(value: &str) -> Result<NaiveDate, QueryError> {
    let trimmed = value.trim();
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(trimmed, API_DATE_FORMAT))
        .map_err(|_| QueryError::InvalidDate(value.to_string()))
}

/// Format a date the way `dateFrom`/`dateTo` expect it
pub fn format_api_date(date: NaiveDate) -> String {
    date.format(API_DATE_FORMAT).to_string()
}

/// Split a range into consecutive chunks of at most `max_days` days
///
/// Chunks neither overlap nor leave gaps; the last one ends on `range.end`.
///
/// # Examples
///
/// ```
/// # use terna_transparency::query_router::{chunk_date_range, DateRange};
/// # use chrono::NaiveDate;
/// let d = |m, day| NaiveDate::from_ymd_opt(2024, m, day).unwrap();
/// let chunks = chunk_date_range(&DateRange::new(d(1, 1), d(1, 10)).unwrap(), 4).unwrap();
/// assert_eq!(chunks.len(), 3);
/// assert_eq!((chunks[0].start, chunks[0].end), (d(1, 1), d(1, 4)));
/// assert_eq!((chunks[2].start, chunks[2].end), (d(1, 9), d(1, 10)));
/// ```
pub fn chunk_date_range(range: &DateRange, max_days: u32) -> Result<Vec<DateRange>, QueryError> {
    if max_days == 0 {
        return Err(QueryError::InvalidSpan);
    }
    range.validate()?;

    let span = Duration::days(i64::from(max_days) - 1);
    let mut chunks = Vec::new();
    let mut start = range.start;

    loop {
        let end = match start.checked_add_signed(span) {
            Some(candidate) if candidate < range.end => candidate,
            _ => range.end,
        };
        chunks.push(DateRange { start, end });

        if end >= range.end {
            break;
        }
        start = end + Duration::days(1);
    }

    Ok(chunks)
}

// ============================================================================
// Routing
// ============================================================================

/// Route a query to the list of requests to send, in date order
///
/// # Arguments
///
/// * `query` - Endpoint, dates and parameters
/// * `base_url` - API base URL
/// * `max_span_days` - Longest date span per request
pub fn route_query(
    query: &EndpointQuery,
    base_url: &str,
    max_span_days: u32,
) -> Result<Vec<QueryPlan>, QueryError> {
    let params = query.validate()?;
    let api_url = build_api_url(base_url, query.endpoint.path());

    let chunks = match &query.range {
        Some(range) => chunk_date_range(range, max_span_days)?
            .into_iter()
            .map(Some)
            .collect(),
        None => vec![None],
    };

    let plans = chunks
        .into_iter()
        .map(|chunk| {
            let mut pairs = Vec::with_capacity(params.len() + 2);
            if let Some(range) = &chunk {
                pairs.push(("dateFrom".to_string(), format_api_date(range.start)));
                pairs.push(("dateTo".to_string(), format_api_date(range.end)));
            }
            pairs.extend(params.iter().cloned());

            QueryPlan {
                endpoint: query.endpoint,
                range: chunk,
                query: pairs,
                api_url: api_url.clone(),
            }
        })
        .collect();

    Ok(plans)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_date_range_days_and_validation() {
        let range = DateRange::new(d(2024, 2, 1), d(2024, 2, 29)).unwrap();
        assert_eq!(range.days(), 29);

        assert!(DateRange::new(d(2024, 3, 2), d(2024, 3, 1)).is_err());
        assert_eq!(
            DateRange::new(d(2024, 3, 1), d(2024, 3, 1)).unwrap().days(),
            1
        );
    }

    #[test]
    fn test_chunking_exact_multiple() {
        let range = DateRange::new(d(2024, 1, 1), d(2024, 1, 6)).unwrap();
        let chunks = chunk_date_range(&range, 3).unwrap();

        assert_eq!(
            chunks,
            vec![
                DateRange {
                    start: d(2024, 1, 1),
                    end: d(2024, 1, 3)
                },
                DateRange {
                    start: d(2024, 1, 4),
                    end: d(2024, 1, 6)
                },
            ]
        );
    }

    #[test]
    fn test_chunking_covers_range_without_gaps() {
        let range = DateRange::new(d(2023, 11, 15), d(2024, 3, 2)).unwrap();
        let chunks = chunk_date_range(&range, 30).unwrap();

        assert_eq!(chunks.first().unwrap().start, range.start);
        assert_eq!(chunks.last().unwrap().end, range.end);
        for pair in chunks.windows(2) {
            assert_eq!(pair[0].end + Duration::days(1), pair[1].start);
        }
        assert!(chunks.iter().all(|c| c.days() <= 30));
        let total: i64 = chunks.iter().map(DateRange::days).sum();
        assert_eq!(total, range.days());
    }

    #[test]
    fn test_chunking_single_day_and_one_day_span() {
        let single = DateRange::new(d(2024, 5, 5), d(2024, 5, 5)).unwrap();
        assert_eq!(chunk_date_range(&single, 60).unwrap(), vec![single]);

        let week = DateRange::new(d(2024, 5, 1), d(2024, 5, 7)).unwrap();
        assert_eq!(chunk_date_range(&week, 1).unwrap().len(), 7);

        assert!(matches!(
            chunk_date_range(&week, 0),
            Err(QueryError::InvalidSpan)
        ));
    }

    #[test]
    fn test_route_query_orders_dates_before_params() {
        let query = EndpointQuery::new(Endpoint::ActualGeneration)
            .dates(d(2024, 10, 1), d(2024, 10, 2))
            .multi_param("type", ["wind", "Hydro"]);

        let plans = route_query(&query, "https://api.terna.it/", 60).unwrap();

        assert_eq!(plans.len(), 1);
        assert_eq!(
            plans[0].api_url,
            "https://api.terna.it/generation/v2.0/actual-generation"
        );
        let expected: Vec<(String, String)> = [
            ("dateFrom", "01/10/2024"),
            ("dateTo", "02/10/2024"),
            ("type", "Wind"),
            ("type", "Hydro"),
        ]
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect();
        assert_eq!(plans[0].query, expected);
    }

    #[test]
    fn test_route_query_without_dates() {
        let query = EndpointQuery::new(Endpoint::MonthlyIndustrialConsumptionIndex)
            .param("year", "2024")
            .param("month", "02");

        let plans = route_query(&query, "https://api.terna.it", 60).unwrap();

        assert_eq!(plans.len(), 1);
        assert_eq!(plans[0].range, None);
        assert_eq!(
            plans[0].query,
            vec![
                ("year".to_string(), "2024".to_string()),
                ("month".to_string(), "2".to_string())
            ]
        );
    }

    #[test]
    fn test_route_query_chunks_in_order() {
        let query = EndpointQuery::new(Endpoint::PhysicalForeignFlow)
            .dates(d(2024, 1, 1), d(2024, 12, 31));

        let plans = route_query(&query, "https://api.terna.it/", 60).unwrap();

        assert_eq!(plans.len(), 7); // 366 days
        assert_eq!(plans[0].query[0].1, "01/01/2024");
        assert_eq!(plans[0].query[1].1, "29/02/2024");
        assert_eq!(plans[1].query[0].1, "01/03/2024");
        assert_eq!(plans[6].query[1].1, "31/12/2024");
    }

    #[test]
    fn test_validate_rejects_bad_queries() {
        let missing_dates = EndpointQuery::new(Endpoint::TotalLoad);
        assert!(matches!(
            missing_dates.validate(),
            Err(QueryError::MissingDateRange(_))
        ));

        let unexpected_dates =
            EndpointQuery::new(Endpoint::InstalledCapacity).dates(d(2024, 1, 1), d(2024, 1, 2));
        assert!(matches!(
            unexpected_dates.validate(),
            Err(QueryError::UnexpectedDateRange(_))
        ));

        let reversed = EndpointQuery::new(Endpoint::TotalLoad).dates(d(2024, 1, 2), d(2024, 1, 1));
        assert!(matches!(
            reversed.validate(),
            Err(QueryError::InvalidDateRange { .. })
        ));

        let unknown_param = EndpointQuery::new(Endpoint::PeakValleyLoad)
            .dates(d(2024, 1, 1), d(2024, 1, 2))
            .param("biddingZone", "North");
        match unknown_param.validate() {
            Err(QueryError::UnknownParameter { allowed, .. }) => assert_eq!(allowed, "none"),
            other => panic!("Expected UnknownParameter, got {:?}", other),
        }

        let bad_zone = EndpointQuery::new(Endpoint::MarketLoad)
            .dates(d(2024, 1, 1), d(2024, 1, 2))
            .param("biddingZone", "Atlantis");
        assert!(matches!(
            bad_zone.validate(),
            Err(QueryError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_optional_param_skips_none() {
        let query = EndpointQuery::new(Endpoint::MarketCosts)
            .dates(d(2024, 1, 1), d(2024, 1, 1))
            .optional_param("sessionType", Some("MSD1"))
            .optional_param("direction", None);

        assert_eq!(
            query.params,
            vec![("sessionType".to_string(), "MSD1".to_string())]
        );
    }
}
