//! Error types for the Terna client
//!
//! Failure modes are grouped the same way the request pipeline is:
//! - Query errors (bad endpoint parameters, invalid date ranges)
//! - OAuth2 authentication errors
//! - HTTP API errors (transport failures, non-2xx responses)
//! - Parse errors (malformed JSON, unexpected shapes, unparseable timestamps)

use thiserror::Error;

/// Convenience alias used throughout the crate
pub type Result<T> = std::result::Result<T, TernaError>;

/// Top-level error type
///
/// Supports automatic conversion from the specific error types via `From`
#[derive(Debug, Error)]
pub enum TernaError {
    /// Response parsing error
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    /// OAuth2 authentication error
    #[error("OAuth2 error: {0}")]
    OAuth2(#[from] OAuth2Error),

    /// HTTP API error
    #[error("API error: {0}")]
    Api(#[from] ApiError),

    /// Invalid query (unknown parameter, bad value, bad date range)
    #[error("Query error: {0}")]
    Query(#[from] QueryError),

    /// Missing or invalid client configuration
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Response parsing errors
///
/// Occurs while turning a JSON body into a [`crate::Table`]
#[derive(Debug, Clone, Error)]
pub enum ParseError {
    /// Body is not valid JSON
    #[error("Invalid JSON response: {0}")]
    InvalidJson(String),

    /// JSON is valid but not shaped like a transparency response
    ///
    /// Example: the data key holds a string instead of an array of records
    #[error("Unexpected response shape: {0}")]
    UnexpectedShape(String),

    /// Timestamp could not be parsed or does not exist in Europe/Rome
    ///
    /// Example: "31/02/2024 10:00:00"
    #[error("Invalid timestamp: '{0}'")]
    InvalidTimestamp(String),

    /// `Year` index value is not an integer
    #[error("Invalid year: '{0}'")]
    InvalidYear(String),

    /// Column referenced by name does not exist
    #[error("Missing required column: '{0}'")]
    MissingColumn(String),
}

/// OAuth2 authentication errors
///
/// Occurs during token fetch or refresh operations
#[derive(Debug, Clone, Error)]
pub enum OAuth2Error {
    /// Failed to fetch access token from the token endpoint
    ///
    /// `status` is 0 when the request never got a response
    #[error("Token fetch failed (HTTP {status}): {body}")]
    FetchFailed { status: u16, body: String },

    /// Token endpoint rejected the API key/secret pair
    #[error("Invalid OAuth2 credentials (check api key and api secret)")]
    InvalidCredentials,

    /// Token response missing required fields (access_token, expires_in)
    #[error("Invalid token response: {0}")]
    InvalidTokenResponse(String),

    /// Data endpoint answered 401 with the current token
    #[error("Access token rejected by the API")]
    TokenExpired,
}

/// HTTP API errors
///
/// Occurs while talking to a data endpoint
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    /// Non-2xx response with status code and body
    #[error("HTTP {status} error: {body}")]
    HttpError { status: u16, body: String },

    /// Transport failure (connection refused, DNS, timeout, TLS)
    #[error("Network error: {0}")]
    Network(String),
}

/// Query construction errors
///
/// Raised before any request is sent
#[derive(Debug, Clone, Error)]
pub enum QueryError {
    /// Date range with start after end
    #[error("Invalid date range: start ({start}) must be <= end ({end})")]
    InvalidDateRange { start: String, end: String },

    /// Date string in neither YYYY-MM-DD nor dd/mm/YYYY
    #[error("Invalid date '{0}' (expected YYYY-MM-DD or dd/mm/YYYY)")]
    InvalidDate(String),

    /// Endpoint needs a date range and none was given
    #[error("Endpoint '{0}' requires a date range")]
    MissingDateRange(String),

    /// Endpoint takes no date range but one was given
    #[error("Endpoint '{0}' does not accept a date range")]
    UnexpectedDateRange(String),

    /// Parameter name not known for this endpoint
    #[error("Unknown parameter '{param}' for endpoint '{endpoint}' (allowed: {allowed})")]
    UnknownParameter {
        endpoint: String,
        param: String,
        allowed: String,
    },

    /// Value outside the enumerated set for a categorical filter
    #[error("Invalid value '{value}' for '{param}' (expected one of: {allowed})")]
    InvalidValue {
        param: String,
        value: String,
        allowed: String,
    },

    /// Endpoint name not recognised
    #[error("Unknown endpoint: '{0}'")]
    UnknownEndpoint(String),

    /// Chunk span of zero days
    #[error("Maximum span must be at least one day")]
    InvalidSpan,
}
