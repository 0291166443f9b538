//! Terna transparency client - Italian grid operator data as tables
//!
//! This crate talks to the REST endpoints of Terna's transparency portal
//! (load, generation, transmission, market, outages and adequacy data) and
//! returns every response as a [`Table`] keyed by Europe/Rome timestamps.
//!
//! # Features
//! - OAuth2 client-credentials authentication with token caching
//! - Typed endpoint descriptors with validated, canonicalised filters
//! - Query routing: long date ranges are split into sequential requests
//! - Response normalisation (JSON records → timestamp-indexed table)
//! - Pivoting and CSV export
//!
//! # Example
//! ```no_run
//! use chrono::NaiveDate;
//! use terna_transparency::{Endpoint, EndpointQuery, TernaClient};
//!
//! let client = TernaClient::from_env()?;
//! let query = EndpointQuery::new(Endpoint::ActualGeneration)
//!     .dates(
//!         NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
//!         NaiveDate::from_ymd_opt(2024, 6, 30).unwrap(),
//!     )
//!     .param("type", "Wind")
//!     .param("type", "Photovoltaic");
//!
//! let table = client.fetch(&query)?.pivot("Primary_Source", "Actual_Generation_GWh")?;
//! table.write_csv(std::io::stdout())?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod client;
pub mod config;
pub mod endpoints;
mod error;
pub mod oauth2;
pub mod query_router;
pub mod response_parser;
pub mod table;
pub mod transformations;

// Re-export public types for easier access
pub use client::TernaClient;
pub use config::ClientConfig;
pub use endpoints::{Endpoint, ParamKind, ParamSpec};
pub use error::{ApiError, OAuth2Error, ParseError, QueryError, Result, TernaError};
pub use oauth2::{OAuth2Config, OAuth2Manager};
pub use query_router::{DateRange, EndpointQuery, QueryPlan};
pub use table::{Cell, IndexKind, RowKey, Table, TableRow};
