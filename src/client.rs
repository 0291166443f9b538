//! Authenticated client for the Terna transparency API
//!
//! Ties the pieces together: a query is validated and routed into one or
//! more date-chunked requests, each request is sent with a cached bearer
//! token, and the parsed chunks are concatenated in request order (re-sorted
//! when timestamp-indexed).
//!
//! # Example
//! ```no_run
//! use chrono::NaiveDate;
//! use terna_transparency::{ClientConfig, TernaClient};
//!
//! let client = TernaClient::new(ClientConfig::new("api_key", "api_secret")?)?;
//! let table = client.total_load(
//!     NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
//!     NaiveDate::from_ymd_opt(2024, 3, 31).unwrap(),
//!     &["North", "South"],
//! )?;
//! table.write_csv(std::io::stdout())?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use chrono::NaiveDate;
use reqwest::blocking::Client;
use reqwest::header::ACCEPT;
use reqwest::StatusCode;
use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::endpoints::Endpoint;
use crate::error::{ApiError, OAuth2Error, Result, TernaError};
use crate::oauth2::{OAuth2Config, OAuth2Manager};
use crate::query_router::{route_query, EndpointQuery, QueryPlan};
use crate::response_parser::parse_response;
use crate::table::Table;

/// Response bodies longer than this are cut in debug logs
const LOG_BODY_CHARS: usize = 200;

/// Client for the transparency endpoints
#[derive(Debug)]
pub struct TernaClient {
    config: ClientConfig,
    http: Client,
    oauth: OAuth2Manager,
}

impl TernaClient {
    /// Build a client; the HTTP client is shared with the token manager
    pub fn new(config: ClientConfig) -> Result<Self> {
        config.validate()?;

        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| TernaError::Config(format!("Failed to build HTTP client: {}", e)))?;

        let oauth = OAuth2Manager::new(
            OAuth2Config {
                token_url: config.token_url.clone(),
                client_id: config.api_key.clone(),
                client_secret: config.api_secret.clone(),
            },
            http.clone(),
        );

        Ok(Self {
            config,
            http,
            oauth,
        })
    }

    /// Build a client from `TERNA_*` environment variables
    pub fn from_env() -> Result<Self> {
        Self::new(ClientConfig::from_env()?)
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Fetch an endpoint into a single table
    ///
    /// Long date ranges are split into chunks fetched one after the other.
    /// Chunks without data are skipped; the rest are concatenated in
    /// request order, then sorted when indexed by timestamp.
    ///
    /// # Arguments
    ///
    /// * `query` - Endpoint, optional date range and parameters
    ///
    /// # Returns
    ///
    /// * `Ok(Table)` - Combined table (empty when no chunk had data)
    /// * `Err(TernaError)` - Invalid query, authentication, HTTP or parse failure
    pub fn fetch(&self, query: &EndpointQuery) -> Result<Table> {
        let plans = route_query(query, &self.config.base_url, self.config.max_span_days)?;

        info!(
            endpoint = %query.endpoint,
            requests = plans.len(),
            "fetching endpoint"
        );

        let mut tables = Vec::with_capacity(plans.len());
        for plan in &plans {
            match self.fetch_plan(plan)? {
                Some(table) => tables.push(table),
                None => debug!(url = %plan.api_url, "no data in response, skipping"),
            }
        }

        let table = Table::concat(tables);
        info!(
            endpoint = %query.endpoint,
            rows = table.len(),
            columns = table.columns().len(),
            "fetch complete"
        );

        Ok(table)
    }

    /// Send one planned request and parse its body
    ///
    /// `Ok(None)` means the response carried no data.
    pub fn fetch_plan(&self, plan: &QueryPlan) -> Result<Option<Table>> {
        match self.fetch_with_oauth_retry(plan)? {
            Some(body) => Ok(parse_response(&body)?),
            None => Ok(None),
        }
    }

    /// Fetch with a cached token, re-authenticating once on 401
    fn fetch_with_oauth_retry(&self, plan: &QueryPlan) -> Result<Option<String>> {
        let token = self.oauth.get_token()?;

        match self.fetch_endpoint(plan, &token) {
            Err(TernaError::OAuth2(OAuth2Error::TokenExpired)) => {
                warn!(url = %plan.api_url, "access token rejected, re-authenticating");
                self.oauth.clear_cache();
                let token = self.oauth.get_token()?;
                self.fetch_endpoint(plan, &token)
            }
            other => other,
        }
    }

    /// GET a data endpoint
    ///
    /// # Error Handling
    ///
    /// - 200 with a non-blank body → `Some(body)`
    /// - other 2xx, or a blank body → `None` (no data)
    /// - 401 Unauthorized → `OAuth2Error::TokenExpired` (caller clears the cache and retries)
    /// - other status → `ApiError::HttpError`
    /// - transport failure → `ApiError::Network`
    fn fetch_endpoint(&self, plan: &QueryPlan, token: &str) -> Result<Option<String>> {
        debug!(url = %plan.api_url, query = ?plan.query, "sending request");

        let response = self
            .http
            .get(&plan.api_url)
            .query(&plan.query)
            .header(ACCEPT, "application/json")
            .bearer_auth(token)
            .send()
            .map_err(|e| ApiError::Network(format!("GET {} failed: {}", plan.api_url, e)))?;

        let status = response.status();
        let body = response
            .text()
            .map_err(|e| ApiError::Network(format!("Failed to read response body: {}", e)))?;

        debug!(
            status = status.as_u16(),
            body = %truncate(&body, LOG_BODY_CHARS),
            "response received"
        );

        if status.is_success() {
            if status != StatusCode::OK || body.trim().is_empty() {
                debug!(status = status.as_u16(), "empty response, no data");
                return Ok(None);
            }
            return Ok(Some(body));
        }

        match status {
            StatusCode::UNAUTHORIZED => Err(OAuth2Error::TokenExpired.into()),
            _ => Err(ApiError::HttpError {
                status: status.as_u16(),
                body,
            }
            .into()),
        }
    }

    // ========================================================================
    // Load
    // ========================================================================

    /// Total load, optionally filtered by bidding zones
    pub fn total_load(&self, start: NaiveDate, end: NaiveDate, zones: &[&str]) -> Result<Table> {
        self.fetch(
            &ranged(Endpoint::TotalLoad, start, end)
                .multi_param("biddingZone", zones.iter().copied()),
        )
    }

    /// Market load, optionally filtered by bidding zones
    pub fn market_load(&self, start: NaiveDate, end: NaiveDate, zones: &[&str]) -> Result<Table> {
        self.fetch(
            &ranged(Endpoint::MarketLoad, start, end)
                .multi_param("biddingZone", zones.iter().copied()),
        )
    }

    pub fn peak_valley_load(&self, start: NaiveDate, end: NaiveDate) -> Result<Table> {
        self.fetch(&ranged(Endpoint::PeakValleyLoad, start, end))
    }

    pub fn peak_valley_load_details(&self, start: NaiveDate, end: NaiveDate) -> Result<Table> {
        self.fetch(&ranged(Endpoint::PeakValleyLoadDetails, start, end))
    }

    /// Monthly index of industrial electricity consumption
    pub fn monthly_industrial_consumption_index(
        &self,
        year: Option<i32>,
        month: Option<u32>,
    ) -> Result<Table> {
        let query = EndpointQuery::new(Endpoint::MonthlyIndustrialConsumptionIndex)
            .optional_param("year", year.map(|y| y.to_string()).as_deref())
            .optional_param("month", month.map(|m| m.to_string()).as_deref());
        self.fetch(&query)
    }

    // ========================================================================
    // Generation
    // ========================================================================

    /// Actual generation, optionally filtered by generation types
    pub fn actual_generation(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        types: &[&str],
    ) -> Result<Table> {
        self.fetch(
            &ranged(Endpoint::ActualGeneration, start, end)
                .multi_param("type", types.iter().copied()),
        )
    }

    /// Renewable generation, optionally filtered by renewable types
    pub fn renewable_generation(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        types: &[&str],
    ) -> Result<Table> {
        self.fetch(
            &ranged(Endpoint::RenewableGeneration, start, end)
                .multi_param("type", types.iter().copied()),
        )
    }

    pub fn energy_balance(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        balance_type: Option<&str>,
    ) -> Result<Table> {
        self.fetch(
            &ranged(Endpoint::EnergyBalance, start, end).optional_param("type", balance_type),
        )
    }

    /// Installed capacity per year (no date range)
    pub fn installed_capacity(&self, year: Option<i32>, types: &[&str]) -> Result<Table> {
        let query = EndpointQuery::new(Endpoint::InstalledCapacity)
            .optional_param("year", year.map(|y| y.to_string()).as_deref())
            .multi_param("type", types.iter().copied());
        self.fetch(&query)
    }

    // ========================================================================
    // Transmission
    // ========================================================================

    pub fn scheduled_foreign_exchange(&self, start: NaiveDate, end: NaiveDate) -> Result<Table> {
        self.fetch(&ranged(Endpoint::ScheduledForeignExchange, start, end))
    }

    pub fn scheduled_internal_exchange(&self, start: NaiveDate, end: NaiveDate) -> Result<Table> {
        self.fetch(&ranged(Endpoint::ScheduledInternalExchange, start, end))
    }

    pub fn physical_foreign_flow(&self, start: NaiveDate, end: NaiveDate) -> Result<Table> {
        self.fetch(&ranged(Endpoint::PhysicalForeignFlow, start, end))
    }

    pub fn physical_internal_flow(&self, start: NaiveDate, end: NaiveDate) -> Result<Table> {
        self.fetch(&ranged(Endpoint::PhysicalInternalFlow, start, end))
    }

    // ========================================================================
    // Market
    // ========================================================================

    pub fn forecast_load(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        session_type: Option<&str>,
    ) -> Result<Table> {
        self.fetch(
            &ranged(Endpoint::ForecastLoad, start, end).optional_param("sessionType", session_type),
        )
    }

    pub fn market_costs(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        session_type: Option<&str>,
        direction: Option<&str>,
    ) -> Result<Table> {
        self.fetch(&market_query(Endpoint::MarketCosts, start, end, session_type, direction))
    }

    pub fn market_quantity(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        session_type: Option<&str>,
        direction: Option<&str>,
    ) -> Result<Table> {
        self.fetch(&market_query(Endpoint::MarketQuantity, start, end, session_type, direction))
    }

    pub fn accepted_offers(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        session_type: Option<&str>,
        direction: Option<&str>,
    ) -> Result<Table> {
        self.fetch(&market_query(Endpoint::AcceptedOffers, start, end, session_type, direction))
    }

    pub fn submitted_offers(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        session_type: Option<&str>,
        direction: Option<&str>,
    ) -> Result<Table> {
        self.fetch(&market_query(Endpoint::SubmittedOffers, start, end, session_type, direction))
    }

    /// Market prices (e.g. `priceType=MARGINAL`, `sessionType=MSD1`, `direction=UP`)
    pub fn market_prices(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        price_type: Option<&str>,
        session_type: Option<&str>,
        direction: Option<&str>,
    ) -> Result<Table> {
        let query = EndpointQuery::new(Endpoint::MarketPrices)
            .dates(start, end)
            .optional_param("priceType", price_type)
            .optional_param("sessionType", session_type)
            .optional_param("direction", direction);
        self.fetch(&query)
    }

    // ========================================================================
    // Outages & adequacy
    // ========================================================================

    pub fn generation_unit_unavailability(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Table> {
        self.fetch(&ranged(Endpoint::GenerationUnitUnavailability, start, end))
    }

    pub fn detail_available_capacity(&self, start: NaiveDate, end: NaiveDate) -> Result<Table> {
        self.fetch(&ranged(Endpoint::DetailAvailableCapacity, start, end))
    }
}

fn ranged(endpoint: Endpoint, start: NaiveDate, end: NaiveDate) -> EndpointQuery {
    EndpointQuery::new(endpoint).dates(start, end)
}

fn market_query(
    endpoint: Endpoint,
    start: NaiveDate,
    end: NaiveDate,
    session_type: Option<&str>,
    direction: Option<&str>,
) -> EndpointQuery {
    ranged(endpoint, start, end)
        .optional_param("sessionType", session_type)
        .optional_param("direction", direction)
}

fn truncate(body: &str, max_chars: usize) -> String {
    match body.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}
