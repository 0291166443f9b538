//! Endpoint descriptors for the Terna transparency API
//!
//! Each [`Endpoint`] knows its URL path, whether it takes a `dateFrom`/`dateTo`
//! range and which query parameters it accepts. Categorical filters carry
//! their enumerated values so queries can be checked before a request is sent.
//!
//! # Example
//!
//! ```rust
//! use terna_transparency::endpoints::Endpoint;
//!
//! let endpoint: Endpoint = "total-load".parse().unwrap();
//! assert_eq!(endpoint.path(), "load/v2.0/total-load");
//! assert!(endpoint.requires_date_range());
//! assert_eq!(endpoint.params()[0].name, "biddingZone");
//! ```

use std::fmt;
use std::str::FromStr;

use crate::error::QueryError;

/// Bidding zones accepted by the load endpoints
pub const BIDDING_ZONES: &[&str] = &[
    "Italy",
    "North",
    "Centre-North",
    "Centre-South",
    "South",
    "Calabria",
    "Sicily",
    "Sardinia",
];

/// Generation types for actual generation and installed capacity
pub const GENERATION_TYPES: &[&str] = &[
    "Thermal",
    "Wind",
    "Geothermal",
    "Photovoltaic",
    "Self-consumption",
    "Hydro",
];

/// Generation types for the renewable generation endpoint
pub const RENEWABLE_TYPES: &[&str] = &["Wind", "Geothermal", "Hydro", "Photovoltaic", "Biomass"];

/// Shape of the values a query parameter accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    /// Any string is passed through
    Free,
    /// One of a fixed set, matched case-insensitively
    Enumerated(&'static [&'static str]),
    /// Four-digit year
    Year,
    /// Month number 1-12
    Month,
}

/// Query parameter accepted by an endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParamSpec {
    /// Name as sent on the wire (e.g. `biddingZone`)
    pub name: &'static str,
    pub kind: ParamKind,
}

impl ParamSpec {
    const fn new(name: &'static str, kind: ParamKind) -> Self {
        Self { name, kind }
    }

    /// Check a value and return the spelling to send
    ///
    /// Enumerated values come back in their canonical spelling; years and
    /// months come back without leading zeros or whitespace.
    pub fn canonicalize(&self, value: &str) -> Result<String, QueryError> {
        let trimmed = value.trim();
        match self.kind {
            ParamKind::Free => Ok(trimmed.to_string()),
            ParamKind::Enumerated(allowed) => allowed
                .iter()
                .find(|candidate| candidate.eq_ignore_ascii_case(trimmed))
                .map(|candidate| (*candidate).to_string())
                .ok_or_else(|| self.invalid(value, allowed.join(", "))),
            ParamKind::Year => match trimmed.parse::<u16>() {
                Ok(year) if (2000..=9999).contains(&year) => Ok(year.to_string()),
                _ => Err(self.invalid(value, "a year between 2000 and 9999".to_string())),
            },
            ParamKind::Month => match trimmed.parse::<u8>() {
                Ok(month) if (1..=12).contains(&month) => Ok(month.to_string()),
                _ => Err(self.invalid(value, "a month between 1 and 12".to_string())),
            },
        }
    }

    fn invalid(&self, value: &str, allowed: String) -> QueryError {
        QueryError::InvalidValue {
            param: self.name.to_string(),
            value: value.to_string(),
            allowed,
        }
    }
}

const BIDDING_ZONE: ParamSpec = ParamSpec::new("biddingZone", ParamKind::Enumerated(BIDDING_ZONES));
const GENERATION_TYPE: ParamSpec = ParamSpec::new("type", ParamKind::Enumerated(GENERATION_TYPES));
const RENEWABLE_TYPE: ParamSpec = ParamSpec::new("type", ParamKind::Enumerated(RENEWABLE_TYPES));
const BALANCE_TYPE: ParamSpec = ParamSpec::new("type", ParamKind::Free);
const YEAR: ParamSpec = ParamSpec::new("year", ParamKind::Year);
const MONTH: ParamSpec = ParamSpec::new("month", ParamKind::Month);
const SESSION_TYPE: ParamSpec = ParamSpec::new("sessionType", ParamKind::Free);
const DIRECTION: ParamSpec = ParamSpec::new("direction", ParamKind::Free);
const PRICE_TYPE: ParamSpec = ParamSpec::new("priceType", ParamKind::Free);

/// Known Terna transparency endpoints
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    TotalLoad,
    MarketLoad,
    PeakValleyLoad,
    PeakValleyLoadDetails,
    ActualGeneration,
    RenewableGeneration,
    EnergyBalance,
    InstalledCapacity,
    ScheduledForeignExchange,
    ScheduledInternalExchange,
    PhysicalForeignFlow,
    PhysicalInternalFlow,
    MonthlyIndustrialConsumptionIndex,
    ForecastLoad,
    MarketCosts,
    MarketQuantity,
    AcceptedOffers,
    SubmittedOffers,
    MarketPrices,
    GenerationUnitUnavailability,
    DetailAvailableCapacity,
}

impl Endpoint {
    /// All endpoints, grouped by API family
    pub fn all() -> &'static [Endpoint] {
        &[
            Endpoint::TotalLoad,
            Endpoint::MarketLoad,
            Endpoint::PeakValleyLoad,
            Endpoint::PeakValleyLoadDetails,
            Endpoint::ActualGeneration,
            Endpoint::RenewableGeneration,
            Endpoint::EnergyBalance,
            Endpoint::InstalledCapacity,
            Endpoint::ScheduledForeignExchange,
            Endpoint::ScheduledInternalExchange,
            Endpoint::PhysicalForeignFlow,
            Endpoint::PhysicalInternalFlow,
            Endpoint::MonthlyIndustrialConsumptionIndex,
            Endpoint::ForecastLoad,
            Endpoint::MarketCosts,
            Endpoint::MarketQuantity,
            Endpoint::AcceptedOffers,
            Endpoint::SubmittedOffers,
            Endpoint::MarketPrices,
            Endpoint::GenerationUnitUnavailability,
            Endpoint::DetailAvailableCapacity,
        ]
    }

    /// Path relative to the API base URL
    pub fn path(&self) -> &'static str {
        match self {
            Endpoint::TotalLoad => "load/v2.0/total-load",
            Endpoint::MarketLoad => "load/v2.0/market-load",
            Endpoint::PeakValleyLoad => "load/v2.0/peak-valley-load",
            Endpoint::PeakValleyLoadDetails => "load/v2.0/peak-valley-load-details",
            Endpoint::ActualGeneration => "generation/v2.0/actual-generation",
            Endpoint::RenewableGeneration => "generation/v2.0/renewable-generation",
            Endpoint::EnergyBalance => "generation/v2.0/energy-balance",
            Endpoint::InstalledCapacity => "generation/v2.0/installed-capacity",
            Endpoint::ScheduledForeignExchange => "transmission/v2.0/scheduled-foreign-exchange",
            Endpoint::ScheduledInternalExchange => "transmission/v2.0/scheduled-internal-exchange",
            Endpoint::PhysicalForeignFlow => "transmission/v2.0/physical-foreign-flow",
            Endpoint::PhysicalInternalFlow => "transmission/v2.0/physical-internal-flow",
            Endpoint::MonthlyIndustrialConsumptionIndex => {
                "load/v2.0/monthly-index-industrial-electrical-consumption"
            }
            Endpoint::ForecastLoad => "market/v1.0/input/forecast-load",
            Endpoint::MarketCosts => "market/v1.0/output/costs",
            Endpoint::MarketQuantity => "market/v1.0/output/quantity",
            Endpoint::AcceptedOffers => "market/v1.0/output/accepted-offers",
            Endpoint::SubmittedOffers => "market/v1.0/input/submitted-offers",
            Endpoint::MarketPrices => "market/v1.0/output/prices",
            Endpoint::GenerationUnitUnavailability => {
                "outages/v1.0/generation-unit-unavailability"
            }
            Endpoint::DetailAvailableCapacity => "adequacy/v1.0/detail-available-capacity",
        }
    }

    /// Short kebab-case name used on the command line
    pub fn name(&self) -> &'static str {
        match self {
            Endpoint::TotalLoad => "total-load",
            Endpoint::MarketLoad => "market-load",
            Endpoint::PeakValleyLoad => "peak-valley-load",
            Endpoint::PeakValleyLoadDetails => "peak-valley-load-details",
            Endpoint::ActualGeneration => "actual-generation",
            Endpoint::RenewableGeneration => "renewable-generation",
            Endpoint::EnergyBalance => "energy-balance",
            Endpoint::InstalledCapacity => "installed-capacity",
            Endpoint::ScheduledForeignExchange => "scheduled-foreign-exchange",
            Endpoint::ScheduledInternalExchange => "scheduled-internal-exchange",
            Endpoint::PhysicalForeignFlow => "physical-foreign-flow",
            Endpoint::PhysicalInternalFlow => "physical-internal-flow",
            Endpoint::MonthlyIndustrialConsumptionIndex => "industrial-consumption-index",
            Endpoint::ForecastLoad => "forecast-load",
            Endpoint::MarketCosts => "market-costs",
            Endpoint::MarketQuantity => "market-quantity",
            Endpoint::AcceptedOffers => "accepted-offers",
            Endpoint::SubmittedOffers => "submitted-offers",
            Endpoint::MarketPrices => "market-prices",
            Endpoint::GenerationUnitUnavailability => "generation-unit-unavailability",
            Endpoint::DetailAvailableCapacity => "detail-available-capacity",
        }
    }

    /// Whether requests carry `dateFrom`/`dateTo`
    ///
    /// Installed capacity and the industrial consumption index are selected
    /// by year (and month) instead.
    pub fn requires_date_range(&self) -> bool {
        !matches!(
            self,
            Endpoint::InstalledCapacity | Endpoint::MonthlyIndustrialConsumptionIndex
        )
    }

    /// Query parameters this endpoint accepts besides the date range
    pub fn params(&self) -> &'static [ParamSpec] {
        match self {
            Endpoint::TotalLoad | Endpoint::MarketLoad => &[BIDDING_ZONE],
            Endpoint::ActualGeneration => &[GENERATION_TYPE],
            Endpoint::RenewableGeneration => &[RENEWABLE_TYPE],
            Endpoint::EnergyBalance => &[BALANCE_TYPE],
            Endpoint::InstalledCapacity => &[YEAR, GENERATION_TYPE],
            Endpoint::MonthlyIndustrialConsumptionIndex => &[YEAR, MONTH],
            Endpoint::ForecastLoad => &[SESSION_TYPE],
            Endpoint::MarketCosts
            | Endpoint::MarketQuantity
            | Endpoint::AcceptedOffers
            | Endpoint::SubmittedOffers => &[SESSION_TYPE, DIRECTION],
            Endpoint::MarketPrices => &[PRICE_TYPE, SESSION_TYPE, DIRECTION],
            Endpoint::PeakValleyLoad
            | Endpoint::PeakValleyLoadDetails
            | Endpoint::ScheduledForeignExchange
            | Endpoint::ScheduledInternalExchange
            | Endpoint::PhysicalForeignFlow
            | Endpoint::PhysicalInternalFlow
            | Endpoint::GenerationUnitUnavailability
            | Endpoint::DetailAvailableCapacity => &[],
        }
    }

    /// Look up a parameter spec by wire name
    pub fn param(&self, name: &str) -> Option<&'static ParamSpec> {
        self.params().iter().find(|spec| spec.name == name)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Endpoint {
    type Err = QueryError;

    /// Accepts the kebab-case name or the full API path
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().trim_matches('/');
        Endpoint::all()
            .iter()
            .copied()
            .find(|endpoint| {
                endpoint.name().eq_ignore_ascii_case(wanted) || endpoint.path() == wanted
            })
            .ok_or_else(|| QueryError::UnknownEndpoint(s.to_string()))
    }
}
