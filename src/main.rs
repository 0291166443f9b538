//! `terna` - fetch Terna transparency data as CSV
//!
//! Credentials come from `TERNA_API_KEY` / `TERNA_API_SECRET`.
//! Logs go to stderr; set `RUST_LOG=terna_transparency=debug` to see requests.

use std::fs::File;
use std::io::{self, BufWriter};
use std::path::PathBuf;

use anyhow::{bail, Context};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use terna_transparency::endpoints::ParamKind;
use terna_transparency::query_router::parse_date;
use terna_transparency::{ClientConfig, Endpoint, EndpointQuery, TernaClient};

#[derive(Parser)]
#[command(name = "terna")]
#[command(author, version, about = "Terna transparency API client")]
#[command(
    long_about = "Fetch Italian grid data from the Terna transparency API as CSV.\n\
    \nCredentials are read from TERNA_API_KEY and TERNA_API_SECRET.\n\
    \nExamples:\n  \
    terna endpoints\n  \
    terna fetch total-load --from 2024-01-01 --to 2024-03-31 --param biddingZone=North\n  \
    terna fetch installed-capacity --param year=2023 --output capacity.csv\n  \
    terna fetch actual-generation --from 01/06/2024 --to 30/06/2024 \\\n      \
    --pivot Primary_Source:Actual_Generation_GWh"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the known endpoints with their paths and parameters
    Endpoints,

    /// Fetch one endpoint and write the result as CSV
    Fetch(FetchArgs),
}

#[derive(Args)]
struct FetchArgs {
    /// Endpoint name (see `terna endpoints`) or API path
    endpoint: Endpoint,

    /// First day, inclusive (YYYY-MM-DD or dd/mm/YYYY)
    #[arg(long, value_parser = parse_date)]
    from: Option<NaiveDate>,

    /// Last day, inclusive (YYYY-MM-DD or dd/mm/YYYY)
    #[arg(long, value_parser = parse_date)]
    to: Option<NaiveDate>,

    /// Query parameter as name=value; repeat for several values
    #[arg(long = "param", value_parser = parse_key_value)]
    params: Vec<(String, String)>,

    /// Reshape into one column per category: CATEGORY:VALUE
    #[arg(long, value_parser = parse_pivot)]
    pivot: Option<(String, String)>,

    /// Write CSV here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Override the API base URL
    #[arg(long)]
    base_url: Option<String>,

    /// Longest date span per request, in days
    #[arg(long)]
    max_span_days: Option<u32>,
}

fn parse_key_value(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((name, value)) if !name.trim().is_empty() => {
            Ok((name.trim().to_string(), value.trim().to_string()))
        }
        _ => Err(format!("expected name=value, got '{}'", raw)),
    }
}

fn parse_pivot(raw: &str) -> Result<(String, String), String> {
    match raw.split_once(':') {
        Some((category, value)) if !category.is_empty() && !value.is_empty() => {
            Ok((category.to_string(), value.to_string()))
        }
        _ => Err(format!("expected CATEGORY:VALUE, got '{}'", raw)),
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Endpoints => {
            list_endpoints();
            Ok(())
        }
        Commands::Fetch(args) => fetch(args),
    }
}

fn list_endpoints() {
    for endpoint in Endpoint::all() {
        let dates = if endpoint.requires_date_range() {
            "dates"
        } else {
            "-"
        };
        let params: Vec<String> = endpoint
            .params()
            .iter()
            .map(|spec| match spec.kind {
                ParamKind::Enumerated(values) => format!("{}[{}]", spec.name, values.join("|")),
                ParamKind::Year => format!("{}[YYYY]", spec.name),
                ParamKind::Month => format!("{}[1-12]", spec.name),
                ParamKind::Free => spec.name.to_string(),
            })
            .collect();

        println!(
            "{:<36} {:<58} {:<6} {}",
            endpoint.name(),
            endpoint.path(),
            dates,
            params.join(" ")
        );
    }
}

fn fetch(args: FetchArgs) -> anyhow::Result<()> {
    let mut config = ClientConfig::from_env().context("Failed to load configuration")?;
    if let Some(base_url) = args.base_url {
        config = config.with_base_url(base_url);
    }
    if let Some(days) = args.max_span_days {
        config = config.with_max_span_days(days)?;
    }

    let client = TernaClient::new(config)?;

    let query = match (args.from, args.to) {
        (Some(from), Some(to)) => EndpointQuery::new(args.endpoint).dates(from, to),
        (None, None) => EndpointQuery::new(args.endpoint),
        _ => bail!("--from and --to must be given together"),
    };
    let query = args
        .params
        .into_iter()
        .fold(query, |query, (name, value)| query.param(name, value));

    let mut table = client
        .fetch(&query)
        .with_context(|| format!("Failed to fetch {}", args.endpoint))?;

    if let Some((category, value)) = &args.pivot {
        table = table
            .pivot(category, value)
            .with_context(|| format!("Failed to pivot by {}:{}", category, value))?;
    }

    match &args.output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create {}", path.display()))?;
            table.write_csv(BufWriter::new(file))?;
            info!(path = %path.display(), rows = table.len(), "CSV written");
        }
        None => table.write_csv(io::stdout().lock())?,
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_key_value() {
        assert_eq!(
            parse_key_value("biddingZone=North").unwrap(),
            ("biddingZone".to_string(), "North".to_string())
        );
        assert_eq!(
            parse_key_value("type = Self-consumption").unwrap(),
            ("type".to_string(), "Self-consumption".to_string())
        );
        assert!(parse_key_value("North").is_err());
        assert!(parse_key_value("=North").is_err());
    }

    #[test]
    fn test_parse_pivot() {
        assert_eq!(
            parse_pivot("Bidding_Zone:Total_Load_MW").unwrap(),
            ("Bidding_Zone".to_string(), "Total_Load_MW".to_string())
        );
        assert!(parse_pivot("Bidding_Zone").is_err());
        assert!(parse_pivot(":value").is_err());
    }

    #[test]
    fn test_cli_parses_fetch() {
        let cli = Cli::try_parse_from([
            "terna",
            "fetch",
            "total-load",
            "--from",
            "2024-01-01",
            "--to",
            "31/01/2024",
            "--param",
            "biddingZone=North",
            "--param",
            "biddingZone=South",
            "--pivot",
            "Bidding_Zone:Total_Load_MW",
        ])
        .unwrap();

        match cli.command {
            Commands::Fetch(args) => {
                assert_eq!(args.endpoint, Endpoint::TotalLoad);
                assert_eq!(args.from, NaiveDate::from_ymd_opt(2024, 1, 1));
                assert_eq!(args.to, NaiveDate::from_ymd_opt(2024, 1, 31));
                assert_eq!(args.params.len(), 2);
                assert!(args.output.is_none());
            }
            Commands::Endpoints => panic!("Expected fetch command"),
        }
    }

    #[test]
    fn test_cli_rejects_unknown_endpoint() {
        assert!(Cli::try_parse_from(["terna", "fetch", "solar-flares"]).is_err());
    }

    #[test]
    fn test_cli_definition() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
