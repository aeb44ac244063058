//! Command-line interface parsing for coindeck
//!
//! This module handles parsing of CLI arguments using clap, including flags
//! that open the dashboard directly in the compare, coin detail, or
//! watchlist view.

use clap::Parser;
use thiserror::Error;

/// Error types for CLI argument parsing
#[derive(Debug, Error)]
pub enum CliError {
    /// More coin ids were given than one comparison supports
    #[error("Too many coins to compare: {0} (maximum is 5)")]
    TooManyCompareIds(usize),

    /// The compare flag was given an empty id list
    #[error("--compare was given an empty list of coin ids")]
    EmptyCompareList,
}

/// coindeck - cryptocurrency market dashboard for the terminal
#[derive(Parser, Debug)]
#[command(name = "coindeck")]
#[command(about = "Cryptocurrency market data, charts, and watchlist in the terminal")]
#[command(version)]
pub struct Cli {
    /// Open directly in the compare view, optionally preselecting coins
    ///
    /// Examples:
    ///   coindeck --compare                      # Open the compare view
    ///   coindeck --compare bitcoin,ethereum     # Compare two coins directly
    ///
    /// Takes a comma-separated list of up to 5 coin ids.
    #[arg(long, value_name = "IDS")]
    pub compare: Option<Option<String>>,

    /// Open directly on one coin's detail view (by coin id, e.g. "bitcoin")
    #[arg(long, value_name = "COIN_ID", conflicts_with = "compare")]
    pub coin: Option<String>,

    /// Open directly in the watchlist view
    #[arg(long, conflicts_with_all = ["compare", "coin"])]
    pub watchlist: bool,

    /// Trailing window in days for historical charts
    #[arg(long, value_name = "DAYS", default_value_t = 7, value_parser = clap::value_parser!(u32).range(1..=365))]
    pub days: u32,

    /// Disable the periodic background refresh
    #[arg(long)]
    pub no_refresh: bool,
}

/// The view the application starts in
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum StartView {
    /// Market overview table
    #[default]
    Market,
    /// Detail view for one coin id
    Coin(String),
    /// Comparison view
    Compare,
    /// Watchlist view
    Watchlist,
}

/// Configuration derived from CLI arguments for application startup
#[derive(Debug, Clone, Default)]
pub struct StartupConfig {
    /// The view to open after the initial data load
    pub start_view: StartView,
    /// Coin ids preselected in the compare view
    pub compare_ids: Vec<String>,
    /// Trailing chart window in days
    pub days: u32,
    /// Whether the background refresh task runs
    pub auto_refresh: bool,
}

/// Parses a comma-separated compare list into coin ids
///
/// # Arguments
/// * `s` - The raw flag value from the CLI
///
/// # Returns
/// * `Ok(Vec<String>)` with the trimmed, non-empty ids
/// * `Err(CliError)` when the list is empty or has more than 5 ids
pub fn parse_compare_ids(s: &str) -> Result<Vec<String>, CliError> {
    let ids: Vec<String> = s
        .split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .collect();

    if ids.is_empty() {
        return Err(CliError::EmptyCompareList);
    }
    if ids.len() > 5 {
        return Err(CliError::TooManyCompareIds(ids.len()));
    }
    Ok(ids)
}

impl StartupConfig {
    /// Creates a StartupConfig from parsed CLI arguments.
    ///
    /// # Arguments
    /// * `cli` - The parsed CLI struct
    ///
    /// # Returns
    /// * `Ok(StartupConfig)` with appropriate settings
    /// * `Err(CliError)` if the compare list is invalid
    pub fn from_cli(cli: &Cli) -> Result<Self, CliError> {
        let mut config = StartupConfig {
            days: cli.days,
            auto_refresh: !cli.no_refresh,
            ..Default::default()
        };

        if cli.watchlist {
            config.start_view = StartView::Watchlist;
        } else if let Some(ref coin_id) = cli.coin {
            config.start_view = StartView::Coin(coin_id.clone());
        } else {
            match &cli.compare {
                None => {}
                Some(None) => {
                    config.start_view = StartView::Compare;
                }
                Some(Some(raw)) => {
                    config.compare_ids = parse_compare_ids(raw)?;
                    config.start_view = StartView::Compare;
                }
            }
        }

        Ok(config)
    }
}
