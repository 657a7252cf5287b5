// CLI driver: load history + chain, run the discovery pipeline, print

use std::path::PathBuf;
use std::time::Duration;

use chrono::{NaiveDate, Utc};
use clap::Parser;
use log::error;

use creditscout::config::EngineConfig;
use creditscout::market::{chain_loader, csv_loader};
use creditscout::pipeline::{discover, CancelToken, DiscoveryParams};
use creditscout::utils::table_out;

#[derive(Parser, Debug)]
#[command(
    name = "creditscout",
    about = "Credit-spread discovery over a daily-bar history and an options chain"
)]
struct Cli {
    /// Daily OHLCV history CSV (Date,Open,High,Low,Close,Volume)
    #[arg(long)]
    history: PathBuf,

    /// Options chain JSON dump
    #[arg(long)]
    chain: PathBuf,

    /// Optional engine config JSON; defaults otherwise
    #[arg(long)]
    config: Option<PathBuf>,

    /// Minimum days to expiration
    #[arg(long, default_value_t = 7)]
    min_dte: i64,

    /// Maximum days to expiration
    #[arg(long, default_value_t = 60)]
    max_dte: i64,

    /// Return-on-risk floor (0 < min_ror < 1)
    #[arg(long, default_value_t = 0.15)]
    min_ror: f64,

    /// Annualized risk-free rate
    #[arg(long, default_value_t = 0.05)]
    rate: f64,

    /// Positive = bull puts, otherwise bear calls
    #[arg(long, default_value_t = 1)]
    indicator: i32,

    /// How many ranked spreads to keep
    #[arg(long, default_value_t = 10)]
    top_k: usize,

    /// Wall-clock budget in seconds; partial ranking on expiry
    #[arg(long)]
    budget_secs: Option<u64>,

    /// Valuation date (YYYY-MM-DD); defaults to today
    #[arg(long)]
    as_of: Option<NaiveDate>,

    /// Emit the full diagnostic JSON instead of the table
    #[arg(long)]
    json: bool,
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => match EngineConfig::load_from_file(path) {
            Ok(config) => config,
            Err(e) => {
                error!("config load failed: {}", e);
                std::process::exit(2);
            }
        },
        None => EngineConfig::default(),
    };

    let history = match csv_loader::load_history(&cli.history) {
        Ok(history) => history,
        Err(e) => {
            error!("history load failed: {}", e);
            std::process::exit(2);
        }
    };

    let (symbol, spot, chain) = match chain_loader::load_chain(&cli.chain) {
        Ok(loaded) => loaded,
        Err(e) => {
            error!("chain load failed: {}", e);
            std::process::exit(2);
        }
    };
    let spot = if spot > 0.0 { spot } else { history.last_close() };

    let params = DiscoveryParams {
        min_dte: cli.min_dte,
        max_dte: cli.max_dte,
        min_ror: cli.min_ror,
        risk_free_rate: cli.rate,
        indicator: cli.indicator,
        top_k: cli.top_k,
    };
    let today = cli.as_of.unwrap_or_else(|| Utc::now().date_naive());
    let cancel = match cli.budget_secs {
        Some(secs) => CancelToken::with_budget(Duration::from_secs(secs)),
        None => CancelToken::new(),
    };

    match discover(&symbol, &history, &chain, spot, today, &params, &config, &cancel) {
        Ok(ranked) => {
            if cli.json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&table_out::to_json(&symbol, &ranked))
                        .unwrap_or_else(|_| "{}".into())
                );
            } else {
                table_out::show_ranked_table(&symbol, &ranked);
            }
        }
        Err(e) => {
            error!("discovery failed: {}", e);
            std::process::exit(1);
        }
    }
}
