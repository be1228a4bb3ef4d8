// src/main.rs

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use stockflow::pipeline::pipeline_from_config;
use stockflow::ticker_list::{self, SP500_URL};
use stockflow::{CsvWarehouse, Destination, EtlConfig, HttpSession, SourceKind};

#[derive(Parser)]
#[command(name = "stockflow", version, about = "Load daily stock prices into warehouse tables")]
struct Cli {
    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Extract prices for a ticker list and append them to a table.
    Extract {
        #[arg(long, value_enum, default_value_t = Source::FmpYearly)]
        source: Source,
        /// CSV file with a `Ticker` column; defaults to TICKER_CSV.
        #[arg(long)]
        tickers: Option<PathBuf>,
        /// Target table; defaults to ETL_DESTINATION.
        #[arg(long)]
        destination: Option<String>,
        /// Call each ticker once instead of retrying transient failures.
        #[arg(long)]
        no_retry: bool,
    },
    /// Scrape a ticker table from a web page into a CSV file.
    ScrapeTickers {
        #[arg(long, default_value = SP500_URL)]
        url: String,
        #[arg(long, default_value = "sp500_tickers.csv")]
        output: PathBuf,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Source {
    AlphaQuote,
    AlphaDaily,
    FmpYearly,
    FmpFiveYear,
}

impl From<Source> for SourceKind {
    fn from(source: Source) -> Self {
        match source {
            Source::AlphaQuote => SourceKind::AlphaQuote,
            Source::AlphaDaily => SourceKind::AlphaDaily,
            Source::FmpYearly => SourceKind::FmpYearly,
            Source::FmpFiveYear => SourceKind::FmpFiveYear,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    stockflow::logging::init_tracing("info", cli.json_logs);

    let config = EtlConfig::from_env().context("loading configuration")?;
    let session = HttpSession::new(config.http_timeout)?;

    match cli.command {
        Command::Extract {
            source,
            tickers,
            destination,
            no_retry,
        } => {
            let path = tickers
                .or_else(|| config.ticker_csv.clone())
                .context("no ticker list: pass --tickers or set TICKER_CSV")?;
            let tickers = ticker_list::read_ticker_csv(&path)
                .with_context(|| format!("reading {}", path.display()))?;
            let destination = Destination::new(destination.unwrap_or_else(|| config.destination.clone()));

            let client = SourceKind::from(source).build(&config, session)?;
            let warehouse = Arc::new(CsvWarehouse::new(config.warehouse_dir.clone()));
            let pipeline = pipeline_from_config(&config, warehouse);

            let cancel = pipeline.extractor().cancellation().clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("interrupt received, stopping after the current ticker");
                    cancel.cancel();
                }
            });

            let report = pipeline
                .run(&tickers, client.as_ref(), &destination, !no_retry)
                .await?;
            println!("{}", serde_json::to_string_pretty(&report)?);

            if report.stats.all_failed() {
                bail!("all {} tickers failed", report.stats.attempted);
            }
        }
        Command::ScrapeTickers { url, output } => {
            let tickers = ticker_list::fetch_ticker_table(&session, &url).await?;
            ticker_list::write_ticker_csv(&output, &tickers)?;
            info!(output = %output.display(), tickers = tickers.len(), "ticker csv written");
        }
    }

    Ok(())
}
