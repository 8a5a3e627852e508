//! # Tide Calendar Entry Point
//!
//! Command-line wrapper around the library: loads the existing calendar file,
//! runs one synchronisation against the chosen event source and rewrites the
//! file with the merged result.
//!
//! ```text
//! tide-calendar --provider tides --days 30 --out tides.ics
//! ```

// Test modules
#[cfg(test)]
mod tests;

use anyhow::Context;
use chrono::Utc;
use clap::{ArgAction, Parser, ValueHint};
use std::path::PathBuf;
use std::process::ExitCode;
use tide_calendar::config::{Config, CONFIG_FILE};
use tide_calendar::logging::{init_logging, LoggingDestination};
use tide_calendar::provider::load_provider;
use tide_calendar::{ics, sync};
use tracing::{error, info};

/// Upper bound for `--days`, ten years ahead.
pub const MAX_DAYS: i64 = 3650;

/// Keep an iCalendar file of tide times up to date.
#[derive(Parser, Debug, Clone)]
#[command(name = "tide-calendar", version, about, long_about = None)]
pub struct Cli {
    /// Event source: tides, stormglass or dummy.
    #[arg(short, long, default_value = "dummy")]
    pub provider: String,

    /// Minimum number of days to fetch.
    #[arg(short, long, default_value_t = 7, value_parser = clap::value_parser!(i64).range(0..=MAX_DAYS))]
    pub days: i64,

    /// Calendar file to update (defaults to <provider>.ics).
    #[arg(short, long, value_hint = ValueHint::FilePath)]
    pub out: Option<PathBuf>,

    /// Discard existing events instead of merging into them.
    #[arg(long, action = ArgAction::SetTrue)]
    pub nuke: bool,

    /// Configuration file.
    #[arg(short, long, default_value = CONFIG_FILE, value_hint = ValueHint::FilePath)]
    pub config: PathBuf,
}

impl Cli {
    pub fn out_path(&self) -> PathBuf {
        self.out
            .clone()
            .unwrap_or_else(|| PathBuf::from(format!("{}.ics", self.provider)))
    }
}

/// What a run changed.
#[derive(Debug)]
pub struct RunSummary {
    pub added: usize,
    pub total: usize,
    pub out: PathBuf,
}

/// Load, synchronise and save one calendar.
pub async fn run(cli: &Cli, config: &Config) -> anyhow::Result<RunSummary> {
    let out = cli.out_path();
    let provider = load_provider(&cli.provider, config);

    let existing = ics::load_calendar(&out);
    info!(path = %out.display(), existing = existing.len(), provider = %cli.provider, "Loaded existing calendar");

    let outcome = sync::synchronize(&provider, &existing, cli.days, Utc::now(), cli.nuke)
        .await
        .with_context(|| format!("fetching events from provider {:?}", cli.provider))?;

    ics::save_calendar(
        &out,
        &outcome.events,
        provider.time_zone(),
        Some(cli.provider.as_str()),
    )
    .with_context(|| format!("writing {}", out.display()))?;

    Ok(RunSummary {
        added: outcome.added,
        total: outcome.events.len(),
        out,
    })
}

/// Main application entry point.
fn main() -> ExitCode {
    let cli = Cli::parse();

    // Logging is best-effort; the calendar still gets written without it
    if let Err(err) = init_logging(LoggingDestination::FileAndStderr) {
        eprintln!("Logging disabled: {err}");
    }

    let config = Config::load_from_path(&cli.config);

    let result = tokio::runtime::Runtime::new()
        .context("starting async runtime")
        .and_then(|rt| rt.block_on(run(&cli, &config)));

    match result {
        Ok(summary) => {
            info!(added = summary.added, total = summary.total, "Calendar updated");
            println!(
                "📅  added {} new events → {}",
                summary.added,
                summary.out.display()
            );
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!(error = %format!("{err:#}"), "Calendar generation failed");
            eprintln!("❌ Failed to generate calendar: {err:#}");
            ExitCode::FAILURE
        }
    }
}
