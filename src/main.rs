//! Card Scanner - command line front end
//!
//! Checks card numbers, runs the OCR filters over typed-in lines and replays
//! scripted capture sessions through the full scanning pipeline.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use card_scanner::analysis::{self, luhn, ExtractionResult, ReportReconciler};
use card_scanner::config::{load_config, save_config, AppConfig};
use card_scanner::storage::default_config_path;
use card_scanner::vision::{Adapters, RecognizedLine, ScanScript, ScriptedBackend};
use card_scanner::{CardScannerApp, ExtractionReport, ScanMessage};

/// How long a replay waits for extractions still running after the last frame
const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Card Scanner - payment card number and expiration reader
#[derive(Parser, Debug)]
#[command(name = "card-scanner")]
#[command(about = "Reads payment card numbers and expiration dates from camera frames")]
struct Args {
    /// Configuration file (defaults to the per-user config location)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check a 16-digit card number against its check digit
    Luhn {
        digits: String,
    },
    /// Run the card number and expiration filters over OCR lines
    Extract {
        /// One argument per line; `|` separates ranked candidates
        #[arg(required = true)]
        lines: Vec<String>,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Replay a scripted capture session through the scanner
    Replay {
        script: PathBuf,

        /// Feed frames at the configured frame rate, dropping late ones
        #[arg(long)]
        realtime: bool,

        /// Print messages and the summary as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the effective configuration
    Config {
        /// Write the default configuration to the config path
        #[arg(long)]
        init: bool,
    },
}

fn main() -> Result<ExitCode> {
    // Initialize logging; stdout is reserved for command output
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = Args::parse();

    match args.command {
        Command::Luhn { digits } => Ok(run_luhn(&digits)),
        Command::Extract { lines, json } => run_extract(&args.config, &lines, json),
        Command::Replay {
            script,
            realtime,
            json,
        } => run_replay(&args.config, &script, realtime, json),
        Command::Config { init } => run_config(&args.config, init),
    }
}

/// Load the config from `path`, or from the default location when it exists
fn resolve_config(path: &Option<PathBuf>) -> Result<AppConfig> {
    if let Some(path) = path {
        return load_config(path);
    }

    let default_path = default_config_path()?;
    if default_path.exists() {
        info!("Loading config from {:?}", default_path);
        load_config(&default_path)
    } else {
        Ok(AppConfig::default())
    }
}

fn run_luhn(digits: &str) -> ExitCode {
    if luhn::is_valid(digits) {
        println!("valid");
        ExitCode::SUCCESS
    } else {
        println!("invalid");
        ExitCode::FAILURE
    }
}

fn run_extract(config: &Option<PathBuf>, lines: &[String], json: bool) -> Result<ExitCode> {
    let config = resolve_config(config)?;
    let top_n = config.recognition.max_candidates;

    let recognized: Vec<RecognizedLine> = lines
        .iter()
        .map(|line| RecognizedLine::from_ranked(line.split('|')))
        .collect();

    let result = ExtractionResult {
        card_number: analysis::extract_card_number_with(&recognized, top_n),
        expiration: analysis::extract_expiration_with(&recognized, top_n),
    };

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "card_number": result.card_number,
                "expiration": result.expiration,
                "checksum_valid": result.has_valid_card_number(),
            }))?
        );
    } else {
        print_result(&result);
    }

    Ok(if result.is_empty() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

fn print_result(result: &ExtractionResult) {
    match &result.card_number {
        Some(number) => println!(
            "card number: {} ({})",
            number,
            if luhn::is_valid(number) {
                "checksum ok"
            } else {
                "checksum mismatch"
            }
        ),
        None => println!("card number: -"),
    }
    println!("expiration:  {}", result.expiration.as_deref().unwrap_or("-"));
}

fn run_replay(
    config: &Option<PathBuf>,
    script_path: &Path,
    realtime: bool,
    json: bool,
) -> Result<ExitCode> {
    let mut config = resolve_config(config)?;
    let script = ScanScript::load(script_path)?;
    if !realtime {
        // Offline replays read every tracked frame
        config.extraction.max_in_flight = config.extraction.max_in_flight.max(script.len());
    }
    info!(
        "Replaying {} frames from {:?}{}",
        script.len(),
        script_path,
        if realtime { " in real time" } else { "" }
    );

    let backend = Arc::new(ScriptedBackend::from_script(script.clone()));
    let app = CardScannerApp::start(&config, Adapters::from_backend(backend))
        .context("Failed to start scanner")?;

    let frame_interval = Duration::from_secs_f64(1.0 / f64::from(config.capture.max_fps));
    for index in 0..script.len() {
        let frame = script.frame(index)?;
        if realtime {
            app.submit(frame);
            std::thread::sleep(frame_interval);
        } else {
            app.submit_blocking(frame)?;
        }
    }

    let (messages, stats) = app.finish(DRAIN_TIMEOUT);

    // Reports arrive in completion order; reconcile them in frame order
    let mut reports: Vec<&ExtractionReport> = messages
        .iter()
        .filter_map(|m| match m {
            ScanMessage::Extracted(report) => Some(report),
            _ => None,
        })
        .collect();
    reports.sort_by_key(|r| r.frame_sequence);

    let mut reconciler = ReportReconciler::new(config.reporting.clone());
    for report in &reports {
        reconciler.observe(&report.result);
    }
    let confirmed = reconciler.confirmed().cloned();

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "messages": messages,
                "confirmed": confirmed,
                "stats": stats,
            }))?
        );
    } else {
        for message in &messages {
            match message {
                ScanMessage::PhaseChanged {
                    frame_sequence,
                    phase,
                } => println!("frame {:>4}: {}", frame_sequence, phase),
                ScanMessage::Extracted(report) => println!(
                    "frame {:>4}: read number={} expiration={}",
                    report.frame_sequence,
                    report.result.card_number.as_deref().unwrap_or("-"),
                    report.result.expiration.as_deref().unwrap_or("-")
                ),
                ScanMessage::Stopped => {}
            }
        }

        println!();
        match &confirmed {
            Some(card) => {
                println!(
                    "confirmed: {} ({} votes, checksum {})",
                    card.card_number,
                    card.votes,
                    if card.checksum_valid { "ok" } else { "mismatch" }
                );
                println!("expiration: {}", card.expiration.as_deref().unwrap_or("-"));
            }
            None => println!("no card confirmed from {} reports", reconciler.reports_seen()),
        }
        println!(
            "frames: {} received, {} dropped ({:.1}%), {} processed; {} located, {} lost; extractions: {} dispatched, {} skipped",
            stats.frames_received,
            stats.frames_dropped,
            stats.drop_rate() * 100.0,
            stats.frames_processed,
            stats.cards_located,
            stats.cards_lost,
            stats.extractions_dispatched,
            stats.extractions_skipped
        );
    }

    Ok(if confirmed.is_some() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn run_config(path: &Option<PathBuf>, init: bool) -> Result<ExitCode> {
    if init {
        let target = match path {
            Some(path) => path.clone(),
            None => default_config_path()?,
        };
        anyhow::ensure!(
            !target.exists(),
            "Config already exists at {:?}",
            target
        );
        save_config(&AppConfig::default(), &target)?;
        println!("Wrote default configuration to {}", target.display());
        return Ok(ExitCode::SUCCESS);
    }

    let config = resolve_config(path)?;
    print!("{}", toml::to_string_pretty(&config)?);
    Ok(ExitCode::SUCCESS)
}
