use bmi_core::*;
use chrono::{Local, NaiveDateTime};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

const CHART_WIDTH: usize = 30;

#[derive(Parser)]
#[command(name = "bmi")]
#[command(about = "BMI calculator with per-user history", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Override data directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Use this config file instead of the default location
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Calculate BMI and add it to the user's history
    Record {
        /// Username
        #[arg(long, short)]
        user: String,

        /// Weight in kilograms
        #[arg(long, short, allow_hyphen_values = true)]
        weight: String,

        /// Height in centimeters
        #[arg(long = "height", short = 'H', allow_hyphen_values = true)]
        height: String,

        /// Measurement time as "YYYY-MM-DD HH:MM:SS" (defaults to now)
        #[arg(long)]
        at: Option<String>,
    },

    /// Show the most recent measurements, newest first
    History {
        #[arg(long, short)]
        user: String,

        /// Number of records to show
        #[arg(long, short)]
        limit: Option<usize>,
    },

    /// Show the BMI trend over time
    Trend {
        #[arg(long, short)]
        user: String,
    },

    /// List users with recorded history
    Users,

    /// Export a user's full history as CSV
    Export {
        #[arg(long, short)]
        user: String,

        /// Output file
        #[arg(long, short)]
        out: PathBuf,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if cli.verbose {
        bmi_core::logging::init_with_level("debug");
    } else {
        bmi_core::logging::init();
    }

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    let data_dir = cli.data_dir.unwrap_or_else(|| config.data.data_dir.clone());
    let service = config.history_service(&data_dir);

    // A missing store is recreated empty; failure here is not fatal since
    // reads fall back to an empty store anyway
    if let Err(e) = service.store().init() {
        tracing::warn!("Could not initialize store: {}", e);
    }

    match cli.command {
        Commands::Record {
            user,
            weight,
            height,
            at,
        } => cmd_record(&service, &config, &user, &weight, &height, at.as_deref()),
        Commands::History { user, limit } => {
            let limit = limit.unwrap_or(config.history.recent_limit);
            cmd_history(&service, &user, limit);
            Ok(())
        }
        Commands::Trend { user } => {
            cmd_trend(&service, &user);
            Ok(())
        }
        Commands::Users => {
            cmd_users(&service);
            Ok(())
        }
        Commands::Export { user, out } => cmd_export(&service, &user, &out),
    }
}

fn cmd_record(
    service: &HistoryService,
    config: &Config,
    user: &str,
    weight: &str,
    height: &str,
    at: Option<&str>,
) -> Result<()> {
    let weight_kg = parse_quantity("weight", weight)?;
    let height_cm = parse_quantity("height", height)?;
    let now = match at {
        Some(raw) => parse_timestamp(raw)?,
        None => Local::now().naive_local(),
    };

    match service.record_measurement(user, weight_kg, height_cm, now) {
        Ok(record) => display_result(&record),
        Err(Error::NotPersisted { record, source }) => {
            display_result(&record);
            eprintln!("Warning: result was not saved ({})", source);
            return Ok(());
        }
        Err(e) => return Err(e),
    }

    println!();
    cmd_history(service, user, config.history.recent_limit);
    Ok(())
}

fn cmd_history(service: &HistoryService, user: &str, limit: usize) {
    println!("Recent History");

    let records = service.recent_history(user, limit);
    if records.is_empty() {
        println!("Your BMI history will appear here");
        return;
    }

    for record in &records {
        println!("{}", history_line(record));
    }
}

fn cmd_trend(service: &HistoryService, user: &str) {
    let series = service.trend_series(user);
    if series.is_empty() {
        println!("At least {} data points needed for trend", MIN_TREND_POINTS);
        return;
    }

    println!("BMI Trend Over Time");
    for (point, bar) in series.iter().zip(trend_bars(&series)) {
        println!(
            "  {}  {:>5.1}  {}",
            point.timestamp.format(DATE_FORMAT),
            point.bmi,
            bar
        );
    }
}

fn cmd_users(service: &HistoryService) {
    let users = service.users();
    if users.is_empty() {
        println!("No users recorded yet");
        return;
    }
    for user in users {
        println!("{}", user);
    }
}

fn cmd_export(service: &HistoryService, user: &str, out: &std::path::Path) -> Result<()> {
    let user = UserId::new(user)?;
    let count = export_user_csv(service, user.as_str(), out)?;
    println!("✓ Exported {} records to {}", count, out.display());
    Ok(())
}

fn display_result(record: &MeasurementRecord) {
    println!("Your BMI: {:.1}", record.bmi());
    println!("Category: {}", record.category());
}

fn history_line(record: &MeasurementRecord) -> String {
    format!(
        "{} | {:.1} ({})",
        record.timestamp().format("%b %d, %H:%M"),
        record.bmi(),
        record.category()
    )
}

/// One bar per point, scaled between the series minimum and maximum
fn trend_bars(series: &[TrendPoint]) -> Vec<String> {
    let min = series.iter().map(|p| p.bmi).fold(f64::INFINITY, f64::min);
    let max = series.iter().map(|p| p.bmi).fold(f64::NEG_INFINITY, f64::max);
    let span = max - min;

    series
        .iter()
        .map(|p| {
            let len = if span > 0.0 {
                1 + ((p.bmi - min) / span * (CHART_WIDTH - 1) as f64).round() as usize
            } else {
                CHART_WIDTH / 2
            };
            "█".repeat(len)
        })
        .collect()
}

fn parse_timestamp(raw: &str) -> Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw.trim(), DATE_FORMAT).map_err(|_| {
        Error::invalid_input(format!(
            "Invalid time {:?}, expected YYYY-MM-DD HH:MM:SS",
            raw
        ))
    })
}
