//! gpustat CLI
//!
//! Command-line reports over GPU scheduler snapshot partitions.

mod commands;

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// gpustat - GPU slot classification and utilization statistics
#[derive(Parser, Debug)]
#[command(name = "gpustat")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Directory holding gpu_state_YYYY-MM.db partitions
    #[arg(long, default_value = ".", global = true)]
    data_dir: PathBuf,

    /// Analysis configuration file (exclusions, device mappings, tiers)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Emit JSON instead of tables
    #[arg(long, global = true)]
    json: bool,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Time range and slot filters shared by every report.
#[derive(Args, Debug)]
struct RangeArgs {
    /// Hours of history to analyze, ending at --end-time
    #[arg(long, default_value_t = 24)]
    hours_back: u32,

    /// End of the range, "YYYY-MM-DD HH:MM:SS" (defaults to the newest
    /// snapshot on disk)
    #[arg(long)]
    end_time: Option<String>,

    /// Only slots whose name contains this substring
    #[arg(long)]
    host: Option<String>,

    /// Aggregation bucket width in minutes
    #[arg(long, default_value_t = 15)]
    bucket_minutes: u32,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Per-category allocation summary
    Summary {
        #[command(flatten)]
        range: RangeArgs,
    },

    /// Per-device summary with cluster grand totals
    Devices {
        #[command(flatten)]
        range: RangeArgs,

        /// Include legacy device models hidden by default
        #[arg(long)]
        all_devices: bool,
    },

    /// Memory-tier summary for real slots
    Tiers {
        #[command(flatten)]
        range: RangeArgs,
    },

    /// Per-bucket utilization rows
    Timeseries {
        #[command(flatten)]
        range: RangeArgs,
    },

    /// Per-user GPU-hour breakdown
    Users {
        #[command(flatten)]
        range: RangeArgs,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::WARN
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);

    let ctx = commands::Context::load(cli.data_dir, cli.config.as_deref(), cli.json)?;

    match cli.command {
        Commands::Summary { range } => commands::summary(&ctx, &range)?,
        Commands::Devices { range, all_devices } => commands::devices(&ctx, &range, all_devices)?,
        Commands::Tiers { range } => commands::tiers(&ctx, &range)?,
        Commands::Timeseries { range } => commands::timeseries(&ctx, &range)?,
        Commands::Users { range } => commands::users(&ctx, &range)?,
    }

    Ok(())
}
