//! Command implementations for the allocation CLI.
//!
//! Provides subcommands that load a directory of CSV tables and write
//! allocation and usage series as CSV.

use clap::Subcommand;
use std::path::PathBuf;

pub mod config;
pub mod output;
pub mod series;

#[derive(Subcommand)]
pub enum Command {
    /// Allocation per consent block
    AlloTs {
        /// Directory holding `<table>.csv` or `<table>.csv.gz` files
        #[arg(short = 'd', long)]
        data_dir: PathBuf,

        /// First day of the horizon (YYYY-MM-DD)
        #[arg(long)]
        from: Option<String>,

        /// Last day of the horizon (YYYY-MM-DD)
        #[arg(long)]
        to: Option<String>,

        /// Frequency code: D, W, M, A or A-XXX
        #[arg(short = 'f', long, default_value = "A-JUN")]
        freq: String,

        /// Restriction type: max rate, daily volume or annual volume
        #[arg(short = 'r', long, default_value = "annual volume")]
        restriction: String,

        /// Keep buckets outside each consent's active months
        #[arg(long)]
        keep_inactive_months: bool,

        /// Include takes not counted in the allocation
        #[arg(long)]
        include_non_allocated: bool,

        /// JSON run configuration
        #[arg(short = 'c', long)]
        config: Option<PathBuf>,

        /// Output CSV path, or - for stdout
        #[arg(short = 'o', long, default_value = "-")]
        output: String,
    },

    /// Allocation, restriction and usage datasets grouped by columns
    UsageTs {
        /// Directory holding `<table>.csv` or `<table>.csv.gz` files
        #[arg(short = 'd', long)]
        data_dir: PathBuf,

        /// First day of the horizon (YYYY-MM-DD)
        #[arg(long)]
        from: Option<String>,

        /// Last day of the horizon (YYYY-MM-DD)
        #[arg(long)]
        to: Option<String>,

        /// Frequency code: D, W, M, A or A-XXX
        #[arg(short = 'f', long, default_value = "M")]
        freq: String,

        /// Comma separated dataset names
        #[arg(long)]
        datasets: Option<String>,

        /// Comma separated group-by columns
        #[arg(short = 'g', long)]
        group_by: Option<String>,

        /// Stream depletion days: 7, 30 or 150
        #[arg(long)]
        sd_days: Option<u32>,

        /// Only keep October to April
        #[arg(long)]
        irrigation_season: bool,

        /// Usage above this multiple of allocation is dropped
        #[arg(long)]
        usage_ratio: Option<f64>,

        /// Metered allocation mode: proportional or any-point-present
        #[arg(long)]
        metered_mode: Option<String>,

        /// JSON run configuration
        #[arg(short = 'c', long)]
        config: Option<PathBuf>,

        /// Output CSV path, or - for stdout
        #[arg(short = 'o', long, default_value = "-")]
        output: String,
    },
}

pub fn run(command: Command) -> anyhow::Result<()> {
    match command {
        Command::AlloTs {
            data_dir,
            from,
            to,
            freq,
            restriction,
            keep_inactive_months,
            include_non_allocated,
            config,
            output,
        } => {
            let args = series::AlloTsArgs {
                from,
                to,
                freq,
                restriction,
                keep_inactive_months,
                include_non_allocated,
            };
            series::run_allo_ts(&data_dir, config.as_deref(), &args, &output)
        }
        Command::UsageTs {
            data_dir,
            from,
            to,
            freq,
            datasets,
            group_by,
            sd_days,
            irrigation_season,
            usage_ratio,
            metered_mode,
            config,
            output,
        } => {
            let args = series::UsageTsArgs {
                from,
                to,
                freq,
                datasets,
                group_by,
                sd_days,
                irrigation_season,
                usage_ratio,
                metered_mode,
            };
            series::run_usage_ts(&data_dir, config.as_deref(), &args, &output)
        }
    }
}
