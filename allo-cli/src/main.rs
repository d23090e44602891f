//! allo-cli - Command line tool for consent allocation and usage series.

use clap::Parser;

#[derive(Parser)]
#[command(
    name = "allo-cli",
    version,
    about = "Water take allocation and usage toolkit"
)]
struct Cli {
    #[command(subcommand)]
    command: allo_cmd::Command,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    log::debug!("allo-cli {}", env!("CARGO_PKG_VERSION"));
    allo_cmd::run(cli.command)
}
