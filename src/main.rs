use anyhow::Result;
use clap::Parser;
use env_logger::Env;

use pose_estimator::cli::{self, Cli};

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(default_filter)).init();

    cli::run(cli)
}
