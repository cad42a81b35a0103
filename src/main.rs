mod cli;
mod execute;

use clap::Parser;
use anyhow::Result;
use crate::cli::CLI;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = CLI::parse();
    execute::execute(cli)
}
