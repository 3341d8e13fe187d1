mod app;
mod cli;
mod config;
mod demo;
mod input;
mod view;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::app::RunOptions;
use crate::cli::Cli;
use crate::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_deref())?;
    config.apply_args(&cli);

    // Logs share stderr with the status lines; stdout carries samples only.
    let filter = if cli.quiet {
        EnvFilter::new("warn")
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let no_color = std::env::var_os("NO_COLOR").is_some();

    app::run(RunOptions {
        demo: cli.demo,
        quiet: cli.quiet,
        no_color,
        config,
    })
    .await
}
