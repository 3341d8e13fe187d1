//! Running session: wires the backend, the terminal view and stdin together.

use anyhow::{Context, Result};
use hrmon_core::{BtleplugBluetooth, Intent, Session};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info};

use crate::config::Config;
use crate::demo;
use crate::input::InputCommand;
use crate::view::TerminalView;

/// Options resolved from the command line and config file.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub demo: bool,
    pub quiet: bool,
    pub no_color: bool,
    pub config: Config,
}

pub async fn run(options: RunOptions) -> Result<()> {
    let RunOptions {
        demo,
        quiet,
        no_color,
        config,
    } = options;

    let view = TerminalView::new(config.json, no_color || config.json);
    let actor_config = config.actor_config();

    let session = if demo {
        info!("Running with a simulated sensor");
        let bluetooth = demo::demo_bluetooth();
        let session = Session::spawn(bluetooth.clone(), view, actor_config)
            .context("Failed to start session")?;
        demo::spawn_frame_generator(bluetooth, session.cancellation_token());
        session
    } else {
        let bluetooth = BtleplugBluetooth::with_options(config.scan_options());
        Session::spawn(bluetooth, view, actor_config).context("Failed to start session")?
    };

    if !quiet {
        eprintln!("Enter: press the button   d: disconnect   q: quit");
    }

    drive(&session).await?;
    session.shutdown().await;
    Ok(())
}

/// Relay stdin to the session until quit, Ctrl-C or end of input.
async fn drive(session: &Session) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let line = tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                eprintln!("\nShutting down...");
                return Ok(());
            }
            line = lines.next_line() => line.context("Failed to read stdin")?,
        };

        let Some(line) = line else {
            debug!("stdin closed");
            return Ok(());
        };

        match InputCommand::parse(&line) {
            Some(InputCommand::Press) => {
                session.press();
            }
            Some(InputCommand::Disconnect) => {
                session.submit(Intent::Disconnect);
            }
            Some(InputCommand::Quit) => return Ok(()),
            None => eprintln!("Unknown command '{}'. Enter, d or q.", line.trim()),
        }
    }
}
