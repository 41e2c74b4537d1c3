//! mailhaul - interactive console client for MRP mail-retrieval servers.
//!
//! Prompts for a port and a verbosity choice, connects, runs the greeting
//! check, then feeds user commands through the protocol dispatcher until
//! QUIT, stdin EOF, Ctrl-C, or a transport failure. Every exit path runs
//! the termination sequence best-effort.

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod console;
mod logging;

use anyhow::Result;
use tracing::{error, info, warn};

use mailhaul_mrp::{CommandDispatcher, Config, Flow, connection};

use console::{Console, Renderer};

/// The server host this client talks to.
const HOST: &str = "localhost";

/// Pre-shared session key agreed with the server; AES modes use all 16
/// bytes, DES modes the leading 8.
const PRESHARED_KEY: &[u8] = b"0123456789abcdef";

#[tokio::main]
async fn main() -> Result<()> {
    console::print_banner();

    let mut console = Console::new();
    let port = console.ask_port().await?;
    let verbose = console.ask_verbose().await?;

    logging::init(verbose);
    info!(port, "starting mailhaul");

    let config = Config::new(HOST, port, PRESHARED_KEY)?;
    let session = match connection::open_session(&config).await {
        Ok(session) => session,
        Err(err) => {
            error!(%err, "connection failed");
            println!("\nCould not reach {}: {err}", config.address());
            println!("Program terminated ...");
            return Ok(());
        }
    };

    let mut dispatcher = CommandDispatcher::new(session, Renderer);

    if let Err(err) = run(&mut dispatcher, &mut console).await {
        error!(%err, "command loop failed");
        println!("\n{err}");
        println!("Program has been terminated ...");
    }

    // Termination sequence, best-effort on every exit path.
    if let Err(err) = dispatcher.quit().await {
        warn!(%err, "termination sequence failed");
    }
    println!("Client terminated");
    Ok(())
}

/// The interactive command loop.
///
/// Returns when the user quits, stdin closes, or Ctrl-C interrupts; the
/// caller runs the termination sequence.
async fn run(
    dispatcher: &mut CommandDispatcher<tokio::net::TcpStream, Renderer>,
    console: &mut Console,
) -> Result<()> {
    if !dispatcher.check_greeting().await? {
        warn!("server greeting was not OK, abandoning session");
        return Ok(());
    }

    loop {
        let line = tokio::select! {
            line = console.prompt_command() => line?,
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted");
                return Ok(());
            }
        };
        let Some(line) = line else {
            info!("stdin closed");
            return Ok(());
        };
        if line.trim().is_empty() {
            continue;
        }

        let flow = tokio::select! {
            flow = dispatcher.dispatch(&line) => flow?,
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted mid-command");
                return Ok(());
            }
        };
        if flow == Flow::Quit {
            return Ok(());
        }
    }
}
