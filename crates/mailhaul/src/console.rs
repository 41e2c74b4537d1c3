//! Console input and rendering.
//!
//! The dispatcher never touches stdout itself; [`Renderer`] is the
//! injected [`ResponseHandler`] that prints what it reports. [`Console`]
//! wraps stdin as an async line source for the prompts and the command
//! loop.

use std::io::Write as _;

use anyhow::{Context as _, Result};
use tokio::io::{AsyncBufReadExt, BufReader, Stdin};

use mailhaul_mrp::connection::{PORT_MAX, PORT_MIN, port_in_range};
use mailhaul_mrp::{Message, ResponseHandler};

/// Prints the startup banner.
pub fn print_banner() {
    println!();
    println!("+----------------------------------------+");
    println!("|  mailhaul - MRP mail retrieval client  |");
    println!("+----------------------------------------+");
    println!();
}

/// Async line-oriented access to the user's terminal.
pub struct Console {
    reader: BufReader<Stdin>,
}

impl Console {
    /// Wraps stdin.
    #[must_use]
    pub fn new() -> Self {
        Self {
            reader: BufReader::new(tokio::io::stdin()),
        }
    }

    /// Reads one line; `None` once stdin is closed.
    async fn read_line(&mut self) -> Result<Option<String>> {
        let mut line = String::new();
        let n = self
            .reader
            .read_line(&mut line)
            .await
            .context("reading from stdin")?;
        if n == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim_end_matches(['\r', '\n']).to_owned()))
    }

    /// Asks for the server port until a number in the open range
    /// 2048–65535 is given.
    pub async fn ask_port(&mut self) -> Result<u16> {
        loop {
            println!("Please enter port number:");
            let input = self
                .read_line()
                .await?
                .context("stdin closed while asking for a port")?;

            match input.trim().parse::<u16>() {
                Ok(port) if port_in_range(port) => return Ok(port),
                Ok(_) => {
                    println!("Port number must be between {PORT_MIN} and {PORT_MAX}.");
                }
                Err(_) => {
                    println!("\"{}\" is not a valid port number.", input.trim());
                    println!("Port must be a number!");
                }
            }
        }
    }

    /// Asks whether output should be verbose; defaults to yes.
    pub async fn ask_verbose(&mut self) -> Result<bool> {
        println!("Do you want messages to be verbose? (y or n, default = y):");
        let input = self.read_line().await?.unwrap_or_default();

        if input.trim().eq_ignore_ascii_case("n") {
            println!("Verbose is disabled.");
            Ok(false)
        } else if input.trim().eq_ignore_ascii_case("y") {
            println!("Verbose is enabled.");
            Ok(true)
        } else {
            println!("Sorry, wrong answer, verbose is enabled.");
            Ok(true)
        }
    }

    /// Prompts for the next command; `None` once stdin is closed.
    pub async fn prompt_command(&mut self) -> Result<Option<String>> {
        println!("Please enter command:");
        print!("--> ");
        std::io::stdout().flush().context("flushing the prompt")?;
        self.read_line().await
    }
}

impl Default for Console {
    fn default() -> Self {
        Self::new()
    }
}

/// Prints everything the dispatcher reports.
pub struct Renderer;

impl ResponseHandler for Renderer {
    fn on_response(&mut self, line: &str) {
        println!("{line}");
    }

    fn on_messages(&mut self, messages: &[Message]) {
        println!("Number of messages: {}", messages.len());
        for message in messages {
            println!("///////////////// BEGIN MAIL /////////////////");
            print!("{message}");
            println!("///////////////// END MAIL /////////////////");
        }
    }

    fn on_local_error(&mut self, text: &str) {
        println!("{text}");
    }
}
