//! MRP connection management.
//!
//! This module provides connection handling for MRP servers, including:
//! - Configuration (host, port, pre-shared key)
//! - Framed I/O for the CRLF line protocol
//! - The encrypted session transport

mod config;
mod framed;
mod session;

pub use config::{Config, PORT_MAX, PORT_MIN, port_in_range};
pub use framed::FramedStream;
pub(crate) use framed::LINE_TERMINATOR;
pub use session::Session;

use std::io;

use tokio::net::TcpStream;

use crate::{Error, Result};

/// Opens the TCP stream described by `config`, honoring its connect
/// timeout.
///
/// # Errors
///
/// [`Error::Io`] if the host is unreachable or the timeout elapses.
pub async fn connect(config: &Config) -> Result<TcpStream> {
    let address = config.address();
    tracing::debug!(%address, "connecting");
    tokio::time::timeout(config.connect_timeout, TcpStream::connect(&address))
        .await
        .map_err(|_| {
            Error::Io(io::Error::new(
                io::ErrorKind::TimedOut,
                format!("connect to {address} timed out"),
            ))
        })?
        .map_err(Error::Io)
}

/// Connects and wraps the stream in a [`Session`] carrying the config's
/// pre-shared key.
///
/// # Errors
///
/// As [`connect`].
pub async fn open_session(config: &Config) -> Result<Session<TcpStream>> {
    let stream = connect(config).await?;
    Ok(Session::new(stream, config.key.clone()))
}
