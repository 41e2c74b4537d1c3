//! # mailhaul-mrp
//!
//! A client library for MRP, a line-oriented mail-retrieval protocol with
//! in-band negotiable session encryption.
//!
//! ## Features
//!
//! - **Encrypted session transport**: every CRLF-delimited line runs
//!   through the negotiated cipher (`PLAIN`, `AES/ECB`, `AES/CBC`,
//!   `DES/ECB`, `DES/CBC`); the mode switches mid-stream on `AUTH`
//!   without disturbing framing
//! - **Command/response state machine**: single-line, multi-line block,
//!   and error responses consumed exactly per command kind, including the
//!   `OK FETCH` terminator sentinel
//! - **Typed message records**: FETCH blocks split on record markers and
//!   parsed into [`Message`] values
//! - **Injected rendering**: the dispatcher reports through a
//!   [`ResponseHandler`], never to stdout, so the state machine tests in
//!   isolation from any console
//!
//! ## Quick Start
//!
//! ```ignore
//! use mailhaul_mrp::{CommandDispatcher, Config, Flow, ResponseHandler, connection};
//!
//! struct Printer;
//!
//! impl ResponseHandler for Printer {
//!     fn on_response(&mut self, line: &str) {
//!         println!("{line}");
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> mailhaul_mrp::Result<()> {
//!     let config = Config::new("localhost", 5000, b"0123456789abcdef".to_vec())?;
//!     let session = connection::open_session(&config).await?;
//!     let mut dispatcher = CommandDispatcher::new(session, Printer);
//!
//!     if dispatcher.check_greeting().await? {
//!         while let Flow::Continue = dispatcher.dispatch("FETCH 1:10").await? {
//!             break; // feed real user input here
//!         }
//!     }
//!     dispatcher.quit().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Negotiation ordering
//!
//! The one invariant everything hangs on: the `AUTH` announcement travels
//! under the *old* mode, the acknowledgment and everything after under
//! the *new* one.
//!
//! ```text
//! client                                server
//!   │  AUTH AES/CBC  (old cipher)  ──────▶│
//!   │  ── select_encryption_mode ──       │ ── switch ──
//!   │◀──────  OK AUTH  (new cipher)       │
//! ```
//!
//! ## Modules
//!
//! - [`cipher`]: encryption modes and the derived line transforms
//! - [`command`]: command classification
//! - [`connection`]: config, framing, and the encrypted session
//! - [`dispatch`]: the protocol state machine
//! - [`parser`]: FETCH block and message-record parsing
//! - [`protocol`]: the response-line grammar

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod cipher;
pub mod command;
pub mod connection;
pub mod dispatch;
mod error;
pub mod parser;
pub mod protocol;

pub use cipher::{EncryptionMode, LineCipher};
pub use command::Command;
pub use connection::{Config, FramedStream, Session};
pub use dispatch::{CommandDispatcher, Flow, ResponseHandler};
pub use error::{Error, Result};
pub use parser::{Message, parse_messages};
pub use protocol::ResponseKind;
