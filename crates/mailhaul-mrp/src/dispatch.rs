//! Command dispatch and response aggregation.
//!
//! The dispatcher drives one half-duplex exchange at a time: classify the
//! command, write it, consume exactly the response shape the protocol
//! defines for it. Rendering is injected through [`ResponseHandler`], so
//! the state machine can be tested without a console (and the console
//! binary stays a thin shell).

use tokio::io::{AsyncRead, AsyncWrite};

use crate::cipher::EncryptionMode;
use crate::command::Command;
use crate::connection::{LINE_TERMINATOR, Session};
use crate::parser::{Message, parse_messages};
use crate::protocol::{ResponseKind, is_fetch_terminator, is_quit_ack};
use crate::Result;

/// Receiver for everything the dispatcher wants shown to the user.
///
/// All methods default to no-ops so implementations pick what they care
/// about; the console client implements all three.
pub trait ResponseHandler {
    /// Called with each server response line to display.
    fn on_response(&mut self, line: &str) {
        let _ = line;
    }

    /// Called with the parsed records of a completed FETCH.
    fn on_messages(&mut self, messages: &[Message]) {
        let _ = messages;
    }

    /// Called for conditions reported locally, without server contact
    /// (malformed commands, failed cipher negotiation).
    fn on_local_error(&mut self, text: &str) {
        let _ = text;
    }
}

/// Whether the command loop should keep running after a dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Keep accepting commands.
    Continue,
    /// Leave the loop; the caller runs the termination sequence.
    Quit,
}

/// The command/response protocol state machine.
///
/// Owns the [`Session`] exclusively; one command is in flight at a time.
/// The message list holds the records of the most recent FETCH and is
/// cleared when the next FETCH starts.
pub struct CommandDispatcher<S, H> {
    session: Session<S>,
    handler: H,
    messages: Vec<Message>,
}

impl<S, H> CommandDispatcher<S, H>
where
    S: AsyncRead + AsyncWrite + Unpin,
    H: ResponseHandler,
{
    /// Creates a dispatcher over an established session.
    pub fn new(session: Session<S>, handler: H) -> Self {
        Self {
            session,
            handler,
            messages: Vec::new(),
        }
    }

    /// Performs the greeting check: one read, success iff the line is an
    /// `OK` line.
    ///
    /// On `false` the caller must skip the command loop and go straight
    /// to [`CommandDispatcher::quit`].
    ///
    /// # Errors
    ///
    /// Transport or cipher errors from the read.
    pub async fn check_greeting(&mut self) -> Result<bool> {
        let greeting = self.session.read_line().await?;
        self.handler.on_response(&greeting);
        Ok(ResponseKind::of(&greeting) == ResponseKind::Success)
    }

    /// Classifies and executes one command line.
    ///
    /// # Errors
    ///
    /// Transport or cipher errors; protocol-shape surprises are handled
    /// inline by reporting the raw line.
    pub async fn dispatch(&mut self, input: &str) -> Result<Flow> {
        match Command::classify(input) {
            Command::Auth(mode) => self.auth(mode).await?,
            Command::AuthPassthrough(raw) => self.auth_passthrough(&raw).await?,
            Command::AuthMalformed => self
                .handler
                .on_local_error("Wrong command: AUTH expects exactly one mode argument"),
            Command::Quit => return Ok(Flow::Quit),
            Command::Fetch(raw) => self.fetch(&raw).await?,
            Command::Other(raw) => self.generic(&raw).await?,
        }
        Ok(Flow::Continue)
    }

    /// Termination sequence: `QUIT`, one acknowledgment, close on a 2xx.
    ///
    /// Runs at most once — a closed session makes this a no-op — so every
    /// exit path (QUIT command, failed greeting, transport error) can
    /// call it unconditionally.
    ///
    /// # Errors
    ///
    /// Transport errors from the exchange; callers treat them as
    /// best-effort.
    pub async fn quit(&mut self) -> Result<()> {
        if self.session.is_closed() {
            return Ok(());
        }
        self.session.write_line("QUIT").await?;
        let ack = self.session.read_line().await?;
        self.handler.on_response(&ack);
        if is_quit_ack(&ack) {
            self.session.close().await?;
        }
        Ok(())
    }

    /// Records parsed by the most recent FETCH.
    #[must_use]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// The injected handler.
    pub const fn handler(&self) -> &H {
        &self.handler
    }

    /// AUTH with a recognized mode: announce under the old cipher, swap,
    /// then read two acknowledgment lines under the new one.
    ///
    /// The new cipher is derived *before* the announcement is written, so
    /// a key error reports locally and leaves both peers in the old mode.
    async fn auth(&mut self, mode: EncryptionMode) -> Result<()> {
        let cipher = match self.session.negotiate_cipher(mode) {
            Ok(cipher) => cipher,
            Err(error) => {
                tracing::warn!(%mode, %error, "cipher negotiation failed");
                self.handler.on_local_error(&format!("AUTH {mode} failed: {error}"));
                return Ok(());
            }
        };

        self.session.write_line(&format!("AUTH {mode}")).await?;
        self.session.activate_cipher(cipher);

        let first = self.session.read_line().await?;
        self.handler.on_response(&first);
        let second = self.session.read_line().await?;
        self.handler.on_response(&second);
        Ok(())
    }

    /// AUTH with an unrecognized mode token: forwarded verbatim, one
    /// response line, cipher untouched.
    async fn auth_passthrough(&mut self, raw: &str) -> Result<()> {
        self.session.write_line(raw).await?;
        let response = self.session.read_line().await?;
        self.handler.on_response(&response);
        Ok(())
    }

    /// FETCH: aggregate the block up to the `OK FETCH` terminator, parse
    /// it into records, and hand them over with a count.
    async fn fetch(&mut self, raw: &str) -> Result<()> {
        self.messages.clear();
        self.session.write_line(raw).await?;

        let first = self.session.read_line().await?;
        match ResponseKind::of(&first) {
            ResponseKind::MultiStart => {
                let block = self.read_fetch_block().await?;
                self.messages = parse_messages(&block);
                self.handler.on_messages(&self.messages);
            }
            _ => self.handler.on_response(&first),
        }
        Ok(())
    }

    /// Accumulates decrypted units until the FETCH terminator, which is
    /// consumed but excluded. Units are joined on line boundaries so a
    /// marker arriving as its own unit cannot glue onto the next unit's
    /// first field line.
    async fn read_fetch_block(&mut self) -> Result<String> {
        let mut block = String::new();
        loop {
            let unit = self.session.read_line().await?;
            if is_fetch_terminator(&unit) {
                return Ok(block);
            }
            block.push_str(&unit);
            if !unit.ends_with(LINE_TERMINATOR) {
                block.push_str(LINE_TERMINATOR);
            }
        }
    }

    /// Any other command: forwarded verbatim; a `*` response is followed
    /// line by line until the closing `OK`.
    async fn generic(&mut self, raw: &str) -> Result<()> {
        self.session.write_line(raw).await?;

        let first = self.session.read_line().await?;
        self.handler.on_response(&first);
        if ResponseKind::of(&first) == ResponseKind::MultiStart {
            loop {
                let line = self.session.read_line().await?;
                self.handler.on_response(&line);
                if ResponseKind::of(&line) == ResponseKind::Success {
                    return Ok(());
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};

    use super::*;
    use crate::cipher::LineCipher;

    const KEY: &[u8] = b"0123456789abcdef";

    /// Handler capturing everything for assertions.
    #[derive(Default)]
    struct Capture {
        lines: Vec<String>,
        locals: Vec<String>,
        batches: Vec<Vec<Message>>,
    }

    impl ResponseHandler for Capture {
        fn on_response(&mut self, line: &str) {
            self.lines.push(line.to_owned());
        }

        fn on_messages(&mut self, messages: &[Message]) {
            self.batches.push(messages.to_vec());
        }

        fn on_local_error(&mut self, text: &str) {
            self.locals.push(text.to_owned());
        }
    }

    /// A dispatcher over one duplex end, plus the raw peer end acting as
    /// the scripted server.
    fn harness() -> (CommandDispatcher<DuplexStream, Capture>, DuplexStream) {
        let (client, server) = tokio::io::duplex(16 * 1024);
        let session = Session::new(client, KEY);
        (CommandDispatcher::new(session, Capture::default()), server)
    }

    async fn script(server: &mut DuplexStream, lines: &[&str]) {
        for line in lines {
            server.write_all(line.as_bytes()).await.unwrap();
            server.write_all(b"\r\n").await.unwrap();
        }
    }

    async fn read_sent(server: &mut DuplexStream) -> String {
        let mut buf = vec![0u8; 4096];
        let n = server.read(&mut buf).await.unwrap();
        buf.truncate(n);
        String::from_utf8(buf).unwrap()
    }

    #[tokio::test]
    async fn test_greeting_ok() {
        let (mut dispatcher, mut server) = harness();
        script(&mut server, &["OK MRS ready"]).await;
        assert!(dispatcher.check_greeting().await.unwrap());
        assert_eq!(dispatcher.handler().lines, vec!["OK MRS ready"]);
    }

    #[tokio::test]
    async fn test_greeting_rejected() {
        let (mut dispatcher, mut server) = harness();
        script(&mut server, &["BUSY try later"]).await;
        assert!(!dispatcher.check_greeting().await.unwrap());
    }

    #[tokio::test]
    async fn test_bad_short_circuits() {
        let (mut dispatcher, mut server) = harness();
        script(&mut server, &["BAD unknown command", "OK never read"]).await;

        let flow = dispatcher.dispatch("NOOP").await.unwrap();
        assert_eq!(flow, Flow::Continue);
        // Only the BAD line was consumed and displayed.
        assert_eq!(dispatcher.handler().lines, vec!["BAD unknown command"]);
    }

    #[tokio::test]
    async fn test_generic_multi_line_reads_through_terminator() {
        let (mut dispatcher, mut server) = harness();
        script(&mut server, &["*", "line-a", "line-b", "OK done"]).await;

        dispatcher.dispatch("LIST").await.unwrap();
        assert_eq!(
            dispatcher.handler().lines,
            vec!["*", "line-a", "line-b", "OK done"]
        );
    }

    #[tokio::test]
    async fn test_generic_single_line() {
        let (mut dispatcher, mut server) = harness();
        script(&mut server, &["OK noop"]).await;

        dispatcher.dispatch("NOOP").await.unwrap();
        assert_eq!(dispatcher.handler().lines, vec!["OK noop"]);
    }

    #[tokio::test]
    async fn test_fetch_aggregates_records() {
        let (mut dispatcher, mut server) = harness();
        script(
            &mut server,
            &[
                "* 2 messages",
                "ID: 1",
                "UID: 1",
                "* ",
                "ID: 2",
                "UID: 2",
                "OK FETCH completed",
            ],
        )
        .await;

        dispatcher.dispatch("FETCH 1:2").await.unwrap();

        let handler = dispatcher.handler();
        assert_eq!(handler.batches.len(), 1);
        let records = &handler.batches[0];
        assert_eq!(records.len(), 2);
        assert_eq!((records[0].id, records[0].uid), (1, 1));
        assert_eq!((records[1].id, records[1].uid), (2, 2));
        // The terminator never leaks into a record body.
        assert!(records.iter().all(|m| !m.body.contains("OK FETCH")));
        assert_eq!(dispatcher.messages().len(), 2);
    }

    #[tokio::test]
    async fn test_fetch_clears_previous_results() {
        let (mut dispatcher, mut server) = harness();
        script(&mut server, &["* 1", "ID: 1", "OK FETCH done"]).await;
        dispatcher.dispatch("FETCH 1").await.unwrap();
        assert_eq!(dispatcher.messages().len(), 1);

        script(&mut server, &["BAD no such range"]).await;
        dispatcher.dispatch("FETCH 99").await.unwrap();
        assert!(dispatcher.messages().is_empty());
    }

    #[tokio::test]
    async fn test_fetch_bad_displays_and_stops() {
        let (mut dispatcher, mut server) = harness();
        script(&mut server, &["BAD fetch refused"]).await;

        dispatcher.dispatch("FETCH 1").await.unwrap();
        assert_eq!(dispatcher.handler().lines, vec!["BAD fetch refused"]);
        assert!(dispatcher.handler().batches.is_empty());
    }

    #[tokio::test]
    async fn test_auth_malformed_is_local() {
        let (mut dispatcher, mut server) = harness();

        dispatcher.dispatch("AUTH").await.unwrap();
        dispatcher.dispatch("AUTH AES/ECB please").await.unwrap();

        assert_eq!(dispatcher.handler().locals.len(), 2);
        assert!(dispatcher.handler().lines.is_empty());
        // Nothing reached the wire: the server should see our QUIT first.
        dispatcher.session.write_line("QUIT").await.unwrap();
        assert_eq!(read_sent(&mut server).await, "QUIT\r\n");
    }

    #[tokio::test]
    async fn test_auth_passthrough_unknown_mode() {
        let (mut dispatcher, mut server) = harness();
        script(&mut server, &["BAD unsupported"]).await;

        dispatcher.dispatch("AUTH ROT13").await.unwrap();
        assert_eq!(dispatcher.handler().lines, vec!["BAD unsupported"]);
        assert_eq!(dispatcher.session.mode(), EncryptionMode::Plain);
        assert_eq!(read_sent(&mut server).await, "AUTH ROT13\r\n");
    }

    #[tokio::test]
    async fn test_auth_switches_cipher_for_the_acknowledgment() {
        let (mut dispatcher, mut server) = harness();

        // The server acknowledges under the *new* mode.
        let cipher = LineCipher::derive(EncryptionMode::AesCbc, KEY).unwrap();
        let ack = cipher.encrypt("OK AUTH set to AES/CBC").unwrap();
        let ready = cipher.encrypt("OK ready for commands").unwrap();
        script(&mut server, &[ack.as_str(), ready.as_str()]).await;

        dispatcher.dispatch("auth aes/cbc").await.unwrap();

        assert_eq!(
            dispatcher.handler().lines,
            vec!["OK AUTH set to AES/CBC", "OK ready for commands"]
        );
        assert_eq!(dispatcher.session.mode(), EncryptionMode::AesCbc);
        // The announcement itself traveled in the clear.
        assert_eq!(read_sent(&mut server).await, "AUTH AES/CBC\r\n");
    }

    #[tokio::test]
    async fn test_auth_key_error_leaves_session_usable() {
        let (client, mut server) = tokio::io::duplex(1024);
        let session = Session::new(client, b"short".to_vec());
        let mut dispatcher = CommandDispatcher::new(session, Capture::default());

        dispatcher.dispatch("AUTH AES/ECB").await.unwrap();
        assert_eq!(dispatcher.handler().locals.len(), 1);
        assert_eq!(dispatcher.session.mode(), EncryptionMode::Plain);

        // The session still works in the prior mode.
        script(&mut server, &["OK noop"]).await;
        dispatcher.dispatch("NOOP").await.unwrap();
        assert_eq!(dispatcher.handler().lines, vec!["OK noop"]);
    }

    #[tokio::test]
    async fn test_quit_closes_exactly_once() {
        let (mut dispatcher, mut server) = harness();
        script(&mut server, &["221 closing transmission channel"]).await;

        dispatcher.quit().await.unwrap();
        assert!(dispatcher.session.is_closed());

        // Entering the termination logic again is a no-op.
        dispatcher.quit().await.unwrap();
        assert_eq!(
            dispatcher.handler().lines,
            vec!["221 closing transmission channel"]
        );
        assert_eq!(read_sent(&mut server).await, "QUIT\r\n");
    }

    #[tokio::test]
    async fn test_quit_without_ack_keeps_stream() {
        let (mut dispatcher, mut server) = harness();
        script(&mut server, &["BAD not yet"]).await;

        dispatcher.quit().await.unwrap();
        assert!(!dispatcher.session.is_closed());
        let _ = read_sent(&mut server).await;
    }

    #[tokio::test]
    async fn test_quit_command_signals_loop_exit() {
        let (mut dispatcher, _server) = harness();
        assert_eq!(dispatcher.dispatch("quit").await.unwrap(), Flow::Quit);
    }
}
