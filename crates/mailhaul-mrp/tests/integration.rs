//! Integration tests for the MRP client.
//!
//! These tests use a mock stream to simulate server responses without a
//! real server connection. Encrypted flows build their scripted responses
//! with the same line ciphers the session negotiates, so both directions
//! of the transform are exercised end to end.

use std::io::{self, Cursor};
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

use mailhaul_mrp::{
    CommandDispatcher, EncryptionMode, Flow, LineCipher, Message, ResponseHandler, Session,
};

const KEY: &[u8] = b"0123456789abcdef";

/// Mock stream that returns predefined responses.
struct MockStream {
    /// Responses to return (in order).
    responses: Cursor<Vec<u8>>,
    /// Captured commands sent by the client.
    sent: Arc<Mutex<Vec<u8>>>,
}

impl MockStream {
    fn new(responses: Vec<u8>) -> (Self, Arc<Mutex<Vec<u8>>>) {
        let sent = Arc::new(Mutex::new(Vec::new()));
        (
            Self {
                responses: Cursor::new(responses),
                sent: Arc::clone(&sent),
            },
            sent,
        )
    }
}

impl AsyncRead for MockStream {
    fn poll_read(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let data = self.responses.get_ref();
        let pos = usize::try_from(self.responses.position()).unwrap_or(usize::MAX);

        if pos >= data.len() {
            return Poll::Ready(Ok(()));
        }

        let remaining = &data[pos..];
        let to_read = remaining.len().min(buf.remaining());
        buf.put_slice(&remaining[..to_read]);
        self.responses.set_position((pos + to_read) as u64);

        Poll::Ready(Ok(()))
    }
}

impl AsyncWrite for MockStream {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        self.sent.lock().unwrap().extend_from_slice(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

/// Builds a wire script: each entry is one unit, optionally encrypted.
fn wire(units: &[(&str, Option<&LineCipher>)]) -> Vec<u8> {
    let mut bytes = Vec::new();
    for (unit, cipher) in units {
        let encoded = match cipher {
            Some(cipher) => cipher.encrypt(unit).unwrap(),
            None => (*unit).to_string(),
        };
        bytes.extend_from_slice(encoded.as_bytes());
        bytes.extend_from_slice(b"\r\n");
    }
    bytes
}

/// Handler capturing everything the dispatcher reports.
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

fn dispatcher_over(
    responses: Vec<u8>,
) -> (CommandDispatcher<MockStream, Capture>, Arc<Mutex<Vec<u8>>>) {
    let (stream, sent) = MockStream::new(responses);
    let session = Session::new(stream, KEY);
    (CommandDispatcher::new(session, Capture::default()), sent)
}

#[tokio::test]
async fn test_plaintext_client_lifecycle() {
    let responses = wire(&[
        ("OK MRS ready", None),
        ("OK noop", None),
        ("* 1 message", None),
        ("ID: 4", None),
        ("UID: 44", None),
        ("Subject: hello", None),
        ("OK FETCH completed", None),
        ("221 closing transmission channel", None),
    ]);
    let (mut dispatcher, sent) = dispatcher_over(responses);

    assert!(dispatcher.check_greeting().await.unwrap());
    assert_eq!(dispatcher.dispatch("NOOP").await.unwrap(), Flow::Continue);
    assert_eq!(
        dispatcher.dispatch("FETCH 4").await.unwrap(),
        Flow::Continue
    );
    assert_eq!(dispatcher.dispatch("QUIT").await.unwrap(), Flow::Quit);
    dispatcher.quit().await.unwrap();

    let handler = dispatcher.handler();
    assert_eq!(handler.lines[0], "OK MRS ready");
    assert_eq!(handler.lines[1], "OK noop");
    assert_eq!(*handler.lines.last().unwrap(), "221 closing transmission channel");

    assert_eq!(handler.batches.len(), 1);
    let records = &handler.batches[0];
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].id, 4);
    assert_eq!(records[0].uid, 44);
    assert_eq!(records[0].subject, "hello");

    let sent = String::from_utf8(sent.lock().unwrap().clone()).unwrap();
    assert_eq!(sent, "NOOP\r\nFETCH 4\r\nQUIT\r\n");
}

#[tokio::test]
async fn test_encrypted_session_after_auth() {
    let cipher = LineCipher::derive(EncryptionMode::DesCbc, KEY).unwrap();

    // Everything after the AUTH announcement travels encrypted, and one
    // unit may carry several record lines at once.
    let responses = wire(&[
        ("OK MRS ready", None),
        ("OK AUTH set to DES/CBC", Some(&cipher)),
        ("OK ready for commands", Some(&cipher)),
        ("* 2 messages", Some(&cipher)),
        ("ID: 1\r\nUID: 1\r\nSubject: first\r\n", Some(&cipher)),
        ("* ", Some(&cipher)),
        ("ID: 2\r\nUID: 2\r\nSubject: second\r\n", Some(&cipher)),
        ("OK FETCH completed", Some(&cipher)),
        ("221 bye", Some(&cipher)),
    ]);
    let (mut dispatcher, sent) = dispatcher_over(responses);

    assert!(dispatcher.check_greeting().await.unwrap());
    dispatcher.dispatch("AUTH DES/CBC").await.unwrap();
    dispatcher.dispatch("FETCH 1:2").await.unwrap();
    dispatcher.quit().await.unwrap();

    let handler = dispatcher.handler();
    assert_eq!(
        handler.lines,
        vec![
            "OK MRS ready",
            "OK AUTH set to DES/CBC",
            "OK ready for commands",
            "221 bye",
        ]
    );

    let records = &handler.batches[0];
    assert_eq!(records.len(), 2);
    assert_eq!((records[0].id, records[0].subject.as_str()), (1, "first"));
    assert_eq!((records[1].id, records[1].subject.as_str()), (2, "second"));

    // The announcement is the last plaintext the client ever sent.
    let sent = sent.lock().unwrap().clone();
    let text = String::from_utf8(sent).unwrap();
    let mut units = text.split("\r\n");
    assert_eq!(units.next(), Some("AUTH DES/CBC"));
    let fetch_unit = units.next().unwrap();
    assert_ne!(fetch_unit, "FETCH 1:2");
    assert_eq!(cipher.decrypt(fetch_unit).unwrap(), "FETCH 1:2");
    let quit_unit = units.next().unwrap();
    assert_eq!(cipher.decrypt(quit_unit).unwrap(), "QUIT");
}

#[tokio::test]
async fn test_malformed_auth_writes_nothing() {
    let (mut dispatcher, sent) = dispatcher_over(Vec::new());

    assert_eq!(dispatcher.dispatch("AUTH").await.unwrap(), Flow::Continue);

    assert_eq!(dispatcher.handler().locals.len(), 1);
    assert!(sent.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_failed_greeting_goes_straight_to_quit() {
    let responses = wire(&[("BUSY maintenance window", None), ("221 bye", None)]);
    let (mut dispatcher, sent) = dispatcher_over(responses);

    assert!(!dispatcher.check_greeting().await.unwrap());
    dispatcher.quit().await.unwrap();
    // Second entry into the termination logic changes nothing.
    dispatcher.quit().await.unwrap();

    let handler = dispatcher.handler();
    assert_eq!(handler.lines, vec!["BUSY maintenance window", "221 bye"]);
    let sent = String::from_utf8(sent.lock().unwrap().clone()).unwrap();
    assert_eq!(sent, "QUIT\r\n");
}

#[tokio::test]
async fn test_bad_response_stops_the_exchange() {
    let responses = wire(&[("OK MRS ready", None), ("BAD unknown command", None)]);
    let (mut dispatcher, _sent) = dispatcher_over(responses);

    assert!(dispatcher.check_greeting().await.unwrap());
    dispatcher.dispatch("FROBNICATE").await.unwrap();

    assert_eq!(
        dispatcher.handler().lines,
        vec!["OK MRS ready", "BAD unknown command"]
    );
}
