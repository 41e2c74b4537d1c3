//! The encrypted session transport.
//!
//! `Session` owns the stream for its whole life and routes every line
//! through the currently active [`LineCipher`]. The cipher swap performs
//! no I/O of its own, which lets the dispatcher sequence it exactly
//! between the `AUTH` send (old mode) and the acknowledgment read (new
//! mode) — the ordering the whole negotiation protocol depends on.

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};

use super::framed::FramedStream;
use crate::cipher::{EncryptionMode, LineCipher};
use crate::{Error, Result};

/// A protocol session over an exclusively owned stream.
///
/// Starts in [`EncryptionMode::Plain`]. At most one encryption mode is
/// active at any time; a swap takes effect on the very next line written
/// or read. The stream is released exactly once by [`Session::close`].
pub struct Session<S> {
    /// `None` once the session has been closed.
    framed: Option<FramedStream<S>>,
    cipher: LineCipher,
    key: Vec<u8>,
}

impl<S> Session<S> {
    /// The currently active encryption mode.
    #[must_use]
    pub const fn mode(&self) -> EncryptionMode {
        self.cipher.mode()
    }

    /// Whether [`Session::close`] has released the stream.
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        self.framed.is_none()
    }
}

impl<S> Session<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Wraps a connected stream with the pre-shared key.
    pub fn new(stream: S, key: impl Into<Vec<u8>>) -> Self {
        Self {
            framed: Some(FramedStream::new(stream)),
            cipher: LineCipher::Plain,
            key: key.into(),
        }
    }

    /// Encrypts one line under the active mode and writes it.
    ///
    /// # Errors
    ///
    /// [`Error::Closed`] after [`Session::close`]; [`Error::Io`] if the
    /// underlying write fails.
    pub async fn write_line(&mut self, line: &str) -> Result<()> {
        let unit = self.cipher.encrypt(line)?;
        self.framed_mut()?.write_unit(&unit).await
    }

    /// Reads one full wire unit and decrypts it under the active mode.
    ///
    /// Blocks until the unit's terminator arrives. The decrypted text may
    /// itself contain interior line terminators; it is returned as one
    /// logical line.
    ///
    /// # Errors
    ///
    /// [`Error::Closed`] after [`Session::close`]; [`Error::Io`] on
    /// stream failure; [`Error::Cipher`]/[`Error::Decode`] when the unit
    /// cannot be decoded under the active mode.
    pub async fn read_line(&mut self) -> Result<String> {
        let unit = self.framed_mut()?.read_unit().await?;
        self.cipher.decrypt(&unit)
    }

    /// Derives the transform pair for `mode` from the session key without
    /// activating it.
    ///
    /// Lets callers surface key errors before any negotiation byte is
    /// sent; pair with [`Session::activate_cipher`].
    ///
    /// # Errors
    ///
    /// [`Error::KeyLength`] if the session key is too short for `mode`.
    pub fn negotiate_cipher(&self, mode: EncryptionMode) -> Result<LineCipher> {
        LineCipher::derive(mode, &self.key)
    }

    /// Atomically swaps the active transform pair.
    ///
    /// Must be sequenced after the corresponding `AUTH` line has been
    /// written (old mode) and before the acknowledgment is read (new
    /// mode). No line is ever encoded under two modes.
    pub fn activate_cipher(&mut self, cipher: LineCipher) {
        tracing::debug!(mode = %cipher.mode(), "switching session cipher");
        self.cipher = cipher;
    }

    /// Derives and activates the transform pair for `mode` in one step.
    ///
    /// # Errors
    ///
    /// [`Error::KeyLength`] if the session key is too short for `mode`;
    /// on error the previous mode stays active.
    pub fn select_encryption_mode(&mut self, mode: EncryptionMode) -> Result<()> {
        let cipher = self.negotiate_cipher(mode)?;
        self.activate_cipher(cipher);
        Ok(())
    }

    /// Releases the stream.
    ///
    /// The shutdown runs at most once; further calls are no-ops, and
    /// further reads or writes fail with [`Error::Closed`].
    ///
    /// # Errors
    ///
    /// [`Error::Io`] if the stream shutdown itself fails.
    pub async fn close(&mut self) -> Result<()> {
        if let Some(mut framed) = self.framed.take() {
            framed.get_mut().shutdown().await?;
        }
        Ok(())
    }

    fn framed_mut(&mut self) -> Result<&mut FramedStream<S>> {
        self.framed.as_mut().ok_or(Error::Closed)
    }
}

impl<S> std::fmt::Debug for Session<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("mode", &self.mode())
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
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
    use super::*;

    const KEY: &[u8] = b"0123456789abcdef";

    fn session_pair() -> (Session<tokio::io::DuplexStream>, Session<tokio::io::DuplexStream>) {
        let (client, server) = tokio::io::duplex(4096);
        (Session::new(client, KEY), Session::new(server, KEY))
    }

    #[tokio::test]
    async fn test_plain_lines_pass_through() {
        let (mut client, mut server) = session_pair();
        client.write_line("LIST").await.unwrap();
        assert_eq!(server.read_line().await.unwrap(), "LIST");
    }

    #[tokio::test]
    async fn test_mode_switch_never_straddles_a_line() {
        let (mut client, mut server) = session_pair();

        // The announcement travels under the old mode.
        client.write_line("AUTH AES/CBC").await.unwrap();
        client
            .select_encryption_mode(EncryptionMode::AesCbc)
            .unwrap();

        // A peer still in the old mode decodes the announcement.
        assert_eq!(server.read_line().await.unwrap(), "AUTH AES/CBC");
        server
            .select_encryption_mode(EncryptionMode::AesCbc)
            .unwrap();

        // Everything after the swap decodes only under the new mode.
        client.write_line("FETCH 1").await.unwrap();
        assert_eq!(server.read_line().await.unwrap(), "FETCH 1");
    }

    #[tokio::test]
    async fn test_line_after_switch_is_opaque_to_old_mode() {
        let (mut client, mut server) = session_pair();

        client.write_line("AUTH DES/ECB").await.unwrap();
        client
            .select_encryption_mode(EncryptionMode::DesEcb)
            .unwrap();
        assert_eq!(server.read_line().await.unwrap(), "AUTH DES/ECB");

        // The server stays in Plain: it sees ciphertext, not the line.
        client.write_line("secret").await.unwrap();
        let raw = server.read_line().await.unwrap();
        assert_ne!(raw, "secret");
    }

    #[tokio::test]
    async fn test_encrypted_roundtrip_every_cipher_mode() {
        // Under a cipher, one wire unit may decrypt to a chunk with
        // interior terminators; it must come back as one logical line.
        for mode in [
            EncryptionMode::AesEcb,
            EncryptionMode::AesCbc,
            EncryptionMode::DesEcb,
            EncryptionMode::DesCbc,
        ] {
            let (mut client, mut server) = session_pair();
            client.select_encryption_mode(mode).unwrap();
            server.select_encryption_mode(mode).unwrap();

            client.write_line("ID: 1\r\nUID: 2\r\n").await.unwrap();
            assert_eq!(server.read_line().await.unwrap(), "ID: 1\r\nUID: 2\r\n");
        }
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let (mut client, _server) = session_pair();
        assert!(!client.is_closed());
        client.close().await.unwrap();
        assert!(client.is_closed());
        client.close().await.unwrap();

        assert!(matches!(client.write_line("NOOP").await, Err(Error::Closed)));
        assert!(matches!(client.read_line().await, Err(Error::Closed)));
    }

    #[tokio::test]
    async fn test_failed_negotiation_keeps_old_mode() {
        let (client, _server) = tokio::io::duplex(64);
        let mut session = Session::new(client, b"short".to_vec());
        assert!(
            session
                .select_encryption_mode(EncryptionMode::AesEcb)
                .is_err()
        );
        assert_eq!(session.mode(), EncryptionMode::Plain);
    }
}
