//! Line ciphers negotiated over the protocol.
//!
//! MRP sessions start unencrypted and may switch to a symmetric block
//! cipher mid-stream via `AUTH <mode>`. Every line after the switch is an
//! independent encryption unit: padded with PKCS#7, encrypted, and carried
//! on the wire as a base64 text line. No IV ever travels on the wire — CBC
//! IVs are derived from the pre-shared key so both ends agree implicitly.

use std::fmt;
use std::str::FromStr;

use aes::cipher::block_padding::Pkcs7;
use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyInit, KeyIvInit};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;

use crate::{Error, Result};

type Aes128EcbEnc = ecb::Encryptor<aes::Aes128>;
type Aes128EcbDec = ecb::Decryptor<aes::Aes128>;
type Aes128CbcEnc = cbc::Encryptor<aes::Aes128>;
type Aes128CbcDec = cbc::Decryptor<aes::Aes128>;
type DesEcbEnc = ecb::Encryptor<des::Des>;
type DesEcbDec = ecb::Decryptor<des::Des>;
type DesCbcEnc = cbc::Encryptor<des::Des>;
type DesCbcDec = cbc::Decryptor<des::Des>;

/// Encryption mode negotiated by `AUTH`.
///
/// Closed set: the protocol defines exactly these five tokens. A session
/// always starts in [`EncryptionMode::Plain`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EncryptionMode {
    /// No encryption; lines travel as-is.
    #[default]
    Plain,
    /// AES-128 in electronic-codebook mode.
    AesEcb,
    /// AES-128 in cipher-block-chaining mode.
    AesCbc,
    /// DES in electronic-codebook mode.
    DesEcb,
    /// DES in cipher-block-chaining mode.
    DesCbc,
}

impl EncryptionMode {
    /// All modes a client can negotiate.
    pub const ALL: [Self; 5] = [
        Self::Plain,
        Self::AesEcb,
        Self::AesCbc,
        Self::DesEcb,
        Self::DesCbc,
    ];

    /// The canonical wire token for this mode, as sent in `AUTH <mode>`.
    #[must_use]
    pub const fn token(self) -> &'static str {
        match self {
            Self::Plain => "PLAIN",
            Self::AesEcb => "AES/ECB",
            Self::AesCbc => "AES/CBC",
            Self::DesEcb => "DES/ECB",
            Self::DesCbc => "DES/CBC",
        }
    }

    /// Key length in bytes required by this mode's algorithm.
    #[must_use]
    pub const fn key_len(self) -> usize {
        match self {
            Self::Plain => 0,
            Self::AesEcb | Self::AesCbc => 16,
            Self::DesEcb | Self::DesCbc => 8,
        }
    }

    /// Matches a mode token case-insensitively.
    ///
    /// Returns `None` for anything outside the closed set; the dispatcher
    /// falls back to sending such `AUTH` text verbatim.
    #[must_use]
    pub fn from_token(token: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|mode| token.eq_ignore_ascii_case(mode.token()))
    }
}

impl fmt::Display for EncryptionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

impl FromStr for EncryptionMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_token(s).ok_or_else(|| Error::Protocol(format!("unknown encryption mode: {s}")))
    }
}

/// A derived encrypt/decrypt transform pair for one encryption mode.
///
/// Holds the key material sliced to the algorithm's key size. Each call
/// constructs a fresh cipher instance, so every line is encrypted and
/// decrypted independently of its neighbors.
#[derive(Clone)]
pub enum LineCipher {
    /// Identity transforms.
    Plain,
    /// AES-128/ECB with the given key.
    AesEcb([u8; 16]),
    /// AES-128/CBC; the IV is the key itself.
    AesCbc([u8; 16]),
    /// DES/ECB with the given key.
    DesEcb([u8; 8]),
    /// DES/CBC; the IV is the key itself.
    DesCbc([u8; 8]),
}

impl LineCipher {
    /// Derives the transform pair for `mode` from the pre-shared key.
    ///
    /// The leading `mode.key_len()` bytes of `key` become the key material;
    /// one shared secret thus serves both algorithm families.
    ///
    /// # Errors
    ///
    /// [`Error::KeyLength`] if `key` is shorter than the mode requires.
    pub fn derive(mode: EncryptionMode, key: &[u8]) -> Result<Self> {
        match mode {
            EncryptionMode::Plain => Ok(Self::Plain),
            EncryptionMode::AesEcb => Ok(Self::AesEcb(key_bytes(mode, key)?)),
            EncryptionMode::AesCbc => Ok(Self::AesCbc(key_bytes(mode, key)?)),
            EncryptionMode::DesEcb => Ok(Self::DesEcb(key_bytes(mode, key)?)),
            EncryptionMode::DesCbc => Ok(Self::DesCbc(key_bytes(mode, key)?)),
        }
    }

    /// The mode this pair was derived for.
    #[must_use]
    pub const fn mode(&self) -> EncryptionMode {
        match self {
            Self::Plain => EncryptionMode::Plain,
            Self::AesEcb(_) => EncryptionMode::AesEcb,
            Self::AesCbc(_) => EncryptionMode::AesCbc,
            Self::DesEcb(_) => EncryptionMode::DesEcb,
            Self::DesCbc(_) => EncryptionMode::DesCbc,
        }
    }

    /// Transforms one plaintext line into its wire form.
    ///
    /// # Errors
    ///
    /// [`Error::Cipher`] if padding fails.
    pub fn encrypt(&self, line: &str) -> Result<String> {
        match self {
            Self::Plain => Ok(line.to_owned()),
            Self::AesEcb(key) => {
                let ct = encrypt_padded(Aes128EcbEnc::new(key.into()), line.as_bytes())?;
                Ok(BASE64.encode(ct))
            }
            Self::AesCbc(key) => {
                let ct = encrypt_padded(Aes128CbcEnc::new(key.into(), key.into()), line.as_bytes())?;
                Ok(BASE64.encode(ct))
            }
            Self::DesEcb(key) => {
                let ct = encrypt_padded(DesEcbEnc::new(key.into()), line.as_bytes())?;
                Ok(BASE64.encode(ct))
            }
            Self::DesCbc(key) => {
                let ct = encrypt_padded(DesCbcEnc::new(key.into(), key.into()), line.as_bytes())?;
                Ok(BASE64.encode(ct))
            }
        }
    }

    /// Transforms one wire unit back into plaintext.
    ///
    /// # Errors
    ///
    /// [`Error::Decode`] if the unit is not valid base64 or the plaintext
    /// is not UTF-8; [`Error::Cipher`] if decryption or unpadding fails
    /// (wrong key, corrupted unit, or a peer in a different mode).
    pub fn decrypt(&self, unit: &str) -> Result<String> {
        match self {
            Self::Plain => Ok(unit.to_owned()),
            Self::AesEcb(key) => {
                let pt = decrypt_padded(Aes128EcbDec::new(key.into()), &BASE64.decode(unit)?)?;
                Ok(String::from_utf8(pt)?)
            }
            Self::AesCbc(key) => {
                let dec = Aes128CbcDec::new(key.into(), key.into());
                let pt = decrypt_padded(dec, &BASE64.decode(unit)?)?;
                Ok(String::from_utf8(pt)?)
            }
            Self::DesEcb(key) => {
                let pt = decrypt_padded(DesEcbDec::new(key.into()), &BASE64.decode(unit)?)?;
                Ok(String::from_utf8(pt)?)
            }
            Self::DesCbc(key) => {
                let dec = DesCbcDec::new(key.into(), key.into());
                let pt = decrypt_padded(dec, &BASE64.decode(unit)?)?;
                Ok(String::from_utf8(pt)?)
            }
        }
    }
}

impl fmt::Debug for LineCipher {
    // Key material stays out of logs.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("LineCipher").field(&self.mode()).finish()
    }
}

/// Slices the leading `N` bytes of the pre-shared key into an array.
fn key_bytes<const N: usize>(mode: EncryptionMode, key: &[u8]) -> Result<[u8; N]> {
    if key.len() < N {
        return Err(Error::KeyLength {
            mode,
            expected: N,
            actual: key.len(),
        });
    }
    let mut out = [0u8; N];
    out.copy_from_slice(&key[..N]);
    Ok(out)
}

/// PKCS#7-pads and encrypts `plaintext` with a fresh cipher instance.
fn encrypt_padded<M: BlockEncryptMut>(cipher: M, plaintext: &[u8]) -> Result<Vec<u8>> {
    let mut buf = vec![0u8; plaintext.len() + M::block_size()];
    buf[..plaintext.len()].copy_from_slice(plaintext);
    let len = cipher
        .encrypt_padded_mut::<Pkcs7>(&mut buf, plaintext.len())
        .map_err(|_| Error::Cipher("plaintext does not fit padded buffer".to_owned()))?
        .len();
    buf.truncate(len);
    Ok(buf)
}

/// Decrypts and unpads `ciphertext` with a fresh cipher instance.
fn decrypt_padded<M: BlockDecryptMut>(cipher: M, ciphertext: &[u8]) -> Result<Vec<u8>> {
    let mut buf = ciphertext.to_vec();
    let plaintext = cipher
        .decrypt_padded_mut::<Pkcs7>(&mut buf)
        .map_err(|_| Error::Cipher("bad padding (wrong key or corrupted unit)".to_owned()))?;
    Ok(plaintext.to_vec())
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
    use proptest::prelude::*;

    use super::*;

    const KEY: &[u8] = b"0123456789abcdef";

    #[test]
    fn test_token_roundtrip() {
        for mode in EncryptionMode::ALL {
            assert_eq!(EncryptionMode::from_token(mode.token()), Some(mode));
        }
    }

    #[test]
    fn test_token_case_insensitive() {
        assert_eq!(
            EncryptionMode::from_token("aes/cbc"),
            Some(EncryptionMode::AesCbc)
        );
        assert_eq!(
            EncryptionMode::from_token("Des/Ecb"),
            Some(EncryptionMode::DesEcb)
        );
        assert_eq!(
            EncryptionMode::from_token("plain"),
            Some(EncryptionMode::Plain)
        );
        assert_eq!(EncryptionMode::from_token("AES"), None);
        assert_eq!(EncryptionMode::from_token("RC4/ECB"), None);
    }

    #[test]
    fn test_from_str_rejects_unknown() {
        assert!("AES/GCM".parse::<EncryptionMode>().is_err());
        assert_eq!(
            "DES/CBC".parse::<EncryptionMode>().unwrap(),
            EncryptionMode::DesCbc
        );
    }

    #[test]
    fn test_plain_is_identity() {
        let cipher = LineCipher::derive(EncryptionMode::Plain, b"").unwrap();
        assert_eq!(cipher.encrypt("OK hello").unwrap(), "OK hello");
        assert_eq!(cipher.decrypt("OK hello").unwrap(), "OK hello");
    }

    #[test]
    fn test_roundtrip_every_mode() {
        for mode in EncryptionMode::ALL {
            let cipher = LineCipher::derive(mode, KEY).unwrap();
            for line in ["", "FETCH", "ID: 1\r\nUID: 2\r\n", "Subject: caff\u{e8}"] {
                let wire = cipher.encrypt(line).unwrap();
                assert_eq!(cipher.decrypt(&wire).unwrap(), line, "mode {mode}");
            }
        }
    }

    #[test]
    fn test_ciphertext_is_not_plaintext() {
        for mode in [
            EncryptionMode::AesEcb,
            EncryptionMode::AesCbc,
            EncryptionMode::DesEcb,
            EncryptionMode::DesCbc,
        ] {
            let cipher = LineCipher::derive(mode, KEY).unwrap();
            let wire = cipher.encrypt("AUTH PLAIN").unwrap();
            assert_ne!(wire, "AUTH PLAIN");
            // Wire form is printable base64, safe to frame as a text line.
            assert!(wire.bytes().all(|b| b.is_ascii_graphic()));
        }
    }

    #[test]
    fn test_wrong_key_fails_or_garbles() {
        let cipher = LineCipher::derive(EncryptionMode::AesCbc, KEY).unwrap();
        let other = LineCipher::derive(EncryptionMode::AesCbc, b"fedcba9876543210").unwrap();
        let wire = cipher.encrypt("QUIT").unwrap();
        // Wrong key either trips the padding check or yields different text.
        match other.decrypt(&wire) {
            Ok(text) => assert_ne!(text, "QUIT"),
            Err(Error::Cipher(_) | Error::Decode(_)) => {}
            Err(e) => panic!("unexpected error: {e}"),
        }
    }

    #[test]
    fn test_short_key_is_rejected() {
        let err = LineCipher::derive(EncryptionMode::AesEcb, b"too-short").unwrap_err();
        match err {
            Error::KeyLength {
                mode,
                expected,
                actual,
            } => {
                assert_eq!(mode, EncryptionMode::AesEcb);
                assert_eq!(expected, 16);
                assert_eq!(actual, 9);
            }
            other => panic!("expected KeyLength, got {other}"),
        }
        // DES only needs eight bytes, so the same key is fine there.
        assert!(LineCipher::derive(EncryptionMode::DesCbc, b"too-short").is_ok());
    }

    #[test]
    fn test_decrypt_rejects_non_base64() {
        let cipher = LineCipher::derive(EncryptionMode::DesEcb, KEY).unwrap();
        assert!(matches!(
            cipher.decrypt("not base64 at all!"),
            Err(Error::Decode(_))
        ));
    }

    #[test]
    fn test_modes_are_incompatible() {
        let ecb = LineCipher::derive(EncryptionMode::AesEcb, KEY).unwrap();
        let cbc = LineCipher::derive(EncryptionMode::AesCbc, KEY).unwrap();
        let wire = ecb.encrypt("OK AUTH set to AES/ECB").unwrap();
        match cbc.decrypt(&wire) {
            Ok(text) => assert_ne!(text, "OK AUTH set to AES/ECB"),
            Err(Error::Cipher(_) | Error::Decode(_)) => {}
            Err(e) => panic!("unexpected error: {e}"),
        }
    }

    proptest! {
        #[test]
        fn prop_roundtrip_printable(line in "[ -~]{0,200}") {
            for mode in EncryptionMode::ALL {
                let cipher = LineCipher::derive(mode, KEY).unwrap();
                let wire = cipher.encrypt(&line).unwrap();
                prop_assert_eq!(cipher.decrypt(&wire).unwrap(), line.clone());
            }
        }
    }
}
