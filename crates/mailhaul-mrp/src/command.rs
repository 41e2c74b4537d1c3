//! Command classification.
//!
//! User input is classified into a closed set of command kinds before any
//! byte reaches the wire. Only `AUTH` gets real parsing (its argument
//! selects the session cipher); everything else is forwarded verbatim and
//! differs only in how the response is consumed.

use crate::cipher::EncryptionMode;

/// One classified command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `AUTH <mode>` with a recognized mode token.
    ///
    /// The canonical `AUTH <MODE>` text is sent (old cipher), the session
    /// switches, and two response lines are read (new cipher).
    Auth(EncryptionMode),
    /// `AUTH <arg>` with an unrecognized second token.
    ///
    /// Sent verbatim; one response line is read. The session cipher does
    /// not change.
    AuthPassthrough(String),
    /// `AUTH` with a token count other than two.
    ///
    /// Reported locally; nothing is written to the stream.
    AuthMalformed,
    /// `QUIT` — ends the command loop. The actual QUIT exchange runs once,
    /// in the termination sequence, not per command.
    Quit,
    /// `FETCH ...` — multi-record retrieval with block aggregation.
    Fetch(String),
    /// Any other command; sent verbatim.
    Other(String),
}

impl Command {
    /// Classifies one trimmed line of user input.
    #[must_use]
    pub fn classify(input: &str) -> Self {
        let input = input.trim();
        if starts_with_word(input, "AUTH") {
            let tokens: Vec<&str> = input.split_whitespace().collect();
            if tokens.len() != 2 {
                return Self::AuthMalformed;
            }
            return EncryptionMode::from_token(tokens[1])
                .map_or_else(|| Self::AuthPassthrough(input.to_owned()), Self::Auth);
        }
        if input.eq_ignore_ascii_case("QUIT") {
            return Self::Quit;
        }
        if starts_with_word(input, "FETCH") {
            return Self::Fetch(input.to_owned());
        }
        Self::Other(input.to_owned())
    }
}

/// Case-insensitive keyword-prefix test.
fn starts_with_word(input: &str, word: &str) -> bool {
    input
        .get(..word.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(word))
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

    #[test]
    fn test_auth_known_modes() {
        assert_eq!(
            Command::classify("AUTH AES/ECB"),
            Command::Auth(EncryptionMode::AesEcb)
        );
        assert_eq!(
            Command::classify("auth des/cbc"),
            Command::Auth(EncryptionMode::DesCbc)
        );
        assert_eq!(
            Command::classify("AUTH plain"),
            Command::Auth(EncryptionMode::Plain)
        );
    }

    #[test]
    fn test_auth_unknown_mode_passes_through() {
        assert_eq!(
            Command::classify("AUTH ROT13"),
            Command::AuthPassthrough("AUTH ROT13".to_owned())
        );
    }

    #[test]
    fn test_auth_wrong_arity() {
        assert_eq!(Command::classify("AUTH"), Command::AuthMalformed);
        assert_eq!(Command::classify("AUTH AES/ECB extra"), Command::AuthMalformed);
    }

    #[test]
    fn test_quit_is_exact_word() {
        assert_eq!(Command::classify("QUIT"), Command::Quit);
        assert_eq!(Command::classify("quit"), Command::Quit);
        assert_eq!(
            Command::classify("QUITTER"),
            Command::Other("QUITTER".to_owned())
        );
    }

    #[test]
    fn test_fetch() {
        assert_eq!(
            Command::classify("FETCH 1:10"),
            Command::Fetch("FETCH 1:10".to_owned())
        );
        assert_eq!(Command::classify("fetch"), Command::Fetch("fetch".to_owned()));
    }

    #[test]
    fn test_other_and_trimming() {
        assert_eq!(
            Command::classify("  NOOP  "),
            Command::Other("NOOP".to_owned())
        );
    }
}
