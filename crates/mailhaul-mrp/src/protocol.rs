//! Response-line grammar.
//!
//! Server responses come in three shapes: a single `OK` line, a single
//! `BAD` line, or a multi-line block introduced by `*` and closed by a
//! terminator line (`OK FETCH` for FETCH, any `OK` line otherwise). The
//! classifier lives here, in one place, so the dispatcher's state machine
//! can be tested without a transport.

/// Classification of one server response line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseKind {
    /// Line starts with `OK` — success, or the terminator of a block.
    Success,
    /// Line starts with `*` — introduces (or continues) a multi-line block.
    MultiStart,
    /// Line starts with `BAD` — command rejected.
    Error,
    /// Anything else; displayed verbatim.
    Other,
}

impl ResponseKind {
    /// Classifies a response line by its leading token.
    ///
    /// `BAD` is checked before `OK` so the two can never be confused, and
    /// `*` before both since block markers take precedence in the grammar.
    #[must_use]
    pub fn of(line: &str) -> Self {
        if line.starts_with('*') {
            Self::MultiStart
        } else if line.starts_with("BAD") {
            Self::Error
        } else if line.starts_with("OK") {
            Self::Success
        } else {
            Self::Other
        }
    }
}

/// The sentinel that terminates a FETCH block.
///
/// The terminator line is consumed but never becomes part of the block.
#[must_use]
pub fn is_fetch_terminator(line: &str) -> bool {
    line.starts_with("OK FETCH")
}

/// Whether a QUIT acknowledgment permits closing the stream.
///
/// The server acknowledges QUIT with a 2xx-style numeric code.
#[must_use]
pub fn is_quit_ack(line: &str) -> bool {
    line.starts_with('2')
}

/// The record-start marker inside a FETCH block.
pub const RECORD_MARKER: char = '*';

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
    fn test_classify() {
        assert_eq!(ResponseKind::of("OK MRS ready"), ResponseKind::Success);
        assert_eq!(ResponseKind::of("OK FETCH completed"), ResponseKind::Success);
        assert_eq!(ResponseKind::of("BAD unknown command"), ResponseKind::Error);
        assert_eq!(ResponseKind::of("* 2 messages"), ResponseKind::MultiStart);
        assert_eq!(ResponseKind::of("221 bye"), ResponseKind::Other);
        assert_eq!(ResponseKind::of(""), ResponseKind::Other);
    }

    #[test]
    fn test_marker_wins_over_status_words() {
        // A block line that happens to mention OK is still part of a block.
        assert_eq!(ResponseKind::of("* OK-ish data"), ResponseKind::MultiStart);
    }

    #[test]
    fn test_fetch_terminator() {
        assert!(is_fetch_terminator("OK FETCH completed"));
        assert!(is_fetch_terminator("OK FETCH"));
        assert!(!is_fetch_terminator("OK done"));
        assert!(!is_fetch_terminator("ID: 4"));
    }

    #[test]
    fn test_quit_ack() {
        assert!(is_quit_ack("221 closing transmission channel"));
        assert!(is_quit_ack("2"));
        assert!(!is_quit_ack("OK bye"));
        assert!(!is_quit_ack("500 nope"));
    }
}
