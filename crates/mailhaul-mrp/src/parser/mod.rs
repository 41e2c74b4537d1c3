//! FETCH block parsing.
//!
//! An aggregated FETCH block is a CRLF-separated sequence of lines in
//! which each record opens with a `*` marker line. The marker itself
//! carries no record data; everything between two markers (or between a
//! marker and the end of the block) is one record sub-block.

mod message;

pub use message::Message;

use crate::protocol::RECORD_MARKER;

/// Splits a block on CRLF, dropping trailing empty segments so a final
/// terminator does not read as an extra blank line. Interior blank lines
/// are preserved.
pub(crate) fn split_block(block: &str) -> Vec<&str> {
    let mut lines: Vec<&str> = block.split("\r\n").collect();
    while lines.last() == Some(&"") {
        lines.pop();
    }
    lines
}

/// Splits an aggregated FETCH block into message records.
///
/// A line starting with the record marker finalizes the current sub-block
/// and opens the next; the final sub-block is finalized after the scan.
/// Sub-blocks with no content are suppressed, so a block that ends right
/// after a marker does not yield a phantom record. A sub-block whose
/// fields fail to parse is skipped with a warning rather than poisoning
/// the whole response.
#[must_use]
pub fn parse_messages(block: &str) -> Vec<Message> {
    let mut messages = Vec::new();
    let mut sub_block = String::new();
    for line in split_block(block) {
        if line.starts_with(RECORD_MARKER) {
            finalize(&mut sub_block, &mut messages);
        } else {
            sub_block.push_str(line);
            sub_block.push_str("\r\n");
        }
    }
    finalize(&mut sub_block, &mut messages);
    messages
}

/// Converts one accumulated sub-block into a record, if it has content.
fn finalize(sub_block: &mut String, messages: &mut Vec<Message>) {
    let block = std::mem::take(sub_block);
    if block.lines().all(|line| line.trim().is_empty()) {
        return;
    }
    match Message::parse(&block) {
        Ok(message) => messages.push(message),
        Err(error) => {
            tracing::warn!(%error, "skipping malformed message record");
        }
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

    #[test]
    fn test_two_records_split_on_marker() {
        let block = "ID: 1\r\nUID: 1\r\n* \r\nID: 2\r\nUID: 2\r\n";
        let messages = parse_messages(block);
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].id, 1);
        assert_eq!(messages[0].uid, 1);
        assert_eq!(messages[1].id, 2);
        assert_eq!(messages[1].uid, 2);
    }

    #[test]
    fn test_marker_line_content_is_discarded() {
        let block = "* message 1 of 1\r\nID: 9\r\n";
        let messages = parse_messages(block);
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].id, 9);
        assert!(messages[0].body.is_empty());
    }

    #[test]
    fn test_trailing_marker_yields_no_phantom_record() {
        let messages = parse_messages("ID: 1\r\n* \r\n");
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].id, 1);
    }

    #[test]
    fn test_empty_block_yields_nothing() {
        assert!(parse_messages("").is_empty());
        assert!(parse_messages("* \r\n* \r\n").is_empty());
    }

    #[test]
    fn test_malformed_record_is_skipped() {
        let block = "ID: not-a-number\r\n* \r\nID: 2\r\n";
        let messages = parse_messages(block);
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].id, 2);
    }

    #[test]
    fn test_body_lines_accumulate() {
        let block = "ID: 3\r\nhello\r\nworld\r\n";
        let messages = parse_messages(block);
        assert_eq!(messages[0].body, "hello\r\nworld\r\n");
    }

    #[test]
    fn test_interior_blank_lines_survive_in_body() {
        let block = "ID: 4\r\nfirst paragraph\r\n\r\nsecond paragraph\r\n";
        let messages = parse_messages(block);
        assert_eq!(messages[0].body, "first paragraph\r\n\r\nsecond paragraph\r\n");
    }
}
