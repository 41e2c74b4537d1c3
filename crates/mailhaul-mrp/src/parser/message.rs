//! The parsed message record.

use std::fmt;

use chrono::NaiveDate;

use crate::{Error, Result};

/// Wire format of the `Date:` field.
const DATE_FORMAT: &str = "%Y-%m-%d";

/// One retrieved mail item.
///
/// Built from the field lines of a single record sub-block; immutable once
/// parsed. Fields absent from the sub-block keep their defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Message {
    /// Numeric message ID.
    pub id: u32,
    /// Numeric message UID.
    pub uid: u32,
    /// Sender address text.
    pub sender: String,
    /// Recipient address text.
    pub recipients: String,
    /// Subject line.
    pub subject: String,
    /// Calendar date of the message, if present and well-formed.
    pub date: Option<NaiveDate>,
    /// MIME type indicator.
    pub mime: String,
    /// Everything in the sub-block that matched no field prefix.
    pub body: String,
}

impl Message {
    /// Parses one record sub-block into a message.
    ///
    /// Each line is matched against the field prefixes; the remainder is
    /// trimmed and assigned. Lines matching no prefix are appended to the
    /// body with their terminator.
    ///
    /// # Errors
    ///
    /// [`Error::Parse`] if `ID:`/`UID:` is non-numeric or `Date:` does not
    /// match `%Y-%m-%d`. The error poisons this record only; callers skip
    /// it and keep the rest of the response.
    pub fn parse(sub_block: &str) -> Result<Self> {
        let mut message = Self::default();
        for line in super::split_block(sub_block) {
            if let Some(rest) = line.strip_prefix("ID:") {
                message.id = parse_number("ID:", rest)?;
            } else if let Some(rest) = line.strip_prefix("UID:") {
                message.uid = parse_number("UID:", rest)?;
            } else if let Some(rest) = line.strip_prefix("Sender:") {
                message.sender = rest.trim().to_owned();
            } else if let Some(rest) = line.strip_prefix("Recipients:") {
                message.recipients = rest.trim().to_owned();
            } else if let Some(rest) = line.strip_prefix("Subject:") {
                message.subject = rest.trim().to_owned();
            } else if let Some(rest) = line.strip_prefix("Date:") {
                message.date = Some(parse_date(rest)?);
            } else if let Some(rest) = line.strip_prefix("Mime:") {
                message.mime = rest.trim().to_owned();
            } else {
                message.body.push_str(line);
                message.body.push_str("\r\n");
            }
        }
        Ok(message)
    }
}

fn parse_number(field: &'static str, value: &str) -> Result<u32> {
    value.trim().parse().map_err(|_| Error::Parse {
        field,
        message: format!("not a number: {value:?}"),
    })
}

fn parse_date(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT).map_err(|_| Error::Parse {
        field: "Date:",
        message: format!("expected {DATE_FORMAT}: {value:?}"),
    })
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "ID: {}", self.id)?;
        writeln!(f, "UID: {}", self.uid)?;
        writeln!(f, "Sender: {}", self.sender)?;
        writeln!(f, "Recipients: {}", self.recipients)?;
        writeln!(f, "Subject: {}", self.subject)?;
        match self.date {
            Some(date) => writeln!(f, "Date: {}", date.format(DATE_FORMAT))?,
            None => writeln!(f, "Date:")?,
        }
        writeln!(f, "Mime: {}", self.mime)?;
        write!(f, "{}", self.body)
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
    fn test_parse_all_fields() {
        let block = "ID: 7\r\nUID: 1042\r\nSender: alice@example.com\r\n\
                     Recipients: bob@example.com\r\nSubject: lunch\r\n\
                     Date: 2024-03-09\r\nMime: text/plain\r\nSee you at noon.\r\n";
        let message = Message::parse(block).unwrap();
        assert_eq!(message.id, 7);
        assert_eq!(message.uid, 1042);
        assert_eq!(message.sender, "alice@example.com");
        assert_eq!(message.recipients, "bob@example.com");
        assert_eq!(message.subject, "lunch");
        assert_eq!(message.date, NaiveDate::from_ymd_opt(2024, 3, 9));
        assert_eq!(message.mime, "text/plain");
        assert_eq!(message.body, "See you at noon.\r\n");
    }

    #[test]
    fn test_unknown_lines_go_to_body() {
        let message = Message::parse("first body line\r\nsecond body line").unwrap();
        assert_eq!(message.body, "first body line\r\nsecond body line\r\n");
        assert_eq!(message.id, 0);
    }

    #[test]
    fn test_bad_numeric_field() {
        let err = Message::parse("ID: twelve\r\n").unwrap_err();
        assert!(matches!(err, Error::Parse { field: "ID:", .. }));
    }

    #[test]
    fn test_bad_date_field() {
        let err = Message::parse("Date: 03/09/2024\r\n").unwrap_err();
        assert!(matches!(err, Error::Parse { field: "Date:", .. }));
    }

    #[test]
    fn test_display_roundtrips_fields() {
        let block = "ID: 1\r\nUID: 2\r\nSubject: hi\r\nDate: 2024-01-15\r\n";
        let rendered = Message::parse(block).unwrap().to_string();
        assert!(rendered.contains("ID: 1"));
        assert!(rendered.contains("Subject: hi"));
        assert!(rendered.contains("Date: 2024-01-15"));
    }
}
