//! Header field encoding.
//!
//! Values are split into words at spaces, each word keeping the spaces that
//! precede it. Printable ASCII words pass through; any other word becomes one
//! or more `=?utf-8?q?…?=` encoded words. Lines fold at word boundaries so
//! that no line exceeds [`LINE_SHOULD_LENGTH`] unless a single word forces it.

use std::fmt::Write as _;

use crate::address::Mailbox;
use crate::encoding::transfer::{decode_base64, decode_quoted_printable};
use crate::encoding::{CRLF, LINE_MAX_LENGTH, LINE_SHOULD_LENGTH};
use crate::error::{Error, Result};
use crate::header::canonical_name;

const ENCODED_WORD_PREFIX: &[u8] = b"=?utf-8?q?";
const ENCODED_WORD_SUFFIX: &[u8] = b"?=";

/// Maximum length of a single encoded word (RFC 2047 section 2).
pub const ENCODED_WORD_MAX_LENGTH: usize = 75;

/// Writes a free-text header field, folded and escaped.
///
/// The output is `Name: value` terminated by CRLF, with continuation lines
/// starting with whitespace.
pub fn write_header(out: &mut Vec<u8>, name: &str, value: &str) {
    let prefix = format!("{}: ", canonical_name(name));
    let plain_limit = LINE_MAX_LENGTH.saturating_sub(prefix.len());
    let mut folder = Folder::new(out, prefix);
    let mut previous_encoded = false;

    for (sep, text) in words(value) {
        let plain = sep.len() + text.len() <= plain_limit && text.bytes().all(is_printable);
        if plain {
            folder.push(format!("{sep}{text}").as_bytes());
        } else if previous_encoded {
            // Whitespace between adjacent encoded words is dropped by decoders,
            // so the separator moves inside the encoded text.
            folder.push_encoded(b" ", &format!("{sep}{text}"));
        } else {
            // At most one separator space stays raw; the rest of a long
            // whitespace run is encoded so it can be folded.
            let (lead, rest) = sep.split_at(sep.len().min(1));
            folder.push_encoded(lead.as_bytes(), &format!("{rest}{text}"));
        }
        previous_encoded = !plain;
    }

    folder.finish();
}

/// Writes an address list header field.
///
/// Mailboxes are joined by `, ` and the line folds between mailboxes, never
/// inside one.
pub fn write_address_header(out: &mut Vec<u8>, name: &str, mailboxes: &[Mailbox]) {
    let mut folder = Folder::new(out, format!("{}:", canonical_name(name)));
    let last = mailboxes.len().saturating_sub(1);

    for (i, mailbox) in mailboxes.iter().enumerate() {
        let mut word = format!(" {mailbox}");
        if i != last {
            word.push(',');
        }
        folder.push(word.as_bytes());
    }

    folder.finish();
}

/// Escapes one character for the body of a Q-encoded word.
pub(crate) fn q_escape(c: char, out: &mut String) {
    let mut buf = [0u8; 4];
    for &b in c.encode_utf8(&mut buf).as_bytes() {
        match b {
            b' ' => out.push('_'),
            b'=' | b'?' | b'_' => push_hex(out, b),
            b'!'..=b'~' => out.push(char::from(b)),
            _ => push_hex(out, b),
        }
    }
}

fn push_hex(out: &mut String, b: u8) {
    let _ = write!(out, "={b:02X}");
}

const fn is_printable(b: u8) -> bool {
    matches!(b, b' '..=b'~')
}

/// Splits a value into `(leading spaces, word)` pairs.
fn words(value: &str) -> impl Iterator<Item = (&str, &str)> {
    let mut rest = value;
    std::iter::from_fn(move || {
        if rest.is_empty() {
            return None;
        }
        let word_start = rest.len() - rest.trim_start_matches(' ').len();
        let word_end = rest[word_start..]
            .find(' ')
            .map_or(rest.len(), |i| word_start + i);
        let item = (&rest[..word_start], &rest[word_start..word_end]);
        rest = &rest[word_end..];
        Some(item)
    })
}

/// Accumulates one logical header line and folds it onto continuation lines.
struct Folder<'a> {
    out: &'a mut Vec<u8>,
    line: Vec<u8>,
    prefix_len: usize,
}

impl<'a> Folder<'a> {
    fn new(out: &'a mut Vec<u8>, prefix: String) -> Self {
        let line = prefix.into_bytes();
        let prefix_len = line.len();
        Self {
            out,
            line,
            prefix_len,
        }
    }

    fn at_line_start(&self) -> bool {
        self.line.len() <= self.prefix_len
    }

    fn fits(&self, len: usize) -> bool {
        self.line.len() + len <= LINE_SHOULD_LENGTH
    }

    fn fold(&mut self) {
        self.out.extend_from_slice(&self.line);
        self.out.extend_from_slice(CRLF);
        self.line.clear();
        self.prefix_len = 0;
    }

    /// Appends a word, folding first if it does not fit. Every word except
    /// the first of a field starts with whitespace.
    fn push(&mut self, word: &[u8]) {
        if !self.at_line_start() && !self.fits(word.len()) {
            self.fold();
        }
        self.line.extend_from_slice(word);
    }

    /// Appends `text` as encoded words preceded by the raw `lead` whitespace.
    fn push_encoded(&mut self, lead: &[u8], text: &str) {
        let units: Vec<String> = text
            .chars()
            .map(|c| {
                let mut unit = String::new();
                q_escape(c, &mut unit);
                unit
            })
            .collect();

        // Move to a fresh line when the whole word would fit there; otherwise
        // start here as long as the first character fits.
        let framing = lead.len() + ENCODED_WORD_PREFIX.len() + ENCODED_WORD_SUFFIX.len();
        let total = framing + units.iter().map(String::len).sum::<usize>();
        let wanted = if total <= LINE_SHOULD_LENGTH {
            total
        } else {
            framing + units.first().map_or(0, String::len)
        };
        if !self.at_line_start() && !self.fits(wanted) {
            self.fold();
        }

        let mut word = lead.to_vec();
        word.extend_from_slice(ENCODED_WORD_PREFIX);
        let mut word_start = lead.len();
        let mut has_units = false;

        for unit in &units {
            let closing = unit.len() + ENCODED_WORD_SUFFIX.len();
            let over_line = !self.fits(word.len() + closing);
            let over_word = word.len() - word_start + closing > ENCODED_WORD_MAX_LENGTH;
            if has_units && (over_line || over_word) {
                word.extend_from_slice(ENCODED_WORD_SUFFIX);
                self.line.extend_from_slice(&word);
                self.fold();

                word.clear();
                word.push(b' ');
                word.extend_from_slice(ENCODED_WORD_PREFIX);
                word_start = 1;
            }
            word.extend_from_slice(unit.as_bytes());
            has_units = true;
        }

        word.extend_from_slice(ENCODED_WORD_SUFFIX);
        self.line.extend_from_slice(&word);
    }

    fn finish(mut self) {
        self.fold();
    }
}

/// Decodes a single RFC 2047 encoded word (`=?charset?encoding?text?=`).
///
/// Input that is not an encoded word is returned unchanged.
///
/// # Errors
///
/// Returns an error if the word is malformed, uses an unknown encoding, or
/// does not decode to UTF-8.
pub fn decode_encoded_word(word: &str) -> Result<String> {
    if !is_encoded_word(word) {
        return Ok(word.to_string());
    }

    let inner = &word[2..word.len() - 2];
    let parts: Vec<&str> = inner.splitn(3, '?').collect();
    let [_charset, encoding, encoded_text] = parts.as_slice() else {
        return Err(Error::InvalidEncoding(format!("Invalid encoded word: {word}")));
    };

    let bytes = match encoding.to_ascii_uppercase().as_str() {
        "B" => decode_base64(encoded_text)?,
        "Q" => decode_quoted_printable(&encoded_text.replace('_', " "))?,
        other => {
            return Err(Error::InvalidEncoding(format!("Unknown encoding: {other}")));
        }
    };

    String::from_utf8(bytes).map_err(Into::into)
}

/// Decodes a folded header value that may contain encoded words.
///
/// Line folds are removed and whitespace between two adjacent encoded words
/// is dropped, as RFC 2047 section 6.2 requires.
///
/// # Errors
///
/// Returns an error if any encoded word fails to decode.
pub fn decode_header_value(value: &str) -> Result<String> {
    let unfolded = value.replace("\r\n", "");
    let mut out = String::with_capacity(unfolded.len());
    let mut rest = unfolded.as_str();
    let mut previous_encoded = false;

    while !rest.is_empty() {
        let trimmed = rest.trim_start_matches([' ', '\t']);
        let (space, after) = rest.split_at(rest.len() - trimmed.len());
        let word_len = after.find([' ', '\t']).unwrap_or(after.len());
        let (word, tail) = after.split_at(word_len);
        rest = tail;

        let encoded = is_encoded_word(word);
        if !(encoded && previous_encoded) {
            out.push_str(space);
        }
        if encoded {
            out.push_str(&decode_encoded_word(word)?);
        } else {
            out.push_str(word);
        }
        previous_encoded = encoded;
    }

    Ok(out)
}

fn is_encoded_word(word: &str) -> bool {
    word.len() > 4 && word.starts_with("=?") && word.ends_with("?=")
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
    use proptest::prelude::*;

    fn header(name: &str, value: &str) -> String {
        let mut out = Vec::new();
        write_header(&mut out, name, value);
        String::from_utf8(out).unwrap()
    }

    fn field_value(rendered: &str) -> &str {
        let (_, value) = rendered.split_once(": ").unwrap();
        value.strip_suffix("\r\n").unwrap()
    }

    #[test]
    fn test_words_keep_leading_spaces() {
        let split: Vec<_> = words("a  b c ").collect();
        assert_eq!(split, vec![("", "a"), ("  ", "b"), (" ", "c"), (" ", "")]);
    }

    #[test]
    fn test_ascii_header_passes_through() {
        assert_eq!(header("subject", "Hello, World!"), "Subject: Hello, World!\r\n");
    }

    #[test]
    fn test_empty_value() {
        assert_eq!(header("Subject", ""), "Subject: \r\n");
    }

    #[test]
    fn test_ascii_header_folds_at_word_boundary() {
        let value = "word ".repeat(30);
        let rendered = header("Subject", value.trim_end());
        for line in rendered.split_terminator("\r\n") {
            assert!(line.len() <= LINE_SHOULD_LENGTH, "line too long: {line:?}");
        }
        let continuation: Vec<_> = rendered.split_terminator("\r\n").skip(1).collect();
        assert!(!continuation.is_empty());
        assert!(continuation.iter().all(|l| l.starts_with(" word")));
        assert_eq!(rendered.replace("\r\n", ""), format!("Subject: {}", value.trim_end()));
    }

    #[test]
    fn test_non_ascii_word_is_encoded() {
        assert_eq!(
            header("Subject", "Héllo world"),
            "Subject: =?utf-8?q?H=C3=A9llo?= world\r\n"
        );
    }

    #[test]
    fn test_special_bytes_escaped_in_encoded_word() {
        assert_eq!(
            header("Subject", "ü=?_"),
            "Subject: =?utf-8?q?=C3=BC=3D=3F=5F?=\r\n"
        );
    }

    #[test]
    fn test_adjacent_encoded_words_keep_space() {
        let rendered = header("Subject", "привет мир");
        assert_eq!(
            rendered,
            concat!(
                "Subject: =?utf-8?q?=D0=BF=D1=80=D0=B8=D0=B2=D0=B5=D1=82?=\r\n",
                " =?utf-8?q?_=D0=BC=D0=B8=D1=80?=\r\n"
            )
        );
        assert_eq!(decode_header_value(field_value(&rendered)).unwrap(), "привет мир");
    }

    #[test]
    fn test_long_non_ascii_word_spans_lines() {
        let value = "测".repeat(40);
        let rendered = header("Subject", &value);
        let lines: Vec<_> = rendered.split_terminator("\r\n").collect();
        assert!(lines.len() > 2);
        for line in &lines {
            assert!(line.len() <= LINE_SHOULD_LENGTH, "line too long: {line:?}");
            assert!(line.trim_start().trim_start_matches("Subject: ").starts_with("=?utf-8?q?"));
            assert!(line.ends_with("?="));
        }
        for line in &lines[1..] {
            assert!(line.starts_with(" =?utf-8?q?"));
        }
        assert_eq!(decode_header_value(field_value(&rendered)).unwrap(), value);
    }

    #[test]
    fn test_mixed_subject_round_trip() {
        let subject = "A test subject 测试对象测试对象测试对象测试对a象测试对象测试对象 \
                       测试对象 测试对象测试对象 测试对象 测试对象";
        let rendered = header("Subject", subject);
        for line in rendered.split_terminator("\r\n") {
            assert!(line.len() <= LINE_SHOULD_LENGTH);
        }
        assert!(rendered.starts_with("Subject: A test subject "));
        assert_eq!(decode_header_value(field_value(&rendered)).unwrap(), subject);
    }

    #[test]
    fn test_control_characters_are_encoded() {
        let rendered = header("Subject", "evil\r\nBcc: x@y");
        assert_eq!(rendered.matches("\r\n").count(), 1);
        assert_eq!(
            decode_header_value(field_value(&rendered)).unwrap(),
            "evil\r\nBcc: x@y"
        );
    }

    #[test]
    fn test_overlong_printable_word_is_encoded() {
        let value = "x".repeat(LINE_MAX_LENGTH + 10);
        let rendered = header("Subject", &value);
        for line in rendered.split_terminator("\r\n") {
            assert!(line.len() <= LINE_SHOULD_LENGTH);
        }
        assert_eq!(decode_header_value(field_value(&rendered)).unwrap(), value);
    }

    #[test]
    fn test_long_whitespace_run_respects_hard_limit() {
        for value in [
            format!("a{}b", " ".repeat(1100)),
            format!("a{}é", " ".repeat(1100)),
            format!("a{}", " ".repeat(1100)),
        ] {
            let rendered = header("Subject", &value);
            for line in rendered.split_terminator("\r\n") {
                assert!(line.len() <= LINE_SHOULD_LENGTH, "line too long: {}", line.len());
            }
            assert_eq!(decode_header_value(field_value(&rendered)).unwrap(), value);
        }
    }

    #[test]
    fn test_double_space_before_encoded_word() {
        let rendered = header("Subject", "a  é");
        assert_eq!(rendered, "Subject: a =?utf-8?q?_=C3=A9?=\r\n");
        assert_eq!(decode_header_value(field_value(&rendered)).unwrap(), "a  é");
    }

    #[test]
    fn test_address_header_single() {
        let mut out = Vec::new();
        let from = Mailbox::new("A", "a@x.com");
        write_address_header(&mut out, "from", &[from]);
        assert_eq!(String::from_utf8(out).unwrap(), "From: \"A\" <a@x.com>\r\n");
    }

    #[test]
    fn test_address_header_folds_between_addresses() {
        let mailboxes: Vec<_> = (0..5)
            .map(|i| Mailbox::new(format!("Recipient Number {i}"), format!("recipient.number.{i}@example.org")))
            .collect();
        let mut out = Vec::new();
        write_address_header(&mut out, "To", &mailboxes);
        let rendered = String::from_utf8(out).unwrap();
        let lines: Vec<_> = rendered.split_terminator("\r\n").collect();

        assert!(lines.len() > 1);
        for line in &lines {
            assert!(line.len() <= LINE_SHOULD_LENGTH);
        }
        for line in &lines[1..] {
            assert!(line.starts_with(' ') && !line.starts_with("  "));
        }
        for mailbox in &mailboxes {
            let formatted = mailbox.to_string();
            assert!(lines.iter().any(|l| l.contains(&formatted)));
        }
    }

    #[test]
    fn test_decode_encoded_word() {
        assert_eq!(decode_encoded_word("=?utf-8?B?SMOpbGxv?=").unwrap(), "Héllo");
        assert_eq!(decode_encoded_word("=?utf-8?Q?H=C3=A9llo_you?=").unwrap(), "Héllo you");
        assert_eq!(decode_encoded_word("plain").unwrap(), "plain");
        assert!(decode_encoded_word("=?utf-8?X?abc?=").is_err());
    }

    proptest! {
        #[test]
        fn prop_printable_ascii_unchanged(value in "[ -~]{0,60}") {
            prop_assert_eq!(header("Subject", &value), format!("Subject: {value}\r\n"));
        }

        #[test]
        fn prop_non_ascii_round_trip(value in "\\PC{0,200}") {
            let rendered = header("Subject", &value);
            for line in rendered.split_terminator("\r\n") {
                prop_assert!(line.len() <= LINE_SHOULD_LENGTH);
            }
            prop_assert_eq!(decode_header_value(field_value(&rendered)).unwrap(), value);
        }
    }
}
