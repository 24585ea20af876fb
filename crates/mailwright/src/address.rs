//! Mailbox (display name + address) values.

use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use crate::encoding::header::{ENCODED_WORD_MAX_LENGTH, q_escape};

/// Characters that RFC 2047 section 5 does not allow in a Q-encoded phrase.
const PHRASE_SPECIALS: &str = "\"#$%&'(),.:;<>@[]^`{|}~";

/// Mailbox with an optional display name.
///
/// The address is taken as already validated; it is rendered verbatim
/// inside angle brackets.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Mailbox {
    /// Display name (may be empty).
    pub name: String,
    /// Email address.
    pub address: String,
}

impl Mailbox {
    /// Creates a mailbox with a display name and address.
    #[must_use]
    pub fn new(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
        }
    }

    /// Creates a mailbox with just an address.
    #[must_use]
    pub fn from_address(address: impl Into<String>) -> Self {
        Self::new(String::new(), address)
    }

    /// Returns true if the address is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.address.is_empty()
    }

    /// Returns the domain part of the address, if any.
    #[must_use]
    pub fn domain(&self) -> Option<&str> {
        self.address
            .rsplit_once('@')
            .map(|(_, domain)| domain)
            .filter(|domain| !domain.is_empty())
    }
}

impl fmt::Display for Mailbox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.name.is_empty() {
            return write!(f, "<{}>", self.address);
        }

        if self.name.chars().all(|c| matches!(c, ' '..='~' | '\t')) {
            f.write_str("\"")?;
            for c in self.name.chars() {
                if c == '"' || c == '\\' {
                    f.write_str("\\")?;
                }
                write!(f, "{c}")?;
            }
            return write!(f, "\" <{}>", self.address);
        }

        let words = if self.name.contains(|c| PHRASE_SPECIALS.contains(c)) {
            b_encode_phrase(&self.name)
        } else {
            q_encode_phrase(&self.name)
        };
        write!(f, "{} <{}>", words.join(" "), self.address)
    }
}

/// Q-encodes a display name into encoded words no longer than
/// [`ENCODED_WORD_MAX_LENGTH`], breaking only between characters.
fn q_encode_phrase(name: &str) -> Vec<String> {
    const FRAMING: usize = "=?utf-8?q?".len() + "?=".len();
    let mut words = Vec::new();
    let mut text = String::new();
    let mut unit = String::new();

    for c in name.chars() {
        unit.clear();
        q_escape(c, &mut unit);
        if !text.is_empty() && FRAMING + text.len() + unit.len() > ENCODED_WORD_MAX_LENGTH {
            words.push(format!("=?utf-8?q?{text}?="));
            text.clear();
        }
        text.push_str(&unit);
    }
    words.push(format!("=?utf-8?q?{text}?="));
    words
}

/// B-encodes a display name into encoded words no longer than
/// [`ENCODED_WORD_MAX_LENGTH`], breaking only between characters.
fn b_encode_phrase(name: &str) -> Vec<String> {
    const FRAMING: usize = "=?utf-8?b?".len() + "?=".len();
    let mut words = Vec::new();
    let mut chunk_start = 0;
    let mut chunk_end = 0;

    for (i, c) in name.char_indices() {
        let end = i + c.len_utf8();
        if chunk_end > chunk_start
            && FRAMING + base64_len(end - chunk_start) > ENCODED_WORD_MAX_LENGTH
        {
            words.push(b_word(&name[chunk_start..chunk_end]));
            chunk_start = chunk_end;
        }
        chunk_end = end;
    }
    words.push(b_word(&name[chunk_start..chunk_end]));
    words
}

fn b_word(chunk: &str) -> String {
    format!("=?utf-8?b?{}?=", STANDARD.encode(chunk))
}

const fn base64_len(bytes: usize) -> usize {
    bytes.div_ceil(3) * 4
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
    use crate::encoding::header::decode_encoded_word;

    #[test]
    fn test_mailbox_address_only() {
        let mailbox = Mailbox::from_address("user@example.com");
        assert_eq!(mailbox.to_string(), "<user@example.com>");
        assert!(!mailbox.is_empty());
    }

    #[test]
    fn test_mailbox_ascii_name() {
        let mailbox = Mailbox::new("John Doe", "john@example.com");
        assert_eq!(mailbox.to_string(), "\"John Doe\" <john@example.com>");
    }

    #[test]
    fn test_mailbox_name_escaping() {
        let mailbox = Mailbox::new("Say \"hi\" \\o/", "a@x.com");
        assert_eq!(mailbox.to_string(), r#""Say \"hi\" \\o/" <a@x.com>"#);
    }

    #[test]
    fn test_mailbox_non_ascii_name_q_encoded() {
        let mailbox = Mailbox::new("测试", "from@example.org");
        assert_eq!(
            mailbox.to_string(),
            "=?utf-8?q?=E6=B5=8B=E8=AF=95?= <from@example.org>"
        );
    }

    #[test]
    fn test_mailbox_non_ascii_name_with_specials_b_encoded() {
        let mailbox = Mailbox::new("Müller, Jörg", "j@example.de");
        let rendered = mailbox.to_string();
        assert!(rendered.starts_with("=?utf-8?b?"));
        let (word, _) = rendered.split_once(' ').unwrap();
        assert_eq!(decode_encoded_word(word).unwrap(), "Müller, Jörg");
    }

    #[test]
    fn test_long_name_splits_into_words() {
        let name = "名".repeat(30);
        let words = q_encode_phrase(&name);
        assert!(words.len() > 1);
        let decoded: String = words.iter().map(|w| decode_encoded_word(w).unwrap()).collect();
        assert_eq!(decoded, name);
        assert!(words.iter().all(|w| w.len() <= ENCODED_WORD_MAX_LENGTH));

        let name = format!("{}.", "é".repeat(40));
        let words = b_encode_phrase(&name);
        assert!(words.len() > 1);
        let decoded: String = words.iter().map(|w| decode_encoded_word(w).unwrap()).collect();
        assert_eq!(decoded, name);
        assert!(words.iter().all(|w| w.len() <= ENCODED_WORD_MAX_LENGTH));
    }

    #[test]
    fn test_mailbox_domain() {
        assert_eq!(Mailbox::from_address("a@x.com").domain(), Some("x.com"));
        assert_eq!(Mailbox::from_address("nodomain").domain(), None);
        assert!(Mailbox::default().is_empty());
    }
}
