//! Extra header fields.

use crate::error::{Error, Result};

/// Ordered collection of extra header fields.
///
/// Names are stored in canonical form. Names keep the order in which they
/// were first added and each name keeps its values in insertion order; every
/// value is rendered as its own header line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    entries: Vec<(String, Vec<String>)>,
}

impl Headers {
    /// Creates a new empty header collection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a header value after any existing values of the same name.
    pub fn add(&mut self, name: &str, value: impl Into<String>) {
        let name = canonical_name(name);
        let value = value.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some((_, values)) => values.push(value),
            None => self.entries.push((name, vec![value])),
        }
    }

    /// Sets a header value, replacing any existing values.
    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        self.remove(name);
        self.add(name, value);
    }

    /// Gets the first value for a header.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.get_all(name).next()
    }

    /// Gets all values for a header, in insertion order.
    pub fn get_all(&self, name: &str) -> impl Iterator<Item = &str> {
        let name = canonical_name(name);
        self.entries
            .iter()
            .filter(move |(n, _)| *n == name)
            .flat_map(|(_, values)| values.iter().map(String::as_str))
    }

    /// Removes all values for a header.
    pub fn remove(&mut self, name: &str) {
        let name = canonical_name(name);
        self.entries.retain(|(n, _)| *n != name);
    }

    /// Returns true if no header has been added.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns an iterator over every (name, value) line in render order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .flat_map(|(name, values)| values.iter().map(move |v| (name.as_str(), v.as_str())))
    }
}

/// Returns the canonical spelling of a header name.
///
/// The first letter and every letter following a hyphen are upper-cased and
/// the rest lower-cased (`content-type` becomes `Content-Type`). `MIME-Version`
/// keeps its conventional spelling. Names containing characters outside the
/// field-name range are returned unchanged.
#[must_use]
pub fn canonical_name(name: &str) -> String {
    if name.eq_ignore_ascii_case("mime-version") {
        return "MIME-Version".to_string();
    }
    if !name.bytes().all(is_field_name_byte) {
        return name.to_string();
    }

    let mut upper = true;
    name.chars()
        .map(|c| {
            let mapped = if upper {
                c.to_ascii_uppercase()
            } else {
                c.to_ascii_lowercase()
            };
            upper = c == '-';
            mapped
        })
        .collect()
}

/// Checks that a header name is a valid field name.
///
/// # Errors
///
/// Returns [`Error::InvalidHeader`] if the name is empty or contains bytes
/// outside printable ASCII, whitespace, or a colon.
pub fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() || !name.bytes().all(is_field_name_byte) {
        return Err(Error::InvalidHeader(name.to_string()));
    }
    Ok(())
}

const fn is_field_name_byte(b: u8) -> bool {
    b > b' ' && b < 0x7F && b != b':'
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
    fn test_headers_new() {
        let headers = Headers::new();
        assert!(headers.is_empty());
    }

    #[test]
    fn test_headers_add_get() {
        let mut headers = Headers::new();
        headers.add("x-mailer", "mailwright");
        assert_eq!(headers.get("X-Mailer"), Some("mailwright"));
        assert_eq!(headers.get("x-MAILER"), Some("mailwright"));
    }

    #[test]
    fn test_headers_preserve_order() {
        let mut headers = Headers::new();
        headers.add("X-B", "1");
        headers.add("X-A", "2");
        headers.add("x-b", "3");

        let lines: Vec<_> = headers.iter().collect();
        assert_eq!(lines, vec![("X-B", "1"), ("X-B", "3"), ("X-A", "2")]);
    }

    #[test]
    fn test_headers_set() {
        let mut headers = Headers::new();
        headers.add("Keywords", "a");
        headers.add("Keywords", "b");
        assert_eq!(headers.get_all("Keywords").count(), 2);

        headers.set("Keywords", "c");
        assert_eq!(headers.get_all("Keywords").collect::<Vec<_>>(), vec!["c"]);
    }

    #[test]
    fn test_headers_remove() {
        let mut headers = Headers::new();
        headers.add("Comments", "Test");
        headers.remove("comments");
        assert!(headers.get("Comments").is_none());
        assert!(headers.is_empty());
    }

    #[test]
    fn test_canonical_name() {
        assert_eq!(canonical_name("content-type"), "Content-Type");
        assert_eq!(canonical_name("MESSAGE-ID"), "Message-Id");
        assert_eq!(canonical_name("x-custom-header"), "X-Custom-Header");
        assert_eq!(canonical_name("mime-version"), "MIME-Version");
        assert_eq!(canonical_name("bad name"), "bad name");
    }

    #[test]
    fn test_validate_name() {
        assert!(validate_name("X-Priority").is_ok());
        assert!(matches!(validate_name(""), Err(Error::InvalidHeader(_))));
        assert!(validate_name("Bad Name").is_err());
        assert!(validate_name("Bad:Name").is_err());
        assert!(validate_name("Ünicode").is_err());
    }
}
