//! MIME content type values.

use std::fmt;
use std::str::FromStr;

use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};

use crate::error::{Error, Result};

/// Characters that force a parameter value to be quoted (RFC 2045 tspecials).
const TSPECIALS: &str = "()<>@,;:\\\"/[]?=";

/// Bytes outside RFC 2231 `attr-char`, percent-encoded in extended values.
const ATTR_CHAR_ENCODE: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'%')
    .add(b'\'')
    .add(b'(')
    .add(b')')
    .add(b'*')
    .add(b',')
    .add(b'/')
    .add(b':')
    .add(b';')
    .add(b'<')
    .add(b'=')
    .add(b'>')
    .add(b'?')
    .add(b'@')
    .add(b'[')
    .add(b'\\')
    .add(b']')
    .add(b'{')
    .add(b'}');

/// MIME content type with ordered parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentType {
    /// Main type (e.g., "text", "image", "multipart").
    pub main_type: String,
    /// Subtype (e.g., "plain", "html", "jpeg").
    pub sub_type: String,
    /// Parameters in render order (e.g., charset=utf-8, boundary=xxx).
    pub parameters: Vec<(String, String)>,
}

impl ContentType {
    /// Creates a new content type.
    #[must_use]
    pub fn new(main_type: impl Into<String>, sub_type: impl Into<String>) -> Self {
        Self {
            main_type: main_type.into(),
            sub_type: sub_type.into(),
            parameters: Vec::new(),
        }
    }

    /// Creates a text/plain content type.
    #[must_use]
    pub fn text_plain() -> Self {
        Self::new("text", "plain")
    }

    /// Creates a text/html content type.
    #[must_use]
    pub fn text_html() -> Self {
        Self::new("text", "html")
    }

    /// Creates an application/octet-stream content type.
    #[must_use]
    pub fn octet_stream() -> Self {
        Self::new("application", "octet-stream")
    }

    /// Adds or replaces a parameter.
    #[must_use]
    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_parameter(key, value);
        self
    }

    /// Sets a parameter, replacing an existing one with the same name.
    pub fn set_parameter(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into().to_ascii_lowercase();
        let value = value.into();
        match self.parameters.iter_mut().find(|(k, _)| *k == key) {
            Some((_, v)) => *v = value,
            None => self.parameters.push((key, value)),
        }
    }

    /// Returns a parameter value.
    #[must_use]
    pub fn parameter(&self, key: &str) -> Option<&str> {
        self.parameters
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    /// Returns `type/subtype` without parameters.
    #[must_use]
    pub fn essence(&self) -> String {
        format!("{}/{}", self.main_type, self.sub_type)
    }

    /// Checks if this is a text content type.
    #[must_use]
    pub fn is_text(&self) -> bool {
        self.main_type.eq_ignore_ascii_case("text")
    }

    /// Checks if this is text/html.
    #[must_use]
    pub fn is_html(&self) -> bool {
        self.is_text() && self.sub_type.eq_ignore_ascii_case("html")
    }
}

impl FromStr for ContentType {
    type Err = Error;

    /// Parses `type/subtype; param1=value1; param2="value 2"`.
    fn from_str(s: &str) -> Result<Self> {
        let mut parts = s.split(';');

        let type_str = parts.next().unwrap_or_default().trim();
        let (main_type, sub_type) = type_str
            .split_once('/')
            .map(|(main, sub)| (main.trim(), sub.trim()))
            .filter(|(main, sub)| !main.is_empty() && !sub.is_empty())
            .ok_or_else(|| Error::InvalidContentType(s.to_string()))?;

        let mut content_type =
            Self::new(main_type.to_ascii_lowercase(), sub_type.to_ascii_lowercase());

        for param in parts {
            if let Some((key, value)) = param.trim().split_once('=') {
                content_type.set_parameter(key.trim(), value.trim().trim_matches('"'));
            }
        }

        Ok(content_type)
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.main_type, self.sub_type)?;

        for (key, value) in &self.parameters {
            // Boundaries are always quoted, whatever the generator produced.
            write!(f, "; {}", format_parameter(key, value, key == "boundary"))?;
        }

        Ok(())
    }
}

/// Formats `key=value`, quoting the value when it is empty, contains
/// whitespace or tspecials, or `force_quote` is set.
///
/// Non-ASCII values use the RFC 2231 extended form `key*=utf-8''%XX…`,
/// since encoded words are not allowed inside parameters.
pub(crate) fn format_parameter(key: &str, value: &str, force_quote: bool) -> String {
    if !value.is_ascii() {
        return format!("{key}*=utf-8''{}", utf8_percent_encode(value, ATTR_CHAR_ENCODE));
    }

    let quote = force_quote
        || value.is_empty()
        || value.contains(|c: char| c.is_whitespace() || TSPECIALS.contains(c));
    if !quote {
        return format!("{key}={value}");
    }

    let mut out = format!("{key}=\"");
    for c in value.chars() {
        if c == '"' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_content_type_new() {
        let ct = ContentType::new("text", "plain");
        assert_eq!(ct.main_type, "text");
        assert_eq!(ct.sub_type, "plain");
        assert!(ct.parameters.is_empty());
    }

    #[test]
    fn test_text_html() {
        let ct = ContentType::text_html();
        assert!(ct.is_text());
        assert!(ct.is_html());
        assert!(!ContentType::text_plain().is_html());
    }

    #[test]
    fn test_content_type_parse() {
        let ct: ContentType = "Text/Plain; charset=utf-8".parse().unwrap();
        assert_eq!(ct.essence(), "text/plain");
        assert_eq!(ct.parameter("charset"), Some("utf-8"));
    }

    #[test]
    fn test_content_type_parse_quoted() {
        let ct: ContentType = "multipart/mixed; boundary=\"----=_Part_123\"".parse().unwrap();
        assert_eq!(ct.essence(), "multipart/mixed");
        assert_eq!(ct.parameter("boundary"), Some("----=_Part_123"));
    }

    #[test]
    fn test_content_type_parse_invalid() {
        assert!(matches!("text".parse::<ContentType>(), Err(Error::InvalidContentType(_))));
        assert!("/plain".parse::<ContentType>().is_err());
        assert!("".parse::<ContentType>().is_err());
    }

    #[test]
    fn test_content_type_display() {
        let ct = ContentType::text_plain().with_parameter("charset", "utf-8");
        assert_eq!(ct.to_string(), "text/plain; charset=utf-8");

        let ct = ContentType::new("multipart", "alternative").with_parameter("boundary", "abc");
        assert_eq!(ct.to_string(), "multipart/alternative; boundary=\"abc\"");

        let ct = ContentType::octet_stream().with_parameter("name", "a b.pdf");
        assert_eq!(ct.to_string(), "application/octet-stream; name=\"a b.pdf\"");
    }

    #[test]
    fn test_format_parameter() {
        assert_eq!(format_parameter("charset", "utf-8", false), "charset=utf-8");
        assert_eq!(format_parameter("filename", "say \"hi\".txt", false), r#"filename="say \"hi\".txt""#);
        assert_eq!(format_parameter("boundary", "x", true), "boundary=\"x\"");
    }

    #[test]
    fn test_format_parameter_non_ascii_uses_extended_value() {
        assert_eq!(
            format_parameter("filename", "résumé.pdf", true),
            "filename*=utf-8''r%C3%A9sum%C3%A9.pdf"
        );
        assert_eq!(
            format_parameter("filename", "年报 (final).pdf", false),
            "filename*=utf-8''%E5%B9%B4%E6%8A%A5%20%28final%29.pdf"
        );

        let ct = ContentType::octet_stream().with_parameter("name", "naïve.txt");
        assert_eq!(ct.to_string(), "application/octet-stream; name*=utf-8''na%C3%AFve.txt");
    }

    #[test]
    fn test_content_type_parameter_order_and_replace() {
        let ct = ContentType::text_plain()
            .with_parameter("charset", "iso-8859-1")
            .with_parameter("format", "flowed")
            .with_parameter("Charset", "utf-8");

        assert_eq!(ct.to_string(), "text/plain; charset=utf-8; format=flowed");
    }
}
