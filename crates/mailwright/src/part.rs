//! MIME part tree.
//!
//! A [`Part`] is either a text leaf held in memory, a binary leaf streamed
//! from a reader, or a multipart container of further parts. Every variant
//! serializes as a header block, a blank line and its encoded body.

use std::fmt;
use std::io::{self, Read, Write};

use crate::content_type::{ContentType, format_parameter};
use crate::encoding::header::write_header;
use crate::encoding::transfer::{TransferEncoding, encode_base64_to, encode_text};
use crate::encoding::{CRLF, Mode};
use crate::error::{Error, Result};
use crate::generator::BoundaryGenerator;
use crate::header::{Headers, validate_name};

/// Header names written from part fields.
const PART_MANAGED_HEADERS: [&str; 3] = [
    "Content-Type",
    "Content-Transfer-Encoding",
    "Content-Disposition",
];

const DEFAULT_CHARSET: &str = "utf-8";

/// A node of the MIME tree.
#[derive(Debug)]
pub enum Part {
    /// In-memory text content.
    Text(TextPart),
    /// Streamed binary content.
    Binary(BinaryPart),
    /// Container of child parts.
    Multipart(Multipart),
}

impl Part {
    /// Returns the content type of this part.
    #[must_use]
    pub const fn content_type(&self) -> &ContentType {
        match self {
            Self::Text(part) => &part.content_type,
            Self::Binary(part) => &part.content_type,
            Self::Multipart(part) => &part.content_type,
        }
    }

    /// Writes the part headers and body to `sink`.
    ///
    /// Multipart containers without a boundary are assigned one from
    /// `boundaries`; the assignment is kept for later calls. Binary content
    /// is consumed.
    ///
    /// # Errors
    ///
    /// Returns an error if reading content or writing the sink fails.
    pub fn write_to<W: Write + ?Sized>(
        &mut self,
        sink: &mut W,
        mode: Mode,
        boundaries: &dyn BoundaryGenerator,
    ) -> Result<()> {
        match self {
            Self::Text(part) => part.write_to(sink, mode),
            Self::Binary(part) => part.write_to(sink, mode),
            Self::Multipart(part) => part.write_to(sink, mode, boundaries),
        }
    }
}

impl From<TextPart> for Part {
    fn from(part: TextPart) -> Self {
        Self::Text(part)
    }
}

impl From<BinaryPart> for Part {
    fn from(part: BinaryPart) -> Self {
        Self::Binary(part)
    }
}

impl From<Multipart> for Part {
    fn from(part: Multipart) -> Self {
        Self::Multipart(part)
    }
}

/// Text leaf with its content in memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextPart {
    /// Content type without the charset parameter.
    pub content_type: ContentType,
    /// Content disposition, empty to omit the header.
    pub disposition: String,
    /// Character set label; `utf-8` when empty.
    pub charset: String,
    /// Raw content bytes.
    pub content: Vec<u8>,
    headers: Headers,
}

impl TextPart {
    /// Creates an inline UTF-8 text part.
    #[must_use]
    pub fn new(content_type: ContentType, content: impl Into<Vec<u8>>) -> Self {
        Self {
            content_type,
            disposition: "inline".to_string(),
            charset: DEFAULT_CHARSET.to_string(),
            content: content.into(),
            headers: Headers::new(),
        }
    }

    /// Creates a text/plain part.
    #[must_use]
    pub fn plain(content: impl Into<Vec<u8>>) -> Self {
        Self::new(ContentType::text_plain(), content)
    }

    /// Creates a text/html part.
    #[must_use]
    pub fn html(content: impl Into<Vec<u8>>) -> Self {
        Self::new(ContentType::text_html(), content)
    }

    /// Sets the charset label.
    #[must_use]
    pub fn with_charset(mut self, charset: impl Into<String>) -> Self {
        self.charset = charset.into();
        self
    }

    /// Sets the disposition.
    #[must_use]
    pub fn with_disposition(mut self, disposition: impl Into<String>) -> Self {
        self.disposition = disposition.into();
        self
    }

    /// Returns true if this is a text/html part.
    #[must_use]
    pub fn is_html(&self) -> bool {
        self.content_type.is_html()
    }

    /// Returns the extra headers.
    #[must_use]
    pub const fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Adds an extra header.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is invalid or written from a part field.
    pub fn add_header(&mut self, name: &str, value: impl Into<String>) -> Result<()> {
        check_part_header(name)?;
        self.headers.add(name, value);
        Ok(())
    }

    fn write_to<W: Write + ?Sized>(&self, sink: &mut W, mode: Mode) -> Result<()> {
        let (encoding, body) = encode_text(&self.content, mode);
        tracing::trace!(content_type = %self.content_type.essence(), %encoding, "writing text part");

        let charset = if self.charset.is_empty() {
            DEFAULT_CHARSET
        } else {
            &self.charset
        };
        let content_type = self.content_type.clone().with_parameter("charset", charset);

        let mut head = Vec::with_capacity(256);
        write_header(&mut head, "Content-Type", &content_type.to_string());
        write_header(&mut head, "Content-Transfer-Encoding", encoding.as_str());
        write_trailing_headers(&mut head, &self.disposition, &self.headers);

        sink.write_all(&head)?;
        sink.write_all(&body)?;
        Ok(())
    }
}

/// Binary leaf streamed from a reader.
///
/// The reader is consumed by the first serialization; later serializations
/// write whatever it still yields.
pub struct BinaryPart {
    /// Content type.
    pub content_type: ContentType,
    /// Content disposition, empty to omit the header.
    pub disposition: String,
    headers: Headers,
    content: Box<dyn Read + Send>,
}

impl BinaryPart {
    /// Creates a binary part with no disposition.
    #[must_use]
    pub fn new(content_type: ContentType, content: impl Read + Send + 'static) -> Self {
        Self {
            content_type,
            disposition: String::new(),
            headers: Headers::new(),
            content: Box::new(content),
        }
    }

    /// Creates an attachment with the given file name.
    #[must_use]
    pub fn attachment(
        content_type: ContentType,
        filename: &str,
        content: impl Read + Send + 'static,
    ) -> Self {
        Self::new(content_type, content).with_disposition(format!(
            "attachment; {}",
            format_parameter("filename", filename, true)
        ))
    }

    /// Sets the disposition.
    #[must_use]
    pub fn with_disposition(mut self, disposition: impl Into<String>) -> Self {
        self.disposition = disposition.into();
        self
    }

    /// Returns the extra headers.
    #[must_use]
    pub const fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Adds an extra header.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is invalid or written from a part field.
    pub fn add_header(&mut self, name: &str, value: impl Into<String>) -> Result<()> {
        check_part_header(name)?;
        self.headers.add(name, value);
        Ok(())
    }

    fn write_to<W: Write + ?Sized>(&mut self, sink: &mut W, mode: Mode) -> Result<()> {
        let encoding = TransferEncoding::for_binary(mode);
        tracing::trace!(content_type = %self.content_type.essence(), %encoding, "writing binary part");

        let mut head = Vec::with_capacity(256);
        write_header(&mut head, "Content-Type", &self.content_type.to_string());
        write_header(&mut head, "Content-Transfer-Encoding", encoding.as_str());
        write_trailing_headers(&mut head, &self.disposition, &self.headers);
        sink.write_all(&head)?;

        let copied = match encoding {
            TransferEncoding::Binary => io::copy(&mut self.content, sink)?,
            _ => encode_base64_to(sink, &mut self.content)?,
        };
        tracing::trace!(bytes = copied, "binary content written");
        Ok(())
    }
}

impl fmt::Debug for BinaryPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BinaryPart")
            .field("content_type", &self.content_type)
            .field("disposition", &self.disposition)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

/// Container of child parts separated by a boundary.
#[derive(Debug)]
pub struct Multipart {
    /// Content type (`multipart/<subtype>`), without the boundary parameter.
    pub content_type: ContentType,
    boundary: Option<String>,
    headers: Headers,
    parts: Vec<Part>,
}

impl Multipart {
    /// Creates an empty `multipart/<subtype>` container.
    #[must_use]
    pub fn new(subtype: &str) -> Self {
        Self {
            content_type: ContentType::new("multipart", subtype.to_ascii_lowercase()),
            boundary: None,
            headers: Headers::new(),
            parts: Vec::new(),
        }
    }

    /// Creates a multipart/mixed container.
    #[must_use]
    pub fn mixed() -> Self {
        Self::new("mixed")
    }

    /// Creates a multipart/alternative container.
    #[must_use]
    pub fn alternative() -> Self {
        Self::new("alternative")
    }

    /// Creates a multipart/related container.
    #[must_use]
    pub fn related() -> Self {
        Self::new("related")
    }

    /// Sets the boundary explicitly.
    #[must_use]
    pub fn with_boundary(mut self, boundary: impl Into<String>) -> Self {
        self.boundary = Some(boundary.into());
        self
    }

    /// Adds a part at the end.
    #[must_use]
    pub fn with_part(mut self, part: impl Into<Part>) -> Self {
        self.push(part);
        self
    }

    /// Returns the boundary, if assigned.
    #[must_use]
    pub fn boundary(&self) -> Option<&str> {
        self.boundary.as_deref()
    }

    /// Appends a part.
    pub fn push(&mut self, part: impl Into<Part>) {
        self.parts.push(part.into());
    }

    /// Inserts a part before all others.
    pub fn prepend(&mut self, part: impl Into<Part>) {
        self.parts.insert(0, part.into());
    }

    /// Returns the child parts.
    #[must_use]
    pub fn parts(&self) -> &[Part] {
        &self.parts
    }

    /// Returns the child parts mutably.
    pub fn parts_mut(&mut self) -> &mut Vec<Part> {
        &mut self.parts
    }

    /// Returns the extra headers.
    #[must_use]
    pub const fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Adds an extra header.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is invalid or written from a part field.
    pub fn add_header(&mut self, name: &str, value: impl Into<String>) -> Result<()> {
        check_part_header(name)?;
        self.headers.add(name, value);
        Ok(())
    }

    fn write_to<W: Write + ?Sized>(
        &mut self,
        sink: &mut W,
        mode: Mode,
        boundaries: &dyn BoundaryGenerator,
    ) -> Result<()> {
        if self.boundary.is_none() {
            let boundary = boundaries.boundary(self);
            tracing::debug!(
                content_type = %self.content_type.essence(),
                %boundary,
                "assigned boundary"
            );
            self.boundary = Some(boundary);
        }
        let boundary = self.boundary.clone().unwrap_or_default();

        let content_type = self
            .content_type
            .clone()
            .with_parameter("boundary", boundary.as_str());

        let mut head = Vec::with_capacity(256);
        write_header(&mut head, "Content-Type", &content_type.to_string());
        write_trailing_headers(&mut head, "", &self.headers);
        sink.write_all(&head)?;

        let delimiter = format!("\r\n--{boundary}\r\n");
        for part in &mut self.parts {
            sink.write_all(delimiter.as_bytes())?;
            part.write_to(sink, mode, boundaries)?;
        }
        write!(sink, "\r\n--{boundary}--\r\n")?;
        Ok(())
    }
}

/// Writes `Content-Disposition` (when set), the extra headers and the blank
/// line closing the header block.
fn write_trailing_headers(head: &mut Vec<u8>, disposition: &str, headers: &Headers) {
    if !disposition.is_empty() {
        write_header(head, "Content-Disposition", disposition);
    }
    for (name, value) in headers.iter() {
        write_header(head, name, value);
    }
    head.extend_from_slice(CRLF);
}

fn check_part_header(name: &str) -> Result<()> {
    validate_name(name)?;
    if PART_MANAGED_HEADERS
        .iter()
        .any(|managed| managed.eq_ignore_ascii_case(name))
    {
        return Err(Error::ReservedHeader(name.to_string()));
    }
    Ok(())
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
    use crate::encoding::transfer::decode_base64;
    use crate::generator::SequentialBoundary;
    use std::io::Cursor;

    fn render(part: &mut Part, mode: Mode) -> String {
        let mut out = Vec::new();
        part.write_to(&mut out, mode, &SequentialBoundary::new("b"))
            .unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_text_part_quoted_printable() {
        let mut part = Part::from(TextPart::plain("caf\u{e9}"));
        assert_eq!(
            render(&mut part, Mode::SevenBit),
            "Content-Type: text/plain; charset=utf-8\r\n\
             Content-Transfer-Encoding: quoted-printable\r\n\
             Content-Disposition: inline\r\n\
             \r\n\
             caf=C3=A9\r\n"
        );
    }

    #[test]
    fn test_text_part_eight_bit() {
        let mut part = Part::from(TextPart::html("<p>caf\u{e9}</p>\n"));
        assert_eq!(
            render(&mut part, Mode::EightBit),
            "Content-Type: text/html; charset=utf-8\r\n\
             Content-Transfer-Encoding: 8bit\r\n\
             Content-Disposition: inline\r\n\
             \r\n\
             <p>caf\u{e9}</p>\r\n"
        );
    }

    #[test]
    fn test_text_part_long_line_falls_back() {
        let mut part = Part::from(TextPart::plain("x".repeat(1200)));
        let out = render(&mut part, Mode::EightBit);
        assert!(out.contains("Content-Transfer-Encoding: quoted-printable\r\n"));
        assert!(out.lines().all(|line| line.len() <= 78));
    }

    #[test]
    fn test_text_part_empty_charset_defaults() {
        let mut part = Part::from(TextPart::plain("hi").with_charset("").with_disposition(""));
        let out = render(&mut part, Mode::EightBit);
        assert!(out.starts_with("Content-Type: text/plain; charset=utf-8\r\n"));
        assert!(!out.contains("Content-Disposition"));
    }

    #[test]
    fn test_text_part_extra_headers() {
        let mut text = TextPart::plain("hi");
        text.add_header("content-id", "<part1@x>").unwrap();
        assert!(matches!(
            text.add_header("content-type", "text/html"),
            Err(Error::ReservedHeader(_))
        ));
        assert!(matches!(
            text.add_header("bad name", "x"),
            Err(Error::InvalidHeader(_))
        ));

        let out = render(&mut Part::from(text), Mode::EightBit);
        assert!(out.contains("Content-Disposition: inline\r\nContent-Id: <part1@x>\r\n\r\nhi\r\n"));
    }

    #[test]
    fn test_binary_part_base64() {
        let data: Vec<u8> = (0..=255).collect();
        let mut part = Part::from(BinaryPart::attachment(
            ContentType::octet_stream(),
            "data.bin",
            Cursor::new(data.clone()),
        ));
        let out = render(&mut part, Mode::EightBit);
        let (head, body) = out.split_once("\r\n\r\n").unwrap();

        assert_eq!(
            head,
            "Content-Type: application/octet-stream\r\n\
             Content-Transfer-Encoding: base64\r\n\
             Content-Disposition: attachment; filename=\"data.bin\""
        );
        assert!(body.lines().all(|line| line.len() <= 76));
        assert_eq!(decode_base64(body).unwrap(), data);
    }

    #[test]
    fn test_attachment_non_ascii_filename() {
        let mut part = Part::from(BinaryPart::attachment(
            ContentType::octet_stream(),
            "résumé.pdf",
            Cursor::new(b"pdf".to_vec()),
        ));
        let out = render(&mut part, Mode::SevenBit);
        assert!(out.contains(
            "Content-Disposition: attachment; filename*=utf-8''r%C3%A9sum%C3%A9.pdf\r\n"
        ));
        assert!(!out.contains("=?utf-8?"));
    }

    #[test]
    fn test_binary_part_raw() {
        let data = vec![0u8, 0xFF, b'\r', b'\n', 0x80];
        let mut part = Part::from(BinaryPart::new(
            ContentType::octet_stream(),
            Cursor::new(data.clone()),
        ));
        let mut out = Vec::new();
        part.write_to(&mut out, Mode::Binary, &SequentialBoundary::default())
            .unwrap();

        let head = b"Content-Type: application/octet-stream\r\n\
                     Content-Transfer-Encoding: binary\r\n\r\n";
        assert_eq!(&out[..head.len()], head);
        assert_eq!(&out[head.len()..], data.as_slice());
    }

    #[test]
    fn test_binary_part_consumed_once() {
        let mut part = Part::from(BinaryPart::new(
            ContentType::new("image", "png"),
            Cursor::new(b"abc".to_vec()),
        ));
        let first = render(&mut part, Mode::SevenBit);
        let second = render(&mut part, Mode::SevenBit);
        assert!(first.ends_with("\r\n\r\nYWJj\r\n"));
        assert!(second.ends_with("\r\n\r\n"));
    }

    #[test]
    fn test_multipart_layout() {
        let mut part = Part::from(
            Multipart::alternative()
                .with_boundary("XYZ")
                .with_part(TextPart::plain("plain"))
                .with_part(TextPart::html("<b>html</b>")),
        );
        assert_eq!(
            render(&mut part, Mode::EightBit),
            "Content-Type: multipart/alternative; boundary=\"XYZ\"\r\n\
             \r\n\
             \r\n--XYZ\r\n\
             Content-Type: text/plain; charset=utf-8\r\n\
             Content-Transfer-Encoding: 8bit\r\n\
             Content-Disposition: inline\r\n\
             \r\n\
             plain\r\n\
             \r\n--XYZ\r\n\
             Content-Type: text/html; charset=utf-8\r\n\
             Content-Transfer-Encoding: 8bit\r\n\
             Content-Disposition: inline\r\n\
             \r\n\
             <b>html</b>\r\n\
             \r\n--XYZ--\r\n"
        );
    }

    #[test]
    fn test_multipart_boundary_assigned_once() {
        let mut multipart = Multipart::mixed().with_part(TextPart::plain("a"));
        assert_eq!(multipart.boundary(), None);

        let generator = SequentialBoundary::new("gen-");
        let mut first = Vec::new();
        multipart.write_to(&mut first, Mode::SevenBit, &generator).unwrap();
        assert_eq!(multipart.boundary(), Some("gen-0000"));

        let mut second = Vec::new();
        multipart.write_to(&mut second, Mode::SevenBit, &generator).unwrap();
        assert_eq!(first, second);
        assert_eq!(generator.current(), 1);
    }

    #[test]
    fn test_nested_multipart_distinct_boundaries() {
        let inner = Multipart::alternative()
            .with_part(TextPart::plain("text"))
            .with_part(TextPart::html("<i>html</i>"));
        let mut outer = Part::from(
            Multipart::mixed()
                .with_part(inner)
                .with_part(BinaryPart::attachment(
                    ContentType::new("text", "csv"),
                    "a.csv",
                    Cursor::new(b"1,2\n".to_vec()),
                )),
        );

        let out = render(&mut outer, Mode::SevenBit);
        assert!(out.starts_with("Content-Type: multipart/mixed; boundary=\"b0000\"\r\n"));
        assert!(out.contains("\r\n--b0000\r\nContent-Type: multipart/alternative; boundary=\"b0001\"\r\n"));
        assert!(out.contains("\r\n--b0001--\r\n"));
        assert!(out.ends_with("\r\n--b0000--\r\n"));
        assert_eq!(out.matches("\r\n--b0000\r\n").count(), 2);
        assert_eq!(out.matches("\r\n--b0001\r\n").count(), 2);
    }

    #[test]
    fn test_multipart_prepend_and_content_type() {
        let mut multipart = Multipart::new("Related");
        multipart.push(TextPart::html("b"));
        multipart.prepend(TextPart::plain("a"));

        assert_eq!(multipart.content_type.essence(), "multipart/related");
        assert!(matches!(&multipart.parts()[0], Part::Text(t) if !t.is_html()));
        assert!(matches!(&multipart.parts()[1], Part::Text(t) if t.is_html()));
        assert_eq!(Part::from(multipart).content_type().sub_type, "related");
    }
}
