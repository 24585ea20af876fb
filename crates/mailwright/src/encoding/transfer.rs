//! Content transfer encodings (RFC 2045).
//!
//! Text bodies prefer 8bit pass-through when the [`Mode`] allows it and fall
//! back to quoted-printable. Binary bodies are base64 encoded unless the mode
//! is [`Mode::Binary`].

use std::fmt;
use std::io::{self, Read, Write};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use base64::write::EncoderWriter;

use crate::encoding::{CRLF, ENCODED_LINE_LENGTH, LINE_MAX_LENGTH};
use crate::error::{Error, Result};

/// Most permissive transfer encoding the receiving channel supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Mode {
    /// 7-bit clean channel: text is quoted-printable, binary is base64.
    #[default]
    SevenBit,
    /// 8BITMIME channel: text may be raw 8bit lines, binary is base64.
    EightBit,
    /// Binary clean channel: binary parts are written without encoding.
    Binary,
}

/// Transfer encoding applied to a part body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferEncoding {
    /// 8-bit lines, no encoding.
    EightBit,
    /// Quoted-Printable encoding.
    QuotedPrintable,
    /// Base64 encoding.
    Base64,
    /// Binary (no encoding, no line structure).
    Binary,
}

impl TransferEncoding {
    /// Returns the `Content-Transfer-Encoding` header value.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::EightBit => "8bit",
            Self::QuotedPrintable => "quoted-printable",
            Self::Base64 => "base64",
            Self::Binary => "binary",
        }
    }

    /// Returns the encoding used for binary content under `mode`.
    #[must_use]
    pub fn for_binary(mode: Mode) -> Self {
        if mode >= Mode::Binary {
            Self::Binary
        } else {
            Self::Base64
        }
    }
}

impl fmt::Display for TransferEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A line exceeded the hard maximum during 8bit pass-through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("line exceeds 998 octets")]
pub struct LineTooLong;

/// Encodes text content under `mode`, returning the encoding used and the body.
///
/// 8bit is attempted first when `mode` is at least [`Mode::EightBit`]; a line
/// longer than [`LINE_MAX_LENGTH`] falls back to quoted-printable.
#[must_use]
pub fn encode_text(content: &[u8], mode: Mode) -> (TransferEncoding, Vec<u8>) {
    if mode >= Mode::EightBit {
        match encode_eight_bit(content) {
            Ok(body) => return (TransferEncoding::EightBit, body),
            Err(LineTooLong) => {
                tracing::debug!("8bit line limit exceeded, falling back to quoted-printable");
            }
        }
    }
    (
        TransferEncoding::QuotedPrintable,
        encode_quoted_printable(content),
    )
}

/// Re-emits text with CRLF line endings, checking line lengths.
///
/// CRLF pairs are first reduced to LF, then every CR or LF becomes CRLF. A
/// final unterminated line gets a terminator.
///
/// # Errors
///
/// Returns [`LineTooLong`] if any line exceeds [`LINE_MAX_LENGTH`] octets.
pub fn encode_eight_bit(content: &[u8]) -> std::result::Result<Vec<u8>, LineTooLong> {
    let normalized = normalize_newlines(content);
    let mut out = Vec::with_capacity(normalized.len() + normalized.len() / 32);
    let mut line_length = 0;

    for &b in &normalized {
        match b {
            b'\r' | b'\n' => {
                out.extend_from_slice(CRLF);
                line_length = 0;
            }
            _ => {
                line_length += 1;
                if line_length > LINE_MAX_LENGTH {
                    return Err(LineTooLong);
                }
                out.push(b);
            }
        }
    }
    if line_length > 0 {
        out.extend_from_slice(CRLF);
    }

    Ok(out)
}

/// Encodes content using Quoted-Printable encoding (RFC 2045).
///
/// Line breaks in the input become CRLF. Encoded lines never exceed
/// [`ENCODED_LINE_LENGTH`] characters, soft line break included, and never
/// end in whitespace.
#[must_use]
pub fn encode_quoted_printable(content: &[u8]) -> Vec<u8> {
    let normalized = normalize_newlines(content);
    let mut out = Vec::with_capacity(normalized.len() + normalized.len() / 4);
    let mut line: Vec<u8> = Vec::with_capacity(ENCODED_LINE_LENGTH);

    for &b in &normalized {
        match b {
            b'\r' | b'\n' => end_line(&mut out, &mut line),
            b' ' | b'\t' => {
                if line.len() >= ENCODED_LINE_LENGTH - 2 {
                    soft_break(&mut out, &mut line);
                }
                line.push(b);
            }
            b'!'..=b'<' | b'>'..=b'~' => {
                if line.len() >= ENCODED_LINE_LENGTH - 1 {
                    soft_break(&mut out, &mut line);
                }
                line.push(b);
            }
            _ => {
                if line.len() >= ENCODED_LINE_LENGTH - 3 {
                    soft_break(&mut out, &mut line);
                }
                line.extend_from_slice(&hex_escape(b));
            }
        }
    }
    if !line.is_empty() {
        end_line(&mut out, &mut line);
    }

    out
}

fn soft_break(out: &mut Vec<u8>, line: &mut Vec<u8>) {
    out.extend_from_slice(line);
    out.extend_from_slice(b"=");
    out.extend_from_slice(CRLF);
    line.clear();
}

fn end_line(out: &mut Vec<u8>, line: &mut Vec<u8>) {
    if matches!(line.last(), Some(b' ' | b'\t')) {
        soft_break(out, line);
    }
    out.extend_from_slice(line);
    out.extend_from_slice(CRLF);
    line.clear();
}

fn hex_escape(b: u8) -> [u8; 3] {
    const HEX: &[u8; 16] = b"0123456789ABCDEF";
    [b'=', HEX[usize::from(b >> 4)], HEX[usize::from(b & 0x0F)]]
}

fn normalize_newlines(content: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(content.len());
    let mut bytes = content.iter().peekable();
    while let Some(&b) = bytes.next() {
        if b == b'\r' && bytes.peek() == Some(&&b'\n') {
            continue;
        }
        out.push(b);
    }
    out
}

/// Writer that inserts CRLF after every [`ENCODED_LINE_LENGTH`] characters.
///
/// The character count carries across writes; [`LineChopper::finish`]
/// terminates a trailing partial line.
#[derive(Debug)]
pub struct LineChopper<W> {
    inner: W,
    chars: usize,
}

impl<W: Write> LineChopper<W> {
    /// Wraps a writer.
    pub const fn new(inner: W) -> Self {
        Self { inner, chars: 0 }
    }

    /// Terminates the last line if it is not empty and returns the writer.
    ///
    /// # Errors
    ///
    /// Returns an error if writing the terminator fails.
    pub fn finish(mut self) -> io::Result<W> {
        if self.chars > 0 {
            self.inner.write_all(CRLF)?;
        }
        Ok(self.inner)
    }
}

impl<W: Write> Write for LineChopper<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut rest = buf;
        while self.chars + rest.len() > ENCODED_LINE_LENGTH {
            let (head, tail) = rest.split_at(ENCODED_LINE_LENGTH - self.chars);
            self.inner.write_all(head)?;
            self.inner.write_all(CRLF)?;
            self.chars = 0;
            rest = tail;
        }
        self.inner.write_all(rest)?;
        self.chars += rest.len();
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Streams `source` into `sink` as base64 in lines of [`ENCODED_LINE_LENGTH`].
///
/// Returns the number of source bytes consumed. The source is read once,
/// forward-only.
///
/// # Errors
///
/// Returns an error if reading the source or writing the sink fails.
pub fn encode_base64_to<W, R>(sink: &mut W, source: &mut R) -> io::Result<u64>
where
    W: Write + ?Sized,
    R: Read + ?Sized,
{
    let mut chopper = LineChopper::new(sink);
    let copied = {
        let mut encoder = EncoderWriter::new(&mut chopper, &STANDARD);
        let copied = io::copy(source, &mut encoder)?;
        encoder.finish()?;
        copied
    };
    chopper.finish()?;
    Ok(copied)
}

/// Decodes base64 data, ignoring line breaks and other whitespace.
///
/// # Errors
///
/// Returns an error if the input is not valid base64.
pub fn decode_base64(data: &str) -> Result<Vec<u8>> {
    let cleaned: String = data.chars().filter(|c| !c.is_whitespace()).collect();
    STANDARD.decode(cleaned).map_err(Into::into)
}

/// Decodes Quoted-Printable text (RFC 2045).
///
/// # Errors
///
/// Returns an error if the input contains an invalid escape sequence.
pub fn decode_quoted_printable(text: &str) -> Result<Vec<u8>> {
    let bytes = text.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] != b'=' {
            out.push(bytes[i]);
            i += 1;
            continue;
        }

        // Soft line break
        if bytes.get(i + 1..i + 3) == Some(b"\r\n".as_slice()) {
            i += 3;
            continue;
        }
        if bytes.get(i + 1) == Some(&b'\n') {
            i += 2;
            continue;
        }

        let hex = bytes
            .get(i + 1..i + 3)
            .and_then(|h| std::str::from_utf8(h).ok())
            .ok_or_else(|| Error::InvalidEncoding("Incomplete escape sequence".to_string()))?;
        let byte = u8::from_str_radix(hex, 16)
            .map_err(|e| Error::InvalidEncoding(format!("Invalid hex: {e}")))?;
        out.push(byte);
        i += 3;
    }

    Ok(out)
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

    fn qp(text: &str) -> String {
        String::from_utf8(encode_quoted_printable(text.as_bytes())).unwrap()
    }

    fn base64_lines(data: &[u8]) -> String {
        let mut out = Vec::new();
        encode_base64_to(&mut out, &mut &data[..]).unwrap();
        String::from_utf8(out).unwrap()
    }

    /// Input with LF line breaks as it reads back after encoding.
    fn canonical_lines(data: &[u8]) -> Vec<u8> {
        let mut expected = Vec::new();
        for &b in data {
            if b == b'\n' {
                expected.extend_from_slice(CRLF);
            } else {
                expected.push(b);
            }
        }
        if data.last().is_some_and(|&b| b != b'\n') {
            expected.extend_from_slice(CRLF);
        }
        expected
    }

    #[test]
    fn test_mode_ordering() {
        assert!(Mode::SevenBit < Mode::EightBit);
        assert!(Mode::EightBit < Mode::Binary);
        assert_eq!(Mode::default(), Mode::SevenBit);
    }

    #[test]
    fn test_transfer_encoding_display() {
        assert_eq!(TransferEncoding::QuotedPrintable.to_string(), "quoted-printable");
        assert_eq!(TransferEncoding::EightBit.to_string(), "8bit");
        assert_eq!(TransferEncoding::for_binary(Mode::EightBit), TransferEncoding::Base64);
        assert_eq!(TransferEncoding::for_binary(Mode::Binary), TransferEncoding::Binary);
    }

    #[test]
    fn test_eight_bit_normalizes_line_endings() {
        let body = encode_eight_bit("Hello\r\nмир\nend".as_bytes()).unwrap();
        assert_eq!(body, "Hello\r\nмир\r\nend\r\n".as_bytes());
    }

    #[test]
    fn test_eight_bit_rejects_long_line() {
        let line = vec![b'a'; LINE_MAX_LENGTH];
        assert!(encode_eight_bit(&line).is_ok());

        let line = vec![b'a'; LINE_MAX_LENGTH + 1];
        assert_eq!(encode_eight_bit(&line), Err(LineTooLong));
    }

    #[test]
    fn test_encode_text_selection() {
        let (encoding, body) = encode_text(b"Hello", Mode::SevenBit);
        assert_eq!(encoding, TransferEncoding::QuotedPrintable);
        assert_eq!(body, b"Hello\r\n");

        let (encoding, body) = encode_text("Héllo".as_bytes(), Mode::EightBit);
        assert_eq!(encoding, TransferEncoding::EightBit);
        assert_eq!(body, "Héllo\r\n".as_bytes());

        let long = vec![b'x'; LINE_MAX_LENGTH + 1];
        let (encoding, _) = encode_text(&long, Mode::Binary);
        assert_eq!(encoding, TransferEncoding::QuotedPrintable);
    }

    #[test]
    fn test_quoted_printable_encode() {
        assert_eq!(qp("Hello, World!"), "Hello, World!\r\n");
        assert_eq!(
            qp("Привет, мир!"),
            "=D0=9F=D1=80=D0=B8=D0=B2=D0=B5=D1=82, =D0=BC=D0=B8=D1=80!\r\n"
        );
        assert_eq!(qp("a=b"), "a=3Db\r\n");
        assert_eq!(qp(""), "");
    }

    #[test]
    fn test_quoted_printable_trailing_whitespace() {
        assert_eq!(qp("trailing \nnext"), "trailing =\r\n\r\nnext\r\n");
        assert_eq!(qp("tab\t"), "tab\t=\r\n\r\n");
    }

    #[test]
    fn test_quoted_printable_soft_breaks() {
        let encoded = qp(&"x".repeat(200));
        let lines: Vec<_> = encoded.split_terminator("\r\n").collect();
        assert_eq!(lines[0].len(), ENCODED_LINE_LENGTH);
        assert!(lines[0].ends_with('='));
        for line in &lines {
            assert!(line.len() <= ENCODED_LINE_LENGTH);
        }
    }

    #[test]
    fn test_quoted_printable_decode() {
        assert_eq!(decode_quoted_printable("H=C3=A9llo").unwrap(), "Héllo".as_bytes());
        assert_eq!(decode_quoted_printable("Hello=\r\nWorld").unwrap(), b"HelloWorld");
        assert!(decode_quoted_printable("bad=4").is_err());
        assert!(decode_quoted_printable("bad=ZZ").is_err());
    }

    #[test]
    fn test_line_chopper_across_writes() {
        let mut out = Vec::new();
        let mut chopper = LineChopper::new(&mut out);
        chopper.write_all(&[b'a'; 50]).unwrap();
        chopper.write_all(&[b'b'; 50]).unwrap();
        chopper.finish().unwrap();

        let expected = format!("{}{}\r\n{}\r\n", "a".repeat(50), "b".repeat(26), "b".repeat(24));
        assert_eq!(String::from_utf8(out).unwrap(), expected);
    }

    #[test]
    fn test_line_chopper_exact_line() {
        let mut out = Vec::new();
        let mut chopper = LineChopper::new(&mut out);
        chopper.write_all(&[b'z'; ENCODED_LINE_LENGTH]).unwrap();
        chopper.finish().unwrap();
        assert_eq!(out.len(), ENCODED_LINE_LENGTH + 2);
        assert!(out.ends_with(CRLF));
    }

    #[test]
    fn test_base64_encode() {
        assert_eq!(base64_lines("Привет, мир!".as_bytes()), "0J/RgNC40LLQtdGCLCDQvNC40YAh\r\n");
        assert_eq!(base64_lines(b""), "");
    }

    #[test]
    fn test_base64_decode() {
        assert_eq!(decode_base64("SGVsbG8s\r\nIFdvcmxkIQ==").unwrap(), b"Hello, World!");
        assert!(decode_base64("***").is_err());
    }

    proptest! {
        #[test]
        fn prop_quoted_printable_round_trip(data in proptest::collection::vec(any::<u8>().prop_filter("no CR", |b| *b != b'\r'), 0..600)) {
            let encoded = encode_quoted_printable(&data);
            let text = String::from_utf8(encoded).unwrap();
            for line in text.split_terminator("\r\n") {
                prop_assert!(line.len() <= ENCODED_LINE_LENGTH);
                prop_assert!(!line.ends_with(' ') && !line.ends_with('\t'));
            }
            prop_assert_eq!(decode_quoted_printable(&text).unwrap(), canonical_lines(&data));
        }

        #[test]
        fn prop_base64_lines(data in proptest::collection::vec(any::<u8>(), 0..2000)) {
            let encoded = base64_lines(&data);
            let lines: Vec<_> = encoded.split_terminator("\r\n").collect();
            if let Some((last, full)) = lines.split_last() {
                for line in full {
                    prop_assert_eq!(line.len(), ENCODED_LINE_LENGTH);
                }
                prop_assert!(!last.is_empty() && last.len() <= ENCODED_LINE_LENGTH);
                prop_assert_eq!(last.len() % 4, 0);
            }
            prop_assert_eq!(decode_base64(&encoded).unwrap(), data);
        }
    }
}
