//! Header and content transfer encoders.
//!
//! - [`header`]: RFC 5322 folding and RFC 2047 encoded words for header fields
//! - [`transfer`]: 8bit, quoted-printable and base64 body encodings (RFC 2045)

pub mod header;
pub mod transfer;

pub use header::{decode_header_value, write_address_header, write_header};
pub use transfer::{
    LineChopper, Mode, TransferEncoding, decode_base64, decode_quoted_printable,
    encode_base64_to, encode_eight_bit, encode_quoted_printable,
};

/// Protocol line terminator.
pub const CRLF: &[u8] = b"\r\n";

/// Length a line should not exceed, excluding the terminator.
pub const LINE_SHOULD_LENGTH: usize = 78;

/// Hard maximum line length, excluding the terminator.
pub const LINE_MAX_LENGTH: usize = 998;

/// Maximum encoded line length for quoted-printable and base64 bodies.
pub const ENCODED_LINE_LENGTH: usize = 76;
