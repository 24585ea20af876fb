//! # mailwright
//!
//! Byte-exact MIME email message serialization.
//!
//! ## Features
//!
//! - **Header encoding**: RFC 5322 folding, RFC 2047 encoded words, address lists
//! - **Transfer encodings**: 8bit with quoted-printable fallback, base64, binary
//! - **MIME trees**: text, binary and nested multipart parts with boundaries
//! - **Message assembly**: envelope headers plus a body insertion state machine
//!
//! ## Quick Start
//!
//! ```
//! use mailwright::{Email, Mailbox, Mode};
//!
//! let mut email = Email::new(
//!     "Quarterly numbers",
//!     Mailbox::new("Finance", "finance@example.com"),
//!     [Mailbox::new("Board", "board@example.com")],
//! );
//! email.add_text_body("See the attached figures.")?;
//! email.add_html_body("<p>See the attached figures.</p>")?;
//!
//! let bytes = email.to_bytes(Mode::SevenBit)?;
//! let text = String::from_utf8_lossy(&bytes);
//! assert!(text.contains("Content-Type: multipart/alternative;"));
//! # Ok::<(), mailwright::Error>(())
//! ```
//!
//! ### Attachments
//!
//! ```
//! use std::io::Cursor;
//! use mailwright::{BinaryPart, ContentType, Email, Mailbox, Mode, Multipart, TextPart};
//!
//! let mut email = Email::new(
//!     "Invoice",
//!     Mailbox::from_address("billing@example.com"),
//!     [Mailbox::from_address("customer@example.org")],
//! );
//! email.set_body(
//!     Multipart::mixed()
//!         .with_part(TextPart::plain("Invoice attached."))
//!         .with_part(BinaryPart::attachment(
//!             ContentType::new("application", "pdf"),
//!             "invoice.pdf",
//!             Cursor::new(b"%PDF-1.7".to_vec()),
//!         )),
//! );
//!
//! let bytes = email.to_bytes(Mode::EightBit)?;
//! assert!(String::from_utf8_lossy(&bytes).contains("Content-Transfer-Encoding: base64"));
//! # Ok::<(), mailwright::Error>(())
//! ```
//!
//! ### Deterministic output
//!
//! ```
//! use mailwright::{Config, Email, FixedMessageId, Mailbox, Mode, SequentialBoundary};
//!
//! let config = Config::builder()
//!     .boundary_generator(SequentialBoundary::new("part-"))
//!     .message_id_generator(FixedMessageId("<fixed@example.com>".into()))
//!     .build();
//! let mut email = Email::new("Hi", Mailbox::from_address("a@example.com"), [])
//!     .with_config(config);
//! email.add_text_body("one")?;
//! email.add_html_body("<b>two</b>")?;
//!
//! let text = String::from_utf8(email.to_bytes(Mode::EightBit)?).unwrap();
//! assert!(text.contains("boundary=\"part-0000\""));
//! assert!(text.contains("Message-Id: <fixed@example.com>"));
//! # Ok::<(), mailwright::Error>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod address;
mod config;
mod content_type;
mod error;
mod generator;
mod header;
mod message;
mod part;

pub mod encoding;

pub use address::Mailbox;
pub use config::{Config, ConfigBuilder};
pub use content_type::ContentType;
pub use encoding::{Mode, TransferEncoding};
pub use error::{Error, Result};
pub use generator::{
    BoundaryGenerator, FixedMessageId, MessageIdGenerator, RandomBoundary, RandomMessageId,
    SequentialBoundary,
};
pub use header::{Headers, canonical_name};
pub use message::{Email, Envelope, format_date};
pub use part::{BinaryPart, Multipart, Part, TextPart};
