//! Message assembly.
//!
//! An [`Email`] holds the envelope fields and an optional root [`Part`].
//! Serialization writes the envelope headers through the header encoder and
//! then hands the sink to the root part.
//!
//! # Example
//!
//! ```
//! use mailwright::{Email, Mailbox, Mode};
//!
//! let mut email = Email::new(
//!     "Status report",
//!     Mailbox::new("Alice", "alice@example.com"),
//!     [Mailbox::from_address("bob@example.com")],
//! );
//! email.add_text_body("All systems nominal.")?;
//!
//! let bytes = email.to_bytes(Mode::EightBit)?;
//! assert!(bytes.starts_with(b"Date: "));
//! # Ok::<(), mailwright::Error>(())
//! ```

use std::io::{Read, Write};

use chrono::{DateTime, FixedOffset, Local};

use crate::address::Mailbox;
use crate::config::Config;
use crate::encoding::header::{write_address_header, write_header};
use crate::encoding::{CRLF, Mode};
use crate::error::{Error, Result};
use crate::header::{Headers, validate_name};
use crate::part::{Multipart, Part, TextPart};

/// Header names written from envelope or part fields.
const RESERVED_HEADERS: [&str; 11] = [
    "Date",
    "From",
    "To",
    "Cc",
    "Bcc",
    "Reply-To",
    "Subject",
    "Message-Id",
    "MIME-Version",
    "Content-Type",
    "Content-Transfer-Encoding",
];

/// `Date` header format (RFC 5322 section 3.3).
const DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S %z";

/// Envelope fields of a message.
#[derive(Debug, Clone, Default)]
pub struct Envelope {
    /// Sender.
    pub from: Mailbox,
    /// Primary recipients.
    pub to: Vec<Mailbox>,
    /// Carbon copy recipients.
    pub cc: Vec<Mailbox>,
    /// Blind carbon copy recipients.
    pub bcc: Vec<Mailbox>,
    /// Reply-To addresses.
    pub reply_to: Vec<Mailbox>,
    /// Send date; the current time is used when unset.
    pub date: Option<DateTime<FixedOffset>>,
    /// Subject line.
    pub subject: String,
    /// Message identifier; generated when unset.
    pub message_id: Option<String>,
    headers: Headers,
}

impl Envelope {
    /// Returns the extra headers.
    #[must_use]
    pub const fn headers(&self) -> &Headers {
        &self.headers
    }
}

/// Shape of the root part, as seen by body insertion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BodyState {
    Empty,
    SingleText,
    SingleHtml,
    Multipart,
    Binary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BodyKind {
    Text,
    Html,
}

/// An email message: envelope plus an optional root part.
#[derive(Debug, Default)]
pub struct Email {
    envelope: Envelope,
    body: Option<Part>,
    config: Config,
}

impl Email {
    /// Creates a message with a subject, sender and primary recipients.
    #[must_use]
    pub fn new(
        subject: impl Into<String>,
        from: Mailbox,
        to: impl IntoIterator<Item = Mailbox>,
    ) -> Self {
        Self {
            envelope: Envelope {
                from,
                to: to.into_iter().collect(),
                subject: subject.into(),
                ..Envelope::default()
            },
            body: None,
            config: Config::default(),
        }
    }

    /// Replaces the generator configuration.
    #[must_use]
    pub fn with_config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Returns the generator configuration.
    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// Returns the envelope.
    #[must_use]
    pub const fn envelope(&self) -> &Envelope {
        &self.envelope
    }

    /// Returns the envelope mutably.
    pub const fn envelope_mut(&mut self) -> &mut Envelope {
        &mut self.envelope
    }

    /// Sets the sender.
    pub fn set_from(&mut self, from: Mailbox) {
        self.envelope.from = from;
    }

    /// Appends primary recipients.
    pub fn add_to(&mut self, mailboxes: impl IntoIterator<Item = Mailbox>) {
        self.envelope.to.extend(mailboxes);
    }

    /// Appends carbon copy recipients.
    pub fn add_cc(&mut self, mailboxes: impl IntoIterator<Item = Mailbox>) {
        self.envelope.cc.extend(mailboxes);
    }

    /// Appends blind carbon copy recipients.
    pub fn add_bcc(&mut self, mailboxes: impl IntoIterator<Item = Mailbox>) {
        self.envelope.bcc.extend(mailboxes);
    }

    /// Appends Reply-To addresses.
    pub fn add_reply_to(&mut self, mailboxes: impl IntoIterator<Item = Mailbox>) {
        self.envelope.reply_to.extend(mailboxes);
    }

    /// Sets the subject.
    pub fn set_subject(&mut self, subject: impl Into<String>) {
        self.envelope.subject = subject.into();
    }

    /// Sets the send date.
    pub fn set_date(&mut self, date: DateTime<FixedOffset>) {
        self.envelope.date = Some(date);
    }

    /// Sets the message identifier, angle brackets included.
    pub fn set_message_id(&mut self, message_id: impl Into<String>) {
        self.envelope.message_id = Some(message_id.into());
    }

    /// Adds an extra header, after any earlier values of the same name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidHeader`] for an invalid name and
    /// [`Error::ReservedHeader`] for a header written from a dedicated field.
    pub fn add_header(&mut self, name: &str, value: impl Into<String>) -> Result<()> {
        validate_name(name)?;
        if RESERVED_HEADERS
            .iter()
            .any(|reserved| reserved.eq_ignore_ascii_case(name))
        {
            return Err(Error::ReservedHeader(name.to_string()));
        }
        self.envelope.headers.add(name, value);
        Ok(())
    }

    /// Returns the root part.
    #[must_use]
    pub const fn body(&self) -> Option<&Part> {
        self.body.as_ref()
    }

    /// Returns the root part mutably.
    pub const fn body_mut(&mut self) -> Option<&mut Part> {
        self.body.as_mut()
    }

    /// Replaces the root part.
    pub fn set_body(&mut self, part: impl Into<Part>) {
        self.body = Some(part.into());
    }

    /// Inserts a text/plain body.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AmbiguousMimeTree`] if the root is a binary part.
    pub fn add_text_body(&mut self, content: impl Into<Vec<u8>>) -> Result<()> {
        self.insert_body(BodyKind::Text, TextPart::plain(content))
    }

    /// Inserts a text/html body.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AmbiguousMimeTree`] if the root is a binary part.
    pub fn add_html_body(&mut self, content: impl Into<Vec<u8>>) -> Result<()> {
        self.insert_body(BodyKind::Html, TextPart::html(content))
    }

    /// Reads `reader` to the end and inserts it as a text/plain body.
    ///
    /// # Errors
    ///
    /// Returns an error if reading fails or the root is a binary part.
    pub fn add_text_body_reader(&mut self, mut reader: impl Read) -> Result<()> {
        let mut content = Vec::new();
        reader.read_to_end(&mut content)?;
        self.add_text_body(content)
    }

    /// Reads `reader` to the end and inserts it as a text/html body.
    ///
    /// # Errors
    ///
    /// Returns an error if reading fails or the root is a binary part.
    pub fn add_html_body_reader(&mut self, mut reader: impl Read) -> Result<()> {
        let mut content = Vec::new();
        reader.read_to_end(&mut content)?;
        self.add_html_body(content)
    }

    fn body_state(&self) -> BodyState {
        match &self.body {
            None => BodyState::Empty,
            Some(Part::Text(text)) if text.is_html() => BodyState::SingleHtml,
            Some(Part::Text(_)) => BodyState::SingleText,
            Some(Part::Multipart(_)) => BodyState::Multipart,
            Some(Part::Binary(_)) => BodyState::Binary,
        }
    }

    fn insert_body(&mut self, kind: BodyKind, part: TextPart) -> Result<()> {
        let state = self.body_state();
        tracing::trace!(?state, ?kind, "inserting body");

        match (state, kind) {
            (BodyState::Binary, _) => return Err(Error::AmbiguousMimeTree),
            (BodyState::Empty, _) => self.body = Some(part.into()),
            (BodyState::SingleText | BodyState::SingleHtml, BodyKind::Text) => {
                let mut alternative = Multipart::alternative().with_part(part);
                alternative.parts_mut().extend(self.body.take());
                self.body = Some(alternative.into());
            }
            (BodyState::SingleText | BodyState::SingleHtml, BodyKind::Html) => {
                let mut alternative = Multipart::alternative();
                alternative.parts_mut().extend(self.body.take());
                alternative.push(part);
                self.body = Some(alternative.into());
            }
            (BodyState::Multipart, kind) => {
                if let Some(Part::Multipart(multipart)) = self.body.as_mut() {
                    match kind {
                        BodyKind::Text => multipart.prepend(part),
                        BodyKind::Html => multipart.push(part),
                    }
                }
            }
        }
        Ok(())
    }

    /// Serializes the message into `sink`.
    ///
    /// An unset date or message identifier is filled in for this call only,
    /// so two calls differ in those headers unless both are set. Containers
    /// keep the boundaries assigned on the first call.
    ///
    /// # Errors
    ///
    /// Returns [`Error::FromRequired`] without a sender, [`Error::NoBody`]
    /// without a root part, or an I/O error from the sink or a content source.
    pub fn write_to<W: Write + ?Sized>(&mut self, sink: &mut W, mode: Mode) -> Result<()> {
        let envelope = &self.envelope;
        let date = envelope
            .date
            .unwrap_or_else(|| Local::now().fixed_offset());
        let message_id = envelope.message_id.clone().unwrap_or_else(|| {
            self.config
                .message_id_generator()
                .message_id(envelope)
        });

        tracing::debug!(
            ?mode,
            default_date = envelope.date.is_none(),
            default_message_id = envelope.message_id.is_none(),
            "serializing message"
        );

        if envelope.from.is_empty() {
            return Err(Error::FromRequired);
        }
        let Some(body) = self.body.as_mut() else {
            return Err(Error::NoBody);
        };

        let mut head = Vec::with_capacity(1024);
        write_header(&mut head, "Date", &format_date(&date));
        write_address_header(&mut head, "From", std::slice::from_ref(&envelope.from));
        for (name, mailboxes) in [
            ("To", &envelope.to),
            ("Cc", &envelope.cc),
            ("Bcc", &envelope.bcc),
            ("Reply-To", &envelope.reply_to),
        ] {
            if !mailboxes.is_empty() {
                write_address_header(&mut head, name, mailboxes);
            }
        }
        write_header(&mut head, "Subject", &envelope.subject);
        write_header(&mut head, "Message-Id", &message_id);
        head.extend_from_slice(b"MIME-Version: 1.0");
        head.extend_from_slice(CRLF);
        for (name, value) in envelope.headers.iter() {
            write_header(&mut head, name, value);
        }

        sink.write_all(&head)?;
        body.write_to(sink, mode, self.config.boundary_generator())
    }

    /// Serializes the message into a byte vector.
    ///
    /// # Errors
    ///
    /// See [`Email::write_to`].
    pub fn to_bytes(&mut self, mode: Mode) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        self.write_to(&mut out, mode)?;
        Ok(out)
    }
}

/// Formats a date for the `Date` header, e.g. `Tue, 01 Jul 2003 10:52:37 +0200`.
#[must_use]
pub fn format_date(date: &DateTime<FixedOffset>) -> String {
    date.format(DATE_FORMAT).to_string()
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
    use crate::content_type::ContentType;
    use crate::generator::{FixedMessageId, SequentialBoundary};
    use crate::part::BinaryPart;
    use std::io::Cursor;

    fn fixed_date() -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339("2003-07-01T10:52:37+02:00").unwrap()
    }

    fn email() -> Email {
        Email::new(
            "Hi",
            Mailbox::from_address("a@x.com"),
            [Mailbox::from_address("b@y.com")],
        )
    }

    fn root_children(email: &Email) -> Vec<(&str, &[u8])> {
        match email.body() {
            Some(Part::Multipart(multipart)) => multipart
                .parts()
                .iter()
                .map(|part| match part {
                    Part::Text(text) => (text.content_type.sub_type.as_str(), text.content.as_slice()),
                    _ => panic!("unexpected child"),
                })
                .collect(),
            other => panic!("expected multipart root, got {other:?}"),
        }
    }

    #[test]
    fn test_format_date() {
        assert_eq!(format_date(&fixed_date()), "Tue, 01 Jul 2003 10:52:37 +0200");
    }

    #[test]
    fn test_insert_into_empty() {
        let mut email = email();
        assert_eq!(email.body_state(), BodyState::Empty);
        email.add_html_body("<p>x</p>").unwrap();
        assert_eq!(email.body_state(), BodyState::SingleHtml);

        let mut email = self::email();
        email.add_text_body("x").unwrap();
        assert_eq!(email.body_state(), BodyState::SingleText);
    }

    #[test]
    fn test_text_then_html() {
        let mut email = email();
        email.add_text_body("plain").unwrap();
        email.add_html_body("html").unwrap();

        assert_eq!(
            email.body().unwrap().content_type().essence(),
            "multipart/alternative"
        );
        assert_eq!(
            root_children(&email),
            vec![("plain", b"plain".as_slice()), ("html", b"html".as_slice())]
        );
    }

    #[test]
    fn test_html_then_text() {
        let mut email = email();
        email.add_html_body("html").unwrap();
        email.add_text_body("plain").unwrap();

        assert_eq!(
            root_children(&email),
            vec![("plain", b"plain".as_slice()), ("html", b"html".as_slice())]
        );
    }

    #[test]
    fn test_same_kind_twice() {
        let mut email = email();
        email.add_text_body("first").unwrap();
        email.add_text_body("second").unwrap();
        assert_eq!(
            root_children(&email),
            vec![("plain", b"second".as_slice()), ("plain", b"first".as_slice())]
        );

        let mut email = self::email();
        email.add_html_body("first").unwrap();
        email.add_html_body("second").unwrap();
        assert_eq!(
            root_children(&email),
            vec![("html", b"first".as_slice()), ("html", b"second".as_slice())]
        );
    }

    #[test]
    fn test_multipart_root_prepend_and_append() {
        let mut email = email();
        email.set_body(Multipart::mixed().with_part(BinaryPart::new(
            ContentType::octet_stream(),
            Cursor::new(Vec::<u8>::new()),
        )));
        email.add_text_body("t").unwrap();
        email.add_html_body("h").unwrap();

        let Some(Part::Multipart(root)) = email.body() else {
            panic!("expected multipart root");
        };
        assert_eq!(root.content_type.essence(), "multipart/mixed");
        assert_eq!(root.parts().len(), 3);
        assert!(matches!(&root.parts()[0], Part::Text(t) if !t.is_html()));
        assert!(matches!(&root.parts()[1], Part::Binary(_)));
        assert!(matches!(&root.parts()[2], Part::Text(t) if t.is_html()));
    }

    #[test]
    fn test_binary_root_is_ambiguous() {
        let mut email = email();
        email.set_body(BinaryPart::new(
            ContentType::new("image", "png"),
            Cursor::new(vec![1, 2, 3]),
        ));

        assert!(matches!(
            email.add_text_body("x"),
            Err(Error::AmbiguousMimeTree)
        ));
        assert!(matches!(
            email.add_html_body_reader(Cursor::new("y")),
            Err(Error::AmbiguousMimeTree)
        ));
        assert_eq!(email.body_state(), BodyState::Binary);
    }

    #[test]
    fn test_body_reader() {
        let mut email = email();
        email.add_text_body_reader(Cursor::new("from reader")).unwrap();
        let Some(Part::Text(text)) = email.body() else {
            panic!("expected text root");
        };
        assert_eq!(text.content, b"from reader");
    }

    #[test]
    fn test_add_header_rules() {
        let mut email = email();
        email.add_header("X-Mailer", "mailwright").unwrap();
        email.add_header("x-mailer", "again").unwrap();

        assert!(matches!(
            email.add_header("subject", "nope"),
            Err(Error::ReservedHeader(_))
        ));
        assert!(matches!(
            email.add_header("Mime-Version", "2.0"),
            Err(Error::ReservedHeader(_))
        ));
        assert!(matches!(
            email.add_header("X:Bad", "v"),
            Err(Error::InvalidHeader(_))
        ));

        let values: Vec<_> = email.envelope().headers().get_all("X-Mailer").collect();
        assert_eq!(values, vec!["mailwright", "again"]);
    }

    #[test]
    fn test_preconditions() {
        let mut email = Email::new("s", Mailbox::default(), []);
        email.add_text_body("x").unwrap();
        assert!(matches!(email.to_bytes(Mode::SevenBit), Err(Error::FromRequired)));

        let mut email = self::email();
        assert!(matches!(email.to_bytes(Mode::SevenBit), Err(Error::NoBody)));
    }

    #[test]
    fn test_header_block_order() {
        let mut email = email().with_config(
            Config::builder()
                .message_id_generator(FixedMessageId("<id@x.com>".into()))
                .boundary_generator(SequentialBoundary::new("b"))
                .build(),
        );
        email.set_date(fixed_date());
        email.add_cc([Mailbox::new("Carol", "c@z.com")]);
        email.add_reply_to([Mailbox::from_address("r@x.com")]);
        email.add_header("X-Priority", "1").unwrap();
        email.add_text_body("body").unwrap();

        let out = String::from_utf8(email.to_bytes(Mode::EightBit).unwrap()).unwrap();
        assert_eq!(
            out,
            "Date: Tue, 01 Jul 2003 10:52:37 +0200\r\n\
             From: <a@x.com>\r\n\
             To: <b@y.com>\r\n\
             Cc: \"Carol\" <c@z.com>\r\n\
             Reply-To: <r@x.com>\r\n\
             Subject: Hi\r\n\
             Message-Id: <id@x.com>\r\n\
             MIME-Version: 1.0\r\n\
             X-Priority: 1\r\n\
             Content-Type: text/plain; charset=utf-8\r\n\
             Content-Transfer-Encoding: 8bit\r\n\
             Content-Disposition: inline\r\n\
             \r\n\
             body\r\n"
        );
    }

    #[test]
    fn test_lazy_defaults_not_stored() {
        let counter = std::sync::atomic::AtomicU32::new(0);
        let mut email = email().with_config(
            Config::builder()
                .message_id_generator(move |_: &Envelope| {
                    let n = counter.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                    format!("<{n}@x.com>")
                })
                .build(),
        );
        email.add_text_body("x").unwrap();

        let first = String::from_utf8(email.to_bytes(Mode::SevenBit).unwrap()).unwrap();
        let second = String::from_utf8(email.to_bytes(Mode::SevenBit).unwrap()).unwrap();
        assert!(first.contains("Message-Id: <0@x.com>\r\n"));
        assert!(second.contains("Message-Id: <1@x.com>\r\n"));
        assert!(email.envelope().message_id.is_none());
        assert!(email.envelope().date.is_none());
    }
}
