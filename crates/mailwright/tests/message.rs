//! Integration tests for whole-message serialization.
//!
//! These tests drive the public API only and inspect the produced bytes.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::io::Cursor;

use chrono::DateTime;
use mailwright::encoding::{decode_base64, decode_header_value, decode_quoted_printable};
use mailwright::{
    BinaryPart, Config, ContentType, Email, Error, FixedMessageId, Mailbox, Mode, Multipart,
    Part, SequentialBoundary, TextPart,
};

fn deterministic(email: Email) -> Email {
    let mut email = email.with_config(
        Config::builder()
            .boundary_generator(SequentialBoundary::new("=_b"))
            .message_id_generator(FixedMessageId("<fixed@example.com>".into()))
            .build(),
    );
    email.set_date(DateTime::parse_from_rfc3339("2024-02-29T23:59:01-05:00").unwrap());
    email.set_message_id("<preset@example.com>");
    email
}

fn email() -> Email {
    Email::new(
        "Hello",
        Mailbox::new("A", "a@x.com"),
        [Mailbox::from_address("b@y.com")],
    )
}

fn render(email: &mut Email, mode: Mode) -> String {
    String::from_utf8(email.to_bytes(mode).unwrap()).unwrap()
}

/// Returns the raw (still folded) value of the first header named `name`.
fn raw_header<'a>(message: &'a str, name: &str) -> &'a str {
    let prefix = format!("{name}: ");
    let start = if message.starts_with(&prefix) {
        0
    } else {
        message.find(&format!("\r\n{prefix}")).expect("header present") + 2
    };
    let value = &message[start + prefix.len()..];

    let mut end = value.find("\r\n").expect("terminated header");
    while value[end + 2..].starts_with(' ') {
        end += 2 + value[end + 2..].find("\r\n").expect("terminated line");
    }
    &value[..end]
}

fn header_section(message: &str) -> &str {
    message.split_once("\r\n\r\n").expect("blank line").0
}

#[test]
fn test_missing_body_fails() {
    let mut email = Email::new("No body", Mailbox::new("A", "a@x.com"), []);
    let err = email.to_bytes(Mode::SevenBit).unwrap_err();
    assert!(matches!(err, Error::NoBody));
    assert!(err.is_precondition());
}

#[test]
fn test_missing_sender_fails() {
    let mut email = Email::new("No sender", Mailbox::default(), []);
    email.add_text_body("x").unwrap();
    assert!(matches!(
        email.to_bytes(Mode::SevenBit),
        Err(Error::FromRequired)
    ));
}

#[test]
fn test_serialization_is_idempotent_with_preset_fields() {
    let mut email = deterministic(email());
    email.add_text_body("plain body").unwrap();
    email.add_html_body("<p>html body</p>").unwrap();
    let Some(Part::Multipart(root)) = email.body_mut() else {
        panic!("expected multipart root");
    };
    root.push(BinaryPart::new(
        ContentType::octet_stream(),
        Cursor::new(Vec::<u8>::new()),
    ));

    let first = email.to_bytes(Mode::SevenBit).unwrap();
    let second = email.to_bytes(Mode::SevenBit).unwrap();
    assert_eq!(first, second);

    let text = String::from_utf8(first).unwrap();
    assert!(text.starts_with("Date: Thu, 29 Feb 2024 23:59:01 -0500\r\n"));
    assert!(text.contains("Message-Id: <preset@example.com>\r\n"));
    assert!(text.contains("boundary=\"=_b0000\""));
}

#[test]
fn test_random_boundary_is_cached() {
    let mut email = email();
    email.set_date(DateTime::parse_from_rfc3339("2024-01-01T00:00:00Z").unwrap());
    email.set_message_id("<x@y>");
    email.add_text_body("a").unwrap();
    email.add_html_body("b").unwrap();

    assert_eq!(email.to_bytes(Mode::EightBit).unwrap(), email.to_bytes(Mode::EightBit).unwrap());
}

#[test]
fn test_mixed_subject_round_trip() {
    let subject = "A test subject 测试对象, with a rather long mixture of ASCII words \
                   和中文字符 that must fold across several lines 测试对象测试对象测试对象";
    let mut email = deterministic(email());
    email.set_subject(subject);
    email.add_text_body("x").unwrap();

    let message = render(&mut email, Mode::SevenBit);
    let raw = raw_header(&message, "Subject");
    assert!(raw.contains("\r\n "));
    assert_eq!(decode_header_value(raw).unwrap(), subject);

    for line in header_section(&message).split("\r\n") {
        assert!(line.len() <= 78, "line too long: {line:?}");
    }
}

#[test]
fn test_text_body_transfer_encoding_follows_mode() {
    let mut email = deterministic(email());
    email.add_text_body("Hello").unwrap();
    assert!(matches!(email.body(), Some(Part::Text(_))));

    let seven = render(&mut email, Mode::SevenBit);
    assert!(seven.contains("Content-Type: text/plain; charset=utf-8\r\n"));
    assert!(seven.contains("Content-Transfer-Encoding: quoted-printable\r\n"));
    assert!(seven.ends_with("\r\n\r\nHello\r\n"));

    let eight = render(&mut email, Mode::EightBit);
    assert!(eight.contains("Content-Transfer-Encoding: 8bit\r\n"));
    assert!(eight.ends_with("\r\n\r\nHello\r\n"));
}

#[test]
fn test_non_ascii_text_round_trips_through_quoted_printable() {
    let body = "Grüße aus Köln!\nZeile zwei mit Leerzeichen am Ende   \n\tund Tab.";
    let mut email = deterministic(email());
    email.add_text_body(body).unwrap();

    let message = render(&mut email, Mode::SevenBit);
    let (_, encoded) = message.split_once("\r\n\r\n").unwrap();
    assert!(encoded.is_ascii());
    for line in encoded.split("\r\n") {
        assert!(line.len() <= 76);
        assert!(!line.ends_with(' ') && !line.ends_with('\t'));
    }

    let decoded = decode_quoted_printable(encoded).unwrap();
    assert_eq!(decoded, format!("{}\r\n", body.replace('\n', "\r\n")).into_bytes());
}

#[test]
fn test_text_then_html_then_text() {
    let mut email = deterministic(email());
    email.add_text_body("first text").unwrap();
    email.add_html_body("<p>html</p>").unwrap();
    email.add_text_body("second text").unwrap();

    let Some(Part::Multipart(root)) = email.body() else {
        panic!("expected multipart root");
    };
    assert_eq!(root.content_type.essence(), "multipart/alternative");
    let bodies: Vec<(&str, &[u8])> = root
        .parts()
        .iter()
        .map(|part| match part {
            Part::Text(text) => (text.content_type.sub_type.as_str(), text.content.as_slice()),
            _ => panic!("unexpected part"),
        })
        .collect();
    assert_eq!(
        bodies,
        vec![
            ("plain", b"second text".as_slice()),
            ("plain", b"first text".as_slice()),
            ("html", b"<p>html</p>".as_slice()),
        ]
    );

    let message = render(&mut email, Mode::EightBit);
    let second = message.find("second text").unwrap();
    let first = message.find("first text").unwrap();
    let html = message.find("<p>html</p>").unwrap();
    assert!(second < first && first < html);
    assert!(message.ends_with("\r\n--=_b0000--\r\n"));
}

#[test]
fn test_long_to_list_folds_between_addresses() {
    let recipients: Vec<Mailbox> = (1..=5)
        .map(|i| {
            Mailbox::new(
                format!("Recipient Number {i} With A Long Name"),
                format!("recipient.number.{i}@a-rather-long-domain.example.com"),
            )
        })
        .collect();
    let mut email = deterministic(Email::new(
        "Folding",
        Mailbox::from_address("a@x.com"),
        recipients.clone(),
    ));
    email.add_text_body("x").unwrap();

    let message = render(&mut email, Mode::SevenBit);
    let raw = raw_header(&message, "To");
    let lines: Vec<&str> = raw.split("\r\n").collect();
    assert!(lines.len() > 1);

    for line in &lines[1..] {
        assert!(line.starts_with(' '));
        assert!(!line.starts_with("  "));
    }
    for mailbox in &recipients {
        let rendered = mailbox.to_string();
        assert!(
            lines.iter().any(|line| line.contains(&rendered)),
            "address split across lines: {rendered}"
        );
    }
}

#[test]
fn test_attachment_base64_versus_binary() {
    let data: Vec<u8> = (0..1000u32).map(|i| (i * 7 % 256) as u8).collect();
    let build = |data: Vec<u8>| {
        let mut email = deterministic(email());
        email.set_body(
            Multipart::mixed()
                .with_part(TextPart::plain("see attachment"))
                .with_part(BinaryPart::attachment(
                    ContentType::octet_stream(),
                    "data.bin",
                    Cursor::new(data),
                )),
        );
        email
    };

    let message = render(&mut build(data.clone()), Mode::EightBit);
    assert!(message.contains("Content-Disposition: attachment; filename=\"data.bin\"\r\n"));
    assert!(message.contains("Content-Transfer-Encoding: base64\r\n"));
    let attachment = message.split("\r\n--=_b0000").nth(2).unwrap();
    let (_, encoded) = attachment.split_once("\r\n\r\n").unwrap();
    let lines: Vec<&str> = encoded.trim_end_matches("\r\n").split("\r\n").collect();
    for line in &lines[..lines.len() - 1] {
        assert_eq!(line.len(), 76);
    }
    assert_eq!(decode_base64(encoded).unwrap(), data);

    let raw = build(data.clone()).to_bytes(Mode::Binary).unwrap();
    let marker = b"Content-Transfer-Encoding: binary\r\nContent-Disposition: attachment; filename=\"data.bin\"\r\n\r\n";
    let start = raw
        .windows(marker.len())
        .position(|w| w == marker)
        .unwrap()
        + marker.len();
    assert_eq!(&raw[start..start + data.len()], data.as_slice());
    assert_eq!(&raw[start + data.len()..], b"\r\n--=_b0000--\r\n");
}

#[test]
fn test_nested_multipart() {
    let mut email = deterministic(email());
    email.set_body(
        Multipart::mixed()
            .with_part(
                Multipart::alternative()
                    .with_part(TextPart::plain("text"))
                    .with_part(TextPart::html("<i>html</i>")),
            )
            .with_part(
                Multipart::related()
                    .with_boundary("explicit-boundary")
                    .with_part(TextPart::html("<img src=\"cid:logo\">")),
            ),
    );

    let message = render(&mut email, Mode::EightBit);
    assert!(message.contains("Content-Type: multipart/mixed; boundary=\"=_b0000\"\r\n"));
    assert!(message.contains("Content-Type: multipart/alternative; boundary=\"=_b0001\"\r\n"));
    assert!(message.contains("Content-Type: multipart/related;"));
    assert!(message.contains("\r\n--explicit-boundary--\r\n"));

    let inner_close = message.find("\r\n--=_b0001--\r\n").unwrap();
    let related = message.find("\r\n--explicit-boundary\r\n").unwrap();
    let outer_close = message.find("\r\n--=_b0000--\r\n").unwrap();
    assert!(inner_close < related && related < outer_close);
}

#[test]
fn test_binary_root_rejects_body_insertion() {
    let mut email = deterministic(email());
    email.set_body(BinaryPart::new(
        ContentType::new("image", "png"),
        Cursor::new(vec![0x89, b'P', b'N', b'G']),
    ));

    assert!(matches!(
        email.add_text_body("hello"),
        Err(Error::AmbiguousMimeTree)
    ));
    assert!(matches!(
        email.add_html_body("<p>hello</p>"),
        Err(Error::AmbiguousMimeTree)
    ));

    let message = render(&mut email, Mode::SevenBit);
    assert!(message.contains("Content-Type: image/png\r\nContent-Transfer-Encoding: base64\r\n\r\niVBORw==\r\n"));
}

#[test]
fn test_address_headers_and_extras() {
    let mut email = deterministic(Email::new(
        "Headers",
        Mailbox::new("测试", "from@example.org"),
        [Mailbox::from_address("to@example.org")],
    ));
    email.add_cc([Mailbox::new("Carbon", "cc@example.org")]);
    email.add_bcc([Mailbox::from_address("bcc@example.org")]);
    email.add_reply_to([Mailbox::new("O'Brien, Pat", "pat@example.org")]);
    email.add_header("X-Tag", "one").unwrap();
    email.add_header("X-Tag", "two").unwrap();
    email.add_text_body("x").unwrap();

    let message = render(&mut email, Mode::EightBit);
    let headers = header_section(&message);
    let names: Vec<&str> = headers
        .split("\r\n")
        .filter(|line| !line.starts_with(' '))
        .map(|line| line.split_once(':').unwrap().0)
        .collect();
    assert_eq!(
        names,
        vec![
            "Date",
            "From",
            "To",
            "Cc",
            "Bcc",
            "Reply-To",
            "Subject",
            "Message-Id",
            "MIME-Version",
            "X-Tag",
            "X-Tag",
            "Content-Type",
            "Content-Transfer-Encoding",
            "Content-Disposition",
        ]
    );
    assert!(headers.contains("From: =?utf-8?q?=E6=B5=8B=E8=AF=95?= <from@example.org>\r\n"));
    assert!(headers.contains("Reply-To: \"O'Brien, Pat\" <pat@example.org>\r\n"));
    assert!(headers.contains("X-Tag: one\r\nX-Tag: two\r\n"));
}
