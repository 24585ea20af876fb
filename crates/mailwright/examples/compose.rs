#![allow(clippy::doc_markdown)]
//! Example: Compose a message with alternative bodies and an attachment
//!
//! Writes the serialized message to stdout.
//!
//! ## Running
//!
//! ```bash
//! RUST_LOG=mailwright=trace cargo run --package mailwright --example compose
//! ```

use std::io::{self, Cursor};

use mailwright::{BinaryPart, ContentType, Email, Mailbox, Mode, Multipart, TextPart};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mailwright=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let mut email = Email::new(
        "Trip photos 旅行の写真",
        Mailbox::new("Dana Smith", "dana@example.com"),
        [
            Mailbox::new("Kenji Tanaka", "kenji@example.jp"),
            Mailbox::new("Zoë", "zoe@example.org"),
        ],
    );
    email.add_cc([Mailbox::from_address("archive@example.com")]);
    email.add_header("X-Mailer", "mailwright compose example")?;

    let alternative = Multipart::alternative()
        .with_part(TextPart::plain("Photos from the trip are attached.\n"))
        .with_part(TextPart::html(
            "<p>Photos from the trip are <b>attached</b>.</p>\n",
        ));
    let photo = (0u8..=255).cycle().take(600).collect::<Vec<_>>();

    email.set_body(
        Multipart::mixed()
            .with_part(alternative)
            .with_part(BinaryPart::attachment(
                ContentType::new("image", "jpeg"),
                "beach.jpg",
                Cursor::new(photo),
            )),
    );

    email.write_to(&mut io::stdout().lock(), Mode::EightBit)?;
    Ok(())
}
