//! Boundary and message identifier generators.
//!
//! Generators are shared, immutable configuration: implementations must be
//! safe to call from several threads at once.

use std::sync::atomic::{AtomicU32, Ordering};

use rand::Rng;
use rand::distributions::Alphanumeric;

use crate::message::Envelope;
use crate::part::Multipart;

const BOUNDARY_LENGTH: usize = 40;
const MESSAGE_ID_LENGTH: usize = 24;

/// Supplies boundary tokens for multipart containers.
///
/// A token must not occur inside any content written below the container.
pub trait BoundaryGenerator: Send + Sync {
    /// Returns a boundary for `multipart`.
    fn boundary(&self, multipart: &Multipart) -> String;
}

impl<F> BoundaryGenerator for F
where
    F: Fn(&Multipart) -> String + Send + Sync,
{
    fn boundary(&self, multipart: &Multipart) -> String {
        self(multipart)
    }
}

/// Supplies `Message-Id` values for messages that have none.
pub trait MessageIdGenerator: Send + Sync {
    /// Returns a message identifier for `envelope`.
    fn message_id(&self, envelope: &Envelope) -> String;
}

impl<F> MessageIdGenerator for F
where
    F: Fn(&Envelope) -> String + Send + Sync,
{
    fn message_id(&self, envelope: &Envelope) -> String {
        self(envelope)
    }
}

/// Random alphanumeric boundaries.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomBoundary;

impl BoundaryGenerator for RandomBoundary {
    fn boundary(&self, _multipart: &Multipart) -> String {
        random_token(BOUNDARY_LENGTH)
    }
}

/// Sequential boundaries in the format `{prefix}{n:04}`.
///
/// Output is deterministic, which makes it suitable for tests and for
/// reproducible fixtures. Uniqueness against content is the caller's concern.
#[derive(Debug)]
pub struct SequentialBoundary {
    counter: AtomicU32,
    prefix: String,
}

impl SequentialBoundary {
    /// Creates a generator with the given prefix.
    #[must_use]
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            counter: AtomicU32::new(0),
            prefix: prefix.into(),
        }
    }

    /// Returns the number of boundaries generated so far.
    #[must_use]
    pub fn current(&self) -> u32 {
        self.counter.load(Ordering::Relaxed)
    }
}

impl Default for SequentialBoundary {
    fn default() -> Self {
        Self::new("boundary-")
    }
}

impl BoundaryGenerator for SequentialBoundary {
    fn boundary(&self, _multipart: &Multipart) -> String {
        let n = self.counter.fetch_add(1, Ordering::Relaxed);
        format!("{}{:04}", self.prefix, n)
    }
}

/// Random message identifiers of the form `<token@domain>`.
///
/// The domain is taken from the sender address, falling back to `localhost`.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomMessageId;

impl MessageIdGenerator for RandomMessageId {
    fn message_id(&self, envelope: &Envelope) -> String {
        let domain = envelope.from.domain().unwrap_or("localhost");
        format!("<{}@{domain}>", random_token(MESSAGE_ID_LENGTH))
    }
}

/// Always returns the same identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixedMessageId(pub String);

impl MessageIdGenerator for FixedMessageId {
    fn message_id(&self, _envelope: &Envelope) -> String {
        self.0.clone()
    }
}

fn random_token(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
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
    use crate::address::Mailbox;
    use std::collections::HashSet;

    #[test]
    fn test_random_boundary_format() {
        let multipart = Multipart::mixed();
        let boundary = RandomBoundary.boundary(&multipart);
        assert_eq!(boundary.len(), BOUNDARY_LENGTH);
        assert!(boundary.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn test_random_boundary_uniqueness() {
        let multipart = Multipart::mixed();
        let seen: HashSet<_> = (0..1000).map(|_| RandomBoundary.boundary(&multipart)).collect();
        assert_eq!(seen.len(), 1000);
    }

    #[test]
    fn test_sequential_boundary() {
        let generator = SequentialBoundary::new("b");
        let multipart = Multipart::alternative();
        assert_eq!(generator.boundary(&multipart), "b0000");
        assert_eq!(generator.boundary(&multipart), "b0001");
        assert_eq!(generator.current(), 2);
    }

    #[test]
    fn test_closure_generators() {
        let boundary = |m: &Multipart| format!("{}-fixed", m.content_type.sub_type);
        assert_eq!(boundary.boundary(&Multipart::related()), "related-fixed");

        let id = |e: &Envelope| format!("<{}@test>", e.subject.len());
        let mut envelope = Envelope::default();
        envelope.subject = "abc".to_string();
        assert_eq!(id.message_id(&envelope), "<3@test>");
    }

    #[test]
    fn test_random_message_id_uses_sender_domain() {
        let mut envelope = Envelope::default();
        envelope.from = Mailbox::new("A", "a@example.org");
        let id = RandomMessageId.message_id(&envelope);
        assert!(id.starts_with('<'));
        assert!(id.ends_with("@example.org>"));

        let id = RandomMessageId.message_id(&Envelope::default());
        assert!(id.ends_with("@localhost>"));
    }

    #[test]
    fn test_fixed_message_id() {
        let generator = FixedMessageId("<fixed@id>".to_string());
        assert_eq!(generator.message_id(&Envelope::default()), "<fixed@id>");
    }
}
