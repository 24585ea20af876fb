//! Serialization configuration.

use std::fmt;
use std::sync::Arc;

use crate::generator::{BoundaryGenerator, MessageIdGenerator, RandomBoundary, RandomMessageId};

/// Generators used when a message or container has no explicit value.
///
/// Cloning is cheap; clones share the same generators.
#[derive(Clone)]
pub struct Config {
    boundary: Arc<dyn BoundaryGenerator>,
    message_id: Arc<dyn MessageIdGenerator>,
}

impl Config {
    /// Creates a configuration builder.
    #[must_use]
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }

    /// Returns the boundary generator.
    #[must_use]
    pub fn boundary_generator(&self) -> &dyn BoundaryGenerator {
        self.boundary.as_ref()
    }

    /// Returns the message identifier generator.
    #[must_use]
    pub fn message_id_generator(&self) -> &dyn MessageIdGenerator {
        self.message_id.as_ref()
    }
}

impl Default for Config {
    fn default() -> Self {
        ConfigBuilder::new().build()
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config").finish_non_exhaustive()
    }
}

/// Builder for [`Config`].
#[derive(Default)]
pub struct ConfigBuilder {
    boundary: Option<Arc<dyn BoundaryGenerator>>,
    message_id: Option<Arc<dyn MessageIdGenerator>>,
}

impl ConfigBuilder {
    /// Creates a builder with the random generators as defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the boundary generator.
    #[must_use]
    pub fn boundary_generator(mut self, generator: impl BoundaryGenerator + 'static) -> Self {
        self.boundary = Some(Arc::new(generator));
        self
    }

    /// Sets the message identifier generator.
    #[must_use]
    pub fn message_id_generator(mut self, generator: impl MessageIdGenerator + 'static) -> Self {
        self.message_id = Some(Arc::new(generator));
        self
    }

    /// Builds the configuration.
    #[must_use]
    pub fn build(self) -> Config {
        Config {
            boundary: self.boundary.unwrap_or_else(|| Arc::new(RandomBoundary)),
            message_id: self.message_id.unwrap_or_else(|| Arc::new(RandomMessageId)),
        }
    }
}

impl fmt::Debug for ConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigBuilder")
            .field("boundary", &self.boundary.is_some())
            .field("message_id", &self.message_id.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::{FixedMessageId, SequentialBoundary};
    use crate::message::Envelope;
    use crate::part::Multipart;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        let boundary = config.boundary_generator().boundary(&Multipart::mixed());
        assert_eq!(boundary.len(), 40);
    }

    #[test]
    fn test_builder_overrides() {
        let config = Config::builder()
            .boundary_generator(SequentialBoundary::new("x"))
            .message_id_generator(FixedMessageId("<id@test>".into()))
            .build();

        assert_eq!(config.boundary_generator().boundary(&Multipart::mixed()), "x0000");
        assert_eq!(
            config.message_id_generator().message_id(&Envelope::default()),
            "<id@test>"
        );
    }

    #[test]
    fn test_clones_share_generators() {
        let config = Config::builder()
            .boundary_generator(SequentialBoundary::new("s"))
            .build();
        let clone = config.clone();

        assert_eq!(config.boundary_generator().boundary(&Multipart::mixed()), "s0000");
        assert_eq!(clone.boundary_generator().boundary(&Multipart::mixed()), "s0001");
    }
}
