//! Registry mapping encoding names to decoder factories.
//!
//! Decoder instances are cached per `(encoding, width, height)` so that codec
//! state survives from one packet of a stream to the next.
//!
//! # Example
//!
//! ```
//! use evcam_core::codec::{DecoderRegistry, MonoDecoder, RawDecoder};
//!
//! let mut registry = DecoderRegistry::new();
//! registry.register("mono", |_w: u32, _h: u32| {
//!     Box::new(MonoDecoder::new()) as Box<dyn RawDecoder>
//! });
//! assert!(registry.get_instance("mono", 640, 480).is_some());
//! assert!(registry.get_instance("bogus", 640, 480).is_none());
//! ```

use std::collections::HashMap;

use tracing::debug;

use super::{Evt3Decoder, MonoDecoder, RawDecoder};

/// Creates decoder instances for one encoding.
pub trait DecoderFactory {
    fn create(&self, width: u32, height: u32) -> Box<dyn RawDecoder>;
}

impl<F> DecoderFactory for F
where
    F: Fn(u32, u32) -> Box<dyn RawDecoder>,
{
    fn create(&self, width: u32, height: u32) -> Box<dyn RawDecoder> {
        self(width, height)
    }
}

type InstanceKey = (String, u32, u32);

/// Registry of decoder factories plus the instances created from them.
pub struct DecoderRegistry {
    factories: HashMap<String, Box<dyn DecoderFactory>>,
    instances: HashMap<InstanceKey, Box<dyn RawDecoder>>,
}

impl Default for DecoderRegistry {
    /// Registry with the built-in `evt3` and `mono` codecs.
    fn default() -> Self {
        let mut registry = Self::new();
        registry.register(Evt3Decoder::ENCODING, |_w: u32, _h: u32| {
            Box::new(Evt3Decoder::new()) as Box<dyn RawDecoder>
        });
        registry.register(MonoDecoder::ENCODING, |_w: u32, _h: u32| {
            Box::new(MonoDecoder::new()) as Box<dyn RawDecoder>
        });
        registry
    }
}

impl std::fmt::Debug for DecoderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecoderRegistry")
            .field("encodings", &self.encodings())
            .field("instances", &self.instances.len())
            .finish()
    }
}

impl DecoderRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
            instances: HashMap::new(),
        }
    }

    /// Registers a factory for `encoding`, replacing any previous one.
    ///
    /// Cached instances of a replaced encoding are dropped.
    pub fn register(
        &mut self,
        encoding: impl Into<String>,
        factory: impl DecoderFactory + 'static,
    ) {
        let encoding = encoding.into();
        self.instances.retain(|(enc, _, _), _| *enc != encoding);
        self.factories.insert(encoding, Box::new(factory));
    }

    /// Returns true if a factory is registered for `encoding`.
    pub fn has_encoding(&self, encoding: &str) -> bool {
        self.factories.contains_key(encoding)
    }

    /// Returns the registered encoding names, sorted.
    pub fn encodings(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Returns the decoder for the given stream, creating it on first use.
    ///
    /// Returns `None` if no factory is registered for `encoding`.
    pub fn get_instance(
        &mut self,
        encoding: &str,
        width: u32,
        height: u32,
    ) -> Option<&mut dyn RawDecoder> {
        let key = (encoding.to_string(), width, height);
        if !self.instances.contains_key(&key) {
            let factory = self.factories.get(encoding)?;
            debug!(encoding, width, height, "creating decoder instance");
            self.instances.insert(key.clone(), factory.create(width, height));
        }
        let decoder = self.instances.get_mut(&key)?;
        Some(decoder.as_mut())
    }

    /// Returns an already created decoder without creating a new one.
    pub(crate) fn existing_instance(
        &mut self,
        encoding: &str,
        width: u32,
        height: u32,
    ) -> Option<&mut dyn RawDecoder> {
        let decoder = self
            .instances
            .get_mut(&(encoding.to_string(), width, height))?;
        Some(decoder.as_mut())
    }
}
