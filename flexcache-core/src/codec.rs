use std::fmt;
use std::sync::Arc;

use crate::config::CodecConfig;
use crate::error::{GraphError, SerializationError};
use crate::graph::{CborGraph, GraphFormat};
use crate::portable::{AnyPortable, Portable};
use crate::resolver::{NoContext, ResolutionSource, TypeResolver};
use crate::serializer::Serializer;

/// A serializer that records type descriptors in its payloads and resolves
/// them on the way back, asking a per-call contextual source before its own
/// default source.
///
/// The codec holds no per-call state and is shared freely between threads.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use flexcache_core::{FlexibleCodec, NoContext, TypeRegistry};
///
/// let codec = FlexibleCodec::new(Arc::new(TypeRegistry::with_builtins()));
///
/// let bytes = codec.serialize(Some(&"hello".to_string())).unwrap();
/// let value = codec.deserialize(Some(&bytes), &NoContext).unwrap().unwrap();
/// assert_eq!(value.downcast_ref::<String>().map(String::as_str), Some("hello"));
///
/// assert!(codec.serialize(None).unwrap().is_empty());
/// assert!(codec.deserialize(Some(&[]), &NoContext).unwrap().is_none());
/// ```
pub struct FlexibleCodec<F: GraphFormat = CborGraph> {
    format: F,
    default: Arc<dyn ResolutionSource>,
    config: CodecConfig,
}

impl FlexibleCodec<CborGraph> {
    /// Creates a CBOR codec with the default configuration.
    pub fn new(default: Arc<dyn ResolutionSource>) -> Self {
        Self::from_config(CodecConfig::default(), default)
    }

    /// Creates a CBOR codec from a configuration.
    pub fn from_config(config: CodecConfig, default: Arc<dyn ResolutionSource>) -> Self {
        let format = CborGraph::with_max_depth(config.max_depth);
        Self::with_format(format, default, config)
    }
}

impl<F: GraphFormat> FlexibleCodec<F> {
    /// Creates a codec over an arbitrary graph format.
    ///
    /// The format applies its own depth limit; only the payload limit of
    /// `config` is enforced by the codec.
    pub fn with_format(format: F, default: Arc<dyn ResolutionSource>, config: CodecConfig) -> Self {
        FlexibleCodec {
            format,
            default,
            config,
        }
    }

    pub fn format(&self) -> &F {
        &self.format
    }

    pub fn config(&self) -> &CodecConfig {
        &self.config
    }

    /// The source consulted when the contextual one fails.
    pub fn default_source(&self) -> &dyn ResolutionSource {
        &*self.default
    }

    /// Encodes a value. `None` yields the empty payload.
    pub fn serialize(&self, value: Option<&dyn AnyPortable>) -> Result<Vec<u8>, SerializationError> {
        let Some(value) = value else {
            return Ok(Vec::new());
        };

        let bytes = self.format.encode(value).map_err(SerializationError::encode)?;
        self.check_size(bytes.len()).map_err(SerializationError::encode)?;
        Ok(bytes)
    }

    /// Decodes a payload, resolving types against `context` first and the
    /// default source second.
    ///
    /// `None` and the empty payload both yield `Ok(None)`.
    pub fn deserialize(
        &self,
        payload: Option<&[u8]>,
        context: &dyn ResolutionSource,
    ) -> Result<Option<Box<dyn AnyPortable>>, SerializationError> {
        let payload = match payload {
            Some(payload) if !payload.is_empty() => payload,
            _ => return Ok(None),
        };

        self.check_size(payload.len()).map_err(SerializationError::decode)?;
        let resolver = TypeResolver::new(context, &*self.default);
        let value = self
            .format
            .decode(payload, &resolver)
            .map_err(SerializationError::decode)?;
        Ok(Some(value))
    }

    /// Binds a contextual source, for callers that carry one.
    pub fn in_context<'c>(&'c self, context: &'c dyn ResolutionSource) -> ContextCodec<'c, F> {
        ContextCodec {
            codec: self,
            context,
        }
    }

    fn check_size(&self, len: usize) -> Result<(), GraphError> {
        match self.config.max_payload_bytes {
            Some(limit) if len > limit => Err(GraphError::TooLarge { len, limit }),
            _ => Ok(()),
        }
    }
}

impl<F: GraphFormat + fmt::Debug> fmt::Debug for FlexibleCodec<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlexibleCodec")
            .field("format", &self.format)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Uses the default source only.
impl<T: Portable, F: GraphFormat> Serializer<T> for FlexibleCodec<F> {
    fn serialize(&self, value: Option<&T>) -> Result<Vec<u8>, SerializationError> {
        FlexibleCodec::serialize(self, value.map(|v| v as &dyn AnyPortable))
    }

    fn deserialize(&self, payload: Option<&[u8]>) -> Result<Option<T>, SerializationError> {
        FlexibleCodec::deserialize(self, payload, &NoContext)?
            .map(downcast_root::<T>)
            .transpose()
    }
}

/// A codec with a contextual source bound to it.
pub struct ContextCodec<'c, F: GraphFormat = CborGraph> {
    codec: &'c FlexibleCodec<F>,
    context: &'c dyn ResolutionSource,
}

impl<F: GraphFormat> Clone for ContextCodec<'_, F> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<F: GraphFormat> Copy for ContextCodec<'_, F> {}

impl<'c, F: GraphFormat> ContextCodec<'c, F> {
    pub fn codec(&self) -> &'c FlexibleCodec<F> {
        self.codec
    }

    pub fn serialize(&self, value: Option<&dyn AnyPortable>) -> Result<Vec<u8>, SerializationError> {
        self.codec.serialize(value)
    }

    pub fn deserialize(&self, payload: Option<&[u8]>) -> Result<Option<Box<dyn AnyPortable>>, SerializationError> {
        self.codec.deserialize(payload, self.context)
    }
}

impl<T: Portable, F: GraphFormat> Serializer<T> for ContextCodec<'_, F> {
    fn serialize(&self, value: Option<&T>) -> Result<Vec<u8>, SerializationError> {
        self.codec.serialize(value.map(|v| v as &dyn AnyPortable))
    }

    fn deserialize(&self, payload: Option<&[u8]>) -> Result<Option<T>, SerializationError> {
        ContextCodec::deserialize(self, payload)?
            .map(downcast_root::<T>)
            .transpose()
    }
}

fn downcast_root<T: Portable>(root: Box<dyn AnyPortable>) -> Result<T, SerializationError> {
    root.downcast::<T>().map(|value| *value).map_err(|root| {
        SerializationError::decode(GraphError::TypeMismatch {
            expected: T::descriptor(),
            found: root.type_descriptor(),
        })
    })
}
