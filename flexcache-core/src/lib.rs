//! Flexcache is a binary cache serializer whose payloads name their own types.
//!
//! Core concepts:
//! - **Portable**: A value that can travel through the codec (serializable, named by a descriptor)
//! - **TypeDescriptor**: The stable name written into payloads for each typed node
//! - **DynValue**: A nested member whose concrete type is recorded in the payload
//! - **TypeResolver**: Maps descriptors to types, trying a contextual source before the default one
//! - **FlexibleCodec**: Encodes values and decodes them back, reporting every failure as a
//!   [`SerializationError`]
//! - **Serializer**: The typed capability a cache client holds
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use flexcache_core::{cacheable, DynValue, FlexibleCodec, NoContext, Serializer, TypeRegistry};
//!
//! #[cacheable(name = "app::Session")]
//! struct Session {
//!     user: String,
//!     payload: DynValue,
//! }
//!
//! let registry = TypeRegistry::with_builtins().with::<Session>();
//! let codec = FlexibleCodec::new(Arc::new(registry));
//!
//! let session = Session { user: "ada".into(), payload: DynValue::new(42u64) };
//! let bytes = codec.serialize(Some(&session)).unwrap();
//!
//! let back: Session = Serializer::<Session>::deserialize(&codec, Some(&bytes)).unwrap().unwrap();
//! assert_eq!(back.payload.downcast_ref::<u64>(), Some(&42));
//!
//! // A caller with its own notion of types passes it as the contextual source.
//! let value = codec.deserialize(Some(&bytes), &NoContext).unwrap().unwrap();
//! assert!(value.is::<Session>());
//! ```

extern crate self as flexcache_core;

mod codec;
mod config;
mod descriptor;
mod dyn_value;
mod error;
mod graph;
mod portable;
mod registry;
mod resolver;
mod serializer;

pub use codec::{ContextCodec, FlexibleCodec};
pub use config::CodecConfig;
pub use descriptor::TypeDescriptor;
pub use dyn_value::DynValue;
pub use error::{GraphError, Phase, ResolveError, SerializationError, TypeResolutionError};
pub use graph::{CborGraph, GraphFormat, DEFAULT_MAX_DEPTH};
pub use portable::{AnyPortable, ByteString, MemberVisitor, Members, Portable};
pub use registry::{TypeHandle, TypeRegistry};
pub use resolver::{from_fn, FnSource, NoContext, ResolutionSource, TypeResolver};
pub use serializer::Serializer;

#[cfg(feature = "derive")]
pub use flexcache_derive::{cacheable, Portable};
