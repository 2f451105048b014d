use ciborium::Value;
use indexmap::IndexMap;
use log::debug;
use std::any::TypeId;
use std::fmt;

use crate::descriptor::TypeDescriptor;
use crate::error::{GraphError, ResolveError};
use crate::portable::{AnyPortable, ByteString, Portable};
use crate::resolver::ResolutionSource;

type DecodeFn = fn(&Value) -> Result<Box<dyn AnyPortable>, GraphError>;

/// A live handle to a concrete type, sufficient to build values of it.
///
/// Handles are cheap to clone. Two handles are equal when they name the same
/// Rust type under the same descriptor.
#[derive(Clone)]
pub struct TypeHandle {
    descriptor: TypeDescriptor,
    type_id: TypeId,
    type_name: &'static str,
    decode: DecodeFn,
}

impl TypeHandle {
    /// Creates a handle for `T` under its own descriptor.
    pub fn of<T: Portable>() -> Self {
        Self::named::<T>(T::descriptor())
    }

    /// Creates a handle for `T` under an arbitrary descriptor.
    pub fn named<T: Portable>(descriptor: TypeDescriptor) -> Self {
        TypeHandle {
            descriptor,
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            decode: decode_body::<T>,
        }
    }

    /// The descriptor this handle was registered under.
    pub fn descriptor(&self) -> &TypeDescriptor {
        &self.descriptor
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// The Rust type name, for diagnostics only.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn is<T: Portable>(&self) -> bool {
        self.type_id == TypeId::of::<T>()
    }

    /// Builds a value of the handle's type from an encoded body.
    pub fn decode(&self, body: &Value) -> Result<Box<dyn AnyPortable>, GraphError> {
        (self.decode)(body)
    }
}

fn decode_body<T: Portable>(body: &Value) -> Result<Box<dyn AnyPortable>, GraphError> {
    body.deserialized::<T>()
        .map(|value| Box::new(value) as Box<dyn AnyPortable>)
        .map_err(|e| GraphError::Malformed(e.to_string()))
}

impl PartialEq for TypeHandle {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id && self.descriptor == other.descriptor
    }
}

impl Eq for TypeHandle {}

impl fmt::Debug for TypeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeHandle")
            .field("descriptor", &self.descriptor)
            .field("type_name", &self.type_name)
            .finish()
    }
}

/// A table of known types, keyed by descriptor.
///
/// The registry is the usual [`ResolutionSource`]: build one at startup for the
/// process-wide default, and smaller ones for the contexts that know types the
/// default does not. Once shared behind an `Arc` it is read-only.
#[derive(Clone, Default)]
pub struct TypeRegistry {
    types: IndexMap<TypeDescriptor, TypeHandle>,
}

impl TypeRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry holding the builtin scalar types.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register::<bool>();
        registry.register::<char>();
        registry.register::<String>();
        registry.register::<()>();
        registry.register::<u8>();
        registry.register::<u16>();
        registry.register::<u32>();
        registry.register::<u64>();
        registry.register::<u128>();
        registry.register::<i8>();
        registry.register::<i16>();
        registry.register::<i32>();
        registry.register::<i64>();
        registry.register::<i128>();
        registry.register::<f32>();
        registry.register::<f64>();
        registry.register::<ByteString>();
        registry
    }

    /// Registers `T` under its own descriptor.
    ///
    /// Returns the handle previously registered under that descriptor, if any.
    pub fn register<T: Portable>(&mut self) -> Option<TypeHandle> {
        self.insert(TypeHandle::of::<T>())
    }

    /// Registers `T` under another descriptor, typically the name a type had
    /// before it was moved or renamed.
    pub fn register_as<T: Portable>(&mut self, descriptor: impl Into<TypeDescriptor>) -> Option<TypeHandle> {
        self.insert(TypeHandle::named::<T>(descriptor.into()))
    }

    /// Builder-style [`register`](Self::register).
    pub fn with<T: Portable>(mut self) -> Self {
        self.register::<T>();
        self
    }

    /// Inserts a prepared handle.
    pub fn insert(&mut self, handle: TypeHandle) -> Option<TypeHandle> {
        let previous = self.types.insert(handle.descriptor.clone(), handle);
        if let Some(previous) = &previous {
            debug!(
                "replaced registration of {} (was {})",
                previous.descriptor, previous.type_name
            );
        }
        previous
    }

    pub fn get(&self, descriptor: &TypeDescriptor) -> Option<&TypeHandle> {
        self.types.get(descriptor)
    }

    pub fn contains(&self, descriptor: &TypeDescriptor) -> bool {
        self.types.contains_key(descriptor)
    }

    /// Returns the number of registered descriptors.
    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Iterates handles in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &TypeHandle> {
        self.types.values()
    }
}

impl fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.types.keys()).finish()
    }
}

impl ResolutionSource for TypeRegistry {
    fn resolve(&self, descriptor: &TypeDescriptor) -> Result<TypeHandle, ResolveError> {
        self.get(descriptor)
            .cloned()
            .ok_or_else(|| ResolveError::NotFound(descriptor.clone()))
    }
}
