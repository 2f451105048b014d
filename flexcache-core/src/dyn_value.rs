use ciborium::Value;
use serde::{Deserialize, Serialize};

use crate::descriptor::TypeDescriptor;
use crate::error::GraphError;
use crate::portable::{AnyPortable, MemberVisitor, Members, Portable};

/// A nested member whose concrete type is recorded in the payload.
///
/// DynValues exist in two states:
/// - **Encoded**: descriptor and raw body, straight out of serde
/// - **Resolved**: a live value, after the decoder resolved its descriptor
///
/// When serialized, both states emit `[descriptor, body]`. A successful
/// [`FlexibleCodec::deserialize`](crate::FlexibleCodec::deserialize) never
/// returns a graph that still holds encoded members.
#[derive(Debug, Clone)]
pub enum DynValue {
    /// Live value.
    Resolved(Box<dyn AnyPortable>),
    /// Not yet resolved - descriptor and body as read from the payload.
    Encoded {
        descriptor: TypeDescriptor,
        body: Value,
    },
}

impl DynValue {
    /// Wraps a concrete value.
    pub fn new<T: Portable>(value: T) -> Self {
        DynValue::Resolved(Box::new(value))
    }

    /// Returns the descriptor of the held value, in either state.
    pub fn descriptor(&self) -> TypeDescriptor {
        match self {
            DynValue::Resolved(value) => value.type_descriptor(),
            DynValue::Encoded { descriptor, .. } => descriptor.clone(),
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, DynValue::Resolved(_))
    }

    /// Returns the live value, if resolved.
    pub fn get(&self) -> Option<&dyn AnyPortable> {
        match self {
            DynValue::Resolved(value) => Some(&**value),
            DynValue::Encoded { .. } => None,
        }
    }

    pub fn downcast_ref<T: Portable>(&self) -> Option<&T> {
        self.get().and_then(|value| value.downcast_ref::<T>())
    }

    pub fn downcast_mut<T: Portable>(&mut self) -> Option<&mut T> {
        match self {
            DynValue::Resolved(value) => value.downcast_mut::<T>(),
            DynValue::Encoded { .. } => None,
        }
    }

    /// Takes the concrete value out, or gives the DynValue back.
    pub fn downcast<T: Portable>(self) -> Result<T, Self> {
        match self {
            DynValue::Resolved(value) => value
                .downcast::<T>()
                .map(|value| *value)
                .map_err(DynValue::Resolved),
            encoded => Err(encoded),
        }
    }

    /// Encodes the body as a CBOR value, whichever the state.
    fn body(&self) -> Result<Value, ciborium::value::Error> {
        match self {
            DynValue::Resolved(value) => Value::serialized(&**value),
            DynValue::Encoded { body, .. } => Ok(body.clone()),
        }
    }
}

impl From<Box<dyn AnyPortable>> for DynValue {
    fn from(value: Box<dyn AnyPortable>) -> Self {
        DynValue::Resolved(value)
    }
}

/// Structural equality: same descriptor and same encoded body.
impl PartialEq for DynValue {
    fn eq(&self, other: &Self) -> bool {
        if self.descriptor() != other.descriptor() {
            return false;
        }
        match (self.body(), other.body()) {
            (Ok(a), Ok(b)) => a == b,
            _ => false,
        }
    }
}

impl Serialize for DynValue {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        match self {
            DynValue::Resolved(value) => (value.type_descriptor(), &**value).serialize(serializer),
            DynValue::Encoded { descriptor, body } => (descriptor, body).serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for DynValue {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        // Resolution needs a type resolver, which serde cannot carry; the
        // decoder resolves encoded members afterwards through `Members`.
        let (descriptor, body) = <(TypeDescriptor, Value)>::deserialize(deserializer)?;
        Ok(DynValue::Encoded { descriptor, body })
    }
}

impl Members for DynValue {
    fn visit_members(&mut self, visitor: &mut dyn MemberVisitor) -> Result<(), GraphError> {
        visitor.visit_member(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolved_reports_descriptor() {
        let value = DynValue::new(42u64);
        assert!(value.is_resolved());
        assert_eq!(value.descriptor().as_str(), "u64");
        assert_eq!(value.downcast_ref::<u64>(), Some(&42));
        assert!(value.downcast_ref::<String>().is_none());
    }

    #[test]
    fn deserializes_as_encoded() {
        let value = DynValue::new("hi".to_string());
        let encoded = Value::serialized(&value).unwrap();
        let recovered: DynValue = encoded.deserialized().unwrap();

        assert!(!recovered.is_resolved());
        assert_eq!(recovered.descriptor().as_str(), "string");
        assert!(recovered.get().is_none());
    }

    #[test]
    fn encoded_and_resolved_compare_structurally() {
        let value = DynValue::new(vec![1u8, 2, 3]);
        let encoded: DynValue = Value::serialized(&value).unwrap().deserialized().unwrap();
        assert_eq!(value, encoded);
        assert_ne!(value, DynValue::new(vec![1u8, 2]));
    }

    #[test]
    fn downcast_returns_value_or_self() {
        let value = DynValue::new(true);
        let value = value.downcast::<u8>().unwrap_err();
        assert!(value.downcast::<bool>().unwrap());
    }

    #[test]
    fn encoded_reserializes_unchanged() {
        let value = DynValue::new(-5i32);
        let first = Value::serialized(&value).unwrap();
        let encoded: DynValue = first.deserialized().unwrap();
        let second = Value::serialized(&encoded).unwrap();
        assert_eq!(first, second);
    }
}
