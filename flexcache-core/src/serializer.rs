use std::sync::Arc;

use crate::error::SerializationError;

/// Typed conversion between values of `T` and payload bytes.
///
/// This is the contract cache layers depend on. Absence maps to the empty
/// payload and back: `serialize(None)` yields no bytes, and `deserialize` of
/// `None` or of an empty slice yields `None`. Every failure is reported as a
/// [`SerializationError`].
pub trait Serializer<T> {
    fn serialize(&self, value: Option<&T>) -> Result<Vec<u8>, SerializationError>;

    fn deserialize(&self, payload: Option<&[u8]>) -> Result<Option<T>, SerializationError>;
}

impl<T, Z: Serializer<T> + ?Sized> Serializer<T> for &Z {
    fn serialize(&self, value: Option<&T>) -> Result<Vec<u8>, SerializationError> {
        (**self).serialize(value)
    }

    fn deserialize(&self, payload: Option<&[u8]>) -> Result<Option<T>, SerializationError> {
        (**self).deserialize(payload)
    }
}

impl<T, Z: Serializer<T> + ?Sized> Serializer<T> for Arc<Z> {
    fn serialize(&self, value: Option<&T>) -> Result<Vec<u8>, SerializationError> {
        (**self).serialize(value)
    }

    fn deserialize(&self, payload: Option<&[u8]>) -> Result<Option<T>, SerializationError> {
        (**self).deserialize(payload)
    }
}
