use serde::{Deserialize, Deserializer, Serialize, Serializer, de::DeserializeOwned};
use std::any::Any;
use indexmap::IndexMap;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use std::fmt::{self, Debug};
use std::hash::Hash;

use crate::descriptor::TypeDescriptor;
use crate::dyn_value::DynValue;
use crate::error::GraphError;

/// A visitor over the nested [`DynValue`]s of a value.
///
/// Decoders use it to resolve members that are still encoded; each visit may
/// replace the member in place.
pub trait MemberVisitor {
    fn visit_member(&mut self, member: &mut DynValue) -> Result<(), GraphError>;
}

/// Exposes the nested dynamic members of a value.
///
/// Types without `DynValue` fields keep the default, which visits nothing.
pub trait Members {
    fn visit_members(&mut self, _visitor: &mut dyn MemberVisitor) -> Result<(), GraphError> {
        Ok(())
    }
}

/// A value that can travel through the codec.
///
/// To be portable, a value must be:
/// - Serializable through serde
/// - Named by a stable [`TypeDescriptor`] that is written into payloads
/// - Able to expose its nested dynamic members for resolution
///
/// Usually derived with `#[derive(Portable)]`.
pub trait Portable:
    Members + Debug + Clone + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// Returns the descriptor recorded for values of this type.
    fn descriptor() -> TypeDescriptor;
}

/// The object-safe view of a [`Portable`] value.
///
/// Implemented for every `Portable` type; callers work with
/// `Box<dyn AnyPortable>` much like `Box<dyn Any>`.
pub trait AnyPortable: erased_serde::Serialize + Members + Any + Debug + Send + Sync {
    /// Returns the descriptor of the concrete type.
    fn type_descriptor(&self) -> TypeDescriptor;

    /// Clones the value behind a fresh box.
    fn clone_boxed(&self) -> Box<dyn AnyPortable>;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;

    fn into_any(self: Box<Self>) -> Box<dyn Any>;
}

erased_serde::serialize_trait_object!(AnyPortable);

impl<T: Portable> AnyPortable for T {
    fn type_descriptor(&self) -> TypeDescriptor {
        T::descriptor()
    }

    fn clone_boxed(&self) -> Box<dyn AnyPortable> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}

impl dyn AnyPortable {
    /// Returns true if the concrete type is `T`.
    pub fn is<T: Portable>(&self) -> bool {
        self.as_any().is::<T>()
    }

    pub fn downcast_ref<T: Portable>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }

    pub fn downcast_mut<T: Portable>(&mut self) -> Option<&mut T> {
        self.as_any_mut().downcast_mut::<T>()
    }

    /// Takes the concrete value out of the box, or gives the box back.
    pub fn downcast<T: Portable>(self: Box<Self>) -> Result<Box<T>, Box<Self>> {
        if self.is::<T>() {
            match self.into_any().downcast::<T>() {
                Ok(value) => Ok(value),
                Err(_) => unreachable!("type id checked above"),
            }
        } else {
            Err(self)
        }
    }
}

impl Clone for Box<dyn AnyPortable> {
    fn clone(&self) -> Self {
        self.clone_boxed()
    }
}

// Primitive implementations

macro_rules! impl_portable_scalar {
    ($($t:ty => $name:literal),* $(,)?) => {
        $(
            impl Members for $t {}

            impl Portable for $t {
                fn descriptor() -> TypeDescriptor {
                    TypeDescriptor::from_static($name)
                }
            }
        )*
    };
}

impl_portable_scalar! {
    bool => "bool",
    char => "char",
    String => "string",
    () => "unit",
    u8 => "u8",
    u16 => "u16",
    u32 => "u32",
    u64 => "u64",
    u128 => "u128",
    i8 => "i8",
    i16 => "i16",
    i32 => "i32",
    i64 => "i64",
    i128 => "i128",
    f32 => "f32",
    f64 => "f64",
}

/// A wrapper for byte sequences to distinguish them from `Vec<u8>`.
///
/// Encoded as a CBOR byte string rather than an array of integers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct ByteString(pub Vec<u8>);

impl ByteString {
    pub fn new(data: Vec<u8>) -> Self {
        ByteString(data)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.0
    }
}

impl From<Vec<u8>> for ByteString {
    fn from(v: Vec<u8>) -> Self {
        ByteString(v)
    }
}

impl From<&[u8]> for ByteString {
    fn from(v: &[u8]) -> Self {
        ByteString(v.to_vec())
    }
}

impl Serialize for ByteString {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_bytes(&self.0)
    }
}

impl<'de> Deserialize<'de> for ByteString {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct ByteStringVisitor;

        impl<'de> serde::de::Visitor<'de> for ByteStringVisitor {
            type Value = ByteString;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a byte string")
            }

            fn visit_bytes<E>(self, v: &[u8]) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                Ok(ByteString(v.to_vec()))
            }

            fn visit_byte_buf<E>(self, v: Vec<u8>) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                Ok(ByteString(v))
            }
        }

        deserializer.deserialize_byte_buf(ByteStringVisitor)
    }
}

impl Members for ByteString {}

impl Portable for ByteString {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::from_static("bytes")
    }
}

// Containers visit their elements, so `Vec<DynValue>` works as a field type
// even though `DynValue` itself is not `Portable`.

impl<T: Members> Members for Vec<T> {
    fn visit_members(&mut self, visitor: &mut dyn MemberVisitor) -> Result<(), GraphError> {
        for item in self {
            item.visit_members(visitor)?;
        }
        Ok(())
    }
}

impl<T: Portable> Portable for Vec<T> {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::generic("vec", [T::descriptor()])
    }
}

impl<T: Members> Members for VecDeque<T> {
    fn visit_members(&mut self, visitor: &mut dyn MemberVisitor) -> Result<(), GraphError> {
        for item in self {
            item.visit_members(visitor)?;
        }
        Ok(())
    }
}

// `Option` visits its content but is not `Portable` on its own: serde writes
// `Some(())` and `Some(None)` as the same null as `None`. An optional member
// is spelled `Option<DynValue>`, whose `Some` is always a two-element node.
impl<T: Members> Members for Option<T> {
    fn visit_members(&mut self, visitor: &mut dyn MemberVisitor) -> Result<(), GraphError> {
        match self {
            Some(inner) => inner.visit_members(visitor),
            None => Ok(()),
        }
    }
}

impl<K, V: Members> Members for BTreeMap<K, V> {
    fn visit_members(&mut self, visitor: &mut dyn MemberVisitor) -> Result<(), GraphError> {
        for value in self.values_mut() {
            value.visit_members(visitor)?;
        }
        Ok(())
    }
}

impl<K: Portable + Ord, V: Portable> Portable for BTreeMap<K, V> {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::generic("map", [K::descriptor(), V::descriptor()])
    }
}

impl<K, V: Members, S> Members for HashMap<K, V, S> {
    fn visit_members(&mut self, visitor: &mut dyn MemberVisitor) -> Result<(), GraphError> {
        for value in self.values_mut() {
            value.visit_members(visitor)?;
        }
        Ok(())
    }
}

impl<K, V: Members, S> Members for IndexMap<K, V, S> {
    fn visit_members(&mut self, visitor: &mut dyn MemberVisitor) -> Result<(), GraphError> {
        for value in self.values_mut() {
            value.visit_members(visitor)?;
        }
        Ok(())
    }
}

// Set elements cannot be changed in place, so they are taken out, visited
// and inserted again.

impl<T: Members + Eq + Hash> Members for HashSet<T> {
    fn visit_members(&mut self, visitor: &mut dyn MemberVisitor) -> Result<(), GraphError> {
        let items: Vec<T> = self.drain().collect();
        for mut item in items {
            item.visit_members(visitor)?;
            self.insert(item);
        }
        Ok(())
    }
}

impl<T: Members + Ord> Members for BTreeSet<T> {
    fn visit_members(&mut self, visitor: &mut dyn MemberVisitor) -> Result<(), GraphError> {
        for mut item in std::mem::take(self) {
            item.visit_members(visitor)?;
            self.insert(item);
        }
        Ok(())
    }
}

macro_rules! impl_members_tuple {
    ($($name:ident),+) => {
        impl<$($name: Members),+> Members for ($($name,)+) {
            #[allow(non_snake_case)]
            fn visit_members(&mut self, visitor: &mut dyn MemberVisitor) -> Result<(), GraphError> {
                let ($($name,)+) = self;
                $($name.visit_members(visitor)?;)+
                Ok(())
            }
        }
    };
}

impl_members_tuple!(A);
impl_members_tuple!(A, B);
impl_members_tuple!(A, B, C);
impl_members_tuple!(A, B, C, D);

impl<T: Members + ?Sized> Members for Box<T> {
    fn visit_members(&mut self, visitor: &mut dyn MemberVisitor) -> Result<(), GraphError> {
        (**self).visit_members(visitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_descriptors() {
        assert_eq!(u64::descriptor().as_str(), "u64");
        assert_eq!(String::descriptor().as_str(), "string");
        assert_eq!(<()>::descriptor().as_str(), "unit");
    }

    #[test]
    fn container_descriptors_nest() {
        assert_eq!(<Vec<Vec<i32>>>::descriptor().as_str(), "vec<vec<i32>>");
        assert_eq!(
            <BTreeMap<String, Vec<u8>>>::descriptor().as_str(),
            "map<string, vec<u8>>"
        );
    }

    struct Counter(usize);

    impl MemberVisitor for Counter {
        fn visit_member(&mut self, _member: &mut DynValue) -> Result<(), GraphError> {
            self.0 += 1;
            Ok(())
        }
    }

    #[test]
    fn containers_visit_every_member() {
        let mut keyed: HashMap<String, DynValue> =
            HashMap::from([("a".into(), DynValue::new(1u8)), ("b".into(), DynValue::new(2u8))]);
        let mut ordered: IndexMap<u8, Vec<DynValue>> = IndexMap::new();
        ordered.insert(0, vec![DynValue::new(true), DynValue::new(false)]);
        let mut pair = (DynValue::new(()), Some(DynValue::new('x')));

        let mut counter = Counter(0);
        keyed.visit_members(&mut counter).unwrap();
        ordered.visit_members(&mut counter).unwrap();
        pair.visit_members(&mut counter).unwrap();
        assert_eq!(counter.0, 5);
    }

    #[test]
    fn downcast_by_type() {
        let boxed: Box<dyn AnyPortable> = Box::new("hello".to_string());
        assert!(boxed.is::<String>());
        assert!(!boxed.is::<u64>());
        assert_eq!(boxed.downcast_ref::<String>().map(String::as_str), Some("hello"));

        let boxed = boxed.downcast::<u64>().unwrap_err();
        let value = boxed.downcast::<String>().unwrap();
        assert_eq!(*value, "hello");
    }

    #[test]
    fn boxed_clone_keeps_type() {
        let boxed: Box<dyn AnyPortable> = Box::new(7u32);
        let copy = boxed.clone();
        assert_eq!(copy.type_descriptor(), u32::descriptor());
        assert_eq!(copy.downcast_ref::<u32>(), Some(&7));
    }

    #[test]
    fn bytestring_encodes_as_cbor_bytes() {
        let bs = ByteString::new(vec![1, 2, 3, 4]);
        let value = ciborium::Value::serialized(&bs).unwrap();
        assert_eq!(value, ciborium::Value::Bytes(vec![1, 2, 3, 4]));
        let recovered: ByteString = value.deserialized().unwrap();
        assert_eq!(recovered, bs);
    }
}
