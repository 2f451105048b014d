use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;

/// Canonical name of a type as recorded inside a payload.
///
/// Descriptors are written by the encoder for the root value and for every
/// nested [`DynValue`](crate::DynValue). They are compared by string equality
/// only; their meaning comes from whichever resolution source maps them to a
/// [`TypeHandle`](crate::TypeHandle).
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TypeDescriptor(Cow<'static, str>);

impl TypeDescriptor {
    /// Creates a descriptor from a static name without allocating.
    pub const fn from_static(name: &'static str) -> Self {
        TypeDescriptor(Cow::Borrowed(name))
    }

    /// Creates a descriptor from any string.
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        TypeDescriptor(name.into())
    }

    /// Builds the descriptor of a generic type from its base name and the
    /// descriptors of its parameters, e.g. `vec<string>`.
    pub fn generic(base: &str, params: impl IntoIterator<Item = TypeDescriptor>) -> Self {
        let params: Vec<_> = params.into_iter().map(|p| p.0).collect();
        TypeDescriptor(Cow::Owned(format!("{}<{}>", base, params.join(", "))))
    }

    /// Returns the canonical name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeDescriptor({})", self.0)
    }
}

impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&'static str> for TypeDescriptor {
    fn from(name: &'static str) -> Self {
        TypeDescriptor::from_static(name)
    }
}

impl From<String> for TypeDescriptor {
    fn from(name: String) -> Self {
        TypeDescriptor(Cow::Owned(name))
    }
}

impl AsRef<str> for TypeDescriptor {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
