//! Object-graph encoding.
//!
//! A [`GraphFormat`] turns a value into bytes and back. Decoding is wired to a
//! [`TypeResolver`], which the format consults for every type descriptor it
//! meets, root included.

use ciborium::Value;
use std::io::Cursor;

use crate::descriptor::TypeDescriptor;
use crate::dyn_value::DynValue;
use crate::error::GraphError;
use crate::portable::{AnyPortable, MemberVisitor};
use crate::resolver::TypeResolver;

/// Default nesting limit for dynamic members.
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// The byte-level encoding primitive underneath the codec.
pub trait GraphFormat: Send + Sync {
    /// Encodes a value. Must not consult any resolver.
    fn encode(&self, value: &dyn AnyPortable) -> Result<Vec<u8>, GraphError>;

    /// Decodes exactly one root value, resolving every descriptor through
    /// `resolver`. Never returns a partially built graph.
    fn decode(&self, payload: &[u8], resolver: &TypeResolver<'_>) -> Result<Box<dyn AnyPortable>, GraphError>;
}

/// CBOR object-graph format.
///
/// Every typed node, the root and each nested [`DynValue`], is written as the
/// two-element array `[descriptor, body]`, where `body` is the serde encoding
/// of the value.
#[derive(Debug, Clone, Copy)]
pub struct CborGraph {
    max_depth: usize,
}

impl CborGraph {
    pub fn new() -> Self {
        Self::with_max_depth(DEFAULT_MAX_DEPTH)
    }

    /// Limits how deeply dynamic members may nest below the root.
    pub fn with_max_depth(max_depth: usize) -> Self {
        CborGraph { max_depth }
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }
}

impl Default for CborGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphFormat for CborGraph {
    fn encode(&self, value: &dyn AnyPortable) -> Result<Vec<u8>, GraphError> {
        let mut buf = Vec::new();
        ciborium::into_writer(&(value.type_descriptor(), value), &mut buf)
            .map_err(|e| GraphError::Encode(e.to_string()))?;
        Ok(buf)
    }

    fn decode(&self, payload: &[u8], resolver: &TypeResolver<'_>) -> Result<Box<dyn AnyPortable>, GraphError> {
        let mut cursor = Cursor::new(payload);
        let (descriptor, body): (TypeDescriptor, Value) =
            ciborium::from_reader(&mut cursor).map_err(|e| GraphError::Malformed(e.to_string()))?;

        let consumed = cursor.position() as usize;
        if consumed < payload.len() {
            return Err(GraphError::TrailingBytes(payload.len() - consumed));
        }

        let mut materializer = Materializer {
            resolver,
            depth: 0,
            max_depth: self.max_depth,
        };
        materializer.materialize(&descriptor, &body)
    }
}

/// Builds live values from encoded nodes, depth first.
struct Materializer<'r, 'a> {
    resolver: &'r TypeResolver<'a>,
    depth: usize,
    max_depth: usize,
}

impl Materializer<'_, '_> {
    fn materialize(&mut self, descriptor: &TypeDescriptor, body: &Value) -> Result<Box<dyn AnyPortable>, GraphError> {
        let handle = self.resolver.resolve(descriptor)?;
        let mut value = handle.decode(body)?;
        value.visit_members(self)?;
        Ok(value)
    }
}

impl MemberVisitor for Materializer<'_, '_> {
    fn visit_member(&mut self, member: &mut DynValue) -> Result<(), GraphError> {
        let resolved = match member {
            DynValue::Resolved(_) => return Ok(()),
            DynValue::Encoded { descriptor, body } => {
                if self.depth >= self.max_depth {
                    return Err(GraphError::DepthExceeded(self.max_depth));
                }
                self.depth += 1;
                let resolved = self.materialize(descriptor, body);
                self.depth -= 1;
                resolved?
            }
        };
        *member = DynValue::Resolved(resolved);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ResolveError;
    use crate::portable::{Members, Portable};
    use crate::registry::{TypeHandle, TypeRegistry};
    use crate::resolver::NoContext;
    use serde::{Deserialize, Serialize};

    /// A hand-written portable type holding one dynamic member.
    #[derive(Debug, Clone, Serialize, Deserialize)]
    struct Envelope {
        label: String,
        inner: Option<DynValue>,
    }

    impl Members for Envelope {
        fn visit_members(&mut self, visitor: &mut dyn MemberVisitor) -> Result<(), GraphError> {
            self.inner.visit_members(visitor)
        }
    }

    impl Portable for Envelope {
        fn descriptor() -> TypeDescriptor {
            TypeDescriptor::from_static("test::Envelope")
        }
    }

    fn nested(depth: usize) -> Envelope {
        let mut current = Envelope {
            label: "leaf".into(),
            inner: None,
        };
        for i in 0..depth {
            current = Envelope {
                label: format!("level {i}"),
                inner: Some(DynValue::new(current)),
            };
        }
        current
    }

    fn registry() -> TypeRegistry {
        TypeRegistry::with_builtins().with::<Envelope>()
    }

    #[test]
    fn roundtrip_scalar() {
        let registry = registry();
        let resolver = TypeResolver::new(&NoContext, &registry);
        let format = CborGraph::new();

        let bytes = format.encode(&"hello".to_string()).unwrap();
        let value = format.decode(&bytes, &resolver).unwrap();
        assert_eq!(value.downcast_ref::<String>().map(String::as_str), Some("hello"));
    }

    #[test]
    fn nested_members_come_back_resolved() {
        let registry = registry();
        let resolver = TypeResolver::new(&NoContext, &registry);
        let format = CborGraph::new();

        let bytes = format.encode(&nested(3)).unwrap();
        let value = format.decode(&bytes, &resolver).unwrap();

        let mut current = value.downcast_ref::<Envelope>().unwrap();
        let mut levels = 0;
        while let Some(inner) = &current.inner {
            assert!(inner.is_resolved());
            current = inner.downcast_ref::<Envelope>().unwrap();
            levels += 1;
        }
        assert_eq!(levels, 3);
        assert_eq!(current.label, "leaf");
    }

    #[test]
    fn root_is_descriptor_and_body() {
        let bytes = CborGraph::new().encode(&7u8).unwrap();
        let value: Value = ciborium::from_reader(bytes.as_slice()).unwrap();
        assert_eq!(
            value,
            Value::Array(vec![Value::Text("u8".into()), Value::Integer(7u8.into())])
        );
    }

    #[test]
    fn rejects_trailing_bytes() {
        let registry = registry();
        let resolver = TypeResolver::new(&NoContext, &registry);
        let format = CborGraph::new();

        let mut bytes = format.encode(&1u32).unwrap();
        bytes.extend_from_slice(&[0x00, 0x00]);
        assert!(matches!(
            format.decode(&bytes, &resolver),
            Err(GraphError::TrailingBytes(2))
        ));
    }

    #[test]
    fn rejects_garbage() {
        let registry = registry();
        let resolver = TypeResolver::new(&NoContext, &registry);
        let result = CborGraph::new().decode(&[0xff, 0x13, 0x37], &resolver);
        assert!(matches!(result, Err(GraphError::Malformed(_))));
    }

    #[test]
    fn depth_limit_applies_to_members() {
        let registry = registry();
        let resolver = TypeResolver::new(&NoContext, &registry);
        let format = CborGraph::with_max_depth(2);

        let ok = format.encode(&nested(2)).unwrap();
        assert!(format.decode(&ok, &resolver).is_ok());

        let deep = format.encode(&nested(3)).unwrap();
        assert!(matches!(
            format.decode(&deep, &resolver),
            Err(GraphError::DepthExceeded(2))
        ));
    }

    #[test]
    fn unresolvable_member_fails_whole_decode() {
        let mut registry = TypeRegistry::new();
        registry.register::<Envelope>();
        let resolver = TypeResolver::new(&NoContext, &registry);
        let format = CborGraph::new();

        let value = Envelope {
            label: "outer".into(),
            inner: Some(DynValue::new(5u64)),
        };
        let bytes = format.encode(&value).unwrap();
        match format.decode(&bytes, &resolver) {
            Err(GraphError::Unresolved(err)) => {
                assert_eq!(err.descriptor.as_str(), "u64");
                assert!(matches!(err.cause, ResolveError::NotFound(_)));
            }
            other => panic!("expected unresolved error, got {other:?}"),
        }
    }

    #[test]
    fn resolves_each_occurrence() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let calls = AtomicUsize::new(0);
        let contextual = crate::resolver::from_fn(|d: &TypeDescriptor| {
            calls.fetch_add(1, Ordering::SeqCst);
            if d.as_str() == "u64" {
                Ok(TypeHandle::of::<u64>())
            } else {
                Err(ResolveError::NotFound(d.clone()))
            }
        });
        let default = registry().with::<Vec<Envelope>>();
        let resolver = TypeResolver::new(&contextual, &default);

        let value = vec![
            Envelope { label: "a".into(), inner: Some(DynValue::new(1u64)) },
            Envelope { label: "b".into(), inner: Some(DynValue::new(1u64)) },
        ];
        let format = CborGraph::new();
        let bytes = format.encode(&value).unwrap();
        format.decode(&bytes, &resolver).unwrap();

        // The root plus one lookup per dynamic member, repeated descriptors included.
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
