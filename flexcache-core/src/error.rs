use std::error::Error as StdError;
use std::fmt;

use crate::descriptor::TypeDescriptor;

type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Failure of a single resolution source.
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("type not found: {0}")]
    NotFound(TypeDescriptor),
    #[error("resolution source unavailable: {0}")]
    Unavailable(String),
    #[error("{0}")]
    Other(#[source] BoxError),
}

/// Raised when neither the contextual nor the default source could resolve a
/// descriptor. The cause is always the default source's failure.
#[derive(Debug, thiserror::Error)]
#[error("could not resolve type {descriptor}")]
pub struct TypeResolutionError {
    pub descriptor: TypeDescriptor,
    #[source]
    pub cause: ResolveError,
}

/// Errors produced by an object-graph format while encoding or decoding.
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    #[error("encoding failed: {0}")]
    Encode(String),
    #[error("malformed payload: {0}")]
    Malformed(String),
    #[error("payload has {0} trailing bytes after the root value")]
    TrailingBytes(usize),
    #[error("value graph nested deeper than {0} levels")]
    DepthExceeded(usize),
    #[error("payload of {len} bytes exceeds the limit of {limit} bytes")]
    TooLarge { len: usize, limit: usize },
    #[error("expected a value of type {expected}, found {found}")]
    TypeMismatch {
        expected: TypeDescriptor,
        found: TypeDescriptor,
    },
    #[error("{0}")]
    Unresolved(#[from] TypeResolutionError),
}

/// Direction of the failed operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Encode,
    Decode,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Encode => f.write_str("serialize"),
            Phase::Decode => f.write_str("deserialize"),
        }
    }
}

/// The only error surfaced to callers of a [`Serializer`](crate::Serializer).
///
/// The underlying failure is kept as the `source()` so the whole causal chain
/// stays available for diagnosis.
#[derive(Debug, thiserror::Error)]
#[error("cannot {phase}")]
pub struct SerializationError {
    phase: Phase,
    #[source]
    cause: BoxError,
}

impl SerializationError {
    pub fn new(phase: Phase, cause: impl Into<BoxError>) -> Self {
        SerializationError {
            phase,
            cause: cause.into(),
        }
    }

    pub fn encode(cause: impl Into<BoxError>) -> Self {
        Self::new(Phase::Encode, cause)
    }

    pub fn decode(cause: impl Into<BoxError>) -> Self {
        Self::new(Phase::Decode, cause)
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Returns the immediate cause.
    pub fn cause(&self) -> &(dyn StdError + Send + Sync + 'static) {
        &*self.cause
    }

    /// Finds the first error of type `E` in the cause chain.
    pub fn find_cause<E: StdError + 'static>(&self) -> Option<&E> {
        let root: &(dyn StdError + 'static) = &*self.cause;
        let mut current = Some(root);
        while let Some(err) = current {
            if let Some(found) = err.downcast_ref::<E>() {
                return Some(found);
            }
            current = err.source();
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unresolved(name: &'static str) -> GraphError {
        GraphError::Unresolved(TypeResolutionError {
            descriptor: TypeDescriptor::from_static(name),
            cause: ResolveError::NotFound(TypeDescriptor::from_static(name)),
        })
    }

    #[test]
    fn display_names_the_phase() {
        let err = SerializationError::encode(GraphError::Encode("boom".into()));
        assert_eq!(err.to_string(), "cannot serialize");
        let err = SerializationError::decode(GraphError::TrailingBytes(3));
        assert_eq!(err.to_string(), "cannot deserialize");
    }

    #[test]
    fn chain_keeps_resolution_error() {
        let err = SerializationError::decode(unresolved("app::Gone"));
        let found = err.find_cause::<TypeResolutionError>().unwrap();
        assert_eq!(found.descriptor.as_str(), "app::Gone");
        assert!(matches!(
            err.find_cause::<ResolveError>(),
            Some(ResolveError::NotFound(_))
        ));
    }

    #[test]
    fn find_cause_misses_absent_types() {
        let err = SerializationError::decode(GraphError::Malformed("short".into()));
        assert!(err.find_cause::<TypeResolutionError>().is_none());
        assert!(err.find_cause::<GraphError>().is_some());
    }
}
