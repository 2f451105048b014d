use std::sync::Arc;

use crate::descriptor::TypeDescriptor;
use crate::error::{ResolveError, TypeResolutionError};
use crate::registry::TypeHandle;

/// A capability mapping a [`TypeDescriptor`] to a [`TypeHandle`], or failing.
///
/// Sources are read-only lookups; all methods take `&self` and implementations
/// must be safe to share across threads.
pub trait ResolutionSource: Send + Sync {
    fn resolve(&self, descriptor: &TypeDescriptor) -> Result<TypeHandle, ResolveError>;
}

impl<S: ResolutionSource + ?Sized> ResolutionSource for &S {
    fn resolve(&self, descriptor: &TypeDescriptor) -> Result<TypeHandle, ResolveError> {
        (**self).resolve(descriptor)
    }
}

impl<S: ResolutionSource + ?Sized> ResolutionSource for Arc<S> {
    fn resolve(&self, descriptor: &TypeDescriptor) -> Result<TypeHandle, ResolveError> {
        (**self).resolve(descriptor)
    }
}

impl<S: ResolutionSource + ?Sized> ResolutionSource for Box<S> {
    fn resolve(&self, descriptor: &TypeDescriptor) -> Result<TypeHandle, ResolveError> {
        (**self).resolve(descriptor)
    }
}

/// A contextual source for callers that have no context; always fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoContext;

impl ResolutionSource for NoContext {
    fn resolve(&self, _descriptor: &TypeDescriptor) -> Result<TypeHandle, ResolveError> {
        Err(ResolveError::Unavailable("no contextual source".to_string()))
    }
}

/// Adapts a closure into a [`ResolutionSource`].
pub struct FnSource<F>(F);

/// Creates a [`ResolutionSource`] from a closure.
pub fn from_fn<F>(f: F) -> FnSource<F>
where
    F: Fn(&TypeDescriptor) -> Result<TypeHandle, ResolveError> + Send + Sync,
{
    FnSource(f)
}

impl<F> ResolutionSource for FnSource<F>
where
    F: Fn(&TypeDescriptor) -> Result<TypeHandle, ResolveError> + Send + Sync,
{
    fn resolve(&self, descriptor: &TypeDescriptor) -> Result<TypeHandle, ResolveError> {
        (self.0)(descriptor)
    }
}

/// Resolves descriptors against a contextual source first and the default
/// source second.
///
/// A contextual failure is never terminal: it is dropped and the default source
/// is consulted. Only when both fail does resolution fail, and then the error
/// carries the default source's failure. Nothing is cached; every call asks the
/// sources again.
#[derive(Clone, Copy)]
pub struct TypeResolver<'a> {
    contextual: &'a dyn ResolutionSource,
    default: &'a dyn ResolutionSource,
}

impl<'a> TypeResolver<'a> {
    pub fn new(contextual: &'a dyn ResolutionSource, default: &'a dyn ResolutionSource) -> Self {
        TypeResolver { contextual, default }
    }

    pub fn resolve(&self, descriptor: &TypeDescriptor) -> Result<TypeHandle, TypeResolutionError> {
        // A contextual failure is discarded; only the default's error is reported.
        if let Ok(handle) = self.contextual.resolve(descriptor) {
            return Ok(handle);
        }

        self.default
            .resolve(descriptor)
            .map_err(|cause| TypeResolutionError {
                descriptor: descriptor.clone(),
                cause,
            })
    }
}
