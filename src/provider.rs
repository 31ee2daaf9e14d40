use crate::error::EvalError;
use std::fmt;
use std::sync::Arc;

/// A value that is either fixed at registration time or recomputed on every
/// resolution.
///
/// Restrictor `enabled` flags and scopes use this to defer to ambient
/// request-scoped state (for example "the current subject"). Resolution is
/// never memoized: a computed value is re-evaluated on every composition.
pub enum Provider<T> {
    /// A fixed value captured at registration.
    Static(T),
    /// A zero-argument closure evaluated at resolution time. A failure
    /// propagates to the caller; it is never substituted with a default.
    Computed(Arc<dyn Fn() -> Result<T, EvalError> + Send + Sync>),
}

impl<T: Clone> Provider<T> {
    /// Creates a computed provider from an infallible closure.
    pub fn computed<F>(f: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        Self::Computed(Arc::new(move || Ok(f())))
    }

    /// Creates a computed provider from a fallible closure.
    pub fn try_computed<F>(f: F) -> Self
    where
        F: Fn() -> Result<T, EvalError> + Send + Sync + 'static,
    {
        Self::Computed(Arc::new(f))
    }

    /// Resolves the current value.
    pub fn resolve(&self) -> Result<T, EvalError> {
        match self {
            Self::Static(value) => Ok(value.clone()),
            Self::Computed(f) => f(),
        }
    }
}

impl<T> Clone for Provider<T>
where
    T: Clone,
{
    fn clone(&self) -> Self {
        match self {
            Self::Static(value) => Self::Static(value.clone()),
            Self::Computed(f) => Self::Computed(Arc::clone(f)),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Provider<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Static(value) => f.debug_tuple("Static").field(value).finish(),
            Self::Computed(_) => f.write_str("Computed(<closure>)"),
        }
    }
}

impl<T: Clone> From<T> for Provider<T> {
    fn from(value: T) -> Self {
        Self::Static(value)
    }
}

#[cfg(test)]
mod tests {
    use super::Provider;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn static_provider_returns_value() {
        let provider = Provider::Static(true);
        assert!(provider.resolve().unwrap());
    }

    #[test]
    fn computed_provider_is_reevaluated_on_every_resolve() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let provider = Provider::computed(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            true
        });

        assert!(provider.resolve().unwrap());
        assert!(provider.resolve().unwrap());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn failing_computed_provider_propagates_error() {
        let provider: Provider<bool> =
            Provider::try_computed(|| Err("ambient state missing".into()));
        let err = provider.resolve().expect_err("must fail");
        assert!(err.to_string().contains("ambient state missing"));
    }
}
