use deque_alloc::AllocError;

/// A [`PushError`] hands back a value that could not be inserted
/// because the deque was full and could not grow.
///
/// The deque itself is left exactly as it was before the call.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct PushError<T> {
    value: T,
    cause: AllocError,
}

impl<T> PushError<T> {
    #[inline(always)]
    pub(crate) fn new(value: T, cause: AllocError) -> Self {
        Self { value, cause }
    }

    /// Returns the rejected value.
    #[inline(always)]
    pub fn into_inner(self) -> T {
        self.value
    }

    /// Returns a reference to the rejected value.
    #[inline(always)]
    pub fn value(&self) -> &T {
        &self.value
    }
}

// Manual impl: don't require `T: Debug` to report the error.
impl<T> std::fmt::Debug for PushError<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PushError")
            .field("cause", &self.cause)
            .finish_non_exhaustive()
    }
}

impl<T> std::fmt::Display for PushError<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "deque is full and could not grow: {}", self.cause)
    }
}

impl<T> std::error::Error for PushError<T> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.cause)
    }
}

#[test]
fn test_push_error_miri() {
    use std::error::Error;

    let err = PushError::new("payload", AllocError);
    assert_eq!(*err.value(), "payload");
    assert_eq!(
        err.to_string(),
        "deque is full and could not grow: memory allocation failed"
    );
    assert!(err.source().is_some());
    assert_eq!(format!("{err:?}"), "PushError { cause: AllocError, .. }");
    assert_eq!(err.into_inner(), "payload");
}
