//! Utility macros shared by the message types.

/// A macro for early returns with an error if a condition is not met.
///
/// This is similar to the `assert!` macro, but returns an error instead of panicking.
/// It's useful for validation checks where the receiver must stay untouched when
/// the input is rejected.
///
/// # Example
///
/// ```ignore
/// ensure!(!target.contains(char::is_whitespace), ValidationError::InvalidRequestTarget { target });
/// ```
macro_rules! ensure {
    ($predicate:expr, $error:expr) => {
        if !$predicate {
            return Err($error);
        }
    };
}

pub(crate) use ensure;
