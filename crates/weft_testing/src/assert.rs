//! Assertions for use inside tests.
//!
//! Each returns an [`AssertionError`] that `?` turns into a [`Fault`], so a
//! failed assertion ends the test case and is reported as an assertion
//! failure rather than an unexpected fault.

use core::fmt::Debug;

use thiserror::Error;
use weft_log::{Fault, isolate};

/// A failed assertion.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct AssertionError {
    message: String,
}

impl AssertionError {
    /// Creates an assertion error with a custom message.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// What went wrong.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Fails unless `actual == expected`.
pub fn assert_equal<A, E>(actual: A, expected: E) -> Result<(), AssertionError>
where
    A: PartialEq<E> + Debug,
    E: Debug,
{
    if actual == expected {
        Ok(())
    } else {
        Err(AssertionError::new(format!(
            "expected {expected:?}, got {actual:?}"
        )))
    }
}

/// Fails if `actual == unexpected`.
pub fn assert_not_equal<A, E>(actual: A, unexpected: E) -> Result<(), AssertionError>
where
    A: PartialEq<E> + Debug,
    E: Debug,
{
    if actual == unexpected {
        Err(AssertionError::new(format!(
            "expected anything but {unexpected:?}"
        )))
    } else {
        Ok(())
    }
}

/// Fails unless `value` is true.
pub fn assert_true(value: bool) -> Result<(), AssertionError> {
    if value {
        Ok(())
    } else {
        Err(AssertionError::new("expected true, got false"))
    }
}

/// Fails unless `value` is false.
pub fn assert_false(value: bool) -> Result<(), AssertionError> {
    if value {
        Err(AssertionError::new("expected false, got true"))
    } else {
        Ok(())
    }
}

/// Fails unless `f` fails. Returns the fault it raised; panics count.
pub fn assert_throws<R>(f: impl FnOnce() -> Result<R, Fault>) -> Result<Fault, AssertionError> {
    match isolate(f) {
        Ok(_) => Err(AssertionError::new("expected a fault, none was raised")),
        Err(fault) => Ok(fault),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equality_assertions() {
        assert!(assert_equal(3, 3).is_ok());
        assert_eq!(
            assert_equal("a".to_string(), "b").unwrap_err().message(),
            "expected \"b\", got \"a\""
        );
        assert!(assert_not_equal(1, 2).is_ok());
        assert!(assert_not_equal(2, 2).is_err());
    }

    #[test]
    fn boolean_assertions() {
        assert!(assert_true(true).is_ok());
        assert!(assert_true(false).is_err());
        assert!(assert_false(false).is_ok());
        assert!(assert_false(true).is_err());
    }

    #[test]
    fn throws_returns_the_fault() {
        let fault = assert_throws(|| -> Result<(), Fault> { Err(Fault::new("nope")) }).unwrap();
        assert_eq!(fault.message(), "nope");

        let fault = assert_throws(|| -> Result<(), Fault> { panic!("kaboom") }).unwrap();
        assert!(fault.is_panic());

        assert!(assert_throws(|| Ok(1)).is_err());
    }
}
