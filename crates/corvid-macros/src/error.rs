// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Error handling macros.
//!
//! Both macros convert their error argument with `.into()`, so they work with
//! `String` errors as well as typed error enums that implement `From`.

/// Early return with an error.
///
/// # Example
///
/// ```
/// use corvid_macros::bail;
///
/// fn process(x: i32) -> Result<(), String> {
///     if x < 0 {
///         bail!("x must be non-negative, got {}", x);
///     }
///     Ok(())
/// }
///
/// assert!(process(-1).is_err());
/// assert!(process(1).is_ok());
/// ```
#[macro_export]
macro_rules! bail {
    ($msg:literal $(,)?) => {
        return Err($msg.into())
    };
    ($fmt:literal, $($arg:tt)*) => {
        return Err(format!($fmt, $($arg)*).into())
    };
    ($err:expr $(,)?) => {
        return Err($err.into())
    };
}

/// Ensure a condition is true, or return an error.
///
/// The error may be a literal message, a format string, or any expression
/// convertible into the function's error type.
///
/// # Example
///
/// ```
/// use corvid_macros::ensure;
///
/// #[derive(Debug, PartialEq)]
/// enum Fault { Underflow }
///
/// fn pop(len: usize) -> Result<usize, Fault> {
///     ensure!(len > 0, Fault::Underflow);
///     Ok(len - 1)
/// }
///
/// assert_eq!(pop(0), Err(Fault::Underflow));
/// assert_eq!(pop(2), Ok(1));
/// ```
#[macro_export]
macro_rules! ensure {
    ($cond:expr, $msg:literal $(,)?) => {
        if !$cond {
            return Err($msg.into());
        }
    };
    ($cond:expr, $fmt:literal, $($arg:tt)*) => {
        if !$cond {
            return Err(format!($fmt, $($arg)*).into());
        }
    };
    ($cond:expr, $err:expr $(,)?) => {
        if !$cond {
            return Err($err.into());
        }
    };
}

#[cfg(test)]
mod tests {
    #[derive(Debug, PartialEq)]
    enum TestError {
        Negative(i32),
        Message(String),
    }

    impl From<String> for TestError {
        fn from(msg: String) -> Self {
            TestError::Message(msg)
        }
    }

    impl From<&str> for TestError {
        fn from(msg: &str) -> Self {
            TestError::Message(msg.to_string())
        }
    }

    #[test]
    fn test_ensure_with_typed_error() {
        fn check(x: i32) -> Result<(), TestError> {
            ensure!(x >= 0, TestError::Negative(x));
            Ok(())
        }

        assert!(check(1).is_ok());
        assert_eq!(check(-2), Err(TestError::Negative(-2)));
    }

    #[test]
    fn test_ensure_with_format() {
        fn check(x: i32) -> Result<(), TestError> {
            ensure!(x < 10, "{} is too large", x);
            Ok(())
        }

        assert_eq!(
            check(12),
            Err(TestError::Message("12 is too large".to_string()))
        );
    }

    #[test]
    fn test_bail() {
        fn early_return(fail: bool) -> Result<i32, TestError> {
            if fail {
                bail!("failed");
            }
            Ok(42)
        }

        assert_eq!(early_return(false).unwrap(), 42);
        assert_eq!(
            early_return(true),
            Err(TestError::Message("failed".to_string()))
        );
    }
}
