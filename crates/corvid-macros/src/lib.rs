// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Declarative macros for the Corvid virtual machine.
//!
//! # Macros Overview
//!
//! ## Error Handling
//! - [`bail!`] - Early return with an error value
//! - [`ensure!`] - Assertion that returns an error instead of panicking
//!
//! ## Registration
//! - [`opcode_table!`] - Build a static, duplicate-checked opcode table
//!
//! # Examples
//!
//! ```
//! use corvid_macros::*;
//!
//! fn divide(a: i64, b: i64) -> Result<i64, String> {
//!     ensure!(b != 0, "division by zero");
//!     Ok(a / b)
//! }
//!
//! assert_eq!(divide(10, 2).unwrap(), 5);
//! assert!(divide(10, 0).is_err());
//! ```

#![warn(missing_docs)]

mod error;
mod table;

/// Compares two strings in a `const` context.
#[doc(hidden)]
pub const fn __str_eq(a: &str, b: &str) -> bool {
    let a = a.as_bytes();
    let b = b.as_bytes();
    if a.len() != b.len() {
        return false;
    }
    let mut i = 0;
    while i < a.len() {
        if a[i] != b[i] {
            return false;
        }
        i += 1;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::__str_eq;

    #[test]
    fn test_const_str_eq() {
        assert!(__str_eq("ADD", "ADD"));
        assert!(!__str_eq("ADD", "AND"));
        assert!(!__str_eq("ADD", "ADDX"));
        assert!(__str_eq("", ""));
    }
}
