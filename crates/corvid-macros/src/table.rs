// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Static registration tables.

/// Declares a static opcode table.
///
/// Each row maps an opcode name to its argument count and a builder expression.
/// The macro expands to a `static` slice of the given entry type, which must
/// have the fields `name: &'static str`, `arity: usize` and `build`.
/// Duplicate names are rejected at compile time.
///
/// # Example
///
/// ```
/// use corvid_macros::opcode_table;
///
/// struct Entry {
///     name: &'static str,
///     arity: usize,
///     build: fn(&[String]) -> usize,
/// }
///
/// fn count(args: &[String]) -> usize {
///     args.len()
/// }
///
/// opcode_table! {
///     static OPS: [Entry] = {
///         "NOP" / 0 => count,
///         "PUSH" / 1 => count,
///     };
/// }
///
/// assert_eq!(OPS.len(), 2);
/// assert_eq!(OPS[1].name, "PUSH");
/// assert_eq!(OPS[1].arity, 1);
/// assert_eq!((OPS[1].build)(&["x".to_string()]), 1);
/// ```
#[macro_export]
macro_rules! opcode_table {
    (
        $(#[$meta:meta])*
        $vis:vis static $table:ident: [$entry:ident] = {
            $($name:literal / $arity:literal => $build:expr),+ $(,)?
        };
    ) => {
        $(#[$meta])*
        $vis static $table: &[$entry] = &[
            $($entry { name: $name, arity: $arity, build: $build }),+
        ];

        const _: () = {
            let names: &[&str] = &[$($name),+];
            let mut i = 0;
            while i < names.len() {
                let mut j = i + 1;
                while j < names.len() {
                    assert!(!$crate::__str_eq(names[i], names[j]), "duplicate opcode name");
                    j += 1;
                }
                i += 1;
            }
        };
    };
}
