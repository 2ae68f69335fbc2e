// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Reading module source text.
//!
//! ## Structure
//!
//! - `tokenizer.rs` - splits a line into tokens, resolving string escapes
//! - `parser.rs` - `TYPE`/`FUNC` declarations and function bodies
//! - `unlinked.rs` - the unlinked module table handed to the linker
//!
//! ## Usage
//!
//! ```rust
//! use corvid_vm::loader::load;
//!
//! let module = load("app", "corvid 1\nFUNC - main 1 1 0\n  PUSH_INT 0\n  RET\n").unwrap();
//! assert_eq!(module.functions.len(), 1);
//! ```

mod parser;
mod tokenizer;
mod unlinked;

use std::path::Path;

use rustc_hash::FxHashSet;

pub use parser::{HEADER, load};
pub use tokenizer::{Token, tokenize};
pub use unlinked::{OpKind, Owner, UnlinkedFunction, UnlinkedModule, UnlinkedOp, UnlinkedType};

use crate::error::{Error, LoadError};

/// Source text of one module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Source {
    /// Module name
    pub name: String,
    /// Module text
    pub text: String,
}

impl Source {
    /// Creates a source from a name and text.
    pub fn new(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            text: text.into(),
        }
    }

    /// Reads a file; the module is named after the file stem.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let name = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or("main")
            .to_string();
        Ok(Self { name, text })
    }
}

/// Loads every module; the first error in source order wins.
///
/// With the `parallel` feature, modules are parsed on the rayon pool.
pub fn load_all(sources: &[Source]) -> Result<Vec<UnlinkedModule>, LoadError> {
    let mut names = FxHashSet::default();
    for source in sources {
        if !names.insert(source.name.as_str()) {
            return Err(LoadError::new(source.name.as_str(), 0, "module loaded twice"));
        }
    }

    #[cfg(feature = "parallel")]
    let results: Vec<_> = {
        use rayon::prelude::*;
        sources
            .par_iter()
            .map(|source| load(&source.name, &source.text))
            .collect()
    };

    #[cfg(not(feature = "parallel"))]
    let results: Vec<_> = sources
        .iter()
        .map(|source| load(&source.name, &source.text))
        .collect();

    results.into_iter().collect()
}
