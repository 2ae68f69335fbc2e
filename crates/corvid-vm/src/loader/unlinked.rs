// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Loaded but not yet linked modules.

use rustc_hash::FxHashMap;

use crate::runtime::{FunctionId, Scope, SourceLoc};
use crate::vm::VarAccess;

/// A module as read from source.
#[derive(Debug, Clone, Default)]
pub struct UnlinkedModule {
    /// Module name
    pub name: String,
    /// Type declarations in source order
    pub types: Vec<UnlinkedType>,
    /// Function declarations in source order
    pub functions: Vec<UnlinkedFunction>,
}

/// A `TYPE` declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnlinkedType {
    /// Type name
    pub name: String,
    /// Field names in slot order
    pub fields: Vec<String>,
    /// Declaration line
    pub line: usize,
}

/// The owner column of a `FUNC` declaration.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Owner {
    /// `-`: a module-level function
    Module,
    /// A type of the declaring module, or of `module` when qualified
    Type {
        /// Module of the type, when written as `module:Type`
        module: Option<String>,
        /// Type name
        name: String,
    },
}

/// A `FUNC` declaration and its body.
#[derive(Debug, Clone)]
pub struct UnlinkedFunction {
    /// Owning type, if a method
    pub owner: Owner,
    /// Function name
    pub name: String,
    /// Declared argument count, receiver excluded
    pub n_args: usize,
    /// Whether a value is returned
    pub has_return: bool,
    /// Declaration line
    pub line: usize,
    /// Body in order
    pub ops: Vec<UnlinkedOp>,
    /// Label name to instruction index
    pub labels: FxHashMap<String, usize>,
}

impl UnlinkedFunction {
    /// Identifier of the function inside `module`.
    pub fn id(&self, module: &str) -> FunctionId {
        let scope = match &self.owner {
            Owner::Module => Scope::module(module),
            Owner::Type { module: owner, name } => {
                Scope::method(owner.as_deref().unwrap_or(module), name.as_str())
            }
        };
        FunctionId::new(scope, self.name.as_str())
    }

    /// Arguments taken from the caller, receiver included.
    pub fn n_params(&self) -> usize {
        self.n_args + usize::from(self.owner != Owner::Module)
    }

    /// Variable slots needed beyond the parameters.
    pub fn n_vars(&self) -> usize {
        let highest = self
            .ops
            .iter()
            .filter_map(|op| match op.kind {
                OpKind::Var(_, index) => Some(index + 1),
                _ => None,
            })
            .max()
            .unwrap_or(0);
        highest.max(self.n_params()) - self.n_params()
    }
}

/// One body line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnlinkedOp {
    /// Source line
    pub line: usize,
    /// Debug annotation, if given
    pub loc: Option<SourceLoc>,
    /// Instruction text without the annotation
    pub text: String,
    /// What the loader made of it
    pub kind: OpKind,
}

/// Classification done at load time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpKind {
    /// `LABEL name`
    Label(String),
    /// `PUSH_VAR`, `POP_VAR` or `COPY_VAR` with its index
    Var(VarAccess, usize),
    /// Anything resolved by the linker
    Deferred {
        /// Opcode name
        opcode: String,
        /// Raw arguments
        args: Vec<String>,
    },
}
