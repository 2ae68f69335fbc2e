// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Function identifiers, linked operations and immutable functions.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use thiserror::Error;

use super::module::Type;
use crate::error::Fault;
use crate::vm::Machine;

/// Where a function lives: at module level, or as a method of a type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Scope {
    /// A module-level function
    Module(String),
    /// An instance method of `type_name` declared in `module`
    Method {
        /// Module declaring the type
        module: String,
        /// Owning type
        type_name: String,
    },
}

impl Scope {
    /// Module-level scope.
    pub fn module(name: impl Into<String>) -> Self {
        Scope::Module(name.into())
    }

    /// Method scope for a type.
    pub fn method(module: impl Into<String>, type_name: impl Into<String>) -> Self {
        Scope::Method {
            module: module.into(),
            type_name: type_name.into(),
        }
    }

    /// Module the scope belongs to.
    pub fn module_name(&self) -> &str {
        match self {
            Scope::Module(module) | Scope::Method { module, .. } => module,
        }
    }

    /// Owning type name, for method scopes.
    pub fn type_name(&self) -> Option<&str> {
        match self {
            Scope::Module(_) => None,
            Scope::Method { type_name, .. } => Some(type_name),
        }
    }
}

/// A `(scope, name)` pair identifying a function.
///
/// Identifiers are totally ordered by scope, then name, so listings and
/// reports come out in a stable order. The textual form is `module::name`
/// for module-level functions and `module::Type.name` for methods.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FunctionId {
    /// Declaring scope
    pub scope: Scope,
    /// Function name
    pub name: String,
}

impl FunctionId {
    /// Creates a function identifier.
    pub fn new(scope: Scope, name: impl Into<String>) -> Self {
        Self {
            scope,
            name: name.into(),
        }
    }

    /// True when this identifier names the implicit constructor of its type.
    pub fn is_constructor(&self) -> bool {
        self.scope.type_name() == Some(self.name.as_str())
    }
}

impl fmt::Display for FunctionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.scope {
            Scope::Module(module) => write!(f, "{}::{}", module, self.name),
            Scope::Method { module, type_name } => {
                write!(f, "{}::{}.{}", module, type_name, self.name)
            }
        }
    }
}

/// Error returned when parsing a textual function identifier.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid function id '{0}' (expected module::name or module::Type.name)")]
pub struct ParseFunctionIdError(pub String);

impl FromStr for FunctionId {
    type Err = ParseFunctionIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseFunctionIdError(s.to_string());
        let (module, rest) = s.split_once("::").ok_or_else(err)?;
        if module.is_empty() || rest.is_empty() {
            return Err(err());
        }
        match rest.split_once('.') {
            Some((type_name, name)) if !type_name.is_empty() && !name.is_empty() => {
                Ok(FunctionId::new(Scope::method(module, type_name), name))
            }
            Some(_) => Err(err()),
            None => Ok(FunctionId::new(Scope::module(module), rest)),
        }
    }
}

/// Handle of a linked function inside a program's function arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FuncRef(pub(crate) usize);

impl FuncRef {
    /// The synthetic bootstrap function that calls `main`.
    pub const BOOTSTRAP: FuncRef = FuncRef(usize::MAX);

    /// Position of the function in the program arena.
    pub fn index(self) -> usize {
        self.0
    }
}

/// A `line:column` debug annotation attached to an instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SourceLoc {
    /// Source line
    pub line: u32,
    /// Source column
    pub column: u32,
}

impl fmt::Display for SourceLoc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// How the program counter moves after an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PcMove {
    /// Advance to the next instruction
    Next,
    /// Leave the program counter where the operation put it
    Stay,
    /// Jump to an absolute index in the current function
    Jump(usize),
    /// Enter a callee at its first instruction
    Enter(FuncRef),
}

/// Executable body of a linked operation.
pub type OpFn = Box<dyn Fn(&mut Machine) -> Result<PcMove, Fault> + Send + Sync>;

/// A linked operation: the resolved closure plus its listing text.
pub struct Op {
    text: String,
    loc: Option<SourceLoc>,
    exec: OpFn,
}

impl Op {
    /// Creates a linked operation.
    pub fn new(text: impl Into<String>, loc: Option<SourceLoc>, exec: OpFn) -> Self {
        Self {
            text: text.into(),
            loc,
            exec,
        }
    }

    /// Instruction text as written in the source (without debug annotation).
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Debug annotation, if present.
    pub fn loc(&self) -> Option<SourceLoc> {
        self.loc
    }

    /// Applies the operation to the machine.
    pub fn apply(&self, machine: &mut Machine) -> Result<PcMove, Fault> {
        (self.exec)(machine)
    }
}

impl fmt::Debug for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Op")
            .field("text", &self.text)
            .field("loc", &self.loc)
            .finish_non_exhaustive()
    }
}

/// The shape of a call: what the caller must provide and what it gets back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    /// Declared argument count (excluding the receiver)
    pub n_args: usize,
    /// Whether the function leaves a return value
    pub has_return: bool,
    /// Variable slots beyond the arguments
    pub n_vars: usize,
    /// Owning type for methods; the receiver must be a record of this type
    pub owner: Option<Arc<Type>>,
}

impl Signature {
    /// Arguments actually taken from the caller's stack, receiver included.
    pub fn effective_args(&self) -> usize {
        self.n_args + usize::from(self.owner.is_some())
    }
}

/// A linked, immutable function.
#[derive(Debug)]
pub struct Function {
    id: FunctionId,
    signature: Signature,
    ops: Vec<Op>,
}

impl Function {
    /// Identifier of the function.
    pub fn id(&self) -> &FunctionId {
        &self.id
    }

    /// Call signature.
    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    /// Declared argument count.
    pub fn n_args(&self) -> usize {
        self.signature.n_args
    }

    /// Whether the function returns a value.
    pub fn has_return(&self) -> bool {
        self.signature.has_return
    }

    /// Variable slots beyond the declared arguments.
    pub fn n_vars(&self) -> usize {
        self.signature.n_vars
    }

    /// Linked operations in order.
    pub fn ops(&self) -> &[Op] {
        &self.ops
    }

    /// Operation at an index, if any.
    pub fn op(&self, index: usize) -> Option<&Op> {
        self.ops.get(index)
    }
}

/// Accumulates linked operations and yields the immutable [`Function`].
#[derive(Debug)]
pub struct FunctionBuilder {
    id: FunctionId,
    signature: Signature,
    ops: Vec<Op>,
}

impl FunctionBuilder {
    /// Starts a function with a fixed signature.
    pub fn new(id: FunctionId, signature: Signature) -> Self {
        Self {
            id,
            signature,
            ops: Vec::new(),
        }
    }

    /// Appends the next operation.
    pub fn push(&mut self, op: Op) -> &mut Self {
        self.ops.push(op);
        self
    }

    /// Finishes the function.
    pub fn build(self) -> Function {
        Function {
            id: self.id,
            signature: self.signature,
            ops: self.ops,
        }
    }
}
