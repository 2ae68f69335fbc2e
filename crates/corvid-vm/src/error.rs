// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Error types for loading, linking and running programs.
//!
//! The taxonomy follows the pipeline: a [`LoadError`] aborts before linking,
//! a [`LinkError`] aborts before execution, and a [`Fault`] aborts a run. A
//! fault is reported once, wrapped in a [`RuntimeError`] that carries the
//! call-stack trace at the point of failure.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::runtime::FunctionId;

/// Result type for the top-level pipeline.
pub type Result<T> = std::result::Result<T, Error>;

/// Umbrella error for the load → link → run pipeline.
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed source text
    #[error(transparent)]
    Load(#[from] LoadError),

    /// Unresolvable reference
    #[error(transparent)]
    Link(#[from] LinkError),

    /// Fault raised while executing
    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    /// The program's `main` is missing or has the wrong shape
    #[error("bad entry point: {0}")]
    BadEntry(String),

    /// Source file could not be read
    #[error("cannot read {path}: {source}")]
    Io {
        /// File that failed to load
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },
}

/// A malformed declaration or instruction line.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{module}:{line}: {message}")]
pub struct LoadError {
    /// Module being loaded
    pub module: String,
    /// 1-based line number in the module source
    pub line: usize,
    /// What went wrong
    pub message: String,
}

impl LoadError {
    /// Creates a load error for a line of a module.
    pub fn new(module: impl Into<String>, line: usize, message: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            line,
            message: message.into(),
        }
    }
}

/// A reference that could not be resolved while linking.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("link error in {function}{}: {message}", op_suffix(.index))]
pub struct LinkError {
    /// Function whose body or signature failed to link
    pub function: FunctionId,
    /// Index of the failing operation, if the failure is in the body
    pub index: Option<usize>,
    /// What went wrong
    pub message: String,
}

fn op_suffix(index: &Option<usize>) -> String {
    match index {
        Some(index) => format!(" at op {}", index),
        None => String::new(),
    }
}

impl LinkError {
    /// Creates a signature-level link error.
    pub fn signature(function: FunctionId, message: impl Into<String>) -> Self {
        Self {
            function,
            index: None,
            message: message.into(),
        }
    }

    /// Creates a link error for one operation of a function body.
    pub fn at(function: FunctionId, index: usize, message: impl Into<String>) -> Self {
        Self {
            function,
            index: Some(index),
            message: message.into(),
        }
    }
}

/// A runtime fault. Faults abort the run; none are retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Fault {
    /// Pop or peek on an empty local segment
    #[error("stack underflow")]
    StackUnderflow,

    /// Push beyond the configured stack capacity
    #[error("stack overflow (capacity {0})")]
    StackOverflow(usize),

    /// Peek below the bottom of the local segment
    #[error("peek depth {depth} out of range (local segment holds {available})")]
    PeekOutOfRange {
        /// Requested depth
        depth: usize,
        /// Values in the local segment
        available: usize,
    },

    /// A checked cast failed
    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        /// Expected value kind
        expected: &'static str,
        /// Actual value kind
        found: &'static str,
    },

    /// Variable index outside the current frame's slots
    #[error("variable {index} out of range (frame has {slots} slots)")]
    VariableOutOfRange {
        /// Requested slot
        index: usize,
        /// Slots owned by the frame
        slots: usize,
    },

    /// Variable read before any write
    #[error("variable {0} read before it was written")]
    UnsetVariable(usize),

    /// `ARRAY_NEW` with a negative or oversized length
    #[error("array size {size} is outside 0..={max}")]
    InvalidArraySize {
        /// Requested length
        size: i64,
        /// Largest length allowed
        max: usize,
    },

    /// Array, string, field or group index out of range
    #[error("index {index} out of range for length {len}")]
    IndexOutOfRange {
        /// Requested index
        index: i64,
        /// Length of the indexed value
        len: usize,
    },

    /// Frame closed with the wrong number of values left on its local segment
    #[error("frame must return {expected} value(s), found {found} on the stack")]
    ReturnArity {
        /// Values the frame declared
        expected: usize,
        /// Values actually present
        found: usize,
    },

    /// Not enough values on the stack to open a frame or build a record
    #[error("need {needed} argument(s) but only {available} on the stack")]
    MissingArguments {
        /// Values required
        needed: usize,
        /// Values present in the local segment
        available: usize,
    },

    /// Record constructed with the wrong number of fields
    #[error("record {ty} needs {expected} field(s), got {found}")]
    RecordArity {
        /// Record type name
        ty: String,
        /// Field count of the type
        expected: usize,
        /// Values supplied
        found: usize,
    },

    /// Record of the wrong type for a method call or field access
    #[error("expected record of type {expected}, found {found}")]
    WrongRecordType {
        /// Required type name
        expected: String,
        /// Actual value description
        found: String,
    },

    /// Checked integer arithmetic overflowed
    #[error("integer overflow")]
    Overflow,

    /// Division or remainder by zero
    #[error("division by zero")]
    DivisionByZero,

    /// Program counter left the instructions of a function
    #[error("no instruction at index {index} of {function}")]
    NoInstruction {
        /// Function being executed
        function: String,
        /// Index past its end
        index: usize,
    },

    /// Frame bookkeeping was found inconsistent
    #[error("corrupt stack: {0}")]
    CorruptStack(&'static str),

    /// Stream read or write failed
    #[error("I/O error: {0}")]
    Io(String),

    /// Explicit failure raised by the program
    #[error("{0}")]
    Failed(String),

    /// Execution thread was interrupted while suspended
    #[error("execution interrupted while suspended")]
    Interrupted,
}

impl Fault {
    /// Shorthand for a failed checked cast.
    pub fn mismatch(expected: &'static str, found: &'static str) -> Self {
        Fault::TypeMismatch { expected, found }
    }
}

impl From<std::io::Error> for Fault {
    fn from(err: std::io::Error) -> Self {
        Fault::Io(err.to_string())
    }
}

/// One frame of a runtime call-stack trace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceFrame {
    /// Function executing in this frame
    pub function: FunctionId,
    /// Instruction index within the function
    pub index: usize,
}

impl fmt::Display for TraceFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} @ {}", self.function, self.index)
    }
}

/// A fault annotated with the execution context it occurred in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeError {
    /// The underlying fault
    pub fault: Fault,
    /// Last label executed before the fault
    pub last_label: Option<String>,
    /// Call stack, innermost frame first
    pub trace: Vec<TraceFrame>,
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "runtime fault: {}", self.fault)?;
        if let Some(top) = self.trace.first() {
            write!(f, "\n  at {}", top)?;
        }
        if let Some(label) = &self.last_label {
            write!(f, "\n  last label: {}", label)?;
        }
        if self.trace.len() > 1 {
            write!(f, "\n  call stack:")?;
            for (depth, frame) in self.trace.iter().enumerate() {
                write!(f, "\n    {}: {}", depth, frame)?;
            }
        }
        Ok(())
    }
}

impl std::error::Error for RuntimeError {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::Scope;

    fn id(name: &str) -> FunctionId {
        FunctionId::new(Scope::module("m"), name)
    }

    #[test]
    fn test_load_error_display() {
        let err = LoadError::new("main", 7, "unknown declaration 'FUN'");
        assert_eq!(err.to_string(), "main:7: unknown declaration 'FUN'");
    }

    #[test]
    fn test_link_error_display() {
        let err = LinkError::at(id("f"), 3, "label not found: loop");
        assert_eq!(err.to_string(), "link error in m::f at op 3: label not found: loop");

        let err = LinkError::signature(id("g"), "unknown owner type");
        assert_eq!(err.to_string(), "link error in m::g: unknown owner type");
    }

    #[test]
    fn test_runtime_error_display_includes_trace() {
        let err = RuntimeError {
            fault: Fault::StackUnderflow,
            last_label: Some("loop".into()),
            trace: vec![
                TraceFrame { function: id("inner"), index: 4 },
                TraceFrame { function: id("main"), index: 1 },
            ],
        };
        let text = err.to_string();
        assert!(text.starts_with("runtime fault: stack underflow"));
        assert!(text.contains("at m::inner @ 4"));
        assert!(text.contains("last label: loop"));
        assert!(text.contains("1: m::main @ 1"));
    }

    #[test]
    fn test_fault_from_io() {
        let fault: Fault = std::io::Error::other("disk gone").into();
        assert_eq!(fault, Fault::Io("disk gone".into()));
    }
}
