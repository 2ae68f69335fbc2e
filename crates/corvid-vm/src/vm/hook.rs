// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! The per-instruction hook.

use super::interpreter::Interpreter;
use super::machine::{FrameContents, Machine, ProgramCounter};
use crate::runtime::{FuncRef, Function, FunctionId, Op, SourceLoc};

/// Called by the interpreter around execution.
///
/// `before_instruction` runs on the execution thread before every operation
/// and may block it. Returning an error aborts the run with that fault.
pub trait InstructionHook: Send + Sync {
    /// About to execute the instruction described by `probe`.
    fn before_instruction(&self, probe: &Probe<'_>) -> Result<(), crate::error::Fault>;

    /// The run finished, successfully or not.
    fn on_exit(&self) {}
}

/// Read-only view of the machine at an instruction boundary.
pub struct Probe<'a> {
    pub(super) interpreter: &'a Interpreter,
    pub(super) machine: &'a Machine,
    pub(super) op: &'a Op,
}

impl<'a> Probe<'a> {
    /// Instruction about to execute.
    pub fn pc(&self) -> ProgramCounter {
        self.machine.pc()
    }

    /// Frame depth; the root frame is depth 0, `main` runs at depth 1.
    pub fn depth(&self) -> usize {
        self.machine.depth()
    }

    /// The operation about to execute.
    pub fn op(&self) -> &'a Op {
        self.op
    }

    /// Debug annotation of the operation.
    pub fn loc(&self) -> Option<SourceLoc> {
        self.op.loc()
    }

    /// Function being executed.
    pub fn function(&self) -> &'a Function {
        self.interpreter.function(self.machine.pc().function)
    }

    /// Function behind a handle, bootstrap included.
    pub fn resolve(&self, func: FuncRef) -> &'a Function {
        self.interpreter.function(func)
    }

    /// Identifier of a function.
    pub fn function_id(&self, func: FuncRef) -> &'a FunctionId {
        self.resolve(func).id()
    }

    /// Last label executed.
    pub fn last_label(&self) -> Option<&'a str> {
        self.machine.last_label()
    }

    /// Copies of all frames, innermost first.
    pub fn frames(&self) -> Vec<FrameContents> {
        self.machine.frames()
    }
}
