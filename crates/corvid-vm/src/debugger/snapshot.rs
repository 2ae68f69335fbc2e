// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Owned views of a suspended program and of the loaded modules.

use std::fmt;

use crate::runtime::{FunctionId, Program, SourceLoc};
use crate::vm::{Probe, ProgramCounter};

/// One frame of a suspended program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameView {
    /// Function of the frame
    pub function: FunctionId,
    /// Current instruction; for callers, the pending call
    pub index: usize,
    /// Variable slots rendered with `Debug`; `None` when never written
    pub vars: Vec<Option<String>>,
    /// Local segment, bottom first, rendered with `Debug`
    pub locals: Vec<String>,
}

/// State published by the execution thread when it suspends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineSnapshot {
    /// Instruction about to execute
    pub pc: ProgramCounter,
    /// Function containing it
    pub function: FunctionId,
    /// Its text
    pub instruction: String,
    /// Its debug annotation
    pub loc: Option<SourceLoc>,
    /// Frame depth
    pub depth: usize,
    /// Last label executed
    pub last_label: Option<String>,
    /// Frames, innermost first
    pub frames: Vec<FrameView>,
    /// Releases from suspension before this one
    pub step_count: u64,
}

impl EngineSnapshot {
    /// Captures the machine behind a probe.
    pub fn capture(probe: &Probe<'_>, step_count: u64) -> Self {
        let frames = probe
            .frames()
            .into_iter()
            .map(|frame| FrameView {
                function: probe.function_id(frame.pc.function).clone(),
                index: frame.pc.index,
                vars: frame
                    .vars
                    .iter()
                    .map(|v| v.as_ref().map(|v| format!("{:?}", v)))
                    .collect(),
                locals: frame.locals.iter().map(|v| format!("{:?}", v)).collect(),
            })
            .collect();
        Self {
            pc: probe.pc(),
            function: probe.function().id().clone(),
            instruction: probe.op().text().to_string(),
            loc: probe.loc(),
            depth: probe.depth(),
            last_label: probe.last_label().map(str::to_string),
            frames,
            step_count,
        }
    }

    /// Innermost frame, if any.
    pub fn current_frame(&self) -> Option<&FrameView> {
        self.frames.first()
    }
}

impl fmt::Display for EngineSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} @ {}: {}", self.function, self.pc.index, self.instruction)?;
        if let Some(loc) = self.loc {
            write!(f, "  ({})", loc)?;
        }
        if let Some(label) = &self.last_label {
            write!(f, "\n  last label: {}", label)?;
        }
        for (depth, frame) in self.frames.iter().enumerate() {
            write!(f, "\n  #{} {} @ {}", depth, frame.function, frame.index)?;
            for (i, var) in frame.vars.iter().enumerate() {
                write!(f, "\n      var {} = {}", i, var.as_deref().unwrap_or("<unset>"))?;
            }
            if !frame.locals.is_empty() {
                write!(f, "\n      stack [{}]", frame.locals.join(", "))?;
            }
        }
        Ok(())
    }
}

/// A function as shown in a module listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionView {
    /// Identifier
    pub id: FunctionId,
    /// Declared arguments, receiver excluded
    pub n_args: usize,
    /// Whether it returns a value
    pub has_return: bool,
    /// Extra variable slots
    pub n_vars: usize,
    /// Instruction texts
    pub ops: Vec<String>,
    /// Instruction indices with a breakpoint
    pub breakpoints: Vec<usize>,
}

/// A module as shown in a listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleView {
    /// Module name
    pub name: String,
    /// Types with their fields
    pub types: Vec<(String, Vec<String>)>,
    /// Functions in identifier order
    pub functions: Vec<FunctionView>,
}

pub(crate) fn module_views(program: &Program, breakpoints: &[Vec<bool>]) -> Vec<ModuleView> {
    program
        .modules()
        .map(|module| ModuleView {
            name: module.name().to_string(),
            types: module
                .types()
                .map(|ty| (ty.name().to_string(), ty.fields().to_vec()))
                .collect(),
            functions: module
                .functions()
                .map(|(id, func)| {
                    let function = program.function(func);
                    FunctionView {
                        id: id.clone(),
                        n_args: function.n_args(),
                        has_return: function.has_return(),
                        n_vars: function.n_vars(),
                        ops: function
                            .ops()
                            .iter()
                            .map(|op| match op.loc() {
                                Some(loc) => format!("{} {}", loc, op.text()),
                                None => op.text().to_string(),
                            })
                            .collect(),
                        breakpoints: breakpoints
                            .get(func.index())
                            .map(|bits| {
                                bits.iter()
                                    .enumerate()
                                    .filter_map(|(i, &set)| set.then_some(i))
                                    .collect()
                            })
                            .unwrap_or_default(),
                    }
                })
                .collect(),
        })
        .collect()
}
