// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! The fetch/execute loop.

use std::sync::Arc;

use tracing::{debug, info};

use super::hook::{InstructionHook, Probe};
use super::machine::{DEFAULT_STACK_CAPACITY, Machine, ProgramCounter};
use crate::error::{Error, Fault, RuntimeError, TraceFrame};
use crate::linker;
use crate::runtime::{FuncRef, Function, PcMove, Program, Streams, Value};

/// Library-level settings for a run.
#[derive(Debug, Clone)]
pub struct VmConfig {
    /// Maximum stack slots, frame markers included
    pub stack_capacity: usize,
    /// Streams returned by `STDIN`, `STDOUT` and `STDERR`
    pub streams: Streams,
}

impl Default for VmConfig {
    fn default() -> Self {
        Self {
            stack_capacity: DEFAULT_STACK_CAPACITY,
            streams: Streams::default(),
        }
    }
}

/// Runs a linked program from its entry point.
pub struct Interpreter {
    program: Arc<Program>,
    entry: FuncRef,
    bootstrap: Function,
    config: VmConfig,
    hook: Option<Arc<dyn InstructionHook>>,
}

impl Interpreter {
    /// Creates an interpreter that starts at `entry`.
    pub fn new(program: Arc<Program>, entry: FuncRef, config: VmConfig) -> Self {
        let bootstrap = linker::bootstrap(&program, entry);
        Self {
            program,
            entry,
            bootstrap,
            config,
            hook: None,
        }
    }

    /// Creates an interpreter for the `main` function of a module.
    pub fn for_module(program: Arc<Program>, module: &str, config: VmConfig) -> Result<Self, Error> {
        let entry = program.entry(module)?;
        Ok(Self::new(program, entry, config))
    }

    /// Installs an instruction hook, typically a debugger.
    pub fn with_hook(mut self, hook: Arc<dyn InstructionHook>) -> Self {
        self.hook = Some(hook);
        self
    }

    /// Handle of `main`.
    pub fn entry(&self) -> FuncRef {
        self.entry
    }

    /// The program being run.
    pub fn program(&self) -> &Arc<Program> {
        &self.program
    }

    /// Function behind a handle, the bootstrap function included.
    pub fn function(&self, func: FuncRef) -> &Function {
        if func == FuncRef::BOOTSTRAP {
            &self.bootstrap
        } else {
            self.program.function(func)
        }
    }

    /// Runs the program to completion and returns its exit code.
    ///
    /// `args` is handed to `main` as an array of strings.
    pub fn run(&self, args: &[String]) -> Result<i64, RuntimeError> {
        let mut machine = Machine::new(self.config.stack_capacity, self.config.streams.clone());
        let entry = self.program.function(self.entry).id();
        info!(entry = %entry, args = args.len(), "starting program");

        let result = {
            let _exit = ExitGuard(self.hook.as_deref());
            self.execute(&mut machine, args)
        };
        match &result {
            Ok(code) => info!(exit_code = code, "program finished"),
            Err(err) => debug!(fault = %err.fault, "program faulted"),
        }
        result
    }

    fn execute(&self, m: &mut Machine, args: &[String]) -> Result<i64, RuntimeError> {
        let argv = Value::array(args.iter().map(|a| Value::str(a)).collect());
        m.push(argv).map_err(|fault| self.annotate(m, fault))?;

        while !m.pc().is_end() {
            self.step(m).map_err(|fault| self.annotate(m, fault))?;
        }

        let exit = m.pop().and_then(|value| value.as_int());
        exit.map_err(|fault| self.annotate(m, fault))
    }

    fn step(&self, m: &mut Machine) -> Result<(), Fault> {
        let pc = m.pc();
        let function = self.function(pc.function);
        let op = function.op(pc.index).ok_or_else(|| Fault::NoInstruction {
            function: function.id().to_string(),
            index: pc.index,
        })?;

        if let Some(hook) = &self.hook {
            let probe = Probe {
                interpreter: self,
                machine: m,
                op,
            };
            hook.before_instruction(&probe)?;
        }

        match op.apply(m)? {
            PcMove::Next => m.set_pc(pc.advanced()),
            PcMove::Stay => {}
            PcMove::Jump(index) => m.set_pc(ProgramCounter::new(pc.function, index)),
            PcMove::Enter(callee) => m.set_pc(ProgramCounter::new(callee, 0)),
        }
        Ok(())
    }

    fn annotate(&self, m: &Machine, fault: Fault) -> RuntimeError {
        let trace = m
            .call_stack()
            .into_iter()
            .map(|pc| TraceFrame {
                function: self.function(pc.function).id().clone(),
                index: pc.index,
            })
            .collect();
        RuntimeError {
            fault,
            last_label: m.last_label().map(str::to_string),
            trace,
        }
    }
}

/// Reports the end of a run to the hook, also when an operation panics.
struct ExitGuard<'a>(Option<&'a dyn InstructionHook>);

impl Drop for ExitGuard<'_> {
    fn drop(&mut self) {
        if let Some(hook) = self.0 {
            hook.on_exit();
        }
    }
}

impl std::fmt::Debug for Interpreter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Interpreter")
            .field("entry", &self.entry)
            .field("config", &self.config)
            .field("hooked", &self.hook.is_some())
            .finish()
    }
}
