// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! # corvid-vm
//!
//! A stack-based bytecode virtual machine with an attachable debugger.
//!
//! ## Overview
//!
//! Programs are written in a line-oriented textual instruction format:
//! - the [`loader`] tokenizes and parses each module into unlinked form
//! - the [`linker`] resolves labels, calls, types and fields across modules
//! - the [`vm`] runs the linked [`Program`] on one operand/frame stack
//! - the [`debugger`] pauses, steps and breaks the running interpreter
//!
//! ## Quick Start
//!
//! ```rust
//! use corvid_vm::{Engine, Source};
//!
//! let source = Source::new(
//!     "app",
//!     "corvid 1
//! FUNC - main 1 1 0
//!   PUSH_INT 1
//!   PUSH_INT 2
//!   ADD
//!   RET
//! ",
//! );
//! let engine = Engine::from_sources(&[source]).unwrap();
//! assert_eq!(engine.run("app", &[]).unwrap(), 3);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod debugger;
pub mod error;
pub mod linker;
pub mod loader;
pub mod runtime;
pub mod vm;

use std::sync::Arc;

use tracing::debug;

pub use error::{Error, Fault, LinkError, LoadError, Result, RuntimeError, TraceFrame};
pub use loader::Source;
pub use runtime::{FuncRef, FunctionId, Program, Streams, Value};
pub use vm::{InstructionHook, Interpreter, VmConfig};

/// Loads and links a set of modules.
pub fn compile(sources: &[Source]) -> Result<Program> {
    let modules = loader::load_all(sources)?;
    let program = linker::link(&modules)?;
    debug!(modules = sources.len(), "compiled program");
    Ok(program)
}

/// A linked program together with the settings to run it.
pub struct Engine {
    program: Arc<Program>,
    config: VmConfig,
    hook: Option<Arc<dyn InstructionHook>>,
}

impl Engine {
    /// Creates an engine for an already linked program.
    pub fn new(program: Arc<Program>) -> Self {
        Self {
            program,
            config: VmConfig::default(),
            hook: None,
        }
    }

    /// Loads and links `sources`.
    pub fn from_sources(sources: &[Source]) -> Result<Self> {
        Ok(Self::new(Arc::new(compile(sources)?)))
    }

    /// Replaces the run settings.
    pub fn with_config(mut self, config: VmConfig) -> Self {
        self.config = config;
        self
    }

    /// Installs an instruction hook for subsequent runs.
    pub fn with_hook(mut self, hook: Arc<dyn InstructionHook>) -> Self {
        self.hook = Some(hook);
        self
    }

    /// The linked program.
    pub fn program(&self) -> &Arc<Program> {
        &self.program
    }

    /// Builds an interpreter for the `main` of `module`.
    pub fn interpreter(&self, module: &str) -> Result<Interpreter> {
        let interpreter =
            Interpreter::for_module(self.program.clone(), module, self.config.clone())?;
        Ok(match &self.hook {
            Some(hook) => interpreter.with_hook(hook.clone()),
            None => interpreter,
        })
    }

    /// Runs the `main` of `module` and returns its exit code.
    pub fn run(&self, module: &str, args: &[String]) -> Result<i64> {
        Ok(self.interpreter(module)?.run(args)?)
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("functions", &self.program.function_count())
            .field("config", &self.config)
            .field("hooked", &self.hook.is_some())
            .finish()
    }
}
