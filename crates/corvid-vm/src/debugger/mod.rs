// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Debugger control.
//!
//! A [`DebuggerControl`] is installed as the interpreter's
//! [`InstructionHook`](crate::vm::InstructionHook). Before each instruction
//! the execution thread consults the breakpoints and the active
//! [`ResumeCondition`]; when either asks for it, the thread publishes an
//! [`EngineSnapshot`] and blocks until a controller resumes or steps it.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use corvid_vm::debugger::DebuggerControl;
//! use corvid_vm::vm::{Interpreter, VmConfig};
//! use corvid_vm::{Source, compile};
//!
//! let program = Arc::new(compile(&[Source::new("app", "corvid 1\nFUNC - main 1 1 0\n  PUSH_INT 0\n  RET\n")]).unwrap());
//! let control = Arc::new(DebuggerControl::new(program.clone(), true));
//! let interpreter = Interpreter::for_module(program, "app", VmConfig::default())
//!     .unwrap()
//!     .with_hook(control.clone());
//! let runner = std::thread::spawn(move || interpreter.run(&[]));
//!
//! control.await_suspended(None).unwrap();
//! control.step().unwrap();
//! control.await_suspended(None).unwrap();
//! control.resume().unwrap();
//! assert_eq!(runner.join().unwrap().unwrap(), 0);
//! ```

mod condition;
mod control;
mod snapshot;

pub use condition::{Position, ResumeCondition, StepKind};
pub use control::{DebugError, DebuggerControl, RunState};
pub use snapshot::{EngineSnapshot, FrameView, FunctionView, ModuleView};
