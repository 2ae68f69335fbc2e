// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! The execution engine.
//!
//! ## Structure
//!
//! - `machine` - the operand/frame stack and registers
//! - `ops` - the opcode table and primitive operations
//! - `hook` - the per-instruction hook used by the debugger
//! - `interpreter` - the fetch/execute loop

mod hook;
mod interpreter;
mod machine;
pub(crate) mod ops;

pub use hook::{InstructionHook, Probe};
pub use interpreter::{Interpreter, VmConfig};
pub use machine::{DEFAULT_STACK_CAPACITY, FrameContents, Machine, ProgramCounter};
pub use ops::{MAX_ARRAY_LEN, VarAccess};
