// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Runtime model: values, types, modules and linked functions.

pub mod function;
pub mod module;
pub mod stream;
pub mod value;

pub use function::{
    FuncRef, Function, FunctionBuilder, FunctionId, Op, OpFn, ParseFunctionIdError, PcMove,
    Scope, Signature, SourceLoc,
};
pub use module::{Module, Program, Type};
pub use stream::{CaptureBuffer, InputStream, OutputStream, Streams};
pub use value::{MatchResult, Record, Value};
