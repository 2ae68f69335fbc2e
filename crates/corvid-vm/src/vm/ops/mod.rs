// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! The opcode table.
//!
//! Every deferred instruction is resolved by name through [`OPCODES`]. An
//! entry fixes the number of arguments and how the instruction becomes an
//! [`OpFn`]:
//!
//! - `Native` ops pop their inputs, push their result and fall through.
//! - `Flow` ops decide how the program counter moves.
//! - `Linked` ops resolve their arguments against the link context first.
//!
//! Binary operations pop the right operand first, so `a b SUB` computes
//! `a - b`.

mod array;
mod arith;
mod control;
mod logic;
mod pattern;
mod record;
mod stack;
mod stream;
mod text;

use std::sync::{Arc, LazyLock};

use corvid_macros::opcode_table;
use rustc_hash::FxHashMap;

pub use array::MAX_ARRAY_LEN;
pub(crate) use control::{construct, invoke};

use super::machine::Machine;
use crate::error::Fault;
use crate::linker::LinkContext;
use crate::runtime::{OpFn, PcMove};

/// An operation that always advances to the next instruction.
pub(crate) type NativeFn = fn(&mut Machine) -> Result<(), Fault>;

/// An operation that moves the program counter itself.
pub(crate) type FlowFn = fn(&mut Machine) -> Result<PcMove, Fault>;

/// Builds an operation from its link-time arguments.
pub(crate) type LinkFn = fn(&LinkContext<'_>, &[String]) -> Result<OpFn, String>;

/// How a table entry turns into an executable operation.
#[derive(Clone, Copy)]
pub(crate) enum Build {
    Native(NativeFn),
    Flow(FlowFn),
    Linked(LinkFn),
}

/// One row of the opcode table.
pub(crate) struct OpcodeEntry {
    pub name: &'static str,
    pub arity: usize,
    pub build: Build,
}

impl OpcodeEntry {
    /// Resolves the entry into an operation; `args` has already been
    /// checked against the arity.
    pub(crate) fn instantiate(&self, ctx: &LinkContext<'_>, args: &[String]) -> Result<OpFn, String> {
        match self.build {
            Build::Native(f) => Ok(Box::new(move |m: &mut Machine| {
                f(m)?;
                Ok(PcMove::Next)
            })),
            Build::Flow(f) => Ok(Box::new(f)),
            Build::Linked(f) => f(ctx, args),
        }
    }
}

opcode_table! {
    /// All deferred opcodes.
    pub(crate) static OPCODES: [OpcodeEntry] = {
        // stack
        "PUSH_INT" / 1 => Build::Linked(stack::push_int),
        "PUSH_STR" / 1 => Build::Linked(stack::push_str),
        "PUSH_TRUE" / 0 => Build::Native(stack::push_true),
        "PUSH_FALSE" / 0 => Build::Native(stack::push_false),
        "POP" / 0 => Build::Native(stack::pop),
        "DUP" / 0 => Build::Native(stack::dup),
        "SWAP" / 0 => Build::Native(stack::swap),
        "NOP" / 0 => Build::Native(stack::nop),

        // control
        "JUMP" / 1 => Build::Linked(control::jump),
        "JUMP_IF" / 1 => Build::Linked(control::jump_if),
        "JUMP_UNLESS" / 1 => Build::Linked(control::jump_unless),
        "CALL" / 1 => Build::Linked(control::call),
        "RET" / 0 => Build::Flow(control::ret),
        "FAIL" / 1 => Build::Linked(control::fail),

        // integers
        "ADD" / 0 => Build::Native(arith::add),
        "SUB" / 0 => Build::Native(arith::sub),
        "MUL" / 0 => Build::Native(arith::mul),
        "DIV" / 0 => Build::Native(arith::div),
        "MOD" / 0 => Build::Native(arith::rem),
        "NEG" / 0 => Build::Native(arith::neg),
        "LT" / 0 => Build::Native(arith::lt),
        "LE" / 0 => Build::Native(arith::le),
        "GT" / 0 => Build::Native(arith::gt),
        "GE" / 0 => Build::Native(arith::ge),

        // equality and booleans
        "EQ" / 0 => Build::Native(logic::eq),
        "NE" / 0 => Build::Native(logic::ne),
        "NOT" / 0 => Build::Native(logic::not),
        "AND" / 0 => Build::Native(logic::and),
        "OR" / 0 => Build::Native(logic::or),

        // strings and builders
        "STR_LEN" / 0 => Build::Native(text::len),
        "STR_CONCAT" / 0 => Build::Native(text::concat),
        "STR_SLICE" / 0 => Build::Native(text::slice),
        "STR_CHAR" / 0 => Build::Native(text::char_at),
        "STR_CMP" / 0 => Build::Native(text::compare),
        "INT_TO_STR" / 0 => Build::Native(text::int_to_str),
        "STR_TO_INT" / 0 => Build::Native(text::str_to_int),
        "BUILDER_NEW" / 0 => Build::Native(text::builder_new),
        "BUILDER_APPEND" / 0 => Build::Native(text::builder_append),
        "BUILDER_STR" / 0 => Build::Native(text::builder_str),

        // arrays
        "ARRAY_NEW" / 0 => Build::Native(array::new),
        "ARRAY_GET" / 0 => Build::Native(array::get),
        "ARRAY_SET" / 0 => Build::Native(array::set),
        "ARRAY_LEN" / 0 => Build::Native(array::len),

        // regular expressions
        "MATCH" / 1 => Build::Linked(pattern::matcher),
        "MATCH_GROUP" / 0 => Build::Native(pattern::group),
        "MATCH_TAIL" / 0 => Build::Native(pattern::tail),

        // streams
        "STDIN" / 0 => Build::Native(stream::stdin),
        "STDOUT" / 0 => Build::Native(stream::stdout),
        "STDERR" / 0 => Build::Native(stream::stderr),
        "READ_LINE" / 0 => Build::Native(stream::read_line),
        "WRITE" / 0 => Build::Native(stream::write),
        "FLUSH" / 0 => Build::Native(stream::flush),

        // records
        "GET_FIELD" / 1 => Build::Linked(record::get_field),
        "SET_FIELD" / 1 => Build::Linked(record::set_field),
        "IS_TYPE" / 1 => Build::Linked(record::is_type),
    };
}

static INDEX: LazyLock<FxHashMap<&'static str, &'static OpcodeEntry>> =
    LazyLock::new(|| OPCODES.iter().map(|entry| (entry.name, entry)).collect());

/// Finds an opcode by name.
pub(crate) fn lookup(name: &str) -> Option<&'static OpcodeEntry> {
    INDEX.get(name).copied()
}

/// Variable access resolved by the loader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarAccess {
    /// `PUSH_VAR i`
    Push,
    /// `POP_VAR i`
    Pop,
    /// `COPY_VAR i`
    Copy,
}

pub(crate) fn var_op(access: VarAccess, index: usize) -> OpFn {
    match access {
        VarAccess::Push => Box::new(move |m: &mut Machine| {
            m.push_var(index)?;
            Ok(PcMove::Next)
        }),
        VarAccess::Pop => Box::new(move |m: &mut Machine| {
            m.pop_to_var(index)?;
            Ok(PcMove::Next)
        }),
        VarAccess::Copy => Box::new(move |m: &mut Machine| {
            m.copy_to_var(index)?;
            Ok(PcMove::Next)
        }),
    }
}

pub(crate) fn label_op(name: &str) -> OpFn {
    let name: Arc<str> = name.into();
    Box::new(move |m: &mut Machine| {
        m.set_label(name.clone());
        Ok(PcMove::Next)
    })
}
