// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Equality and boolean operators.

use crate::error::Fault;
use crate::runtime::Value;
use crate::vm::Machine;

pub(super) fn eq(m: &mut Machine) -> Result<(), Fault> {
    let b = m.pop()?;
    let a = m.pop()?;
    m.push(Value::Bool(a == b))
}

pub(super) fn ne(m: &mut Machine) -> Result<(), Fault> {
    let b = m.pop()?;
    let a = m.pop()?;
    m.push(Value::Bool(a != b))
}

pub(super) fn not(m: &mut Machine) -> Result<(), Fault> {
    let a = m.pop()?.as_bool()?;
    m.push(Value::Bool(!a))
}

pub(super) fn and(m: &mut Machine) -> Result<(), Fault> {
    let b = m.pop()?.as_bool()?;
    let a = m.pop()?.as_bool()?;
    m.push(Value::Bool(a && b))
}

pub(super) fn or(m: &mut Machine) -> Result<(), Fault> {
    let b = m.pop()?.as_bool()?;
    let a = m.pop()?.as_bool()?;
    m.push(Value::Bool(a || b))
}
