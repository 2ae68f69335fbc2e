// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Constants and stack shuffling.

use crate::error::Fault;
use crate::linker::LinkContext;
use crate::runtime::{OpFn, PcMove, Value};
use crate::vm::Machine;

pub(super) fn push_int(ctx: &LinkContext<'_>, args: &[String]) -> Result<OpFn, String> {
    let n = ctx.parse_int(&args[0])?;
    Ok(Box::new(move |m: &mut Machine| {
        m.push(Value::Int(n))?;
        Ok(PcMove::Next)
    }))
}

pub(super) fn push_str(_: &LinkContext<'_>, args: &[String]) -> Result<OpFn, String> {
    let s = Value::str(&args[0]);
    Ok(Box::new(move |m: &mut Machine| {
        m.push(s.clone())?;
        Ok(PcMove::Next)
    }))
}

pub(super) fn push_true(m: &mut Machine) -> Result<(), Fault> {
    m.push(Value::Bool(true))
}

pub(super) fn push_false(m: &mut Machine) -> Result<(), Fault> {
    m.push(Value::Bool(false))
}

pub(super) fn pop(m: &mut Machine) -> Result<(), Fault> {
    m.pop().map(drop)
}

pub(super) fn dup(m: &mut Machine) -> Result<(), Fault> {
    let top = m.peek(0)?.clone();
    m.push(top)
}

pub(super) fn swap(m: &mut Machine) -> Result<(), Fault> {
    let b = m.pop()?;
    let a = m.pop()?;
    m.push(b)?;
    m.push(a)
}

pub(super) fn nop(_: &mut Machine) -> Result<(), Fault> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::super::test_support::machine_with;
    use super::*;

    #[test]
    fn test_dup_and_swap() {
        let mut m = machine_with(vec![Value::Int(1), Value::Int(2)]);
        swap(&mut m).unwrap();
        dup(&mut m).unwrap();
        assert_eq!(m.pop_n(3).unwrap(), vec![Value::Int(2), Value::Int(1), Value::Int(1)]);
    }

    #[test]
    fn test_pop_on_empty_segment_faults() {
        let mut m = machine_with(vec![]);
        assert_eq!(pop(&mut m), Err(Fault::StackUnderflow));
        assert_eq!(swap(&mut m), Err(Fault::StackUnderflow));
    }
}
