// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Checked integer arithmetic and comparisons.

use corvid_macros::ensure;

use crate::error::Fault;
use crate::runtime::Value;
use crate::vm::Machine;

fn operands(m: &mut Machine) -> Result<(i64, i64), Fault> {
    let b = m.pop()?.as_int()?;
    let a = m.pop()?.as_int()?;
    Ok((a, b))
}

fn checked(m: &mut Machine, op: fn(i64, i64) -> Option<i64>) -> Result<(), Fault> {
    let (a, b) = operands(m)?;
    let result = op(a, b).ok_or(Fault::Overflow)?;
    m.push(Value::Int(result))
}

fn compare(m: &mut Machine, op: fn(&i64, &i64) -> bool) -> Result<(), Fault> {
    let (a, b) = operands(m)?;
    m.push(Value::Bool(op(&a, &b)))
}

pub(super) fn add(m: &mut Machine) -> Result<(), Fault> {
    checked(m, i64::checked_add)
}

pub(super) fn sub(m: &mut Machine) -> Result<(), Fault> {
    checked(m, i64::checked_sub)
}

pub(super) fn mul(m: &mut Machine) -> Result<(), Fault> {
    checked(m, i64::checked_mul)
}

pub(super) fn div(m: &mut Machine) -> Result<(), Fault> {
    let (a, b) = operands(m)?;
    ensure!(b != 0, Fault::DivisionByZero);
    m.push(Value::Int(a.checked_div(b).ok_or(Fault::Overflow)?))
}

pub(super) fn rem(m: &mut Machine) -> Result<(), Fault> {
    let (a, b) = operands(m)?;
    ensure!(b != 0, Fault::DivisionByZero);
    m.push(Value::Int(a.checked_rem(b).ok_or(Fault::Overflow)?))
}

pub(super) fn neg(m: &mut Machine) -> Result<(), Fault> {
    let a = m.pop()?.as_int()?;
    m.push(Value::Int(a.checked_neg().ok_or(Fault::Overflow)?))
}

pub(super) fn lt(m: &mut Machine) -> Result<(), Fault> {
    compare(m, i64::lt)
}

pub(super) fn le(m: &mut Machine) -> Result<(), Fault> {
    compare(m, i64::le)
}

pub(super) fn gt(m: &mut Machine) -> Result<(), Fault> {
    compare(m, i64::gt)
}

pub(super) fn ge(m: &mut Machine) -> Result<(), Fault> {
    compare(m, i64::ge)
}

#[cfg(test)]
mod tests {
    use super::super::test_support::machine_with;
    use super::*;

    fn run(op: fn(&mut Machine) -> Result<(), Fault>, a: i64, b: i64) -> Result<Value, Fault> {
        let mut m = machine_with(vec![Value::Int(a), Value::Int(b)]);
        op(&mut m)?;
        m.pop()
    }

    #[test]
    fn test_operand_order() {
        assert_eq!(run(sub, 10, 3), Ok(Value::Int(7)));
        assert_eq!(run(div, 10, 3), Ok(Value::Int(3)));
        assert_eq!(run(rem, -7, 3), Ok(Value::Int(-1)));
        assert_eq!(run(lt, 1, 2), Ok(Value::Bool(true)));
        assert_eq!(run(ge, 1, 2), Ok(Value::Bool(false)));
    }

    #[test]
    fn test_overflow_and_division_faults() {
        assert_eq!(run(add, i64::MAX, 1), Err(Fault::Overflow));
        assert_eq!(run(mul, i64::MIN, -1), Err(Fault::Overflow));
        assert_eq!(run(div, 1, 0), Err(Fault::DivisionByZero));
        assert_eq!(run(rem, 1, 0), Err(Fault::DivisionByZero));
        assert_eq!(run(div, i64::MIN, -1), Err(Fault::Overflow));

        let mut m = machine_with(vec![Value::Int(i64::MIN)]);
        assert_eq!(neg(&mut m), Err(Fault::Overflow));
    }

    #[test]
    fn test_type_mismatch_is_not_coerced() {
        let mut m = machine_with(vec![Value::Int(1), Value::str("2")]);
        assert_eq!(
            add(&mut m),
            Err(Fault::TypeMismatch { expected: "int", found: "string" })
        );
    }
}
