// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! String and string-builder operations.
//!
//! Lengths and indices count Unicode scalar values, not bytes.

use std::cmp::Ordering;

use crate::error::Fault;
use crate::runtime::Value;
use crate::vm::Machine;

fn index(i: i64, len: usize) -> Result<usize, Fault> {
    usize::try_from(i)
        .ok()
        .filter(|&i| i < len)
        .ok_or(Fault::IndexOutOfRange { index: i, len })
}

fn bound(i: i64, len: usize) -> Result<usize, Fault> {
    usize::try_from(i)
        .ok()
        .filter(|&i| i <= len)
        .ok_or(Fault::IndexOutOfRange { index: i, len })
}

pub(super) fn len(m: &mut Machine) -> Result<(), Fault> {
    let s = m.pop()?;
    let n = s.as_str()?.chars().count();
    m.push(Value::Int(n as i64))
}

pub(super) fn concat(m: &mut Machine) -> Result<(), Fault> {
    let b = m.pop()?;
    let a = m.pop()?;
    let mut joined = String::with_capacity(a.as_str()?.len() + b.as_str()?.len());
    joined.push_str(a.as_str()?);
    joined.push_str(b.as_str()?);
    m.push(Value::from(joined))
}

/// `s start end STR_SLICE` pushes the characters in `start..end`.
pub(super) fn slice(m: &mut Machine) -> Result<(), Fault> {
    let end = m.pop()?.as_int()?;
    let start = m.pop()?.as_int()?;
    let s = m.pop()?;
    let s = s.as_str()?;
    let count = s.chars().count();
    let end = bound(end, count)?;
    let start = bound(start, end)?;
    let part: String = s.chars().skip(start).take(end - start).collect();
    m.push(Value::from(part))
}

/// `s i STR_CHAR` pushes the one-character string at `i`.
pub(super) fn char_at(m: &mut Machine) -> Result<(), Fault> {
    let i = m.pop()?.as_int()?;
    let s = m.pop()?;
    let s = s.as_str()?;
    let count = s.chars().count();
    let i = index(i, count)?;
    let c = s.chars().nth(i).ok_or(Fault::IndexOutOfRange {
        index: i as i64,
        len: count,
    })?;
    m.push(Value::from(c.to_string()))
}

/// Pushes -1, 0 or 1.
pub(super) fn compare(m: &mut Machine) -> Result<(), Fault> {
    let b = m.pop()?;
    let a = m.pop()?;
    let order = match a.as_str()?.cmp(b.as_str()?) {
        Ordering::Less => -1,
        Ordering::Equal => 0,
        Ordering::Greater => 1,
    };
    m.push(Value::Int(order))
}

pub(super) fn int_to_str(m: &mut Machine) -> Result<(), Fault> {
    let n = m.pop()?.as_int()?;
    m.push(Value::from(n.to_string()))
}

/// Pushes the parsed integer, or `false` when the string is not one.
pub(super) fn str_to_int(m: &mut Machine) -> Result<(), Fault> {
    let s = m.pop()?;
    let parsed = s.as_str()?.parse::<i64>();
    m.push(match parsed {
        Ok(n) => Value::Int(n),
        Err(_) => Value::Bool(false),
    })
}

pub(super) fn builder_new(m: &mut Machine) -> Result<(), Fault> {
    m.push(Value::builder())
}

/// `builder value BUILDER_APPEND` appends the value's text and leaves the
/// builder on the stack.
pub(super) fn builder_append(m: &mut Machine) -> Result<(), Fault> {
    let value = m.pop()?;
    let builder = m.peek(0)?.as_builder()?.clone();
    let text = value.to_string();
    builder.lock().push_str(&text);
    Ok(())
}

pub(super) fn builder_str(m: &mut Machine) -> Result<(), Fault> {
    let builder = m.pop()?;
    let text = builder.as_builder()?.lock().clone();
    m.push(Value::from(text))
}
