// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Fixed-size arrays.

use crate::error::Fault;
use crate::runtime::Value;
use crate::vm::Machine;

/// Largest array `ARRAY_NEW` allocates.
pub const MAX_ARRAY_LEN: usize = 1 << 24;

fn slot(i: i64, len: usize) -> Result<usize, Fault> {
    usize::try_from(i)
        .ok()
        .filter(|&i| i < len)
        .ok_or(Fault::IndexOutOfRange { index: i, len })
}

/// `size fill ARRAY_NEW`
pub(super) fn new(m: &mut Machine) -> Result<(), Fault> {
    let fill = m.pop()?;
    let size = m.pop()?.as_int()?;
    let invalid = Fault::InvalidArraySize {
        size,
        max: MAX_ARRAY_LEN,
    };
    let len = match usize::try_from(size) {
        Ok(len) if len <= MAX_ARRAY_LEN => len,
        _ => return Err(invalid),
    };
    let mut elements = Vec::new();
    elements.try_reserve_exact(len).map_err(|_| invalid)?;
    elements.resize(len, fill);
    m.push(Value::array(elements))
}

/// `array index ARRAY_GET`
pub(super) fn get(m: &mut Machine) -> Result<(), Fault> {
    let i = m.pop()?.as_int()?;
    let array = m.pop()?;
    let element = {
        let elements = array.as_array()?.lock();
        elements[slot(i, elements.len())?].clone()
    };
    m.push(element)
}

/// `array index value ARRAY_SET`
pub(super) fn set(m: &mut Machine) -> Result<(), Fault> {
    let value = m.pop()?;
    let i = m.pop()?.as_int()?;
    let array = m.pop()?;
    let mut elements = array.as_array()?.lock();
    let i = slot(i, elements.len())?;
    elements[i] = value;
    Ok(())
}

pub(super) fn len(m: &mut Machine) -> Result<(), Fault> {
    let array = m.pop()?;
    let n = array.as_array()?.lock().len();
    m.push(Value::Int(n as i64))
}
