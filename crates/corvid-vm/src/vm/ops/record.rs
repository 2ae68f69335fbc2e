// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Record field access and type tests.

use crate::linker::LinkContext;
use crate::runtime::{OpFn, PcMove, Value};
use crate::vm::Machine;

/// `record GET_FIELD T.f`
pub(super) fn get_field(ctx: &LinkContext<'_>, args: &[String]) -> Result<OpFn, String> {
    let (ty, slot) = ctx.resolve_field(&args[0])?;
    Ok(Box::new(move |m: &mut Machine| {
        let record = m.pop()?;
        let value = record.as_record_of(&ty)?.get(slot)?;
        m.push(value)?;
        Ok(PcMove::Next)
    }))
}

/// `record value SET_FIELD T.f`
pub(super) fn set_field(ctx: &LinkContext<'_>, args: &[String]) -> Result<OpFn, String> {
    let (ty, slot) = ctx.resolve_field(&args[0])?;
    Ok(Box::new(move |m: &mut Machine| {
        let value = m.pop()?;
        let record = m.pop()?;
        record.as_record_of(&ty)?.set(slot, value)?;
        Ok(PcMove::Next)
    }))
}

/// `value IS_TYPE T` pushes whether the value is a record of `T`.
pub(super) fn is_type(ctx: &LinkContext<'_>, args: &[String]) -> Result<OpFn, String> {
    let ty = ctx.resolve_type(&args[0])?;
    Ok(Box::new(move |m: &mut Machine| {
        let value = m.pop()?;
        let matches = value.as_record_of(&ty).is_ok();
        m.push(Value::Bool(matches))?;
        Ok(PcMove::Next)
    }))
}
