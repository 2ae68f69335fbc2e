// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Jumps, calls and returns.

use std::sync::Arc;

use crate::error::Fault;
use crate::linker::{CallSite, CallTarget, LinkContext};
use crate::runtime::{OpFn, PcMove, Type, Value};
use crate::vm::Machine;

pub(super) fn jump(ctx: &LinkContext<'_>, args: &[String]) -> Result<OpFn, String> {
    let target = ctx.jump_target(&args[0])?;
    Ok(Box::new(move |_: &mut Machine| Ok(PcMove::Jump(target))))
}

pub(super) fn jump_if(ctx: &LinkContext<'_>, args: &[String]) -> Result<OpFn, String> {
    conditional(ctx, &args[0], true)
}

pub(super) fn jump_unless(ctx: &LinkContext<'_>, args: &[String]) -> Result<OpFn, String> {
    conditional(ctx, &args[0], false)
}

fn conditional(ctx: &LinkContext<'_>, label: &str, when: bool) -> Result<OpFn, String> {
    let target = ctx.jump_target(label)?;
    Ok(Box::new(move |m: &mut Machine| {
        if m.pop()?.as_bool()? == when {
            Ok(PcMove::Jump(target))
        } else {
            Ok(PcMove::Next)
        }
    }))
}

pub(super) fn call(ctx: &LinkContext<'_>, args: &[String]) -> Result<OpFn, String> {
    match ctx.resolve_call(&args[0])? {
        CallTarget::Construct(ty) => Ok(Box::new(move |m: &mut Machine| {
            construct(m, &ty)?;
            Ok(PcMove::Next)
        })),
        CallTarget::Invoke(site) => Ok(Box::new(move |m: &mut Machine| invoke(m, &site))),
    }
}

/// Pops one value per field, last field on top, and pushes the record.
pub(crate) fn construct(m: &mut Machine, ty: &Arc<Type>) -> Result<(), Fault> {
    let expected = ty.field_count();
    let available = m.local_len();
    if available < expected {
        return Err(Fault::RecordArity {
            ty: ty.to_string(),
            expected,
            found: available,
        });
    }
    let fields = m.pop_n(expected)?;
    m.push(Value::record(ty.clone(), fields)?)
}

/// Opens the callee's frame and enters it.
///
/// Methods take their receiver below the declared arguments; it must be a
/// record of exactly the owning type.
pub(crate) fn invoke(m: &mut Machine, site: &CallSite) -> Result<PcMove, Fault> {
    if let Some(owner) = &site.owner {
        m.peek(site.n_args)?.as_record_of(owner)?;
    }
    let here = m.pc();
    m.set_pc(here.advanced());
    if let Err(fault) = m.open_frame(site.effective_args(), site.has_return, site.n_vars) {
        m.set_pc(here);
        return Err(fault);
    }
    Ok(PcMove::Enter(site.function))
}

pub(super) fn ret(m: &mut Machine) -> Result<PcMove, Fault> {
    m.close_frame()?;
    Ok(PcMove::Stay)
}

pub(super) fn fail(_: &LinkContext<'_>, args: &[String]) -> Result<OpFn, String> {
    let message = args[0].clone();
    Ok(Box::new(move |_: &mut Machine| Err(Fault::Failed(message.clone()))))
}

#[cfg(test)]
mod tests {
    use super::super::test_support::machine_with;
    use super::*;
    use crate::runtime::FuncRef;
    use crate::vm::ProgramCounter;

    fn point() -> Arc<Type> {
        Arc::new(Type::new("geo", "Point", vec!["x".into(), "y".into()]))
    }

    #[test]
    fn test_construct_keeps_field_order() {
        let mut m = machine_with(vec![Value::Int(1), Value::Int(2)]);
        construct(&mut m, &point()).unwrap();
        let record = m.pop().unwrap();
        let record = record.as_record().unwrap();
        assert_eq!(record.fields(), vec![Value::Int(1), Value::Int(2)]);
    }

    #[test]
    fn test_construct_with_too_few_values_faults() {
        let mut m = machine_with(vec![Value::Int(1)]);
        assert_eq!(
            construct(&mut m, &point()),
            Err(Fault::RecordArity { ty: "geo:Point".into(), expected: 2, found: 1 })
        );
    }

    #[test]
    fn test_invoke_saves_resume_position() {
        let mut m = machine_with(vec![Value::Int(7)]);
        m.set_pc(ProgramCounter::new(FuncRef(0), 3));
        let site = CallSite {
            function: FuncRef(1),
            n_args: 1,
            has_return: true,
            n_vars: 0,
            owner: None,
        };
        assert_eq!(invoke(&mut m, &site), Ok(PcMove::Enter(FuncRef(1))));
        assert_eq!(m.depth(), 1);

        m.push_var(0).unwrap();
        assert_eq!(ret(&mut m), Ok(PcMove::Stay));
        assert_eq!(m.pc(), ProgramCounter::new(FuncRef(0), 4));
        assert_eq!(m.pop().unwrap(), Value::Int(7));
    }

    #[test]
    fn test_invoke_checks_receiver_type() {
        let line = Arc::new(Type::new("geo", "Line", vec![]));
        let mut m = machine_with(vec![Value::Int(0)]);
        m.set_pc(ProgramCounter::new(FuncRef(0), 3));
        let site = CallSite {
            function: FuncRef(1),
            n_args: 0,
            has_return: false,
            n_vars: 0,
            owner: Some(line),
        };
        assert!(matches!(invoke(&mut m, &site), Err(Fault::WrongRecordType { .. })));
        assert_eq!(m.pc(), ProgramCounter::new(FuncRef(0), 3));
        assert_eq!(m.depth(), 0);
    }
}
