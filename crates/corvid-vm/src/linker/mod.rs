// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Linking unlinked modules into a [`Program`].
//!
//! The first pass registers every type and every function signature, so the
//! second pass can resolve any reference regardless of declaration order.
//! The first error aborts linking.

mod context;

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::debug;

pub use context::{CallSite, CallTarget, LinkContext};
use context::{FunctionTable, TypeTable};

use crate::error::LinkError;
use crate::loader::{OpKind, Owner, UnlinkedModule};
use crate::runtime::{
    FuncRef, Function, FunctionBuilder, FunctionId, Module, Op, Program, Scope, Signature, Type,
};
use crate::vm::{Machine, ops};

/// Name used for the synthetic bootstrap function.
pub const BOOTSTRAP_NAME: &str = "<bootstrap>";

/// Links all loaded modules.
pub fn link(modules: &[UnlinkedModule]) -> Result<Program, LinkError> {
    let mut linked: BTreeMap<String, Module> = modules
        .iter()
        .map(|m| (m.name.clone(), Module::new(m.name.as_str())))
        .collect();

    let mut types = TypeTable::default();
    for module in modules {
        for decl in &module.types {
            let ty = Arc::new(Type::new(
                module.name.as_str(),
                decl.name.as_str(),
                decl.fields.clone(),
            ));
            types.insert((module.name.clone(), decl.name.clone()), ty.clone());
            if let Some(target) = linked.get_mut(&module.name) {
                target.add_type(ty);
            }
        }
    }

    let mut functions = FunctionTable::default();
    let mut order = Vec::new();
    for module in modules {
        for decl in &module.functions {
            let id = decl.id(&module.name);
            let owner = match &decl.owner {
                Owner::Module => None,
                Owner::Type { module: owner, name } => {
                    let owner_module = owner.as_deref().unwrap_or(&module.name);
                    let key = (owner_module.to_string(), name.clone());
                    let ty = types.get(&key).cloned().ok_or_else(|| {
                        LinkError::signature(
                            id.clone(),
                            format!("unknown owner type {}:{}", owner_module, name),
                        )
                    })?;
                    Some(ty)
                }
            };
            if id.is_constructor() {
                return Err(LinkError::signature(
                    id,
                    "constructors are implicit and cannot be declared",
                ));
            }
            let func = FuncRef(order.len());
            let signature = Signature {
                n_args: decl.n_args,
                has_return: decl.has_return,
                n_vars: decl.n_vars(),
                owner,
            };
            if functions.insert(id.clone(), (func, signature)).is_some() {
                return Err(LinkError::signature(id, "function declared more than once"));
            }
            if let Some(target) = linked.get_mut(&module.name) {
                target.add_function(id.clone(), func);
            }
            order.push((module, decl, id));
        }
    }

    let mut arena = Vec::with_capacity(order.len());
    for (module, decl, id) in order {
        let ctx = LinkContext {
            module: &module.name,
            function: decl,
            types: &types,
            functions: &functions,
        };
        let signature = functions[&id].1.clone();
        let mut builder = FunctionBuilder::new(id.clone(), signature);
        for (index, op) in decl.ops.iter().enumerate() {
            let exec = match &op.kind {
                OpKind::Label(name) => ops::label_op(name),
                OpKind::Var(access, slot) => ops::var_op(*access, *slot),
                OpKind::Deferred { opcode, args } => {
                    let entry = ops::lookup(opcode).ok_or_else(|| {
                        LinkError::at(id.clone(), index, format!("unknown opcode {}", opcode))
                    })?;
                    if args.len() != entry.arity {
                        return Err(LinkError::at(
                            id.clone(),
                            index,
                            format!(
                                "{} takes {} argument(s), got {}",
                                opcode,
                                entry.arity,
                                args.len()
                            ),
                        ));
                    }
                    entry
                        .instantiate(&ctx, args)
                        .map_err(|message| LinkError::at(id.clone(), index, message))?
                }
            };
            builder.push(Op::new(op.text.as_str(), op.loc, exec));
        }
        arena.push(builder.build());
    }

    debug!(
        modules = linked.len(),
        types = types.len(),
        functions = arena.len(),
        "linked program"
    );
    Ok(Program::new(linked, arena))
}

/// The synthetic function whose only instruction calls `entry`.
pub fn bootstrap(program: &Program, entry: FuncRef) -> Function {
    let main = program.function(entry);
    let site = CallSite::new(entry, main.signature());
    let id = FunctionId::new(Scope::module(BOOTSTRAP_NAME), BOOTSTRAP_NAME);
    let signature = Signature {
        n_args: 0,
        has_return: true,
        n_vars: 0,
        owner: None,
    };
    let mut builder = FunctionBuilder::new(id, signature);
    builder.push(Op::new(
        format!("CALL {}", main.id()),
        None,
        Box::new(move |m: &mut Machine| ops::invoke(m, &site)),
    ));
    builder.build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::load;

    fn link_one(text: &str) -> Result<Program, LinkError> {
        link(&[load("app", text).unwrap()])
    }

    #[test]
    fn test_links_labels_and_calls() {
        let program = link_one(
            "corvid 1
FUNC - main 1 1 0
  LABEL top
  CALL helper
  JUMP_IF done
  JUMP top
  LABEL done
  RET

FUNC - helper 0 1 0
  PUSH_TRUE
  RET
",
        )
        .unwrap();
        assert_eq!(program.function_count(), 2);
        let main = program.entry("app").unwrap();
        assert_eq!(program.function(main).ops().len(), 6);
        assert_eq!(program.function(main).ops()[1].text(), "CALL helper");
    }

    #[test]
    fn test_forward_references_across_modules() {
        let a = load(
            "a",
            "corvid 1\nFUNC - main 1 1 0\n  CALL b:Point.Point\n  GET_FIELD b:Point.x\n  RET\n",
        )
        .unwrap();
        let b = load("b", "corvid 1\nTYPE Point x\n").unwrap();
        let program = link(&[a, b]).unwrap();
        assert!(program.module("b").unwrap().get_type("Point").is_some());
    }

    #[test]
    fn test_link_errors() {
        let cases = [
            ("  JUMP nowhere", "label not found: nowhere"),
            ("  JUMP 9", "out of range"),
            ("  CALL missing", "unknown function app::missing"),
            ("  CALL Ghost.Ghost", "unknown type app:Ghost"),
            ("  GET_FIELD Ghost.x", "unknown type"),
            ("  FROB", "unknown opcode FROB"),
            ("  PUSH_INT", "takes 1 argument(s), got 0"),
            ("  PUSH_INT many", "invalid integer literal"),
            ("  MATCH \"(\"", "invalid pattern"),
        ];
        for (body, expected) in cases {
            let text = format!("corvid 1\nFUNC - main 1 1 0\n{}\n  RET\n", body);
            let err = link_one(&text).unwrap_err();
            assert_eq!(err.index, Some(0), "{}", body);
            assert!(err.message.contains(expected), "{} -> {}", body, err);
        }
    }

    #[test]
    fn test_signature_errors() {
        let err = link_one("corvid 1\nFUNC Ghost f 0 0 0\n  RET\n").unwrap_err();
        assert_eq!(err.index, None);
        assert!(err.message.contains("unknown owner type app:Ghost"));

        let err = link_one("corvid 1\nTYPE P a\nFUNC P P 1 1 0\n  RET\n").unwrap_err();
        assert!(err.message.contains("constructors are implicit"));
    }

    #[test]
    fn test_fields_resolve_to_slots() {
        let program = link_one(
            "corvid 1\nTYPE P a b\nFUNC P get_b 0 1 0\n  PUSH_VAR 0\n  GET_FIELD P.b\n  RET\n",
        )
        .unwrap();
        let id: FunctionId = "app::P.get_b".parse().unwrap();
        let func = program.lookup(&id).unwrap();
        assert_eq!(program.function(func).signature().effective_args(), 1);
    }

    #[test]
    fn test_field_errors() {
        let err = link_one("corvid 1\nTYPE P a\nFUNC - main 1 1 0\n  GET_FIELD P.z\n").unwrap_err();
        assert!(err.message.contains("has no field 'z'"));
        let err = link_one("corvid 1\nTYPE P a\nFUNC - main 1 1 0\n  SET_FIELD P\n").unwrap_err();
        assert!(err.message.contains("expected Type.field"));
    }

    #[test]
    fn test_bootstrap_calls_entry() {
        let program = link_one("corvid 1\nFUNC - main 1 1 0\n  PUSH_INT 0\n  RET\n").unwrap();
        let entry = program.entry("app").unwrap();
        let boot = bootstrap(&program, entry);
        assert_eq!(boot.ops().len(), 1);
        assert_eq!(boot.ops()[0].text(), "CALL app::main");
        assert_eq!(boot.id().name, BOOTSTRAP_NAME);
    }
}
