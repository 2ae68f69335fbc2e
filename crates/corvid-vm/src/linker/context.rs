// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Symbol resolution for one function body.

use std::sync::Arc;

use regex::Regex;
use rustc_hash::FxHashMap;

use crate::loader::UnlinkedFunction;
use crate::runtime::{FuncRef, FunctionId, Scope, Signature, Type};

/// Types by `(module, name)`.
pub(crate) type TypeTable = FxHashMap<(String, String), Arc<Type>>;

/// Function handles and signatures by identifier.
pub(crate) type FunctionTable = FxHashMap<FunctionId, (FuncRef, Signature)>;

/// A resolved call to a function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallSite {
    /// Callee
    pub function: FuncRef,
    /// Declared argument count, receiver excluded
    pub n_args: usize,
    /// Whether the callee returns a value
    pub has_return: bool,
    /// Extra variable slots the callee needs
    pub n_vars: usize,
    /// Receiver type, for methods
    pub owner: Option<Arc<Type>>,
}

impl CallSite {
    /// A call to `function` with the given signature.
    pub fn new(function: FuncRef, signature: &Signature) -> Self {
        Self {
            function,
            n_args: signature.n_args,
            has_return: signature.has_return,
            n_vars: signature.n_vars,
            owner: signature.owner.clone(),
        }
    }

    /// Values taken from the caller's stack, receiver included.
    pub fn effective_args(&self) -> usize {
        self.n_args + usize::from(self.owner.is_some())
    }
}

/// What a `CALL` argument refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallTarget {
    /// `Type.Type`: build a record
    Construct(Arc<Type>),
    /// An ordinary function or method
    Invoke(CallSite),
}

/// Everything an opcode builder may resolve against.
pub struct LinkContext<'a> {
    pub(crate) module: &'a str,
    pub(crate) function: &'a UnlinkedFunction,
    pub(crate) types: &'a TypeTable,
    pub(crate) functions: &'a FunctionTable,
}

impl<'a> LinkContext<'a> {
    /// Module the function is declared in.
    pub fn module(&self) -> &str {
        self.module
    }

    /// A label of this function, or an absolute instruction index.
    pub fn jump_target(&self, target: &str) -> Result<usize, String> {
        if let Some(&index) = self.function.labels.get(target) {
            return Ok(index);
        }
        match target.parse::<usize>() {
            Ok(index) if index < self.function.ops.len() => Ok(index),
            Ok(index) => Err(format!(
                "jump target {} out of range ({} instructions)",
                index,
                self.function.ops.len()
            )),
            Err(_) => Err(format!("label not found: {}", target)),
        }
    }

    /// An integer literal.
    pub fn parse_int(&self, literal: &str) -> Result<i64, String> {
        literal
            .parse()
            .map_err(|_| format!("invalid integer literal '{}'", literal))
    }

    /// A pattern, anchored at the start of the input.
    pub fn compile_regex(&self, pattern: &str) -> Result<Regex, String> {
        Regex::new(&format!("^(?:{})", pattern)).map_err(|e| format!("invalid pattern: {}", e))
    }

    /// Splits an optional `module:` prefix.
    fn qualified<'s>(&'s self, reference: &'s str) -> (&'s str, &'s str) {
        reference.split_once(':').unwrap_or((self.module, reference))
    }

    fn lookup_type(&self, module: &str, name: &str) -> Result<Arc<Type>, String> {
        self.types
            .get(&(module.to_string(), name.to_string()))
            .cloned()
            .ok_or_else(|| format!("unknown type {}:{}", module, name))
    }

    /// `Type` or `module:Type`.
    pub fn resolve_type(&self, reference: &str) -> Result<Arc<Type>, String> {
        let (module, name) = self.qualified(reference);
        self.lookup_type(module, name)
    }

    /// `Type.field` or `module:Type.field`, as a type and slot index.
    pub fn resolve_field(&self, reference: &str) -> Result<(Arc<Type>, usize), String> {
        let (module, rest) = self.qualified(reference);
        let (type_name, field) = rest
            .split_once('.')
            .ok_or_else(|| format!("expected Type.field, got '{}'", reference))?;
        let ty = self.lookup_type(module, type_name)?;
        let slot = ty
            .field_index(field)
            .ok_or_else(|| format!("type {} has no field '{}'", ty, field))?;
        Ok((ty, slot))
    }

    /// `name`, `module:name`, `Type.name` or `module:Type.name`.
    ///
    /// `Type.Type` names the implicit constructor.
    pub fn resolve_call(&self, reference: &str) -> Result<CallTarget, String> {
        let (module, rest) = self.qualified(reference);
        let id = match rest.split_once('.') {
            Some((type_name, name)) if type_name == name => {
                return self.lookup_type(module, type_name).map(CallTarget::Construct);
            }
            Some((type_name, name)) => FunctionId::new(Scope::method(module, type_name), name),
            None => FunctionId::new(Scope::module(module), rest),
        };
        let (func, signature) = self
            .functions
            .get(&id)
            .ok_or_else(|| format!("unknown function {}", id))?;
        Ok(CallTarget::Invoke(CallSite::new(*func, signature)))
    }
}
