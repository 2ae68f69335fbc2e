// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Types, modules and the linked program.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use rustc_hash::FxHashMap;

use super::function::{FuncRef, Function, FunctionId, Scope};
use crate::error::Error;

/// A user-defined record type.
///
/// Types compare by `(module, name, fields)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Type {
    module: String,
    name: String,
    fields: Vec<String>,
}

impl Type {
    /// Creates a type with an ordered field list.
    pub fn new(module: impl Into<String>, name: impl Into<String>, fields: Vec<String>) -> Self {
        Self {
            module: module.into(),
            name: name.into(),
            fields,
        }
    }

    /// Declaring module.
    pub fn module(&self) -> &str {
        &self.module
    }

    /// Type name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Field names in slot order.
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// Number of fields (the arity of the implicit constructor).
    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    /// Slot index of a field.
    pub fn field_index(&self, field: &str) -> Option<usize> {
        self.fields.iter().position(|f| f == field)
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.module, self.name)
    }
}

/// A linked module: its types and the handles of its functions.
#[derive(Debug, Default)]
pub struct Module {
    name: String,
    types: BTreeMap<String, Arc<Type>>,
    functions: BTreeMap<FunctionId, FuncRef>,
}

impl Module {
    pub(crate) fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub(crate) fn add_type(&mut self, ty: Arc<Type>) {
        self.types.insert(ty.name().to_string(), ty);
    }

    pub(crate) fn add_function(&mut self, id: FunctionId, func: FuncRef) {
        self.functions.insert(id, func);
    }

    /// Module name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Type declared in this module.
    pub fn get_type(&self, name: &str) -> Option<&Arc<Type>> {
        self.types.get(name)
    }

    /// All types, ordered by name.
    pub fn types(&self) -> impl Iterator<Item = &Arc<Type>> {
        self.types.values()
    }

    /// All functions, ordered by identifier.
    pub fn functions(&self) -> impl Iterator<Item = (&FunctionId, FuncRef)> {
        self.functions.iter().map(|(id, f)| (id, *f))
    }
}

/// A fully linked program.
///
/// Functions live in an arena addressed by [`FuncRef`]; modules map
/// identifiers to those handles.
#[derive(Debug, Default)]
pub struct Program {
    modules: BTreeMap<String, Module>,
    functions: Vec<Function>,
    index: FxHashMap<FunctionId, FuncRef>,
}

impl Program {
    pub(crate) fn new(modules: BTreeMap<String, Module>, functions: Vec<Function>) -> Self {
        let index = functions
            .iter()
            .enumerate()
            .map(|(i, f)| (f.id().clone(), FuncRef(i)))
            .collect();
        Self {
            modules,
            functions,
            index,
        }
    }

    /// Module by name.
    pub fn module(&self, name: &str) -> Option<&Module> {
        self.modules.get(name)
    }

    /// All modules, ordered by name.
    pub fn modules(&self) -> impl Iterator<Item = &Module> {
        self.modules.values()
    }

    /// Function behind a handle.
    ///
    /// # Panics
    ///
    /// Panics if the handle does not come from this program.
    pub fn function(&self, func: FuncRef) -> &Function {
        &self.functions[func.0]
    }

    /// Function behind a handle, if it belongs to this program.
    pub fn get_function(&self, func: FuncRef) -> Option<&Function> {
        self.functions.get(func.0)
    }

    /// Handle of a function by identifier.
    pub fn lookup(&self, id: &FunctionId) -> Option<FuncRef> {
        self.index.get(id).copied()
    }

    /// All functions with their handles, in arena order.
    pub fn functions(&self) -> impl Iterator<Item = (FuncRef, &Function)> {
        self.functions
            .iter()
            .enumerate()
            .map(|(i, f)| (FuncRef(i), f))
    }

    /// Number of linked functions.
    pub fn function_count(&self) -> usize {
        self.functions.len()
    }

    /// Resolves and validates the `main` function of a module.
    ///
    /// `main` must be module-level, take exactly one argument and return a
    /// value.
    pub fn entry(&self, module: &str) -> Result<FuncRef, Error> {
        let id = FunctionId::new(Scope::module(module), "main");
        let func = self
            .lookup(&id)
            .ok_or_else(|| Error::BadEntry(format!("{} is not defined", id)))?;
        let main = self.function(func);
        if main.n_args() != 1 || !main.has_return() {
            return Err(Error::BadEntry(format!(
                "{} must take 1 argument and return a value (takes {}, returns {})",
                id,
                main.n_args(),
                usize::from(main.has_return())
            )));
        }
        Ok(func)
    }
}
