// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Declaration and body parsing.

use rustc_hash::{FxHashMap, FxHashSet};
use tracing::debug;

use super::tokenizer::{Token, tokenize};
use super::unlinked::{OpKind, Owner, UnlinkedFunction, UnlinkedModule, UnlinkedOp, UnlinkedType};
use crate::error::LoadError;
use crate::runtime::{FunctionId, SourceLoc};
use crate::vm::VarAccess;

/// First line of every module.
pub const HEADER: &str = "corvid 1";

/// Parses the text of one module.
pub fn load(module: &str, text: &str) -> Result<UnlinkedModule, LoadError> {
    Parser::new(module).parse(text)
}

struct Parser {
    module: UnlinkedModule,
    current: Option<UnlinkedFunction>,
    type_names: FxHashSet<String>,
    function_ids: FxHashSet<FunctionId>,
}

impl Parser {
    fn new(name: &str) -> Self {
        Self {
            module: UnlinkedModule {
                name: name.to_string(),
                ..UnlinkedModule::default()
            },
            current: None,
            type_names: FxHashSet::default(),
            function_ids: FxHashSet::default(),
        }
    }

    fn error(&self, line: usize, message: impl Into<String>) -> LoadError {
        LoadError::new(self.module.name.as_str(), line, message)
    }

    fn parse(mut self, text: &str) -> Result<UnlinkedModule, LoadError> {
        let mut lines = text.lines().enumerate().map(|(i, line)| (i + 1, line));

        match lines.next() {
            Some((_, first)) if first.trim() == HEADER => {}
            _ => return Err(self.error(1, format!("missing '{}' header", HEADER))),
        }

        for (number, line) in lines {
            if line.trim().is_empty() {
                self.finish_function();
                continue;
            }
            let tokens = tokenize(line).map_err(|e| self.error(number, e))?;
            if tokens.is_empty() {
                continue;
            }
            if self.current.is_some() {
                self.body_line(number, tokens)?;
            } else {
                self.declaration(number, tokens)?;
            }
        }
        self.finish_function();

        debug!(
            module = %self.module.name,
            types = self.module.types.len(),
            functions = self.module.functions.len(),
            "loaded module"
        );
        Ok(self.module)
    }

    fn finish_function(&mut self) {
        if let Some(function) = self.current.take() {
            self.module.functions.push(function);
        }
    }

    fn declaration(&mut self, line: usize, tokens: Vec<Token>) -> Result<(), LoadError> {
        let keyword = bare(&tokens[0]).ok_or_else(|| self.error(line, "declaration expected"))?;
        match keyword {
            "TYPE" => self.type_decl(line, &tokens[1..]),
            "FUNC" => self.func_decl(line, &tokens[1..]),
            other => Err(self.error(line, format!("unknown declaration '{}'", other))),
        }
    }

    fn type_decl(&mut self, line: usize, args: &[Token]) -> Result<(), LoadError> {
        let Some((name, fields)) = args.split_first() else {
            return Err(self.error(line, "TYPE needs a name"));
        };
        let name = self.ident(line, name, "type name")?;
        if !self.type_names.insert(name.clone()) {
            return Err(self.error(line, format!("type '{}' declared twice", name)));
        }

        let mut seen = FxHashSet::default();
        let mut names = Vec::with_capacity(fields.len());
        for field in fields {
            let field = self.ident(line, field, "field name")?;
            if !seen.insert(field.clone()) {
                return Err(self.error(line, format!("duplicate field '{}' in type {}", field, name)));
            }
            names.push(field);
        }

        self.module.types.push(UnlinkedType {
            name,
            fields: names,
            line,
        });
        Ok(())
    }

    /// `FUNC <owner|-> <name> <nargs> <nret> <ngeneric>`
    fn func_decl(&mut self, line: usize, args: &[Token]) -> Result<(), LoadError> {
        let [owner, name, n_args, n_ret, n_generic] = args else {
            return Err(self.error(
                line,
                "FUNC expects: owner name nargs nret ngeneric",
            ));
        };

        let owner = match bare(owner) {
            Some("-") => Owner::Module,
            Some(text) => match text.split_once(':') {
                Some((module, ty)) if is_ident(module) && is_ident(ty) => Owner::Type {
                    module: Some(module.to_string()),
                    name: ty.to_string(),
                },
                None if is_ident(text) => Owner::Type {
                    module: None,
                    name: text.to_string(),
                },
                _ => return Err(self.error(line, format!("invalid owner '{}'", text))),
            },
            None => return Err(self.error(line, "owner must not be quoted")),
        };
        let name = self.ident(line, name, "function name")?;
        let n_args = self.count(line, n_args, "argument count")?;
        let has_return = match self.count(line, n_ret, "return count")? {
            0 => false,
            1 => true,
            n => return Err(self.error(line, format!("return count must be 0 or 1, got {}", n))),
        };
        if self.count(line, n_generic, "generic count")? != 0 {
            return Err(self.error(line, "generic functions are not supported"));
        }

        let function = UnlinkedFunction {
            owner,
            name,
            n_args,
            has_return,
            line,
            ops: Vec::new(),
            labels: FxHashMap::default(),
        };
        let id = function.id(&self.module.name);
        if !self.function_ids.insert(id.clone()) {
            return Err(self.error(line, format!("function {} declared twice", id)));
        }
        self.current = Some(function);
        Ok(())
    }

    fn body_line(&mut self, line: usize, mut tokens: Vec<Token>) -> Result<(), LoadError> {
        let loc = bare(&tokens[0]).and_then(parse_loc);
        if loc.is_some() {
            tokens.remove(0);
        }
        let Some((opcode, args)) = tokens.split_first() else {
            return Err(self.error(line, "missing opcode after debug location"));
        };
        let opcode = bare(opcode)
            .ok_or_else(|| self.error(line, "opcode must not be quoted"))?
            .to_string();
        let text = render(&tokens);

        let kind = match opcode.as_str() {
            "LABEL" => {
                let label = self.single(line, &opcode, args)?;
                let Some(function) = self.current.as_mut() else {
                    return Err(self.error(line, "instruction outside a function"));
                };
                let index = function.ops.len();
                if function.labels.insert(label.clone(), index).is_some() {
                    return Err(self.error(line, format!("label '{}' defined twice", label)));
                }
                OpKind::Label(label)
            }
            "PUSH_VAR" | "POP_VAR" | "COPY_VAR" => {
                let access = match opcode.as_str() {
                    "PUSH_VAR" => VarAccess::Push,
                    "POP_VAR" => VarAccess::Pop,
                    _ => VarAccess::Copy,
                };
                let index = self.single(line, &opcode, args)?;
                let index = index
                    .parse::<usize>()
                    .map_err(|_| self.error(line, format!("invalid variable index '{}'", index)))?;
                OpKind::Var(access, index)
            }
            _ => OpKind::Deferred {
                opcode,
                args: args.iter().map(|t| t.text.clone()).collect(),
            },
        };

        let Some(function) = self.current.as_mut() else {
            return Err(self.error(line, "instruction outside a function"));
        };
        function.ops.push(UnlinkedOp {
            line,
            loc,
            text,
            kind,
        });
        Ok(())
    }

    fn single(&self, line: usize, opcode: &str, args: &[Token]) -> Result<String, LoadError> {
        match args {
            [arg] => Ok(arg.text.clone()),
            _ => Err(self.error(
                line,
                format!("{} takes 1 argument, got {}", opcode, args.len()),
            )),
        }
    }

    fn ident(&self, line: usize, token: &Token, what: &str) -> Result<String, LoadError> {
        match bare(token) {
            Some(text) if is_ident(text) => Ok(text.to_string()),
            _ => Err(self.error(line, format!("invalid {} '{}'", what, token.text))),
        }
    }

    fn count(&self, line: usize, token: &Token, what: &str) -> Result<usize, LoadError> {
        bare(token)
            .and_then(|text| text.parse().ok())
            .ok_or_else(|| self.error(line, format!("invalid {} '{}'", what, token.text)))
    }
}

fn bare(token: &Token) -> Option<&str> {
    (!token.quoted).then_some(token.text.as_str())
}

fn is_ident(text: &str) -> bool {
    let mut chars = text.chars();
    matches!(chars.next(), Some(c) if c.is_alphabetic() || c == '_')
        && chars.all(|c| c.is_alphanumeric() || c == '_')
}

/// `<line>:<column>`
fn parse_loc(text: &str) -> Option<SourceLoc> {
    let (line, column) = text.split_once(':')?;
    if line.is_empty() || column.is_empty() {
        return None;
    }
    if !line.bytes().chain(column.bytes()).all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some(SourceLoc {
        line: line.parse().ok()?,
        column: column.parse().ok()?,
    })
}

fn render(tokens: &[Token]) -> String {
    tokens
        .iter()
        .map(|t| {
            if t.quoted {
                format!("{:?}", t.text)
            } else {
                t.text.clone()
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
