// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Regular-expression matching.
//!
//! `MATCH` is anchored at the start of its input, so a program can consume
//! a string piece by piece through `MATCH_TAIL`.

use std::sync::Arc;

use crate::error::Fault;
use crate::linker::LinkContext;
use crate::runtime::{MatchResult, OpFn, PcMove, Value};
use crate::vm::Machine;

pub(super) fn matcher(ctx: &LinkContext<'_>, args: &[String]) -> Result<OpFn, String> {
    let regex = ctx.compile_regex(&args[0])?;
    Ok(Box::new(move |m: &mut Machine| {
        let input = m.pop()?;
        let input = input.as_str()?;
        let result = match regex.captures(input) {
            Some(captures) => {
                let end = captures.get(0).map_or(0, |whole| whole.end());
                Value::Match(Arc::new(MatchResult {
                    groups: captures
                        .iter()
                        .map(|group| group.map(|g| g.as_str().to_string()))
                        .collect(),
                    tail: input[end..].to_string(),
                }))
            }
            None => Value::Bool(false),
        };
        m.push(result)?;
        Ok(PcMove::Next)
    }))
}

/// `match i MATCH_GROUP` pushes group `i`, or `false` if it did not take part.
pub(super) fn group(m: &mut Machine) -> Result<(), Fault> {
    let i = m.pop()?.as_int()?;
    let result = m.pop()?;
    let result = result.as_match()?;
    let len = result.groups.len();
    let group = usize::try_from(i)
        .ok()
        .and_then(|i| result.groups.get(i))
        .ok_or(Fault::IndexOutOfRange { index: i, len })?;
    m.push(match group {
        Some(text) => Value::str(text),
        None => Value::Bool(false),
    })
}

pub(super) fn tail(m: &mut Machine) -> Result<(), Fault> {
    let result = m.pop()?;
    let tail = Value::str(&result.as_match()?.tail);
    m.push(tail)
}

#[cfg(test)]
mod tests {
    use super::super::test_support::machine_with;
    use super::*;

    fn matched(groups: &[Option<&str>], tail: &str) -> Value {
        Value::Match(Arc::new(MatchResult {
            groups: groups.iter().map(|g| g.map(str::to_string)).collect(),
            tail: tail.to_string(),
        }))
    }

    #[test]
    fn test_group_and_tail() {
        let value = matched(&[Some("ab"), None], "cd");
        let mut m = machine_with(vec![value.clone(), Value::Int(0)]);
        group(&mut m).unwrap();
        assert_eq!(m.pop().unwrap(), Value::str("ab"));

        let mut m = machine_with(vec![value.clone(), Value::Int(1)]);
        group(&mut m).unwrap();
        assert_eq!(m.pop().unwrap(), Value::Bool(false));

        let mut m = machine_with(vec![value.clone(), Value::Int(2)]);
        assert_eq!(group(&mut m), Err(Fault::IndexOutOfRange { index: 2, len: 2 }));

        let mut m = machine_with(vec![value]);
        tail(&mut m).unwrap();
        assert_eq!(m.pop().unwrap(), Value::str("cd"));
    }
}
