// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Standard stream access.

use crate::error::Fault;
use crate::runtime::Value;
use crate::vm::Machine;

pub(super) fn stdin(m: &mut Machine) -> Result<(), Fault> {
    let stream = m.streams().stdin.clone();
    m.push(Value::StreamIn(stream))
}

pub(super) fn stdout(m: &mut Machine) -> Result<(), Fault> {
    let stream = m.streams().stdout.clone();
    m.push(Value::StreamOut(stream))
}

pub(super) fn stderr(m: &mut Machine) -> Result<(), Fault> {
    let stream = m.streams().stderr.clone();
    m.push(Value::StreamOut(stream))
}

/// Pushes the next line, or `false` at end of input.
pub(super) fn read_line(m: &mut Machine) -> Result<(), Fault> {
    let stream = m.pop()?;
    let line = stream.as_stream_in()?.read_line()?;
    m.push(match line {
        Some(line) => Value::from(line),
        None => Value::Bool(false),
    })
}

/// `stream value WRITE` writes the value's text and keeps the stream.
pub(super) fn write(m: &mut Machine) -> Result<(), Fault> {
    let value = m.pop()?;
    let stream = m.peek(0)?.as_stream_out()?;
    stream.write_str(&value.to_string())?;
    Ok(())
}

pub(super) fn flush(m: &mut Machine) -> Result<(), Fault> {
    let stream = m.pop()?;
    stream.as_stream_out()?.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::Streams;

    #[test]
    fn test_write_and_read() {
        let (streams, out, _) = Streams::capture("first\nsecond\n");
        let mut m = Machine::new(32, streams);

        stdout(&mut m).unwrap();
        m.push(Value::str("n=")).unwrap();
        write(&mut m).unwrap();
        m.push(Value::Int(3)).unwrap();
        write(&mut m).unwrap();
        flush(&mut m).unwrap();
        assert_eq!(out.contents(), "n=3");
        assert_eq!(m.local_len(), 0);

        for expected in [Value::str("first"), Value::str("second"), Value::Bool(false)] {
            stdin(&mut m).unwrap();
            read_line(&mut m).unwrap();
            assert_eq!(m.pop().unwrap(), expected);
        }
    }

    #[test]
    fn test_write_requires_output_stream() {
        let (streams, _, _) = Streams::capture("");
        let mut m = Machine::new(32, streams);
        stdin(&mut m).unwrap();
        m.push(Value::str("x")).unwrap();
        assert!(matches!(write(&mut m), Err(Fault::TypeMismatch { .. })));
    }
}
