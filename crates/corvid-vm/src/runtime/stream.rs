// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Input and output stream values.
//!
//! Streams compare by identity. The standard streams a program sees are
//! injected through [`Streams`], so embedders and tests can redirect them.

use std::fmt;
use std::io::{self, BufRead, Write};
use std::sync::Arc;

use parking_lot::Mutex;

/// A readable, line-oriented stream.
#[derive(Clone)]
pub struct InputStream {
    name: Arc<str>,
    inner: Arc<Mutex<Box<dyn BufRead + Send>>>,
}

impl InputStream {
    /// Wraps a reader.
    pub fn new(name: &str, reader: impl BufRead + Send + 'static) -> Self {
        Self {
            name: name.into(),
            inner: Arc::new(Mutex::new(Box::new(reader))),
        }
    }

    /// Stream name used in listings.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Reads one line without its terminator; `None` at end of input.
    pub fn read_line(&self) -> io::Result<Option<String>> {
        let mut line = String::new();
        if self.inner.lock().read_line(&mut line)? == 0 {
            return Ok(None);
        }
        if line.ends_with('\n') {
            line.pop();
            if line.ends_with('\r') {
                line.pop();
            }
        }
        Ok(Some(line))
    }

    /// True when both handles refer to the same stream.
    pub fn same_as(&self, other: &InputStream) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn addr(&self) -> usize {
        Arc::as_ptr(&self.inner) as *const () as usize
    }
}

impl fmt::Debug for InputStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<in:{}>", self.name)
    }
}

/// A writable stream.
#[derive(Clone)]
pub struct OutputStream {
    name: Arc<str>,
    inner: Arc<Mutex<Box<dyn Write + Send>>>,
}

impl OutputStream {
    /// Wraps a writer.
    pub fn new(name: &str, writer: impl Write + Send + 'static) -> Self {
        Self {
            name: name.into(),
            inner: Arc::new(Mutex::new(Box::new(writer))),
        }
    }

    /// Stream name used in listings.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Writes a string.
    pub fn write_str(&self, text: &str) -> io::Result<()> {
        self.inner.lock().write_all(text.as_bytes())
    }

    /// Flushes buffered output.
    pub fn flush(&self) -> io::Result<()> {
        self.inner.lock().flush()
    }

    /// True when both handles refer to the same stream.
    pub fn same_as(&self, other: &OutputStream) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn addr(&self) -> usize {
        Arc::as_ptr(&self.inner) as *const () as usize
    }
}

impl fmt::Debug for OutputStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<out:{}>", self.name)
    }
}

/// The standard streams handed to a running program.
#[derive(Clone, Debug)]
pub struct Streams {
    /// Standard input
    pub stdin: InputStream,
    /// Standard output
    pub stdout: OutputStream,
    /// Standard error
    pub stderr: OutputStream,
}

impl Default for Streams {
    fn default() -> Self {
        Self {
            stdin: InputStream::new("stdin", io::BufReader::new(io::stdin())),
            stdout: OutputStream::new("stdout", io::stdout()),
            stderr: OutputStream::new("stderr", io::stderr()),
        }
    }
}

impl Streams {
    /// In-memory streams: `input` is served on stdin, output is captured.
    pub fn capture(input: &str) -> (Self, CaptureBuffer, CaptureBuffer) {
        let out = CaptureBuffer::default();
        let err = CaptureBuffer::default();
        let streams = Self {
            stdin: InputStream::new("stdin", io::Cursor::new(input.to_string().into_bytes())),
            stdout: OutputStream::new("stdout", out.clone()),
            stderr: OutputStream::new("stderr", err.clone()),
        };
        (streams, out, err)
    }
}

/// A shared in-memory sink.
#[derive(Clone, Default)]
pub struct CaptureBuffer(Arc<Mutex<Vec<u8>>>);

impl CaptureBuffer {
    /// Everything written so far, lossily decoded.
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock()).into_owned()
    }
}

impl Write for CaptureBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
