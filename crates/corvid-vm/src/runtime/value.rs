// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Runtime value representation.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use parking_lot::Mutex;

use super::module::Type;
use super::stream::{InputStream, OutputStream};
use crate::error::Fault;

/// Nesting depth past which `Display` stops descending into containers.
const DISPLAY_DEPTH: usize = 4;

/// Array nesting depth that contributes to a hash.
const HASH_DEPTH: usize = 4;

/// A Corvid value.
///
/// Values are thread-safe: mutable kinds sit behind `Arc<Mutex<_>>`, so a
/// value can be cloned into a debugger snapshot and read on another thread.
/// Records may form cycles through their mutable fields; such cycles are
/// reclaimed only when the process exits.
#[derive(Clone)]
pub enum Value {
    /// Boolean
    Bool(bool),
    /// 64-bit signed integer
    Int(i64),
    /// Immutable string
    Str(Arc<str>),
    /// Mutable, fixed-size array
    Array(Arc<Mutex<Vec<Value>>>),
    /// Mutable append-only string buffer
    Builder(Arc<Mutex<String>>),
    /// Result of a successful regex search
    Match(Arc<MatchResult>),
    /// Readable stream
    StreamIn(InputStream),
    /// Writable stream
    StreamOut(OutputStream),
    /// Instance of a user type
    Record(Arc<Record>),
}

/// Captured groups of a regex match plus the unmatched tail of the input.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MatchResult {
    /// Group 0 is the whole match; unmatched optional groups are `None`
    pub groups: Vec<Option<String>>,
    /// Input following the match
    pub tail: String,
}

/// An instance of a user-defined type.
pub struct Record {
    ty: Arc<Type>,
    fields: Mutex<Vec<Value>>,
}

impl Record {
    /// Builds a record; the field count must equal the type's arity.
    pub fn new(ty: Arc<Type>, fields: Vec<Value>) -> Result<Self, Fault> {
        if fields.len() != ty.field_count() {
            return Err(Fault::RecordArity {
                ty: ty.to_string(),
                expected: ty.field_count(),
                found: fields.len(),
            });
        }
        Ok(Self {
            ty,
            fields: Mutex::new(fields),
        })
    }

    /// Type of the record.
    pub fn ty(&self) -> &Arc<Type> {
        &self.ty
    }

    /// Reads a field slot.
    pub fn get(&self, slot: usize) -> Result<Value, Fault> {
        let fields = self.fields.lock();
        fields.get(slot).cloned().ok_or(Fault::IndexOutOfRange {
            index: slot as i64,
            len: fields.len(),
        })
    }

    /// Writes a field slot.
    pub fn set(&self, slot: usize, value: Value) -> Result<(), Fault> {
        let mut fields = self.fields.lock();
        let len = fields.len();
        let field = fields.get_mut(slot).ok_or(Fault::IndexOutOfRange {
            index: slot as i64,
            len,
        })?;
        *field = value;
        Ok(())
    }

    /// Copy of all field values.
    pub fn fields(&self) -> Vec<Value> {
        self.fields.lock().clone()
    }
}

impl Value {
    /// Creates a string value.
    pub fn str(s: impl AsRef<str>) -> Self {
        Value::Str(Arc::from(s.as_ref()))
    }

    /// Creates an array value.
    pub fn array(elements: Vec<Value>) -> Self {
        Value::Array(Arc::new(Mutex::new(elements)))
    }

    /// Creates an empty string builder.
    pub fn builder() -> Self {
        Value::Builder(Arc::new(Mutex::new(String::new())))
    }

    /// Creates a record value.
    pub fn record(ty: Arc<Type>, fields: Vec<Value>) -> Result<Self, Fault> {
        Ok(Value::Record(Arc::new(Record::new(ty, fields)?)))
    }

    /// Returns the kind of this value as a string.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Str(_) => "string",
            Value::Array(_) => "array",
            Value::Builder(_) => "builder",
            Value::Match(_) => "match",
            Value::StreamIn(_) => "input stream",
            Value::StreamOut(_) => "output stream",
            Value::Record(_) => "record",
        }
    }

    /// Checked cast to a boolean.
    pub fn as_bool(&self) -> Result<bool, Fault> {
        match self {
            Value::Bool(b) => Ok(*b),
            other => Err(Fault::mismatch("bool", other.kind())),
        }
    }

    /// Checked cast to an integer.
    pub fn as_int(&self) -> Result<i64, Fault> {
        match self {
            Value::Int(n) => Ok(*n),
            other => Err(Fault::mismatch("int", other.kind())),
        }
    }

    /// Checked cast to a string.
    pub fn as_str(&self) -> Result<&Arc<str>, Fault> {
        match self {
            Value::Str(s) => Ok(s),
            other => Err(Fault::mismatch("string", other.kind())),
        }
    }

    /// Checked cast to an array.
    pub fn as_array(&self) -> Result<&Arc<Mutex<Vec<Value>>>, Fault> {
        match self {
            Value::Array(a) => Ok(a),
            other => Err(Fault::mismatch("array", other.kind())),
        }
    }

    /// Checked cast to a string builder.
    pub fn as_builder(&self) -> Result<&Arc<Mutex<String>>, Fault> {
        match self {
            Value::Builder(b) => Ok(b),
            other => Err(Fault::mismatch("builder", other.kind())),
        }
    }

    /// Checked cast to a match result.
    pub fn as_match(&self) -> Result<&Arc<MatchResult>, Fault> {
        match self {
            Value::Match(m) => Ok(m),
            other => Err(Fault::mismatch("match", other.kind())),
        }
    }

    /// Checked cast to an input stream.
    pub fn as_stream_in(&self) -> Result<&InputStream, Fault> {
        match self {
            Value::StreamIn(s) => Ok(s),
            other => Err(Fault::mismatch("input stream", other.kind())),
        }
    }

    /// Checked cast to an output stream.
    pub fn as_stream_out(&self) -> Result<&OutputStream, Fault> {
        match self {
            Value::StreamOut(s) => Ok(s),
            other => Err(Fault::mismatch("output stream", other.kind())),
        }
    }

    /// Checked cast to a record.
    pub fn as_record(&self) -> Result<&Arc<Record>, Fault> {
        match self {
            Value::Record(r) => Ok(r),
            other => Err(Fault::mismatch("record", other.kind())),
        }
    }

    /// Checked cast to a record of exactly `ty`.
    pub fn as_record_of(&self, ty: &Type) -> Result<&Arc<Record>, Fault> {
        match self {
            Value::Record(r) if r.ty().as_ref() == ty => Ok(r),
            Value::Record(r) => Err(Fault::WrongRecordType {
                expected: ty.to_string(),
                found: r.ty().to_string(),
            }),
            other => Err(Fault::WrongRecordType {
                expected: ty.to_string(),
                found: other.kind().to_string(),
            }),
        }
    }

    fn fmt_nested(&self, f: &mut fmt::Formatter<'_>, depth: usize, quoted: bool) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(n) => write!(f, "{}", n),
            Value::Str(s) if quoted => write!(f, "{:?}", s),
            Value::Str(s) => write!(f, "{}", s),
            Value::Array(elements) => {
                if depth >= DISPLAY_DEPTH {
                    return write!(f, "[...]");
                }
                let elements = elements.lock().clone();
                write!(f, "[")?;
                for (i, element) in elements.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    element.fmt_nested(f, depth + 1, true)?;
                }
                write!(f, "]")
            }
            Value::Builder(buffer) => write!(f, "builder({:?})", buffer.lock().as_str()),
            Value::Match(m) => {
                let whole = m.groups.first().cloned().flatten().unwrap_or_default();
                write!(f, "match({:?}, tail {:?})", whole, m.tail)
            }
            Value::StreamIn(s) => write!(f, "{:?}", s),
            Value::StreamOut(s) => write!(f, "{:?}", s),
            Value::Record(record) => {
                let ty = record.ty();
                if depth >= DISPLAY_DEPTH {
                    return write!(f, "{}{{...}}", ty.name());
                }
                write!(f, "{}{{", ty.name())?;
                for (i, (name, value)) in ty.fields().iter().zip(record.fields()).enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: ", name)?;
                    value.fmt_nested(f, depth + 1, true)?;
                }
                write!(f, "}}")
            }
        }
    }
}

impl Value {
    /// Structural equality; array pairs in `assumed` compare equal, which
    /// ends the walk on cyclic arrays.
    fn eq_assuming(&self, other: &Self, assumed: &mut Vec<(usize, usize)>) -> bool {
        match (self, other) {
            (Value::Array(a), Value::Array(b)) => {
                if Arc::ptr_eq(a, b) {
                    return true;
                }
                let pair = (Arc::as_ptr(a) as usize, Arc::as_ptr(b) as usize);
                if assumed.contains(&pair) {
                    return true;
                }
                assumed.push(pair);
                // Copies release each lock before descending.
                let left = a.lock().clone();
                let right = b.lock().clone();
                left.len() == right.len()
                    && left
                        .iter()
                        .zip(&right)
                        .all(|(x, y)| x.eq_assuming(y, assumed))
            }
            _ => self == other,
        }
    }

    fn hash_bounded<H: Hasher>(&self, state: &mut H, depth: usize) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::Bool(b) => b.hash(state),
            Value::Int(n) => n.hash(state),
            Value::Str(s) => s.hash(state),
            Value::Array(elements) => {
                let elements = elements.lock().clone();
                elements.len().hash(state);
                if depth < HASH_DEPTH {
                    for element in &elements {
                        element.hash_bounded(state, depth + 1);
                    }
                }
            }
            Value::Match(m) => m.hash(state),
            Value::Builder(b) => (Arc::as_ptr(b) as usize).hash(state),
            Value::StreamIn(s) => s.addr().hash(state),
            Value::StreamOut(s) => s.addr().hash(state),
            Value::Record(r) => (Arc::as_ptr(r) as usize).hash(state),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Array(_), Value::Array(_)) => self.eq_assuming(other, &mut Vec::new()),
            (Value::Match(a), Value::Match(b)) => a == b,
            (Value::Builder(a), Value::Builder(b)) => Arc::ptr_eq(a, b),
            (Value::StreamIn(a), Value::StreamIn(b)) => a.same_as(b),
            (Value::StreamOut(a), Value::StreamOut(b)) => a.same_as(b),
            (Value::Record(a), Value::Record(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.hash_bounded(state, 0);
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_nested(f, 0, false)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_nested(f, 0, true)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::str(s)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(Arc::from(s))
    }
}
