// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! The operand/frame stack and machine registers.
//!
//! A single `Vec<Slot>` holds every frame. Frame `k` looks like this, bottom
//! to top:
//!
//! ```text
//! [ var 0 .. var slots-1 ][ marker ][ local 0 .. local n ]
//!                            ^ fp
//! ```
//!
//! The first `n_args` variables are the arguments the caller left on its own
//! local segment. The root marker at index 0 belongs to the bootstrap frame.

use std::fmt;
use std::sync::Arc;

use corvid_macros::{bail, ensure};

use crate::error::Fault;
use crate::runtime::{FuncRef, Streams, Value};

/// Default stack capacity in slots.
pub const DEFAULT_STACK_CAPACITY: usize = 65_536;

/// The `(function, index)` register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProgramCounter {
    /// Function being executed
    pub function: FuncRef,
    /// Instruction index within the function
    pub index: usize,
}

impl ProgramCounter {
    /// Before the first instruction of the program.
    pub const START: ProgramCounter = ProgramCounter {
        function: FuncRef::BOOTSTRAP,
        index: 0,
    };

    /// The program has finished.
    pub const END: ProgramCounter = ProgramCounter {
        function: FuncRef::BOOTSTRAP,
        index: 1,
    };

    /// Creates a program counter.
    pub fn new(function: FuncRef, index: usize) -> Self {
        Self { function, index }
    }

    /// True once the bootstrap call into `main` has returned.
    pub fn is_end(self) -> bool {
        self == Self::END
    }

    /// The next instruction in the same function.
    pub fn advanced(self) -> Self {
        Self {
            function: self.function,
            index: self.index + 1,
        }
    }
}

impl fmt::Display for ProgramCounter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.function == FuncRef::BOOTSTRAP {
            write!(f, "<bootstrap>@{}", self.index)
        } else {
            write!(f, "#{}@{}", self.function.index(), self.index)
        }
    }
}

/// Bookkeeping stored at the frame pointer.
#[derive(Debug, Clone)]
pub(crate) struct FrameMarker {
    /// Variable slots below the marker (arguments included)
    pub slots: usize,
    pub has_return: bool,
    pub saved_fp: usize,
    pub saved_pc: ProgramCounter,
    pub saved_label: Option<Arc<str>>,
}

/// One stack slot.
#[derive(Debug, Clone)]
pub(crate) enum Slot {
    Value(Value),
    /// A variable that has not been written yet
    Unset,
    Frame(FrameMarker),
}

/// Owned copy of one frame's contents.
#[derive(Debug, Clone)]
pub struct FrameContents {
    /// Where the frame is executing; for callers, the call instruction
    pub pc: ProgramCounter,
    /// Variable slots; `None` when never written
    pub vars: Vec<Option<Value>>,
    /// Local segment, bottom first
    pub locals: Vec<Value>,
}

/// Stack, frame pointer and registers of a running program.
pub struct Machine {
    stack: Vec<Slot>,
    capacity: usize,
    fp: usize,
    pc: ProgramCounter,
    last_label: Option<Arc<str>>,
    depth: usize,
    streams: Streams,
}

impl Machine {
    /// Creates a machine holding only the root frame.
    pub fn new(capacity: usize, streams: Streams) -> Self {
        let capacity = capacity.max(1);
        let mut stack = Vec::with_capacity(capacity.min(DEFAULT_STACK_CAPACITY));
        stack.push(Slot::Frame(FrameMarker {
            slots: 0,
            has_return: true,
            saved_fp: 0,
            saved_pc: ProgramCounter::END,
            saved_label: None,
        }));
        Self {
            stack,
            capacity,
            fp: 0,
            pc: ProgramCounter::START,
            last_label: None,
            depth: 0,
            streams,
        }
    }

    /// Maximum number of slots.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Total slots in use, frame markers included.
    pub fn stack_len(&self) -> usize {
        self.stack.len()
    }

    /// Number of values on the current frame's local segment.
    pub fn local_len(&self) -> usize {
        self.stack.len() - self.fp - 1
    }

    /// Number of frames opened above the root frame.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Current program counter.
    pub fn pc(&self) -> ProgramCounter {
        self.pc
    }

    /// Moves the program counter.
    pub fn set_pc(&mut self, pc: ProgramCounter) {
        self.pc = pc;
    }

    /// Last label executed in the current frame chain.
    pub fn last_label(&self) -> Option<&str> {
        self.last_label.as_deref()
    }

    /// Records a label as the last one seen.
    pub fn set_label(&mut self, label: Arc<str>) {
        self.last_label = Some(label);
    }

    /// Standard streams of the program.
    pub fn streams(&self) -> &Streams {
        &self.streams
    }

    /// Pushes a value onto the local segment.
    pub fn push(&mut self, value: Value) -> Result<(), Fault> {
        ensure!(self.stack.len() < self.capacity, Fault::StackOverflow(self.capacity));
        self.stack.push(Slot::Value(value));
        Ok(())
    }

    /// Pops the top of the local segment.
    pub fn pop(&mut self) -> Result<Value, Fault> {
        ensure!(self.local_len() > 0, Fault::StackUnderflow);
        match self.stack.pop() {
            Some(Slot::Value(value)) => Ok(value),
            _ => Err(Fault::CorruptStack("non-value slot in local segment")),
        }
    }

    /// Pops `n` values, returned bottom first.
    pub fn pop_n(&mut self, n: usize) -> Result<Vec<Value>, Fault> {
        let available = self.local_len();
        if n > available {
            return Err(Fault::MissingArguments {
                needed: n,
                available,
            });
        }
        let mut values = Vec::with_capacity(n);
        for _ in 0..n {
            values.push(self.pop()?);
        }
        values.reverse();
        Ok(values)
    }

    /// The value `n` positions below the top of the local segment.
    pub fn peek(&self, n: usize) -> Result<&Value, Fault> {
        let available = self.local_len();
        ensure!(
            n < available,
            Fault::PeekOutOfRange {
                depth: n,
                available,
            }
        );
        match &self.stack[self.stack.len() - 1 - n] {
            Slot::Value(value) => Ok(value),
            _ => Err(Fault::CorruptStack("non-value slot in local segment")),
        }
    }

    fn marker(&self) -> Result<&FrameMarker, Fault> {
        match &self.stack[self.fp] {
            Slot::Frame(marker) => Ok(marker),
            _ => Err(Fault::CorruptStack("frame pointer does not address a marker")),
        }
    }

    fn var_slot(&self, index: usize) -> Result<usize, Fault> {
        let slots = self.marker()?.slots;
        if index >= slots {
            return Err(Fault::VariableOutOfRange { index, slots });
        }
        Ok(self.fp - slots + index)
    }

    /// Pushes a copy of variable `index`.
    pub fn push_var(&mut self, index: usize) -> Result<(), Fault> {
        let slot = self.var_slot(index)?;
        let value = match &self.stack[slot] {
            Slot::Value(value) => value.clone(),
            Slot::Unset => return Err(Fault::UnsetVariable(index)),
            Slot::Frame(_) => return Err(Fault::CorruptStack("marker in variable region")),
        };
        self.push(value)
    }

    /// Pops the top of the local segment into variable `index`.
    pub fn pop_to_var(&mut self, index: usize) -> Result<(), Fault> {
        let slot = self.var_slot(index)?;
        let value = self.pop()?;
        self.stack[slot] = Slot::Value(value);
        Ok(())
    }

    /// Copies the top of the local segment into variable `index`.
    pub fn copy_to_var(&mut self, index: usize) -> Result<(), Fault> {
        let slot = self.var_slot(index)?;
        let value = self.peek(0)?.clone();
        self.stack[slot] = Slot::Value(value);
        Ok(())
    }

    /// Opens a frame over the top `n_args` values of the local segment.
    ///
    /// The marker captures the current program counter, so callers store
    /// the resume position in the register first.
    pub fn open_frame(
        &mut self,
        n_args: usize,
        has_return: bool,
        n_local: usize,
    ) -> Result<(), Fault> {
        let available = self.local_len();
        if available < n_args {
            return Err(Fault::MissingArguments {
                needed: n_args,
                available,
            });
        }
        ensure!(
            self.stack.len() + n_local < self.capacity,
            Fault::StackOverflow(self.capacity)
        );
        self.stack.extend(std::iter::repeat_n(Slot::Unset, n_local));
        self.stack.push(Slot::Frame(FrameMarker {
            slots: n_args + n_local,
            has_return,
            saved_fp: self.fp,
            saved_pc: self.pc,
            saved_label: self.last_label.clone(),
        }));
        self.fp = self.stack.len() - 1;
        self.depth += 1;
        Ok(())
    }

    /// Closes the current frame and restores the caller's registers.
    ///
    /// The local segment must hold exactly the declared return value (or
    /// nothing); that value is pushed back onto the caller's segment.
    pub fn close_frame(&mut self) -> Result<(), Fault> {
        if self.fp == 0 {
            bail!(Fault::CorruptStack("cannot close the root frame"));
        }
        let marker = self.marker()?.clone();
        let expected = usize::from(marker.has_return);
        let found = self.local_len();
        ensure!(found == expected, Fault::ReturnArity { expected, found });
        let result = if marker.has_return {
            Some(self.pop()?)
        } else {
            None
        };
        self.stack.truncate(self.fp - marker.slots);
        self.fp = marker.saved_fp;
        self.pc = marker.saved_pc;
        self.last_label = marker.saved_label;
        self.depth -= 1;
        if let Some(value) = result {
            self.stack.push(Slot::Value(value));
        }
        Ok(())
    }

    /// Program counters of every frame, innermost first.
    ///
    /// Caller frames report the call instruction, not the resume position.
    /// The root frame is omitted.
    pub fn call_stack(&self) -> Vec<ProgramCounter> {
        let mut pcs = vec![self.pc];
        let mut fp = self.fp;
        while fp != 0 {
            let Slot::Frame(marker) = &self.stack[fp] else {
                break;
            };
            if marker.saved_fp == 0 {
                break;
            }
            let saved = marker.saved_pc;
            pcs.push(ProgramCounter::new(
                saved.function,
                saved.index.saturating_sub(1),
            ));
            fp = marker.saved_fp;
        }
        if self.fp == 0 {
            pcs.clear();
        }
        pcs
    }

    /// Copies every frame above the root, innermost first.
    pub fn frames(&self) -> Vec<FrameContents> {
        let pcs = self.call_stack();
        let mut frames = Vec::with_capacity(pcs.len());
        let mut fp = self.fp;
        let mut top = self.stack.len();
        for pc in pcs {
            let Slot::Frame(marker) = &self.stack[fp] else {
                break;
            };
            let vars = self.stack[fp - marker.slots..fp]
                .iter()
                .map(|slot| match slot {
                    Slot::Value(value) => Some(value.clone()),
                    _ => None,
                })
                .collect();
            let locals = self.stack[fp + 1..top]
                .iter()
                .filter_map(|slot| match slot {
                    Slot::Value(value) => Some(value.clone()),
                    _ => None,
                })
                .collect();
            frames.push(FrameContents { pc, vars, locals });
            top = fp - marker.slots;
            fp = marker.saved_fp;
        }
        frames
    }
}

impl fmt::Debug for Machine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Machine")
            .field("pc", &self.pc)
            .field("fp", &self.fp)
            .field("depth", &self.depth)
            .field("stack_len", &self.stack.len())
            .field("last_label", &self.last_label)
            .finish_non_exhaustive()
    }
}
