// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! The debugger monitor shared by the execution thread and controllers.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex, MutexGuard};
use thiserror::Error;
use tracing::{debug, trace};

use super::condition::{Position, ResumeCondition, StepKind};
use super::snapshot::{EngineSnapshot, ModuleView, module_views};
use crate::error::Fault;
use crate::runtime::{FuncRef, FunctionId, Program};
use crate::vm::{InstructionHook, Probe};

/// Errors returned to a debugger controller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DebugError {
    /// A step was requested while the program was not suspended
    #[error("program is not suspended")]
    NotSuspended,

    /// The program has finished
    #[error("program has exited")]
    Exited,

    /// A wait ran out of time
    #[error("timed out waiting for the program")]
    Timeout,

    /// No function with this identifier is loaded
    #[error("unknown function {0}")]
    UnknownFunction(String),

    /// Breakpoint index past the end of the function
    #[error("{function} has {len} instruction(s), no index {index}")]
    BreakpointOutOfRange {
        /// Function addressed
        function: FunctionId,
        /// Requested index
        index: usize,
        /// Instruction count
        len: usize,
    },
}

/// Coarse execution state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// Executing freely
    Running,
    /// Blocked in the instruction hook
    Suspended,
    /// Executing until a step condition holds
    Stepping,
    /// Finished or faulted
    Exited,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunState::Running => "running",
            RunState::Suspended => "suspended",
            RunState::Stepping => "stepping",
            RunState::Exited => "exited",
        };
        f.write_str(name)
    }
}

struct State {
    run_state: RunState,
    /// Bumped on every run-state transition
    generation: u64,
    condition: ResumeCondition,
    breakpoints: Vec<Vec<bool>>,
    step_count: u64,
    position: Position,
    snapshot: Option<EngineSnapshot>,
    interrupted: bool,
}

impl State {
    fn transition(&mut self, to: RunState) {
        if self.run_state != to {
            trace!(from = %self.run_state, to = %to, "run state");
        }
        self.run_state = to;
        self.generation += 1;
    }
}

/// Pause, step and breakpoint control over a running interpreter.
///
/// Install it with [`Interpreter::with_hook`](crate::vm::Interpreter::with_hook)
/// and drive it from any other thread. Every transition happens under one
/// mutex, and waiters are woken through one condition variable.
pub struct DebuggerControl {
    program: Arc<Program>,
    state: Mutex<State>,
    changed: Condvar,
}

impl DebuggerControl {
    /// Creates a controller for `program`.
    ///
    /// With `suspend_on_start` the program suspends before its first
    /// instruction.
    pub fn new(program: Arc<Program>, suspend_on_start: bool) -> Self {
        let breakpoints = program
            .functions()
            .map(|(_, function)| vec![false; function.ops().len()])
            .collect();
        let condition = if suspend_on_start {
            ResumeCondition::Always
        } else {
            ResumeCondition::Never
        };
        Self {
            program,
            state: Mutex::new(State {
                run_state: RunState::Running,
                generation: 0,
                condition,
                breakpoints,
                step_count: 0,
                position: Position::default(),
                snapshot: None,
                interrupted: false,
            }),
            changed: Condvar::new(),
        }
    }

    /// The program under control.
    pub fn program(&self) -> &Arc<Program> {
        &self.program
    }

    /// Current run state.
    pub fn run_state(&self) -> RunState {
        self.state.lock().run_state
    }

    /// Current run state with its generation counter.
    pub fn run_state_generation(&self) -> (u64, RunState) {
        let state = self.state.lock();
        (state.generation, state.run_state)
    }

    /// True while the execution thread is blocked in the hook.
    pub fn is_suspended(&self) -> bool {
        self.run_state() == RunState::Suspended
    }

    /// Number of times the execution thread was released from suspension.
    pub fn step_count(&self) -> u64 {
        self.state.lock().step_count
    }

    /// The active resume condition.
    pub fn condition(&self) -> ResumeCondition {
        self.state.lock().condition
    }

    /// Asks the program to suspend before its next instruction.
    pub fn suspend(&self) -> Result<(), DebugError> {
        let mut state = self.state.lock();
        match state.run_state {
            RunState::Exited => Err(DebugError::Exited),
            RunState::Suspended => Ok(()),
            RunState::Running | RunState::Stepping => {
                debug!("suspend requested");
                state.condition = ResumeCondition::Always;
                Ok(())
            }
        }
    }

    /// Releases a suspended program to run freely.
    pub fn resume(&self) -> Result<(), DebugError> {
        let mut state = self.require_suspended()?;
        debug!("resume");
        state.condition = ResumeCondition::Never;
        state.transition(RunState::Running);
        self.changed.notify_all();
        Ok(())
    }

    /// Executes one instruction.
    pub fn step(&self) -> Result<(), DebugError> {
        self.step_with(StepKind::Into)
    }

    /// Runs until the next instruction at this depth or shallower.
    pub fn step_over(&self) -> Result<(), DebugError> {
        self.step_with(StepKind::Over)
    }

    /// Runs until the current frame returns.
    pub fn step_out(&self) -> Result<(), DebugError> {
        self.step_with(StepKind::Out)
    }

    /// Runs until the source line changes.
    pub fn step_past_line(&self) -> Result<(), DebugError> {
        self.step_with(StepKind::PastLine)
    }

    /// Runs until the source position changes.
    pub fn step_past_column(&self) -> Result<(), DebugError> {
        self.step_with(StepKind::PastColumn)
    }

    /// Releases a suspended program under a step condition.
    pub fn step_with(&self, kind: StepKind) -> Result<(), DebugError> {
        let mut state = self.require_suspended()?;
        state.condition = ResumeCondition::for_step(kind, state.position);
        debug!(condition = %state.condition, "step");
        state.transition(RunState::Stepping);
        self.changed.notify_all();
        Ok(())
    }

    fn require_suspended(&self) -> Result<MutexGuard<'_, State>, DebugError> {
        let state = self.state.lock();
        match state.run_state {
            RunState::Suspended => Ok(state),
            RunState::Exited => Err(DebugError::Exited),
            _ => Err(DebugError::NotSuspended),
        }
    }

    /// Waits for suspension, then runs `reader` on the published snapshot
    /// while holding the monitor lock.
    pub fn visit_state_under_lock<R>(
        &self,
        reader: impl FnOnce(&EngineSnapshot) -> R,
    ) -> Result<R, DebugError> {
        let mut state = self.state.lock();
        loop {
            match state.run_state {
                RunState::Exited => return Err(DebugError::Exited),
                RunState::Suspended => {
                    if let Some(snapshot) = &state.snapshot {
                        return Ok(reader(snapshot));
                    }
                }
                _ => {}
            }
            self.changed.wait(&mut state);
        }
    }

    /// Copy of the published snapshot, if suspended.
    pub fn snapshot(&self) -> Option<EngineSnapshot> {
        self.state.lock().snapshot.clone()
    }

    /// Waits until the program is suspended.
    pub fn await_suspended(&self, timeout: Option<Duration>) -> Result<(), DebugError> {
        let deadline = timeout.map(|t| Instant::now() + t);
        let mut state = self.state.lock();
        loop {
            match state.run_state {
                RunState::Suspended => return Ok(()),
                RunState::Exited => return Err(DebugError::Exited),
                _ => {}
            }
            self.wait(&mut state, deadline)?;
        }
    }

    /// Waits until the run state changes from the generation `seen`.
    ///
    /// Returns the new generation and state immediately if it already
    /// differs.
    pub fn await_run_state_changed(
        &self,
        seen: u64,
        timeout: Option<Duration>,
    ) -> Result<(u64, RunState), DebugError> {
        let deadline = timeout.map(|t| Instant::now() + t);
        let mut state = self.state.lock();
        while state.generation == seen {
            if state.run_state == RunState::Exited {
                break;
            }
            self.wait(&mut state, deadline)?;
        }
        Ok((state.generation, state.run_state))
    }

    fn wait(
        &self,
        state: &mut MutexGuard<'_, State>,
        deadline: Option<Instant>,
    ) -> Result<(), DebugError> {
        match deadline {
            None => {
                self.changed.wait(state);
                Ok(())
            }
            Some(deadline) => {
                if self.changed.wait_until(state, deadline).timed_out() {
                    Err(DebugError::Timeout)
                } else {
                    Ok(())
                }
            }
        }
    }

    fn resolve(&self, function: &FunctionId) -> Result<FuncRef, DebugError> {
        self.program
            .lookup(function)
            .ok_or_else(|| DebugError::UnknownFunction(function.to_string()))
    }

    fn check_index(&self, function: &FunctionId, func: FuncRef, index: usize) -> Result<(), DebugError> {
        let len = self.program.function(func).ops().len();
        if index >= len {
            return Err(DebugError::BreakpointOutOfRange {
                function: function.clone(),
                index,
                len,
            });
        }
        Ok(())
    }

    /// Sets a breakpoint; setting it twice is a no-op.
    pub fn set_breakpoint(&self, function: &FunctionId, index: usize) -> Result<(), DebugError> {
        let func = self.resolve(function)?;
        self.check_index(function, func, index)?;
        self.state.lock().breakpoints[func.index()][index] = true;
        debug!(function = %function, index, "breakpoint set");
        Ok(())
    }

    /// Clears a breakpoint; clearing an unset one is a no-op.
    pub fn clear_breakpoint(&self, function: &FunctionId, index: usize) -> Result<(), DebugError> {
        let func = self.resolve(function)?;
        self.check_index(function, func, index)?;
        self.state.lock().breakpoints[func.index()][index] = false;
        debug!(function = %function, index, "breakpoint cleared");
        Ok(())
    }

    /// Whether a breakpoint is set.
    pub fn has_breakpoint(&self, function: &FunctionId, index: usize) -> Result<bool, DebugError> {
        let func = self.resolve(function)?;
        self.check_index(function, func, index)?;
        Ok(self.state.lock().breakpoints[func.index()][index])
    }

    /// All loaded modules with their breakpoints.
    pub fn module_listing(&self) -> Vec<ModuleView> {
        let state = self.state.lock();
        module_views(&self.program, &state.breakpoints)
    }

    /// Makes the suspended execution thread fail with [`Fault::Interrupted`].
    ///
    /// A program that is not suspended is left alone.
    pub fn interrupt(&self) -> Result<(), DebugError> {
        let mut state = self.require_suspended()?;
        debug!("interrupt");
        state.interrupted = true;
        self.changed.notify_all();
        Ok(())
    }
}

impl InstructionHook for DebuggerControl {
    fn before_instruction(&self, probe: &Probe<'_>) -> Result<(), Fault> {
        let pc = probe.pc();
        if pc.function == FuncRef::BOOTSTRAP {
            return Ok(());
        }
        let loc = probe.loc();
        let position = Position {
            depth: probe.depth(),
            line: loc.map(|l| l.line),
            column: loc.map(|l| l.column),
        };

        let mut state = self.state.lock();
        let breakpoint = state
            .breakpoints
            .get(pc.function.index())
            .and_then(|bits| bits.get(pc.index))
            .is_some_and(|&set| set);
        if !breakpoint && !state.condition.should_suspend(position) {
            return Ok(());
        }

        debug!(pc = %pc, breakpoint, "suspended");
        state.position = position;
        state.snapshot = Some(EngineSnapshot::capture(probe, state.step_count));
        state.transition(RunState::Suspended);
        self.changed.notify_all();

        while state.run_state == RunState::Suspended && !state.interrupted {
            self.changed.wait(&mut state);
        }
        if state.interrupted {
            return Err(Fault::Interrupted);
        }
        state.step_count += 1;
        state.snapshot = None;
        Ok(())
    }

    fn on_exit(&self) {
        let mut state = self.state.lock();
        state.snapshot = None;
        state.transition(RunState::Exited);
        self.changed.notify_all();
        debug!("program exited");
    }
}

impl fmt::Debug for DebuggerControl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("DebuggerControl")
            .field("run_state", &state.run_state)
            .field("condition", &state.condition)
            .field("step_count", &state.step_count)
            .finish_non_exhaustive()
    }
}
