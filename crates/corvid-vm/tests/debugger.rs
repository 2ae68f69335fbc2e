//! Debugger control integration tests
//!
//! The interpreter runs on its own thread while the test drives it through
//! a shared `DebuggerControl`.

use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use corvid_vm::debugger::{DebugError, DebuggerControl, RunState};
use corvid_vm::runtime::{FuncRef, Streams};
use corvid_vm::vm::{InstructionHook, Probe};
use corvid_vm::{Fault, FunctionId, Interpreter, RuntimeError, Source, VmConfig, compile};

const WAIT: Option<Duration> = Some(Duration::from_secs(10));

const CALLS: &str = "corvid 1
FUNC - main 1 1 0
  1:1 PUSH_INT 2
  1:5 CALL twice
  2:1 PUSH_INT 1
  2:3 ADD
  3:1 RET

FUNC - twice 1 1 0
  10:1 PUSH_VAR 0
  10:2 PUSH_VAR 0
  11:1 ADD
  11:2 RET
";

struct Session {
    control: Arc<DebuggerControl>,
    runner: JoinHandle<Result<i64, RuntimeError>>,
}

impl Session {
    fn start(text: &str, suspend_on_start: bool, setup: impl FnOnce(&DebuggerControl)) -> Self {
        let program = Arc::new(compile(&[Source::new("app", text)]).unwrap());
        let control = Arc::new(DebuggerControl::new(program.clone(), suspend_on_start));
        setup(&control);
        let config = VmConfig {
            streams: Streams::capture("").0,
            ..VmConfig::default()
        };
        let interpreter = Interpreter::for_module(program, "app", config)
            .unwrap()
            .with_hook(control.clone());
        let runner = std::thread::spawn(move || interpreter.run(&[]));
        Self { control, runner }
    }

    fn position(&self) -> (String, usize, usize) {
        self.control
            .visit_state_under_lock(|s| (s.function.to_string(), s.pc.index, s.depth))
            .unwrap()
    }

    fn finish(self) -> Result<i64, RuntimeError> {
        self.runner.join().unwrap()
    }
}

fn id(text: &str) -> FunctionId {
    text.parse().unwrap()
}

#[test]
fn test_suspend_then_step_n_times() {
    let text = "corvid 1
FUNC - main 1 1 0
  NOP
  NOP
  NOP
  NOP
  NOP
  NOP
  PUSH_INT 0
  RET
";
    let session = Session::start(text, true, |_| {});
    session.control.await_suspended(WAIT).unwrap();
    assert_eq!(session.position(), ("app::main".into(), 0, 1));
    assert_eq!(session.control.step_count(), 0);

    let n = 4;
    for _ in 0..n {
        session.control.step().unwrap();
        session.control.await_suspended(WAIT).unwrap();
    }
    assert_eq!(session.control.step_count(), n);
    let step_count = session.control.visit_state_under_lock(|s| s.step_count).unwrap();
    assert_eq!(step_count, n);
    assert!(session.control.is_suspended());
    assert_eq!(session.position().1, n as usize);

    session.control.resume().unwrap();
    let control = session.control.clone();
    assert_eq!(session.finish().unwrap(), 0);
    assert_eq!(control.run_state(), RunState::Exited);
}

#[test]
fn test_suspend_while_running() {
    let text = "corvid 1
FUNC - main 1 1 0
  LABEL spin
  JUMP spin
";
    let session = Session::start(text, false, |_| {});
    session.control.suspend().unwrap();
    session.control.await_suspended(WAIT).unwrap();
    let (function, index, _) = session.position();
    assert_eq!(function, "app::main");
    assert!(index < 2);

    session.control.interrupt().unwrap();
    let err = session.finish().unwrap_err();
    assert_eq!(err.fault, Fault::Interrupted);
}

#[test]
fn test_interrupt_requires_suspension() {
    let session = Session::start(CALLS, true, |_| {});
    session.control.await_suspended(WAIT).unwrap();
    session.control.resume().unwrap();
    assert!(session.control.interrupt().is_err());
    assert_eq!(session.finish().unwrap(), 5);
}

/// Forwards to a debugger but panics at one instruction index.
struct PanicAt {
    control: Arc<DebuggerControl>,
    index: usize,
}

impl InstructionHook for PanicAt {
    fn before_instruction(&self, probe: &Probe<'_>) -> Result<(), Fault> {
        let pc = probe.pc();
        if pc.function != FuncRef::BOOTSTRAP && pc.index == self.index {
            panic!("instruction {} exploded", pc.index);
        }
        self.control.before_instruction(probe)
    }

    fn on_exit(&self) {
        self.control.on_exit();
    }
}

#[test]
fn test_panicking_run_releases_waiters() {
    let program = Arc::new(compile(&[Source::new("app", CALLS)]).unwrap());
    let control = Arc::new(DebuggerControl::new(program.clone(), false));
    let waiter = {
        let control = control.clone();
        std::thread::spawn(move || control.await_suspended(WAIT))
    };

    let hook = Arc::new(PanicAt {
        control: control.clone(),
        index: 2,
    });
    let config = VmConfig {
        streams: Streams::capture("").0,
        ..VmConfig::default()
    };
    let interpreter = Interpreter::for_module(program, "app", config)
        .unwrap()
        .with_hook(hook);
    let runner = std::thread::spawn(move || interpreter.run(&[]));

    assert!(runner.join().is_err());
    assert_eq!(waiter.join().unwrap(), Err(DebugError::Exited));
    assert_eq!(control.run_state(), RunState::Exited);
}

#[test]
fn test_faulting_run_releases_waiters() {
    let text = "corvid 1
FUNC - main 1 1 0
  PUSH_INT 1
  PUSH_INT 0
  DIV
  RET
";
    let session = Session::start(text, false, |_| {});
    let control = session.control.clone();
    let waiter = std::thread::spawn(move || control.await_suspended(WAIT));
    assert_eq!(session.finish().unwrap_err().fault, Fault::DivisionByZero);
    assert_eq!(waiter.join().unwrap(), Err(DebugError::Exited));
}

#[test]
fn test_breakpoint_suspends_inside_callee() {
    let session = Session::start(CALLS, false, |control| {
        control.set_breakpoint(&id("app::twice"), 2).unwrap();
    });
    session.control.await_suspended(WAIT).unwrap();

    let snapshot = session.control.snapshot().unwrap();
    assert_eq!(snapshot.function, id("app::twice"));
    assert_eq!(snapshot.pc.index, 2);
    assert_eq!(snapshot.depth, 2);
    assert_eq!(snapshot.instruction, "ADD");
    assert_eq!(snapshot.loc.map(|l| (l.line, l.column)), Some((11, 1)));

    assert_eq!(snapshot.frames.len(), 2);
    let inner = &snapshot.frames[0];
    assert_eq!(inner.vars, vec![Some("2".to_string())]);
    assert_eq!(inner.locals, vec!["2".to_string(), "2".to_string()]);
    let caller = &snapshot.frames[1];
    assert_eq!(caller.function, id("app::main"));
    assert_eq!(caller.index, 1);

    session.control.resume().unwrap();
    assert_eq!(session.finish().unwrap(), 5);
}

#[test]
fn test_step_over_never_goes_deeper() {
    let session = Session::start(CALLS, false, |control| {
        control.set_breakpoint(&id("app::main"), 1).unwrap();
    });
    session.control.await_suspended(WAIT).unwrap();
    assert_eq!(session.position(), ("app::main".into(), 1, 1));

    let mut seen = Vec::new();
    loop {
        session.control.step_over().unwrap();
        match session.control.await_suspended(WAIT) {
            Ok(()) => {
                let (_, index, depth) = session.position();
                assert!(depth <= 1, "suspended at depth {}", depth);
                seen.push(index);
            }
            Err(DebugError::Exited) => break,
            Err(err) => panic!("unexpected {}", err),
        }
    }
    assert_eq!(seen, vec![2, 3, 4]);
    assert_eq!(session.finish().unwrap(), 5);
}

#[test]
fn test_step_into_and_out() {
    let session = Session::start(CALLS, false, |control| {
        control.set_breakpoint(&id("app::main"), 1).unwrap();
    });
    session.control.await_suspended(WAIT).unwrap();

    session.control.step().unwrap();
    session.control.await_suspended(WAIT).unwrap();
    assert_eq!(session.position(), ("app::twice".into(), 0, 2));

    session.control.step_out().unwrap();
    session.control.await_suspended(WAIT).unwrap();
    assert_eq!(session.position(), ("app::main".into(), 2, 1));

    session.control.resume().unwrap();
    assert_eq!(session.finish().unwrap(), 5);
}

#[test]
fn test_step_past_line_and_column() {
    let session = Session::start(CALLS, true, |_| {});
    session.control.await_suspended(WAIT).unwrap();
    assert_eq!(session.position().1, 0);

    // line 1 holds ops 0 and 1; the call into line 10 is deeper
    session.control.step_past_line().unwrap();
    session.control.await_suspended(WAIT).unwrap();
    assert_eq!(session.position(), ("app::main".into(), 2, 1));

    session.control.step_past_column().unwrap();
    session.control.await_suspended(WAIT).unwrap();
    assert_eq!(session.position(), ("app::main".into(), 3, 1));

    session.control.resume().unwrap();
    assert_eq!(session.finish().unwrap(), 5);
}

#[test]
fn test_run_state_generations() {
    let session = Session::start(CALLS, true, |_| {});
    let (first, state) = session.control.await_run_state_changed(0, WAIT).unwrap();
    assert_eq!(state, RunState::Suspended);

    session.control.resume().unwrap();
    let (second, _) = session.control.await_run_state_changed(first, WAIT).unwrap();
    assert!(second > first);

    let control = session.control.clone();
    assert_eq!(session.finish().unwrap(), 5);
    let (_, state) = control.run_state_generation();
    assert_eq!(state, RunState::Exited);
    assert_eq!(control.step(), Err(DebugError::Exited));
}

#[test]
fn test_module_listing_shows_breakpoints() {
    let program = Arc::new(compile(&[Source::new("app", CALLS)]).unwrap());
    let control = DebuggerControl::new(program, false);
    control.set_breakpoint(&id("app::twice"), 3).unwrap();

    let listing = control.module_listing();
    assert_eq!(listing.len(), 1);
    let module = &listing[0];
    assert_eq!(module.name, "app");
    let names: Vec<String> = module.functions.iter().map(|f| f.id.to_string()).collect();
    assert_eq!(names, vec!["app::main", "app::twice"]);

    let twice = &module.functions[1];
    assert_eq!(twice.ops.len(), 4);
    assert_eq!(twice.ops[3], "11:2 RET");
    assert_eq!(twice.breakpoints, vec![3]);
    assert!(module.functions[0].breakpoints.is_empty());
}
