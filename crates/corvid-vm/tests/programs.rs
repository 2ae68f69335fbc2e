//! End-to-end program tests
//!
//! Each test loads source text, links it and runs `main` with captured
//! streams.

use corvid_vm::runtime::Streams;
use corvid_vm::{Engine, Error, Fault, Source, VmConfig, compile};

fn engine(text: &str) -> Engine {
    Engine::from_sources(&[Source::new("app", text)]).unwrap()
}

fn run(text: &str) -> Result<i64, Error> {
    engine(text).run("app", &[])
}

fn fault_of(result: Result<i64, Error>) -> Fault {
    match result {
        Err(Error::Runtime(err)) => err.fault,
        other => panic!("expected a runtime fault, got {:?}", other),
    }
}

#[test]
fn test_add_returns_exit_code() {
    let text = "corvid 1
FUNC - main 1 1 0
  PUSH_INT 1
  PUSH_INT 2
  ADD
  RET
";
    assert_eq!(run(text).unwrap(), 3);
    let args = vec!["x".to_string(), "y".to_string()];
    assert_eq!(engine(text).run("app", &args).unwrap(), 3);
}

#[test]
fn test_recursive_factorial() {
    let text = "corvid 1
FUNC - main 1 1 0
  PUSH_INT 5
  CALL fact
  RET

FUNC - fact 1 1 0
  PUSH_VAR 0
  PUSH_INT 1
  LE
  JUMP_UNLESS recurse
  PUSH_INT 1
  RET
  LABEL recurse
  PUSH_VAR 0
  PUSH_VAR 0
  PUSH_INT 1
  SUB
  CALL fact
  MUL
  RET
";
    assert_eq!(run(text).unwrap(), 120);
}

#[test]
fn test_loop_with_locals() {
    // sum 1..=10
    let text = "corvid 1
FUNC - main 1 1 0
  PUSH_INT 0
  POP_VAR 1
  PUSH_INT 10
  POP_VAR 2
  LABEL loop
  PUSH_VAR 2
  PUSH_INT 0
  GT
  JUMP_UNLESS done
  PUSH_VAR 1
  PUSH_VAR 2
  ADD
  POP_VAR 1
  PUSH_VAR 2
  PUSH_INT 1
  SUB
  POP_VAR 2
  JUMP loop
  LABEL done
  PUSH_VAR 1
  RET
";
    assert_eq!(run(text).unwrap(), 55);
}

#[test]
fn test_constructor_with_missing_field_faults() {
    let text = "corvid 1
TYPE Point x y
FUNC - main 1 1 0
  PUSH_INT 1
  CALL Point.Point
  POP
  PUSH_INT 0
  RET
";
    assert_eq!(
        fault_of(run(text)),
        Fault::RecordArity {
            ty: "app:Point".into(),
            expected: 2,
            found: 1,
        }
    );
}

#[test]
fn test_methods_mutate_records() {
    let text = "corvid 1
TYPE Counter count
FUNC Counter bump 1 0 0
  PUSH_VAR 0
  PUSH_VAR 0
  GET_FIELD Counter.count
  PUSH_VAR 1
  ADD
  SET_FIELD Counter.count
  RET

FUNC - main 1 1 0
  PUSH_INT 10
  CALL Counter.Counter
  POP_VAR 1
  PUSH_VAR 1
  PUSH_INT 5
  CALL Counter.bump
  PUSH_VAR 1
  IS_TYPE Counter
  JUMP_UNLESS bad
  PUSH_VAR 1
  GET_FIELD Counter.count
  RET
  LABEL bad
  PUSH_INT 1
  RET
";
    assert_eq!(run(text).unwrap(), 15);
}

#[test]
fn test_method_checks_receiver_type() {
    let text = "corvid 1
TYPE Counter count
FUNC Counter get 0 1 0
  PUSH_VAR 0
  GET_FIELD Counter.count
  RET

FUNC - main 1 1 0
  LABEL call
  PUSH_INT 0
  CALL Counter.get
  RET
";
    let err = match run(text) {
        Err(Error::Runtime(err)) => err,
        other => panic!("expected a runtime fault, got {:?}", other),
    };
    assert!(matches!(err.fault, Fault::WrongRecordType { .. }));
    assert_eq!(err.trace.len(), 1);
    assert_eq!(err.trace[0].function.to_string(), "app::main");
    assert_eq!(err.trace[0].index, 2);
    assert_eq!(err.last_label.as_deref(), Some("call"));
}

#[test]
fn test_fault_trace_lists_every_frame() {
    let text = "corvid 1
FUNC - main 1 1 0
  PUSH_INT 4
  CALL halve
  RET

FUNC - halve 1 1 0
  LABEL divide
  PUSH_VAR 0
  PUSH_INT 0
  DIV
  RET
";
    let err = match run(text) {
        Err(Error::Runtime(err)) => err,
        other => panic!("expected a runtime fault, got {:?}", other),
    };
    assert_eq!(err.fault, Fault::DivisionByZero);
    let frames: Vec<String> = err.trace.iter().map(|f| f.to_string()).collect();
    assert_eq!(frames, vec!["app::halve @ 3", "app::main @ 1"]);
    assert_eq!(err.last_label.as_deref(), Some("divide"));
    assert!(err.to_string().contains("division by zero"));
}

#[test]
fn test_unset_variable_read_faults() {
    let text = "corvid 1
FUNC - main 1 1 0
  PUSH_VAR 1
  RET
";
    assert_eq!(fault_of(run(text)), Fault::UnsetVariable(1));
}

#[test]
fn test_non_integer_exit_value_faults() {
    let text = "corvid 1
FUNC - main 1 1 0
  PUSH_TRUE
  RET
";
    assert!(matches!(fault_of(run(text)), Fault::TypeMismatch { .. }));
}

#[test]
fn test_explicit_failure() {
    let text = "corvid 1
FUNC - main 1 1 0
  FAIL \"no input\"
";
    assert_eq!(fault_of(run(text)), Fault::Failed("no input".into()));
}

#[test]
fn test_streams_are_captured() {
    let text = "corvid 1
FUNC - main 1 1 0
  STDOUT
  PUSH_STR \"hello, \"
  WRITE
  PUSH_VAR 0
  PUSH_INT 0
  ARRAY_GET
  WRITE
  PUSH_STR \"\\n\"
  WRITE
  FLUSH
  STDIN
  READ_LINE
  STR_TO_INT
  RET
";
    let (streams, out, err) = Streams::capture("42\n");
    let engine = engine(text).with_config(VmConfig {
        streams,
        ..VmConfig::default()
    });
    let code = engine.run("app", &["world".to_string()]).unwrap();
    assert_eq!(code, 42);
    assert_eq!(out.contents(), "hello, world\n");
    assert_eq!(err.contents(), "");
}

#[test]
fn test_pattern_groups() {
    let text = "corvid 1
FUNC - main 1 1 0
  PUSH_STR \"key=value; rest\"
  MATCH \"([a-z]+)=([a-z]+)\"
  COPY_VAR 1
  PUSH_INT 2
  MATCH_GROUP
  STR_LEN
  PUSH_VAR 1
  MATCH_TAIL
  STR_LEN
  ADD
  RET
";
    // "value" plus "; rest"
    assert_eq!(run(text).unwrap(), 11);
}

#[test]
fn test_builder_and_arrays() {
    let text = "corvid 1
FUNC - main 1 1 0
  PUSH_INT 3
  PUSH_STR \"ab\"
  ARRAY_NEW
  POP_VAR 1
  BUILDER_NEW
  PUSH_VAR 1
  PUSH_INT 0
  ARRAY_GET
  BUILDER_APPEND
  PUSH_INT 7
  BUILDER_APPEND
  BUILDER_STR
  STR_LEN
  RET
";
    assert_eq!(run(text).unwrap(), 3);
}

#[test]
fn test_stack_overflow_is_a_fault() {
    let text = "corvid 1
FUNC - main 1 1 0
  PUSH_INT 0
  CALL spin
  RET

FUNC - spin 1 1 0
  PUSH_VAR 0
  CALL spin
  RET
";
    let engine = engine(text).with_config(VmConfig {
        stack_capacity: 64,
        ..VmConfig::default()
    });
    assert_eq!(fault_of(engine.run("app", &[])), Fault::StackOverflow(64));
}

#[test]
fn test_oversized_array_is_a_fault() {
    let text = "corvid 1
FUNC - main 1 1 0
  PUSH_INT 4611686018427387904
  PUSH_INT 0
  ARRAY_NEW
  ARRAY_LEN
  RET
";
    assert_eq!(
        fault_of(run(text)),
        Fault::InvalidArraySize {
            size: 4611686018427387904,
            max: corvid_vm::vm::MAX_ARRAY_LEN,
        }
    );

    let negative = text.replace("4611686018427387904", "-1");
    assert!(matches!(
        fault_of(run(&negative)),
        Fault::InvalidArraySize { size: -1, .. }
    ));
}

#[test]
fn test_self_referencing_arrays_compare_equal() {
    let text = "corvid 1
FUNC - main 1 1 0
  PUSH_INT 1
  PUSH_INT 0
  ARRAY_NEW
  POP_VAR 1
  PUSH_VAR 1
  PUSH_INT 0
  PUSH_VAR 1
  ARRAY_SET
  PUSH_INT 1
  PUSH_INT 0
  ARRAY_NEW
  POP_VAR 2
  PUSH_VAR 2
  PUSH_INT 0
  PUSH_VAR 2
  ARRAY_SET
  PUSH_VAR 1
  PUSH_VAR 2
  EQ
  JUMP_UNLESS different
  PUSH_INT 1
  RET
  LABEL different
  PUSH_INT 0
  RET
";
    assert_eq!(run(text).unwrap(), 1);
}

#[test]
fn test_cross_module_calls() {
    let program = compile(&[
        Source::new(
            "app",
            "corvid 1
FUNC - main 1 1 0
  PUSH_INT 3
  PUSH_INT 4
  CALL geo:Point.Point
  CALL geo:Point.sum
  RET
",
        ),
        Source::new(
            "geo",
            "corvid 1
TYPE Point x y
FUNC Point sum 0 1 0
  PUSH_VAR 0
  GET_FIELD Point.x
  PUSH_VAR 0
  GET_FIELD Point.y
  ADD
  RET
",
        ),
    ])
    .unwrap();
    let engine = Engine::new(std::sync::Arc::new(program));
    assert_eq!(engine.run("app", &[]).unwrap(), 7);
}

#[test]
fn test_load_and_link_errors_abort_before_running() {
    let err = compile(&[Source::new("app", "FUNC - main 1 1 0\n  RET\n")]).unwrap_err();
    assert!(matches!(err, Error::Load(ref e) if e.line == 1), "{}", err);

    let err = compile(&[Source::new("app", "corvid 1\nFUNC - main 1 1 1\n  RET\n")]).unwrap_err();
    assert!(matches!(err, Error::Load(_)), "{}", err);

    let err = compile(&[Source::new("app", "corvid 1\nFUNC - main 1 1 0\n  JUMP nowhere\n")])
        .unwrap_err();
    match err {
        Error::Link(err) => {
            assert_eq!(err.function.to_string(), "app::main");
            assert_eq!(err.index, Some(0));
        }
        other => panic!("expected a link error, got {}", other),
    }
}

#[test]
fn test_sources_from_files() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tool.corvid");
    std::fs::write(&path, "corvid 1\nFUNC - main 1 1 0\n  PUSH_INT 9\n  RET\n").unwrap();

    let source = Source::from_path(&path).unwrap();
    assert_eq!(source.name, "tool");
    let engine = Engine::from_sources(&[source]).unwrap();
    assert_eq!(engine.run("tool", &[]).unwrap(), 9);

    let missing = Source::from_path(dir.path().join("missing.corvid"));
    assert!(matches!(missing, Err(Error::Io { .. })));
}
