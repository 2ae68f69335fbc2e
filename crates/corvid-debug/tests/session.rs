//! Debugger sessions over a real socket
//!
//! The program runs on its own thread, the server on the tokio runtime, and
//! the test drives both through a `DebugClient`.

use std::sync::Arc;
use std::thread::JoinHandle;

use corvid_debug::protocol::WireRunState;
use corvid_debug::{DebugClient, DebugServer, ProtocolError};
use corvid_vm::debugger::DebuggerControl;
use corvid_vm::runtime::Streams;
use corvid_vm::{Interpreter, RuntimeError, Source, VmConfig, compile};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

const WAIT_MS: Option<u64> = Some(10_000);

const PROGRAM: &str = "corvid 1
FUNC - main 1 1 0
  1:1 PUSH_INT 20
  2:1 CALL double
  3:1 PUSH_INT 2
  3:4 ADD
  4:1 RET

FUNC - double 1 1 0
  PUSH_VAR 0
  PUSH_INT 2
  MUL
  RET
";

struct Harness {
    client: DebugClient,
    control: Arc<DebuggerControl>,
    runner: JoinHandle<Result<i64, RuntimeError>>,
}

async fn start(suspend_on_start: bool) -> Harness {
    let program = Arc::new(compile(&[Source::new("app", PROGRAM)]).unwrap());
    let control = Arc::new(DebuggerControl::new(program.clone(), suspend_on_start));

    let server = DebugServer::bind("127.0.0.1:0", control.clone()).await.unwrap();
    let addr = server.local_addr().unwrap();
    tokio::spawn(server.run());

    let config = VmConfig {
        streams: Streams::capture("").0,
        ..VmConfig::default()
    };
    let interpreter = Interpreter::for_module(program, "app", config)
        .unwrap()
        .with_hook(control.clone());
    let runner = std::thread::spawn(move || interpreter.run(&[]));

    let client = DebugClient::connect(addr).await.unwrap();
    Harness {
        client,
        control,
        runner,
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_hello_and_listing() {
    let h = start(true).await;
    let hello = h.client.hello().await.unwrap();
    assert_eq!(hello.protocol, corvid_debug::protocol::PROTOCOL_VERSION);

    h.client.set_breakpoint("app::double", 2).await.unwrap();
    let modules = h.client.modules().await.unwrap();
    assert_eq!(modules.len(), 1);
    let double = &modules[0].functions[1];
    assert_eq!(double.id, "app::double");
    assert_eq!(double.ops, vec!["PUSH_VAR 0", "PUSH_INT 2", "MUL", "RET"]);
    assert_eq!(double.breakpoints, vec![false, false, true, false]);

    h.client.clear_breakpoint("app::double", 2).await.unwrap();
    h.client.await_suspended(WAIT_MS).await.unwrap();
    h.client.resume().await.unwrap();
    assert_eq!(h.runner.join().unwrap().unwrap(), 42);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_breakpoint_and_steps() {
    let h = start(true).await;
    h.client.await_suspended(WAIT_MS).await.unwrap();
    h.client.set_breakpoint("app::double", 2).await.unwrap();
    h.client.resume().await.unwrap();

    h.client.await_suspended(WAIT_MS).await.unwrap();
    assert!(h.client.is_suspended().await.unwrap());
    let frame = h.client.current_frame().await.unwrap();
    assert_eq!(frame.function, "app::double");
    assert_eq!(frame.index, 2);
    assert_eq!(frame.instruction, "MUL");
    assert_eq!(frame.depth, 2);
    assert!(frame.dump.contains("app::main @ 1"), "{}", frame.dump);

    let before = frame.step_count;
    h.client.step().await.unwrap();
    h.client.await_suspended(WAIT_MS).await.unwrap();
    let frame = h.client.current_frame().await.unwrap();
    assert_eq!(frame.index, 3);
    assert_eq!(frame.step_count, before + 1);

    h.client.step_out().await.unwrap();
    h.client.await_suspended(WAIT_MS).await.unwrap();
    let frame = h.client.current_frame().await.unwrap();
    assert_eq!((frame.function.as_str(), frame.index), ("app::main", 2));

    h.client.step_past_line().await.unwrap();
    h.client.await_suspended(WAIT_MS).await.unwrap();
    assert_eq!(h.client.current_frame().await.unwrap().index, 4);

    h.client.resume().await.unwrap();
    assert_eq!(h.runner.join().unwrap().unwrap(), 42);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_errors_do_not_affect_the_program() {
    let h = start(true).await;
    h.client.await_suspended(WAIT_MS).await.unwrap();

    let err = h.client.set_breakpoint("app::double", 99).await.unwrap_err();
    assert!(matches!(err, ProtocolError::Remote(_)), "{}", err);
    let err = h.client.set_breakpoint("app::ghost", 0).await.unwrap_err();
    assert!(matches!(err, ProtocolError::Remote(ref m) if m.contains("unknown function")));

    let info = h.client.await_run_state_changed(0, WAIT_MS).await.unwrap();
    assert_eq!(info.state, WireRunState::Suspended);

    h.client.resume().await.unwrap();
    let err = h.client.step().await.unwrap_err();
    assert!(matches!(err, ProtocolError::Remote(_)));

    let info = h
        .client
        .await_run_state_changed(info.generation, WAIT_MS)
        .await
        .unwrap();
    assert_ne!(info.state, WireRunState::Suspended);
    assert_eq!(h.runner.join().unwrap().unwrap(), 42);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_malformed_requests_get_error_responses() {
    let program = Arc::new(compile(&[Source::new("app", PROGRAM)]).unwrap());
    let control = Arc::new(DebuggerControl::new(program, false));
    let server = DebugServer::bind("127.0.0.1:0", control).await.unwrap();
    let addr = server.local_addr().unwrap();
    tokio::spawn(server.run());

    let stream = TcpStream::connect(addr).await.unwrap();
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    writer.write_all(b"this is not json\n").await.unwrap();
    let line = lines.next_line().await.unwrap().unwrap();
    let reply: serde_json::Value = serde_json::from_str(&line).unwrap();
    assert_eq!(reply["seq"], 0);
    assert!(reply["error"].as_str().unwrap().starts_with("malformed request"));

    writer
        .write_all(b"{\"seq\":8,\"command\":\"fly\"}\n")
        .await
        .unwrap();
    let line = lines.next_line().await.unwrap().unwrap();
    let reply: serde_json::Value = serde_json::from_str(&line).unwrap();
    assert_eq!(reply["seq"], 8);
    assert!(reply.get("error").is_some());

    writer
        .write_all(b"{\"seq\":9,\"command\":\"is_suspended\"}\n")
        .await
        .unwrap();
    let line = lines.next_line().await.unwrap().unwrap();
    let reply: serde_json::Value = serde_json::from_str(&line).unwrap();
    assert_eq!(reply["seq"], 9);
    assert_eq!(reply["ok"], false);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_disconnect_does_not_resume() {
    let h = start(true).await;
    h.client.await_suspended(WAIT_MS).await.unwrap();
    drop(h.client);

    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    assert!(h.control.is_suspended());

    h.control.resume().unwrap();
    assert_eq!(h.runner.join().unwrap().unwrap(), 42);
}
