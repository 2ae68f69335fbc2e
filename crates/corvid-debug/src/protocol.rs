// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Wire messages
//!
//! Every message is one line of JSON. A request carries a sequence number
//! and a command:
//!
//! ```text
//! {"seq":3,"command":"set_breakpoint","function":"app::main","index":2}
//! ```
//!
//! and is answered by exactly one response with the same sequence number,
//! holding either a payload or an error:
//!
//! ```text
//! {"seq":3,"ok":null}
//! {"seq":4,"error":"program is not suspended"}
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

use corvid_vm::debugger::{EngineSnapshot, ModuleView, RunState};

/// Protocol revision reported by `hello`.
pub const PROTOCOL_VERSION: u32 = 1;

/// A request from a controller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    /// Sequence number echoed by the response
    pub seq: u64,
    /// What to do
    #[serde(flatten)]
    pub command: Command,
}

/// Commands understood by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum Command {
    /// Handshake
    Hello,
    /// Every module with its functions and breakpoints
    GetModules,
    /// Stack dump of the suspended program
    GetCurrentFrame,
    /// Set a breakpoint
    SetBreakpoint {
        /// Function identifier, e.g. `app::main`
        function: String,
        /// Instruction index
        index: usize,
    },
    /// Clear a breakpoint
    ClearBreakpoint {
        /// Function identifier
        function: String,
        /// Instruction index
        index: usize,
    },
    /// Suspend before the next instruction
    Suspend,
    /// Run freely
    Resume,
    /// Execute one instruction
    Step,
    /// Step without entering calls
    StepOver,
    /// Run until the current frame returns
    StepOut,
    /// Run until the source line changes
    StepPastLine,
    /// Run until the source position changes
    StepPastColumn,
    /// Whether the program is suspended
    IsSuspended,
    /// Wait until the program suspends
    AwaitSuspended {
        /// Give up after this many milliseconds
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timeout_ms: Option<u64>,
    },
    /// Wait until the run state moves past generation `seen`
    AwaitRunStateChanged {
        /// Last generation the controller saw
        seen: u64,
        /// Give up after this many milliseconds
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timeout_ms: Option<u64>,
    },
}

impl Command {
    /// Wire name of the command.
    pub fn name(&self) -> &'static str {
        match self {
            Command::Hello => "hello",
            Command::GetModules => "get_modules",
            Command::GetCurrentFrame => "get_current_frame",
            Command::SetBreakpoint { .. } => "set_breakpoint",
            Command::ClearBreakpoint { .. } => "clear_breakpoint",
            Command::Suspend => "suspend",
            Command::Resume => "resume",
            Command::Step => "step",
            Command::StepOver => "step_over",
            Command::StepOut => "step_out",
            Command::StepPastLine => "step_past_line",
            Command::StepPastColumn => "step_past_column",
            Command::IsSuspended => "is_suspended",
            Command::AwaitSuspended { .. } => "await_suspended",
            Command::AwaitRunStateChanged { .. } => "await_run_state_changed",
        }
    }
}

/// The answer to one request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    /// Sequence number of the request
    pub seq: u64,
    /// Payload or error
    #[serde(flatten)]
    pub outcome: Outcome,
}

/// Success payload or error text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// Command succeeded
    Ok(Json),
    /// Command failed
    Error(String),
}

impl Response {
    /// A successful response.
    pub fn ok(seq: u64, payload: Json) -> Self {
        Self {
            seq,
            outcome: Outcome::Ok(payload),
        }
    }

    /// A failed response.
    pub fn error(seq: u64, message: impl Into<String>) -> Self {
        Self {
            seq,
            outcome: Outcome::Error(message.into()),
        }
    }
}

/// Payload of `hello`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HelloInfo {
    /// Protocol revision
    pub protocol: u32,
    /// Server name and version
    pub server: String,
}

/// A type in a module listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeInfo {
    /// Type name
    pub name: String,
    /// Field names in slot order
    pub fields: Vec<String>,
}

/// A function in a module listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionInfo {
    /// Function identifier
    pub id: String,
    /// Declared arguments
    pub n_args: usize,
    /// Whether it returns a value
    pub has_return: bool,
    /// Resolved instruction texts
    pub ops: Vec<String>,
    /// One flag per instruction
    pub breakpoints: Vec<bool>,
}

/// Payload element of `get_modules`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleInfo {
    /// Module name
    pub name: String,
    /// Declared types
    pub types: Vec<TypeInfo>,
    /// Functions in identifier order
    pub functions: Vec<FunctionInfo>,
}

impl From<ModuleView> for ModuleInfo {
    fn from(view: ModuleView) -> Self {
        Self {
            name: view.name,
            types: view
                .types
                .into_iter()
                .map(|(name, fields)| TypeInfo { name, fields })
                .collect(),
            functions: view
                .functions
                .into_iter()
                .map(|f| {
                    let mut breakpoints = vec![false; f.ops.len()];
                    for index in f.breakpoints {
                        if let Some(bit) = breakpoints.get_mut(index) {
                            *bit = true;
                        }
                    }
                    FunctionInfo {
                        id: f.id.to_string(),
                        n_args: f.n_args,
                        has_return: f.has_return,
                        ops: f.ops,
                        breakpoints,
                    }
                })
                .collect(),
        }
    }
}

/// Payload of `get_current_frame`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameInfo {
    /// Function being executed
    pub function: String,
    /// Instruction about to execute
    pub index: usize,
    /// Its text
    pub instruction: String,
    /// Frame depth
    pub depth: usize,
    /// Releases from suspension so far
    pub step_count: u64,
    /// Human-readable stack dump
    pub dump: String,
}

impl FrameInfo {
    /// Builds the payload from a snapshot.
    pub fn from_snapshot(snapshot: &EngineSnapshot) -> Self {
        Self {
            function: snapshot.function.to_string(),
            index: snapshot.pc.index,
            instruction: snapshot.instruction.clone(),
            depth: snapshot.depth,
            step_count: snapshot.step_count,
            dump: snapshot.to_string(),
        }
    }
}

/// Payload of `await_run_state_changed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStateInfo {
    /// Generation to pass as `seen` next time
    pub generation: u64,
    /// State reached
    pub state: WireRunState,
}

/// [`RunState`] on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WireRunState {
    /// Executing freely
    Running,
    /// Blocked at an instruction boundary
    Suspended,
    /// Executing until a step completes
    Stepping,
    /// Finished
    Exited,
}

impl From<RunState> for WireRunState {
    fn from(state: RunState) -> Self {
        match state {
            RunState::Running => WireRunState::Running,
            RunState::Suspended => WireRunState::Suspended,
            RunState::Stepping => WireRunState::Stepping,
            RunState::Exited => WireRunState::Exited,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_shape() {
        let request = Request {
            seq: 3,
            command: Command::SetBreakpoint {
                function: "app::main".into(),
                index: 2,
            },
        };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({"seq": 3, "command": "set_breakpoint", "function": "app::main", "index": 2})
        );

        let step: Request = serde_json::from_str(r#"{"seq":9,"command":"step_over"}"#).unwrap();
        assert_eq!(step.command, Command::StepOver);
        assert_eq!(step.command.name(), "step_over");
    }

    #[test]
    fn test_optional_timeout() {
        let request: Request =
            serde_json::from_str(r#"{"seq":1,"command":"await_run_state_changed","seen":4}"#)
                .unwrap();
        assert_eq!(
            request.command,
            Command::AwaitRunStateChanged {
                seen: 4,
                timeout_ms: None
            }
        );
    }

    #[test]
    fn test_response_shape() {
        let ok = Response::ok(5, json!(true));
        assert_eq!(serde_json::to_string(&ok).unwrap(), r#"{"seq":5,"ok":true}"#);
        let err = Response::error(6, "program is not suspended");
        assert_eq!(
            serde_json::to_string(&err).unwrap(),
            r#"{"seq":6,"error":"program is not suspended"}"#
        );
        let back: Response = serde_json::from_str(r#"{"seq":6,"error":"nope"}"#).unwrap();
        assert_eq!(back.outcome, Outcome::Error("nope".into()));
    }

    #[test]
    fn test_unknown_command_is_rejected() {
        assert!(serde_json::from_str::<Request>(r#"{"seq":1,"command":"explode"}"#).is_err());
    }
}
