// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Executes decoded requests against a debugger control.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde_json::Value as Json;
use tracing::debug;

use corvid_vm::FunctionId;
use corvid_vm::debugger::DebuggerControl;

use crate::protocol::{
    Command, FrameInfo, HelloInfo, ModuleInfo, PROTOCOL_VERSION, Request, Response, RunStateInfo,
    WireRunState,
};

/// Turns requests into responses.
///
/// Handling may block (the `await_*` commands and `get_current_frame` wait
/// for the program), so the server calls it off the async runtime.
#[derive(Debug, Clone)]
pub struct Handler {
    control: Arc<DebuggerControl>,
}

impl Handler {
    /// Creates a handler for `control`.
    pub fn new(control: Arc<DebuggerControl>) -> Self {
        Self { control }
    }

    /// The controlled debugger.
    pub fn control(&self) -> &Arc<DebuggerControl> {
        &self.control
    }

    /// Handles one request; failures become error responses.
    pub fn handle(&self, request: Request) -> Response {
        let name = request.command.name();
        match self.execute(request.command) {
            Ok(payload) => Response::ok(request.seq, payload),
            Err(message) => {
                debug!(seq = request.seq, command = name, error = %message, "request failed");
                Response::error(request.seq, message)
            }
        }
    }

    fn execute(&self, command: Command) -> Result<Json, String> {
        let control = &self.control;
        match command {
            Command::Hello => to_json(HelloInfo {
                protocol: PROTOCOL_VERSION,
                server: format!("corvid-debug {}", env!("CARGO_PKG_VERSION")),
            }),
            Command::GetModules => {
                let modules: Vec<ModuleInfo> = control
                    .module_listing()
                    .into_iter()
                    .map(ModuleInfo::from)
                    .collect();
                to_json(modules)
            }
            Command::GetCurrentFrame => {
                let frame = control
                    .visit_state_under_lock(FrameInfo::from_snapshot)
                    .map_err(|e| e.to_string())?;
                to_json(frame)
            }
            Command::SetBreakpoint { function, index } => {
                let function = parse_function(&function)?;
                control
                    .set_breakpoint(&function, index)
                    .map_err(|e| e.to_string())?;
                Ok(Json::Null)
            }
            Command::ClearBreakpoint { function, index } => {
                let function = parse_function(&function)?;
                control
                    .clear_breakpoint(&function, index)
                    .map_err(|e| e.to_string())?;
                Ok(Json::Null)
            }
            Command::Suspend => unit(control.suspend()),
            Command::Resume => unit(control.resume()),
            Command::Step => unit(control.step()),
            Command::StepOver => unit(control.step_over()),
            Command::StepOut => unit(control.step_out()),
            Command::StepPastLine => unit(control.step_past_line()),
            Command::StepPastColumn => unit(control.step_past_column()),
            Command::IsSuspended => Ok(Json::Bool(control.is_suspended())),
            Command::AwaitSuspended { timeout_ms } => {
                unit(control.await_suspended(timeout_ms.map(Duration::from_millis)))
            }
            Command::AwaitRunStateChanged { seen, timeout_ms } => {
                let (generation, state) = control
                    .await_run_state_changed(seen, timeout_ms.map(Duration::from_millis))
                    .map_err(|e| e.to_string())?;
                to_json(RunStateInfo {
                    generation,
                    state: WireRunState::from(state),
                })
            }
        }
    }
}

fn parse_function(text: &str) -> Result<FunctionId, String> {
    text.parse::<FunctionId>().map_err(|e| e.to_string())
}

fn unit<E: std::fmt::Display>(result: Result<(), E>) -> Result<Json, String> {
    result.map(|()| Json::Null).map_err(|e| e.to_string())
}

fn to_json(payload: impl Serialize) -> Result<Json, String> {
    serde_json::to_value(payload).map_err(|e| e.to_string())
}
