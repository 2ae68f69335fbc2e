// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! An async client for the debugger protocol.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde_json::Value as Json;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpStream, ToSocketAddrs};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::{ProtocolError, Result};
use crate::protocol::{
    Command, FrameInfo, HelloInfo, ModuleInfo, Outcome, Request, Response, RunStateInfo,
};

type Pending = Arc<Mutex<HashMap<u64, oneshot::Sender<Response>>>>;

/// A connection to a debug server.
///
/// Requests may be issued concurrently; each waits for the response with
/// its own sequence number.
pub struct DebugClient {
    writer: tokio::sync::Mutex<OwnedWriteHalf>,
    pending: Pending,
    next_seq: AtomicU64,
    reader: JoinHandle<()>,
}

impl DebugClient {
    /// Connects to a server.
    pub async fn connect(addr: impl ToSocketAddrs) -> Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        let (reader, writer) = stream.into_split();
        let pending = Pending::default();
        let reader = tokio::spawn(read_responses(reader, pending.clone()));
        Ok(Self {
            writer: tokio::sync::Mutex::new(writer),
            pending,
            next_seq: AtomicU64::new(1),
            reader,
        })
    }

    /// Sends a command and waits for its payload.
    pub async fn request(&self, command: Command) -> Result<Json> {
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.pending.lock().insert(seq, tx);

        let mut line = serde_json::to_string(&Request { seq, command })?;
        line.push('\n');
        let sent = {
            let mut writer = self.writer.lock().await;
            match writer.write_all(line.as_bytes()).await {
                Ok(()) => writer.flush().await,
                Err(e) => Err(e),
            }
        };
        if let Err(e) = sent {
            self.pending.lock().remove(&seq);
            return Err(e.into());
        }

        let response = rx.await.map_err(|_| ProtocolError::Disconnected)?;
        match response.outcome {
            Outcome::Ok(payload) => Ok(payload),
            Outcome::Error(message) => Err(ProtocolError::Remote(message)),
        }
    }

    async fn typed<T: DeserializeOwned>(&self, command: Command) -> Result<T> {
        Ok(serde_json::from_value(self.request(command).await?)?)
    }

    async fn unit(&self, command: Command) -> Result<()> {
        self.request(command).await.map(|_| ())
    }

    /// Handshake.
    pub async fn hello(&self) -> Result<HelloInfo> {
        self.typed(Command::Hello).await
    }

    /// All loaded modules.
    pub async fn modules(&self) -> Result<Vec<ModuleInfo>> {
        self.typed(Command::GetModules).await
    }

    /// The suspended frame; waits for suspension.
    pub async fn current_frame(&self) -> Result<FrameInfo> {
        self.typed(Command::GetCurrentFrame).await
    }

    /// Sets a breakpoint.
    pub async fn set_breakpoint(&self, function: &str, index: usize) -> Result<()> {
        self.unit(Command::SetBreakpoint {
            function: function.to_string(),
            index,
        })
        .await
    }

    /// Clears a breakpoint.
    pub async fn clear_breakpoint(&self, function: &str, index: usize) -> Result<()> {
        self.unit(Command::ClearBreakpoint {
            function: function.to_string(),
            index,
        })
        .await
    }

    /// Asks the program to suspend.
    pub async fn suspend(&self) -> Result<()> {
        self.unit(Command::Suspend).await
    }

    /// Resumes the program.
    pub async fn resume(&self) -> Result<()> {
        self.unit(Command::Resume).await
    }

    /// Executes one instruction.
    pub async fn step(&self) -> Result<()> {
        self.unit(Command::Step).await
    }

    /// Steps over calls.
    pub async fn step_over(&self) -> Result<()> {
        self.unit(Command::StepOver).await
    }

    /// Runs until the current frame returns.
    pub async fn step_out(&self) -> Result<()> {
        self.unit(Command::StepOut).await
    }

    /// Runs until the source line changes.
    pub async fn step_past_line(&self) -> Result<()> {
        self.unit(Command::StepPastLine).await
    }

    /// Runs until the source position changes.
    pub async fn step_past_column(&self) -> Result<()> {
        self.unit(Command::StepPastColumn).await
    }

    /// Whether the program is suspended.
    pub async fn is_suspended(&self) -> Result<bool> {
        self.typed(Command::IsSuspended).await
    }

    /// Waits until the program is suspended.
    pub async fn await_suspended(&self, timeout_ms: Option<u64>) -> Result<()> {
        self.unit(Command::AwaitSuspended { timeout_ms }).await
    }

    /// Waits until the run state moves past generation `seen`.
    pub async fn await_run_state_changed(
        &self,
        seen: u64,
        timeout_ms: Option<u64>,
    ) -> Result<RunStateInfo> {
        self.typed(Command::AwaitRunStateChanged { seen, timeout_ms })
            .await
    }
}

impl Drop for DebugClient {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

async fn read_responses(reader: OwnedReadHalf, pending: Pending) {
    let mut lines = BufReader::new(reader).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                warn!(error = %e, "debug connection failed");
                break;
            }
        };
        let response: Response = match serde_json::from_str(&line) {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "dropping malformed response");
                continue;
            }
        };
        let waiter = pending.lock().remove(&response.seq);
        match waiter {
            Some(waiter) => {
                if waiter.send(response).is_err() {
                    debug!("requester gave up before the response arrived");
                }
            }
            None => warn!(seq = response.seq, "dropping response with no pending request"),
        }
    }
    // Wake every remaining requester with a disconnect.
    pending.lock().clear();
}
