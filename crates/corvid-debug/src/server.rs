// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! The debugger socket server.
//!
//! Each connection gets one reader task and one writer task joined by a
//! channel. Every decoded request is handled on the blocking pool, so a
//! request that waits for the program never stalls the others; responses
//! are written in completion order and matched by sequence number.
//!
//! Closing a connection detaches the controller without resuming the
//! program.

use std::net::SocketAddr;
use std::sync::Arc;

use serde_json::Value as Json;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, BufWriter};
use tokio::net::{TcpListener, ToSocketAddrs};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use corvid_vm::debugger::DebuggerControl;

use crate::error::Result;
use crate::handler::Handler;
use crate::protocol::{Request, Response};

/// Responses buffered per connection before request handling waits.
const RESPONSE_QUEUE: usize = 100;

/// Serves the debugger protocol over TCP.
pub struct DebugServer {
    listener: TcpListener,
    handler: Handler,
}

impl DebugServer {
    /// Binds the listening socket.
    pub async fn bind(addr: impl ToSocketAddrs, control: Arc<DebuggerControl>) -> Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self {
            listener,
            handler: Handler::new(control),
        })
    }

    /// Address actually bound, useful with port 0.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accepts connections until the listener fails.
    pub async fn run(self) -> Result<()> {
        info!(addr = %self.local_addr()?, "debug server listening");
        loop {
            let (stream, peer) = self.listener.accept().await?;
            info!(peer = %peer, "debugger attached");
            let handler = self.handler.clone();
            tokio::spawn(async move {
                let (reader, writer) = stream.into_split();
                if let Err(e) = serve_connection(handler, reader, writer).await {
                    error!(peer = %peer, error = %e, "debugger connection failed");
                }
                info!(peer = %peer, "debugger detached");
            });
        }
    }
}

/// Serves one connection until the peer closes it.
pub async fn serve_connection<R, W>(handler: Handler, reader: R, writer: W) -> Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, mut rx) = mpsc::channel::<Response>(RESPONSE_QUEUE);

    let writer_task = tokio::spawn(async move {
        let mut writer = BufWriter::new(writer);
        while let Some(response) = rx.recv().await {
            let mut line = match serde_json::to_string(&response) {
                Ok(line) => line,
                Err(e) => {
                    error!(seq = response.seq, error = %e, "failed to encode response");
                    continue;
                }
            };
            line.push('\n');
            if let Err(e) = writer.write_all(line.as_bytes()).await {
                error!(error = %e, "failed to write response");
                break;
            }
            if let Err(e) = writer.flush().await {
                error!(error = %e, "failed to flush response");
                break;
            }
        }
    });

    let mut lines = BufReader::new(reader).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let request = match decode(&line) {
            Ok(request) => request,
            Err(response) => {
                if tx.send(response).await.is_err() {
                    break;
                }
                continue;
            }
        };
        debug!(seq = request.seq, command = request.command.name(), "request");

        let handler = handler.clone();
        let tx = tx.clone();
        tokio::spawn(async move {
            let seq = request.seq;
            let response = match tokio::task::spawn_blocking(move || handler.handle(request)).await
            {
                Ok(response) => response,
                Err(e) => {
                    error!(seq, error = %e, "request handler panicked");
                    Response::error(seq, "internal error")
                }
            };
            if tx.send(response).await.is_err() {
                debug!(seq, "connection closed before response was sent");
            }
        });
    }

    drop(tx);
    if let Err(e) = writer_task.await {
        error!(error = %e, "writer task failed");
    }
    Ok(())
}

/// Decodes a request line; a malformed line becomes an error response with
/// the best sequence number that can be recovered from it.
fn decode(line: &str) -> std::result::Result<Request, Response> {
    let raw: Json = match serde_json::from_str(line) {
        Ok(raw) => raw,
        Err(e) => {
            warn!(error = %e, "malformed request");
            return Err(Response::error(0, format!("malformed request: {}", e)));
        }
    };
    let seq = raw.get("seq").and_then(Json::as_u64).unwrap_or(0);
    serde_json::from_value(raw).map_err(|e| {
        warn!(seq, error = %e, "invalid request");
        Response::error(seq, format!("invalid request: {}", e))
    })
}
