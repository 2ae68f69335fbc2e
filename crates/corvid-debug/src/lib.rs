// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! # corvid-debug
//!
//! Remote control of a running Corvid program.
//!
//! A [`DebugServer`] exposes a [`DebuggerControl`](corvid_vm::debugger::DebuggerControl)
//! over TCP using newline-delimited JSON ([`protocol`]); a [`DebugClient`]
//! speaks the same protocol from the other end.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use corvid_debug::{DebugClient, DebugServer};
//! use corvid_vm::debugger::DebuggerControl;
//! use corvid_vm::{Source, compile};
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let program = Arc::new(compile(&[Source::new("app", "corvid 1\nFUNC - main 1 1 0\n  PUSH_INT 0\n  RET\n")])?);
//! let control = Arc::new(DebuggerControl::new(program, true));
//! let server = DebugServer::bind("127.0.0.1:0", control).await?;
//! let addr = server.local_addr()?;
//! tokio::spawn(server.run());
//!
//! let client = DebugClient::connect(addr).await?;
//! client.hello().await?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod client;
pub mod error;
pub mod handler;
pub mod protocol;
pub mod server;

pub use client::DebugClient;
pub use error::{ProtocolError, Result};
pub use handler::Handler;
pub use protocol::{Command, Request, Response};
pub use server::{DebugServer, serve_connection};
