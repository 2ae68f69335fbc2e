// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Error types for the debugger protocol

use thiserror::Error;

/// Result type for protocol operations
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Errors raised by the server or client
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Socket error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed message
    #[error("malformed message: {0}")]
    Json(#[from] serde_json::Error),

    /// The server answered with an error
    #[error("{0}")]
    Remote(String),

    /// The connection closed before the response arrived
    #[error("connection closed")]
    Disconnected,
}
