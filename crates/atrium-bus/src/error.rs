// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error types for the message bus.

use thiserror::Error;

/// Errors that can occur when talking to the bus.
#[derive(Debug, Error)]
pub enum BusError {
	/// Published or bound against an exchange that was never declared.
	#[error("unknown exchange: {0}")]
	UnknownExchange(String),

	/// The payload could not be serialized to the wire encoding.
	#[error("failed to serialize message payload: {0}")]
	Serialize(#[from] serde_json::Error),
}

/// Result type for bus operations.
pub type Result<T> = std::result::Result<T, BusError>;

/// Error returned by a message handler. Handlers surface their own typed
/// errors; the consumer wrapper only needs to log them, so a boxed error is
/// enough at this boundary.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;
