// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Durable topic message bus for Atrium services.
//!
//! This crate provides the in-process broker (named topic exchanges bound to
//! durable queues with AMQP-style routing-key patterns) and the `BusClient`
//! adapter the services hold. The client owns its connection handle and has
//! an explicit lifecycle (`initialize`/`close`); nothing here is a global.
//!
//! Delivery semantics are at-least-once with an ack-always poison-message
//! policy: a consumer acknowledges after its handler returns, and also
//! acknowledges (logging the error) when the handler fails, so a malformed
//! or unprocessable message is drained rather than redelivered forever.

pub mod broker;
pub mod client;
pub mod error;

pub use broker::{Broker, Delivery};
pub use client::{BusClient, MessageHandler};
pub use error::{BusError, HandlerError, Result};
