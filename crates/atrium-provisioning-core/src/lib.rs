// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Message contracts for the Atrium user-provisioning saga.
//!
//! The auth service and the identity service never share a database; the only
//! thing they share is the wire contract defined here: the event envelope,
//! the provisioning request/outcome payloads, and the exchange, routing-key,
//! and queue names both sides must agree on.

pub mod envelope;
pub mod messages;
pub mod wire;

pub use envelope::EventEnvelope;
pub use messages::{
	ProvisioningErrorKind, ProvisioningOutcome, ProvisioningRequest, UserLifecycleEvent,
};
