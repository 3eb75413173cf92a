// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Payload types for the provisioning saga.
//!
//! `ProvisioningRequest` is immutable once published and is embedded
//! verbatim inside the terminal `ProvisioningOutcome`, so the finalizer can
//! recover the original intent without a separate correlation store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A request to create a canonical identity, published by the auth service.
///
/// The password never travels in this payload; it is parked in the staging
/// store under `staging_key` for the duration of the saga. `staging_key`
/// defaults to empty on decode so a structurally incomplete message still
/// parses and can be rejected by the finalizer's correlation check rather
/// than failing as undecodable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProvisioningRequest {
	pub username: String,
	pub email: String,
	#[serde(default)]
	pub staging_key: String,
	pub submitted_at: DateTime<Utc>,
}

/// Why a provisioning request failed, as seen on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProvisioningErrorKind {
	DuplicateUsername,
	DuplicateEmail,
	InternalError,
	SessionError,
}

/// Terminal outcome of a provisioning request, published exactly once per
/// consumed request at the application level (the bus may still redeliver).
///
/// The canonical id is optional on the wire; the finalizer validates its
/// presence instead of rejecting the whole message as undecodable.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ProvisioningOutcome {
	Success {
		id: Option<Uuid>,
		username: String,
		email: String,
		original_request: ProvisioningRequest,
	},
	Error {
		error_type: ProvisioningErrorKind,
		message: String,
		original_request: ProvisioningRequest,
	},
}

impl ProvisioningOutcome {
	/// The request this outcome answers.
	pub fn original_request(&self) -> &ProvisioningRequest {
		match self {
			ProvisioningOutcome::Success {
				original_request, ..
			} => original_request,
			ProvisioningOutcome::Error {
				original_request, ..
			} => original_request,
		}
	}
}

/// Payload of a user-lifecycle sync event (`user.activated`,
/// `user.deactivated`, `user.deleted`, ...). All fields are optional on the
/// wire; consumers validate what they need.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserLifecycleEvent {
	pub id: Option<Uuid>,
	#[serde(default)]
	pub username: Option<String>,
	#[serde(default)]
	pub email: Option<String>,
}
