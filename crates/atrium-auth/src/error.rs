// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error types for the auth-side saga components.

use thiserror::Error;

use atrium_staging::StagingError;

/// Errors surfaced to the registration caller by the initiator.
///
/// Only a staging failure reaches the caller: nothing has been published at
/// that point, so the registration can simply be retried. A bus failure is
/// logged and swallowed instead; the HTTP response has already been decided.
#[derive(Debug, Error)]
pub enum ProvisioningError {
	/// The credential could not be staged; the saga is unrunnable.
	#[error("failed to stage credential: {0}")]
	Staging(#[from] StagingError),
}

/// Errors that can occur against the local auth-user store.
#[derive(Debug, Error)]
pub enum AuthStoreError {
	/// A record with the same username, email, or canonical id exists.
	#[error("auth record conflict: {0}")]
	Conflict(String),

	/// Any other persistence failure.
	#[error("database error: {0}")]
	Database(#[from] sqlx::Error),
}
