// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error types for the identity store.

use thiserror::Error;

/// Errors that can occur when creating or mutating a canonical identity.
#[derive(Debug, Error)]
pub enum IdentityStoreError {
	/// Another identity already holds this username.
	#[error("username already taken: {0}")]
	DuplicateUsername(String),

	/// Another identity already holds this email.
	#[error("email already registered: {0}")]
	DuplicateEmail(String),

	/// A unit of work could not be opened at all (store unavailable).
	#[error("failed to open database session: {0}")]
	Session(sqlx::Error),

	/// Any other persistence failure.
	#[error("database error: {0}")]
	Database(sqlx::Error),
}
