// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error types for the staging store.

use thiserror::Error;

/// Errors that can occur against the staging backend.
///
/// Only `put` surfaces these to callers: an unstaged credential makes the
/// saga unrunnable, so registration must fail fast. Reads and deletes
/// swallow backend errors to "absent" / "not deleted" instead.
#[derive(Debug, Error)]
pub enum StagingError {
	/// The backing store rejected the write.
	#[error("staging backend error: {0}")]
	Backend(#[from] sqlx::Error),
}
