// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! SQLite-backed staging store implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::time::Duration;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::error::StagingError;

/// Prefix identifying staged-credential keys.
pub const STAGING_KEY_PREFIX: &str = "cred:";

/// Collaborator interface for the transient credential store.
///
/// `put` propagates backend failures; `get` and `delete` never do. A staging
/// outage on the read side must not crash the saga, so those calls degrade
/// to "absent" / "not deleted" with a logged warning.
#[async_trait]
pub trait CredentialStaging: Send + Sync {
	async fn put(&self, secret: &str, ttl: Duration) -> Result<String, StagingError>;
	async fn get(&self, key: &str) -> Option<String>;
	async fn delete(&self, key: &str) -> bool;
}

/// Create the staging table if it does not exist.
pub async fn init_schema(pool: &SqlitePool) -> Result<(), StagingError> {
	sqlx::query(
		r#"
        CREATE TABLE IF NOT EXISTS staged_credentials (
            key TEXT PRIMARY KEY,
            secret TEXT NOT NULL,
            expires_at TEXT NOT NULL,
            created_at TEXT NOT NULL
        )
        "#,
	)
	.execute(pool)
	.await?;
	Ok(())
}

/// SQLite implementation of the staging store.
#[derive(Clone)]
pub struct SqliteStagingStore {
	pool: SqlitePool,
}

impl SqliteStagingStore {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}

	/// Delete every expired row. Intended for a periodic sweep; the read
	/// path also reaps expired rows lazily.
	#[instrument(skip(self))]
	pub async fn purge_expired(&self) -> Result<u64, StagingError> {
		let result = sqlx::query("DELETE FROM staged_credentials WHERE expires_at <= ?")
			.bind(Utc::now().to_rfc3339())
			.execute(&self.pool)
			.await?;

		let purged = result.rows_affected();
		if purged > 0 {
			debug!(purged, "purged expired staged credentials");
		}
		Ok(purged)
	}

	async fn remove(&self, key: &str) -> Result<bool, sqlx::Error> {
		let result = sqlx::query("DELETE FROM staged_credentials WHERE key = ?")
			.bind(key)
			.execute(&self.pool)
			.await?;
		Ok(result.rows_affected() > 0)
	}
}

#[async_trait]
impl CredentialStaging for SqliteStagingStore {
	/// Stage a secret under a freshly generated key. Keys are write-once;
	/// there is no update path.
	#[instrument(skip(self, secret))]
	async fn put(&self, secret: &str, ttl: Duration) -> Result<String, StagingError> {
		let key = format!("{STAGING_KEY_PREFIX}{}", Uuid::new_v4());
		let now = Utc::now();
		let expires_at = now + chrono::Duration::seconds(ttl.as_secs() as i64);

		sqlx::query(
			"INSERT INTO staged_credentials (key, secret, expires_at, created_at) VALUES (?, ?, ?, ?)",
		)
		.bind(&key)
		.bind(secret)
		.bind(expires_at.to_rfc3339())
		.bind(now.to_rfc3339())
		.execute(&self.pool)
		.await?;

		debug!(staging_key = %key, ttl_secs = ttl.as_secs(), "staged credential");
		Ok(key)
	}

	#[instrument(skip(self))]
	async fn get(&self, key: &str) -> Option<String> {
		let row: Result<Option<(String, String)>, sqlx::Error> =
			sqlx::query_as("SELECT secret, expires_at FROM staged_credentials WHERE key = ?")
				.bind(key)
				.fetch_optional(&self.pool)
				.await;

		let (secret, expires_at) = match row {
			Ok(Some(row)) => row,
			Ok(None) => return None,
			Err(e) => {
				warn!(staging_key = %key, error = %e, "staging read failed; treating as absent");
				return None;
			}
		};

		let expires_at = match DateTime::parse_from_rfc3339(&expires_at) {
			Ok(ts) => ts.with_timezone(&Utc),
			Err(e) => {
				warn!(staging_key = %key, error = %e, "unreadable expiry on staged credential");
				return None;
			}
		};

		if expires_at <= Utc::now() {
			// Lazy reaping: the TTL has passed, drop the row now.
			if let Err(e) = self.remove(key).await {
				warn!(staging_key = %key, error = %e, "failed to reap expired credential");
			}
			debug!(staging_key = %key, "staged credential expired");
			return None;
		}

		Some(secret)
	}

	#[instrument(skip(self))]
	async fn delete(&self, key: &str) -> bool {
		match self.remove(key).await {
			Ok(deleted) => deleted,
			Err(e) => {
				warn!(staging_key = %key, error = %e, "staging delete failed");
				false
			}
		}
	}
}
