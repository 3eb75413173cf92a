// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! SQLite-backed canonical identity store.
//!
//! Uniqueness is enforced by the table's UNIQUE constraints, never by a
//! pre-check: the constraint is the single source of truth when two
//! registrations for the same username race.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::error::IdentityStoreError;

/// Durable identity row owned by this service.
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalIdentity {
	pub id: Uuid,
	pub username: String,
	pub email: String,
	pub active: bool,
	pub created_at: DateTime<Utc>,
}

/// Collaborator interface over the relational identity store.
#[async_trait]
pub trait IdentityStore: Send + Sync {
	async fn create(&self, username: &str, email: &str)
		-> Result<CanonicalIdentity, IdentityStoreError>;
	async fn get_by_id(&self, id: Uuid) -> Result<Option<CanonicalIdentity>, IdentityStoreError>;
	async fn get_by_username(
		&self,
		username: &str,
	) -> Result<Option<CanonicalIdentity>, IdentityStoreError>;
	async fn activate(&self, id: Uuid) -> Result<bool, IdentityStoreError>;
	async fn delete(&self, id: Uuid) -> Result<bool, IdentityStoreError>;
}

/// Create the identities table if it does not exist.
pub async fn init_schema(pool: &SqlitePool) -> Result<(), IdentityStoreError> {
	sqlx::query(
		r#"
        CREATE TABLE IF NOT EXISTS identities (
            id TEXT PRIMARY KEY,
            username TEXT NOT NULL UNIQUE,
            email TEXT NOT NULL UNIQUE,
            active INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL
        )
        "#,
	)
	.execute(pool)
	.await
	.map_err(IdentityStoreError::Database)?;
	Ok(())
}

/// SQLite implementation of the identity store.
#[derive(Clone)]
pub struct SqliteIdentityStore {
	pool: SqlitePool,
}

impl SqliteIdentityStore {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}
}

#[derive(sqlx::FromRow)]
struct IdentityRow {
	id: String,
	username: String,
	email: String,
	active: i32,
	created_at: String,
}

impl TryFrom<IdentityRow> for CanonicalIdentity {
	type Error = IdentityStoreError;

	fn try_from(row: IdentityRow) -> Result<Self, IdentityStoreError> {
		Ok(CanonicalIdentity {
			id: row
				.id
				.parse()
				.map_err(|_| IdentityStoreError::Database(sqlx::Error::ColumnDecode {
					index: "id".to_string(),
					source: "invalid identity id".into(),
				}))?,
			username: row.username,
			email: row.email,
			active: row.active != 0,
			created_at: DateTime::parse_from_rfc3339(&row.created_at)
				.map_err(|e| {
					IdentityStoreError::Database(sqlx::Error::ColumnDecode {
						index: "created_at".to_string(),
						source: e.into(),
					})
				})?
				.with_timezone(&Utc),
		})
	}
}

fn unique_violation_column(e: &sqlx::Error) -> Option<&'static str> {
	let db = e.as_database_error()?;
	let message = db.message();
	if !message.contains("UNIQUE constraint failed") {
		return None;
	}
	if message.contains("identities.username") {
		Some("username")
	} else if message.contains("identities.email") {
		Some("email")
	} else {
		None
	}
}

#[async_trait]
impl IdentityStore for SqliteIdentityStore {
	#[instrument(skip(self))]
	async fn create(
		&self,
		username: &str,
		email: &str,
	) -> Result<CanonicalIdentity, IdentityStoreError> {
		let mut tx = self
			.pool
			.begin()
			.await
			.map_err(IdentityStoreError::Session)?;

		let identity = CanonicalIdentity {
			id: Uuid::new_v4(),
			username: username.to_string(),
			email: email.to_string(),
			active: false,
			created_at: Utc::now(),
		};

		let result = sqlx::query(
			"INSERT INTO identities (id, username, email, active, created_at) VALUES (?, ?, ?, 0, ?)",
		)
		.bind(identity.id.to_string())
		.bind(&identity.username)
		.bind(&identity.email)
		.bind(identity.created_at.to_rfc3339())
		.execute(&mut *tx)
		.await;

		match result {
			Ok(_) => {
				tx.commit().await.map_err(IdentityStoreError::Database)?;
				debug!(identity_id = %identity.id, username = %identity.username, "identity created");
				Ok(identity)
			}
			Err(e) => match unique_violation_column(&e) {
				Some("username") => Err(IdentityStoreError::DuplicateUsername(username.to_string())),
				Some(_) => Err(IdentityStoreError::DuplicateEmail(email.to_string())),
				None => {
					// Undo any partial write on this unit of work before
					// reporting the failure.
					let _ = tx.rollback().await;
					Err(IdentityStoreError::Database(e))
				}
			},
		}
	}

	#[instrument(skip(self))]
	async fn get_by_id(&self, id: Uuid) -> Result<Option<CanonicalIdentity>, IdentityStoreError> {
		let row: Option<IdentityRow> = sqlx::query_as(
			"SELECT id, username, email, active, created_at FROM identities WHERE id = ?",
		)
		.bind(id.to_string())
		.fetch_optional(&self.pool)
		.await
		.map_err(IdentityStoreError::Database)?;

		row.map(CanonicalIdentity::try_from).transpose()
	}

	#[instrument(skip(self))]
	async fn get_by_username(
		&self,
		username: &str,
	) -> Result<Option<CanonicalIdentity>, IdentityStoreError> {
		let row: Option<IdentityRow> = sqlx::query_as(
			"SELECT id, username, email, active, created_at FROM identities WHERE username = ?",
		)
		.bind(username)
		.fetch_optional(&self.pool)
		.await
		.map_err(IdentityStoreError::Database)?;

		row.map(CanonicalIdentity::try_from).transpose()
	}

	#[instrument(skip(self))]
	async fn activate(&self, id: Uuid) -> Result<bool, IdentityStoreError> {
		let result = sqlx::query("UPDATE identities SET active = 1 WHERE id = ?")
			.bind(id.to_string())
			.execute(&self.pool)
			.await
			.map_err(IdentityStoreError::Database)?;
		Ok(result.rows_affected() > 0)
	}

	#[instrument(skip(self))]
	async fn delete(&self, id: Uuid) -> Result<bool, IdentityStoreError> {
		let result = sqlx::query("DELETE FROM identities WHERE id = ?")
			.bind(id.to_string())
			.execute(&self.pool)
			.await
			.map_err(IdentityStoreError::Database)?;
		Ok(result.rows_affected() > 0)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use sqlx::sqlite::SqlitePoolOptions;

	async fn setup_store() -> SqliteIdentityStore {
		let pool = SqlitePoolOptions::new()
			.max_connections(1)
			.connect("sqlite::memory:")
			.await
			.unwrap();
		init_schema(&pool).await.unwrap();
		SqliteIdentityStore::new(pool)
	}

	#[tokio::test]
	async fn test_create_and_get() {
		let store = setup_store().await;
		let identity = store.create("alice", "alice@x.com").await.unwrap();

		let fetched = store.get_by_id(identity.id).await.unwrap().unwrap();
		assert_eq!(fetched, identity);
		assert!(!fetched.active);

		let by_name = store.get_by_username("alice").await.unwrap().unwrap();
		assert_eq!(by_name, identity);
		assert!(store.get_by_username("nobody").await.unwrap().is_none());
	}

	#[tokio::test]
	async fn test_duplicate_username_is_typed() {
		let store = setup_store().await;
		store.create("alice", "alice@x.com").await.unwrap();

		let result = store.create("alice", "other@x.com").await;
		match result {
			Err(IdentityStoreError::DuplicateUsername(name)) => assert_eq!(name, "alice"),
			other => panic!("expected duplicate username, got {other:?}"),
		}
	}

	#[tokio::test]
	async fn test_duplicate_email_is_typed() {
		let store = setup_store().await;
		store.create("alice", "dup@x.com").await.unwrap();

		let result = store.create("bob", "dup@x.com").await;
		match result {
			Err(IdentityStoreError::DuplicateEmail(email)) => assert_eq!(email, "dup@x.com"),
			other => panic!("expected duplicate email, got {other:?}"),
		}
	}

	#[tokio::test]
	async fn test_activate_and_delete() {
		let store = setup_store().await;
		let identity = store.create("alice", "alice@x.com").await.unwrap();

		assert!(store.activate(identity.id).await.unwrap());
		assert!(store.get_by_id(identity.id).await.unwrap().unwrap().active);

		assert!(store.delete(identity.id).await.unwrap());
		assert!(store.get_by_id(identity.id).await.unwrap().is_none());
		assert!(!store.delete(identity.id).await.unwrap());
	}

	#[tokio::test]
	async fn test_unavailable_store_is_session_error() {
		let store = setup_store().await;
		store.pool.close().await;

		let result = store.create("alice", "alice@x.com").await;
		assert!(matches!(result, Err(IdentityStoreError::Session(_))));
	}

	#[tokio::test]
	async fn test_missing_table_is_database_error() {
		let pool = SqlitePoolOptions::new()
			.max_connections(1)
			.connect("sqlite::memory:")
			.await
			.unwrap();
		let store = SqliteIdentityStore::new(pool);

		let result = store.create("alice", "alice@x.com").await;
		assert!(matches!(result, Err(IdentityStoreError::Database(_))));
	}
}
