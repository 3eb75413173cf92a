// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! SQLite-backed local auth-user store.
//!
//! A row here is bound 1:1 to a canonical identity via `canonical_id`; the
//! UNIQUE constraint on that column is what makes a redelivered Success
//! outcome fail cleanly instead of creating a second record.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::error::AuthStoreError;

/// Durable auth record owned by the auth service.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthUser {
	pub id: Uuid,
	pub username: String,
	pub email: String,
	pub password_hash: String,
	pub canonical_id: Uuid,
	pub active: bool,
	pub created_at: DateTime<Utc>,
}

/// Fields required to create an auth record.
#[derive(Debug, Clone)]
pub struct NewAuthUser {
	pub username: String,
	pub email: String,
	pub password_hash: String,
	pub canonical_id: Uuid,
}

/// Collaborator interface over the local auth-user store.
#[async_trait]
pub trait AuthUserStore: Send + Sync {
	async fn create(&self, user: NewAuthUser) -> Result<AuthUser, AuthStoreError>;
	async fn get_by_canonical_id(&self, canonical_id: Uuid)
		-> Result<Option<AuthUser>, AuthStoreError>;
	async fn delete_by_canonical_id(&self, canonical_id: Uuid) -> Result<bool, AuthStoreError>;
	async fn set_active(&self, canonical_id: Uuid, active: bool) -> Result<bool, AuthStoreError>;
}

/// Create the auth_users table if it does not exist.
pub async fn init_schema(pool: &SqlitePool) -> Result<(), AuthStoreError> {
	sqlx::query(
		r#"
        CREATE TABLE IF NOT EXISTS auth_users (
            id TEXT PRIMARY KEY,
            username TEXT NOT NULL UNIQUE,
            email TEXT NOT NULL UNIQUE,
            password_hash TEXT NOT NULL,
            canonical_id TEXT NOT NULL UNIQUE,
            active INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL
        )
        "#,
	)
	.execute(pool)
	.await?;
	Ok(())
}

/// SQLite implementation of the auth-user store.
#[derive(Clone)]
pub struct SqliteAuthUserStore {
	pool: SqlitePool,
}

impl SqliteAuthUserStore {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}
}

#[derive(sqlx::FromRow)]
struct AuthUserRow {
	id: String,
	username: String,
	email: String,
	password_hash: String,
	canonical_id: String,
	active: i32,
	created_at: String,
}

impl TryFrom<AuthUserRow> for AuthUser {
	type Error = AuthStoreError;

	fn try_from(row: AuthUserRow) -> Result<Self, AuthStoreError> {
		let parse_uuid = |value: &str, column: &str| {
			value.parse().map_err(|_| {
				AuthStoreError::Database(sqlx::Error::ColumnDecode {
					index: column.to_string(),
					source: format!("invalid uuid in {column}").into(),
				})
			})
		};

		Ok(AuthUser {
			id: parse_uuid(&row.id, "id")?,
			username: row.username,
			email: row.email,
			password_hash: row.password_hash,
			canonical_id: parse_uuid(&row.canonical_id, "canonical_id")?,
			active: row.active != 0,
			created_at: DateTime::parse_from_rfc3339(&row.created_at)
				.map_err(|e| {
					AuthStoreError::Database(sqlx::Error::ColumnDecode {
						index: "created_at".to_string(),
						source: e.into(),
					})
				})?
				.with_timezone(&Utc),
		})
	}
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
	e.as_database_error()
		.map(|db| db.message().contains("UNIQUE constraint failed"))
		.unwrap_or(false)
}

#[async_trait]
impl AuthUserStore for SqliteAuthUserStore {
	#[instrument(skip(self, user), fields(username = %user.username, canonical_id = %user.canonical_id))]
	async fn create(&self, user: NewAuthUser) -> Result<AuthUser, AuthStoreError> {
		let record = AuthUser {
			id: Uuid::new_v4(),
			username: user.username,
			email: user.email,
			password_hash: user.password_hash,
			canonical_id: user.canonical_id,
			active: true,
			created_at: Utc::now(),
		};

		let result = sqlx::query(
			r#"
            INSERT INTO auth_users (id, username, email, password_hash, canonical_id, active, created_at)
            VALUES (?, ?, ?, ?, ?, 1, ?)
            "#,
		)
		.bind(record.id.to_string())
		.bind(&record.username)
		.bind(&record.email)
		.bind(&record.password_hash)
		.bind(record.canonical_id.to_string())
		.bind(record.created_at.to_rfc3339())
		.execute(&self.pool)
		.await;

		match result {
			Ok(_) => {
				debug!(auth_user_id = %record.id, "auth record created");
				Ok(record)
			}
			Err(e) if is_unique_violation(&e) => Err(AuthStoreError::Conflict(format!(
				"auth record already exists for {}",
				record.canonical_id
			))),
			Err(e) => Err(AuthStoreError::Database(e)),
		}
	}

	#[instrument(skip(self))]
	async fn get_by_canonical_id(
		&self,
		canonical_id: Uuid,
	) -> Result<Option<AuthUser>, AuthStoreError> {
		let row: Option<AuthUserRow> = sqlx::query_as(
			r#"
            SELECT id, username, email, password_hash, canonical_id, active, created_at
            FROM auth_users WHERE canonical_id = ?
            "#,
		)
		.bind(canonical_id.to_string())
		.fetch_optional(&self.pool)
		.await?;

		row.map(AuthUser::try_from).transpose()
	}

	#[instrument(skip(self))]
	async fn delete_by_canonical_id(&self, canonical_id: Uuid) -> Result<bool, AuthStoreError> {
		let result = sqlx::query("DELETE FROM auth_users WHERE canonical_id = ?")
			.bind(canonical_id.to_string())
			.execute(&self.pool)
			.await?;
		Ok(result.rows_affected() > 0)
	}

	#[instrument(skip(self))]
	async fn set_active(&self, canonical_id: Uuid, active: bool) -> Result<bool, AuthStoreError> {
		let result = sqlx::query("UPDATE auth_users SET active = ? WHERE canonical_id = ?")
			.bind(if active { 1 } else { 0 })
			.bind(canonical_id.to_string())
			.execute(&self.pool)
			.await?;
		Ok(result.rows_affected() > 0)
	}
}
