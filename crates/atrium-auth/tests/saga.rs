// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! End-to-end tests for the user-provisioning saga.
//!
//! Tests cover:
//! - Happy path from registration to a usable local auth record
//! - Duplicate detection on the canonical store with credential cleanup
//! - Idempotence of the terminal step under racing registrations
//! - Abandoned registrations whose staged credential expired
//! - Lifecycle events propagating deletes back to the auth side

use std::sync::Arc;
use std::time::Duration;

use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use tokio::time::sleep;

use atrium_auth::{
	verify_password, AuthUserStore, ProvisioningFinalizer, ProvisioningInitiator,
	SqliteAuthUserStore, UserLifecycleHandler,
};
use atrium_bus::{Broker, BusClient};
use atrium_identity::{IdentityCreator, IdentityStore, SqliteIdentityStore};
use atrium_provisioning_core::wire::{
	event_types, AUTH_EVENTS_EXCHANGE, USER_CREATED_KEY, USER_CREATION_KEY,
	USER_CREATION_QUEUE, USER_CREATION_RESPONSE_QUEUE, USER_EVENTS_EXCHANGE, USER_LIFECYCLE_QUEUE,
	USER_SYNC_KEY,
};
use atrium_provisioning_core::UserLifecycleEvent;
use atrium_staging::SqliteStagingStore;

struct Saga {
	bus: Arc<BusClient>,
	initiator: ProvisioningInitiator,
	identities: Arc<SqliteIdentityStore>,
	auth_users: Arc<SqliteAuthUserStore>,
	staging_pool: SqlitePool,
	identity_pool: SqlitePool,
	auth_pool: SqlitePool,
}

async fn memory_pool() -> SqlitePool {
	SqlitePoolOptions::new()
		.max_connections(1)
		.connect("sqlite::memory:")
		.await
		.unwrap()
}

/// Wires both halves of the saga onto one in-process broker.
async fn setup(registration_window: Duration) -> Saga {
	let staging_pool = memory_pool().await;
	atrium_staging::init_schema(&staging_pool).await.unwrap();
	let staging = Arc::new(SqliteStagingStore::new(staging_pool.clone()));

	let identity_pool = memory_pool().await;
	atrium_identity::init_schema(&identity_pool).await.unwrap();
	let identities = Arc::new(SqliteIdentityStore::new(identity_pool.clone()));

	let auth_pool = memory_pool().await;
	atrium_auth::init_schema(&auth_pool).await.unwrap();
	let auth_users = Arc::new(SqliteAuthUserStore::new(auth_pool.clone()));

	let bus = Arc::new(BusClient::new(Broker::new()));
	bus.initialize().await.unwrap();

	bus.subscribe(
		USER_CREATION_QUEUE,
		AUTH_EVENTS_EXCHANGE,
		USER_CREATION_KEY,
		Arc::new(IdentityCreator::new(identities.clone(), bus.clone())),
	)
	.await
	.unwrap();

	bus.subscribe(
		USER_CREATION_RESPONSE_QUEUE,
		AUTH_EVENTS_EXCHANGE,
		USER_CREATED_KEY,
		Arc::new(ProvisioningFinalizer::new(
			staging.clone(),
			auth_users.clone(),
		)),
	)
	.await
	.unwrap();

	bus.subscribe(
		USER_LIFECYCLE_QUEUE,
		USER_EVENTS_EXCHANGE,
		USER_SYNC_KEY,
		Arc::new(UserLifecycleHandler::new(auth_users.clone())),
	)
	.await
	.unwrap();

	let initiator = ProvisioningInitiator::new(staging, bus.clone(), registration_window);

	Saga {
		bus,
		initiator,
		identities,
		auth_users,
		staging_pool,
		identity_pool,
		auth_pool,
	}
}

async fn count(pool: &SqlitePool, table: &str) -> i64 {
	let row: (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM {table}"))
		.fetch_one(pool)
		.await
		.unwrap();
	row.0
}

async fn wait_for<F, Fut>(what: &str, mut check: F)
where
	F: FnMut() -> Fut,
	Fut: std::future::Future<Output = bool>,
{
	for _ in 0..400 {
		if check().await {
			return;
		}
		sleep(Duration::from_millis(5)).await;
	}
	panic!("timed out waiting for {what}");
}

#[tokio::test]
async fn test_registration_reaches_local_auth_record() {
	let saga = setup(Duration::from_secs(300)).await;

	saga.initiator
		.submit("alice", "alice@x.com", "Secret123")
		.await
		.unwrap();

	wait_for("auth record", || {
		let pool = saga.auth_pool.clone();
		async move { count(&pool, "auth_users").await == 1 }
	})
	.await;

	let identity = saga
		.identities
		.get_by_username("alice")
		.await
		.unwrap()
		.expect("canonical identity should exist");
	let user = saga
		.auth_users
		.get_by_canonical_id(identity.id)
		.await
		.unwrap()
		.expect("auth record should be bound to the canonical identity");

	assert_eq!(user.username, "alice");
	assert_eq!(user.email, "alice@x.com");
	assert!(user.active);
	assert!(verify_password("Secret123", &user.password_hash).unwrap());

	// The staged credential was consumed and removed.
	wait_for("staging cleanup", || {
		let pool = saga.staging_pool.clone();
		async move { count(&pool, "staged_credentials").await == 0 }
	})
	.await;

	saga.bus.close().await;
}

#[tokio::test]
async fn test_duplicate_email_cleans_up_without_record() {
	let saga = setup(Duration::from_secs(300)).await;

	saga.identities
		.create("existing", "dup@x.com")
		.await
		.unwrap();

	saga.initiator
		.submit("bob", "dup@x.com", "Secret123")
		.await
		.unwrap();

	// The failure outcome deletes the staged credential.
	wait_for("staging cleanup after failure", || {
		let pool = saga.staging_pool.clone();
		async move { count(&pool, "staged_credentials").await == 0 }
	})
	.await;

	assert_eq!(count(&saga.auth_pool, "auth_users").await, 0);
	assert_eq!(count(&saga.identity_pool, "identities").await, 1);

	saga.bus.close().await;
}

#[tokio::test]
async fn test_racing_registrations_settle_on_one_record() {
	let saga = setup(Duration::from_secs(300)).await;

	// Same username from two clients; the canonical store decides the race.
	saga.initiator
		.submit("carol", "carol@x.com", "Secret123")
		.await
		.unwrap();
	saga.initiator
		.submit("carol", "carol@other.com", "Other456")
		.await
		.unwrap();

	wait_for("both outcomes settled", || {
		let auth = saga.auth_pool.clone();
		let staging = saga.staging_pool.clone();
		async move {
			count(&auth, "auth_users").await == 1
				&& count(&staging, "staged_credentials").await == 0
		}
	})
	.await;

	assert_eq!(count(&saga.identity_pool, "identities").await, 1);

	saga.bus.close().await;
}

#[tokio::test]
async fn test_expired_registration_window_aborts_finalization() {
	let saga = setup(Duration::from_secs(0)).await;

	saga.initiator
		.submit("dave", "dave@x.com", "Secret123")
		.await
		.unwrap();

	// The canonical identity is still created; only the local record is lost.
	wait_for("canonical identity", || {
		let pool = saga.identity_pool.clone();
		async move { count(&pool, "identities").await == 1 }
	})
	.await;

	sleep(Duration::from_millis(50)).await;
	assert_eq!(count(&saga.auth_pool, "auth_users").await, 0);

	saga.bus.close().await;
}

#[tokio::test]
async fn test_lifecycle_delete_removes_auth_record() {
	let saga = setup(Duration::from_secs(300)).await;

	saga.initiator
		.submit("erin", "erin@x.com", "Secret123")
		.await
		.unwrap();

	wait_for("auth record", || {
		let pool = saga.auth_pool.clone();
		async move { count(&pool, "auth_users").await == 1 }
	})
	.await;

	let identity = saga
		.identities
		.get_by_username("erin")
		.await
		.unwrap()
		.expect("canonical identity should exist");

	saga.bus
		.publish(
			USER_EVENTS_EXCHANGE,
			USER_SYNC_KEY,
			event_types::USER_DELETED,
			&UserLifecycleEvent {
				id: Some(identity.id),
				username: None,
				email: None,
			},
		)
		.await
		.unwrap();

	wait_for("auth record removed", || {
		let pool = saga.auth_pool.clone();
		async move { count(&pool, "auth_users").await == 0 }
	})
	.await;

	saga.bus.close().await;
}
