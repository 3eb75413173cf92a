// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Exchange, routing-key, queue, and event-type names shared by both sides
//! of the saga. Queues are named per consumer role so redelivery survives
//! process restarts.

/// Topic exchange carrying identity-lifecycle events.
pub const USER_EVENTS_EXCHANGE: &str = "user_events";

/// Topic exchange carrying provisioning request/response traffic.
pub const AUTH_EVENTS_EXCHANGE: &str = "auth_events";

/// Routing key for provisioning requests (auth service → identity service).
pub const USER_CREATION_KEY: &str = "user_creation";

/// Routing key for terminal provisioning outcomes (identity service → auth
/// service).
pub const USER_CREATED_KEY: &str = "user.created";

/// Routing key for user-lifecycle sync events fanned out to read models.
pub const USER_SYNC_KEY: &str = "user.sync";

/// Durable queue consumed by the identity creator.
pub const USER_CREATION_QUEUE: &str = "user_creation";

/// Durable queue consumed by the provisioning finalizer.
pub const USER_CREATION_RESPONSE_QUEUE: &str = "user_creation_response";

/// Durable queue consumed by the auth-side lifecycle handler.
pub const USER_LIFECYCLE_QUEUE: &str = "user_lifecycle";

/// Event types carried in the envelope's `event_type` field.
pub mod event_types {
	pub const USER_CREATION_REQUESTED: &str = "user.creation_requested";
	pub const USER_CREATED: &str = "user.created";
	pub const USER_UPDATED: &str = "user.updated";
	pub const USER_DELETED: &str = "user.deleted";
	pub const USER_ACTIVATED: &str = "user.activated";
	pub const USER_DEACTIVATED: &str = "user.deactivated";
	pub const PASSWORD_CHANGED: &str = "user.password_changed";
}
