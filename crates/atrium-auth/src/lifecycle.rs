// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Keeps local auth records in sync with user-lifecycle events fanned out
//! by the identity service.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, error, warn};

use atrium_bus::{Delivery, HandlerError, MessageHandler};
use atrium_provisioning_core::wire::event_types;
use atrium_provisioning_core::{EventEnvelope, UserLifecycleEvent};

use crate::store::AuthUserStore;

/// Handles `user.activated`, `user.deactivated`, and `user.deleted` events.
///
/// The delete path is also the compensating action for a canonical identity
/// that was rolled back after the local record had been created. Events the
/// auth side has no use for are acknowledged and ignored.
pub struct UserLifecycleHandler {
	users: Arc<dyn AuthUserStore>,
}

impl UserLifecycleHandler {
	pub fn new(users: Arc<dyn AuthUserStore>) -> Self {
		Self { users }
	}
}

#[async_trait]
impl MessageHandler for UserLifecycleHandler {
	async fn handle(&self, delivery: Delivery) -> Result<(), HandlerError> {
		let envelope: EventEnvelope = match serde_json::from_slice(&delivery.body) {
			Ok(envelope) => envelope,
			Err(e) => {
				error!(error = %e, "undecodable lifecycle event; dropping");
				return Ok(());
			}
		};

		let event: UserLifecycleEvent = match envelope.decode_data() {
			Ok(event) => event,
			Err(e) => {
				error!(error = %e, "malformed lifecycle payload; dropping");
				return Ok(());
			}
		};

		let Some(canonical_id) = event.id else {
			warn!(event_type = %envelope.event_type, "lifecycle event carries no user id; dropping");
			return Ok(());
		};

		let result = match envelope.event_type.as_str() {
			event_types::USER_ACTIVATED => self.users.set_active(canonical_id, true).await,
			event_types::USER_DEACTIVATED => self.users.set_active(canonical_id, false).await,
			event_types::USER_DELETED => self.users.delete_by_canonical_id(canonical_id).await,
			other => {
				debug!(event_type = %other, "lifecycle event not handled by auth side");
				return Ok(());
			}
		};

		match result {
			Ok(true) => {
				debug!(canonical_id = %canonical_id, event_type = %envelope.event_type, "lifecycle applied");
			}
			Ok(false) => {
				warn!(canonical_id = %canonical_id, event_type = %envelope.event_type, "no local record for lifecycle event");
			}
			Err(e) => {
				error!(canonical_id = %canonical_id, error = %e, "failed to apply lifecycle event");
			}
		}

		Ok(())
	}
}
