// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Consumer side of the provisioning saga: creates canonical identities
//! and always answers with a terminal outcome event.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

use atrium_bus::{BusClient, Delivery, HandlerError, MessageHandler};
use atrium_provisioning_core::wire::{
	event_types, AUTH_EVENTS_EXCHANGE, USER_CREATED_KEY, USER_EVENTS_EXCHANGE, USER_SYNC_KEY,
};
use atrium_provisioning_core::{
	EventEnvelope, ProvisioningErrorKind, ProvisioningOutcome, ProvisioningRequest,
	UserLifecycleEvent,
};

use crate::error::IdentityStoreError;
use crate::store::IdentityStore;

/// Handles `user.creation_requested` messages.
///
/// Every consumed request produces exactly one published outcome at the
/// application level, whatever happens at the store: the auth side has no
/// other way to learn the result, and a dropped failure would orphan the
/// staged credential forever.
pub struct IdentityCreator {
	store: Arc<dyn IdentityStore>,
	bus: Arc<BusClient>,
}

impl IdentityCreator {
	pub fn new(store: Arc<dyn IdentityStore>, bus: Arc<BusClient>) -> Self {
		Self { store, bus }
	}

	#[instrument(skip(self, request), fields(username = %request.username))]
	async fn process(&self, request: ProvisioningRequest) -> ProvisioningOutcome {
		match self.store.create(&request.username, &request.email).await {
			Ok(identity) => {
				info!(identity_id = %identity.id, "canonical identity created");

				// Fan the fact out to lifecycle subscribers; failure here
				// does not change the saga outcome.
				let lifecycle = UserLifecycleEvent {
					id: Some(identity.id),
					username: Some(identity.username.clone()),
					email: Some(identity.email.clone()),
				};
				if let Err(e) = self
					.bus
					.publish(
						USER_EVENTS_EXCHANGE,
						USER_SYNC_KEY,
						event_types::USER_CREATED,
						&lifecycle,
					)
					.await
				{
					warn!(error = %e, "failed to publish lifecycle event");
				}

				ProvisioningOutcome::Success {
					id: Some(identity.id),
					username: identity.username,
					email: identity.email,
					original_request: request,
				}
			}
			Err(IdentityStoreError::DuplicateUsername(username)) => {
				warn!(username = %username, "provisioning failed: username taken");
				ProvisioningOutcome::Error {
					error_type: ProvisioningErrorKind::DuplicateUsername,
					message: format!("username already taken: {username}"),
					original_request: request,
				}
			}
			Err(IdentityStoreError::DuplicateEmail(email)) => {
				warn!(email = %email, "provisioning failed: email registered");
				ProvisioningOutcome::Error {
					error_type: ProvisioningErrorKind::DuplicateEmail,
					message: format!("email already registered: {email}"),
					original_request: request,
				}
			}
			Err(IdentityStoreError::Session(e)) => {
				error!(error = %e, "provisioning failed: could not open database session");
				ProvisioningOutcome::Error {
					error_type: ProvisioningErrorKind::SessionError,
					message: "database connection error".to_string(),
					original_request: request,
				}
			}
			Err(IdentityStoreError::Database(e)) => {
				error!(error = %e, "provisioning failed: database error");
				ProvisioningOutcome::Error {
					error_type: ProvisioningErrorKind::InternalError,
					message: format!("identity creation failed: {e}"),
					original_request: request,
				}
			}
		}
	}
}

#[async_trait]
impl MessageHandler for IdentityCreator {
	async fn handle(&self, delivery: Delivery) -> Result<(), HandlerError> {
		let envelope: EventEnvelope = match serde_json::from_slice(&delivery.body) {
			Ok(envelope) => envelope,
			Err(e) => {
				error!(error = %e, "undecodable provisioning request; dropping");
				return Ok(());
			}
		};

		if envelope.event_type != event_types::USER_CREATION_REQUESTED {
			warn!(event_type = %envelope.event_type, "unexpected event type; dropping");
			return Ok(());
		}

		let request: ProvisioningRequest = match envelope.decode_data() {
			Ok(request) => request,
			Err(e) => {
				error!(error = %e, "malformed provisioning request payload; dropping");
				return Ok(());
			}
		};

		let outcome = self.process(request).await;

		if let Err(e) = self
			.bus
			.publish(
				AUTH_EVENTS_EXCHANGE,
				USER_CREATED_KEY,
				event_types::USER_CREATED,
				&outcome,
			)
			.await
		{
			// Nothing more we can do; the redelivery policy on the request
			// queue is what eventually re-runs the saga.
			error!(error = %e, "failed to publish provisioning outcome");
		}

		Ok(())
	}
}
