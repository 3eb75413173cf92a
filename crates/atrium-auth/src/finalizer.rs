// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Terminal step of the saga: turn a provisioning outcome into a local
//! auth record, and clean up the staged credential.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

use atrium_bus::{Delivery, HandlerError, MessageHandler};
use atrium_provisioning_core::wire::event_types;
use atrium_provisioning_core::{EventEnvelope, ProvisioningOutcome, ProvisioningRequest};
use atrium_staging::CredentialStaging;
use uuid::Uuid;

use crate::error::AuthStoreError;
use crate::password::hash_password;
use crate::store::{AuthUserStore, NewAuthUser};

/// Handles `user.created` outcome messages from the identity service.
///
/// Structurally bad messages are logged and dropped, never requeued;
/// retrying cannot fix a malformed payload. On a failure outcome the staged
/// credential is deleted and no record is created. On success the staged
/// password is retrieved, hashed, and bound to the canonical identity; only
/// then is the credential deleted. If the local insert fails the credential
/// is deliberately left in place for its bounded TTL window rather than
/// silently losing the password.
pub struct ProvisioningFinalizer {
	staging: Arc<dyn CredentialStaging>,
	users: Arc<dyn AuthUserStore>,
}

impl ProvisioningFinalizer {
	pub fn new(staging: Arc<dyn CredentialStaging>, users: Arc<dyn AuthUserStore>) -> Self {
		Self { staging, users }
	}

	#[instrument(skip(self, request), fields(username = %request.username, staging_key = %request.staging_key))]
	async fn handle_failure(&self, request: &ProvisioningRequest) {
		if request.staging_key.is_empty() {
			warn!("failure outcome carries no staging key; nothing to clean up");
			return;
		}

		if self.staging.delete(&request.staging_key).await {
			info!("staged credential cleaned up after remote failure");
		} else {
			warn!("staged credential was already gone");
		}
	}

	#[instrument(skip(self, request), fields(username = %request.username, canonical_id = %canonical_id))]
	async fn handle_success(&self, canonical_id: Uuid, request: &ProvisioningRequest) {
		if request.staging_key.is_empty() {
			error!("success outcome carries no staging key; dropping");
			return;
		}

		let Some(password) = self.staging.get(&request.staging_key).await else {
			// The registration window likely expired before the outcome
			// arrived. The registration is lost; all we can do is say so.
			error!(
				staging_key = %request.staging_key,
				"staged credential missing or expired; aborting finalization"
			);
			return;
		};

		let password_hash = match hash_password(&password) {
			Ok(hash) => hash,
			Err(e) => {
				// Leave the credential for the retry window.
				error!(error = %e, "failed to hash staged password");
				return;
			}
		};

		let created = self
			.users
			.create(NewAuthUser {
				username: request.username.clone(),
				email: request.email.clone(),
				password_hash,
				canonical_id,
			})
			.await;

		match created {
			Ok(user) => {
				info!(auth_user_id = %user.id, "local auth record created");
				if !self.staging.delete(&request.staging_key).await {
					warn!(staging_key = %request.staging_key, "staged credential already deleted");
				}
			}
			Err(AuthStoreError::Conflict(message)) => {
				// Redelivered Success or a local race; the credential stays
				// for the bounded retry window rather than being lost.
				warn!(conflict = %message, "auth record already exists; leaving staged credential");
			}
			Err(e) => {
				error!(error = %e, "failed to create auth record; leaving staged credential");
			}
		}
	}
}

#[async_trait]
impl MessageHandler for ProvisioningFinalizer {
	async fn handle(&self, delivery: Delivery) -> Result<(), HandlerError> {
		let envelope: EventEnvelope = match serde_json::from_slice(&delivery.body) {
			Ok(envelope) => envelope,
			Err(e) => {
				error!(error = %e, "undecodable provisioning outcome; dropping");
				return Ok(());
			}
		};

		if envelope.event_type != event_types::USER_CREATED {
			warn!(event_type = %envelope.event_type, "unexpected event type; dropping");
			return Ok(());
		}

		let outcome: ProvisioningOutcome = match envelope.decode_data() {
			Ok(outcome) => outcome,
			Err(e) => {
				error!(error = %e, "malformed provisioning outcome payload; dropping");
				return Ok(());
			}
		};

		match outcome {
			ProvisioningOutcome::Error {
				error_type,
				message,
				original_request,
			} => {
				warn!(
					username = %original_request.username,
					?error_type,
					message = %message,
					"remote identity creation failed"
				);
				self.handle_failure(&original_request).await;
			}
			ProvisioningOutcome::Success {
				id,
				original_request,
				..
			} => {
				let Some(canonical_id) = id else {
					error!(
						username = %original_request.username,
						"success outcome carries no canonical id; dropping"
					);
					return Ok(());
				};
				self.handle_success(canonical_id, &original_request).await;
			}
		}

		Ok(())
	}
}
