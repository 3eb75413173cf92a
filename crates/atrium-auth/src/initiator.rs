// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Entry point of the saga: accept a registration and hand identity
//! creation off to the identity service.

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};

use atrium_bus::BusClient;
use atrium_provisioning_core::wire::{event_types, AUTH_EVENTS_EXCHANGE, USER_CREATION_KEY};
use atrium_provisioning_core::ProvisioningRequest;
use atrium_staging::CredentialStaging;

use crate::error::ProvisioningError;

/// Accepts registrations and publishes provisioning requests.
///
/// `submit` returns as soon as the credential is staged and the request is
/// on its way; the caller is never blocked on remote identity creation and
/// only ever sees "accepted". Uniqueness is not validated here; the
/// canonical store downstream is the single source of truth for that race.
pub struct ProvisioningInitiator {
	staging: Arc<dyn CredentialStaging>,
	bus: Arc<BusClient>,
	registration_window: Duration,
}

impl ProvisioningInitiator {
	pub fn new(
		staging: Arc<dyn CredentialStaging>,
		bus: Arc<BusClient>,
		registration_window: Duration,
	) -> Self {
		Self {
			staging,
			bus,
			registration_window,
		}
	}

	#[instrument(skip(self, password), fields(username = %username))]
	pub async fn submit(
		&self,
		username: &str,
		email: &str,
		password: &str,
	) -> Result<(), ProvisioningError> {
		// Stage first: if this fails nothing has been published, so the
		// caller can retry with no cleanup needed.
		let staging_key = self.staging.put(password, self.registration_window).await?;

		let request = ProvisioningRequest {
			username: username.to_string(),
			email: email.to_string(),
			staging_key: staging_key.clone(),
			submitted_at: Utc::now(),
		};

		// Fire-and-forget: a bus outage must not fail the registration
		// that already returned "accepted". The staged credential is left
		// to expire on its own TTL.
		if let Err(e) = self
			.bus
			.publish(
				AUTH_EVENTS_EXCHANGE,
				USER_CREATION_KEY,
				event_types::USER_CREATION_REQUESTED,
				&request,
			)
			.await
		{
			warn!(staging_key = %staging_key, error = %e, "failed to publish provisioning request");
		}

		info!(staging_key = %staging_key, "registration accepted");
		Ok(())
	}
}
