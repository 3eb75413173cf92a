// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Provisioning configuration section.

use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ProvisioningConfigLayer {
	pub registration_window_secs: Option<u64>,
	pub purge_interval_secs: Option<u64>,
}

impl ProvisioningConfigLayer {
	pub fn merge(&mut self, other: Self) {
		if other.registration_window_secs.is_some() {
			self.registration_window_secs = other.registration_window_secs;
		}
		if other.purge_interval_secs.is_some() {
			self.purge_interval_secs = other.purge_interval_secs;
		}
	}

	pub fn finalize(self) -> ProvisioningConfig {
		ProvisioningConfig {
			registration_window_secs: self.registration_window_secs.unwrap_or(300), // 5 minutes
			purge_interval_secs: self.purge_interval_secs.unwrap_or(3600), // 1 hour
		}
	}
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProvisioningConfig {
	/// How long a staged credential stays retrievable before the
	/// registration is considered abandoned.
	pub registration_window_secs: u64,
	/// How often expired staged credentials are swept from the store.
	pub purge_interval_secs: u64,
}

impl ProvisioningConfig {
	pub fn registration_window(&self) -> Duration {
		Duration::from_secs(self.registration_window_secs)
	}

	pub fn purge_interval(&self) -> Duration {
		Duration::from_secs(self.purge_interval_secs)
	}
}

impl Default for ProvisioningConfig {
	fn default() -> Self {
		Self {
			registration_window_secs: 300, // 5 minutes
			purge_interval_secs: 3600,     // 1 hour
		}
	}
}
