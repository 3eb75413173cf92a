// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Self-describing JSON envelope carried by every bus message.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Wire envelope: a top-level `event_type` discriminator plus a nested
/// `data` payload. Consumers dispatch on `event_type` before decoding
/// `data` into a concrete message type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
	pub event_type: String,
	pub data: serde_json::Value,
}

impl EventEnvelope {
	/// Wrap a payload in an envelope. Fails only if the payload itself
	/// cannot be represented as JSON.
	pub fn new<T: Serialize>(event_type: &str, payload: &T) -> Result<Self, serde_json::Error> {
		Ok(Self {
			event_type: event_type.to_string(),
			data: serde_json::to_value(payload)?,
		})
	}

	/// Decode the nested payload into a concrete message type.
	pub fn decode_data<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
		serde_json::from_value(self.data.clone())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde::Deserialize;

	#[derive(Serialize, Deserialize)]
	struct Payload {
		name: String,
	}

	#[test]
	fn test_envelope_round_trip() {
		let envelope = EventEnvelope::new(
			"user.created",
			&Payload {
				name: "alice".to_string(),
			},
		)
		.unwrap();

		let bytes = serde_json::to_vec(&envelope).unwrap();
		let decoded: EventEnvelope = serde_json::from_slice(&bytes).unwrap();

		assert_eq!(decoded.event_type, "user.created");
		let payload: Payload = decoded.decode_data().unwrap();
		assert_eq!(payload.name, "alice");
	}

	#[test]
	fn test_decode_data_wrong_shape_fails() {
		let envelope = EventEnvelope {
			event_type: "user.created".to_string(),
			data: serde_json::json!(["not", "an", "object"]),
		};

		let result: Result<Payload, _> = envelope.decode_data();
		assert!(result.is_err());
	}
}
