// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Password hashing for local auth records.
//!
//! Uses Argon2id with strong defaults in production builds and reduced-cost
//! parameters under `#[cfg(test)]` so the saga tests stay fast. The test
//! parameters are intentionally weak and MUST NOT be used in production.

use argon2::{
	password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
	Argon2,
};
#[cfg(test)]
use argon2::{Algorithm, Params, Version};
use thiserror::Error;

/// Errors that can occur while hashing or verifying a password.
#[derive(Debug, Error)]
pub enum PasswordError {
	#[error("failed to hash password")]
	Hash,

	#[error("stored password hash is malformed")]
	MalformedHash,
}

#[inline]
fn argon2_instance() -> Argon2<'static> {
	#[cfg(test)]
	{
		// Fast, insecure parameters for tests ONLY.
		let params = Params::new(
			1024, // memory_kib: 1 MiB
			1,    // iterations
			1,    // parallelism
			None, // output length = default
		)
		.expect("valid Argon2 params for tests");
		Argon2::new(Algorithm::Argon2id, Version::V0x13, params)
	}

	#[cfg(not(test))]
	{
		Argon2::default()
	}
}

/// Hash a password with a fresh random salt.
pub fn hash_password(password: &str) -> Result<String, PasswordError> {
	let salt = SaltString::generate(&mut OsRng);
	argon2_instance()
		.hash_password(password.as_bytes(), &salt)
		.map(|hash| hash.to_string())
		.map_err(|_| PasswordError::Hash)
}

/// Verify a password against a stored hash.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, PasswordError> {
	let parsed = PasswordHash::new(hash).map_err(|_| PasswordError::MalformedHash)?;
	Ok(argon2_instance()
		.verify_password(password.as_bytes(), &parsed)
		.is_ok())
}
