// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Canonical identity service for Atrium.
//!
//! This crate owns the source of truth for username and email uniqueness.
//! The identity creator consumes provisioning requests from the bus,
//! attempts the canonical insert, and always answers with a terminal
//! outcome event; a silently dropped failure would leave a permanently
//! orphaned staged credential on the auth side.

pub mod creator;
pub mod error;
pub mod store;

pub use creator::IdentityCreator;
pub use error::IdentityStoreError;
pub use store::{init_schema, CanonicalIdentity, IdentityStore, SqliteIdentityStore};
