// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Transient credential staging store.
//!
//! The saga hands a submitted password across the asynchronous identity
//! round trip without ever putting it in a message body. The initiator
//! parks the secret here under a generated key with a TTL; the finalizer
//! reads and destroys it on success, or destroys it unread on failure.
//! Keys are write-once and always eventually deleted, by explicit cleanup
//! or by expiry.

pub mod error;
pub mod store;

pub use error::StagingError;
pub use store::{init_schema, CredentialStaging, SqliteStagingStore, STAGING_KEY_PREFIX};
