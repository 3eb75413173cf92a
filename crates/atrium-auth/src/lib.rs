// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Auth-side half of the Atrium user-provisioning saga.
//!
//! Registration is accepted immediately: the initiator parks the password in
//! the staging store, publishes a provisioning request, and returns. The
//! finalizer later consumes the terminal outcome from the identity service,
//! materializes the local auth record bound to the canonical identity on
//! success, and cleans up the staged credential either way. No transaction
//! ever spans the two services; consistency is reached through the message
//! protocol alone.

pub mod config;
pub mod error;
pub mod finalizer;
pub mod initiator;
pub mod lifecycle;
pub mod password;
pub mod store;

pub use config::{ProvisioningConfig, ProvisioningConfigLayer};
pub use error::{AuthStoreError, ProvisioningError};
pub use finalizer::ProvisioningFinalizer;
pub use initiator::ProvisioningInitiator;
pub use lifecycle::UserLifecycleHandler;
pub use password::{hash_password, verify_password, PasswordError};
pub use store::{init_schema, AuthUser, AuthUserStore, NewAuthUser, SqliteAuthUserStore};
