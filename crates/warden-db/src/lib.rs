// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! SQLite persistence for Warden.
//!
//! Holds the entity tables (`roles`, `permissions`) and the association tables
//! linking principals, roles and permissions. The engine talks to storage only
//! through the [`EntityStore`] and [`GrantStore`] traits.

pub mod entity;
pub mod error;
pub mod grant;
pub mod pool;
pub mod store;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use entity::{EntityRow, RbacRepository};
pub use error::{DbError, Result};
pub use pool::{create_pool, run_migrations};
pub use store::{EntityStore, GrantStore};
