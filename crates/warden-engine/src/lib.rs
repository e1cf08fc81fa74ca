// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! # warden-engine
//!
//! Authorization resolution for Warden.
//!
//! - [`LookupService`]: find, find-or-create and normalize role/permission references
//! - [`GrantManager`]: assign, remove and sync grants
//! - [`DecisionEngine`]: `has_*` and `check_*` decisions over current grant state
//!
//! All three share one store handle and one [`LookupService`], so grants and
//! decisions resolve references identically.
//!
//! ```rust,ignore
//! let rbac = Rbac::new(RbacRepository::new(pool));
//! let ctx = AuthorizationContext::default();
//!
//! rbac.lookup.find_or_create_role(&ctx, "editor").await?;
//! rbac.grants.assign_role(&ctx, &UserId::new(1), "editor").await?;
//! assert!(rbac.decisions.has_role(&ctx, &UserId::new(1), "editor").await?);
//! ```

pub mod decision;
pub mod error;
pub mod grant;
pub mod lookup;

use std::sync::Arc;

use warden_core::{Permission, Role, DEFAULT_MAX_NAME_LENGTH};
use warden_db::{EntityStore, GrantStore};

pub use decision::DecisionEngine;
pub use error::{AuthzError, LookupKey, Result};
pub use grant::GrantManager;
pub use lookup::LookupService;

/// The three services wired to one store.
pub struct Rbac<S> {
	pub lookup: LookupService<S>,
	pub grants: GrantManager<S>,
	pub decisions: DecisionEngine<S>,
}

impl<S> Clone for Rbac<S> {
	fn clone(&self) -> Self {
		Self {
			lookup: self.lookup.clone(),
			grants: self.grants.clone(),
			decisions: self.decisions.clone(),
		}
	}
}

impl<S> Rbac<S>
where
	S: EntityStore<Role> + EntityStore<Permission> + GrantStore,
{
	pub fn new(store: S) -> Self {
		Self::with_max_name_length(store, DEFAULT_MAX_NAME_LENGTH)
	}

	pub fn with_max_name_length(store: S, max_name_length: usize) -> Self {
		let store = Arc::new(store);
		let lookup = LookupService::with_max_name_length(Arc::clone(&store), max_name_length);
		Self {
			grants: GrantManager::new(Arc::clone(&store), lookup.clone()),
			decisions: DecisionEngine::new(store, lookup.clone()),
			lookup,
		}
	}
}
