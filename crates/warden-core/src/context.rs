// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The explicit authorization context passed to every lookup and decision.

use serde::{Deserialize, Serialize};

use crate::types::Entity;

/// Guard used when the deployment does not configure one.
pub const DEFAULT_GUARD: &str = "web";

/// Scoping for lookups and decisions.
///
/// Roles and permissions belong to exactly one guard. Lookups by name only see
/// entities of the context's guard, and entity references from another guard
/// are rejected rather than silently matched.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AuthorizationContext {
	guard: String,
}

impl AuthorizationContext {
	pub fn new(guard: impl Into<String>) -> Self {
		Self {
			guard: guard.into(),
		}
	}

	pub fn guard(&self) -> &str {
		&self.guard
	}

	/// Whether `entity` belongs to this context.
	pub fn owns<E: Entity>(&self, entity: &E) -> bool {
		entity.guard_name() == self.guard
	}
}

impl Default for AuthorizationContext {
	fn default() -> Self {
		Self::new(DEFAULT_GUARD)
	}
}
