// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Core type definitions for role-based access control.
//!
//! This module defines the records the rest of Warden operates on:
//!
//! - **ID newtypes**: Type-safe wrappers around numeric identities for principals
//!   ([`UserId`]), roles ([`RoleId`]) and permissions ([`PermissionId`])
//! - **Entities**: the stored [`Role`] and [`Permission`] rows, both implementing
//!   the [`Entity`] trait so lookup and normalization code can be shared
//! - **Entity kinds**: [`EntityKind`] for error messages and logging
//!
//! IDs serialize transparently as plain integers. SQLite stores them as signed
//! 64-bit integers, so [`RoleId::to_db`] and friends report ids that can never
//! exist in storage instead of wrapping them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// =============================================================================
// ID Newtypes
// =============================================================================

macro_rules! define_id_type {
	($name:ident, $doc:expr) => {
		#[doc = $doc]
		#[derive(
			Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
		)]
		#[serde(transparent)]
		pub struct $name(u64);

		impl $name {
			/// Create a new ID from its numeric value.
			pub fn new(id: u64) -> Self {
				Self(id)
			}

			/// Get the numeric value.
			pub fn get(self) -> u64 {
				self.0
			}

			/// Storage representation, or `None` if the id is outside the `i64` range.
			pub fn to_db(self) -> Option<i64> {
				i64::try_from(self.0).ok()
			}

			/// Convert a stored value back into an id. Negative values are rejected.
			pub fn from_db(id: i64) -> Option<Self> {
				u64::try_from(id).ok().map(Self)
			}
		}

		impl fmt::Display for $name {
			fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
				write!(f, "{}", self.0)
			}
		}

		impl From<u64> for $name {
			fn from(id: u64) -> Self {
				Self(id)
			}
		}

		impl From<$name> for u64 {
			fn from(id: $name) -> Self {
				id.0
			}
		}
	};
}

define_id_type!(UserId, "Identity of a principal. Warden never owns the principal itself.");
define_id_type!(RoleId, "Unique identifier for a role.");
define_id_type!(PermissionId, "Unique identifier for a permission.");

// =============================================================================
// Entity Kinds
// =============================================================================

/// The two classes of named entities held in the entity store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
	Role,
	Permission,
}

impl EntityKind {
	pub fn as_str(&self) -> &'static str {
		match self {
			EntityKind::Role => "role",
			EntityKind::Permission => "permission",
		}
	}
}

impl fmt::Display for EntityKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Shared view over [`Role`] and [`Permission`].
///
/// Lookup, normalization and the decision algorithms are written once against
/// this trait instead of once per entity class.
pub trait Entity: Clone + fmt::Debug + Send + Sync + 'static {
	/// Which entity class this is.
	const KIND: EntityKind;

	/// The numeric identity, independent of the typed id wrapper.
	fn raw_id(&self) -> u64;

	/// The unique (per guard) human-readable name.
	fn name(&self) -> &str;

	/// The authorization context this entity belongs to.
	fn guard_name(&self) -> &str;
}

// =============================================================================
// Roles
// =============================================================================

/// A named group of permissions that can be assigned to principals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
	/// Stable identity assigned by the store.
	pub id: RoleId,

	/// Unique name within the guard.
	pub name: String,

	/// Authorization context the role is scoped to.
	pub guard_name: String,

	/// When the role was created.
	pub created_at: DateTime<Utc>,

	/// When the role was last renamed.
	pub updated_at: DateTime<Utc>,
}

impl Entity for Role {
	const KIND: EntityKind = EntityKind::Role;

	fn raw_id(&self) -> u64 {
		self.id.get()
	}

	fn name(&self) -> &str {
		&self.name
	}

	fn guard_name(&self) -> &str {
		&self.guard_name
	}
}

// =============================================================================
// Permissions
// =============================================================================

/// A named atomic capability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permission {
	/// Stable identity assigned by the store.
	pub id: PermissionId,

	/// Unique name within the guard.
	pub name: String,

	/// Authorization context the permission is scoped to.
	pub guard_name: String,

	/// When the permission was created.
	pub created_at: DateTime<Utc>,

	/// When the permission was last renamed.
	pub updated_at: DateTime<Utc>,
}

impl Entity for Permission {
	const KIND: EntityKind = EntityKind::Permission;

	fn raw_id(&self) -> u64 {
		self.id.get()
	}

	fn name(&self) -> &str {
		&self.name
	}

	fn guard_name(&self) -> &str {
		&self.guard_name
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;

	mod id_types {
		use super::*;

		#[test]
		fn role_id_serializes_as_integer() {
			let json = serde_json::to_string(&RoleId::new(42)).unwrap();
			assert_eq!(json, "42");
		}

		#[test]
		fn ids_above_i64_have_no_storage_form() {
			assert_eq!(PermissionId::new(u64::MAX).to_db(), None);
			assert_eq!(PermissionId::new(7).to_db(), Some(7));
		}

		#[test]
		fn negative_storage_values_are_rejected() {
			assert_eq!(UserId::from_db(-1), None);
			assert_eq!(UserId::from_db(9), Some(UserId::new(9)));
		}

		proptest! {
			#[test]
			fn user_id_roundtrip_any_value(a: u64) {
				let id = UserId::new(a);
				prop_assert_eq!(u64::from(id), a);
				prop_assert_eq!(id.to_string(), a.to_string());
			}

			#[test]
			fn storage_roundtrip_within_i64(a in 0u64..=(i64::MAX as u64)) {
				let id = RoleId::new(a);
				let stored = id.to_db().unwrap();
				prop_assert_eq!(RoleId::from_db(stored), Some(id));
			}
		}
	}

	mod entities {
		use super::*;

		#[test]
		fn entity_kind_display() {
			assert_eq!(EntityKind::Role.to_string(), "role");
			assert_eq!(EntityKind::Permission.to_string(), "permission");
		}

		#[test]
		fn role_exposes_entity_view() {
			let now = Utc::now();
			let role = Role {
				id: RoleId::new(3),
				name: "editor".to_string(),
				guard_name: "web".to_string(),
				created_at: now,
				updated_at: now,
			};
			assert_eq!(role.raw_id(), 3);
			assert_eq!(Entity::name(&role), "editor");
			assert_eq!(role.guard_name(), "web");
			assert_eq!(Role::KIND, EntityKind::Role);
		}
	}
}
