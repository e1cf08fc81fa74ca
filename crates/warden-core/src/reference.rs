// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Polymorphic references to roles and permissions.
//!
//! Calling layers name a role or permission in whatever shape they have at hand:
//! a numeric id, a name, an already loaded entity, or a list mixing all three.
//! [`Reference`] captures those shapes as a closed enum so that normalization is
//! a single exhaustive match.
//!
//! Untyped input (e.g. a JSON request body) is converted with
//! `Reference::try_from(serde_json::Value)`, which is where unsupported shapes
//! such as floats or booleans are rejected with [`InvalidReference`].

use serde_json::Value;
use std::fmt;

use crate::types::{Entity, EntityKind, Permission, PermissionId, Role, RoleId};

/// A reference to one or more entities of type `E`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reference<E> {
	/// Numeric identity.
	Id(u64),
	/// Unique name within the authorization context.
	Name(String),
	/// An entity instance the caller already holds.
	Entity(E),
	/// Any number of references, possibly nested.
	Many(Vec<Reference<E>>),
}

/// A reference to roles.
pub type RoleRef = Reference<Role>;

/// A reference to permissions.
pub type PermissionRef = Reference<Permission>;

/// A reference value that is none of the accepted shapes.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid {kind} reference: {value}")]
pub struct InvalidReference {
	pub kind: EntityKind,
	pub value: String,
}

impl InvalidReference {
	pub fn new(kind: EntityKind, value: impl Into<String>) -> Self {
		Self {
			kind,
			value: value.into(),
		}
	}
}

impl<E: Entity> Reference<E> {
	/// Build a list reference from anything convertible into references.
	pub fn many<I, T>(items: I) -> Self
	where
		I: IntoIterator<Item = T>,
		T: Into<Reference<E>>,
	{
		Reference::Many(items.into_iter().map(Into::into).collect())
	}

	/// Interpret a command-line style argument: unsigned integers are ids,
	/// everything else is a name.
	pub fn from_arg(arg: &str) -> Self {
		match arg.parse::<u64>() {
			Ok(id) => Reference::Id(id),
			Err(_) => Reference::Name(arg.to_string()),
		}
	}

	pub fn is_many(&self) -> bool {
		matches!(self, Reference::Many(_))
	}

	/// All non-list references, depth first, with nested lists expanded.
	pub fn leaves(&self) -> Vec<&Reference<E>> {
		let mut out = Vec::new();
		self.collect_leaves(&mut out);
		out
	}

	fn collect_leaves<'a>(&'a self, out: &mut Vec<&'a Reference<E>>) {
		match self {
			Reference::Many(items) => {
				for item in items {
					item.collect_leaves(out);
				}
			}
			leaf => out.push(leaf),
		}
	}

	/// Owned variant of [`Reference::leaves`].
	pub fn into_leaves(self) -> Vec<Reference<E>> {
		match self {
			Reference::Many(items) => items.into_iter().flat_map(Reference::into_leaves).collect(),
			leaf => vec![leaf],
		}
	}

	/// Whether this reference denotes `entity`. Lists match if any element does.
	pub fn matches(&self, entity: &E) -> bool {
		match self {
			Reference::Id(id) => *id == entity.raw_id(),
			Reference::Name(name) => name == entity.name(),
			Reference::Entity(other) => other.raw_id() == entity.raw_id(),
			Reference::Many(items) => items.iter().any(|r| r.matches(entity)),
		}
	}
}

impl<E: Entity> fmt::Display for Reference<E> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Reference::Id(id) => write!(f, "{} #{id}", E::KIND),
			Reference::Name(name) => write!(f, "{} '{name}'", E::KIND),
			Reference::Entity(e) => write!(f, "{} '{}' (#{})", E::KIND, e.name(), e.raw_id()),
			Reference::Many(items) => {
				f.write_str("[")?;
				for (i, item) in items.iter().enumerate() {
					if i > 0 {
						f.write_str(", ")?;
					}
					write!(f, "{item}")?;
				}
				f.write_str("]")
			}
		}
	}
}

// =============================================================================
// Conversions
// =============================================================================

impl<E: Entity> From<u64> for Reference<E> {
	fn from(id: u64) -> Self {
		Reference::Id(id)
	}
}

impl<E: Entity> From<&str> for Reference<E> {
	fn from(name: &str) -> Self {
		Reference::Name(name.to_string())
	}
}

impl<E: Entity> From<String> for Reference<E> {
	fn from(name: String) -> Self {
		Reference::Name(name)
	}
}

impl<E: Entity, T: Into<Reference<E>>> From<Vec<T>> for Reference<E> {
	fn from(items: Vec<T>) -> Self {
		Reference::many(items)
	}
}

impl<E: Entity, T: Into<Reference<E>>, const N: usize> From<[T; N]> for Reference<E> {
	fn from(items: [T; N]) -> Self {
		Reference::many(items)
	}
}

impl From<Role> for RoleRef {
	fn from(role: Role) -> Self {
		Reference::Entity(role)
	}
}

impl From<&Role> for RoleRef {
	fn from(role: &Role) -> Self {
		Reference::Entity(role.clone())
	}
}

impl From<RoleId> for RoleRef {
	fn from(id: RoleId) -> Self {
		Reference::Id(id.get())
	}
}

impl From<Permission> for PermissionRef {
	fn from(permission: Permission) -> Self {
		Reference::Entity(permission)
	}
}

impl From<&Permission> for PermissionRef {
	fn from(permission: &Permission) -> Self {
		Reference::Entity(permission.clone())
	}
}

impl From<PermissionId> for PermissionRef {
	fn from(id: PermissionId) -> Self {
		Reference::Id(id.get())
	}
}

impl<E: Entity> TryFrom<Value> for Reference<E> {
	type Error = InvalidReference;

	fn try_from(value: Value) -> Result<Self, Self::Error> {
		match value {
			Value::Number(ref n) => n
				.as_u64()
				.map(Reference::Id)
				.ok_or_else(|| InvalidReference::new(E::KIND, value.to_string())),
			Value::String(name) => Ok(Reference::Name(name)),
			Value::Array(items) => items
				.into_iter()
				.map(Reference::try_from)
				.collect::<Result<Vec<_>, _>>()
				.map(Reference::Many),
			Value::Object(ref map) => map
				.get("id")
				.and_then(Value::as_u64)
				.map(Reference::Id)
				.ok_or_else(|| InvalidReference::new(E::KIND, value.to_string())),
			other => Err(InvalidReference::new(E::KIND, other.to_string())),
		}
	}
}
