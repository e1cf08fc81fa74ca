// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Authorization error types.

use std::fmt;
use thiserror::Error;
use warden_core::{EntityKind, InvalidReference, NameError};
use warden_db::DbError;

/// The key a failed lookup was made with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupKey {
	Id(u64),
	Name(String),
}

impl fmt::Display for LookupKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			LookupKey::Id(id) => write!(f, "#{id}"),
			LookupKey::Name(name) => write!(f, "'{name}'"),
		}
	}
}

/// Errors raised by lookup, grant and decision operations.
#[derive(Debug, Error)]
pub enum AuthzError {
	// =========================================================================
	// Resolution Errors
	// =========================================================================
	/// No entity matches the id or name in the current guard.
	#[error("{kind} {key} not found")]
	NotFound { kind: EntityKind, key: LookupKey },

	/// Strict creation or rename hit an existing name.
	#[error("{kind} '{name}' already exists")]
	AlreadyExists { kind: EntityKind, name: String },

	/// A reference value has an unsupported shape.
	#[error(transparent)]
	InvalidReference(#[from] InvalidReference),

	#[error(transparent)]
	InvalidName(#[from] NameError),

	/// The entity belongs to a different authorization context.
	#[error("{kind} '{name}' belongs to guard '{actual}', not '{expected}'")]
	GuardMismatch {
		kind: EntityKind,
		name: String,
		expected: String,
		actual: String,
	},

	// =========================================================================
	// Storage Errors
	// =========================================================================
	#[error("storage error: {0}")]
	Db(#[from] DbError),
}

impl AuthzError {
	pub(crate) fn not_found_id(kind: EntityKind, id: u64) -> Self {
		AuthzError::NotFound {
			kind,
			key: LookupKey::Id(id),
		}
	}

	pub(crate) fn not_found_name(kind: EntityKind, name: &str) -> Self {
		AuthzError::NotFound {
			kind,
			key: LookupKey::Name(name.to_string()),
		}
	}

	/// Whether the error means a reference could not be resolved, as opposed
	/// to storage failing. Only these are turned into a denial by the safe
	/// `check_*` family.
	pub fn is_resolution_failure(&self) -> bool {
		matches!(
			self,
			AuthzError::NotFound { .. }
				| AuthzError::InvalidReference(_)
				| AuthzError::InvalidName(_)
				| AuthzError::GuardMismatch { .. }
		)
	}
}

pub type Result<T> = std::result::Result<T, AuthzError>;

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn not_found_message_names_the_key() {
		let err = AuthzError::not_found_name(EntityKind::Permission, "publish");
		assert_eq!(err.to_string(), "permission 'publish' not found");

		let err = AuthzError::not_found_id(EntityKind::Role, 7);
		assert_eq!(err.to_string(), "role #7 not found");
	}

	#[test]
	fn classifies_resolution_failures() {
		assert!(AuthzError::not_found_id(EntityKind::Role, 1).is_resolution_failure());
		assert!(
			AuthzError::from(InvalidReference::new(EntityKind::Role, "1.5")).is_resolution_failure()
		);
		assert!(AuthzError::GuardMismatch {
			kind: EntityKind::Role,
			name: "admin".into(),
			expected: "web".into(),
			actual: "api".into(),
		}
		.is_resolution_failure());

		assert!(!AuthzError::AlreadyExists {
			kind: EntityKind::Role,
			name: "admin".into(),
		}
		.is_resolution_failure());
		assert!(!AuthzError::Db(DbError::Internal("boom".into())).is_resolution_failure());
	}
}
