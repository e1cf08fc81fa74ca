// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Name validation shared by creation and rename.
//!
//! Names are compared byte-exact and case-sensitively everywhere. Validation
//! does not trim or fold case; it only rejects blank and oversized names.

use crate::types::EntityKind;

/// Default upper bound on name length, in characters.
pub const DEFAULT_MAX_NAME_LENGTH: usize = 125;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NameError {
	#[error("{kind} name must not be blank")]
	Blank { kind: EntityKind },

	#[error("{kind} name is {len} characters long, the limit is {max}")]
	TooLong {
		kind: EntityKind,
		len: usize,
		max: usize,
	},
}

/// Check that `name` is acceptable for an entity of `kind`.
pub fn validate_name(kind: EntityKind, name: &str, max_len: usize) -> Result<(), NameError> {
	if name.trim().is_empty() {
		return Err(NameError::Blank { kind });
	}
	let len = name.chars().count();
	if len > max_len {
		return Err(NameError::TooLong {
			kind,
			len,
			max: max_len,
		});
	}
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;

	#[test]
	fn rejects_blank_names() {
		assert_eq!(
			validate_name(EntityKind::Role, "  ", 10),
			Err(NameError::Blank {
				kind: EntityKind::Role
			})
		);
		assert!(validate_name(EntityKind::Role, "", 10).is_err());
	}

	#[test]
	fn counts_characters_not_bytes() {
		assert!(validate_name(EntityKind::Permission, "éditer", 6).is_ok());
		assert!(validate_name(EntityKind::Permission, "éditer", 5).is_err());
	}

	#[test]
	fn keeps_surrounding_whitespace_significant() {
		assert!(validate_name(EntityKind::Role, " editor ", 10).is_ok());
	}

	proptest! {
		#[test]
		fn names_within_limit_pass(name in "[a-z][a-z0-9 &-]{0,40}") {
			prop_assert!(validate_name(EntityKind::Role, &name, DEFAULT_MAX_NAME_LENGTH).is_ok());
		}
	}
}
