// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Authorization settings: guard, name limits and protected permissions.

use serde::Deserialize;
use warden_core::{DEFAULT_GUARD, DEFAULT_MAX_NAME_LENGTH};

/// Permission that administers roles and permissions themselves. Deleting it
/// would lock administrators out, so it is protected unless configured otherwise.
pub const DEFAULT_PROTECTED_PERMISSION: &str = "Administer roles & permissions";

/// Authorization configuration (runtime, fully resolved).
#[derive(Debug, Clone, PartialEq)]
pub struct AuthzConfig {
	/// Guard used when a command does not name one.
	pub default_guard: String,
	/// Longest accepted role or permission name, in characters.
	pub max_name_length: usize,
	/// Permission names the CLI refuses to delete.
	pub protected_permissions: Vec<String>,
}

impl Default for AuthzConfig {
	fn default() -> Self {
		AuthzConfigLayer::default().finalize()
	}
}

impl AuthzConfig {
	pub fn is_protected(&self, permission: &str) -> bool {
		self.protected_permissions.iter().any(|p| p == permission)
	}
}

/// Authorization configuration layer (partial, for merging).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthzConfigLayer {
	#[serde(default)]
	pub default_guard: Option<String>,
	#[serde(default)]
	pub max_name_length: Option<usize>,
	#[serde(default)]
	pub protected_permissions: Option<Vec<String>>,
}

impl AuthzConfigLayer {
	pub fn merge(&mut self, other: AuthzConfigLayer) {
		if other.default_guard.is_some() {
			self.default_guard = other.default_guard;
		}
		if other.max_name_length.is_some() {
			self.max_name_length = other.max_name_length;
		}
		if other.protected_permissions.is_some() {
			self.protected_permissions = other.protected_permissions;
		}
	}

	pub fn finalize(self) -> AuthzConfig {
		AuthzConfig {
			default_guard: self
				.default_guard
				.unwrap_or_else(|| DEFAULT_GUARD.to_string()),
			max_name_length: self.max_name_length.unwrap_or(DEFAULT_MAX_NAME_LENGTH),
			protected_permissions: self
				.protected_permissions
				.unwrap_or_else(|| vec![DEFAULT_PROTECTED_PERMISSION.to_string()]),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_defaults() {
		let config = AuthzConfig::default();
		assert_eq!(config.default_guard, "web");
		assert_eq!(config.max_name_length, 125);
		assert!(config.is_protected("Administer roles & permissions"));
		assert!(!config.is_protected("administer roles & permissions"));
	}

	#[test]
	fn test_empty_protected_list_disables_protection() {
		let layer = AuthzConfigLayer {
			protected_permissions: Some(Vec::new()),
			..Default::default()
		};
		assert!(!layer.finalize().is_protected(DEFAULT_PROTECTED_PERMISSION));
	}

	#[test]
	fn test_deserialize_from_toml() {
		let layer: AuthzConfigLayer = toml::from_str(
			r#"
			default_guard = "api"
			max_name_length = 64
			protected_permissions = ["root", "billing"]
			"#,
		)
		.unwrap();
		let config = layer.finalize();
		assert_eq!(config.default_guard, "api");
		assert_eq!(config.max_name_length, 64);
		assert_eq!(config.protected_permissions, vec!["root", "billing"]);
	}
}
