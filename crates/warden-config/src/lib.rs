// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration management for Warden.
//!
//! This crate provides:
//! - Layered configuration from multiple sources (defaults, TOML file, environment)
//! - Type-safe configuration with validation
//! - Consistent environment variable naming (`WARDEN_*`)
//!
//! # Usage
//!
//! ```ignore
//! use warden_config::load_config;
//!
//! let config = load_config()?;
//! println!("Using database {}", config.database.url);
//! ```

pub mod error;
pub mod layer;
pub mod sections;
pub mod sources;

pub use error::ConfigError;
pub use layer::WardenConfigLayer;
pub use sections::*;
pub use sources::{ConfigSource, DefaultsSource, EnvSource, Precedence, TomlSource};

use tracing::{debug, info};

/// Fully resolved Warden configuration.
#[derive(Debug, Clone, Default)]
pub struct WardenConfig {
	pub database: DatabaseConfig,
	pub logging: LoggingConfig,
	pub authz: AuthzConfig,
}

/// Load configuration from all sources with standard precedence.
///
/// Precedence (highest to lowest):
/// 1. Environment variables (`WARDEN_*`)
/// 2. Config file (`/etc/warden/warden.toml`)
/// 3. Built-in defaults
pub fn load_config() -> Result<WardenConfig, ConfigError> {
	load_from_sources(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::system()),
		Box::new(EnvSource),
	])
}

/// Load configuration with a custom config file path.
pub fn load_config_with_file(
	config_path: impl Into<std::path::PathBuf>,
) -> Result<WardenConfig, ConfigError> {
	load_from_sources(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::new(config_path)),
		Box::new(EnvSource),
	])
}

/// Merge the given sources in precedence order and finalize the result.
pub fn load_from_sources(
	mut sources: Vec<Box<dyn ConfigSource>>,
) -> Result<WardenConfig, ConfigError> {
	sources.sort_by_key(|s| s.precedence());

	let mut merged = WardenConfigLayer::default();
	for source in sources {
		debug!(source = source.name(), "loading configuration source");
		let layer = source.load()?;
		merged.merge(layer);
	}

	finalize(merged)
}

/// Finalize configuration layer into resolved config.
fn finalize(layer: WardenConfigLayer) -> Result<WardenConfig, ConfigError> {
	let database = layer.database.unwrap_or_default().finalize();
	let logging = layer.logging.unwrap_or_default().finalize();
	let authz = layer.authz.unwrap_or_default().finalize();

	validate_config(&authz)?;

	info!(
		database = %database.url,
		log_level = %logging.level,
		default_guard = %authz.default_guard,
		max_name_length = authz.max_name_length,
		protected_permissions = authz.protected_permissions.len(),
		"Warden configuration loaded"
	);

	Ok(WardenConfig {
		database,
		logging,
		authz,
	})
}

/// Validate cross-field configuration rules.
fn validate_config(authz: &AuthzConfig) -> Result<(), ConfigError> {
	if authz.default_guard.trim().is_empty() {
		return Err(ConfigError::Validation(
			"WARDEN_DEFAULT_GUARD must not be blank".to_string(),
		));
	}

	if authz.max_name_length == 0 {
		return Err(ConfigError::Validation(
			"WARDEN_NAME_MAX_LENGTH must be greater than zero".to_string(),
		));
	}

	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;

	struct Fixed(Precedence, WardenConfigLayer);

	impl ConfigSource for Fixed {
		fn name(&self) -> &'static str {
			"fixed"
		}

		fn precedence(&self) -> Precedence {
			self.0
		}

		fn load(&self) -> Result<WardenConfigLayer, ConfigError> {
			Ok(self.1.clone())
		}
	}

	fn guard_layer(guard: &str) -> WardenConfigLayer {
		WardenConfigLayer {
			authz: Some(AuthzConfigLayer {
				default_guard: Some(guard.to_string()),
				..Default::default()
			}),
			..Default::default()
		}
	}

	#[test]
	fn test_defaults_only() {
		let config = load_from_sources(vec![Box::new(DefaultsSource)]).unwrap();
		assert_eq!(config.database.url, "sqlite:./warden.db");
		assert_eq!(config.logging.level, "info");
		assert_eq!(config.authz, AuthzConfig::default());
	}

	#[test]
	fn test_higher_precedence_wins_regardless_of_order() {
		let config = load_from_sources(vec![
			Box::new(Fixed(Precedence::Environment, guard_layer("env"))),
			Box::new(Fixed(Precedence::ConfigFile, guard_layer("file"))),
		])
		.unwrap();
		assert_eq!(config.authz.default_guard, "env");
	}

	#[test]
	fn test_blank_guard_is_rejected() {
		let err = load_from_sources(vec![Box::new(Fixed(
			Precedence::ConfigFile,
			guard_layer("  "),
		))])
		.unwrap_err();
		assert!(err.to_string().contains("WARDEN_DEFAULT_GUARD"));
	}

	#[test]
	fn test_zero_name_length_is_rejected() {
		let authz = AuthzConfig {
			max_name_length: 0,
			..Default::default()
		};
		assert!(validate_config(&authz).is_err());
	}

	#[test]
	fn test_missing_file_falls_back_to_defaults() {
		let dir = tempfile::tempdir().unwrap();
		let config = load_from_sources(vec![
			Box::new(DefaultsSource),
			Box::new(TomlSource::new(dir.path().join("warden.toml"))),
		])
		.unwrap();
		assert_eq!(config.authz.default_guard, "web");
	}

	proptest! {
		#[test]
		fn prop_positive_lengths_validate(len in 1usize..10_000) {
			let authz = AuthzConfig {
				max_name_length: len,
				..Default::default()
			};
			prop_assert!(validate_config(&authz).is_ok());
		}
	}
}
