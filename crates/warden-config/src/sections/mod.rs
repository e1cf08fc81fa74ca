// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration sections for warden.

pub mod authz;
pub mod database;
pub mod logging;

pub use authz::{AuthzConfig, AuthzConfigLayer, DEFAULT_PROTECTED_PERMISSION};
pub use database::{DatabaseConfig, DatabaseConfigLayer};
pub use logging::{LoggingConfig, LoggingConfigLayer};
