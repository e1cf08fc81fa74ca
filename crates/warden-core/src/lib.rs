// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Core types for Warden role-based access control.
//!
//! This crate has no storage or runtime dependencies. It provides:
//! - [`Role`], [`Permission`] and their typed ids
//! - [`Reference`], the closed set of shapes a caller may use to name entities
//! - [`AuthorizationContext`], the explicit guard scoping for every call
//! - [`RoleHolder`] / [`PermissionHolder`], the seams principal types plug into
//! - name validation shared by creation and rename

pub mod context;
pub mod holder;
pub mod name;
pub mod reference;
pub mod types;

pub use context::{AuthorizationContext, DEFAULT_GUARD};
pub use holder::{Holder, PermissionHolder, RoleHolder};
pub use name::{validate_name, NameError, DEFAULT_MAX_NAME_LENGTH};
pub use reference::{InvalidReference, PermissionRef, Reference, RoleRef};
pub use types::{Entity, EntityKind, Permission, PermissionId, Role, RoleId, UserId};
