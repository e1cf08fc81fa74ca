// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Storage traits consumed by the engine.
//!
//! [`EntityStore`] covers the two entity tables, [`GrantStore`] the three
//! association tables. Both are implemented by
//! [`RbacRepository`](crate::RbacRepository); the engine is generic over them
//! so it can run against any backend with the same guarantees.

use async_trait::async_trait;
use warden_core::{Entity, Holder, Permission, PermissionId, Role, RoleId, UserId};

use crate::error::DbError;

/// CRUD over one entity class (roles or permissions).
///
/// Names are unique per guard and compared byte-exact.
#[async_trait]
pub trait EntityStore<E: Entity>: Send + Sync {
	/// Insert a new entity. Fails with `DbError::Conflict` if the name is taken.
	async fn create(&self, guard: &str, name: &str) -> Result<E, DbError>;

	/// Return the entity with this name, inserting it first if absent.
	///
	/// Concurrent callers with the same name observe the same row.
	async fn find_or_create(&self, guard: &str, name: &str) -> Result<E, DbError>;

	async fn get_by_id(&self, id: u64) -> Result<Option<E>, DbError>;

	async fn get_by_name(&self, guard: &str, name: &str) -> Result<Option<E>, DbError>;

	/// Rename an entity. `None` if it does not exist, `DbError::Conflict` on a clash.
	async fn rename(&self, id: u64, name: &str) -> Result<Option<E>, DbError>;

	/// Delete an entity and, by cascade, every association row referencing it.
	async fn delete(&self, id: u64) -> Result<bool, DbError>;

	async fn list(&self, guard: &str) -> Result<Vec<E>, DbError>;
}

/// The three association tables: user↔role, user↔permission, role↔permission.
///
/// Multi-pair mutations are atomic: readers never observe a partially applied
/// attach or replace.
#[async_trait]
pub trait GrantStore: Send + Sync {
	/// Roles held by a principal, ordered by name.
	async fn roles_of_user(&self, user: UserId) -> Result<Vec<Role>, DbError>;

	/// Add the given roles to a principal, skipping pairs that already exist.
	/// Returns the number of pairs added.
	async fn attach_roles(&self, user: UserId, roles: &[RoleId]) -> Result<u64, DbError>;

	async fn detach_role(&self, user: UserId, role: RoleId) -> Result<bool, DbError>;

	/// Replace a principal's entire role set in one transaction.
	async fn replace_roles(&self, user: UserId, roles: &[RoleId]) -> Result<(), DbError>;

	/// Permissions held directly by a principal or a role, ordered by name.
	async fn permissions_of(&self, holder: Holder) -> Result<Vec<Permission>, DbError>;

	async fn holder_has_permission(
		&self,
		holder: Holder,
		permission: PermissionId,
	) -> Result<bool, DbError>;

	async fn attach_permissions(
		&self,
		holder: Holder,
		permissions: &[PermissionId],
	) -> Result<u64, DbError>;

	async fn detach_permission(
		&self,
		holder: Holder,
		permission: PermissionId,
	) -> Result<bool, DbError>;

	async fn replace_permissions(
		&self,
		holder: Holder,
		permissions: &[PermissionId],
	) -> Result<(), DbError>;

	/// Distinct permissions reachable through any role a principal holds.
	async fn permissions_via_roles(&self, user: UserId) -> Result<Vec<Permission>, DbError>;

	/// Roles linked to a permission.
	async fn roles_with_permission(&self, permission: PermissionId) -> Result<Vec<Role>, DbError>;

	/// Principals holding at least one of the given roles.
	async fn users_with_any_role(&self, roles: &[RoleId]) -> Result<Vec<UserId>, DbError>;

	/// Principals holding a permission directly.
	async fn users_with_permission(&self, permission: PermissionId)
		-> Result<Vec<UserId>, DbError>;

	/// Remove every association row for a principal.
	async fn forget_user(&self, user: UserId) -> Result<u64, DbError>;
}
