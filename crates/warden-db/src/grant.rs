// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Association tables: `user_has_roles`, `user_has_permissions` and
//! `role_has_permissions`.
//!
//! Inserts are `INSERT OR IGNORE` against the composite primary keys, so
//! attaching a pair twice is a no-op. Batch attaches and replacements run in a
//! single transaction.

use async_trait::async_trait;
use sqlx::Row;
use warden_core::{Holder, Permission, PermissionId, Role, RoleId, UserId};

use crate::entity::{row_to_entity, RbacRepository};
use crate::error::DbError;
use crate::store::GrantStore;

/// Table and owner column storing direct permissions for a holder.
fn permission_table(holder: Holder) -> (&'static str, &'static str) {
	match holder {
		Holder::User(_) => ("user_has_permissions", "user_id"),
		Holder::Role(_) => ("role_has_permissions", "role_id"),
	}
}

fn holder_db_id(holder: Holder) -> Result<i64, DbError> {
	match holder {
		Holder::User(user) => user_db_id(user),
		Holder::Role(role) => role_db_id(role),
	}
}

/// Storage key of a holder for reads. A holder whose id has no storage form
/// holds nothing.
fn holder_key(holder: Holder) -> Option<i64> {
	match holder {
		Holder::User(user) => user.to_db(),
		Holder::Role(role) => role.to_db(),
	}
}

fn user_db_id(user: UserId) -> Result<i64, DbError> {
	user.to_db()
		.ok_or_else(|| DbError::Internal(format!("user id {user} out of range")))
}

fn role_db_id(role: RoleId) -> Result<i64, DbError> {
	role.to_db()
		.ok_or_else(|| DbError::Internal(format!("role id {role} out of range")))
}

fn permission_db_id(permission: PermissionId) -> Result<i64, DbError> {
	permission
		.to_db()
		.ok_or_else(|| DbError::Internal(format!("permission id {permission} out of range")))
}

fn placeholders(n: usize) -> String {
	vec!["?"; n].join(", ")
}

impl RbacRepository {
	// =========================================================================
	// Principal ↔ Role
	// =========================================================================

	/// Roles held by a principal, ordered by name.
	#[tracing::instrument(skip(self), fields(user_id = %user))]
	pub async fn list_user_roles(&self, user: UserId) -> Result<Vec<Role>, DbError> {
		let Some(user_id) = user.to_db() else {
			return Ok(Vec::new());
		};
		let rows = sqlx::query(
			r#"
			SELECT r.id, r.name, r.guard_name, r.created_at, r.updated_at
			FROM roles r
			INNER JOIN user_has_roles ur ON ur.role_id = r.id
			WHERE ur.user_id = ?
			ORDER BY r.name ASC, r.id ASC
			"#,
		)
		.bind(user_id)
		.fetch_all(&self.pool)
		.await?;

		rows.iter().map(row_to_entity).collect()
	}

	/// Attach roles to a principal in one transaction.
	///
	/// # Returns
	/// Number of pairs that were not already present.
	///
	/// # Database Constraints
	/// - Every role id must reference an existing role
	#[tracing::instrument(skip(self, roles), fields(user_id = %user, count = roles.len()))]
	pub async fn add_user_roles(&self, user: UserId, roles: &[RoleId]) -> Result<u64, DbError> {
		let user_id = user_db_id(user)?;
		let mut tx = self.pool.begin().await?;
		let mut added = 0;

		for role in roles {
			let result =
				sqlx::query("INSERT OR IGNORE INTO user_has_roles (user_id, role_id) VALUES (?, ?)")
					.bind(user_id)
					.bind(role_db_id(*role)?)
					.execute(&mut *tx)
					.await?;
			added += result.rows_affected();
		}

		tx.commit().await?;
		tracing::debug!(added, "roles attached");
		Ok(added)
	}

	/// Remove one role from a principal.
	///
	/// # Returns
	/// `true` if the pair existed.
	#[tracing::instrument(skip(self), fields(user_id = %user, role_id = %role))]
	pub async fn remove_user_role(&self, user: UserId, role: RoleId) -> Result<bool, DbError> {
		let result = sqlx::query("DELETE FROM user_has_roles WHERE user_id = ? AND role_id = ?")
			.bind(user_db_id(user)?)
			.bind(role_db_id(role)?)
			.execute(&self.pool)
			.await?;

		Ok(result.rows_affected() > 0)
	}

	/// Replace a principal's role set. Readers see either the old set or the new one.
	#[tracing::instrument(skip(self, roles), fields(user_id = %user, count = roles.len()))]
	pub async fn set_user_roles(&self, user: UserId, roles: &[RoleId]) -> Result<(), DbError> {
		let user_id = user_db_id(user)?;
		let mut tx = self.pool.begin().await?;

		sqlx::query("DELETE FROM user_has_roles WHERE user_id = ?")
			.bind(user_id)
			.execute(&mut *tx)
			.await?;

		for role in roles {
			sqlx::query("INSERT OR IGNORE INTO user_has_roles (user_id, role_id) VALUES (?, ?)")
				.bind(user_id)
				.bind(role_db_id(*role)?)
				.execute(&mut *tx)
				.await?;
		}

		tx.commit().await?;
		Ok(())
	}

	// =========================================================================
	// Holder ↔ Permission
	// =========================================================================

	/// Permissions attached directly to a principal or role, ordered by name.
	#[tracing::instrument(skip(self), fields(holder = %holder))]
	pub async fn list_holder_permissions(&self, holder: Holder) -> Result<Vec<Permission>, DbError> {
		let Some(holder_id) = holder_key(holder) else {
			return Ok(Vec::new());
		};
		let (table, column) = permission_table(holder);
		let sql = format!(
			r#"
			SELECT p.id, p.name, p.guard_name, p.created_at, p.updated_at
			FROM permissions p
			INNER JOIN {table} hp ON hp.permission_id = p.id
			WHERE hp.{column} = ?
			ORDER BY p.name ASC, p.id ASC
			"#
		);
		let rows = sqlx::query(&sql)
			.bind(holder_id)
			.fetch_all(&self.pool)
			.await?;

		rows.iter().map(row_to_entity).collect()
	}

	#[tracing::instrument(skip(self), fields(holder = %holder, permission_id = %permission))]
	pub async fn holder_has_permission_row(
		&self,
		holder: Holder,
		permission: PermissionId,
	) -> Result<bool, DbError> {
		let (Some(holder_id), Some(permission_id)) = (holder_key(holder), permission.to_db()) else {
			return Ok(false);
		};
		let (table, column) = permission_table(holder);
		let sql = format!("SELECT 1 FROM {table} WHERE {column} = ? AND permission_id = ? LIMIT 1");
		let row = sqlx::query(&sql)
			.bind(holder_id)
			.bind(permission_id)
			.fetch_optional(&self.pool)
			.await?;

		Ok(row.is_some())
	}

	/// Attach permissions to a holder in one transaction.
	#[tracing::instrument(skip(self, permissions), fields(holder = %holder, count = permissions.len()))]
	pub async fn add_holder_permissions(
		&self,
		holder: Holder,
		permissions: &[PermissionId],
	) -> Result<u64, DbError> {
		let (table, column) = permission_table(holder);
		let holder_id = holder_db_id(holder)?;
		let sql = format!("INSERT OR IGNORE INTO {table} ({column}, permission_id) VALUES (?, ?)");

		let mut tx = self.pool.begin().await?;
		let mut added = 0;
		for permission in permissions {
			let result = sqlx::query(&sql)
				.bind(holder_id)
				.bind(permission_db_id(*permission)?)
				.execute(&mut *tx)
				.await?;
			added += result.rows_affected();
		}
		tx.commit().await?;

		tracing::debug!(added, "permissions attached");
		Ok(added)
	}

	#[tracing::instrument(skip(self), fields(holder = %holder, permission_id = %permission))]
	pub async fn remove_holder_permission(
		&self,
		holder: Holder,
		permission: PermissionId,
	) -> Result<bool, DbError> {
		let (table, column) = permission_table(holder);
		let sql = format!("DELETE FROM {table} WHERE {column} = ? AND permission_id = ?");
		let result = sqlx::query(&sql)
			.bind(holder_db_id(holder)?)
			.bind(permission_db_id(permission)?)
			.execute(&self.pool)
			.await?;

		Ok(result.rows_affected() > 0)
	}

	/// Replace a holder's direct permission set in one transaction.
	#[tracing::instrument(skip(self, permissions), fields(holder = %holder, count = permissions.len()))]
	pub async fn set_holder_permissions(
		&self,
		holder: Holder,
		permissions: &[PermissionId],
	) -> Result<(), DbError> {
		let (table, column) = permission_table(holder);
		let holder_id = holder_db_id(holder)?;
		let delete_sql = format!("DELETE FROM {table} WHERE {column} = ?");
		let insert_sql =
			format!("INSERT OR IGNORE INTO {table} ({column}, permission_id) VALUES (?, ?)");

		let mut tx = self.pool.begin().await?;
		sqlx::query(&delete_sql)
			.bind(holder_id)
			.execute(&mut *tx)
			.await?;
		for permission in permissions {
			sqlx::query(&insert_sql)
				.bind(holder_id)
				.bind(permission_db_id(*permission)?)
				.execute(&mut *tx)
				.await?;
		}
		tx.commit().await?;
		Ok(())
	}

	// =========================================================================
	// Derived queries
	// =========================================================================

	/// Distinct permissions a principal reaches through its roles.
	#[tracing::instrument(skip(self), fields(user_id = %user))]
	pub async fn list_permissions_via_roles(&self, user: UserId) -> Result<Vec<Permission>, DbError> {
		let Some(user_id) = user.to_db() else {
			return Ok(Vec::new());
		};
		let rows = sqlx::query(
			r#"
			SELECT DISTINCT p.id, p.name, p.guard_name, p.created_at, p.updated_at
			FROM permissions p
			INNER JOIN role_has_permissions rp ON rp.permission_id = p.id
			INNER JOIN user_has_roles ur ON ur.role_id = rp.role_id
			WHERE ur.user_id = ?
			ORDER BY p.name ASC, p.id ASC
			"#,
		)
		.bind(user_id)
		.fetch_all(&self.pool)
		.await?;

		rows.iter().map(row_to_entity).collect()
	}

	#[tracing::instrument(skip(self), fields(permission_id = %permission))]
	pub async fn list_roles_with_permission(
		&self,
		permission: PermissionId,
	) -> Result<Vec<Role>, DbError> {
		let Some(permission_id) = permission.to_db() else {
			return Ok(Vec::new());
		};
		let rows = sqlx::query(
			r#"
			SELECT r.id, r.name, r.guard_name, r.created_at, r.updated_at
			FROM roles r
			INNER JOIN role_has_permissions rp ON rp.role_id = r.id
			WHERE rp.permission_id = ?
			ORDER BY r.name ASC, r.id ASC
			"#,
		)
		.bind(permission_id)
		.fetch_all(&self.pool)
		.await?;

		rows.iter().map(row_to_entity).collect()
	}

	#[tracing::instrument(skip(self, roles), fields(count = roles.len()))]
	pub async fn list_users_with_any_role(&self, roles: &[RoleId]) -> Result<Vec<UserId>, DbError> {
		let ids: Vec<i64> = roles.iter().filter_map(|r| r.to_db()).collect();
		if ids.is_empty() {
			return Ok(Vec::new());
		}

		let sql = format!(
			"SELECT DISTINCT user_id FROM user_has_roles WHERE role_id IN ({}) ORDER BY user_id ASC",
			placeholders(ids.len())
		);
		let mut query = sqlx::query(&sql);
		for id in ids {
			query = query.bind(id);
		}
		let rows = query.fetch_all(&self.pool).await?;

		rows.iter().map(row_to_user_id).collect()
	}

	#[tracing::instrument(skip(self), fields(permission_id = %permission))]
	pub async fn list_users_with_permission(
		&self,
		permission: PermissionId,
	) -> Result<Vec<UserId>, DbError> {
		let Some(permission_id) = permission.to_db() else {
			return Ok(Vec::new());
		};
		let rows = sqlx::query(
			"SELECT user_id FROM user_has_permissions WHERE permission_id = ? ORDER BY user_id ASC",
		)
		.bind(permission_id)
		.fetch_all(&self.pool)
		.await?;

		rows.iter().map(row_to_user_id).collect()
	}

	/// Delete every role and permission pair for a principal.
	///
	/// # Returns
	/// Number of rows removed across both tables.
	#[tracing::instrument(skip(self), fields(user_id = %user))]
	pub async fn delete_user_grants(&self, user: UserId) -> Result<u64, DbError> {
		let user_id = user_db_id(user)?;
		let mut tx = self.pool.begin().await?;

		let roles = sqlx::query("DELETE FROM user_has_roles WHERE user_id = ?")
			.bind(user_id)
			.execute(&mut *tx)
			.await?;
		let permissions = sqlx::query("DELETE FROM user_has_permissions WHERE user_id = ?")
			.bind(user_id)
			.execute(&mut *tx)
			.await?;

		tx.commit().await?;

		let removed = roles.rows_affected() + permissions.rows_affected();
		tracing::info!(user_id = %user, removed, "user grants removed");
		Ok(removed)
	}
}

fn row_to_user_id(row: &sqlx::sqlite::SqliteRow) -> Result<UserId, DbError> {
	let id: i64 = row.try_get("user_id")?;
	UserId::from_db(id).ok_or_else(|| DbError::Internal(format!("Invalid user id: {id}")))
}

#[async_trait]
impl GrantStore for RbacRepository {
	async fn roles_of_user(&self, user: UserId) -> Result<Vec<Role>, DbError> {
		self.list_user_roles(user).await
	}

	async fn attach_roles(&self, user: UserId, roles: &[RoleId]) -> Result<u64, DbError> {
		self.add_user_roles(user, roles).await
	}

	async fn detach_role(&self, user: UserId, role: RoleId) -> Result<bool, DbError> {
		self.remove_user_role(user, role).await
	}

	async fn replace_roles(&self, user: UserId, roles: &[RoleId]) -> Result<(), DbError> {
		self.set_user_roles(user, roles).await
	}

	async fn permissions_of(&self, holder: Holder) -> Result<Vec<Permission>, DbError> {
		self.list_holder_permissions(holder).await
	}

	async fn holder_has_permission(
		&self,
		holder: Holder,
		permission: PermissionId,
	) -> Result<bool, DbError> {
		self.holder_has_permission_row(holder, permission).await
	}

	async fn attach_permissions(
		&self,
		holder: Holder,
		permissions: &[PermissionId],
	) -> Result<u64, DbError> {
		self.add_holder_permissions(holder, permissions).await
	}

	async fn detach_permission(
		&self,
		holder: Holder,
		permission: PermissionId,
	) -> Result<bool, DbError> {
		self.remove_holder_permission(holder, permission).await
	}

	async fn replace_permissions(
		&self,
		holder: Holder,
		permissions: &[PermissionId],
	) -> Result<(), DbError> {
		self.set_holder_permissions(holder, permissions).await
	}

	async fn permissions_via_roles(&self, user: UserId) -> Result<Vec<Permission>, DbError> {
		self.list_permissions_via_roles(user).await
	}

	async fn roles_with_permission(&self, permission: PermissionId) -> Result<Vec<Role>, DbError> {
		self.list_roles_with_permission(permission).await
	}

	async fn users_with_any_role(&self, roles: &[RoleId]) -> Result<Vec<UserId>, DbError> {
		self.list_users_with_any_role(roles).await
	}

	async fn users_with_permission(
		&self,
		permission: PermissionId,
	) -> Result<Vec<UserId>, DbError> {
		self.list_users_with_permission(permission).await
	}

	async fn forget_user(&self, user: UserId) -> Result<u64, DbError> {
		self.delete_user_grants(user).await
	}
}
