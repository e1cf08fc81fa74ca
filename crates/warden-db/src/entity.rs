// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Entity repository for roles and permissions.
//!
//! This module provides database access for the two entity tables:
//! - Strict creation and atomic find-or-create
//! - Lookup by id and by (guard, name)
//! - Rename, delete (cascading into the association tables) and listing
//!
//! Roles and permissions share one schema shape, so every operation is written
//! once, generic over [`EntityRow`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqlitePool, sqlite::SqliteRow, Row};
use warden_core::{Entity, Permission, PermissionId, Role, RoleId};

use crate::error::DbError;
use crate::store::EntityStore;

/// Columns selected for every entity query, in [`row_to_entity`] order.
pub(crate) const ENTITY_COLUMNS: &str = "id, name, guard_name, created_at, updated_at";

/// Bounded retries for find-or-create when a concurrent delete races the insert.
const FIND_OR_CREATE_ATTEMPTS: usize = 3;

/// Storage mapping for an entity class.
pub trait EntityRow: Entity {
	/// Table holding the entity rows.
	const TABLE: &'static str;

	fn from_parts(
		id: u64,
		name: String,
		guard_name: String,
		created_at: DateTime<Utc>,
		updated_at: DateTime<Utc>,
	) -> Self;
}

impl EntityRow for Role {
	const TABLE: &'static str = "roles";

	fn from_parts(
		id: u64,
		name: String,
		guard_name: String,
		created_at: DateTime<Utc>,
		updated_at: DateTime<Utc>,
	) -> Self {
		Role {
			id: RoleId::new(id),
			name,
			guard_name,
			created_at,
			updated_at,
		}
	}
}

impl EntityRow for Permission {
	const TABLE: &'static str = "permissions";

	fn from_parts(
		id: u64,
		name: String,
		guard_name: String,
		created_at: DateTime<Utc>,
		updated_at: DateTime<Utc>,
	) -> Self {
		Permission {
			id: PermissionId::new(id),
			name,
			guard_name,
			created_at,
			updated_at,
		}
	}
}

/// Repository for the entity and association tables.
///
/// All ids are SQLite `INTEGER`s. The association half lives in
/// [`crate::grant`].
#[derive(Clone)]
pub struct RbacRepository {
	pub(crate) pool: SqlitePool,
}

impl RbacRepository {
	/// Create a new repository with the given pool.
	///
	/// # Arguments
	/// * `pool` - SQLite connection pool with foreign keys enabled
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}

	/// The underlying pool.
	pub fn pool(&self) -> &SqlitePool {
		&self.pool
	}

	// =========================================================================
	// Creation
	// =========================================================================

	/// Insert a new entity.
	///
	/// # Errors
	/// Returns `DbError::Conflict` if `(guard, name)` already exists.
	///
	/// # Database Constraints
	/// - (`guard_name`, `name`) must be unique
	#[tracing::instrument(skip(self), fields(kind = %E::KIND))]
	pub async fn create_entity<E: EntityRow>(&self, guard: &str, name: &str) -> Result<E, DbError> {
		let now = Utc::now();
		let sql = format!(
			"INSERT INTO {} (name, guard_name, created_at, updated_at) VALUES (?, ?, ?, ?)",
			E::TABLE
		);
		let result = sqlx::query(&sql)
			.bind(name)
			.bind(guard)
			.bind(now.to_rfc3339())
			.bind(now.to_rfc3339())
			.execute(&self.pool)
			.await
			.map_err(|e| match e {
				sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
					DbError::Conflict(format!("{} '{name}' already exists", E::KIND))
				}
				_ => DbError::Sqlx(e),
			})?;

		let id = u64::try_from(result.last_insert_rowid())
			.map_err(|e| DbError::Internal(format!("Invalid {} id: {e}", E::KIND)))?;

		tracing::info!(kind = %E::KIND, id, name, guard, "entity created");
		Ok(E::from_parts(id, name.to_string(), guard.to_string(), now, now))
	}

	/// Return the entity named `name`, creating it if absent.
	///
	/// The insert is `ON CONFLICT DO NOTHING`, so two concurrent callers can
	/// both attempt it and the unique index guarantees a single row; both then
	/// read that row back. If the row disappears between insert and read (a
	/// concurrent delete), the sequence is retried.
	#[tracing::instrument(skip(self), fields(kind = %E::KIND))]
	pub async fn find_or_create_entity<E: EntityRow>(
		&self,
		guard: &str,
		name: &str,
	) -> Result<E, DbError> {
		let sql = format!(
			r#"
			INSERT INTO {} (name, guard_name, created_at, updated_at)
			VALUES (?, ?, ?, ?)
			ON CONFLICT (guard_name, name) DO NOTHING
			"#,
			E::TABLE
		);

		for attempt in 1..=FIND_OR_CREATE_ATTEMPTS {
			let now = Utc::now().to_rfc3339();
			let result = sqlx::query(&sql)
				.bind(name)
				.bind(guard)
				.bind(&now)
				.bind(&now)
				.execute(&self.pool)
				.await?;

			if let Some(entity) = self.get_entity_by_name::<E>(guard, name).await? {
				if result.rows_affected() > 0 {
					tracing::info!(kind = %E::KIND, id = entity.raw_id(), name, guard, "entity created");
				}
				return Ok(entity);
			}

			tracing::debug!(attempt, name, "entity vanished after insert, retrying");
		}

		Err(DbError::Conflict(format!(
			"{} '{name}' was deleted concurrently {FIND_OR_CREATE_ATTEMPTS} times",
			E::KIND
		)))
	}

	// =========================================================================
	// Lookup
	// =========================================================================

	/// Get an entity by id.
	///
	/// # Returns
	/// `None` if no row has this id. Ids beyond the `i64` range never match.
	#[tracing::instrument(skip(self), fields(kind = %E::KIND))]
	pub async fn get_entity_by_id<E: EntityRow>(&self, id: u64) -> Result<Option<E>, DbError> {
		let Ok(db_id) = i64::try_from(id) else {
			return Ok(None);
		};
		let sql = format!("SELECT {ENTITY_COLUMNS} FROM {} WHERE id = ?", E::TABLE);
		let row = sqlx::query(&sql)
			.bind(db_id)
			.fetch_optional(&self.pool)
			.await?;

		row.map(|r| row_to_entity(&r)).transpose()
	}

	/// Get an entity by name within a guard.
	#[tracing::instrument(skip(self), fields(kind = %E::KIND))]
	pub async fn get_entity_by_name<E: EntityRow>(
		&self,
		guard: &str,
		name: &str,
	) -> Result<Option<E>, DbError> {
		let sql = format!(
			"SELECT {ENTITY_COLUMNS} FROM {} WHERE guard_name = ? AND name = ?",
			E::TABLE
		);
		let row = sqlx::query(&sql)
			.bind(guard)
			.bind(name)
			.fetch_optional(&self.pool)
			.await?;

		row.map(|r| row_to_entity(&r)).transpose()
	}

	/// List all entities in a guard, ordered by name.
	#[tracing::instrument(skip(self), fields(kind = %E::KIND))]
	pub async fn list_entities<E: EntityRow>(&self, guard: &str) -> Result<Vec<E>, DbError> {
		let sql = format!(
			"SELECT {ENTITY_COLUMNS} FROM {} WHERE guard_name = ? ORDER BY name ASC",
			E::TABLE
		);
		let rows = sqlx::query(&sql).bind(guard).fetch_all(&self.pool).await?;

		let entities: Result<Vec<E>, _> = rows.iter().map(row_to_entity).collect();
		let entities = entities?;
		tracing::debug!(kind = %E::KIND, count = entities.len(), "listed entities");
		Ok(entities)
	}

	// =========================================================================
	// Mutation
	// =========================================================================

	/// Rename an entity.
	///
	/// # Returns
	/// The updated entity, or `None` if no row has this id.
	///
	/// # Errors
	/// Returns `DbError::Conflict` if another entity in the guard has the name.
	#[tracing::instrument(skip(self), fields(kind = %E::KIND))]
	pub async fn rename_entity<E: EntityRow>(
		&self,
		id: u64,
		name: &str,
	) -> Result<Option<E>, DbError> {
		let Ok(db_id) = i64::try_from(id) else {
			return Ok(None);
		};
		let sql = format!("UPDATE {} SET name = ?, updated_at = ? WHERE id = ?", E::TABLE);
		let result = sqlx::query(&sql)
			.bind(name)
			.bind(Utc::now().to_rfc3339())
			.bind(db_id)
			.execute(&self.pool)
			.await
			.map_err(|e| match e {
				sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
					DbError::Conflict(format!("{} '{name}' already exists", E::KIND))
				}
				_ => DbError::Sqlx(e),
			})?;

		if result.rows_affected() == 0 {
			return Ok(None);
		}

		tracing::info!(kind = %E::KIND, id, name, "entity renamed");
		self.get_entity_by_id(id).await
	}

	/// Delete an entity.
	///
	/// Association rows referencing it are removed by `ON DELETE CASCADE`.
	///
	/// # Returns
	/// `true` if a row was deleted, `false` if not found.
	#[tracing::instrument(skip(self), fields(kind = %E::KIND))]
	pub async fn delete_entity<E: EntityRow>(&self, id: u64) -> Result<bool, DbError> {
		let Ok(db_id) = i64::try_from(id) else {
			return Ok(false);
		};
		let sql = format!("DELETE FROM {} WHERE id = ?", E::TABLE);
		let result = sqlx::query(&sql).bind(db_id).execute(&self.pool).await?;

		let deleted = result.rows_affected() > 0;
		if deleted {
			tracing::info!(kind = %E::KIND, id, "entity deleted");
		}
		Ok(deleted)
	}
}

/// Decode a row selected with [`ENTITY_COLUMNS`].
pub(crate) fn row_to_entity<E: EntityRow>(row: &SqliteRow) -> Result<E, DbError> {
	let id: i64 = row.try_get("id")?;
	let created_at: String = row.try_get("created_at")?;
	let updated_at: String = row.try_get("updated_at")?;

	let id = u64::try_from(id).map_err(|e| DbError::Internal(format!("Invalid {} id: {e}", E::KIND)))?;

	Ok(E::from_parts(
		id,
		row.try_get("name")?,
		row.try_get("guard_name")?,
		parse_timestamp(&created_at, "created_at")?,
		parse_timestamp(&updated_at, "updated_at")?,
	))
}

fn parse_timestamp(value: &str, column: &str) -> Result<DateTime<Utc>, DbError> {
	DateTime::parse_from_rfc3339(value)
		.map(|dt| dt.with_timezone(&Utc))
		.map_err(|e| DbError::Internal(format!("Invalid {column}: {e}")))
}

#[async_trait]
impl<E: EntityRow> EntityStore<E> for RbacRepository {
	async fn create(&self, guard: &str, name: &str) -> Result<E, DbError> {
		self.create_entity(guard, name).await
	}

	async fn find_or_create(&self, guard: &str, name: &str) -> Result<E, DbError> {
		self.find_or_create_entity(guard, name).await
	}

	async fn get_by_id(&self, id: u64) -> Result<Option<E>, DbError> {
		self.get_entity_by_id(id).await
	}

	async fn get_by_name(&self, guard: &str, name: &str) -> Result<Option<E>, DbError> {
		self.get_entity_by_name(guard, name).await
	}

	async fn rename(&self, id: u64, name: &str) -> Result<Option<E>, DbError> {
		self.rename_entity(id, name).await
	}

	async fn delete(&self, id: u64) -> Result<bool, DbError> {
		self.delete_entity::<E>(id).await
	}

	async fn list(&self, guard: &str) -> Result<Vec<E>, DbError> {
		self.list_entities(guard).await
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::testing::create_test_pool;
	use std::collections::HashSet;

	async fn make_repo() -> RbacRepository {
		RbacRepository::new(create_test_pool().await)
	}

	#[tokio::test]
	async fn test_create_and_get_role() {
		let repo = make_repo().await;
		let role: Role = repo.create_entity("web", "editor").await.unwrap();

		let fetched: Role = repo.get_entity_by_id(role.id.get()).await.unwrap().unwrap();
		assert_eq!(fetched.id, role.id);
		assert_eq!(fetched.name, "editor");
		assert_eq!(fetched.guard_name, "web");

		let by_name: Role = repo
			.get_entity_by_name("web", "editor")
			.await
			.unwrap()
			.unwrap();
		assert_eq!(by_name.id, role.id);
	}

	#[tokio::test]
	async fn test_create_duplicate_conflicts() {
		let repo = make_repo().await;
		let _: Permission = repo.create_entity("web", "publish").await.unwrap();

		let err = repo
			.create_entity::<Permission>("web", "publish")
			.await
			.unwrap_err();
		assert!(matches!(err, DbError::Conflict(_)));
	}

	#[tokio::test]
	async fn test_same_name_in_other_guard_is_distinct() {
		let repo = make_repo().await;
		let web: Role = repo.create_entity("web", "admin").await.unwrap();
		let api: Role = repo.create_entity("api", "admin").await.unwrap();
		assert_ne!(web.id, api.id);
	}

	#[tokio::test]
	async fn test_names_are_case_sensitive() {
		let repo = make_repo().await;
		let _: Role = repo.create_entity("web", "Editor").await.unwrap();

		let lower: Option<Role> = repo.get_entity_by_name("web", "editor").await.unwrap();
		assert!(lower.is_none());
		let _: Role = repo.create_entity("web", "editor").await.unwrap();
	}

	#[tokio::test]
	async fn test_find_or_create_is_idempotent() {
		let repo = make_repo().await;
		let first: Role = repo.find_or_create_entity("web", "writer").await.unwrap();
		let second: Role = repo.find_or_create_entity("web", "writer").await.unwrap();
		assert_eq!(first.id, second.id);

		let all: Vec<Role> = repo.list_entities("web").await.unwrap();
		assert_eq!(all.len(), 1);
	}

	#[tokio::test]
	async fn test_get_missing_and_out_of_range_ids() {
		let repo = make_repo().await;
		let missing: Option<Role> = repo.get_entity_by_id(999).await.unwrap();
		assert!(missing.is_none());
		let huge: Option<Role> = repo.get_entity_by_id(u64::MAX).await.unwrap();
		assert!(huge.is_none());
	}

	#[tokio::test]
	async fn test_rename() {
		let repo = make_repo().await;
		let role: Role = repo.create_entity("web", "writer").await.unwrap();
		let _: Role = repo.create_entity("web", "reviewer").await.unwrap();

		let renamed: Role = repo
			.rename_entity(role.id.get(), "author")
			.await
			.unwrap()
			.unwrap();
		assert_eq!(renamed.name, "author");
		assert!(renamed.updated_at >= role.updated_at);

		let clash = repo
			.rename_entity::<Role>(role.id.get(), "reviewer")
			.await
			.unwrap_err();
		assert!(matches!(clash, DbError::Conflict(_)));

		let missing: Option<Role> = repo.rename_entity(12345, "x").await.unwrap();
		assert!(missing.is_none());
	}

	#[tokio::test]
	async fn test_list_is_scoped_and_ordered() {
		let repo = make_repo().await;
		for name in ["zeta", "alpha", "mid"] {
			let _: Permission = repo.create_entity("web", name).await.unwrap();
		}
		let _: Permission = repo.create_entity("api", "other").await.unwrap();

		let names: Vec<String> = repo
			.list_entities::<Permission>("web")
			.await
			.unwrap()
			.into_iter()
			.map(|p| p.name)
			.collect();
		assert_eq!(names, vec!["alpha", "mid", "zeta"]);
	}

	#[tokio::test]
	async fn test_delete() {
		let repo = make_repo().await;
		let role: Role = repo.create_entity("web", "temp").await.unwrap();

		assert!(repo.delete_entity::<Role>(role.id.get()).await.unwrap());
		assert!(!repo.delete_entity::<Role>(role.id.get()).await.unwrap());
		let gone: Option<Role> = repo.get_entity_by_id(role.id.get()).await.unwrap();
		assert!(gone.is_none());
	}

	#[tokio::test]
	async fn test_concurrent_find_or_create_yields_one_row() {
		let dir = tempfile::tempdir().unwrap();
		let url = format!("sqlite:{}", dir.path().join("race.db").display());
		let pool = crate::create_pool(&url).await.unwrap();
		crate::run_migrations(&pool).await.unwrap();
		let repo = RbacRepository::new(pool);

		let tasks: Vec<_> = (0..8)
			.map(|_| {
				let repo = repo.clone();
				tokio::spawn(async move {
					repo.find_or_create_entity::<Permission>("web", "edit-post")
						.await
						.unwrap()
				})
			})
			.collect();

		let mut ids = HashSet::new();
		for task in tasks {
			ids.insert(task.await.unwrap().id);
		}
		assert_eq!(ids.len(), 1);

		let stored: Permission = repo
			.get_entity_by_name("web", "edit-post")
			.await
			.unwrap()
			.unwrap();
		assert!(ids.contains(&stored.id));
		assert_eq!(repo.list_entities::<Permission>("web").await.unwrap().len(), 1);
	}
}
