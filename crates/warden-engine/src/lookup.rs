// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Role and permission lookup.
//!
//! Every path that turns a caller-supplied [`Reference`] into a stored entity
//! goes through [`LookupService`], so grants and decisions share one identity
//! resolution. Lookups are scoped to the [`AuthorizationContext`] guard.

use std::collections::HashSet;
use std::sync::Arc;

use warden_core::{
	validate_name, AuthorizationContext, Entity, InvalidReference, Permission, Reference, Role,
	DEFAULT_MAX_NAME_LENGTH,
};
use warden_db::{DbError, EntityStore};

use crate::error::{AuthzError, Result};

/// Resolves roles and permissions by id, name or reference.
pub struct LookupService<S> {
	store: Arc<S>,
	max_name_length: usize,
}

impl<S> Clone for LookupService<S> {
	fn clone(&self) -> Self {
		Self {
			store: Arc::clone(&self.store),
			max_name_length: self.max_name_length,
		}
	}
}

impl<S> LookupService<S>
where
	S: EntityStore<Role> + EntityStore<Permission>,
{
	pub fn new(store: Arc<S>) -> Self {
		Self::with_max_name_length(store, DEFAULT_MAX_NAME_LENGTH)
	}

	pub fn with_max_name_length(store: Arc<S>, max_name_length: usize) -> Self {
		Self {
			store,
			max_name_length,
		}
	}

	pub fn max_name_length(&self) -> usize {
		self.max_name_length
	}

	// =========================================================================
	// Generic lookup
	// =========================================================================

	/// Fetch by id. Entities of another guard are reported as a mismatch.
	#[tracing::instrument(skip(self, ctx), fields(kind = %E::KIND, guard = %ctx.guard()))]
	pub async fn find_by_id<E>(&self, ctx: &AuthorizationContext, id: u64) -> Result<E>
	where
		E: Entity,
		S: EntityStore<E>,
	{
		let entity = EntityStore::<E>::get_by_id(&*self.store, id)
			.await?
			.ok_or_else(|| AuthzError::not_found_id(E::KIND, id))?;
		ensure_guard(ctx, &entity)?;
		Ok(entity)
	}

	#[tracing::instrument(skip(self, ctx), fields(kind = %E::KIND, guard = %ctx.guard()))]
	pub async fn find_by_name<E>(&self, ctx: &AuthorizationContext, name: &str) -> Result<E>
	where
		E: Entity,
		S: EntityStore<E>,
	{
		EntityStore::<E>::get_by_name(&*self.store, ctx.guard(), name)
			.await?
			.ok_or_else(|| AuthzError::not_found_name(E::KIND, name))
	}

	/// Return the named entity, creating it if absent.
	///
	/// Safe under concurrent calls with the same name: all callers observe
	/// the same identity.
	#[tracing::instrument(skip(self, ctx), fields(kind = %E::KIND, guard = %ctx.guard()))]
	pub async fn find_or_create<E>(&self, ctx: &AuthorizationContext, name: &str) -> Result<E>
	where
		E: Entity,
		S: EntityStore<E>,
	{
		validate_name(E::KIND, name, self.max_name_length)?;
		Ok(EntityStore::<E>::find_or_create(&*self.store, ctx.guard(), name).await?)
	}

	/// Create a new entity, failing with `AlreadyExists` on a duplicate name.
	#[tracing::instrument(skip(self, ctx), fields(kind = %E::KIND, guard = %ctx.guard()))]
	pub async fn create<E>(&self, ctx: &AuthorizationContext, name: &str) -> Result<E>
	where
		E: Entity,
		S: EntityStore<E>,
	{
		validate_name(E::KIND, name, self.max_name_length)?;
		EntityStore::<E>::create(&*self.store, ctx.guard(), name)
			.await
			.map_err(|e| already_exists::<E>(e, name))
	}

	/// Rename the referenced entity.
	#[tracing::instrument(skip(self, ctx, reference), fields(kind = %E::KIND, guard = %ctx.guard()))]
	pub async fn rename<E>(
		&self,
		ctx: &AuthorizationContext,
		reference: &Reference<E>,
		new_name: &str,
	) -> Result<E>
	where
		E: Entity,
		S: EntityStore<E>,
	{
		validate_name(E::KIND, new_name, self.max_name_length)?;
		let entity = self.resolve(ctx, reference).await?;
		let id = entity.raw_id();

		EntityStore::<E>::rename(&*self.store, id, new_name)
			.await
			.map_err(|e| already_exists::<E>(e, new_name))?
			.ok_or_else(|| AuthzError::not_found_id(E::KIND, id))
	}

	/// Delete the referenced entity and, by cascade, all of its grants.
	#[tracing::instrument(skip(self, ctx, reference), fields(kind = %E::KIND, guard = %ctx.guard()))]
	pub async fn delete<E>(&self, ctx: &AuthorizationContext, reference: &Reference<E>) -> Result<E>
	where
		E: Entity,
		S: EntityStore<E>,
	{
		let entity = self.resolve(ctx, reference).await?;
		if !EntityStore::<E>::delete(&*self.store, entity.raw_id()).await? {
			return Err(AuthzError::not_found_id(E::KIND, entity.raw_id()));
		}
		Ok(entity)
	}

	pub async fn list<E>(&self, ctx: &AuthorizationContext) -> Result<Vec<E>>
	where
		E: Entity,
		S: EntityStore<E>,
	{
		Ok(EntityStore::<E>::list(&*self.store, ctx.guard()).await?)
	}

	// =========================================================================
	// Reference normalization
	// =========================================================================

	/// Resolve a single reference. Lists are rejected with `InvalidReference`.
	///
	/// Entity references are re-read from the store, so a reference to a
	/// deleted entity fails with `NotFound`.
	pub async fn resolve<E>(&self, ctx: &AuthorizationContext, reference: &Reference<E>) -> Result<E>
	where
		E: Entity,
		S: EntityStore<E>,
	{
		match reference {
			Reference::Id(id) => self.find_by_id(ctx, *id).await,
			Reference::Name(name) => self.find_by_name(ctx, name).await,
			Reference::Entity(entity) => {
				ensure_guard(ctx, entity)?;
				self.find_by_id(ctx, entity.raw_id()).await
			}
			Reference::Many(_) => Err(InvalidReference::new(E::KIND, reference.to_string()).into()),
		}
	}

	/// Resolve every element of a (possibly nested) reference.
	///
	/// Fails on the first unresolvable element, before the caller mutates
	/// anything. The result is deduplicated by id and keeps input order.
	pub async fn resolve_all<E>(
		&self,
		ctx: &AuthorizationContext,
		reference: &Reference<E>,
	) -> Result<Vec<E>>
	where
		E: Entity,
		S: EntityStore<E>,
	{
		let mut seen = HashSet::new();
		let mut resolved = Vec::new();
		for leaf in reference.leaves() {
			let entity = self.resolve(ctx, leaf).await?;
			if seen.insert(entity.raw_id()) {
				resolved.push(entity);
			}
		}
		tracing::debug!(kind = %E::KIND, count = resolved.len(), "references resolved");
		Ok(resolved)
	}

	// =========================================================================
	// Typed conveniences
	// =========================================================================

	pub async fn find_role_by_name(&self, ctx: &AuthorizationContext, name: &str) -> Result<Role> {
		self.find_by_name(ctx, name).await
	}

	pub async fn find_role_by_id(&self, ctx: &AuthorizationContext, id: u64) -> Result<Role> {
		self.find_by_id(ctx, id).await
	}

	pub async fn find_or_create_role(&self, ctx: &AuthorizationContext, name: &str) -> Result<Role> {
		self.find_or_create(ctx, name).await
	}

	pub async fn create_role(&self, ctx: &AuthorizationContext, name: &str) -> Result<Role> {
		self.create(ctx, name).await
	}

	pub async fn list_roles(&self, ctx: &AuthorizationContext) -> Result<Vec<Role>> {
		self.list(ctx).await
	}

	pub async fn find_permission_by_name(
		&self,
		ctx: &AuthorizationContext,
		name: &str,
	) -> Result<Permission> {
		self.find_by_name(ctx, name).await
	}

	pub async fn find_permission_by_id(
		&self,
		ctx: &AuthorizationContext,
		id: u64,
	) -> Result<Permission> {
		self.find_by_id(ctx, id).await
	}

	pub async fn find_or_create_permission(
		&self,
		ctx: &AuthorizationContext,
		name: &str,
	) -> Result<Permission> {
		self.find_or_create(ctx, name).await
	}

	pub async fn create_permission(
		&self,
		ctx: &AuthorizationContext,
		name: &str,
	) -> Result<Permission> {
		self.create(ctx, name).await
	}

	pub async fn list_permissions(&self, ctx: &AuthorizationContext) -> Result<Vec<Permission>> {
		self.list(ctx).await
	}
}

fn ensure_guard<E: Entity>(ctx: &AuthorizationContext, entity: &E) -> Result<()> {
	if ctx.owns(entity) {
		return Ok(());
	}
	Err(AuthzError::GuardMismatch {
		kind: E::KIND,
		name: entity.name().to_string(),
		expected: ctx.guard().to_string(),
		actual: entity.guard_name().to_string(),
	})
}

fn already_exists<E: Entity>(err: DbError, name: &str) -> AuthzError {
	match err {
		DbError::Conflict(_) => AuthzError::AlreadyExists {
			kind: E::KIND,
			name: name.to_string(),
		},
		other => AuthzError::Db(other),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use warden_core::{EntityKind, NameError, PermissionRef, RoleRef};
	use warden_db::testing::create_test_pool;
	use warden_db::RbacRepository;

	async fn make_lookup() -> LookupService<RbacRepository> {
		let repo = RbacRepository::new(create_test_pool().await);
		LookupService::new(Arc::new(repo))
	}

	fn web() -> AuthorizationContext {
		AuthorizationContext::default()
	}

	mod find {
		use super::*;

		#[tokio::test]
		async fn missing_name_is_not_found() {
			let lookup = make_lookup().await;
			let err = lookup.find_role_by_name(&web(), "ghost").await.unwrap_err();
			assert!(matches!(
				err,
				AuthzError::NotFound {
					kind: EntityKind::Role,
					..
				}
			));
		}

		#[tokio::test]
		async fn missing_and_out_of_range_ids_are_not_found() {
			let lookup = make_lookup().await;
			for id in [42, u64::MAX] {
				let err = lookup.find_permission_by_id(&web(), id).await.unwrap_err();
				assert!(matches!(err, AuthzError::NotFound { .. }), "{id}: {err}");
			}
		}

		#[tokio::test]
		async fn lookups_are_guard_scoped() {
			let lookup = make_lookup().await;
			let api = AuthorizationContext::new("api");
			let admin = lookup.create_role(&api, "admin").await.unwrap();

			assert!(lookup.find_role_by_name(&web(), "admin").await.is_err());
			let err = lookup
				.find_role_by_id(&web(), admin.id.get())
				.await
				.unwrap_err();
			assert!(matches!(err, AuthzError::GuardMismatch { .. }));
		}

		#[tokio::test]
		async fn find_or_create_twice_returns_same_identity() {
			let lookup = make_lookup().await;
			let first = lookup.find_or_create_role(&web(), "writer").await.unwrap();
			let second = lookup.find_or_create_role(&web(), "writer").await.unwrap();
			assert_eq!(first.id, second.id);
		}

		#[tokio::test]
		async fn find_or_create_validates_names() {
			let lookup = make_lookup().await;
			let err = lookup
				.find_or_create_permission(&web(), "   ")
				.await
				.unwrap_err();
			assert!(matches!(err, AuthzError::InvalidName(NameError::Blank { .. })));

			let long = "x".repeat(DEFAULT_MAX_NAME_LENGTH + 1);
			let err = lookup
				.find_or_create_permission(&web(), &long)
				.await
				.unwrap_err();
			assert!(matches!(err, AuthzError::InvalidName(NameError::TooLong { .. })));
		}
	}

	mod manage {
		use super::*;

		#[tokio::test]
		async fn strict_create_rejects_duplicates() {
			let lookup = make_lookup().await;
			lookup.create_permission(&web(), "publish").await.unwrap();
			let err = lookup
				.create_permission(&web(), "publish")
				.await
				.unwrap_err();
			assert!(matches!(err, AuthzError::AlreadyExists { .. }));
		}

		#[tokio::test]
		async fn rename_by_name_and_clash() {
			let lookup = make_lookup().await;
			let writer = lookup.create_role(&web(), "writer").await.unwrap();
			lookup.create_role(&web(), "editor").await.unwrap();

			let renamed = lookup
				.rename(&web(), &RoleRef::from("writer"), "author")
				.await
				.unwrap();
			assert_eq!(renamed.id, writer.id);
			assert_eq!(renamed.name, "author");

			let err = lookup
				.rename(&web(), &RoleRef::from("author"), "editor")
				.await
				.unwrap_err();
			assert!(matches!(err, AuthzError::AlreadyExists { .. }));
		}

		#[tokio::test]
		async fn delete_then_stale_entity_is_not_found() {
			let lookup = make_lookup().await;
			let publish = lookup.create_permission(&web(), "publish").await.unwrap();

			lookup
				.delete(&web(), &PermissionRef::from(publish.id))
				.await
				.unwrap();
			let err = lookup
				.resolve(&web(), &PermissionRef::from(&publish))
				.await
				.unwrap_err();
			assert!(matches!(err, AuthzError::NotFound { .. }));
		}
	}

	mod normalize {
		use super::*;

		#[tokio::test]
		async fn resolves_every_shape() {
			let lookup = make_lookup().await;
			let publish = lookup.create_permission(&web(), "publish").await.unwrap();

			for reference in [
				PermissionRef::from(publish.id.get()),
				PermissionRef::from("publish"),
				PermissionRef::from(publish.clone()),
			] {
				let resolved = lookup.resolve(&web(), &reference).await.unwrap();
				assert_eq!(resolved.id, publish.id);
			}
		}

		#[tokio::test]
		async fn single_resolution_rejects_lists() {
			let lookup = make_lookup().await;
			let err = lookup
				.resolve(&web(), &PermissionRef::many(["a", "b"]))
				.await
				.unwrap_err();
			assert!(matches!(err, AuthzError::InvalidReference(_)));
		}

		#[tokio::test]
		async fn entity_from_other_guard_is_a_mismatch() {
			let lookup = make_lookup().await;
			let api = AuthorizationContext::new("api");
			let foreign = lookup.create_role(&api, "admin").await.unwrap();

			let err = lookup
				.resolve(&web(), &RoleRef::from(foreign))
				.await
				.unwrap_err();
			assert!(matches!(err, AuthzError::GuardMismatch { .. }));
		}

		#[tokio::test]
		async fn resolve_all_dedupes_and_keeps_order() {
			let lookup = make_lookup().await;
			let a = lookup.create_role(&web(), "a").await.unwrap();
			let b = lookup.create_role(&web(), "b").await.unwrap();

			let reference = RoleRef::Many(vec![
				RoleRef::from("b"),
				RoleRef::Many(vec![RoleRef::from(a.id), RoleRef::from("a")]),
				RoleRef::from(&b),
			]);
			let resolved = lookup.resolve_all(&web(), &reference).await.unwrap();
			let ids: Vec<_> = resolved.iter().map(|r| r.id).collect();
			assert_eq!(ids, vec![b.id, a.id]);
		}

		#[tokio::test]
		async fn resolve_all_fails_on_any_bad_element() {
			let lookup = make_lookup().await;
			lookup.create_role(&web(), "a").await.unwrap();

			let err = lookup
				.resolve_all(&web(), &RoleRef::many(["a", "missing"]))
				.await
				.unwrap_err();
			assert!(matches!(err, AuthzError::NotFound { .. }));
		}
	}
}
