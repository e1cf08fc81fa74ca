// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Grant management: assign, remove and sync roles and permissions.
//!
//! Every operation resolves all of its references first. A single bad
//! reference fails the call before any association row is touched; the
//! multi-pair writes themselves are transactional in the store.

use std::sync::Arc;

use warden_core::{
	AuthorizationContext, Permission, PermissionHolder, PermissionRef, Role, RoleHolder, RoleRef,
	UserId,
};
use warden_db::{EntityStore, GrantStore};

use crate::error::Result;
use crate::lookup::LookupService;

pub struct GrantManager<S> {
	store: Arc<S>,
	lookup: LookupService<S>,
}

impl<S> Clone for GrantManager<S> {
	fn clone(&self) -> Self {
		Self {
			store: Arc::clone(&self.store),
			lookup: self.lookup.clone(),
		}
	}
}

impl<S> GrantManager<S>
where
	S: EntityStore<Role> + EntityStore<Permission> + GrantStore,
{
	pub fn new(store: Arc<S>, lookup: LookupService<S>) -> Self {
		Self { store, lookup }
	}

	// =========================================================================
	// Roles on principals
	// =========================================================================

	/// Give the principal every referenced role it does not already hold.
	///
	/// # Returns
	/// Number of roles newly assigned.
	#[tracing::instrument(skip_all, fields(guard = %ctx.guard(), user_id = %principal.principal_id()))]
	pub async fn assign_role<H>(
		&self,
		ctx: &AuthorizationContext,
		principal: &H,
		roles: impl Into<RoleRef>,
	) -> Result<u64>
	where
		H: RoleHolder + ?Sized,
	{
		let resolved = self.lookup.resolve_all(ctx, &roles.into()).await?;
		let ids: Vec<_> = resolved.iter().map(|r| r.id).collect();

		let added = self.store.attach_roles(principal.principal_id(), &ids).await?;
		tracing::info!(added, requested = ids.len(), "roles assigned");
		Ok(added)
	}

	/// Remove a role from the principal. Removing an unheld role is a no-op.
	///
	/// # Returns
	/// `true` if the principal held the role.
	#[tracing::instrument(skip_all, fields(guard = %ctx.guard(), user_id = %principal.principal_id()))]
	pub async fn remove_role<H>(
		&self,
		ctx: &AuthorizationContext,
		principal: &H,
		role: impl Into<RoleRef>,
	) -> Result<bool>
	where
		H: RoleHolder + ?Sized,
	{
		let role = self.lookup.resolve(ctx, &role.into()).await?;
		let removed = self
			.store
			.detach_role(principal.principal_id(), role.id)
			.await?;

		if removed {
			tracing::info!(role = %role.name, "role removed");
		}
		Ok(removed)
	}

	/// Replace the principal's role set with exactly the referenced roles.
	///
	/// Roles of other guards held by the principal are replaced as well; the
	/// role set is per principal, not per guard.
	///
	/// # Returns
	/// Number of distinct roles the principal now holds.
	#[tracing::instrument(skip_all, fields(guard = %ctx.guard(), user_id = %principal.principal_id()))]
	pub async fn sync_roles<H>(
		&self,
		ctx: &AuthorizationContext,
		principal: &H,
		roles: impl Into<RoleRef>,
	) -> Result<usize>
	where
		H: RoleHolder + ?Sized,
	{
		let resolved = self.lookup.resolve_all(ctx, &roles.into()).await?;
		let ids: Vec<_> = resolved.iter().map(|r| r.id).collect();

		self.store
			.replace_roles(principal.principal_id(), &ids)
			.await?;
		tracing::info!(count = ids.len(), "roles synced");
		Ok(ids.len())
	}

	// =========================================================================
	// Permissions on principals and roles
	// =========================================================================

	/// Attach every referenced permission to a principal or role.
	///
	/// # Returns
	/// Number of permissions newly attached.
	#[tracing::instrument(skip_all, fields(guard = %ctx.guard(), holder = %holder.permission_holder()))]
	pub async fn give_permission_to<H>(
		&self,
		ctx: &AuthorizationContext,
		holder: &H,
		permissions: impl Into<PermissionRef>,
	) -> Result<u64>
	where
		H: PermissionHolder + ?Sized,
	{
		let resolved = self.lookup.resolve_all(ctx, &permissions.into()).await?;
		let ids: Vec<_> = resolved.iter().map(|p| p.id).collect();

		let added = self
			.store
			.attach_permissions(holder.permission_holder(), &ids)
			.await?;
		tracing::info!(added, requested = ids.len(), "permissions given");
		Ok(added)
	}

	/// Detach a permission from a principal or role. No-op if not attached.
	#[tracing::instrument(skip_all, fields(guard = %ctx.guard(), holder = %holder.permission_holder()))]
	pub async fn revoke_permission_to<H>(
		&self,
		ctx: &AuthorizationContext,
		holder: &H,
		permission: impl Into<PermissionRef>,
	) -> Result<bool>
	where
		H: PermissionHolder + ?Sized,
	{
		let permission = self.lookup.resolve(ctx, &permission.into()).await?;
		let removed = self
			.store
			.detach_permission(holder.permission_holder(), permission.id)
			.await?;

		if removed {
			tracing::info!(permission = %permission.name, "permission revoked");
		}
		Ok(removed)
	}

	/// Replace the holder's direct permissions with exactly the referenced set.
	///
	/// # Returns
	/// Number of distinct permissions the holder now holds directly.
	#[tracing::instrument(skip_all, fields(guard = %ctx.guard(), holder = %holder.permission_holder()))]
	pub async fn sync_permissions<H>(
		&self,
		ctx: &AuthorizationContext,
		holder: &H,
		permissions: impl Into<PermissionRef>,
	) -> Result<usize>
	where
		H: PermissionHolder + ?Sized,
	{
		let resolved = self.lookup.resolve_all(ctx, &permissions.into()).await?;
		let ids: Vec<_> = resolved.iter().map(|p| p.id).collect();

		self.store
			.replace_permissions(holder.permission_holder(), &ids)
			.await?;
		tracing::info!(count = ids.len(), "permissions synced");
		Ok(ids.len())
	}

	/// Drop every role and direct permission of a principal.
	#[tracing::instrument(skip(self), fields(user_id = %user))]
	pub async fn forget_user(&self, user: UserId) -> Result<u64> {
		Ok(self.store.forget_user(user).await?)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::error::AuthzError;
	use warden_core::Holder;
	use warden_db::testing::create_test_pool;
	use warden_db::RbacRepository;

	struct Fixture {
		repo: Arc<RbacRepository>,
		lookup: LookupService<RbacRepository>,
		grants: GrantManager<RbacRepository>,
		ctx: AuthorizationContext,
	}

	async fn fixture() -> Fixture {
		let repo = Arc::new(RbacRepository::new(create_test_pool().await));
		let lookup = LookupService::new(Arc::clone(&repo));
		let grants = GrantManager::new(Arc::clone(&repo), lookup.clone());
		Fixture {
			repo,
			lookup,
			grants,
			ctx: AuthorizationContext::default(),
		}
	}

	async fn role_names(f: &Fixture, user: UserId) -> Vec<String> {
		f.repo
			.roles_of_user(user)
			.await
			.unwrap()
			.into_iter()
			.map(|r| r.name)
			.collect()
	}

	mod roles {
		use super::*;

		#[tokio::test]
		async fn assign_accepts_mixed_references() {
			let f = fixture().await;
			let a = f.lookup.create_role(&f.ctx, "a").await.unwrap();
			let b = f.lookup.create_role(&f.ctx, "b").await.unwrap();
			f.lookup.create_role(&f.ctx, "c").await.unwrap();
			let user = UserId::new(1);

			let added = f
				.grants
				.assign_role(
					&f.ctx,
					&user,
					RoleRef::Many(vec![
						RoleRef::from(a.id.get()),
						RoleRef::from(&b),
						RoleRef::from("c"),
					]),
				)
				.await
				.unwrap();
			assert_eq!(added, 3);
			assert_eq!(role_names(&f, user).await, vec!["a", "b", "c"]);
		}

		#[tokio::test]
		async fn assign_is_idempotent() {
			let f = fixture().await;
			f.lookup.create_role(&f.ctx, "writer").await.unwrap();
			let user = UserId::new(1);

			assert_eq!(f.grants.assign_role(&f.ctx, &user, "writer").await.unwrap(), 1);
			assert_eq!(f.grants.assign_role(&f.ctx, &user, "writer").await.unwrap(), 0);
			assert_eq!(role_names(&f, user).await, vec!["writer"]);
		}

		#[tokio::test]
		async fn bad_reference_aborts_without_partial_mutation() {
			let f = fixture().await;
			f.lookup.create_role(&f.ctx, "writer").await.unwrap();
			let user = UserId::new(1);

			let err = f
				.grants
				.assign_role(&f.ctx, &user, ["writer", "nope"])
				.await
				.unwrap_err();
			assert!(matches!(err, AuthzError::NotFound { .. }));
			assert!(role_names(&f, user).await.is_empty());
		}

		#[tokio::test]
		async fn remove_unheld_role_is_noop() {
			let f = fixture().await;
			f.lookup.create_role(&f.ctx, "writer").await.unwrap();
			let user = UserId::new(1);

			assert!(!f.grants.remove_role(&f.ctx, &user, "writer").await.unwrap());

			f.grants.assign_role(&f.ctx, &user, "writer").await.unwrap();
			assert!(f.grants.remove_role(&f.ctx, &user, "writer").await.unwrap());
			assert!(role_names(&f, user).await.is_empty());
		}

		#[tokio::test]
		async fn sync_replaces_and_empties() {
			let f = fixture().await;
			for name in ["a", "b", "c"] {
				f.lookup.create_role(&f.ctx, name).await.unwrap();
			}
			let user = UserId::new(2);

			f.grants.assign_role(&f.ctx, &user, ["a", "b"]).await.unwrap();
			let held = f
				.grants
				.sync_roles(&f.ctx, &user, ["c", "a", "c"])
				.await
				.unwrap();
			assert_eq!(held, 2);
			assert_eq!(role_names(&f, user).await, vec!["a", "c"]);

			f.grants
				.sync_roles(&f.ctx, &user, RoleRef::Many(vec![]))
				.await
				.unwrap();
			assert!(role_names(&f, user).await.is_empty());
		}

		#[tokio::test]
		async fn failed_sync_keeps_previous_roles() {
			let f = fixture().await;
			f.lookup.create_role(&f.ctx, "a").await.unwrap();
			let user = UserId::new(2);
			f.grants.assign_role(&f.ctx, &user, "a").await.unwrap();

			let err = f
				.grants
				.sync_roles(&f.ctx, &user, RoleRef::from(9.to_string()))
				.await
				.unwrap_err();
			assert!(err.is_resolution_failure());
			assert_eq!(role_names(&f, user).await, vec!["a"]);
		}
	}

	mod permissions {
		use super::*;

		#[tokio::test]
		async fn give_to_user_and_role() {
			let f = fixture().await;
			let writer = f.lookup.create_role(&f.ctx, "writer").await.unwrap();
			f.lookup.create_permission(&f.ctx, "edit").await.unwrap();
			f.lookup.create_permission(&f.ctx, "publish").await.unwrap();
			let user = UserId::new(3);

			f.grants
				.give_permission_to(&f.ctx, &writer, ["edit", "publish"])
				.await
				.unwrap();
			f.grants
				.give_permission_to(&f.ctx, &user, "edit")
				.await
				.unwrap();

			assert_eq!(
				f.repo
					.permissions_of(Holder::Role(writer.id))
					.await
					.unwrap()
					.len(),
				2
			);
			assert_eq!(
				f.repo.permissions_of(Holder::User(user)).await.unwrap().len(),
				1
			);
		}

		#[tokio::test]
		async fn revoke_unheld_permission_is_noop() {
			let f = fixture().await;
			f.lookup.create_permission(&f.ctx, "edit").await.unwrap();
			f.lookup.create_permission(&f.ctx, "view").await.unwrap();
			let user = UserId::new(3);
			f.grants
				.give_permission_to(&f.ctx, &user, "view")
				.await
				.unwrap();

			assert!(!f
				.grants
				.revoke_permission_to(&f.ctx, &user, "edit")
				.await
				.unwrap());

			let remaining = f.repo.permissions_of(Holder::User(user)).await.unwrap();
			assert_eq!(remaining.len(), 1);
			assert_eq!(remaining[0].name, "view");
		}

		#[tokio::test]
		async fn sync_permissions_on_role() {
			let f = fixture().await;
			let writer = f.lookup.create_role(&f.ctx, "writer").await.unwrap();
			for name in ["edit", "view", "delete"] {
				f.lookup.create_permission(&f.ctx, name).await.unwrap();
			}

			f.grants
				.give_permission_to(&f.ctx, &writer.id, ["edit", "view"])
				.await
				.unwrap();
			f.grants
				.sync_permissions(&f.ctx, &writer.id, "delete")
				.await
				.unwrap();

			let names: Vec<_> = f
				.repo
				.permissions_of(Holder::Role(writer.id))
				.await
				.unwrap()
				.into_iter()
				.map(|p| p.name)
				.collect();
			assert_eq!(names, vec!["delete"]);
		}

		#[tokio::test]
		async fn foreign_guard_permission_aborts_give() {
			let f = fixture().await;
			let api = AuthorizationContext::new("api");
			let foreign = f.lookup.create_permission(&api, "edit").await.unwrap();
			f.lookup.create_permission(&f.ctx, "view").await.unwrap();
			let user = UserId::new(3);

			let err = f
				.grants
				.give_permission_to(
					&f.ctx,
					&user,
					PermissionRef::Many(vec!["view".into(), foreign.into()]),
				)
				.await
				.unwrap_err();
			assert!(matches!(err, AuthzError::GuardMismatch { .. }));
			assert!(f
				.repo
				.permissions_of(Holder::User(user))
				.await
				.unwrap()
				.is_empty());
		}
	}

	#[tokio::test]
	async fn forget_user_clears_grants() {
		let f = fixture().await;
		f.lookup.create_role(&f.ctx, "writer").await.unwrap();
		f.lookup.create_permission(&f.ctx, "edit").await.unwrap();
		let user = UserId::new(8);

		f.grants.assign_role(&f.ctx, &user, "writer").await.unwrap();
		f.grants
			.give_permission_to(&f.ctx, &user, "edit")
			.await
			.unwrap();

		assert_eq!(f.grants.forget_user(user).await.unwrap(), 2);
		assert!(role_names(&f, user).await.is_empty());
	}
}
