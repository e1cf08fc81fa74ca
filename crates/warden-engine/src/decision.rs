// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Authorization decisions.
//!
//! This module answers "does this principal hold role X / permission Y" from
//! the current association state. Nothing is cached: every call reads the
//! store.
//!
//! Two families of permission checks exist:
//!
//! 1. **`has_*`**: unresolvable references are errors (fail closed)
//! 2. **`check_*` and `has_any_*`/`has_all_*` permissions**: unresolvable
//!    references are a denial for that element
//!
//! Storage failures are always returned as errors, never turned into a
//! decision.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use warden_core::{
	AuthorizationContext, Entity, Holder, Permission, PermissionHolder, PermissionRef, Reference,
	Role, RoleHolder, RoleRef, UserId,
};
use warden_db::{EntityStore, GrantStore};

use crate::error::{AuthzError, Result};
use crate::lookup::LookupService;

pub struct DecisionEngine<S> {
	store: Arc<S>,
	lookup: LookupService<S>,
}

impl<S> Clone for DecisionEngine<S> {
	fn clone(&self) -> Self {
		Self {
			store: Arc::clone(&self.store),
			lookup: self.lookup.clone(),
		}
	}
}

impl<S> DecisionEngine<S>
where
	S: EntityStore<Role> + EntityStore<Permission> + GrantStore,
{
	pub fn new(store: Arc<S>, lookup: LookupService<S>) -> Self {
		Self { store, lookup }
	}

	// =========================================================================
	// Roles
	// =========================================================================

	/// Roles the principal holds in this guard, ordered by name.
	pub async fn get_roles<H>(&self, ctx: &AuthorizationContext, principal: &H) -> Result<Vec<Role>>
	where
		H: RoleHolder + ?Sized,
	{
		let roles = self.store.roles_of_user(principal.principal_id()).await?;
		Ok(roles.into_iter().filter(|r| ctx.owns(r)).collect())
	}

	pub async fn get_role_names<H>(
		&self,
		ctx: &AuthorizationContext,
		principal: &H,
	) -> Result<Vec<String>>
	where
		H: RoleHolder + ?Sized,
	{
		let roles = self.get_roles(ctx, principal).await?;
		Ok(roles.into_iter().map(|r| r.name).collect())
	}

	/// Whether the principal holds at least one of the referenced roles.
	///
	/// References are matched against the held roles by id, name or entity
	/// identity; a name no role carries is simply not held. An empty list is
	/// never held.
	#[tracing::instrument(skip_all, fields(guard = %ctx.guard(), user_id = %principal.principal_id()))]
	pub async fn has_role<H>(
		&self,
		ctx: &AuthorizationContext,
		principal: &H,
		roles: impl Into<RoleRef>,
	) -> Result<bool>
	where
		H: RoleHolder + ?Sized,
	{
		let wanted = checked_leaves(ctx, roles.into())?;
		let held = self.get_roles(ctx, principal).await?;

		let allowed = wanted
			.iter()
			.any(|reference| held.iter().any(|role| reference.matches(role)));
		tracing::debug!(allowed, "role check");
		Ok(allowed)
	}

	/// Alias of [`DecisionEngine::has_role`] for list arguments.
	pub async fn has_any_role<H>(
		&self,
		ctx: &AuthorizationContext,
		principal: &H,
		roles: impl Into<RoleRef>,
	) -> Result<bool>
	where
		H: RoleHolder + ?Sized,
	{
		self.has_role(ctx, principal, roles).await
	}

	/// Whether the principal holds every referenced role. True for an empty list.
	#[tracing::instrument(skip_all, fields(guard = %ctx.guard(), user_id = %principal.principal_id()))]
	pub async fn has_all_roles<H>(
		&self,
		ctx: &AuthorizationContext,
		principal: &H,
		roles: impl Into<RoleRef>,
	) -> Result<bool>
	where
		H: RoleHolder + ?Sized,
	{
		let wanted = checked_leaves(ctx, roles.into())?;
		if wanted.is_empty() {
			return Ok(true);
		}
		let held = self.get_roles(ctx, principal).await?;

		let allowed = wanted
			.iter()
			.all(|reference| held.iter().any(|role| reference.matches(role)));
		tracing::debug!(allowed, "all-roles check");
		Ok(allowed)
	}

	// =========================================================================
	// Permissions
	// =========================================================================

	/// Whether the permission is attached directly to the holder.
	///
	/// # Errors
	/// Resolution failures are returned, not treated as a denial.
	#[tracing::instrument(skip_all, fields(guard = %ctx.guard(), holder = %holder.permission_holder()))]
	pub async fn has_direct_permission<H>(
		&self,
		ctx: &AuthorizationContext,
		holder: &H,
		permission: impl Into<PermissionRef>,
	) -> Result<bool>
	where
		H: PermissionHolder + ?Sized,
	{
		let permission = self.lookup.resolve(ctx, &permission.into()).await?;
		self.direct(holder.permission_holder(), &permission).await
	}

	/// Whether any role the principal holds carries the permission.
	#[tracing::instrument(skip_all, fields(guard = %ctx.guard(), user_id = %principal.principal_id()))]
	pub async fn has_permission_via_role<H>(
		&self,
		ctx: &AuthorizationContext,
		principal: &H,
		permission: impl Into<PermissionRef>,
	) -> Result<bool>
	where
		H: RoleHolder + ?Sized,
	{
		let permission = self.lookup.resolve(ctx, &permission.into()).await?;
		self.via_role(ctx, principal, &permission).await
	}

	/// Whether the principal holds the permission directly or through a role.
	///
	/// # Errors
	/// Unresolvable references fail with `NotFound`, `InvalidReference` or
	/// `GuardMismatch`. Use [`DecisionEngine::check_permission`] for a variant
	/// that denies instead.
	#[tracing::instrument(skip_all, fields(guard = %ctx.guard(), user_id = %principal.principal_id()))]
	pub async fn has_permission<H>(
		&self,
		ctx: &AuthorizationContext,
		principal: &H,
		permission: impl Into<PermissionRef>,
	) -> Result<bool>
	where
		H: RoleHolder + PermissionHolder + ?Sized,
	{
		let permission = self.lookup.resolve(ctx, &permission.into()).await?;

		let allowed = self.direct(principal.permission_holder(), &permission).await?
			|| self.via_role(ctx, principal, &permission).await?;
		tracing::debug!(permission = %permission.name, allowed, "permission check");
		Ok(allowed)
	}

	/// [`DecisionEngine::has_permission`], with resolution failures turned
	/// into `false`. Storage errors are still returned.
	pub async fn check_permission<H>(
		&self,
		ctx: &AuthorizationContext,
		principal: &H,
		permission: impl Into<PermissionRef>,
	) -> Result<bool>
	where
		H: RoleHolder + PermissionHolder + ?Sized,
	{
		match self.has_permission(ctx, principal, permission).await {
			Ok(allowed) => Ok(allowed),
			Err(err) if err.is_resolution_failure() => {
				tracing::warn!(
					user_id = %principal.principal_id(),
					error = %err,
					"permission reference unresolved, denying"
				);
				Ok(false)
			}
			Err(err) => Err(err),
		}
	}

	/// True if [`DecisionEngine::check_permission`] passes for any element.
	pub async fn has_any_permission<H>(
		&self,
		ctx: &AuthorizationContext,
		principal: &H,
		permissions: impl Into<PermissionRef>,
	) -> Result<bool>
	where
		H: RoleHolder + PermissionHolder + ?Sized,
	{
		for permission in permissions.into().into_leaves() {
			if self.check_permission(ctx, principal, permission).await? {
				return Ok(true);
			}
		}
		Ok(false)
	}

	/// True if [`DecisionEngine::check_permission`] passes for every element.
	/// An empty list is vacuously true.
	pub async fn has_all_permissions<H>(
		&self,
		ctx: &AuthorizationContext,
		principal: &H,
		permissions: impl Into<PermissionRef>,
	) -> Result<bool>
	where
		H: RoleHolder + PermissionHolder + ?Sized,
	{
		for permission in permissions.into().into_leaves() {
			if !self.check_permission(ctx, principal, permission).await? {
				return Ok(false);
			}
		}
		Ok(true)
	}

	/// Permissions attached directly to a principal or role in this guard.
	pub async fn get_direct_permissions<H>(
		&self,
		ctx: &AuthorizationContext,
		holder: &H,
	) -> Result<Vec<Permission>>
	where
		H: PermissionHolder + ?Sized,
	{
		let permissions = self.store.permissions_of(holder.permission_holder()).await?;
		Ok(in_guard(ctx, permissions))
	}

	/// Union of the permissions of every role the principal holds.
	pub async fn get_permissions_via_roles<H>(
		&self,
		ctx: &AuthorizationContext,
		principal: &H,
	) -> Result<Vec<Permission>>
	where
		H: RoleHolder + ?Sized,
	{
		let permissions = self
			.store
			.permissions_via_roles(principal.principal_id())
			.await?;
		Ok(in_guard(ctx, permissions))
	}

	/// Direct and role-mediated permissions, deduplicated by id and sorted by name.
	#[tracing::instrument(skip_all, fields(guard = %ctx.guard(), user_id = %principal.principal_id()))]
	pub async fn get_all_permissions<H>(
		&self,
		ctx: &AuthorizationContext,
		principal: &H,
	) -> Result<Vec<Permission>>
	where
		H: RoleHolder + PermissionHolder + ?Sized,
	{
		let direct = self.get_direct_permissions(ctx, principal).await?;
		let via_roles = self.get_permissions_via_roles(ctx, principal).await?;

		let mut by_name = BTreeMap::new();
		let mut seen = HashSet::new();
		for permission in direct.into_iter().chain(via_roles) {
			if seen.insert(permission.id) {
				by_name.insert((permission.name.clone(), permission.id), permission);
			}
		}
		Ok(by_name.into_values().collect())
	}

	pub async fn get_permission_names<H>(
		&self,
		ctx: &AuthorizationContext,
		principal: &H,
	) -> Result<Vec<String>>
	where
		H: RoleHolder + PermissionHolder + ?Sized,
	{
		let permissions = self.get_all_permissions(ctx, principal).await?;
		Ok(permissions.into_iter().map(|p| p.name).collect())
	}

	// =========================================================================
	// Reverse relations
	// =========================================================================

	/// Roles that carry the permission.
	pub async fn roles_with_permission(
		&self,
		ctx: &AuthorizationContext,
		permission: impl Into<PermissionRef>,
	) -> Result<Vec<Role>> {
		let permission = self.lookup.resolve(ctx, &permission.into()).await?;
		let roles = self.store.roles_with_permission(permission.id).await?;
		Ok(in_guard(ctx, roles))
	}

	pub async fn permissions_of_role(
		&self,
		ctx: &AuthorizationContext,
		role: impl Into<RoleRef>,
	) -> Result<Vec<Permission>> {
		let role = self.lookup.resolve(ctx, &role.into()).await?;
		self.get_direct_permissions(ctx, &role).await
	}

	/// Whether the role carries the permission.
	pub async fn role_has_permission(
		&self,
		ctx: &AuthorizationContext,
		role: impl Into<RoleRef>,
		permission: impl Into<PermissionRef>,
	) -> Result<bool> {
		let role = self.lookup.resolve(ctx, &role.into()).await?;
		self.has_direct_permission(ctx, &role, permission).await
	}

	pub async fn users_with_role(
		&self,
		ctx: &AuthorizationContext,
		role: impl Into<RoleRef>,
	) -> Result<Vec<UserId>> {
		let role = self.lookup.resolve(ctx, &role.into()).await?;
		Ok(self.store.users_with_any_role(&[role.id]).await?)
	}

	/// Principals holding at least one of the referenced roles.
	///
	/// Every reference must resolve.
	#[tracing::instrument(skip_all, fields(guard = %ctx.guard()))]
	pub async fn users_with_any_role(
		&self,
		ctx: &AuthorizationContext,
		roles: impl Into<RoleRef>,
	) -> Result<Vec<UserId>> {
		let roles = self.lookup.resolve_all(ctx, &roles.into()).await?;
		let ids: Vec<_> = roles.iter().map(|r| r.id).collect();
		Ok(self.store.users_with_any_role(&ids).await?)
	}

	/// Principals the permission is attached to directly.
	pub async fn users_with_permission(
		&self,
		ctx: &AuthorizationContext,
		permission: impl Into<PermissionRef>,
	) -> Result<Vec<UserId>> {
		let permission = self.lookup.resolve(ctx, &permission.into()).await?;
		Ok(self.store.users_with_permission(permission.id).await?)
	}

	// =========================================================================
	// Internals
	// =========================================================================

	async fn direct(&self, holder: Holder, permission: &Permission) -> Result<bool> {
		Ok(self
			.store
			.holder_has_permission(holder, permission.id)
			.await?)
	}

	/// Role path of a permission check, phrased as a role check over the
	/// roles linked to the permission.
	async fn via_role<H>(
		&self,
		ctx: &AuthorizationContext,
		principal: &H,
		permission: &Permission,
	) -> Result<bool>
	where
		H: RoleHolder + ?Sized,
	{
		let linked = self.store.roles_with_permission(permission.id).await?;
		let linked = in_guard(ctx, linked);
		if linked.is_empty() {
			return Ok(false);
		}
		self.has_role(ctx, principal, RoleRef::many(linked)).await
	}
}

/// Flatten a role reference, rejecting entities of another guard.
fn checked_leaves(ctx: &AuthorizationContext, roles: RoleRef) -> Result<Vec<RoleRef>> {
	let leaves = roles.into_leaves();
	for leaf in &leaves {
		if let Reference::Entity(role) = leaf {
			if !ctx.owns(role) {
				return Err(AuthzError::GuardMismatch {
					kind: Role::KIND,
					name: role.name.clone(),
					expected: ctx.guard().to_string(),
					actual: role.guard_name.clone(),
				});
			}
		}
	}
	Ok(leaves)
}

fn in_guard<E: Entity>(ctx: &AuthorizationContext, entities: Vec<E>) -> Vec<E> {
	entities.into_iter().filter(|e| ctx.owns(e)).collect()
}
