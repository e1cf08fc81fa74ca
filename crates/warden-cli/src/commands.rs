// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Command execution against the engine.

use std::io::Write;
use std::process::ExitCode;

use anyhow::{bail, Context};
use warden_config::AuthzConfig;
use warden_core::{
	AuthorizationContext, Entity, Holder, Permission, PermissionRef, Reference, Role, RoleRef,
	UserId,
};
use warden_db::{run_migrations, RbacRepository};
use warden_engine::Rbac;

use crate::cli::{
	CheckCommand, Command, GrantCommand, HolderArgs, PermissionCommand, RevokeCommand,
	RoleCommand, SyncCommand,
};

/// Result of a command, mapped onto the process exit status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
	Done,
	Allowed,
	Denied,
}

impl Outcome {
	fn decision(allowed: bool) -> Self {
		if allowed {
			Outcome::Allowed
		} else {
			Outcome::Denied
		}
	}

	pub fn exit_code(self) -> ExitCode {
		match self {
			Outcome::Done | Outcome::Allowed => ExitCode::SUCCESS,
			Outcome::Denied => ExitCode::from(1),
		}
	}
}

/// One administrative session bound to a guard.
pub struct Admin {
	repo: RbacRepository,
	rbac: Rbac<RbacRepository>,
	ctx: AuthorizationContext,
	authz: AuthzConfig,
}

fn references<E: Entity>(args: &[String]) -> Reference<E> {
	Reference::many(args.iter().map(|arg| Reference::<E>::from_arg(arg)))
}

fn write_roles<W: Write>(out: &mut W, roles: &[Role]) -> anyhow::Result<()> {
	for role in roles {
		writeln!(out, "{}\t{}\t{}", role.id, role.name, role.guard_name)?;
	}
	Ok(())
}

fn write_permissions<W: Write>(out: &mut W, permissions: &[Permission]) -> anyhow::Result<()> {
	for permission in permissions {
		writeln!(
			out,
			"{}\t{}\t{}",
			permission.id, permission.name, permission.guard_name
		)?;
	}
	Ok(())
}

fn write_json<W: Write>(out: &mut W, value: &serde_json::Value) -> anyhow::Result<()> {
	serde_json::to_writer_pretty(&mut *out, value)?;
	writeln!(out)?;
	Ok(())
}

impl Admin {
	pub fn new(repo: RbacRepository, ctx: AuthorizationContext, authz: AuthzConfig) -> Self {
		let rbac = Rbac::with_max_name_length(repo.clone(), authz.max_name_length);
		Self {
			repo,
			rbac,
			ctx,
			authz,
		}
	}

	pub async fn execute<W: Write>(&self, command: Command, out: &mut W) -> anyhow::Result<Outcome> {
		match command {
			Command::Migrate => {
				run_migrations(self.repo.pool()).await?;
				writeln!(out, "migrations applied")?;
				Ok(Outcome::Done)
			}
			Command::Role { command } => self.role(command, out).await,
			Command::Permission { command } => self.permission(command, out).await,
			Command::Grant { command } => self.grant(command, out).await,
			Command::Revoke { command } => self.revoke(command, out).await,
			Command::Sync { command } => self.sync(command, out).await,
			Command::Check { command } => self.check(command, out).await,
			Command::Show { user, json } => self.show(UserId::new(user), json, out).await,
		}
	}

	async fn role<W: Write>(&self, command: RoleCommand, out: &mut W) -> anyhow::Result<Outcome> {
		let lookup = &self.rbac.lookup;
		match command {
			RoleCommand::Create { name } => {
				let role = lookup.create_role(&self.ctx, &name).await?;
				writeln!(out, "created role {} ({})", role.name, role.id)?;
			}
			RoleCommand::Delete { role } => {
				let role = lookup.delete(&self.ctx, &RoleRef::from_arg(&role)).await?;
				writeln!(out, "deleted role {} ({})", role.name, role.id)?;
			}
			RoleCommand::Rename { role, new_name } => {
				let role = lookup
					.rename(&self.ctx, &RoleRef::from_arg(&role), &new_name)
					.await?;
				writeln!(out, "renamed role {} to {}", role.id, role.name)?;
			}
			RoleCommand::List { json } => {
				let roles = lookup.list_roles(&self.ctx).await?;
				if json {
					write_json(out, &serde_json::to_value(&roles)?)?;
				} else {
					write_roles(out, &roles)?;
				}
			}
			RoleCommand::Show { role, json } => {
				let role: Role = lookup.resolve(&self.ctx, &RoleRef::from_arg(&role)).await?;
				let decisions = &self.rbac.decisions;
				let permissions = decisions.permissions_of_role(&self.ctx, &role).await?;
				let users = decisions.users_with_role(&self.ctx, &role).await?;

				if json {
					write_json(
						out,
						&serde_json::json!({
							"role": role,
							"permissions": permissions,
							"users": users,
						}),
					)?;
				} else {
					writeln!(out, "role {} ({}) guard {}", role.name, role.id, role.guard_name)?;
					writeln!(out, "permissions:")?;
					write_permissions(out, &permissions)?;
					writeln!(out, "users:")?;
					for user in users {
						writeln!(out, "{user}")?;
					}
				}
			}
		}
		Ok(Outcome::Done)
	}

	async fn permission<W: Write>(
		&self,
		command: PermissionCommand,
		out: &mut W,
	) -> anyhow::Result<Outcome> {
		let lookup = &self.rbac.lookup;
		match command {
			PermissionCommand::Create { name } => {
				let permission = lookup.create_permission(&self.ctx, &name).await?;
				writeln!(
					out,
					"created permission {} ({})",
					permission.name, permission.id
				)?;
			}
			PermissionCommand::Delete { permission } => {
				let permission: Permission = lookup
					.resolve(&self.ctx, &PermissionRef::from_arg(&permission))
					.await?;
				if self.authz.is_protected(&permission.name) {
					bail!("permission '{}' is protected and cannot be deleted", permission.name);
				}
				let permission = lookup
					.delete(&self.ctx, &PermissionRef::from(permission.id))
					.await?;
				writeln!(
					out,
					"deleted permission {} ({})",
					permission.name, permission.id
				)?;
			}
			PermissionCommand::Rename {
				permission,
				new_name,
			} => {
				let permission = lookup
					.rename(&self.ctx, &PermissionRef::from_arg(&permission), &new_name)
					.await?;
				writeln!(
					out,
					"renamed permission {} to {}",
					permission.id, permission.name
				)?;
			}
			PermissionCommand::List { json } => {
				let permissions = lookup.list_permissions(&self.ctx).await?;
				if json {
					write_json(out, &serde_json::to_value(&permissions)?)?;
				} else {
					write_permissions(out, &permissions)?;
				}
			}
		}
		Ok(Outcome::Done)
	}

	async fn holder(&self, args: &HolderArgs) -> anyhow::Result<Holder> {
		match (args.user, &args.role) {
			(Some(user), _) => Ok(Holder::User(UserId::new(user))),
			(None, Some(role)) => {
				let role: Role = self
					.rbac
					.lookup
					.resolve(&self.ctx, &RoleRef::from_arg(role))
					.await?;
				Ok(Holder::Role(role.id))
			}
			(None, None) => bail!("either --user or --role is required"),
		}
	}

	async fn grant<W: Write>(&self, command: GrantCommand, out: &mut W) -> anyhow::Result<Outcome> {
		let grants = &self.rbac.grants;
		match command {
			GrantCommand::Role { user, roles } => {
				let added = grants
					.assign_role(&self.ctx, &UserId::new(user), references::<Role>(&roles))
					.await?;
				writeln!(out, "assigned {added} role(s) to user {user}")?;
			}
			GrantCommand::Permission {
				holder,
				permissions,
			} => {
				let holder = self.holder(&holder).await?;
				let added = grants
					.give_permission_to(&self.ctx, &holder, references::<Permission>(&permissions))
					.await?;
				writeln!(out, "gave {added} permission(s) to {holder}")?;
			}
		}
		Ok(Outcome::Done)
	}

	async fn revoke<W: Write>(&self, command: RevokeCommand, out: &mut W) -> anyhow::Result<Outcome> {
		let grants = &self.rbac.grants;
		let removed = match command {
			RevokeCommand::Role { user, role } => {
				grants
					.remove_role(&self.ctx, &UserId::new(user), RoleRef::from_arg(&role))
					.await?
			}
			RevokeCommand::Permission { holder, permission } => {
				let holder = self.holder(&holder).await?;
				grants
					.revoke_permission_to(&self.ctx, &holder, PermissionRef::from_arg(&permission))
					.await?
			}
		};
		writeln!(out, "{}", if removed { "revoked" } else { "not held" })?;
		Ok(Outcome::Done)
	}

	async fn sync<W: Write>(&self, command: SyncCommand, out: &mut W) -> anyhow::Result<Outcome> {
		let grants = &self.rbac.grants;
		match command {
			SyncCommand::Roles { user, roles } => {
				let held = grants
					.sync_roles(&self.ctx, &UserId::new(user), references::<Role>(&roles))
					.await?;
				writeln!(out, "user {user} now holds {held} role(s)")?;
			}
			SyncCommand::Permissions {
				holder,
				permissions,
			} => {
				let holder = self.holder(&holder).await?;
				let held = grants
					.sync_permissions(&self.ctx, &holder, references::<Permission>(&permissions))
					.await?;
				writeln!(out, "{holder} now holds {held} direct permission(s)")?;
			}
		}
		Ok(Outcome::Done)
	}

	async fn check<W: Write>(&self, command: CheckCommand, out: &mut W) -> anyhow::Result<Outcome> {
		let decisions = &self.rbac.decisions;
		let allowed = match command {
			CheckCommand::Role { user, roles, all } => {
				let user = UserId::new(user);
				let roles = references::<Role>(&roles);
				if all {
					decisions.has_all_roles(&self.ctx, &user, roles).await?
				} else {
					decisions.has_any_role(&self.ctx, &user, roles).await?
				}
			}
			CheckCommand::Permission {
				user,
				permissions,
				all,
			} => {
				let user = UserId::new(user);
				let permissions = references::<Permission>(&permissions);
				if all {
					decisions
						.has_all_permissions(&self.ctx, &user, permissions)
						.await?
				} else {
					decisions
						.has_any_permission(&self.ctx, &user, permissions)
						.await?
				}
			}
		};
		writeln!(out, "{}", if allowed { "allowed" } else { "denied" })?;
		Ok(Outcome::decision(allowed))
	}

	async fn show<W: Write>(&self, user: UserId, json: bool, out: &mut W) -> anyhow::Result<Outcome> {
		let decisions = &self.rbac.decisions;
		let roles = decisions
			.get_roles(&self.ctx, &user)
			.await
			.with_context(|| format!("loading roles of user {user}"))?;
		let direct = decisions.get_direct_permissions(&self.ctx, &user).await?;
		let via_roles = decisions.get_permissions_via_roles(&self.ctx, &user).await?;
		let all = decisions.get_permission_names(&self.ctx, &user).await?;

		if json {
			write_json(
				out,
				&serde_json::json!({
					"user": user,
					"guard": self.ctx.guard(),
					"roles": roles,
					"direct_permissions": direct,
					"permissions_via_roles": via_roles,
					"permissions": all,
				}),
			)?;
			return Ok(Outcome::Done);
		}

		writeln!(out, "user {user} guard {}", self.ctx.guard())?;
		writeln!(out, "roles:")?;
		write_roles(out, &roles)?;
		writeln!(out, "direct permissions:")?;
		write_permissions(out, &direct)?;
		writeln!(out, "permissions via roles:")?;
		write_permissions(out, &via_roles)?;
		writeln!(out, "all permissions: {}", all.join(", "))?;
		Ok(Outcome::Done)
	}
}
