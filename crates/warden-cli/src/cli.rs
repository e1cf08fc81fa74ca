// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Command line surface.
//!
//! Role and permission arguments that parse as unsigned integers are ids,
//! anything else is a name.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Warden - role and permission administration.
#[derive(Parser, Debug)]
#[command(name = "warden", about = "Role and permission administration", version)]
pub struct Args {
	/// Config file to load instead of /etc/warden/warden.toml
	#[arg(long, global = true, env = "WARDEN_CONFIG")]
	pub config: Option<PathBuf>,

	/// Guard to operate in (defaults to authz.default_guard)
	#[arg(long, global = true)]
	pub guard: Option<String>,

	#[command(subcommand)]
	pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
	/// Create or update the database schema
	Migrate,
	/// Manage roles
	Role {
		#[command(subcommand)]
		command: RoleCommand,
	},
	/// Manage permissions
	Permission {
		#[command(subcommand)]
		command: PermissionCommand,
	},
	/// Grant roles or permissions
	Grant {
		#[command(subcommand)]
		command: GrantCommand,
	},
	/// Revoke a role or permission
	Revoke {
		#[command(subcommand)]
		command: RevokeCommand,
	},
	/// Replace a role or permission set
	Sync {
		#[command(subcommand)]
		command: SyncCommand,
	},
	/// Check a principal's roles or permissions (exit status 1 when denied)
	Check {
		#[command(subcommand)]
		command: CheckCommand,
	},
	/// Show everything a principal holds
	Show {
		/// Principal id
		user: u64,
		/// Output as JSON
		#[arg(long)]
		json: bool,
	},
}

#[derive(Subcommand, Debug)]
pub enum RoleCommand {
	/// Create a new role
	Create { name: String },
	/// Delete a role and all of its grants
	Delete { role: String },
	/// Rename a role
	Rename { role: String, new_name: String },
	/// List roles in the guard
	List {
		#[arg(long)]
		json: bool,
	},
	/// Show a role with its permissions and principals
	Show {
		role: String,
		#[arg(long)]
		json: bool,
	},
}

#[derive(Subcommand, Debug)]
pub enum PermissionCommand {
	/// Create a new permission
	Create { name: String },
	/// Delete a permission and all of its grants
	Delete { permission: String },
	/// Rename a permission
	Rename { permission: String, new_name: String },
	/// List permissions in the guard
	List {
		#[arg(long)]
		json: bool,
	},
}

/// The owner of a direct permission set.
#[derive(clap::Args, Debug, Clone)]
#[group(required = true, multiple = false)]
pub struct HolderArgs {
	/// Principal id
	#[arg(long)]
	pub user: Option<u64>,
	/// Role id or name
	#[arg(long)]
	pub role: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum GrantCommand {
	/// Assign roles to a principal
	Role {
		user: u64,
		#[arg(required = true)]
		roles: Vec<String>,
	},
	/// Give permissions to a principal or role
	Permission {
		#[command(flatten)]
		holder: HolderArgs,
		#[arg(required = true)]
		permissions: Vec<String>,
	},
}

#[derive(Subcommand, Debug)]
pub enum RevokeCommand {
	/// Remove a role from a principal
	Role { user: u64, role: String },
	/// Revoke a permission from a principal or role
	Permission {
		#[command(flatten)]
		holder: HolderArgs,
		permission: String,
	},
}

#[derive(Subcommand, Debug)]
pub enum SyncCommand {
	/// Replace a principal's roles; no roles clears them
	Roles { user: u64, roles: Vec<String> },
	/// Replace the direct permissions of a principal or role
	Permissions {
		#[command(flatten)]
		holder: HolderArgs,
		permissions: Vec<String>,
	},
}

#[derive(Subcommand, Debug)]
pub enum CheckCommand {
	/// Whether the principal holds any (or, with --all, every) role
	Role {
		user: u64,
		#[arg(required = true)]
		roles: Vec<String>,
		#[arg(long)]
		all: bool,
	},
	/// Whether the principal holds any (or, with --all, every) permission
	Permission {
		user: u64,
		#[arg(required = true)]
		permissions: Vec<String>,
		#[arg(long)]
		all: bool,
	},
}
