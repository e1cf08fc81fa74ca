// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Holder traits attaching role and permission sets to arbitrary types.
//!
//! The engine never sees a concrete user type. Anything that can name the
//! principal it stands for implements [`RoleHolder`]; anything that owns a
//! direct permission set (a principal or a role) implements [`PermissionHolder`].

use std::fmt;

use crate::types::{Role, RoleId, UserId};

/// The owner of a permission association set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Holder {
	User(UserId),
	Role(RoleId),
}

impl fmt::Display for Holder {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Holder::User(id) => write!(f, "user:{id}"),
			Holder::Role(id) => write!(f, "role:{id}"),
		}
	}
}

/// Something that holds roles: always a principal.
pub trait RoleHolder {
	fn principal_id(&self) -> UserId;
}

/// Something that holds permissions directly: a principal or a role.
pub trait PermissionHolder {
	fn permission_holder(&self) -> Holder;
}

impl RoleHolder for UserId {
	fn principal_id(&self) -> UserId {
		*self
	}
}

impl PermissionHolder for UserId {
	fn permission_holder(&self) -> Holder {
		Holder::User(*self)
	}
}

impl PermissionHolder for RoleId {
	fn permission_holder(&self) -> Holder {
		Holder::Role(*self)
	}
}

impl PermissionHolder for Role {
	fn permission_holder(&self) -> Holder {
		Holder::Role(self.id)
	}
}

impl PermissionHolder for Holder {
	fn permission_holder(&self) -> Holder {
		*self
	}
}
