//! API-side authorization guard.
//!
//! Wallet routes act on the caller's own account and need only a valid
//! token. Admin routes need permissions in the `admin.*` namespace.

use walletd_auth::{AuthzError, Permission, Principal, Role, authorize};

use crate::context::PrincipalContext;

pub const ADMIN_READ: Permission = Permission::from_static("admin.read");
pub const ADMIN_WRITE: Permission = Permission::from_static("admin.write");

pub fn authorize_principal(
    principal: &PrincipalContext,
    required: &Permission,
) -> Result<(), AuthzError> {
    let principal = Principal {
        account_id: principal.account_id(),
        roles: principal.roles().to_vec(),
        permissions: permissions_from_roles(principal.roles()),
    };
    authorize(&principal, required)
}

/// Static role to permission mapping.
fn permissions_from_roles(roles: &[Role]) -> Vec<Permission> {
    // Convention: "admin" grants all permissions.
    if roles.iter().any(Role::is_admin) {
        return vec![Permission::new("*")];
    }

    Vec::new()
}
