use fractic_server_error::ServerError;

use crate::{
    entities::{Permission, User},
    errors::PermissionDenied,
};

pub(crate) fn ensure_can(actor: &User, permission: Permission) -> Result<(), ServerError> {
    if actor.can(permission) {
        Ok(())
    } else {
        Err(PermissionDenied::new(&actor.username, permission.as_str()))
    }
}

/// Report corrections are reserved to the Admin role itself.
pub(crate) fn ensure_admin(actor: &User) -> Result<(), ServerError> {
    if actor.is_admin() {
        Ok(())
    } else {
        Err(PermissionDenied::new(&actor.username, "admin"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{Role, RoleId, UserId, ADMIN_ROLE};

    fn user(role: &str, permissions: Vec<Permission>) -> User {
        User {
            id: UserId(1),
            username: "cashier".into(),
            email: None,
            password_hash: None,
            roles: vec![Role {
                id: RoleId(1),
                name: role.into(),
                permissions,
            }],
        }
    }

    #[test]
    fn role_permissions_are_enforced() {
        let cashier = user("Cashier", vec![Permission::OperatePos]);
        assert!(ensure_can(&cashier, Permission::OperatePos).is_ok());
        assert!(ensure_can(&cashier, Permission::ViewReports).is_err());
    }

    #[test]
    fn admin_role_implies_everything() {
        let admin = user(ADMIN_ROLE, vec![]);
        for permission in Permission::ALL {
            assert!(ensure_can(&admin, permission).is_ok());
        }
        assert!(ensure_admin(&admin).is_ok());
        assert!(ensure_admin(&user("Manager", Permission::ALL.to_vec())).is_err());
    }
}
