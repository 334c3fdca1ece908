use fractic_server_error::ServerError;

use crate::errors::UnknownValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UserId(pub(crate) i64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RoleId(pub(crate) i64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Permission {
    ManageUsers,
    ManageRoles,
    ManageLocations,
    ViewReports,
    OperatePos,
    SystemSettings,
}

pub const ADMIN_ROLE: &str = "Admin";

#[derive(Debug, Clone, PartialEq)]
pub struct Role {
    pub id: RoleId,
    pub name: String,
    pub permissions: Vec<Permission>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub email: Option<String>,
    pub(crate) password_hash: Option<String>,
    pub roles: Vec<Role>,
}

// --

impl Permission {
    pub const ALL: [Permission; 6] = [
        Permission::ManageUsers,
        Permission::ManageRoles,
        Permission::ManageLocations,
        Permission::ViewReports,
        Permission::OperatePos,
        Permission::SystemSettings,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::ManageUsers => "manage_users",
            Permission::ManageRoles => "manage_roles",
            Permission::ManageLocations => "manage_locations",
            Permission::ViewReports => "view_reports",
            Permission::OperatePos => "operate_pos",
            Permission::SystemSettings => "system_settings",
        }
    }
}

impl std::str::FromStr for Permission {
    type Err = ServerError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Permission::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| UnknownValue::new("permission", s))
    }
}

impl std::fmt::Display for Permission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl RoleId {
    pub fn value(&self) -> i64 {
        self.0
    }
}

impl UserId {
    pub fn value(&self) -> i64 {
        self.0
    }
}

impl User {
    pub fn has_role(&self, role_name: &str) -> bool {
        self.roles.iter().any(|r| r.name == role_name)
    }

    pub fn is_admin(&self) -> bool {
        self.has_role(ADMIN_ROLE)
    }

    /// Admins hold every permission; other users hold the union of their
    /// roles' permissions.
    pub fn can(&self, permission: Permission) -> bool {
        self.is_admin()
            || self
                .roles
                .iter()
                .any(|r| r.permissions.contains(&permission))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permissions_parse_by_key() {
        for permission in Permission::ALL {
            assert_eq!(permission.as_str().parse::<Permission>().unwrap(), permission);
        }
        assert!("ViewReports".parse::<Permission>().is_err());
    }
}
