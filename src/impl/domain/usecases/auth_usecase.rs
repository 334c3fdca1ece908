use std::sync::Arc;

use async_trait::async_trait;
use fractic_server_error::ServerError;

use crate::{
    data::repositories::store_repository_impl::StoreRepositoryImpl,
    domain::{
        logic::{
            access::ensure_can,
            password::{hash_password, is_acceptable_password, verify_password},
            validators::validate_username,
        },
        repositories::store_repository::StoreRepository,
    },
    entities::{Permission, Role, RoleId, User, ADMIN_ROLE},
    errors::{DuplicateEntity, EntityNotFound, InvalidCredentials, InvalidInput},
};

/// Users, roles and credentials.
///
/// `create_user`, `reset_password` and `ensure_admin_role` act with the
/// operator's authority and are meant for the command line; the other
/// operations check the actor's permissions.
#[async_trait]
pub trait AuthUsecase: Send + Sync {
    async fn login(&self, username: &str, password: &str) -> Result<User, ServerError>;

    async fn create_user(
        &self,
        username: &str,
        email: Option<&str>,
        password: &str,
        roles: &[&str],
    ) -> Result<User, ServerError>;
    async fn reset_password(&self, username: &str, password: &str) -> Result<(), ServerError>;
    /// Creates the `Admin` role if missing, granting every permission.
    async fn ensure_admin_role(&self) -> Result<Role, ServerError>;

    async fn list_users(&self, actor: &User) -> Result<Vec<User>, ServerError>;
    async fn register_user(
        &self,
        actor: &User,
        username: &str,
        email: Option<&str>,
        password: &str,
        roles: &[&str],
    ) -> Result<User, ServerError>;
    async fn assign_roles(
        &self,
        actor: &User,
        username: &str,
        roles: &[&str],
    ) -> Result<User, ServerError>;
    async fn list_roles(&self, actor: &User) -> Result<Vec<Role>, ServerError>;
    async fn create_role(
        &self,
        actor: &User,
        name: &str,
        permissions: &[Permission],
    ) -> Result<Role, ServerError>;
}

pub(crate) struct AuthUsecaseImpl<
    R1 = StoreRepositoryImpl, // Default.
> where
    R1: StoreRepository,
{
    store_repository: Arc<R1>,
}

impl<R1: StoreRepository> AuthUsecaseImpl<R1> {
    pub(crate) fn new(store_repository: Arc<R1>) -> Self {
        Self { store_repository }
    }

    fn user(&self, username: &str) -> Result<User, ServerError> {
        self.store_repository
            .user_by_username(username)?
            .ok_or_else(|| EntityNotFound::new("User", username))
    }

    fn role_ids(&self, names: &[&str]) -> Result<Vec<RoleId>, ServerError> {
        names
            .iter()
            .map(|name| {
                self.store_repository
                    .role_by_name(name)?
                    .map(|r| r.id)
                    .ok_or_else(|| EntityNotFound::new("Role", name))
            })
            .collect()
    }

    fn checked_password(password: &str) -> Result<(), ServerError> {
        if is_acceptable_password(password) {
            Ok(())
        } else {
            Err(InvalidInput::new("password", "is too short"))
        }
    }
}

#[async_trait]
impl<R1: StoreRepository> AuthUsecase for AuthUsecaseImpl<R1> {
    async fn login(&self, username: &str, password: &str) -> Result<User, ServerError> {
        let user = self.store_repository.user_by_username(username)?;
        match user {
            Some(user)
                if user
                    .password_hash
                    .as_deref()
                    .is_some_and(|hash| verify_password(password, hash)) =>
            {
                tracing::info!(user = %user.username, "login succeeded");
                Ok(user)
            }
            _ => {
                tracing::warn!(user = %username, "login failed");
                Err(InvalidCredentials::new())
            }
        }
    }

    async fn create_user(
        &self,
        username: &str,
        email: Option<&str>,
        password: &str,
        roles: &[&str],
    ) -> Result<User, ServerError> {
        let username = username.trim();
        validate_username(username)?;
        Self::checked_password(password)?;
        let email = email.map(str::trim).filter(|e| !e.is_empty());
        if self.store_repository.user_by_username(username)?.is_some() {
            return Err(DuplicateEntity::new("User", username));
        }
        let role_ids = self.role_ids(roles)?;
        let user = self
            .store_repository
            .insert_user(username, email, &hash_password(password)?)?;
        if !role_ids.is_empty() {
            self.store_repository.set_user_roles(user.id, &role_ids)?;
        }
        tracing::info!(user = %username, roles = ?roles, "user created");
        self.user(username)
    }

    async fn reset_password(&self, username: &str, password: &str) -> Result<(), ServerError> {
        Self::checked_password(password)?;
        let user = self.user(username)?;
        self.store_repository
            .update_password(user.id, &hash_password(password)?)?;
        tracing::info!(user = %username, "password reset");
        Ok(())
    }

    async fn ensure_admin_role(&self) -> Result<Role, ServerError> {
        if let Some(role) = self.store_repository.role_by_name(ADMIN_ROLE)? {
            return Ok(role);
        }
        let role = self
            .store_repository
            .upsert_role(ADMIN_ROLE, &Permission::ALL)?;
        tracing::info!(role = ADMIN_ROLE, "role created");
        Ok(role)
    }

    async fn list_users(&self, actor: &User) -> Result<Vec<User>, ServerError> {
        ensure_can(actor, Permission::ManageUsers)?;
        self.store_repository.list_users()
    }

    async fn register_user(
        &self,
        actor: &User,
        username: &str,
        email: Option<&str>,
        password: &str,
        roles: &[&str],
    ) -> Result<User, ServerError> {
        ensure_can(actor, Permission::ManageUsers)?;
        self.create_user(username, email, password, roles).await
    }

    async fn assign_roles(
        &self,
        actor: &User,
        username: &str,
        roles: &[&str],
    ) -> Result<User, ServerError> {
        ensure_can(actor, Permission::ManageUsers)?;
        let user = self.user(username)?;
        let role_ids = self.role_ids(roles)?;
        self.store_repository.set_user_roles(user.id, &role_ids)?;
        tracing::info!(user = %username, roles = ?roles, by = %actor.username, "roles assigned");
        self.user(username)
    }

    async fn list_roles(&self, actor: &User) -> Result<Vec<Role>, ServerError> {
        ensure_can(actor, Permission::ManageRoles)?;
        self.store_repository.list_roles()
    }

    async fn create_role(
        &self,
        actor: &User,
        name: &str,
        permissions: &[Permission],
    ) -> Result<Role, ServerError> {
        ensure_can(actor, Permission::ManageRoles)?;
        let name = name.trim();
        if name.is_empty() {
            return Err(InvalidInput::new("role name", "must not be empty"));
        }
        if self.store_repository.role_by_name(name)?.is_some() {
            return Err(DuplicateEntity::new("Role", name));
        }
        let role = self.store_repository.upsert_role(name, permissions)?;
        tracing::info!(role = %name, by = %actor.username, "role created");
        Ok(role)
    }
}
