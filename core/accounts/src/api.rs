//! Permission-gated account API.
//!
//! Every call first turns the session into a [`CallerContext`] and then
//! delegates to the [`AccountManager`]. Owner fields in request payloads are
//! never trusted.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;

use credkeep_common::{AccountId, CallerContext, Error, Result, Secret, UserId};

use crate::manager::{AccountManager, AccountView};
use crate::record::{AccountInfo, InfoUpdate};

/// Permission an API call requires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Permission {
    /// Granted to every authenticated session.
    All,
    /// Manage accounts.
    Accounts,
}

/// Role of an authenticated user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    Admin,
    User,
}

/// Authenticated caller, as produced by the transport layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    user: UserId,
    role: Role,
    permissions: HashSet<Permission>,
}

impl Session {
    /// Create a session with no extra permissions.
    pub fn new(user: UserId, role: Role) -> Self {
        Self {
            user,
            role,
            permissions: HashSet::new(),
        }
    }

    /// Administrator session.
    pub fn admin(user: UserId) -> Self {
        Self::new(user, Role::Admin)
    }

    /// Regular user session allowed to manage accounts.
    pub fn user(user: UserId) -> Self {
        Self::new(user, Role::User).with_permission(Permission::Accounts)
    }

    /// Grant a permission.
    pub fn with_permission(mut self, permission: Permission) -> Self {
        self.permissions.insert(permission);
        self
    }

    /// Get the authenticated user.
    pub fn user_id(&self) -> &UserId {
        &self.user
    }

    /// Get the user's role.
    pub fn role(&self) -> Role {
        self.role
    }

    /// Check if the session holds `permission`, ignoring the role.
    pub fn has(&self, permission: Permission) -> bool {
        permission == Permission::All || self.permissions.contains(&permission)
    }
}

/// Check `session` against `required` and derive the caller context.
///
/// # Errors
/// - `Forbidden` if a non-admin session lacks the permission
pub fn authorize(session: &Session, required: Permission) -> Result<CallerContext> {
    let administrative = session.role == Role::Admin;
    if !administrative && !session.has(required) {
        return Err(Error::Forbidden(format!(
            "User {} lacks permission {:?}",
            session.user, required
        )));
    }
    Ok(CallerContext::new(session.user.clone(), administrative))
}

/// Account operations exposed to remote callers.
#[derive(Clone)]
pub struct AccountApi {
    manager: Arc<AccountManager>,
}

impl AccountApi {
    pub fn new(manager: Arc<AccountManager>) -> Self {
        Self { manager }
    }

    /// Registered backend type names.
    pub async fn get_account_types(&self, session: &Session) -> Result<Vec<String>> {
        authorize(session, Permission::All)?;
        Ok(self.manager.list_available_backend_types().await)
    }

    /// Accounts visible to the session.
    pub async fn get_accounts(&self, session: &Session) -> Result<Vec<AccountInfo>> {
        let ctx = authorize(session, Permission::Accounts)?;
        self.manager.get_all_accounts(&ctx).await
    }

    /// One account, or `None` if it does not exist or is not visible.
    pub async fn get_account_info(
        &self,
        session: &Session,
        id: &AccountId,
        backend_type: &str,
        refresh: bool,
    ) -> Result<Option<AccountView>> {
        let ctx = authorize(session, Permission::Accounts)?;
        self.manager.get_account(id, backend_type, &ctx, refresh).await
    }

    /// Create an account owned by the session user.
    pub async fn create_account(
        &self,
        session: &Session,
        backend_type: &str,
        login_name: &str,
        secret: Secret,
    ) -> Result<AccountInfo> {
        let ctx = authorize(session, Permission::Accounts)?;
        self.manager
            .create_account(backend_type, login_name, secret, &ctx)
            .await
    }

    /// Change login and/or secret. An empty secret keeps the current one.
    pub async fn update_account(
        &self,
        session: &Session,
        id: &AccountId,
        backend_type: &str,
        login_name: Option<&str>,
        secret: Secret,
    ) -> Result<AccountInfo> {
        let ctx = authorize(session, Permission::Accounts)?;
        let secret = (!secret.is_empty()).then_some(secret);
        self.manager
            .update_account(id, backend_type, login_name, secret, &ctx)
            .await
    }

    /// Apply activation, sharing and config from an info payload.
    ///
    /// The payload's owner, login and status fields are ignored. An empty
    /// config leaves the stored config unchanged.
    pub async fn update_account_info(
        &self,
        session: &Session,
        info: &AccountInfo,
    ) -> Result<AccountInfo> {
        let ctx = authorize(session, Permission::Accounts)?;
        let update = InfoUpdate {
            activated: Some(info.activated),
            shared: Some(info.shared),
            config: (!info.config.is_empty()).then(|| info.config.clone()),
        };
        self.manager
            .update_account_info(&info.id, &info.backend_type, update, &ctx)
            .await
    }

    /// Remove an account.
    pub async fn remove_account(
        &self,
        session: &Session,
        id: &AccountId,
        backend_type: &str,
    ) -> Result<()> {
        let ctx = authorize(session, Permission::Accounts)?;
        self.manager.remove_account(id, backend_type, &ctx).await
    }
}
