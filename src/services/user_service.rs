use std::sync::Arc;
use uuid::Uuid;

use crate::database::MarketplaceStore;
use crate::dto::auth_dto::UserResponse;
use crate::error::Result;
use crate::models::user::Role;
use crate::services::authorization::{self, located, Actor};

/// Account administration. Accounts are never removed, only disabled.
#[derive(Clone)]
pub struct UserService {
    store: Arc<dyn MarketplaceStore>,
}

impl UserService {
    pub fn new(store: Arc<dyn MarketplaceStore>) -> Self {
        Self { store }
    }

    pub async fn list(&self, actor: &Actor, role: Option<Role>) -> Result<Vec<UserResponse>> {
        authorization::can_administer(actor)?;
        let users = self.store.list_users(role).await?;
        Ok(users.into_iter().map(UserResponse::from).collect())
    }

    pub async fn toggle_status(&self, actor: &Actor, user_id: Uuid) -> Result<UserResponse> {
        authorization::can_administer(actor)?;
        authorization::self_delete_guard(actor, user_id)?;
        let user = located(self.store.find_user(user_id).await?, "User not found")?;
        let updated = located(
            self.store.set_user_active(user.id, !user.is_active).await?,
            "User not found",
        )?;
        tracing::info!(admin = %actor.id, user_id = %updated.id, active = updated.is_active, "user status toggled");
        Ok(UserResponse::from(updated))
    }

    pub async fn deactivate(&self, actor: &Actor, user_id: Uuid) -> Result<UserResponse> {
        authorization::can_administer(actor)?;
        authorization::self_delete_guard(actor, user_id)?;
        let updated = located(
            self.store.set_user_active(user_id, false).await?,
            "User not found",
        )?;
        tracing::info!(admin = %actor.id, user_id = %updated.id, "user deactivated");
        Ok(UserResponse::from(updated))
    }
}
