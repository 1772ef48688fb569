use serde::Deserialize;

use crate::models::user::Role;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserListQuery {
    pub role: Option<Role>,
}
