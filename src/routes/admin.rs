use axum::{
    extract::State,
    response::{IntoResponse, Json},
};
use uuid::Uuid;

use crate::{
    dto::{admin_dto::UserListQuery, envelope::ApiResponse},
    error::Result,
    routes::extract::{AppPath, AppQuery},
    services::authorization::Actor,
    AppState,
};

#[axum::debug_handler]
pub async fn list_users(
    State(state): State<AppState>,
    actor: Actor,
    AppQuery(query): AppQuery<UserListQuery>,
) -> Result<impl IntoResponse> {
    let users = state.user_service.list(&actor, query.role).await?;
    Ok(Json(ApiResponse::ok(users)))
}

#[axum::debug_handler]
pub async fn toggle_user_status(
    State(state): State<AppState>,
    actor: Actor,
    AppPath(id): AppPath<Uuid>,
) -> Result<impl IntoResponse> {
    let user = state.user_service.toggle_status(&actor, id).await?;
    let message = if user.is_active {
        "User activated"
    } else {
        "User deactivated"
    };
    Ok(Json(ApiResponse::with_message(message, user)))
}

#[axum::debug_handler]
pub async fn delete_user(
    State(state): State<AppState>,
    actor: Actor,
    AppPath(id): AppPath<Uuid>,
) -> Result<impl IntoResponse> {
    let user = state.user_service.deactivate(&actor, id).await?;
    Ok(Json(ApiResponse::with_message("User deactivated", user)))
}
