use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use validator::Validate;

use crate::{
    dto::{
        auth_dto::{AuthResponse, LoginPayload, RegisterPayload, UserResponse},
        envelope::ApiResponse,
    },
    error::Result,
    routes::extract::AppJson,
    services::authorization::Actor,
    AppState,
};

#[utoipa::path(
    post,
    path = "/api/auth/register",
    request_body = RegisterPayload,
    responses(
        (status = 201, description = "Account created", body = Json<AuthResponse>),
        (status = 400, description = "Invalid payload or email already registered")
    )
)]
#[axum::debug_handler]
pub async fn register(
    State(state): State<AppState>,
    AppJson(payload): AppJson<RegisterPayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let session = state.auth_service.register(payload).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::with_message("Registration successful", session)),
    ))
}

#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginPayload,
    responses(
        (status = 200, description = "Logged in", body = Json<AuthResponse>),
        (status = 401, description = "Invalid credentials or deactivated account")
    )
)]
#[axum::debug_handler]
pub async fn login(
    State(state): State<AppState>,
    AppJson(payload): AppJson<LoginPayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let session = state.auth_service.login(payload).await?;
    Ok(Json(ApiResponse::with_message("Login successful", session)))
}

#[utoipa::path(
    get,
    path = "/api/auth/me",
    responses(
        (status = 200, description = "Current user", body = Json<UserResponse>),
        (status = 401, description = "Missing or invalid token")
    )
)]
#[axum::debug_handler]
pub async fn me(State(state): State<AppState>, actor: Actor) -> Result<impl IntoResponse> {
    let user = state.auth_service.me(&actor).await?;
    Ok(Json(ApiResponse::ok(user)))
}
