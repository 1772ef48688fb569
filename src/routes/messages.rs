use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde_json::json;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::{
        envelope::ApiResponse,
        message_dto::{SendMessagePayload, UnreadCount},
    },
    error::Result,
    models::message::Message,
    routes::extract::{AppJson, AppPath},
    services::authorization::Actor,
    AppState,
};

#[utoipa::path(
    post,
    path = "/api/messages",
    request_body = SendMessagePayload,
    responses(
        (status = 201, description = "Message sent", body = Json<Message>),
        (status = 400, description = "Receiver is not a participant of the job"),
        (status = 403, description = "Not a participant of the job")
    )
)]
#[axum::debug_handler]
pub async fn send_message(
    State(state): State<AppState>,
    actor: Actor,
    AppJson(payload): AppJson<SendMessagePayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let message = state.message_service.send(&actor, payload).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::with_message("Message sent", message)),
    ))
}

#[axum::debug_handler]
pub async fn job_messages(
    State(state): State<AppState>,
    actor: Actor,
    AppPath(job_id): AppPath<Uuid>,
) -> Result<impl IntoResponse> {
    let messages = state.message_service.job_messages(&actor, job_id).await?;
    Ok(Json(ApiResponse::ok(messages)))
}

#[axum::debug_handler]
pub async fn mark_job_read(
    State(state): State<AppState>,
    actor: Actor,
    AppPath(job_id): AppPath<Uuid>,
) -> Result<impl IntoResponse> {
    let updated = state.message_service.mark_read(&actor, job_id).await?;
    Ok(Json(ApiResponse::ok(json!({ "updated": updated }))))
}

#[axum::debug_handler]
pub async fn unread_count(
    State(state): State<AppState>,
    actor: Actor,
) -> Result<impl IntoResponse> {
    let unread = state.message_service.unread_count(&actor).await?;
    Ok(Json(ApiResponse::ok(UnreadCount { unread })))
}

#[axum::debug_handler]
pub async fn conversations(
    State(state): State<AppState>,
    actor: Actor,
) -> Result<impl IntoResponse> {
    let conversations = state.message_service.conversations(&actor).await?;
    Ok(Json(ApiResponse::ok(conversations)))
}
