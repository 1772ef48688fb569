use std::convert::Infallible;

use axum::{
    extract::State,
    http::HeaderMap,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Json,
    },
};
use futures::stream::{self, Stream, StreamExt};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::{
    dto::{envelope::ApiResponse, notification_dto::NotificationQuery},
    error::Result,
    middleware::auth::bearer_token,
    routes::extract::{AppPath, AppQuery},
    services::{authorization::Actor, presence_service::PushEvent},
    AppState,
};

#[axum::debug_handler]
pub async fn list_notifications(
    State(state): State<AppState>,
    actor: Actor,
    AppQuery(query): AppQuery<NotificationQuery>,
) -> Result<impl IntoResponse> {
    let notifications = state
        .notification_service
        .list(&actor, query.unread_only)
        .await?;
    Ok(Json(ApiResponse::ok(notifications)))
}

#[axum::debug_handler]
pub async fn mark_notification_read(
    State(state): State<AppState>,
    actor: Actor,
    AppPath(id): AppPath<Uuid>,
) -> Result<impl IntoResponse> {
    let notification = state.notification_service.mark_read(&actor, id).await?;
    Ok(Json(ApiResponse::ok(notification)))
}

#[axum::debug_handler]
pub async fn online_users(
    State(state): State<AppState>,
    _actor: Actor,
) -> Result<impl IntoResponse> {
    Ok(Json(ApiResponse::ok(state.presence.online_users())))
}

#[derive(Debug, Default, Deserialize)]
pub struct EventStreamQuery {
    /// Browsers cannot attach headers to an `EventSource`.
    pub token: Option<String>,
}

fn to_sse(event: &PushEvent) -> Event {
    Event::default()
        .event(event.event.clone())
        .data(event.payload.to_string())
}

/// Live feed of notifications and chat messages for the caller. The presence
/// session lives as long as the response stream and unregisters on drop.
#[axum::debug_handler]
pub async fn event_stream(
    State(state): State<AppState>,
    headers: HeaderMap,
    AppQuery(query): AppQuery<EventStreamQuery>,
) -> Result<Sse<impl Stream<Item = std::result::Result<Event, Infallible>>>> {
    let token = match query.token.as_deref() {
        Some(token) if !token.trim().is_empty() => token.trim().to_string(),
        _ => bearer_token(&headers)?.to_string(),
    };
    let actor = state.auth_service.authenticate(&token).await?;
    let session = state.presence.connect(actor.id);
    tracing::debug!(user_id = %actor.id, session_id = %session.session_id, "event stream opened");

    let hello = PushEvent::new(
        "connected",
        json!({ "user_id": actor.id, "session_id": session.session_id }),
    );
    let greeting = stream::once(async move { Ok::<_, Infallible>(to_sse(&hello)) });
    let events = stream::unfold(session, |mut session| async move {
        let event = session.recv().await?;
        Some((Ok::<_, Infallible>(to_sse(&event)), session))
    });
    Ok(Sse::new(greeting.chain(events)).keep_alive(KeepAlive::default()))
}
