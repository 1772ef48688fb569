use serde::Serialize;
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use uuid::Uuid;

/// An event delivered to every open session of a user.
#[derive(Debug, Clone, Serialize)]
pub struct PushEvent {
    pub event: String,
    pub payload: JsonValue,
}

impl PushEvent {
    pub fn new(event: impl Into<String>, payload: JsonValue) -> Self {
        Self {
            event: event.into(),
            payload,
        }
    }
}

type Sessions = HashMap<Uuid, HashMap<Uuid, UnboundedSender<PushEvent>>>;

/// Registry of the users that currently have a live connection.
///
/// A user may hold several sessions (tabs, devices). Sessions are registered
/// by [`PresenceService::connect`] and removed when the returned
/// [`PresenceSession`] is dropped.
#[derive(Clone, Default)]
pub struct PresenceService {
    sessions: Arc<RwLock<Sessions>>,
}

impl PresenceService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connect(&self, user_id: Uuid) -> PresenceSession {
        let (sender, receiver) = mpsc::unbounded_channel();
        let session_id = Uuid::new_v4();
        self.sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(user_id)
            .or_default()
            .insert(session_id, sender);
        tracing::debug!(%user_id, %session_id, "presence session opened");

        PresenceSession {
            user_id,
            session_id,
            receiver,
            presence: self.clone(),
        }
    }

    pub fn disconnect(&self, user_id: Uuid, session_id: Uuid) -> bool {
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        let Some(user_sessions) = sessions.get_mut(&user_id) else {
            return false;
        };
        let removed = user_sessions.remove(&session_id).is_some();
        if user_sessions.is_empty() {
            sessions.remove(&user_id);
        }
        if removed {
            tracing::debug!(%user_id, %session_id, "presence session closed");
        }
        removed
    }

    pub fn is_online(&self, user_id: Uuid) -> bool {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&user_id)
    }

    pub fn online_users(&self) -> Vec<Uuid> {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .copied()
            .collect()
    }

    /// Sends `event` to every open session of `user_id` and returns how many
    /// sessions received it.
    pub fn push(&self, user_id: Uuid, event: PushEvent) -> usize {
        let sessions = self.sessions.read().unwrap_or_else(PoisonError::into_inner);
        let Some(user_sessions) = sessions.get(&user_id) else {
            return 0;
        };
        user_sessions
            .values()
            .filter(|sender| sender.send(event.clone()).is_ok())
            .count()
    }
}

/// A live connection. Unregisters itself on drop.
pub struct PresenceSession {
    pub user_id: Uuid,
    pub session_id: Uuid,
    receiver: UnboundedReceiver<PushEvent>,
    presence: PresenceService,
}

impl PresenceSession {
    pub async fn recv(&mut self) -> Option<PushEvent> {
        self.receiver.recv().await
    }
}

impl Drop for PresenceSession {
    fn drop(&mut self) {
        self.presence.disconnect(self.user_id, self.session_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn push_reaches_every_session_of_a_user() {
        let presence = PresenceService::new();
        let user = Uuid::new_v4();
        let mut first = presence.connect(user);
        let mut second = presence.connect(user);

        let delivered = presence.push(user, PushEvent::new("ping", json!({ "n": 1 })));
        assert_eq!(delivered, 2);
        assert_eq!(first.recv().await.unwrap().event, "ping");
        assert_eq!(second.recv().await.unwrap().payload, json!({ "n": 1 }));
    }

    #[test]
    fn dropping_the_last_session_takes_the_user_offline() {
        let presence = PresenceService::new();
        let user = Uuid::new_v4();
        let first = presence.connect(user);
        let second = presence.connect(user);
        assert!(presence.is_online(user));
        assert_eq!(presence.online_users(), vec![user]);

        drop(first);
        assert!(presence.is_online(user));
        drop(second);
        assert!(!presence.is_online(user));
        assert_eq!(presence.push(user, PushEvent::new("ping", json!(null))), 0);
    }

    #[test]
    fn explicit_disconnect_is_idempotent() {
        let presence = PresenceService::new();
        let user = Uuid::new_v4();
        let session = presence.connect(user);
        assert!(presence.disconnect(user, session.session_id));
        assert!(!presence.disconnect(user, session.session_id));
        drop(session);
        assert!(!presence.is_online(user));
    }
}
