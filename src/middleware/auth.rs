use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};

use crate::error::{Error, Result};
use crate::services::authorization::Actor;
use crate::utils::crypto::secrets_match;
use crate::AppState;

pub const WEBHOOK_SECRET_HEADER: &str = "x-webhook-secret";

pub fn bearer_token(headers: &HeaderMap) -> Result<&str> {
    let value = headers
        .get(AUTHORIZATION)
        .ok_or_else(|| Error::Unauthorized("Missing authorization header".to_string()))?;
    let value = value
        .to_str()
        .map_err(|_| Error::Unauthorized("Malformed authorization header".to_string()))?;
    value
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| Error::Unauthorized("Unsupported authorization scheme".to_string()))
}

#[axum::async_trait]
impl FromRequestParts<AppState> for Actor {
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        let token = bearer_token(&parts.headers)?;
        state.auth_service.authenticate(token).await
    }
}

/// Who is calling the payment confirmation endpoint: a signed-in user or the
/// payment gateway presenting the shared webhook secret.
#[derive(Debug, Clone, Copy)]
pub enum PaymentCaller {
    User(Actor),
    Gateway,
}

#[axum::async_trait]
impl FromRequestParts<AppState> for PaymentCaller {
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        if let Some(provided) = parts.headers.get(WEBHOOK_SECRET_HEADER) {
            let provided = provided
                .to_str()
                .map_err(|_| Error::Unauthorized("Malformed webhook secret".to_string()))?;
            if secrets_match(provided, &state.config.webhook_secret) {
                return Ok(PaymentCaller::Gateway);
            }
            return Err(Error::Unauthorized("Invalid webhook secret".to_string()));
        }
        let actor = Actor::from_request_parts(parts, state).await?;
        Ok(PaymentCaller::User(actor))
    }
}
