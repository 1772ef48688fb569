use std::sync::Arc;
use uuid::Uuid;

use crate::database::MarketplaceStore;
use crate::dto::auth_dto::{AuthResponse, LoginPayload, RegisterPayload, UserResponse};
use crate::error::{Error, Result};
use crate::models::user::{NewUser, Role, User};
use crate::services::authorization::{located, Actor};
use crate::utils::{crypto, token, validation::normalize_email};

#[derive(Clone)]
pub struct AuthService {
    store: Arc<dyn MarketplaceStore>,
    jwt_secret: String,
    jwt_ttl_hours: i64,
}

impl AuthService {
    pub fn new(store: Arc<dyn MarketplaceStore>, jwt_secret: String, jwt_ttl_hours: i64) -> Self {
        Self {
            store,
            jwt_secret,
            jwt_ttl_hours,
        }
    }

    fn session_for(&self, user: User) -> Result<AuthResponse> {
        let token = token::issue_token(user.id, user.role, &self.jwt_secret, self.jwt_ttl_hours)?;
        Ok(AuthResponse {
            user: UserResponse::from(user),
            token,
        })
    }

    pub async fn register(&self, payload: RegisterPayload) -> Result<AuthResponse> {
        if payload.role == Role::Admin {
            return Err(Error::BadRequest(
                "Role must be client or freelancer".to_string(),
            ));
        }
        let email = normalize_email(&payload.email);
        if self.store.find_user_by_email(&email).await?.is_some() {
            return Err(Error::BadRequest(
                "An account with this email already exists".to_string(),
            ));
        }

        let user = self
            .store
            .insert_user(NewUser {
                email,
                password_hash: crypto::hash_password(&payload.password)?,
                full_name: payload.full_name.trim().to_string(),
                role: payload.role,
                phone: payload.phone,
                location: payload.location,
            })
            .await?;
        tracing::info!(user_id = %user.id, role = %user.role, "user registered");
        self.session_for(user)
    }

    pub async fn login(&self, payload: LoginPayload) -> Result<AuthResponse> {
        let invalid = || Error::Unauthorized("Invalid email or password".to_string());
        let email = normalize_email(&payload.email);
        let user = self.store.find_user_by_email(&email).await?.ok_or_else(invalid)?;
        if !crypto::verify_password(&payload.password, &user.password_hash) {
            return Err(invalid());
        }
        if !user.is_active {
            return Err(Error::Unauthorized("Account is deactivated".to_string()));
        }
        tracing::info!(user_id = %user.id, "user logged in");
        self.session_for(user)
    }

    pub async fn me(&self, actor: &Actor) -> Result<UserResponse> {
        let user = located(self.store.find_user(actor.id).await?, "User not found")?;
        Ok(UserResponse::from(user))
    }

    /// Resolves a bearer token to an active stored user. The stored role wins
    /// over whatever the token claims.
    pub async fn authenticate(&self, bearer: &str) -> Result<Actor> {
        let claims = token::decode_token(bearer, &self.jwt_secret)?;
        let user_id = Uuid::parse_str(&claims.sub)
            .map_err(|_| Error::Unauthorized("Invalid token subject".to_string()))?;
        let user = self
            .store
            .find_user(user_id)
            .await?
            .ok_or_else(|| Error::Unauthorized("User no longer exists".to_string()))?;
        if !user.is_active {
            return Err(Error::Unauthorized("Account is deactivated".to_string()));
        }
        Ok(Actor::new(user.id, user.role))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::MemoryStore;
    use crate::error::ErrorKind;

    fn service() -> AuthService {
        AuthService::new(Arc::new(MemoryStore::new()), "test-secret".into(), 1)
    }

    fn register_payload(email: &str, role: Role) -> RegisterPayload {
        RegisterPayload {
            email: email.to_string(),
            password: "Str0ng!pass".to_string(),
            full_name: "Amira Ben Salah".to_string(),
            role,
            phone: None,
            location: Some("Tunis".to_string()),
        }
    }

    #[tokio::test]
    async fn register_then_login_and_authenticate() {
        let auth = service();
        let registered = auth
            .register(register_payload("Amira@Example.com", Role::Freelancer))
            .await
            .unwrap();
        assert_eq!(registered.user.email, "amira@example.com");

        let session = auth
            .login(LoginPayload {
                email: "amira@example.com".into(),
                password: "Str0ng!pass".into(),
            })
            .await
            .unwrap();
        let actor = auth.authenticate(&session.token).await.unwrap();
        assert_eq!(actor.id, registered.user.id);
        assert_eq!(actor.role, Role::Freelancer);
    }

    #[tokio::test]
    async fn duplicate_email_and_admin_role_are_refused() {
        let auth = service();
        auth.register(register_payload("a@example.com", Role::Client)).await.unwrap();
        let err = auth
            .register(register_payload("A@example.com", Role::Client))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let err = auth
            .register(register_payload("root@example.com", Role::Admin))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[tokio::test]
    async fn wrong_password_and_deactivated_accounts_are_unauthorized() {
        let store = Arc::new(MemoryStore::new());
        let auth = AuthService::new(store.clone(), "test-secret".into(), 1);
        let registered = auth
            .register(register_payload("b@example.com", Role::Client))
            .await
            .unwrap();

        let err = auth
            .login(LoginPayload {
                email: "b@example.com".into(),
                password: "nope".into(),
            })
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unauthorized);

        store.set_user_active(registered.user.id, false).await.unwrap();
        let err = auth.authenticate(&registered.token).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unauthorized);
    }
}
