#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use marketplace_backend::{
    config::{Config, StoreBackend},
    database::{MarketplaceStore, MemoryStore},
    models::user::{NewUser, Role, User},
    routes,
    utils::token::issue_token,
    AppState,
};
use serde_json::{json, Value as JsonValue};
use tower::ServiceExt;
use uuid::Uuid;

pub const JWT_SECRET: &str = "test_secret_key";
pub const WEBHOOK_SECRET: &str = "whsec_test";

pub fn test_config() -> Config {
    Config {
        server_address: "127.0.0.1:0".to_string(),
        store_backend: StoreBackend::Memory,
        database_url: None,
        jwt_secret: JWT_SECRET.to_string(),
        jwt_ttl_hours: 1,
        webhook_secret: WEBHOOK_SECRET.to_string(),
        frontend_url: "http://localhost:5173".to_string(),
        notification_relay_url: None,
        api_rps: 10_000,
        public_rps: 10_000,
        environment: "test".to_string(),
    }
}

pub struct TestApp {
    pub app: Router,
    pub state: AppState,
}

pub struct Account {
    pub user: User,
    pub token: String,
}

impl TestApp {
    pub fn new() -> Self {
        let store: Arc<dyn MarketplaceStore> = Arc::new(MemoryStore::new());
        let state = AppState::new(store, test_config());
        let app = routes::router(state.clone());
        Self { app, state }
    }

    pub async fn account(&self, role: Role) -> Account {
        let id = Uuid::new_v4();
        let user = self
            .state
            .store
            .insert_user(NewUser {
                email: format!("{}_{}@example.com", role.as_str(), id.simple()),
                password_hash: "not-a-real-hash".to_string(),
                full_name: format!("Test {}", role.as_str()),
                role,
                phone: None,
                location: None,
            })
            .await
            .expect("seed user");
        let token = issue_token(user.id, user.role, JWT_SECRET, 1).expect("issue token");
        Account { user, token }
    }

    pub async fn send(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<JsonValue>,
    ) -> (StatusCode, JsonValue) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let response = self.app.clone().oneshot(request).await.unwrap();
        read(response).await
    }

    /// Posts an open job worth `budget` TND and returns its id.
    pub async fn post_job(&self, client: &Account, budget: &str) -> Uuid {
        let (status, body) = self
            .send(
                "POST",
                "/api/jobs",
                Some(&client.token),
                Some(json!({
                    "title": "Build a landing page",
                    "description": "Responsive landing page with a contact form and analytics.",
                    "category": "web",
                    "budget": budget,
                    "currency": "TND",
                    "required_skills": ["html", "css"]
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        body["data"]["id"].as_str().unwrap().parse().unwrap()
    }

    /// Funds the job through konnect and confirms the deposit.
    pub async fn fund_job(&self, client: &Account, job_id: Uuid) -> Uuid {
        let (status, body) = self
            .send(
                "POST",
                "/api/payments/fund-escrow",
                Some(&client.token),
                Some(json!({ "job_id": job_id, "provider": "konnect" })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        let tx_id: Uuid = body["data"]["transaction_id"].as_str().unwrap().parse().unwrap();

        let (status, body) = self
            .send(
                "POST",
                "/api/payments/confirm",
                Some(&client.token),
                Some(json!({ "transaction_id": tx_id, "status": "success" })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{}", body);
        tx_id
    }

    pub async fn submit_work(&self, freelancer: &Account, job_id: Uuid) -> (StatusCode, JsonValue) {
        self.send(
            "POST",
            "/api/submissions",
            Some(&freelancer.token),
            Some(json!({
                "job_id": job_id,
                "description": "Delivered the page with all requested sections.",
                "attachments": ["https://files.example.com/site.zip"]
            })),
        )
        .await
    }
}

pub async fn read(response: axum::response::Response) -> (StatusCode, JsonValue) {
    let status = response.status();
    let bytes = to_bytes(response.into_body(), 1024 * 1024).await.unwrap();
    let body = if bytes.is_empty() {
        JsonValue::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

pub fn decimal(value: &JsonValue) -> rust_decimal::Decimal {
    match value {
        JsonValue::String(s) => s.parse().unwrap(),
        other => other.to_string().parse().unwrap(),
    }
}
