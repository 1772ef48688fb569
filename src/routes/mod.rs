pub mod admin;
pub mod auth;
pub mod extract;
pub mod health;
pub mod jobs;
pub mod messages;
pub mod notifications;
pub mod payments;
pub mod submissions;

use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, post, put},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::middleware::{
    cors::frontend_cors,
    rate_limit::{new_rps_state, rps_middleware},
};
use crate::AppState;

const BODY_LIMIT_BYTES: usize = 2 * 1024 * 1024;

/// Builds the full HTTP surface. Unauthenticated entry points share the
/// stricter public limiter; everything else runs under the api limiter.
pub fn router(state: AppState) -> Router {
    let public_api = Router::new()
        .route("/api/health", get(health::health))
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/login", post(auth::login))
        .layer(axum::middleware::from_fn_with_state(
            new_rps_state(state.config.public_rps),
            rps_middleware,
        ));

    let api = Router::new()
        .route("/api/auth/me", get(auth::me))
        .route("/api/jobs", get(jobs::list_jobs).post(jobs::create_job))
        .route("/api/jobs/my/posted", get(jobs::my_posted_jobs))
        .route(
            "/api/jobs/:id",
            get(jobs::get_job)
                .put(jobs::update_job)
                .delete(jobs::delete_job),
        )
        .route("/api/jobs/:id/cancel", post(jobs::cancel_job))
        .route("/api/submissions", post(submissions::create_submission))
        .route("/api/submissions/my", get(submissions::my_submissions))
        .route(
            "/api/submissions/job/:job_id",
            get(submissions::job_submissions),
        )
        .route(
            "/api/submissions/:id",
            delete(submissions::delete_submission),
        )
        .route(
            "/api/submissions/:id/status",
            put(submissions::update_submission_status),
        )
        .route(
            "/api/submissions/:id/rate",
            put(submissions::rate_submission),
        )
        .route("/api/payments/fund-escrow", post(payments::fund_escrow))
        .route("/api/payments/confirm", post(payments::confirm_payment))
        .route(
            "/api/payments/release-escrow",
            post(payments::release_escrow),
        )
        .route(
            "/api/payments/transactions/:id",
            get(payments::get_transaction),
        )
        .route("/api/payments/history", get(payments::payment_history))
        .route("/api/messages", post(messages::send_message))
        .route("/api/messages/conversations", get(messages::conversations))
        .route("/api/messages/unread/count", get(messages::unread_count))
        .route("/api/messages/:job_id", get(messages::job_messages))
        .route("/api/messages/:job_id/read", put(messages::mark_job_read))
        .route(
            "/api/notifications",
            get(notifications::list_notifications),
        )
        .route(
            "/api/notifications/:id/read",
            put(notifications::mark_notification_read),
        )
        .route("/api/events", get(notifications::event_stream))
        .route("/api/presence/online", get(notifications::online_users))
        .route("/api/admin/users", get(admin::list_users))
        .route(
            "/api/admin/users/:id/toggle-status",
            put(admin::toggle_user_status),
        )
        .route("/api/admin/users/:id", delete(admin::delete_user))
        .layer(axum::middleware::from_fn_with_state(
            new_rps_state(state.config.api_rps),
            rps_middleware,
        ));

    let cors = frontend_cors(&state.config.frontend_url);

    public_api
        .merge(api)
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(DefaultBodyLimit::max(BODY_LIMIT_BYTES))
}
