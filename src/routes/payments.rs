use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    database::store::ReleaseRecord,
    dto::{
        envelope::ApiResponse,
        payment_dto::{
            ConfirmPaymentPayload, FundEscrowPayload, FundEscrowResponse, PaymentHistoryQuery,
            ReleaseEscrowPayload,
        },
    },
    error::{Error, Result},
    middleware::auth::PaymentCaller,
    models::transaction::Transaction,
    routes::extract::{AppJson, AppPath, AppQuery},
    services::authorization::Actor,
    AppState,
};

#[utoipa::path(
    post,
    path = "/api/payments/fund-escrow",
    request_body = FundEscrowPayload,
    responses(
        (status = 201, description = "Pending deposit created", body = Json<FundEscrowResponse>),
        (status = 400, description = "Unsupported provider or job not fundable"),
        (status = 403, description = "Not the job owner"),
        (status = 404, description = "Job not found")
    )
)]
#[axum::debug_handler]
pub async fn fund_escrow(
    State(state): State<AppState>,
    actor: Actor,
    AppJson(payload): AppJson<FundEscrowPayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let provider = payload
        .provider()
        .ok_or_else(|| Error::BadRequest("Unsupported payment provider".to_string()))?;
    let response = state
        .escrow_service
        .fund_escrow(&actor, payload.job_id, provider)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::with_message("Payment initiated", response)),
    ))
}

#[utoipa::path(
    post,
    path = "/api/payments/confirm",
    request_body = ConfirmPaymentPayload,
    responses(
        (status = 200, description = "Deposit settled or replayed"),
        (status = 400, description = "Conflicting outcome or job no longer fundable"),
        (status = 401, description = "Neither a token nor a valid webhook secret"),
        (status = 404, description = "Transaction not found")
    )
)]
#[axum::debug_handler]
pub async fn confirm_payment(
    State(state): State<AppState>,
    caller: PaymentCaller,
    AppJson(payload): AppJson<ConfirmPaymentPayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    match caller {
        PaymentCaller::Gateway => {
            tracing::info!(transaction_id = %payload.transaction_id, "gateway payment callback")
        }
        PaymentCaller::User(actor) => tracing::info!(
            transaction_id = %payload.transaction_id,
            user_id = %actor.id,
            "payment confirmation by user"
        ),
    }
    let result = state
        .escrow_service
        .confirm_payment(payload.transaction_id, &payload.status)
        .await?;
    let message = if result.replayed {
        "Payment already processed"
    } else {
        "Payment processed"
    };
    Ok(Json(ApiResponse::with_message(message, result)))
}

#[utoipa::path(
    post,
    path = "/api/payments/release-escrow",
    request_body = ReleaseEscrowPayload,
    responses(
        (status = 200, description = "Escrow released to the freelancer", body = Json<ReleaseRecord>),
        (status = 400, description = "Escrow not funded, already released or submission not releasable"),
        (status = 403, description = "Not the job owner")
    )
)]
#[axum::debug_handler]
pub async fn release_escrow(
    State(state): State<AppState>,
    actor: Actor,
    AppJson(payload): AppJson<ReleaseEscrowPayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let record = state
        .escrow_service
        .release_escrow(&actor, payload.job_id, payload.submission_id)
        .await?;
    Ok(Json(ApiResponse::with_message("Escrow released", record)))
}

#[utoipa::path(
    get,
    path = "/api/payments/transactions/{id}",
    params(
        ("id" = Uuid, Path, description = "Transaction ID")
    ),
    responses(
        (status = 200, description = "Transaction", body = Json<Transaction>),
        (status = 403, description = "Not a party to the transaction"),
        (status = 404, description = "Transaction not found")
    )
)]
#[axum::debug_handler]
pub async fn get_transaction(
    State(state): State<AppState>,
    actor: Actor,
    AppPath(id): AppPath<Uuid>,
) -> Result<impl IntoResponse> {
    let tx = state.escrow_service.get_transaction(&actor, id).await?;
    Ok(Json(ApiResponse::ok(tx)))
}

#[axum::debug_handler]
pub async fn payment_history(
    State(state): State<AppState>,
    actor: Actor,
    AppQuery(query): AppQuery<PaymentHistoryQuery>,
) -> Result<impl IntoResponse> {
    let history = state.escrow_service.history(&actor, query).await?;
    Ok(Json(ApiResponse::ok(history)))
}
