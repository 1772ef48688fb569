use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::{
        envelope::ApiResponse,
        submission_dto::{
            CreateSubmissionPayload, MySubmissionsQuery, RateSubmissionPayload,
            UpdateSubmissionStatusPayload,
        },
    },
    error::Result,
    models::submission::Submission,
    routes::extract::{AppJson, AppPath, AppQuery},
    services::authorization::Actor,
    AppState,
};

#[utoipa::path(
    post,
    path = "/api/submissions",
    request_body = CreateSubmissionPayload,
    responses(
        (status = 201, description = "Submission created", body = Json<Submission>),
        (status = 400, description = "Job not accepting submissions or already submitted"),
        (status = 403, description = "Only freelancers can submit")
    )
)]
#[axum::debug_handler]
pub async fn create_submission(
    State(state): State<AppState>,
    actor: Actor,
    AppJson(payload): AppJson<CreateSubmissionPayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let submission = state.submission_service.create(&actor, payload).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::with_message("Submission created successfully", submission)),
    ))
}

#[axum::debug_handler]
pub async fn job_submissions(
    State(state): State<AppState>,
    actor: Actor,
    AppPath(job_id): AppPath<Uuid>,
) -> Result<impl IntoResponse> {
    let submissions = state.submission_service.list_for_job(&actor, job_id).await?;
    Ok(Json(ApiResponse::ok(submissions)))
}

#[axum::debug_handler]
pub async fn my_submissions(
    State(state): State<AppState>,
    actor: Actor,
    AppQuery(query): AppQuery<MySubmissionsQuery>,
) -> Result<impl IntoResponse> {
    let submissions = state
        .submission_service
        .my_submissions(&actor, query.status)
        .await?;
    Ok(Json(ApiResponse::ok(submissions)))
}

#[utoipa::path(
    put,
    path = "/api/submissions/{id}/status",
    params(
        ("id" = Uuid, Path, description = "Submission ID")
    ),
    request_body = UpdateSubmissionStatusPayload,
    responses(
        (status = 200, description = "Status updated", body = Json<Submission>),
        (status = 400, description = "Transition not allowed"),
        (status = 403, description = "Not the job owner")
    )
)]
#[axum::debug_handler]
pub async fn update_submission_status(
    State(state): State<AppState>,
    actor: Actor,
    AppPath(id): AppPath<Uuid>,
    AppJson(payload): AppJson<UpdateSubmissionStatusPayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let submission = state
        .submission_service
        .update_status(&actor, id, payload.status, payload.client_feedback)
        .await?;
    Ok(Json(ApiResponse::with_message("Submission status updated", submission)))
}

#[utoipa::path(
    put,
    path = "/api/submissions/{id}/rate",
    params(
        ("id" = Uuid, Path, description = "Submission ID")
    ),
    request_body = RateSubmissionPayload,
    responses(
        (status = 200, description = "Rating recorded", body = Json<Submission>),
        (status = 400, description = "Not accepted or already rated"),
        (status = 403, description = "Not the job owner")
    )
)]
#[axum::debug_handler]
pub async fn rate_submission(
    State(state): State<AppState>,
    actor: Actor,
    AppPath(id): AppPath<Uuid>,
    AppJson(payload): AppJson<RateSubmissionPayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let submission = state.submission_service.rate(&actor, id, payload).await?;
    Ok(Json(ApiResponse::with_message("Rating submitted", submission)))
}

#[axum::debug_handler]
pub async fn delete_submission(
    State(state): State<AppState>,
    actor: Actor,
    AppPath(id): AppPath<Uuid>,
) -> Result<impl IntoResponse> {
    state.submission_service.delete(&actor, id).await?;
    Ok(Json(ApiResponse::message("Submission deleted successfully")))
}
