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
        job_dto::{CreateJobPayload, JobDetailResponse, JobListQuery, JobListResponse, UpdateJobPayload},
    },
    error::Result,
    models::job::Job,
    routes::extract::{AppJson, AppPath, AppQuery},
    services::authorization::Actor,
    AppState,
};

#[utoipa::path(
    get,
    path = "/api/jobs",
    responses(
        (status = 200, description = "Paginated job list", body = Json<JobListResponse>)
    )
)]
#[axum::debug_handler]
pub async fn list_jobs(
    State(state): State<AppState>,
    AppQuery(query): AppQuery<JobListQuery>,
) -> Result<impl IntoResponse> {
    let page = state.job_service.list(query).await?;
    Ok(Json(ApiResponse::ok(page)))
}

#[utoipa::path(
    get,
    path = "/api/jobs/{id}",
    params(
        ("id" = Uuid, Path, description = "Job ID")
    ),
    responses(
        (status = 200, description = "Job with submission count", body = Json<JobDetailResponse>),
        (status = 404, description = "Job not found")
    )
)]
#[axum::debug_handler]
pub async fn get_job(
    State(state): State<AppState>,
    AppPath(id): AppPath<Uuid>,
) -> Result<impl IntoResponse> {
    let job = state.job_service.get(id).await?;
    Ok(Json(ApiResponse::ok(job)))
}

#[axum::debug_handler]
pub async fn my_posted_jobs(
    State(state): State<AppState>,
    actor: Actor,
) -> Result<impl IntoResponse> {
    let jobs = state.job_service.my_posted(&actor).await?;
    Ok(Json(ApiResponse::ok(jobs)))
}

#[utoipa::path(
    post,
    path = "/api/jobs",
    request_body = CreateJobPayload,
    responses(
        (status = 201, description = "Job created", body = Json<Job>),
        (status = 400, description = "Invalid payload"),
        (status = 403, description = "Only clients can post jobs")
    )
)]
#[axum::debug_handler]
pub async fn create_job(
    State(state): State<AppState>,
    actor: Actor,
    AppJson(payload): AppJson<CreateJobPayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let job = state.job_service.create(&actor, payload).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::with_message("Job created successfully", job)),
    ))
}

#[utoipa::path(
    put,
    path = "/api/jobs/{id}",
    params(
        ("id" = Uuid, Path, description = "Job ID")
    ),
    request_body = UpdateJobPayload,
    responses(
        (status = 200, description = "Job updated", body = Json<Job>),
        (status = 400, description = "Invalid payload or job not open"),
        (status = 403, description = "Not the job owner"),
        (status = 404, description = "Job not found")
    )
)]
#[axum::debug_handler]
pub async fn update_job(
    State(state): State<AppState>,
    actor: Actor,
    AppPath(id): AppPath<Uuid>,
    AppJson(payload): AppJson<UpdateJobPayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let job = state.job_service.update(&actor, id, payload).await?;
    Ok(Json(ApiResponse::with_message("Job updated successfully", job)))
}

#[utoipa::path(
    delete,
    path = "/api/jobs/{id}",
    params(
        ("id" = Uuid, Path, description = "Job ID")
    ),
    responses(
        (status = 200, description = "Job deleted"),
        (status = 400, description = "Job not open or has history"),
        (status = 403, description = "Not the job owner"),
        (status = 404, description = "Job not found")
    )
)]
#[axum::debug_handler]
pub async fn delete_job(
    State(state): State<AppState>,
    actor: Actor,
    AppPath(id): AppPath<Uuid>,
) -> Result<impl IntoResponse> {
    state.job_service.delete(&actor, id).await?;
    Ok(Json(ApiResponse::message("Job deleted successfully")))
}

#[axum::debug_handler]
pub async fn cancel_job(
    State(state): State<AppState>,
    actor: Actor,
    AppPath(id): AppPath<Uuid>,
) -> Result<impl IntoResponse> {
    let job = state.job_service.cancel(&actor, id).await?;
    Ok(Json(ApiResponse::with_message("Job cancelled", job)))
}
