use super::dto::{GenerateVideoRequest, GenerateVideoResponse, VideoResponse};
use super::service::VideoService;
use crate::common::response::{ApiError, ApiResponse, ApiSuccess};
use crate::state::AppState;
use axum::{
    Json,
    extract::{Path, State},
    response::IntoResponse,
};
use uuid::Uuid;

/// Submit a video generation job
#[utoipa::path(
    post,
    path = "/api/v1/generate",
    request_body = GenerateVideoRequest,
    responses(
        (status = 201, description = "Job queued", body = ApiResponse<GenerateVideoResponse>),
        (status = 400, description = "Invalid prompt or style"),
        (status = 500, description = "Job could not be queued")
    ),
    tag = "Videos"
)]
pub async fn generate_video(
    State(state): State<AppState>,
    Json(payload): Json<GenerateVideoRequest>,
) -> impl IntoResponse {
    match VideoService::submit(state, payload).await {
        Ok(job) => ApiSuccess::created(job, "Video generation queued").into_response(),
        Err(e) => ApiError(e.to_string(), e.status_code()).into_response(),
    }
}

/// Get the status of a job
#[utoipa::path(
    get,
    path = "/api/v1/status/{id}",
    params(
        ("id" = Uuid, Path, description = "Job ID")
    ),
    responses(
        (status = 200, description = "Job details", body = ApiResponse<VideoResponse>),
        (status = 404, description = "Job not found")
    ),
    tag = "Videos"
)]
pub async fn get_status(State(state): State<AppState>, Path(id): Path<Uuid>) -> impl IntoResponse {
    match VideoService::find_by_id(state, id).await {
        Ok(video) => ApiSuccess::ok(video, "Job retrieved successfully").into_response(),
        Err(e) => ApiError(e.to_string(), e.status_code()).into_response(),
    }
}

/// List the most recent finished videos
#[utoipa::path(
    get,
    path = "/api/v1/feed",
    responses(
        (status = 200, description = "Latest finished videos", body = ApiResponse<Vec<VideoResponse>>)
    ),
    tag = "Videos"
)]
pub async fn get_feed(State(state): State<AppState>) -> impl IntoResponse {
    match VideoService::feed(state).await {
        Ok(videos) => ApiSuccess::ok(videos, "Feed retrieved successfully").into_response(),
        Err(e) => ApiError(e.to_string(), e.status_code()).into_response(),
    }
}
