use super::dto::{GenerateVideoRequest, GenerateVideoResponse, VideoResponse};
use super::repository::VideoRepository;
use crate::pipeline::job::{JobDescriptor, VideoStyle};
use crate::state::AppState;
use axum::http::StatusCode;
use thiserror::Error;
use tracing::{error, info};
use uuid::Uuid;
use validator::Validate;

pub const FEED_LIMIT: i64 = 20;

#[derive(Debug, Error)]
pub enum VideoError {
    #[error("{0}")]
    Invalid(String),

    #[error("Job not found")]
    NotFound,

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl VideoError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            VideoError::Invalid(_) => StatusCode::BAD_REQUEST,
            VideoError::NotFound => StatusCode::NOT_FOUND,
            VideoError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Check a submission and normalize its fields.
pub fn parse_request(req: &GenerateVideoRequest) -> Result<(String, VideoStyle), VideoError> {
    req.validate()
        .map_err(|e| VideoError::Invalid(e.to_string()))?;

    let prompt = req.prompt.trim();
    if prompt.is_empty() {
        return Err(VideoError::Invalid("Prompt is required".to_string()));
    }

    let style = req.style.parse::<VideoStyle>().map_err(VideoError::Invalid)?;
    Ok((prompt.to_string(), style))
}

pub struct VideoService;

impl VideoService {
    pub async fn submit(
        state: AppState,
        req: GenerateVideoRequest,
    ) -> Result<GenerateVideoResponse, VideoError> {
        let (prompt, style) = parse_request(&req)?;

        let video = VideoRepository::create(&state.db, &prompt, style).await?;
        let job = JobDescriptor {
            id: video.id,
            prompt,
            style,
        };

        let payload = serde_json::to_vec(&job).map_err(anyhow::Error::from)?;
        if let Err(e) = state.queue.publish(&state.config.video_queue, &payload).await {
            // The row stays queued; nothing will pick it up until it is resubmitted.
            error!("❌ Failed to enqueue job {}: {}", video.id, e);
            return Err(VideoError::Internal(e));
        }

        info!("📦 Queued video job {} ({})", video.id, style);

        Ok(GenerateVideoResponse {
            job_id: video.id,
            status: video.job_status()?,
        })
    }

    pub async fn find_by_id(state: AppState, id: Uuid) -> Result<VideoResponse, VideoError> {
        let video = VideoRepository::find_by_id(&state.db, id)
            .await?
            .ok_or(VideoError::NotFound)?;

        Ok(VideoResponse::try_from(video)?)
    }

    pub async fn feed(state: AppState) -> Result<Vec<VideoResponse>, VideoError> {
        let videos = VideoRepository::list_completed(&state.db, FEED_LIMIT).await?;

        let responses = videos
            .into_iter()
            .map(VideoResponse::try_from)
            .collect::<anyhow::Result<Vec<_>>>()?;
        Ok(responses)
    }
}
