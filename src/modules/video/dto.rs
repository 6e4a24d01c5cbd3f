use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use super::model::Video;
use crate::pipeline::job::VideoStyle;
use crate::pipeline::status::JobStatus;

pub const MAX_PROMPT_CHARS: u64 = 500;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct GenerateVideoRequest {
    #[validate(length(min = 1, max = MAX_PROMPT_CHARS, message = "Prompt must be between 1 and 500 characters"))]
    #[schema(example = "a calm ocean at sunset")]
    pub prompt: String,
    /// One of `Educational`, `Storytelling` or `Meme`.
    #[schema(example = "Educational")]
    pub style: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct GenerateVideoResponse {
    pub job_id: Uuid,
    pub status: JobStatus,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct VideoResponse {
    pub id: Uuid,
    pub prompt: String,
    pub style: VideoStyle,
    pub status: JobStatus,
    pub video_url: Option<String>,
    pub thumbnail_url: Option<String>,
    #[serde(with = "time::serde::iso8601")]
    pub created_at: OffsetDateTime,
}

impl TryFrom<Video> for VideoResponse {
    type Error = anyhow::Error;

    fn try_from(v: Video) -> Result<Self, Self::Error> {
        Ok(Self {
            status: v.job_status()?,
            style: v.video_style()?,
            id: v.id,
            prompt: v.prompt,
            video_url: v.video_url,
            thumbnail_url: v.thumbnail_url,
            created_at: v.created_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(prompt: &str) -> GenerateVideoRequest {
        GenerateVideoRequest {
            prompt: prompt.to_string(),
            style: "Educational".to_string(),
        }
    }

    #[test]
    fn test_prompt_length_bounds() {
        assert!(request("a calm ocean at sunset").validate().is_ok());
        assert!(request(&"a".repeat(MAX_PROMPT_CHARS as usize)).validate().is_ok());
        assert!(request("").validate().is_err());
        assert!(request(&"a".repeat(MAX_PROMPT_CHARS as usize + 1)).validate().is_err());
    }

    #[test]
    fn test_response_from_row() {
        let now = OffsetDateTime::now_utc();
        let video = Video {
            id: Uuid::new_v4(),
            prompt: "a calm ocean at sunset".to_string(),
            style: "Storytelling".to_string(),
            status: "done".to_string(),
            video_url: Some("https://cdn.example.com/videos/x.mp4".to_string()),
            thumbnail_url: Some("https://cdn.example.com/thumbnails/x.jpg".to_string()),
            created_at: now,
            updated_at: now,
        };

        let response = VideoResponse::try_from(video).unwrap();
        assert_eq!(response.status, JobStatus::Done);
        assert_eq!(response.style, VideoStyle::Storytelling);

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["status"], "done");
        assert_eq!(json["style"], "Storytelling");
    }

    #[test]
    fn test_corrupt_row_is_an_error() {
        let now = OffsetDateTime::now_utc();
        let video = Video {
            id: Uuid::new_v4(),
            prompt: "x".to_string(),
            style: "Educational".to_string(),
            status: "exploded".to_string(),
            video_url: None,
            thumbnail_url: None,
            created_at: now,
            updated_at: now,
        };
        assert!(VideoResponse::try_from(video).is_err());
    }
}
