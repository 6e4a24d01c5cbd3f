use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::pipeline::job::VideoStyle;
use crate::pipeline::status::JobStatus;

#[derive(Debug, Serialize, Deserialize, FromRow, Clone)]
pub struct Video {
    pub id: Uuid,
    pub prompt: String,
    pub style: String,
    pub status: String,
    pub video_url: Option<String>,
    pub thumbnail_url: Option<String>,
    #[serde(with = "time::serde::iso8601")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::iso8601")]
    pub updated_at: OffsetDateTime,
}

impl Video {
    pub fn job_status(&self) -> anyhow::Result<JobStatus> {
        self.status
            .parse()
            .map_err(|e: String| anyhow::anyhow!("Corrupt status on video {}: {}", self.id, e))
    }

    pub fn video_style(&self) -> anyhow::Result<VideoStyle> {
        self.style
            .parse()
            .map_err(|e: String| anyhow::anyhow!("Corrupt style on video {}: {}", self.id, e))
    }
}
