use super::model::Video;
use anyhow::{Result, anyhow};
use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::pipeline::collaborators::{JobStore, StoreError};
use crate::pipeline::job::VideoStyle;
use crate::pipeline::status::JobStatus;

const VIDEO_COLUMNS: &str =
    "id, prompt, style, status, video_url, thumbnail_url, created_at, updated_at";

pub struct VideoRepository;

impl VideoRepository {
    pub async fn create(pool: &PgPool, prompt: &str, style: VideoStyle) -> Result<Video> {
        let video = sqlx::query_as::<_, Video>(&format!(
            r#"
            INSERT INTO videos (prompt, style, status)
            VALUES ($1, $2, $3)
            RETURNING {}
            "#,
            VIDEO_COLUMNS
        ))
        .bind(prompt)
        .bind(style.as_str())
        .bind(JobStatus::Queued.as_str())
        .fetch_one(pool)
        .await
        .map_err(|e| anyhow!("Failed to create video job: {}", e))?;

        Ok(video)
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Video>> {
        let video = sqlx::query_as::<_, Video>(&format!(
            "SELECT {} FROM videos WHERE id = $1",
            VIDEO_COLUMNS
        ))
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(|e| anyhow!("Failed to fetch video: {}", e))?;

        Ok(video)
    }

    pub async fn list_completed(pool: &PgPool, limit: i64) -> Result<Vec<Video>> {
        let videos = sqlx::query_as::<_, Video>(&format!(
            r#"
            SELECT {}
            FROM videos
            WHERE status = $1
            ORDER BY created_at DESC
            LIMIT $2
            "#,
            VIDEO_COLUMNS
        ))
        .bind(JobStatus::Done.as_str())
        .bind(limit)
        .fetch_all(pool)
        .await
        .map_err(|e| anyhow!("Failed to fetch feed: {}", e))?;

        Ok(videos)
    }

    pub async fn current_status(pool: &PgPool, id: Uuid) -> Result<Option<String>> {
        let status = sqlx::query_scalar::<_, String>("SELECT status FROM videos WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await?;

        Ok(status)
    }

    /// Move a job to `status` only if it currently sits in one of the legal
    /// predecessor states. Returns the number of rows changed.
    pub async fn transition(pool: &PgPool, id: Uuid, status: JobStatus) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE videos
            SET status = $2, updated_at = NOW()
            WHERE id = $1 AND status = ANY($3)
            "#,
        )
        .bind(id)
        .bind(status.as_str())
        .bind(predecessor_names(status))
        .execute(pool)
        .await?;

        Ok(result.rows_affected())
    }

    pub async fn complete(
        pool: &PgPool,
        id: Uuid,
        video_url: &str,
        thumbnail_url: &str,
    ) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE videos
            SET status = $2, video_url = $3, thumbnail_url = $4, updated_at = NOW()
            WHERE id = $1 AND status = ANY($5)
            "#,
        )
        .bind(id)
        .bind(JobStatus::Done.as_str())
        .bind(video_url)
        .bind(thumbnail_url)
        .bind(predecessor_names(JobStatus::Done))
        .execute(pool)
        .await?;

        Ok(result.rows_affected())
    }
}

fn predecessor_names(status: JobStatus) -> Vec<String> {
    status
        .predecessors()
        .iter()
        .map(|s| s.as_str().to_string())
        .collect()
}

/// `JobStore` backed by the `videos` table.
#[derive(Clone)]
pub struct PgJobStore {
    pool: PgPool,
}

impl PgJobStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Explain why a conditional update touched no rows.
    async fn refusal(&self, job_id: Uuid, requested: JobStatus) -> StoreError {
        match VideoRepository::current_status(&self.pool, job_id).await {
            Ok(None) => StoreError::NotFound(job_id),
            Ok(Some(raw)) => match raw.parse::<JobStatus>() {
                Ok(current) => StoreError::Rejected {
                    job_id,
                    current,
                    requested,
                },
                Err(e) => StoreError::Backend(anyhow!("Corrupt status on video {}: {}", job_id, e)),
            },
            Err(e) => StoreError::Backend(e),
        }
    }
}

#[async_trait]
impl JobStore for PgJobStore {
    async fn update_status(&self, job_id: Uuid, status: JobStatus) -> Result<(), StoreError> {
        let changed = VideoRepository::transition(&self.pool, job_id, status).await?;
        if changed == 0 {
            return Err(self.refusal(job_id, status).await);
        }
        Ok(())
    }

    async fn mark_completed(
        &self,
        job_id: Uuid,
        video_url: &str,
        thumbnail_url: &str,
    ) -> Result<(), StoreError> {
        let changed =
            VideoRepository::complete(&self.pool, job_id, video_url, thumbnail_url).await?;
        if changed == 0 {
            return Err(self.refusal(job_id, JobStatus::Done).await);
        }
        Ok(())
    }
}
