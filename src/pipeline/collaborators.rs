//! Seams between the pipeline and the services it calls.
//!
//! Each trait is implemented once against a real backend under
//! `infrastructure` and by in-memory fakes in the sequencer tests.

use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;
use std::path::Path;
use thiserror::Error;
use uuid::Uuid;

use super::job::VideoStyle;
use super::script::Script;
use super::status::JobStatus;

#[async_trait]
pub trait ScriptGenerator: Send + Sync {
    async fn generate(&self, prompt: &str, style: VideoStyle) -> Result<Script>;
}

#[async_trait]
pub trait ImageGenerator: Send + Sync {
    /// Render one image for a slide's image prompt.
    async fn generate(&self, image_prompt: &str) -> Result<Bytes>;
}

#[async_trait]
pub trait Narrator: Send + Sync {
    /// Write one audio file covering every slide narration, in order, to `output`.
    async fn narrate(&self, script: &Script, output: &Path) -> Result<()>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedArtifacts {
    pub video_url: String,
    pub thumbnail_url: String,
}

#[async_trait]
pub trait ArtifactUploader: Send + Sync {
    async fn upload(
        &self,
        job_id: Uuid,
        video: &Path,
        thumbnail: &Path,
    ) -> Result<UploadedArtifacts>;
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("job {0} not found")]
    NotFound(Uuid),

    #[error("job {job_id} cannot move from {current} to {requested}")]
    Rejected {
        job_id: Uuid,
        current: JobStatus,
        requested: JobStatus,
    },

    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

/// Persistence of job status. Each call is one atomic row update.
#[async_trait]
pub trait JobStore: Send + Sync {
    async fn update_status(&self, job_id: Uuid, status: JobStatus) -> Result<(), StoreError>;

    async fn mark_completed(
        &self,
        job_id: Uuid,
        video_url: &str,
        thumbnail_url: &str,
    ) -> Result<(), StoreError>;
}
