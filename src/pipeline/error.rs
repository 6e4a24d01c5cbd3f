use std::fmt;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

use super::script::ValidationError;
use super::status::JobStatus;
use super::workspace::WorkspaceError;
use crate::infrastructure::ffmpeg::MediaError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Workspace,
    Script,
    Images,
    Narration,
    Assembly,
    Upload,
    Completion,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Workspace => "workspace",
            Stage::Script => "script",
            Stage::Images => "images",
            Stage::Narration => "narration",
            Stage::Assembly => "assembly",
            Stage::Upload => "upload",
            Stage::Completion => "completion",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse classification used for logging and by the queue layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Collaborator,
    Resource,
    Postcondition,
}

#[derive(Debug, Error)]
pub enum StageError {
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("{0:#}")]
    Collaborator(anyhow::Error),

    #[error(transparent)]
    Workspace(#[from] WorkspaceError),

    #[error(transparent)]
    Media(#[from] MediaError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Postcondition(String),
}

impl StageError {
    pub fn collaborator(err: anyhow::Error) -> Self {
        Self::Collaborator(err)
    }

    pub fn postcondition(msg: impl Into<String>) -> Self {
        Self::Postcondition(msg.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            StageError::Validation(_) => ErrorKind::Validation,
            StageError::Collaborator(_) => ErrorKind::Collaborator,
            StageError::Workspace(_) | StageError::Io(_) => ErrorKind::Resource,
            StageError::Postcondition(_) => ErrorKind::Postcondition,
            StageError::Media(media) => match media {
                MediaError::CountMismatch { .. }
                | MediaError::NoImages
                | MediaError::InvalidDuration { .. } => ErrorKind::Validation,
                MediaError::EmptyOutput(_) | MediaError::VideoTooShort { .. } => {
                    ErrorKind::Postcondition
                }
                MediaError::MissingInput(_) | MediaError::Io(_) => ErrorKind::Resource,
                MediaError::BinaryNotFound(_)
                | MediaError::FfmpegFailed { .. }
                | MediaError::FfprobeFailed { .. }
                | MediaError::JsonParse(_) => ErrorKind::Collaborator,
            },
        }
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("job {job_id} failed at {stage} stage: {source}")]
    Stage {
        job_id: Uuid,
        stage: Stage,
        #[source]
        source: StageError,
    },

    #[error("job {job_id} exceeded its {}s time limit", .limit.as_secs())]
    TimedOut { job_id: Uuid, limit: Duration },

    #[error("job {job_id} is already {status}, refusing to reprocess")]
    AlreadyTerminal { job_id: Uuid, status: JobStatus },

    #[error("job {job_id} not found")]
    JobNotFound { job_id: Uuid },

    #[error("could not mark job {job_id} as processing: {error:#}")]
    Begin { job_id: Uuid, error: anyhow::Error },

    /// Another attempt for the same job is still running in this worker.
    #[error("job {job_id} is already being processed")]
    InFlight { job_id: Uuid },

    /// The run failed and the `failed` status could not be written, so the
    /// row is still `processing`.
    #[error("{cause}; recording the failure also failed: {error:#}")]
    FailureNotRecorded {
        cause: Box<PipelineError>,
        error: anyhow::Error,
    },
}

impl PipelineError {
    pub fn stage(job_id: Uuid, stage: Stage, source: impl Into<StageError>) -> Self {
        Self::Stage {
            job_id,
            stage,
            source: source.into(),
        }
    }

    pub fn job_id(&self) -> Uuid {
        match self {
            PipelineError::Stage { job_id, .. }
            | PipelineError::TimedOut { job_id, .. }
            | PipelineError::AlreadyTerminal { job_id, .. }
            | PipelineError::JobNotFound { job_id }
            | PipelineError::Begin { job_id, .. }
            | PipelineError::InFlight { job_id } => *job_id,
            PipelineError::FailureNotRecorded { cause, .. } => cause.job_id(),
        }
    }

    pub fn failed_stage(&self) -> Option<Stage> {
        match self {
            PipelineError::Stage { stage, .. } => Some(*stage),
            PipelineError::FailureNotRecorded { cause, .. } => cause.failed_stage(),
            _ => None,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::Stage { source, .. } => source.kind(),
            PipelineError::TimedOut { .. } | PipelineError::Begin { .. } => {
                ErrorKind::Collaborator
            }
            PipelineError::AlreadyTerminal { .. } | PipelineError::JobNotFound { .. } => {
                ErrorKind::Validation
            }
            PipelineError::InFlight { .. } => ErrorKind::Resource,
            PipelineError::FailureNotRecorded { cause, .. } => cause.kind(),
        }
    }

    /// Whether the job should be dropped by the queue no matter the requeue setting.
    ///
    /// Terminal and unknown jobs never become processable again. A duplicate
    /// of a running job is settled by the attempt that holds it.
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            PipelineError::AlreadyTerminal { .. }
                | PipelineError::JobNotFound { .. }
                | PipelineError::InFlight { .. }
        )
    }

    /// Whether the job row was left at `processing` and needs another delivery
    /// to reach a terminal state.
    pub fn left_processing(&self) -> bool {
        matches!(self, PipelineError::FailureNotRecorded { .. })
    }
}
