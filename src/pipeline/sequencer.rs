use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::anyhow;
use tracing::{Instrument, error, info, info_span, warn};
use uuid::Uuid;

use super::assembly::{AssembledVideo, VideoAssembler};
use super::collaborators::{
    ArtifactUploader, ImageGenerator, JobStore, Narrator, ScriptGenerator, StoreError,
    UploadedArtifacts,
};
use super::error::{PipelineError, Stage, StageError};
use super::job::{JobDescriptor, JobResult};
use super::script::{DurationBand, Script};
use super::status::JobStatus;
use super::workspace::{Workspace, WorkspaceError, WorkspaceProvider};

const FAILURE_WRITE_RETRY_DELAY: Duration = Duration::from_millis(200);

/// What happens to a workspace once its job reaches a terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CleanupPolicy {
    #[default]
    Always,
    /// Leave failed workspaces on disk for inspection.
    RetainFailed,
}

#[derive(Debug, Clone)]
pub struct SequencerConfig {
    pub job_timeout: Duration,
    pub duration_band: DurationBand,
    pub cleanup: CleanupPolicy,
}

impl Default for SequencerConfig {
    fn default() -> Self {
        Self {
            job_timeout: Duration::from_secs(300),
            duration_band: DurationBand::Warn,
            cleanup: CleanupPolicy::Always,
        }
    }
}

/// Handles to every external service a job touches.
#[derive(Clone)]
pub struct Collaborators {
    pub scripts: Arc<dyn ScriptGenerator>,
    pub images: Arc<dyn ImageGenerator>,
    pub narrator: Arc<dyn Narrator>,
    pub assembler: Arc<dyn VideoAssembler>,
    pub uploader: Arc<dyn ArtifactUploader>,
    pub store: Arc<dyn JobStore>,
    pub workspaces: Arc<dyn WorkspaceProvider>,
}

/// Drives one job through script, images, narration, assembly and upload.
///
/// A sequencer holds no per-job state, so one instance is shared by every
/// executor task in the worker.
#[derive(Clone)]
pub struct Sequencer {
    collaborators: Collaborators,
    config: SequencerConfig,
}

impl Sequencer {
    pub fn new(collaborators: Collaborators, config: SequencerConfig) -> Self {
        Self {
            collaborators,
            config,
        }
    }

    pub async fn run(&self, job: &JobDescriptor) -> Result<JobResult, PipelineError> {
        let span = info_span!("job", job_id = %job.id, style = %job.style);
        self.run_job(job).instrument(span).await
    }

    async fn run_job(&self, job: &JobDescriptor) -> Result<JobResult, PipelineError> {
        let started = Instant::now();
        info!(prompt = %job.prompt, "Starting job");

        self.begin(job.id).await?;

        let outcome = match self.collaborators.workspaces.acquire(job.id).await {
            Ok(workspace) => self.execute_within_limit(job, &workspace).await,
            Err(WorkspaceError::Busy(_)) => {
                warn!("Job is already running, dropping duplicate delivery");
                return Err(PipelineError::InFlight { job_id: job.id });
            }
            Err(e) => Err(PipelineError::stage(job.id, Stage::Workspace, e)),
        };

        let outcome = match outcome {
            Ok(result) => Ok(result),
            Err(err) => Err(self.record_failure(job.id, err).await),
        };

        self.cleanup(job.id, outcome.is_ok()).await;

        if outcome.is_ok() {
            info!(elapsed_secs = started.elapsed().as_secs_f64(), "Job completed");
        }
        outcome
    }

    async fn execute_within_limit(
        &self,
        job: &JobDescriptor,
        workspace: &Workspace,
    ) -> Result<JobResult, PipelineError> {
        let limit = self.config.job_timeout;
        match tokio::time::timeout(limit, self.execute(job, workspace)).await {
            Ok(outcome) => outcome,
            Err(_) => Err(PipelineError::TimedOut {
                job_id: job.id,
                limit,
            }),
        }
    }

    /// Move the job to `processing` before any external call is made.
    async fn begin(&self, job_id: Uuid) -> Result<(), PipelineError> {
        match self
            .collaborators
            .store
            .update_status(job_id, JobStatus::Processing)
            .await
        {
            Ok(()) => Ok(()),
            Err(StoreError::Rejected { current, .. }) if current.is_terminal() => {
                Err(PipelineError::AlreadyTerminal {
                    job_id,
                    status: current,
                })
            }
            Err(StoreError::NotFound(_)) => Err(PipelineError::JobNotFound { job_id }),
            Err(other) => Err(PipelineError::Begin {
                job_id,
                error: anyhow::Error::new(other),
            }),
        }
    }

    async fn execute(
        &self,
        job: &JobDescriptor,
        workspace: &Workspace,
    ) -> Result<JobResult, PipelineError> {
        let id = job.id;
        let fail = |stage: Stage| move |e: StageError| PipelineError::stage(id, stage, e);

        let script = self.script_stage(job).await.map_err(fail(Stage::Script))?;

        let images = self
            .image_stage(workspace, &script)
            .await
            .map_err(fail(Stage::Images))?;

        let narration = self
            .narration_stage(workspace, &script)
            .await
            .map_err(fail(Stage::Narration))?;

        let video = self
            .assembly_stage(workspace, &script, &images, &narration)
            .await
            .map_err(fail(Stage::Assembly))?;

        let uploaded = self
            .upload_stage(id, &video)
            .await
            .map_err(fail(Stage::Upload))?;

        self.collaborators
            .store
            .mark_completed(id, &uploaded.video_url, &uploaded.thumbnail_url)
            .await
            .map_err(|e| PipelineError::stage(id, Stage::Completion, store_error(e)))?;

        Ok(JobResult {
            job_id: id,
            status: JobStatus::Done,
            video_url: uploaded.video_url,
            thumbnail_url: uploaded.thumbnail_url,
        })
    }

    async fn script_stage(&self, job: &JobDescriptor) -> Result<Script, StageError> {
        info!(stage = %Stage::Script, "Generating script");

        let script = self
            .collaborators
            .scripts
            .generate(&job.prompt, job.style)
            .await
            .map_err(StageError::collaborator)?;

        script.validate(self.config.duration_band)?;

        let total = script.total_duration();
        if !script.duration_in_band() {
            warn!(
                total_secs = total,
                "Script duration is outside the ideal range"
            );
        }

        info!(
            title = %script.title,
            slides = script.slides.len(),
            total_secs = total,
            "Script generated"
        );
        Ok(script)
    }

    async fn image_stage(
        &self,
        workspace: &Workspace,
        script: &Script,
    ) -> Result<Vec<PathBuf>, StageError> {
        let count = script.slides.len();
        info!(stage = %Stage::Images, count, "Generating images");

        let mut paths = Vec::with_capacity(count);
        for (index, slide) in script.slides.iter().enumerate() {
            let bytes = self
                .collaborators
                .images
                .generate(&slide.image_prompt)
                .await
                .map_err(|e| StageError::collaborator(e.context(format!("slide {}", index + 1))))?;

            if bytes.is_empty() {
                return Err(StageError::collaborator(anyhow!(
                    "image generator returned an empty payload for slide {}",
                    index + 1
                )));
            }

            let path = workspace.image_path(index);
            tokio::fs::write(&path, &bytes).await?;
            info!(slide = index + 1, total = count, "Image generated");
            paths.push(path);
        }

        Ok(paths)
    }

    async fn narration_stage(
        &self,
        workspace: &Workspace,
        script: &Script,
    ) -> Result<PathBuf, StageError> {
        info!(stage = %Stage::Narration, "Synthesizing narration");

        let path = workspace.narration_path();
        self.collaborators
            .narrator
            .narrate(script, &path)
            .await
            .map_err(StageError::collaborator)?;

        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.len() > 0 => Ok(path),
            _ => Err(StageError::postcondition(format!(
                "narrator reported success but {} is missing or empty",
                path.display()
            ))),
        }
    }

    async fn assembly_stage(
        &self,
        workspace: &Workspace,
        script: &Script,
        images: &[PathBuf],
        narration: &Path,
    ) -> Result<AssembledVideo, StageError> {
        info!(stage = %Stage::Assembly, "Assembling video");

        let video = self
            .collaborators
            .assembler
            .assemble(workspace, images, &script.durations(), narration)
            .await?;

        info!(
            video_secs = video.duration,
            timeline_secs = video.timeline_duration,
            size_bytes = video.size_bytes,
            "Video assembled"
        );
        Ok(video)
    }

    async fn upload_stage(
        &self,
        job_id: Uuid,
        video: &AssembledVideo,
    ) -> Result<UploadedArtifacts, StageError> {
        info!(stage = %Stage::Upload, "Uploading artifacts");

        let uploaded = self
            .collaborators
            .uploader
            .upload(job_id, &video.video_path, &video.thumbnail_path)
            .await
            .map_err(StageError::collaborator)?;

        info!(video_url = %uploaded.video_url, "Artifacts uploaded");
        Ok(uploaded)
    }

    /// Log the failure and move the job to `failed`, retrying the write once.
    async fn record_failure(&self, job_id: Uuid, err: PipelineError) -> PipelineError {
        if let PipelineError::Stage {
            source: StageError::Media(media),
            ..
        } = &err
        {
            if let Some(stderr) = media.stderr() {
                error!(stderr = %stderr, "Muxer diagnostics");
            }
        }
        error!(kind = ?err.kind(), error = %err, "Job failed");

        let first = match self.mark_failed(job_id).await {
            Ok(()) => return err,
            Err(e) => e,
        };
        warn!(error = %first, "Could not record job failure, retrying");
        tokio::time::sleep(FAILURE_WRITE_RETRY_DELAY).await;

        match self.mark_failed(job_id).await {
            Ok(()) => err,
            Err(e) => {
                error!(error = %e, "Job left at processing");
                PipelineError::FailureNotRecorded {
                    cause: Box::new(err),
                    error: anyhow::Error::new(e),
                }
            }
        }
    }

    async fn mark_failed(&self, job_id: Uuid) -> Result<(), StoreError> {
        match self
            .collaborators
            .store
            .update_status(job_id, JobStatus::Failed)
            .await
        {
            Err(StoreError::Rejected { current, .. }) if current.is_terminal() => Ok(()),
            other => other,
        }
    }

    async fn cleanup(&self, job_id: Uuid, succeeded: bool) {
        if !succeeded && self.config.cleanup == CleanupPolicy::RetainFailed {
            warn!("Keeping workspace of failed job for inspection");
            self.collaborators.workspaces.retain(job_id).await;
            return;
        }

        if let Err(e) = self.collaborators.workspaces.release(job_id).await {
            error!(error = %e, "Workspace cleanup failed");
        }
    }
}

fn store_error(err: StoreError) -> StageError {
    StageError::collaborator(anyhow::Error::new(err))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::ffmpeg::{MediaError, MediaResult};
    use crate::pipeline::error::ErrorKind;
    use crate::pipeline::job::VideoStyle;
    use crate::pipeline::script::sample_script;
    use crate::pipeline::workspace::WorkspaceManager;
    use async_trait::async_trait;
    use bytes::Bytes;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakeScripts {
        script: Script,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ScriptGenerator for FakeScripts {
        async fn generate(&self, _prompt: &str, _style: VideoStyle) -> anyhow::Result<Script> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.script.clone())
        }
    }

    #[derive(Default)]
    struct FakeImages {
        calls: AtomicUsize,
        fail_at: Option<usize>,
        empty: bool,
    }

    #[async_trait]
    impl ImageGenerator for FakeImages {
        async fn generate(&self, _image_prompt: &str) -> anyhow::Result<Bytes> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_at == Some(call) {
                anyhow::bail!("image service returned 503");
            }
            if self.empty {
                return Ok(Bytes::new());
            }
            Ok(Bytes::from_static(b"\xff\xd8\xff\xe0fake-jpeg"))
        }
    }

    #[derive(Default)]
    struct FakeNarrator {
        calls: AtomicUsize,
        delay: Option<Duration>,
    }

    #[async_trait]
    impl Narrator for FakeNarrator {
        async fn narrate(&self, _script: &Script, output: &Path) -> anyhow::Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            tokio::fs::write(output, b"ID3fake-audio").await?;
            Ok(())
        }
    }

    #[derive(Default)]
    struct FakeAssembler {
        calls: AtomicUsize,
        fail: bool,
        seen_durations: Mutex<Vec<f64>>,
    }

    #[async_trait]
    impl VideoAssembler for FakeAssembler {
        async fn assemble(
            &self,
            workspace: &Workspace,
            images: &[PathBuf],
            durations: &[f64],
            _narration: &Path,
        ) -> MediaResult<AssembledVideo> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.seen_durations.lock().unwrap() = durations.to_vec();
            if self.fail {
                return Err(MediaError::ffmpeg_failed(
                    "FFmpeg exited with non-zero status",
                    Some("concat_list.txt: Invalid data found".into()),
                    Some(1),
                ));
            }
            assert_eq!(images.len(), durations.len());
            tokio::fs::write(workspace.video_path(), b"mp4").await?;
            tokio::fs::write(workspace.thumbnail_path(), b"jpg").await?;
            Ok(AssembledVideo {
                video_path: workspace.video_path(),
                thumbnail_path: workspace.thumbnail_path(),
                duration: durations.iter().sum(),
                timeline_duration: durations.iter().sum(),
                size_bytes: 3,
            })
        }
    }

    #[derive(Default)]
    struct FakeUploader {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ArtifactUploader for FakeUploader {
        async fn upload(
            &self,
            job_id: Uuid,
            video: &Path,
            thumbnail: &Path,
        ) -> anyhow::Result<UploadedArtifacts> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            assert!(video.exists() && thumbnail.exists());
            Ok(UploadedArtifacts {
                video_url: format!("https://media.example.com/videos/{}.mp4", job_id),
                thumbnail_url: format!("https://media.example.com/thumbnails/{}.jpg", job_id),
            })
        }
    }

    #[derive(Default)]
    struct MemoryStore {
        statuses: Mutex<HashMap<Uuid, JobStatus>>,
        urls: Mutex<HashMap<Uuid, (String, String)>>,
        failed_write_errors: AtomicUsize,
    }

    impl MemoryStore {
        fn insert(&self, job_id: Uuid, status: JobStatus) {
            self.statuses.lock().unwrap().insert(job_id, status);
        }

        fn status(&self, job_id: Uuid) -> JobStatus {
            self.statuses.lock().unwrap()[&job_id]
        }

        fn transition(&self, job_id: Uuid, next: JobStatus) -> Result<(), StoreError> {
            let mut statuses = self.statuses.lock().unwrap();
            let current = *statuses.get(&job_id).ok_or(StoreError::NotFound(job_id))?;
            if !current.can_transition_to(next) {
                return Err(StoreError::Rejected {
                    job_id,
                    current,
                    requested: next,
                });
            }
            statuses.insert(job_id, next);
            Ok(())
        }
    }

    #[async_trait]
    impl JobStore for MemoryStore {
        async fn update_status(&self, job_id: Uuid, status: JobStatus) -> Result<(), StoreError> {
            if status == JobStatus::Failed
                && self
                    .failed_write_errors
                    .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                    .is_ok()
            {
                return Err(StoreError::Backend(anyhow::anyhow!("connection reset")));
            }
            self.transition(job_id, status)
        }

        async fn mark_completed(
            &self,
            job_id: Uuid,
            video_url: &str,
            thumbnail_url: &str,
        ) -> Result<(), StoreError> {
            self.transition(job_id, JobStatus::Done)?;
            self.urls
                .lock()
                .unwrap()
                .insert(job_id, (video_url.to_string(), thumbnail_url.to_string()));
            Ok(())
        }
    }

    struct CountingWorkspaces {
        inner: WorkspaceManager,
        acquires: AtomicUsize,
        releases: AtomicUsize,
        retains: AtomicUsize,
        fail_acquire: bool,
    }

    #[async_trait]
    impl WorkspaceProvider for CountingWorkspaces {
        async fn acquire(&self, job_id: Uuid) -> Result<Workspace, WorkspaceError> {
            self.acquires.fetch_add(1, Ordering::SeqCst);
            if self.fail_acquire {
                return Err(WorkspaceError::Create {
                    path: self.inner.dir_for(job_id),
                    source: std::io::Error::new(std::io::ErrorKind::StorageFull, "disk full"),
                });
            }
            self.inner.acquire(job_id).await
        }

        async fn release(&self, job_id: Uuid) -> Result<(), WorkspaceError> {
            self.releases.fetch_add(1, Ordering::SeqCst);
            self.inner.release(job_id).await
        }

        async fn retain(&self, job_id: Uuid) {
            self.retains.fetch_add(1, Ordering::SeqCst);
            self.inner.retain(job_id).await
        }
    }

    struct Harness {
        _root: tempfile::TempDir,
        scripts: Arc<FakeScripts>,
        images: Arc<FakeImages>,
        narrator: Arc<FakeNarrator>,
        assembler: Arc<FakeAssembler>,
        uploader: Arc<FakeUploader>,
        store: Arc<MemoryStore>,
        workspaces: Arc<CountingWorkspaces>,
        config: SequencerConfig,
    }

    impl Harness {
        fn new() -> Self {
            let root = tempfile::tempdir().unwrap();
            let inner = WorkspaceManager::new(root.path()).unwrap();
            Self {
                scripts: Arc::new(FakeScripts {
                    script: sample_script(10, 6.0),
                    calls: AtomicUsize::new(0),
                }),
                images: Arc::new(FakeImages::default()),
                narrator: Arc::new(FakeNarrator::default()),
                assembler: Arc::new(FakeAssembler::default()),
                uploader: Arc::new(FakeUploader::default()),
                store: Arc::new(MemoryStore::default()),
                workspaces: Arc::new(CountingWorkspaces {
                    inner,
                    acquires: AtomicUsize::new(0),
                    releases: AtomicUsize::new(0),
                    retains: AtomicUsize::new(0),
                    fail_acquire: false,
                }),
                config: SequencerConfig::default(),
                _root: root,
            }
        }

        fn sequencer(&self) -> Sequencer {
            Sequencer::new(
                Collaborators {
                    scripts: self.scripts.clone(),
                    images: self.images.clone(),
                    narrator: self.narrator.clone(),
                    assembler: self.assembler.clone(),
                    uploader: self.uploader.clone(),
                    store: self.store.clone(),
                    workspaces: self.workspaces.clone(),
                },
                self.config.clone(),
            )
        }

        fn queued_job(&self) -> JobDescriptor {
            let job = JobDescriptor {
                id: Uuid::new_v4(),
                prompt: "a calm ocean at sunset".to_string(),
                style: VideoStyle::Educational,
            };
            self.store.insert(job.id, JobStatus::Queued);
            job
        }

        fn releases(&self) -> usize {
            self.workspaces.releases.load(Ordering::SeqCst)
        }
    }

    fn calls(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }

    #[tokio::test]
    async fn test_successful_job_is_done_with_urls() {
        let h = Harness::new();
        let job = h.queued_job();

        let result = h.sequencer().run(&job).await.unwrap();

        assert_eq!(result.status, JobStatus::Done);
        assert_eq!(h.store.status(job.id), JobStatus::Done);
        let (video_url, thumbnail_url) = h.store.urls.lock().unwrap()[&job.id].clone();
        assert_eq!(video_url, result.video_url);
        assert_eq!(thumbnail_url, result.thumbnail_url);

        assert_eq!(calls(&h.images.calls), 10);
        assert_eq!(calls(&h.narrator.calls), 1);
        assert_eq!(*h.assembler.seen_durations.lock().unwrap(), vec![6.0; 10]);
        assert_eq!(h.releases(), 1);
        assert!(!h.workspaces.inner.dir_for(job.id).exists());
    }

    #[tokio::test]
    async fn test_wrong_slide_count_fails_before_any_image() {
        let mut h = Harness::new();
        h.scripts = Arc::new(FakeScripts {
            script: sample_script(9, 6.5),
            calls: AtomicUsize::new(0),
        });
        let job = h.queued_job();

        let err = h.sequencer().run(&job).await.unwrap_err();

        assert_eq!(err.failed_stage(), Some(Stage::Script));
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(calls(&h.images.calls), 0);
        assert_eq!(h.store.status(job.id), JobStatus::Failed);
        assert!(h.store.urls.lock().unwrap().is_empty());
        assert_eq!(h.releases(), 1);
    }

    #[tokio::test]
    async fn test_first_stage_error_stops_the_run() {
        let mut h = Harness::new();
        h.images = Arc::new(FakeImages {
            fail_at: Some(3),
            ..Default::default()
        });
        let job = h.queued_job();

        let err = h.sequencer().run(&job).await.unwrap_err();

        assert_eq!(err.failed_stage(), Some(Stage::Images));
        assert_eq!(err.kind(), ErrorKind::Collaborator);
        assert!(err.to_string().contains("slide 4"));
        assert_eq!(calls(&h.images.calls), 4);
        assert_eq!(calls(&h.narrator.calls), 0);
        assert_eq!(calls(&h.assembler.calls), 0);
        assert_eq!(h.store.status(job.id), JobStatus::Failed);
        assert_eq!(h.releases(), 1);
    }

    #[tokio::test]
    async fn test_empty_image_payload_is_a_failure() {
        let mut h = Harness::new();
        h.images = Arc::new(FakeImages {
            empty: true,
            ..Default::default()
        });
        let job = h.queued_job();

        let err = h.sequencer().run(&job).await.unwrap_err();
        assert_eq!(err.failed_stage(), Some(Stage::Images));
        assert_eq!(h.store.status(job.id), JobStatus::Failed);
    }

    #[tokio::test]
    async fn test_assembly_failure_records_no_urls() {
        let mut h = Harness::new();
        h.assembler = Arc::new(FakeAssembler {
            fail: true,
            ..Default::default()
        });
        let job = h.queued_job();

        let err = h.sequencer().run(&job).await.unwrap_err();

        assert_eq!(err.failed_stage(), Some(Stage::Assembly));
        assert!(err.to_string().contains("Invalid data found"));
        assert_eq!(calls(&h.uploader.calls), 0);
        assert_eq!(h.store.status(job.id), JobStatus::Failed);
        assert!(h.store.urls.lock().unwrap().is_empty());
        assert_eq!(h.releases(), 1);
    }

    #[tokio::test]
    async fn test_workspace_failure_skips_every_stage() {
        let mut h = Harness::new();
        let inner = h.workspaces.inner.clone();
        h.workspaces = Arc::new(CountingWorkspaces {
            inner,
            acquires: AtomicUsize::new(0),
            releases: AtomicUsize::new(0),
            retains: AtomicUsize::new(0),
            fail_acquire: true,
        });
        let job = h.queued_job();

        let err = h.sequencer().run(&job).await.unwrap_err();

        assert_eq!(err.failed_stage(), Some(Stage::Workspace));
        assert_eq!(err.kind(), ErrorKind::Resource);
        assert_eq!(calls(&h.scripts.calls), 0);
        assert_eq!(h.store.status(job.id), JobStatus::Failed);
        assert_eq!(h.releases(), 1);
    }

    #[tokio::test]
    async fn test_terminal_job_is_not_reprocessed() {
        let h = Harness::new();
        let job = h.queued_job();
        h.store.insert(job.id, JobStatus::Done);

        let err = h.sequencer().run(&job).await.unwrap_err();

        assert!(matches!(
            err,
            PipelineError::AlreadyTerminal {
                status: JobStatus::Done,
                ..
            }
        ));
        assert!(err.is_permanent());
        assert_eq!(calls(&h.scripts.calls), 0);
        assert_eq!(calls(&h.workspaces.acquires), 0);
        assert_eq!(h.store.status(job.id), JobStatus::Done);
    }

    #[tokio::test]
    async fn test_interrupted_job_can_be_redelivered() {
        let h = Harness::new();
        let job = h.queued_job();
        h.store.insert(job.id, JobStatus::Processing);

        // Leftovers from the interrupted attempt are overwritten.
        let stale = h.workspaces.inner.dir_for(job.id);
        tokio::fs::create_dir_all(&stale).await.unwrap();
        tokio::fs::write(stale.join("image_0.jpg"), b"stale").await.unwrap();

        let result = h.sequencer().run(&job).await.unwrap();
        assert_eq!(result.status, JobStatus::Done);
        assert_eq!(h.releases(), 1);
    }

    #[tokio::test]
    async fn test_job_timeout_force_fails() {
        let mut h = Harness::new();
        h.narrator = Arc::new(FakeNarrator {
            delay: Some(Duration::from_secs(30)),
            ..Default::default()
        });
        h.config.job_timeout = Duration::from_millis(100);
        let job = h.queued_job();

        let err = h.sequencer().run(&job).await.unwrap_err();

        assert!(matches!(err, PipelineError::TimedOut { .. }));
        assert_eq!(h.store.status(job.id), JobStatus::Failed);
        assert_eq!(calls(&h.assembler.calls), 0);
        assert_eq!(h.releases(), 1);
    }

    #[tokio::test]
    async fn test_retain_policy_keeps_failed_workspace() {
        let mut h = Harness::new();
        h.assembler = Arc::new(FakeAssembler {
            fail: true,
            ..Default::default()
        });
        h.config.cleanup = CleanupPolicy::RetainFailed;
        let job = h.queued_job();

        h.sequencer().run(&job).await.unwrap_err();

        assert_eq!(h.releases(), 0);
        assert_eq!(calls(&h.workspaces.retains), 1);
        assert!(h.workspaces.inner.dir_for(job.id).join("image_9.jpg").exists());
        // The retained directory does not block a later attempt.
        h.workspaces.inner.acquire(job.id).await.unwrap();
    }

    #[tokio::test]
    async fn test_strict_duration_band_rejects_short_script() {
        let mut h = Harness::new();
        h.scripts = Arc::new(FakeScripts {
            script: sample_script(10, 3.0),
            calls: AtomicUsize::new(0),
        });
        h.config.duration_band = DurationBand::Strict;
        let job = h.queued_job();

        let err = h.sequencer().run(&job).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(calls(&h.images.calls), 0);
    }

    #[tokio::test]
    async fn test_unknown_job_is_refused() {
        let h = Harness::new();
        let job = JobDescriptor {
            id: Uuid::new_v4(),
            prompt: "orphan".to_string(),
            style: VideoStyle::Meme,
        };

        let err = h.sequencer().run(&job).await.unwrap_err();
        assert!(matches!(err, PipelineError::JobNotFound { .. }));
        assert_eq!(calls(&h.workspaces.acquires), 0);
    }

    #[tokio::test]
    async fn test_concurrent_duplicate_is_refused_without_touching_the_live_run() {
        let mut h = Harness::new();
        h.narrator = Arc::new(FakeNarrator {
            delay: Some(Duration::from_millis(300)),
            ..Default::default()
        });
        let job = h.queued_job();
        let sequencer = h.sequencer();

        let (a, b) = tokio::join!(sequencer.run(&job), sequencer.run(&job));

        let (done, refused) = match (a, b) {
            (Ok(done), Err(refused)) | (Err(refused), Ok(done)) => (done, refused),
            (a, b) => panic!("expected one success and one refusal, got {:?} / {:?}", a, b),
        };
        assert_eq!(done.status, JobStatus::Done);
        assert!(matches!(refused, PipelineError::InFlight { job_id } if job_id == job.id));
        assert!(refused.is_permanent());

        assert_eq!(calls(&h.workspaces.acquires), 2);
        assert_eq!(calls(&h.scripts.calls), 1);
        assert_eq!(calls(&h.narrator.calls), 1);
        assert_eq!(h.releases(), 1);
        assert_eq!(h.store.status(job.id), JobStatus::Done);
    }

    #[tokio::test]
    async fn test_failure_write_is_retried_once() {
        let mut h = Harness::new();
        h.assembler = Arc::new(FakeAssembler {
            fail: true,
            ..Default::default()
        });
        let job = h.queued_job();
        h.store.failed_write_errors.store(1, Ordering::SeqCst);

        let err = h.sequencer().run(&job).await.unwrap_err();

        assert_eq!(err.failed_stage(), Some(Stage::Assembly));
        assert!(!err.left_processing());
        assert_eq!(h.store.status(job.id), JobStatus::Failed);
        assert_eq!(h.releases(), 1);
    }

    #[tokio::test]
    async fn test_unrecorded_failure_is_reported() {
        let mut h = Harness::new();
        h.assembler = Arc::new(FakeAssembler {
            fail: true,
            ..Default::default()
        });
        let job = h.queued_job();
        h.store.failed_write_errors.store(2, Ordering::SeqCst);

        let err = h.sequencer().run(&job).await.unwrap_err();

        assert!(err.left_processing());
        assert!(!err.is_permanent());
        assert_eq!(err.failed_stage(), Some(Stage::Assembly));
        assert_eq!(h.store.status(job.id), JobStatus::Processing);
        assert_eq!(h.releases(), 1);

        // The redelivery runs the job to a terminal state.
        h.assembler = Arc::new(FakeAssembler::default());
        let result = h.sequencer().run(&job).await.unwrap();
        assert_eq!(result.status, JobStatus::Done);
    }
}
