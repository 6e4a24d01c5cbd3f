use async_trait::async_trait;
use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

const DIR_PREFIX: &str = "keyframe_job_";

#[derive(Debug, Error)]
pub enum WorkspaceError {
    #[error("workspace root {0} must be an absolute path")]
    RelativeRoot(PathBuf),

    #[error("job {0} already has a live workspace")]
    Busy(Uuid),

    #[error("failed to create workspace {path}: {source}")]
    Create {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to remove workspace {path}: {source}")]
    Remove {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Scratch directory owned by a single job.
///
/// Every artifact path is derived here so stages never assemble paths
/// from strings themselves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workspace {
    job_id: Uuid,
    dir: PathBuf,
    image_extension: String,
}

impl Workspace {
    pub fn job_id(&self) -> Uuid {
        self.job_id
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn image_path(&self, index: usize) -> PathBuf {
        self.dir
            .join(format!("image_{}.{}", index, self.image_extension))
    }

    pub fn narration_path(&self) -> PathBuf {
        self.dir.join("narration.mp3")
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.dir.join("concat_list.txt")
    }

    pub fn video_path(&self) -> PathBuf {
        self.dir.join("final_video.mp4")
    }

    pub fn thumbnail_path(&self) -> PathBuf {
        self.dir.join("thumbnail.jpg")
    }
}

#[async_trait]
pub trait WorkspaceProvider: Send + Sync {
    /// Create the job directory if needed and take the job's lease.
    ///
    /// Fails with [`WorkspaceError::Busy`] while another attempt holds the lease.
    /// A directory left behind by a dead process is reused as is.
    async fn acquire(&self, job_id: Uuid) -> Result<Workspace, WorkspaceError>;

    /// Remove the job directory and drop the lease. A missing directory is not an error.
    async fn release(&self, job_id: Uuid) -> Result<(), WorkspaceError>;

    /// Drop the lease but keep the directory on disk.
    async fn retain(&self, job_id: Uuid);
}

#[derive(Debug, Clone)]
pub struct WorkspaceManager {
    root: PathBuf,
    image_extension: String,
    live: Arc<Mutex<HashSet<Uuid>>>,
}

impl WorkspaceManager {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, WorkspaceError> {
        let root = root.into();
        if !root.is_absolute() {
            return Err(WorkspaceError::RelativeRoot(root));
        }

        Ok(Self {
            root,
            image_extension: "jpg".to_string(),
            live: Arc::new(Mutex::new(HashSet::new())),
        })
    }

    fn live_ids(&self) -> MutexGuard<'_, HashSet<Uuid>> {
        self.live.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn dir_for(&self, job_id: Uuid) -> PathBuf {
        self.root.join(format!("{}{}", DIR_PREFIX, job_id))
    }

    fn workspace(&self, job_id: Uuid) -> Workspace {
        Workspace {
            job_id,
            dir: self.dir_for(job_id),
            image_extension: self.image_extension.clone(),
        }
    }
}

#[async_trait]
impl WorkspaceProvider for WorkspaceManager {
    async fn acquire(&self, job_id: Uuid) -> Result<Workspace, WorkspaceError> {
        if !self.live_ids().insert(job_id) {
            return Err(WorkspaceError::Busy(job_id));
        }

        let workspace = self.workspace(job_id);
        if let Err(source) = tokio::fs::create_dir_all(workspace.dir()).await {
            self.live_ids().remove(&job_id);
            return Err(WorkspaceError::Create {
                path: workspace.dir().to_path_buf(),
                source,
            });
        }

        debug!(job_id = %job_id, path = %workspace.dir().display(), "Workspace acquired");
        Ok(workspace)
    }

    async fn release(&self, job_id: Uuid) -> Result<(), WorkspaceError> {
        self.live_ids().remove(&job_id);
        let dir = self.dir_for(job_id);

        match tokio::fs::remove_dir_all(&dir).await {
            Ok(()) => {
                info!(job_id = %job_id, "Cleaned up workspace");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(WorkspaceError::Remove { path: dir, source }),
        }
    }

    async fn retain(&self, job_id: Uuid) {
        self.live_ids().remove(&job_id);
        info!(job_id = %job_id, path = %self.dir_for(job_id).display(), "Workspace retained");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_leftover_directory_is_reused() {
        let root = tempfile::tempdir().unwrap();
        let manager = WorkspaceManager::new(root.path()).unwrap();
        let job_id = Uuid::new_v4();

        let dir = manager.dir_for(job_id);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("image_0.jpg"), b"partial").unwrap();

        let workspace = manager.acquire(job_id).await.unwrap();
        assert_eq!(workspace.dir(), dir);
        assert!(workspace.image_path(0).exists());
    }

    #[tokio::test]
    async fn test_second_acquire_is_busy_until_released() {
        let root = tempfile::tempdir().unwrap();
        let manager = WorkspaceManager::new(root.path()).unwrap();
        let shared = manager.clone();
        let job_id = Uuid::new_v4();

        let first = manager.acquire(job_id).await.unwrap();
        tokio::fs::write(first.image_path(0), b"in progress").await.unwrap();

        let err = shared.acquire(job_id).await.unwrap_err();
        assert!(matches!(err, WorkspaceError::Busy(id) if id == job_id));
        assert!(first.image_path(0).exists());

        manager.release(job_id).await.unwrap();
        shared.acquire(job_id).await.unwrap();
    }

    #[tokio::test]
    async fn test_retain_keeps_files_and_frees_the_lease() {
        let root = tempfile::tempdir().unwrap();
        let manager = WorkspaceManager::new(root.path()).unwrap();
        let job_id = Uuid::new_v4();

        let workspace = manager.acquire(job_id).await.unwrap();
        tokio::fs::write(workspace.video_path(), b"video").await.unwrap();
        manager.retain(job_id).await;

        assert!(workspace.video_path().exists());
        manager.acquire(job_id).await.unwrap();
    }

    #[tokio::test]
    async fn test_release_tolerates_missing_directory() {
        let root = tempfile::tempdir().unwrap();
        let manager = WorkspaceManager::new(root.path()).unwrap();
        let job_id = Uuid::new_v4();

        manager.release(job_id).await.unwrap();

        let workspace = manager.acquire(job_id).await.unwrap();
        tokio::fs::write(workspace.video_path(), b"video").await.unwrap();
        manager.release(job_id).await.unwrap();
        assert!(!workspace.dir().exists());

        manager.release(job_id).await.unwrap();
    }

    #[tokio::test]
    async fn test_artifacts_are_scoped_to_job_directory() {
        let root = tempfile::tempdir().unwrap();
        let manager = WorkspaceManager::new(root.path()).unwrap();
        let a = manager.acquire(Uuid::new_v4()).await.unwrap();
        let b = manager.acquire(Uuid::new_v4()).await.unwrap();

        assert_ne!(a.dir(), b.dir());
        for path in [
            a.image_path(9),
            a.narration_path(),
            a.manifest_path(),
            a.video_path(),
            a.thumbnail_path(),
        ] {
            assert_eq!(path.parent(), Some(a.dir()));
        }
        assert!(a.image_path(3).ends_with("image_3.jpg"));
        assert!(a.video_path().ends_with("final_video.mp4"));
    }

    #[tokio::test]
    async fn test_acquire_fails_when_root_is_a_file() {
        let root = tempfile::tempdir().unwrap();
        let blocker = root.path().join("not-a-dir");
        std::fs::write(&blocker, b"x").unwrap();

        let manager = WorkspaceManager::new(&blocker).unwrap();
        let job_id = Uuid::new_v4();
        let err = manager.acquire(job_id).await.unwrap_err();
        assert!(matches!(err, WorkspaceError::Create { .. }));

        // A failed create does not leave the lease behind.
        let err = manager.acquire(job_id).await.unwrap_err();
        assert!(matches!(err, WorkspaceError::Create { .. }));
    }

    #[test]
    fn test_relative_root_rejected() {
        assert!(matches!(
            WorkspaceManager::new("tmp/jobs"),
            Err(WorkspaceError::RelativeRoot(_))
        ));
    }
}
