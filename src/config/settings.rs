use crate::config::env::{self, EnvKey};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value '{value}' for {key}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Which halves of the service this process runs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AppRole {
    Api,
    Worker,
    All,
}

impl AppRole {
    pub fn serves_http(&self) -> bool {
        matches!(self, AppRole::Api | AppRole::All)
    }

    pub fn runs_worker(&self) -> bool {
        matches!(self, AppRole::Worker | AppRole::All)
    }
}

impl FromStr for AppRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "api" => Ok(AppRole::Api),
            "worker" => Ok(AppRole::Worker),
            "all" => Ok(AppRole::All),
            other => Err(format!("expected api, worker or all, got '{}'", other)),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NarrationProvider {
    OpenAi,
    Silent,
}

impl FromStr for NarrationProvider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(NarrationProvider::OpenAi),
            "silent" => Ok(NarrationProvider::Silent),
            other => Err(format!("expected openai or silent, got '{}'", other)),
        }
    }
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub server_port: u16,
    pub role: AppRole,
    pub database_url: String,
    pub rabbitmq_url: String,
    pub video_queue: String,
    pub s3_endpoint: String,
    pub s3_bucket: String,
    pub s3_region: String,
    pub s3_access_key: String,
    pub s3_secret_key: String,
    pub public_media_base_url: String,
    pub worker: WorkerConfig,
}

/// Settings only the pipeline worker reads.
#[derive(Clone, Debug)]
pub struct WorkerConfig {
    pub openai_api_key: String,
    pub openai_base_url: String,
    pub script_model: String,
    pub narration: NarrationProvider,
    pub tts_model: String,
    pub tts_voice: String,
    pub nebius_api_key: String,
    pub nebius_base_url: String,
    pub image_model: String,
    pub work_dir: PathBuf,
    pub concurrency: usize,
    pub job_timeout: Duration,
    pub requeue_failed_jobs: bool,
    pub strict_duration: bool,
    pub retain_failed_workspaces: bool,
    pub ffmpeg_bin: String,
    pub ffprobe_bin: String,
}

fn required(key: EnvKey) -> Result<String, ConfigError> {
    let name = key.as_str();
    match env::get(key) {
        Ok(val) if !val.trim().is_empty() => Ok(val),
        _ => Err(ConfigError::Missing(name)),
    }
}

fn parsed<T>(key: EnvKey, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: ToString,
{
    let name = key.as_str();
    let value = env::get_or(key, default);
    value.parse::<T>().map_err(|e| ConfigError::Invalid {
        key: name,
        value: value.clone(),
        reason: e.to_string(),
    })
}

impl AppConfig {
    pub fn new() -> Result<Self, ConfigError> {
        let role: AppRole = parsed(EnvKey::AppRole, "all")?;

        Ok(Self {
            server_port: env::get_parsed(EnvKey::ServerPort, 3000),
            role,
            database_url: required(EnvKey::DatabaseUrl)?,
            rabbitmq_url: required(EnvKey::RabbitMqUrl)?,
            video_queue: env::get_or(EnvKey::VideoQueue, "video_generation"),
            s3_endpoint: required(EnvKey::S3Endpoint)?,
            s3_bucket: required(EnvKey::S3Bucket)?,
            s3_region: env::get_or(EnvKey::S3Region, "auto"),
            s3_access_key: required(EnvKey::S3AccessKey)?,
            s3_secret_key: required(EnvKey::S3SecretKey)?,
            public_media_base_url: required(EnvKey::PublicMediaBaseUrl)?,
            worker: WorkerConfig::new(role.runs_worker())?,
        })
    }
}

impl WorkerConfig {
    /// API keys are only demanded when this process will run jobs.
    fn new(require_keys: bool) -> Result<Self, ConfigError> {
        let narration: NarrationProvider = parsed(EnvKey::NarrationProvider, "openai")?;

        let key = |k: EnvKey| {
            if require_keys {
                required(k)
            } else {
                Ok(env::get_or(k, ""))
            }
        };

        let job_timeout_secs: u64 = parsed(EnvKey::JobTimeoutSecs, "300")?;
        let concurrency: usize = parsed(EnvKey::WorkerConcurrency, "2")?;

        Ok(Self {
            openai_api_key: key(EnvKey::OpenAiApiKey)?,
            openai_base_url: env::get_or(EnvKey::OpenAiBaseUrl, "https://api.openai.com/v1"),
            script_model: env::get_or(EnvKey::ScriptModel, "gpt-4o-mini"),
            narration,
            tts_model: env::get_or(EnvKey::TtsModel, "tts-1"),
            tts_voice: env::get_or(EnvKey::TtsVoice, "alloy"),
            nebius_api_key: key(EnvKey::NebiusApiKey)?,
            nebius_base_url: env::get_or(
                EnvKey::NebiusBaseUrl,
                "https://api.studio.nebius.com/v1",
            ),
            image_model: env::get_or(EnvKey::ImageModel, "black-forest-labs/flux-schnell"),
            work_dir: env::get(EnvKey::WorkDir)
                .map(PathBuf::from)
                .unwrap_or_else(|_| std::env::temp_dir()),
            concurrency: concurrency.max(1),
            job_timeout: Duration::from_secs(job_timeout_secs.max(1)),
            requeue_failed_jobs: env::get_flag(EnvKey::RequeueFailedJobs, false),
            strict_duration: env::get_flag(EnvKey::ScriptStrictDuration, false),
            retain_failed_workspaces: env::get_flag(EnvKey::RetainFailedWorkspaces, false),
            ffmpeg_bin: env::get_or(EnvKey::FfmpegBin, "ffmpeg"),
            ffprobe_bin: env::get_or(EnvKey::FfprobeBin, "ffprobe"),
        })
    }
}
