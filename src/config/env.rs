use std::env;
use std::str::FromStr;

pub enum EnvKey {
    ServerPort,
    AppRole,
    DatabaseUrl,
    RabbitMqUrl,
    VideoQueue,
    S3Endpoint,
    S3Bucket,
    S3Region,
    S3AccessKey,
    S3SecretKey,
    PublicMediaBaseUrl,
    OpenAiApiKey,
    OpenAiBaseUrl,
    ScriptModel,
    NarrationProvider,
    TtsModel,
    TtsVoice,
    NebiusApiKey,
    NebiusBaseUrl,
    ImageModel,
    WorkDir,
    WorkerConcurrency,
    JobTimeoutSecs,
    RequeueFailedJobs,
    ScriptStrictDuration,
    RetainFailedWorkspaces,
    FfmpegBin,
    FfprobeBin,
}

impl EnvKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnvKey::ServerPort => "APP_PORT",
            EnvKey::AppRole => "APP_ROLE",
            EnvKey::DatabaseUrl => "DATABASE_URL",
            EnvKey::RabbitMqUrl => "RABBITMQ_URL",
            EnvKey::VideoQueue => "VIDEO_QUEUE",
            EnvKey::S3Endpoint => "S3_ENDPOINT",
            EnvKey::S3Bucket => "S3_BUCKET",
            EnvKey::S3Region => "S3_REGION",
            EnvKey::S3AccessKey => "AWS_ACCESS_KEY_ID",
            EnvKey::S3SecretKey => "AWS_SECRET_ACCESS_KEY",
            EnvKey::PublicMediaBaseUrl => "PUBLIC_MEDIA_BASE_URL",
            EnvKey::OpenAiApiKey => "OPENAI_API_KEY",
            EnvKey::OpenAiBaseUrl => "OPENAI_BASE_URL",
            EnvKey::ScriptModel => "SCRIPT_MODEL",
            EnvKey::NarrationProvider => "NARRATION_PROVIDER",
            EnvKey::TtsModel => "TTS_MODEL",
            EnvKey::TtsVoice => "TTS_VOICE",
            EnvKey::NebiusApiKey => "NEBIUS_API_KEY",
            EnvKey::NebiusBaseUrl => "NEBIUS_BASE_URL",
            EnvKey::ImageModel => "IMAGE_MODEL",
            EnvKey::WorkDir => "WORK_DIR",
            EnvKey::WorkerConcurrency => "WORKER_CONCURRENCY",
            EnvKey::JobTimeoutSecs => "JOB_TIMEOUT_SECS",
            EnvKey::RequeueFailedJobs => "REQUEUE_FAILED_JOBS",
            EnvKey::ScriptStrictDuration => "SCRIPT_STRICT_DURATION",
            EnvKey::RetainFailedWorkspaces => "RETAIN_FAILED_WORKSPACES",
            EnvKey::FfmpegBin => "FFMPEG_BIN",
            EnvKey::FfprobeBin => "FFPROBE_BIN",
        }
    }
}

pub fn get(key: EnvKey) -> Result<String, env::VarError> {
    env::var(key.as_str())
}

pub fn get_or(key: EnvKey, default: &str) -> String {
    env::var(key.as_str()).unwrap_or_else(|_| default.to_string())
}

pub fn get_parsed<T: FromStr>(key: EnvKey, default: T) -> T {
    match get(key) {
        Ok(val) => val.parse::<T>().unwrap_or(default),
        Err(_) => default,
    }
}

/// Accepts `1/0`, `true/false`, `yes/no` and `on/off`.
pub fn get_flag(key: EnvKey, default: bool) -> bool {
    match get(key) {
        Ok(val) => parse_flag(&val).unwrap_or(default),
        Err(_) => default,
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_flag() {
        assert_eq!(parse_flag("TRUE"), Some(true));
        assert_eq!(parse_flag(" on "), Some(true));
        assert_eq!(parse_flag("0"), Some(false));
        assert_eq!(parse_flag("maybe"), None);
    }
}
