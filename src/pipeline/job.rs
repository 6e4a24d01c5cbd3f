use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;
use uuid::Uuid;

use super::status::JobStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub enum VideoStyle {
    Educational,
    Storytelling,
    Meme,
}

impl VideoStyle {
    pub fn as_str(&self) -> &'static str {
        match self {
            VideoStyle::Educational => "Educational",
            VideoStyle::Storytelling => "Storytelling",
            VideoStyle::Meme => "Meme",
        }
    }
}

impl fmt::Display for VideoStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VideoStyle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Educational" => Ok(VideoStyle::Educational),
            "Storytelling" => Ok(VideoStyle::Storytelling),
            "Meme" => Ok(VideoStyle::Meme),
            other => Err(format!(
                "invalid style '{}', must be Educational, Storytelling, or Meme",
                other
            )),
        }
    }
}

/// Message published to the video queue for every submitted job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobDescriptor {
    pub id: Uuid,
    pub prompt: String,
    pub style: VideoStyle,
}

/// Outcome of a successful pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobResult {
    pub job_id: Uuid,
    pub status: JobStatus,
    pub video_url: String,
    pub thumbnail_url: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_wire_format() {
        let raw = r#"{"id":"6f1c2a4e-8f5e-4a43-9d2a-0b7e3c1d9e11","prompt":"a calm ocean at sunset","style":"Educational"}"#;
        let job: JobDescriptor = serde_json::from_str(raw).unwrap();

        assert_eq!(job.style, VideoStyle::Educational);
        assert_eq!(job.prompt, "a calm ocean at sunset");
    }

    #[test]
    fn test_unknown_style_is_rejected() {
        let raw = r#"{"id":"6f1c2a4e-8f5e-4a43-9d2a-0b7e3c1d9e11","prompt":"x","style":"Documentary"}"#;
        assert!(serde_json::from_str::<JobDescriptor>(raw).is_err());
        assert!(VideoStyle::from_str("meme").is_err());
    }
}
