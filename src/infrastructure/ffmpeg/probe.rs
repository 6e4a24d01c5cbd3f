use serde::Deserialize;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

use super::error::{MediaError, MediaResult};

#[derive(Debug, Clone, PartialEq)]
pub struct MediaInfo {
    /// Container duration in seconds
    pub duration: f64,
    pub has_video: bool,
    pub has_audio: bool,
}

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    format: FfprobeFormat,
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: String,
}

#[derive(Debug, Clone)]
pub struct Prober {
    binary: String,
}

impl Default for Prober {
    fn default() -> Self {
        Self::new("ffprobe")
    }
}

impl Prober {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    pub async fn probe(&self, path: impl AsRef<Path>) -> MediaResult<MediaInfo> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(MediaError::MissingInput(path.to_path_buf()));
        }

        which::which(&self.binary).map_err(|_| MediaError::BinaryNotFound(self.binary.clone()))?;

        let output = Command::new(&self.binary)
            .args([
                "-v",
                "quiet",
                "-print_format",
                "json",
                "-show_format",
                "-show_streams",
            ])
            .arg(path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await?;

        if !output.status.success() {
            return Err(MediaError::FfprobeFailed {
                message: format!("FFprobe failed on {}", path.display()),
                stderr: Some(String::from_utf8_lossy(&output.stderr).to_string()),
            });
        }

        parse_probe_output(&output.stdout)
    }
}

fn parse_probe_output(raw: &[u8]) -> MediaResult<MediaInfo> {
    let probe: FfprobeOutput = serde_json::from_slice(raw)?;

    let duration = probe
        .format
        .duration
        .as_deref()
        .and_then(|d| d.parse::<f64>().ok())
        .unwrap_or(0.0);

    Ok(MediaInfo {
        duration,
        has_video: probe.streams.iter().any(|s| s.codec_type == "video"),
        has_audio: probe.streams.iter().any(|s| s.codec_type == "audio"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_probe_output() {
        let raw = br#"{
            "streams": [
                {"index": 0, "codec_type": "video", "codec_name": "h264"},
                {"index": 1, "codec_type": "audio", "codec_name": "aac"}
            ],
            "format": {"duration": "59.984000", "size": "4831022", "bit_rate": "644303"}
        }"#;

        let info = parse_probe_output(raw).unwrap();
        assert!((info.duration - 59.984).abs() < 1e-6);
        assert!(info.has_video && info.has_audio);
    }

    #[test]
    fn test_missing_duration_reads_as_zero() {
        let raw = br#"{"format": {}}"#;
        let info = parse_probe_output(raw).unwrap();
        assert_eq!(info.duration, 0.0);
        assert!(!info.has_video);
    }
}
