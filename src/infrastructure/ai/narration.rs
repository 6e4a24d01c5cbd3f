use anyhow::{Result, anyhow};
use async_trait::async_trait;
use serde::Serialize;
use std::path::Path;
use tracing::info;

use super::client::OpenAiClient;
use crate::infrastructure::ffmpeg::{FfmpegCommand, FfmpegRunner};
use crate::pipeline::collaborators::Narrator;
use crate::pipeline::script::Script;

/// The speech endpoint rejects longer inputs.
const MAX_SPEECH_CHARS: usize = 4096;

#[derive(Debug, Serialize)]
struct SpeechRequest<'a> {
    model: &'a str,
    input: &'a str,
    voice: &'a str,
    response_format: &'static str,
}

/// Reads the whole script aloud with the OpenAI speech endpoint.
pub struct OpenAiNarrator {
    client: OpenAiClient,
    model: String,
    voice: String,
}

impl OpenAiNarrator {
    pub fn new(client: OpenAiClient, model: impl Into<String>, voice: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
            voice: voice.into(),
        }
    }
}

#[async_trait]
impl Narrator for OpenAiNarrator {
    async fn narrate(&self, script: &Script, output: &Path) -> Result<()> {
        let text = script.narration_text();
        if text.chars().count() > MAX_SPEECH_CHARS {
            return Err(anyhow!(
                "Narration is {} characters, the speech endpoint accepts at most {}",
                text.chars().count(),
                MAX_SPEECH_CHARS
            ));
        }

        let audio = self
            .client
            .post_bytes(
                "audio/speech",
                &SpeechRequest {
                    model: &self.model,
                    input: &text,
                    voice: &self.voice,
                    response_format: "mp3",
                },
            )
            .await?;

        if audio.is_empty() {
            return Err(anyhow!("Speech endpoint returned no audio"));
        }

        tokio::fs::write(output, &audio).await?;
        info!(bytes = audio.len(), voice = %self.voice, "Narration synthesized");
        Ok(())
    }
}

/// Produces a silent track as long as the script, for running without a speech provider.
pub struct SilentNarrator {
    runner: FfmpegRunner,
}

impl SilentNarrator {
    pub fn new(runner: FfmpegRunner) -> Self {
        Self { runner }
    }

    fn command(script: &Script, output: &Path) -> FfmpegCommand {
        FfmpegCommand::new(output)
            .input_with(["-f", "lavfi"], "anullsrc=r=44100:cl=stereo")
            .output_arg("-t")
            .output_arg(format!("{:.3}", script.total_duration()))
            .audio_codec("libmp3lame")
            .output_args(["-q:a", "9"])
    }
}

#[async_trait]
impl Narrator for SilentNarrator {
    async fn narrate(&self, script: &Script, output: &Path) -> Result<()> {
        self.runner.run(&Self::command(script, output)).await?;
        info!(
            secs = script.total_duration(),
            "Silent narration generated"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::script::sample_script;

    #[test]
    fn test_silent_track_matches_script_length() {
        let script = sample_script(10, 6.0);
        let args = SilentNarrator::command(&script, Path::new("/w/narration.mp3")).build_args();

        let joined = args.join(" ");
        assert!(joined.contains("-f lavfi -i anullsrc=r=44100:cl=stereo"));
        assert!(joined.contains("-t 60.000"));
        assert!(joined.contains("libmp3lame"));
        assert_eq!(args.last().map(String::as_str), Some("/w/narration.mp3"));
    }

    #[tokio::test]
    #[ignore = "needs ffmpeg on PATH"]
    async fn test_silent_narrator_writes_audio() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("narration.mp3");
        let narrator = SilentNarrator::new(FfmpegRunner::default());

        narrator
            .narrate(&sample_script(2, 1.5), &output)
            .await
            .unwrap();

        assert!(tokio::fs::metadata(&output).await.unwrap().len() > 0);
    }

    #[tokio::test]
    async fn test_overlong_narration_is_refused_before_any_request() {
        let client = OpenAiClient::new("http://127.0.0.1:9", "key").unwrap();
        let narrator = OpenAiNarrator::new(client, "tts-1", "alloy");
        let mut script = sample_script(10, 6.0);
        script.slides[0].narration = "word ".repeat(1000);

        let dir = tempfile::tempdir().unwrap();
        let err = narrator
            .narrate(&script, &dir.path().join("narration.mp3"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("at most 4096"));
    }
}
