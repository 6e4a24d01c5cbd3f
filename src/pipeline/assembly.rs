use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use super::manifest::ConcatManifest;
use super::workspace::Workspace;
use crate::infrastructure::ffmpeg::{FfmpegCommand, FfmpegRunner, MediaError, MediaResult, Prober};

/// Tolerance before a shorter output is reported as truncated.
const TRUNCATION_TOLERANCE_SECS: f64 = 0.5;

#[derive(Debug, Clone)]
pub struct AssemblySettings {
    pub video_codec: String,
    pub preset: String,
    pub crf: u8,
    pub pixel_format: String,
    pub audio_codec: String,
    pub audio_bitrate: String,
    /// Seek offset for the thumbnail frame, in seconds
    pub thumbnail_offset: f64,
    pub thumbnail_width: u32,
    pub thumbnail_height: u32,
}

impl Default for AssemblySettings {
    fn default() -> Self {
        Self {
            video_codec: "libx264".to_string(),
            preset: "medium".to_string(),
            crf: 23,
            pixel_format: "yuv420p".to_string(),
            audio_codec: "aac".to_string(),
            audio_bitrate: "192k".to_string(),
            thumbnail_offset: 1.0,
            thumbnail_width: 1280,
            thumbnail_height: 720,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AssembledVideo {
    pub video_path: PathBuf,
    pub thumbnail_path: PathBuf,
    /// Duration of the muxed file as reported by ffprobe
    pub duration: f64,
    /// Sum of the slide durations
    pub timeline_duration: f64,
    pub size_bytes: u64,
}

#[async_trait]
pub trait VideoAssembler: Send + Sync {
    async fn assemble(
        &self,
        workspace: &Workspace,
        images: &[PathBuf],
        durations: &[f64],
        narration: &Path,
    ) -> MediaResult<AssembledVideo>;
}

/// Stitches slide images against a narration track with FFmpeg.
#[derive(Debug, Clone, Default)]
pub struct AssemblyEngine {
    runner: FfmpegRunner,
    prober: Prober,
    settings: AssemblySettings,
}

impl AssemblyEngine {
    pub fn new(runner: FfmpegRunner, prober: Prober, settings: AssemblySettings) -> Self {
        Self {
            runner,
            prober,
            settings,
        }
    }

    fn mux_command(&self, manifest: &Path, narration: &Path, output: &Path) -> FfmpegCommand {
        let s = &self.settings;

        FfmpegCommand::new(output)
            .input_with(["-f", "concat", "-safe", "0"], manifest)
            .input(narration)
            .output_args(["-map", "0:v:0", "-map", "1:a:0"])
            .output_args(["-vsync", "vfr"])
            // libx264 rejects odd frame sizes
            .video_filter("scale=trunc(iw/2)*2:trunc(ih/2)*2")
            .pixel_format(&s.pixel_format)
            .video_codec(&s.video_codec)
            .preset(&s.preset)
            .crf(s.crf)
            .audio_codec(&s.audio_codec)
            .audio_bitrate(&s.audio_bitrate)
            .shortest()
    }

    fn thumbnail_command(&self, video: &Path, output: &Path) -> FfmpegCommand {
        let s = &self.settings;

        FfmpegCommand::new(output)
            .input_with(["-ss".to_string(), format!("{:.3}", s.thumbnail_offset)], video)
            .single_frame()
            .video_filter(format!("scale={}:{}", s.thumbnail_width, s.thumbnail_height))
            .output_args(["-q:v", "2"])
    }

    /// Grab one frame at the configured offset.
    ///
    /// `video_duration` comes from probing the finished file; a video shorter
    /// than the offset is an error rather than an empty or black frame.
    pub async fn extract_thumbnail(
        &self,
        video: &Path,
        video_duration: f64,
        output: &Path,
    ) -> MediaResult<()> {
        let offset = self.settings.thumbnail_offset;
        if video_duration < offset {
            return Err(MediaError::VideoTooShort {
                duration: video_duration,
                offset,
            });
        }

        self.runner.run(&self.thumbnail_command(video, output)).await?;
        ensure_non_empty(output).await?;
        Ok(())
    }
}

#[async_trait]
impl VideoAssembler for AssemblyEngine {
    async fn assemble(
        &self,
        workspace: &Workspace,
        images: &[PathBuf],
        durations: &[f64],
        narration: &Path,
    ) -> MediaResult<AssembledVideo> {
        let manifest = ConcatManifest::build(images, durations)?;

        for input in images.iter().map(PathBuf::as_path).chain([narration]) {
            if !tokio::fs::try_exists(input).await? {
                return Err(MediaError::MissingInput(input.to_path_buf()));
            }
        }

        let manifest_path = workspace.manifest_path();
        let video_path = workspace.video_path();
        let thumbnail_path = workspace.thumbnail_path();

        manifest.write_to(&manifest_path).await?;

        info!(
            job_id = %workspace.job_id(),
            images = images.len(),
            entries = manifest.entries().len(),
            timeline_secs = manifest.timeline_duration(),
            "Stitching video"
        );

        self.runner
            .run(&self.mux_command(&manifest_path, narration, &video_path))
            .await?;

        let size_bytes = ensure_non_empty(&video_path).await?;
        let info = self.prober.probe(&video_path).await?;
        if !info.has_video {
            return Err(MediaError::EmptyOutput(video_path));
        }
        if !info.has_audio {
            warn!(job_id = %workspace.job_id(), "Output has no audio stream");
        }
        let duration = info.duration;
        let timeline_duration = manifest.timeline_duration();

        if duration + TRUNCATION_TOLERANCE_SECS < timeline_duration {
            warn!(
                job_id = %workspace.job_id(),
                video_secs = duration,
                timeline_secs = timeline_duration,
                "Output truncated to the narration length"
            );
        }

        self.extract_thumbnail(&video_path, duration, &thumbnail_path)
            .await?;

        info!(
            job_id = %workspace.job_id(),
            duration_secs = duration,
            size_mb = size_bytes as f64 / (1024.0 * 1024.0),
            "Video created"
        );

        Ok(AssembledVideo {
            video_path,
            thumbnail_path,
            duration,
            timeline_duration,
            size_bytes,
        })
    }
}

async fn ensure_non_empty(path: &Path) -> MediaResult<u64> {
    match tokio::fs::metadata(path).await {
        Ok(meta) if meta.len() > 0 => Ok(meta.len()),
        Ok(_) => Err(MediaError::EmptyOutput(path.to_path_buf())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(MediaError::EmptyOutput(path.to_path_buf()))
        }
        Err(e) => Err(e.into()),
    }
}
