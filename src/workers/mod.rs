pub mod video_worker;

use crate::config::settings::{AppConfig, NarrationProvider};
use crate::infrastructure::ai::{
    NebiusImageGenerator, OpenAiClient, OpenAiNarrator, OpenAiScriptGenerator, SilentNarrator,
};
use crate::infrastructure::db::pool::DbPool;
use crate::infrastructure::ffmpeg::{FfmpegRunner, Prober};
use crate::infrastructure::storage::s3::StorageService;
use crate::modules::video::repository::PgJobStore;
use crate::pipeline::assembly::{AssemblyEngine, AssemblySettings};
use crate::pipeline::collaborators::Narrator;
use crate::pipeline::script::DurationBand;
use crate::pipeline::sequencer::{CleanupPolicy, Collaborators, Sequencer, SequencerConfig};
use crate::pipeline::workspace::WorkspaceManager;
use anyhow::Result;
use std::sync::Arc;
use tracing::info;

/// Wire every collaborator the pipeline needs from configuration.
pub fn build_sequencer(config: &AppConfig, db: &DbPool) -> Result<Sequencer> {
    let worker = &config.worker;

    let runner = FfmpegRunner::new(&worker.ffmpeg_bin);
    let ffmpeg_path = runner.check()?;
    let prober = Prober::new(&worker.ffprobe_bin);
    info!("✅ Found FFmpeg at {}", ffmpeg_path.display());

    let openai = OpenAiClient::new(&worker.openai_base_url, &worker.openai_api_key)?;
    let nebius = OpenAiClient::new(&worker.nebius_base_url, &worker.nebius_api_key)?;

    let narrator: Arc<dyn Narrator> = match worker.narration {
        NarrationProvider::OpenAi => Arc::new(OpenAiNarrator::new(
            openai.clone(),
            &worker.tts_model,
            &worker.tts_voice,
        )),
        NarrationProvider::Silent => Arc::new(SilentNarrator::new(runner.clone())),
    };

    let storage = StorageService::new(
        &config.s3_endpoint,
        &config.s3_bucket,
        &config.s3_region,
        &config.s3_access_key,
        &config.s3_secret_key,
        &config.public_media_base_url,
    )?;

    let collaborators = Collaborators {
        scripts: Arc::new(OpenAiScriptGenerator::new(openai, &worker.script_model)),
        images: Arc::new(NebiusImageGenerator::new(nebius, &worker.image_model)),
        narrator,
        assembler: Arc::new(AssemblyEngine::new(
            runner,
            prober,
            AssemblySettings::default(),
        )),
        uploader: Arc::new(storage),
        store: Arc::new(PgJobStore::new(db.clone())),
        workspaces: Arc::new(WorkspaceManager::new(&worker.work_dir)?),
    };

    let sequencer_config = SequencerConfig {
        job_timeout: worker.job_timeout,
        duration_band: if worker.strict_duration {
            DurationBand::Strict
        } else {
            DurationBand::Warn
        },
        cleanup: if worker.retain_failed_workspaces {
            CleanupPolicy::RetainFailed
        } else {
            CleanupPolicy::Always
        },
    };

    Ok(Sequencer::new(collaborators, sequencer_config))
}
