//! Concat-demuxer manifest for frame-accurate slideshows.
//!
//! The concat demuxer applies a `duration` directive to the entry it follows
//! but only knows where that entry ends once it sees the next one. The last
//! image is therefore listed a second time without a duration, otherwise it
//! would be shown for a single frame.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use crate::infrastructure::ffmpeg::{MediaError, MediaResult};

#[derive(Debug, Clone, PartialEq)]
pub struct ManifestEntry {
    pub path: PathBuf,
    pub duration: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConcatManifest {
    entries: Vec<ManifestEntry>,
}

impl ConcatManifest {
    /// Pair every image with its duration and append the trailing entry.
    ///
    /// Counts must match exactly; nothing is truncated or padded.
    pub fn build(images: &[PathBuf], durations: &[f64]) -> MediaResult<Self> {
        if images.len() != durations.len() {
            return Err(MediaError::CountMismatch {
                images: images.len(),
                durations: durations.len(),
            });
        }

        let Some(last) = images.last() else {
            return Err(MediaError::NoImages);
        };

        let mut entries = Vec::with_capacity(images.len() + 1);
        for (index, (path, &duration)) in images.iter().zip(durations).enumerate() {
            if !(duration.is_finite() && duration > 0.0) {
                return Err(MediaError::InvalidDuration { index, duration });
            }
            entries.push(ManifestEntry {
                path: path.clone(),
                duration: Some(duration),
            });
        }

        entries.push(ManifestEntry {
            path: last.clone(),
            duration: None,
        });

        Ok(Self { entries })
    }

    pub fn entries(&self) -> &[ManifestEntry] {
        &self.entries
    }

    /// Length of the visual timeline in seconds.
    pub fn timeline_duration(&self) -> f64 {
        self.entries.iter().filter_map(|e| e.duration).sum()
    }

    pub fn render(&self) -> String {
        let mut out = String::from("ffconcat version 1.0\n");
        for entry in &self.entries {
            let _ = writeln!(out, "file {}", quote_path(&entry.path));
            if let Some(duration) = entry.duration {
                // Shortest round-trip form, identical to what timeline_duration() sums.
                let _ = writeln!(out, "duration {}", duration);
            }
        }
        out
    }

    pub async fn write_to(&self, path: &Path) -> MediaResult<()> {
        tokio::fs::write(path, self.render()).await?;
        Ok(())
    }
}

/// Single-quote a path for the concat demuxer, escaping embedded quotes.
fn quote_path(path: &Path) -> String {
    let raw = path.to_string_lossy();
    format!("'{}'", raw.replace('\'', r"'\''"))
}
