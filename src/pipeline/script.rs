use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const SLIDE_COUNT: usize = 10;
pub const TARGET_DURATION_SECS: f64 = 60.0;
pub const MIN_TOTAL_DURATION_SECS: f64 = 55.0;
pub const MAX_TOTAL_DURATION_SECS: f64 = 65.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Slide {
    pub narration: String,
    pub image_prompt: String,
    pub duration: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Script {
    pub title: String,
    pub slides: Vec<Slide>,
}

#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("expected {expected} slides, got {actual}")]
    SlideCount { expected: usize, actual: usize },

    #[error("slide {index} is missing narration")]
    MissingNarration { index: usize },

    #[error("slide {index} is missing an image prompt")]
    MissingImagePrompt { index: usize },

    #[error("slide {index} has invalid duration {duration}")]
    InvalidDuration { index: usize, duration: f64 },

    #[error(
        "total duration {total:.2}s is outside the accepted range ({}-{}s)",
        MIN_TOTAL_DURATION_SECS,
        MAX_TOTAL_DURATION_SECS
    )]
    TotalDurationOutOfBand { total: f64 },
}

/// How an out-of-band duration total is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DurationBand {
    #[default]
    Warn,
    Strict,
}

impl Script {
    pub fn durations(&self) -> Vec<f64> {
        self.slides.iter().map(|s| s.duration).collect()
    }

    pub fn total_duration(&self) -> f64 {
        self.slides.iter().map(|s| s.duration).sum()
    }

    /// Narrations joined in slide order, as spoken by the narrator.
    pub fn narration_text(&self) -> String {
        self.slides
            .iter()
            .map(|s| s.narration.trim())
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn duration_in_band(&self) -> bool {
        let total = self.total_duration();
        (MIN_TOTAL_DURATION_SECS..=MAX_TOTAL_DURATION_SECS).contains(&total)
    }

    /// Structural checks applied before any image is generated.
    ///
    /// Per-slide problems are always fatal. The duration band only fails
    /// the script in `DurationBand::Strict`; callers log it otherwise.
    pub fn validate(&self, band: DurationBand) -> Result<(), ValidationError> {
        if self.slides.len() != SLIDE_COUNT {
            return Err(ValidationError::SlideCount {
                expected: SLIDE_COUNT,
                actual: self.slides.len(),
            });
        }

        for (index, slide) in self.slides.iter().enumerate() {
            if slide.narration.trim().is_empty() {
                return Err(ValidationError::MissingNarration { index });
            }
            if slide.image_prompt.trim().is_empty() {
                return Err(ValidationError::MissingImagePrompt { index });
            }
            if !(slide.duration.is_finite() && slide.duration > 0.0) {
                return Err(ValidationError::InvalidDuration {
                    index,
                    duration: slide.duration,
                });
            }
        }

        if band == DurationBand::Strict && !self.duration_in_band() {
            return Err(ValidationError::TotalDurationOutOfBand {
                total: self.total_duration(),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
pub(crate) fn sample_script(slides: usize, duration: f64) -> Script {
    Script {
        title: "The Ocean at Dusk".to_string(),
        slides: (0..slides)
            .map(|i| Slide {
                narration: format!("Narration for slide {}", i + 1),
                image_prompt: format!("A wide shot of the sea, frame {}", i + 1),
                duration,
            })
            .collect(),
    }
}
