//! Pipeline and logging configuration.

use std::path::Path;

use anyhow::Context as _;
use serde::{Deserialize, Serialize};

use crate::foundation::core::{Fps, MotionMode, TargetShape};
use crate::foundation::error::{AnimError, AnimResult};

/// Knobs for one orchestration run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Resolution every frame is fitted into before inference.
    pub target: TargetShape,

    /// Constant frame rate of the encoded output.
    pub fps: Fps,

    /// Motion transfer mode handed to the model.
    pub mode: MotionMode,

    /// Resample the driving clip to this many frames. `None` keeps the clip length.
    pub sync_frames: Option<usize>,

    /// Replace an existing output file.
    pub overwrite: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            target: TargetShape::MODEL_DEFAULT,
            fps: Fps::DEFAULT,
            mode: MotionMode::Relative,
            sync_frames: None,
            overwrite: true,
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> AnimResult<()> {
        self.target.validate()?;
        self.fps.validate()?;
        // yuv420p output needs even dimensions; fail before any decode or model work.
        if !self.target.width.is_multiple_of(2) || !self.target.height.is_multiple_of(2) {
            return Err(AnimError::validation(format!(
                "target {}x{} must have even width and height for yuv420p output",
                self.target.width, self.target.height
            )));
        }
        if self.sync_frames == Some(0) {
            return Err(AnimError::validation("sync_frames must be >= 1 when set"));
        }
        Ok(())
    }

    /// Load from a JSON file. Missing fields take their defaults.
    pub fn from_json_file(path: &Path) -> AnimResult<Self> {
        if !path.is_file() {
            return Err(AnimError::not_found(path));
        }
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("read config '{}'", path.display()))?;
        Self::from_json_str(&text)
            .map_err(|e| AnimError::validation(format!("config '{}': {e}", path.display())))
    }

    pub fn from_json_str(text: &str) -> AnimResult<Self> {
        let cfg: Self = serde_json::from_str(text)
            .map_err(|e| AnimError::validation(format!("invalid pipeline config: {e}")))?;
        cfg.validate()?;
        Ok(cfg)
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "animorph=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}
