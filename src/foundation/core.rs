use crate::foundation::error::{AnimError, AnimResult};

/// Fixed (height, width) every frame must have before it reaches inference.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct TargetShape {
    pub height: u32,
    pub width: u32,
}

impl TargetShape {
    /// Resolution the bundled motion-transfer checkpoints were trained at.
    pub const MODEL_DEFAULT: Self = Self {
        height: 256,
        width: 256,
    };

    pub fn new(height: u32, width: u32) -> AnimResult<Self> {
        let shape = Self { height, width };
        shape.validate()?;
        Ok(shape)
    }

    pub fn square(side: u32) -> AnimResult<Self> {
        Self::new(side, side)
    }

    pub fn validate(self) -> AnimResult<()> {
        if self.height == 0 || self.width == 0 {
            return Err(AnimError::validation(format!(
                "target shape must be non-zero, got {}x{}",
                self.width, self.height
            )));
        }
        Ok(())
    }
}

impl Default for TargetShape {
    fn default() -> Self {
        Self::MODEL_DEFAULT
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Fps {
    pub num: u32,
    pub den: u32, // must be > 0
}

impl Fps {
    pub const DEFAULT: Self = Self { num: 30, den: 1 };

    pub fn new(num: u32, den: u32) -> AnimResult<Self> {
        let fps = Self { num, den };
        fps.validate()?;
        Ok(fps)
    }

    pub fn validate(self) -> AnimResult<()> {
        if self.den == 0 {
            return Err(AnimError::validation("Fps den must be > 0"));
        }
        if self.num == 0 {
            return Err(AnimError::validation("Fps num must be > 0"));
        }
        Ok(())
    }

    pub fn as_f64(self) -> f64 {
        f64::from(self.num) / f64::from(self.den)
    }
}

impl Default for Fps {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// How driving-video motion is transferred onto the source frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MotionMode {
    /// Motion relative to the first driving frame.
    #[default]
    Relative,
    /// Keypoints taken in absolute coordinates.
    Absolute,
}

impl MotionMode {
    pub fn is_relative(self) -> bool {
        matches!(self, Self::Relative)
    }
}

/// Orchestration progress. `Failed` is reachable from every non-terminal stage.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Stage {
    #[default]
    Idle,
    LoadingSource,
    LoadingDriving,
    Normalizing,
    Inferring,
    Encoding,
    Done,
    Failed,
}

impl Stage {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::LoadingSource => "loading_source",
            Self::LoadingDriving => "loading_driving",
            Self::Normalizing => "normalizing",
            Self::Inferring => "inferring",
            Self::Encoding => "encoding",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
