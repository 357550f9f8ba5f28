use std::path::{Path, PathBuf};

use crate::{
    assets::{decode::load_source_image, media::decode_video},
    config::PipelineConfig,
    encode_ffmpeg::encode_video,
    foundation::core::{Fps, Stage, TargetShape},
    foundation::error::{AnimError, AnimResult},
    frame::{Domain, Frame, FrameSequence},
    geometry::normalize_geometry,
    inference::{InferenceRequest, InferenceService},
    sync::synchronize,
    value_range::{to_display_sequence, to_model_domain},
};

/// Summary of a successful [`Animator::generate`] run.
#[derive(Clone, Debug, PartialEq)]
pub struct GenerateReport {
    /// Source image size before normalization, `(width, height)`.
    pub source_dims: (u32, u32),
    /// Frames decoded from the driving video.
    pub driving_frames: usize,
    /// Frames written to the output video.
    pub output_frames: usize,
    pub output_path: PathBuf,
    pub fps: Fps,
}

/// Fit one decoded frame to `shape` and move it into the model domain.
pub fn prepare_frame(frame: &Frame, shape: TargetShape) -> AnimResult<Frame> {
    Ok(to_model_domain(normalize_geometry(frame, shape)?))
}

/// Fit every driving frame to `shape` and move it into the model domain, keeping order.
pub fn prepare_driving(frames: &FrameSequence, shape: TargetShape) -> AnimResult<FrameSequence> {
    frames
        .iter()
        .map(|f| prepare_frame(f, shape))
        .collect::<AnimResult<Vec<_>>>()
        .map(FrameSequence::from)
}

/// Model output back to encodable display-domain frames.
pub fn postprocess(frames: FrameSequence) -> FrameSequence {
    to_display_sequence(frames)
}

/// Runs source image + driving video through normalization, inference and encoding.
///
/// One animator drives one run at a time; each `generate` call starts from [`Stage::Idle`] and
/// ends in [`Stage::Done`] or [`Stage::Failed`]. A failed run never leaves an output file.
pub struct Animator<'a> {
    config: PipelineConfig,
    service: &'a mut dyn InferenceService,
    stage: Stage,
    failed_at: Option<Stage>,
}

impl<'a> Animator<'a> {
    pub fn new(config: PipelineConfig, service: &'a mut dyn InferenceService) -> AnimResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            service,
            stage: Stage::Idle,
            failed_at: None,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Stage that was active when the last run failed.
    pub fn failed_at(&self) -> Option<Stage> {
        self.failed_at
    }

    #[tracing::instrument(skip(self), fields(model = self.service.name()))]
    pub fn generate(
        &mut self,
        source_image_path: &Path,
        driving_video_path: &Path,
        output_path: &Path,
    ) -> AnimResult<GenerateReport> {
        self.stage = Stage::Idle;
        self.failed_at = None;

        match self.run(source_image_path, driving_video_path, output_path) {
            Ok(report) => {
                self.enter(Stage::Done);
                tracing::info!(
                    frames = report.output_frames,
                    out = %report.output_path.display(),
                    "video saved"
                );
                Ok(report)
            }
            Err(err) => {
                self.failed_at = Some(self.stage);
                tracing::error!(stage = %self.stage, kind = ?err.kind(), error = %err, "run failed");
                self.stage = Stage::Failed;
                Err(err)
            }
        }
    }

    fn enter(&mut self, stage: Stage) {
        tracing::debug!(from = %self.stage, to = %stage, "stage transition");
        self.stage = stage;
    }

    fn run(
        &mut self,
        source_image_path: &Path,
        driving_video_path: &Path,
        output_path: &Path,
    ) -> AnimResult<GenerateReport> {
        let target = self.config.target;
        if !self.config.overwrite && output_path.exists() {
            return Err(AnimError::validation(format!(
                "output file '{}' already exists",
                output_path.display()
            )));
        }

        self.enter(Stage::LoadingSource);
        let raw_source = load_source_image(source_image_path)?;
        let source_dims = raw_source.dimensions();
        let source = prepare_frame(&raw_source, target)?;
        drop(raw_source);

        self.enter(Stage::LoadingDriving);
        let raw_driving = decode_video(driving_video_path)?;
        if raw_driving.is_empty() {
            return Err(AnimError::empty_input("driving video contains no frames"));
        }
        let driving_frames = raw_driving.len();

        self.enter(Stage::Normalizing);
        let driving = prepare_driving(&raw_driving, target)?;
        drop(raw_driving);
        // Without an explicit frame budget this only re-validates the clip length.
        let sync_target = self.config.sync_frames.unwrap_or(driving.len());
        let driving = synchronize(&driving, sync_target)?;
        tracing::debug!(from = driving_frames, to = driving.len(), "driving clip synchronized");

        self.enter(Stage::Inferring);
        let request = InferenceRequest::new(source, driving, self.config.mode)?;
        let predictions = self.service.infer(&request).map_err(|e| match e {
            AnimError::Inference(_) => e,
            other => AnimError::inference(format!("{} model failed: {other}", self.service.name())),
        })?;
        check_predictions(&request, &predictions)?;
        drop(request);

        self.enter(Stage::Encoding);
        let output = postprocess(predictions);
        encode_video(&output, output_path, self.config.fps)?;

        Ok(GenerateReport {
            source_dims,
            driving_frames,
            output_frames: output.len(),
            output_path: output_path.to_path_buf(),
            fps: self.config.fps,
        })
    }
}

fn check_predictions(request: &InferenceRequest, predictions: &FrameSequence) -> AnimResult<()> {
    if predictions.len() != request.len() {
        return Err(AnimError::inference(format!(
            "model returned {} frames for {} driving frames",
            predictions.len(),
            request.len()
        )));
    }
    predictions
        .ensure_uniform(request.shape(), Domain::Model)
        .map_err(|e| AnimError::inference(format!("model output rejected: {e}")))
}

/// One-shot run with [`PipelineConfig::default`].
pub fn generate(
    source_image_path: &Path,
    driving_video_path: &Path,
    output_path: &Path,
    service: &mut dyn InferenceService,
) -> AnimResult<GenerateReport> {
    Animator::new(PipelineConfig::default(), service)?.generate(
        source_image_path,
        driving_video_path,
        output_path,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::core::MotionMode;
    use crate::inference::IdentityInference;

    struct DropLast;

    impl InferenceService for DropLast {
        fn infer(&mut self, request: &InferenceRequest) -> AnimResult<FrameSequence> {
            let mut frames = request.driving().clone().into_frames();
            frames.pop();
            Ok(frames.into())
        }

        fn name(&self) -> &str {
            "drop-last"
        }
    }

    fn driving_clip(n: u8) -> FrameSequence {
        (0..n).map(|i| Frame::filled(128, 128, [i * 20, 100, 200])).collect()
    }

    #[test]
    fn prepare_frame_produces_model_frame_of_target_shape() {
        let src = Frame::filled(128, 64, [255, 128, 0]);
        let out = prepare_frame(&src, TargetShape::MODEL_DEFAULT).unwrap();
        assert_eq!(out.domain(), Domain::Model);
        assert!(out.matches_shape(TargetShape::MODEL_DEFAULT));
        assert!(out.max_sample() <= 1.0);
    }

    #[test]
    fn prepare_driving_keeps_order_and_count() {
        let clip = driving_clip(5);
        let out = prepare_driving(&clip, TargetShape::MODEL_DEFAULT).unwrap();
        assert_eq!(out.len(), 5);
        out.ensure_uniform(TargetShape::MODEL_DEFAULT, Domain::Model).unwrap();
        let reds: Vec<u8> = postprocess(out)
            .iter()
            .map(|f| f.as_display().unwrap().get_pixel(128, 128).0[0])
            .collect();
        assert_eq!(reds, vec![0, 20, 40, 60, 80]);
    }

    #[test]
    fn mismatched_prediction_length_is_inference_error() {
        let shape = TargetShape::MODEL_DEFAULT;
        let source = prepare_frame(&Frame::filled(64, 64, [1, 2, 3]), shape).unwrap();
        let driving = prepare_driving(&driving_clip(3), shape).unwrap();
        let request = InferenceRequest::new(source, driving, MotionMode::Relative).unwrap();

        let ok = IdentityInference.infer(&request).unwrap();
        check_predictions(&request, &ok).unwrap();

        let short = DropLast.infer(&request).unwrap();
        assert!(matches!(
            check_predictions(&request, &short),
            Err(AnimError::Inference(_))
        ));
    }

    #[test]
    fn missing_source_fails_in_loading_source() {
        let mut svc = IdentityInference;
        let mut animator = Animator::new(PipelineConfig::default(), &mut svc).unwrap();
        let out = std::env::temp_dir().join("animorph_never_written.mp4");
        let err = animator
            .generate(Path::new("no/such/source.jpg"), Path::new("no/such/driving.mp4"), &out)
            .unwrap_err();
        assert!(matches!(err, AnimError::NotFound(_)));
        assert_eq!(animator.stage(), Stage::Failed);
        assert_eq!(animator.failed_at(), Some(Stage::LoadingSource));
        assert!(!out.exists());
    }

    #[test]
    fn invalid_config_is_rejected_up_front() {
        let mut svc = IdentityInference;
        let cfg = PipelineConfig {
            sync_frames: Some(0),
            ..PipelineConfig::default()
        };
        assert!(matches!(
            Animator::new(cfg, &mut svc),
            Err(AnimError::Validation(_))
        ));
    }
}
