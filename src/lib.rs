//! Animorph prepares inputs for a motion-transfer animation model and turns its output back
//! into a playable video.
//!
//! # Pipeline overview
//!
//! 1. **Load**: source image via `image`, driving video via the system `ffmpeg`/`ffprobe`
//! 2. **Normalize**: aspect-preserving fit into the model resolution, then `[0, 1]` floats
//! 3. **Synchronize**: nearest-index temporal resampling of the driving clip
//! 4. **Infer**: an injected [`InferenceService`] animates the source frame
//! 5. **Encode**: back to 8-bit RGB and into an H.264 MP4 at a constant frame rate
//!
//! Every stage reports failures through [`AnimError`]; a failed run writes no output file.
#![forbid(unsafe_code)]

mod assets;
mod config;
mod encode_ffmpeg;
mod foundation;
mod frame;
mod geometry;
mod inference;
mod pipeline;
mod sync;
mod value_range;

pub use assets::decode::{decode_image, load_source_image};
pub use assets::media::{
    VideoSourceInfo, decode_video, ffmpeg_tools_available, probe_video, split_rgb24_frames,
};
pub use config::{LoggingConfig, PipelineConfig};
pub use encode_ffmpeg::{
    EncodeConfig, FfmpegEncoder, default_mp4_config, encode_video, ensure_parent_dir,
    is_ffmpeg_on_path, partial_path_for,
};
pub use foundation::core::{Fps, MotionMode, Stage, TargetShape};
pub use foundation::error::{AnimError, AnimResult, ErrorKind};
pub use frame::{Domain, Frame, FrameSequence};
pub use geometry::{Placement, fit_scale, letterbox, normalize_geometry};
pub use inference::{IdentityInference, InferenceRequest, InferenceService, ProcessInference};
pub use pipeline::{
    Animator, GenerateReport, generate, postprocess, prepare_driving, prepare_frame,
};
pub use sync::{sync_indices, synchronize};
pub use value_range::{
    to_display_domain, to_display_sequence, to_model_domain, to_model_sequence,
};
