use std::{
    io::Read as _,
    path::{Path, PathBuf},
    process::{Child, ChildStdin, Command, Stdio},
};

use crate::{
    foundation::core::Fps,
    foundation::error::{AnimError, AnimResult},
    frame::{Frame, FrameSequence},
};

#[derive(Clone, Debug)]
pub struct EncodeConfig {
    pub width: u32,
    pub height: u32,
    pub fps: Fps,
    pub out_path: PathBuf,
    pub overwrite: bool,
}

impl EncodeConfig {
    pub fn validate(&self) -> AnimResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(AnimError::validation(
                "encode width/height must be non-zero",
            ));
        }
        self.fps.validate()?;
        if !self.width.is_multiple_of(2) || !self.height.is_multiple_of(2) {
            // yuv420p output subsamples chroma 2x2.
            return Err(AnimError::validation(
                "encode width/height must be even (required for yuv420p mp4 output)",
            ));
        }
        Ok(())
    }

    pub fn with_out_path(mut self, out_path: impl Into<PathBuf>) -> Self {
        self.out_path = out_path.into();
        self
    }
}

pub fn default_mp4_config(out_path: impl Into<PathBuf>, width: u32, height: u32) -> EncodeConfig {
    EncodeConfig {
        width,
        height,
        fps: Fps::DEFAULT,
        out_path: out_path.into(),
        overwrite: true,
    }
}

pub fn is_ffmpeg_on_path() -> bool {
    Command::new("ffmpeg")
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

pub fn ensure_parent_dir(path: &Path) -> AnimResult<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        use anyhow::Context as _;
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create output directory '{}'", parent.display()))?;
    }
    Ok(())
}

/// Sibling path the encoder writes to before the finished file is renamed into place.
///
/// Keyed by a fresh request token so concurrent runs targeting the same output never share a
/// working file. The original extension is kept so ffmpeg still picks the right muxer.
pub fn partial_path_for(out_path: &Path) -> PathBuf {
    let stem = out_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    let token = uuid::Uuid::new_v4().simple().to_string();
    let name = match out_path.extension() {
        Some(ext) => format!(".{stem}.{token}.partial.{}", ext.to_string_lossy()),
        None => format!(".{stem}.{token}.partial.mp4"),
    };
    out_path.with_file_name(name)
}

/// Streams display-domain RGB frames into a system `ffmpeg` producing H.264 MP4.
///
/// Output appears at `out_path` only after a successful [`FfmpegEncoder::finish`]. Dropping the
/// encoder early kills ffmpeg and removes the partial file.
pub struct FfmpegEncoder {
    cfg: EncodeConfig,
    partial_path: PathBuf,
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    stderr_drain: Option<std::thread::JoinHandle<std::io::Result<Vec<u8>>>>,
    frames_written: usize,
}

impl FfmpegEncoder {
    pub fn new(cfg: EncodeConfig) -> AnimResult<Self> {
        cfg.validate()?;
        ensure_parent_dir(&cfg.out_path)?;

        if !cfg.overwrite && cfg.out_path.exists() {
            return Err(AnimError::validation(format!(
                "output file '{}' already exists",
                cfg.out_path.display()
            )));
        }

        if !is_ffmpeg_on_path() {
            return Err(AnimError::encode(
                "ffmpeg is required for MP4 encoding, but was not found on PATH",
            ));
        }

        let partial_path = partial_path_for(&cfg.out_path);

        // The system `ffmpeg` binary avoids native FFmpeg dev header/lib requirements.
        let mut cmd = Command::new("ffmpeg");
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());

        cmd.args([
            "-y",
            "-loglevel",
            "error",
            "-f",
            "rawvideo",
            "-pix_fmt",
            "rgb24",
            "-s",
            &format!("{}x{}", cfg.width, cfg.height),
            "-r",
            &format!("{}/{}", cfg.fps.num, cfg.fps.den),
            "-i",
            "pipe:0",
            "-an",
            "-c:v",
            "libx264",
            "-pix_fmt",
            "yuv420p",
            "-movflags",
            "+faststart",
        ])
        .arg(&partial_path);

        let mut child = cmd.spawn().map_err(|e| {
            AnimError::encode(format!(
                "failed to spawn ffmpeg (is it installed and on PATH?): {e}"
            ))
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| AnimError::encode("failed to open ffmpeg stdin (unexpected)"))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| AnimError::encode("failed to open ffmpeg stderr (unexpected)"))?;
        let stderr_drain = std::thread::spawn(move || {
            let mut stderr_bytes = Vec::new();
            stderr.read_to_end(&mut stderr_bytes)?;
            Ok(stderr_bytes)
        });

        tracing::debug!(out = %cfg.out_path.display(), partial = %partial_path.display(), "ffmpeg encoder started");

        Ok(Self {
            cfg,
            partial_path,
            child: Some(child),
            stdin: Some(stdin),
            stderr_drain: Some(stderr_drain),
            frames_written: 0,
        })
    }

    pub fn frames_written(&self) -> usize {
        self.frames_written
    }

    pub fn encode_frame(&mut self, frame: &Frame) -> AnimResult<()> {
        let Frame::Display(img) = frame else {
            return Err(AnimError::validation(
                "encoder expects display-domain frames; convert with to_display_domain first",
            ));
        };
        if img.dimensions() != (self.cfg.width, self.cfg.height) {
            return Err(AnimError::validation(format!(
                "frame size mismatch: got {}x{}, expected {}x{}",
                img.width(),
                img.height(),
                self.cfg.width,
                self.cfg.height
            )));
        }

        let Some(stdin) = self.stdin.as_mut() else {
            return Err(AnimError::encode("ffmpeg encoder is already finalized"));
        };

        use std::io::Write as _;
        stdin.write_all(img.as_raw()).map_err(|e| {
            AnimError::encode(format!("failed to write frame to ffmpeg stdin: {e}"))
        })?;
        self.frames_written += 1;

        Ok(())
    }

    pub fn finish(mut self) -> AnimResult<()> {
        drop(self.stdin.take());
        let mut child = self
            .child
            .take()
            .ok_or_else(|| AnimError::encode("ffmpeg encoder is already finalized"))?;

        let status = child
            .wait()
            .map_err(|e| AnimError::encode(format!("failed to wait for ffmpeg to finish: {e}")))?;
        let stderr_bytes = match self.stderr_drain.take() {
            Some(handle) => handle
                .join()
                .map_err(|_| AnimError::encode("ffmpeg stderr drain thread panicked"))?
                .map_err(|e| AnimError::encode(format!("ffmpeg stderr read failed: {e}")))?,
            None => Vec::new(),
        };

        if !status.success() {
            let stderr = String::from_utf8_lossy(&stderr_bytes);
            return Err(AnimError::encode(format!(
                "ffmpeg exited with status {}: {}",
                status,
                stderr.trim()
            )));
        }

        std::fs::rename(&self.partial_path, &self.cfg.out_path).map_err(|e| {
            AnimError::encode(format!(
                "failed to move encoded video into '{}': {e}",
                self.cfg.out_path.display()
            ))
        })?;

        tracing::debug!(frames = self.frames_written, out = %self.cfg.out_path.display(), "ffmpeg encoder finished");
        Ok(())
    }
}

impl Drop for FfmpegEncoder {
    fn drop(&mut self) {
        drop(self.stdin.take());
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
        if let Some(handle) = self.stderr_drain.take() {
            let _ = handle.join();
        }
        // After a successful finish the partial file has already been renamed away.
        let _ = std::fs::remove_file(&self.partial_path);
    }
}

/// Encode `frames` (display domain, uniform size) to `out_path` at a constant `fps`.
#[tracing::instrument(skip(frames), fields(frames = frames.len()))]
pub fn encode_video(frames: &FrameSequence, out_path: &Path, fps: Fps) -> AnimResult<()> {
    let first = frames
        .first()
        .ok_or_else(|| AnimError::empty_input("no frames to encode"))?;
    let (width, height) = first.dimensions();
    let cfg = EncodeConfig {
        width,
        height,
        fps,
        out_path: out_path.to_path_buf(),
        overwrite: true,
    };

    let mut encoder = FfmpegEncoder::new(cfg)?;
    for frame in frames {
        encoder.encode_frame(frame)?;
    }
    encoder.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_validation_catches_bad_values() {
        let base = default_mp4_config("out/video.mp4", 10, 10);
        assert!(base.validate().is_ok());

        let mut c = base.clone();
        c.width = 0;
        assert!(c.validate().is_err());

        let mut c = base.clone();
        c.width = 11;
        assert!(c.validate().is_err());

        let mut c = base;
        c.fps = Fps { num: 0, den: 1 };
        assert!(c.validate().is_err());
    }

    #[test]
    fn partial_path_is_hidden_sibling_with_same_extension() {
        let p = partial_path_for(Path::new("static/generated_video.mp4"));
        assert_eq!(p.parent(), Some(Path::new("static")));
        let name = p.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with(".generated_video."));
        assert!(name.ends_with(".partial.mp4"));
    }

    #[test]
    fn partial_paths_are_unique_per_call() {
        let out = Path::new("out.mp4");
        assert_ne!(partial_path_for(out), partial_path_for(out));
    }

    #[test]
    fn dropping_unfinished_encoder_leaves_no_files() {
        let has_x264 = Command::new("ffmpeg")
            .args(["-hide_banner", "-encoders"])
            .output()
            .map(|o| String::from_utf8_lossy(&o.stdout).contains("libx264"))
            .unwrap_or(false);
        if !has_x264 {
            return;
        }
        let dir = std::env::temp_dir().join(format!(
            "animorph_encode_drop_{}_{}",
            std::process::id(),
            uuid::Uuid::new_v4().simple()
        ));
        let out = dir.join("unfinished.mp4");

        let mut encoder = FfmpegEncoder::new(default_mp4_config(&out, 16, 16)).unwrap();
        encoder
            .encode_frame(&Frame::filled(16, 16, [40, 80, 120]))
            .unwrap();
        assert_eq!(encoder.frames_written(), 1);
        drop(encoder);

        assert!(!out.exists());
        let leftovers = std::fs::read_dir(&dir)
            .unwrap()
            .filter_map(Result::ok)
            .filter(|e| e.file_name().to_string_lossy().contains(".partial."))
            .count();
        assert_eq!(leftovers, 0);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn encoding_nothing_is_empty_input() {
        let err = encode_video(&FrameSequence::new(), Path::new("never.mp4"), Fps::DEFAULT)
            .unwrap_err();
        assert!(matches!(err, AnimError::EmptyInput(_)));
        assert!(!Path::new("never.mp4").exists());
    }
}
