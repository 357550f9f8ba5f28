//! Boundary to the motion-transfer model.
//!
//! The model itself (weights, keypoint detector, generator) lives outside this crate. The
//! pipeline only needs something that maps one source frame plus a driving sequence to an
//! animated sequence of the same length, which is what [`InferenceService`] captures.

use std::{
    io::{Read as _, Write as _},
    path::PathBuf,
    process::{Command, Stdio},
};

use crate::{
    foundation::core::{MotionMode, TargetShape},
    foundation::error::{AnimError, AnimResult},
    frame::{Domain, Frame, FrameSequence},
};

/// Normalized input for one animation run.
#[derive(Clone, Debug)]
pub struct InferenceRequest {
    source: Frame,
    driving: FrameSequence,
    mode: MotionMode,
    shape: TargetShape,
}

impl InferenceRequest {
    /// Build a request, checking that every frame is model-domain and shares the source's shape.
    pub fn new(source: Frame, driving: FrameSequence, mode: MotionMode) -> AnimResult<Self> {
        if source.domain() != Domain::Model {
            return Err(AnimError::validation(
                "inference source frame must be in the model domain",
            ));
        }
        if driving.is_empty() {
            return Err(AnimError::empty_input("inference needs at least one driving frame"));
        }
        let (width, height) = source.dimensions();
        let shape = TargetShape::new(height, width)?;
        driving.ensure_uniform(shape, Domain::Model)?;

        Ok(Self {
            source,
            driving,
            mode,
            shape,
        })
    }

    pub fn source(&self) -> &Frame {
        &self.source
    }

    pub fn driving(&self) -> &FrameSequence {
        &self.driving
    }

    pub fn mode(&self) -> MotionMode {
        self.mode
    }

    pub fn shape(&self) -> TargetShape {
        self.shape
    }

    pub fn len(&self) -> usize {
        self.driving.len()
    }

    pub fn is_empty(&self) -> bool {
        self.driving.is_empty()
    }
}

/// An animation model. Implementations return one model-domain frame per driving frame.
pub trait InferenceService {
    fn infer(&mut self, request: &InferenceRequest) -> AnimResult<FrameSequence>;

    fn name(&self) -> &str;
}

/// Returns the driving sequence unchanged. Exercises the pipeline without a model.
#[derive(Clone, Copy, Debug, Default)]
pub struct IdentityInference;

impl InferenceService for IdentityInference {
    fn infer(&mut self, request: &InferenceRequest) -> AnimResult<FrameSequence> {
        Ok(request.driving().clone())
    }

    fn name(&self) -> &str {
        "identity"
    }
}

#[derive(serde::Serialize, serde::Deserialize, Debug, PartialEq)]
struct WireHeader {
    height: u32,
    width: u32,
    frames: usize,
    relative: bool,
}

/// Runs an external model program and exchanges raw tensors over its stdio.
///
/// Stdin receives one JSON header line (`height`, `width`, `frames`, `relative`), then the
/// source frame followed by every driving frame as little-endian `f32` in HWC order. The
/// program must write exactly `frames` frames in the same layout to stdout and exit 0.
#[derive(Clone, Debug)]
pub struct ProcessInference {
    program: PathBuf,
    args: Vec<String>,
}

impl ProcessInference {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }
}

impl InferenceService for ProcessInference {
    #[tracing::instrument(skip(self, request), fields(program = %self.program.display(), frames = request.len()))]
    fn infer(&mut self, request: &InferenceRequest) -> AnimResult<FrameSequence> {
        let payload = encode_request(request)?;

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                AnimError::inference(format!(
                    "failed to spawn model program '{}': {e}",
                    self.program.display()
                ))
            })?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| AnimError::inference("failed to open model stdin (unexpected)"))?;
        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| AnimError::inference("failed to open model stdout (unexpected)"))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| AnimError::inference("failed to open model stderr (unexpected)"))?;

        // Drain both pipes while writing so a chatty model cannot deadlock on a full pipe.
        let stdout_drain = std::thread::spawn(move || {
            let mut bytes = Vec::new();
            stdout.read_to_end(&mut bytes)?;
            Ok::<_, std::io::Error>(bytes)
        });
        let stderr_drain = std::thread::spawn(move || {
            let mut bytes = Vec::new();
            stderr.read_to_end(&mut bytes)?;
            Ok::<_, std::io::Error>(bytes)
        });

        let write_result = stdin.write_all(&payload);
        drop(stdin);

        let status = child
            .wait()
            .map_err(|e| AnimError::inference(format!("failed to wait for model program: {e}")))?;
        let stdout_bytes = stdout_drain
            .join()
            .map_err(|_| AnimError::inference("model stdout drain thread panicked"))?
            .map_err(|e| AnimError::inference(format!("model stdout read failed: {e}")))?;
        let stderr_bytes = stderr_drain
            .join()
            .map_err(|_| AnimError::inference("model stderr drain thread panicked"))?
            .map_err(|e| AnimError::inference(format!("model stderr read failed: {e}")))?;

        if !status.success() {
            return Err(AnimError::inference(format!(
                "model program exited with status {}: {}",
                status,
                String::from_utf8_lossy(&stderr_bytes).trim()
            )));
        }
        write_result.map_err(|e| {
            AnimError::inference(format!("failed to send frames to model program: {e}"))
        })?;

        decode_response(&stdout_bytes, request.shape(), request.len())
    }

    fn name(&self) -> &str {
        "process"
    }
}

fn encode_request(request: &InferenceRequest) -> AnimResult<Vec<u8>> {
    let shape = request.shape();
    let header = WireHeader {
        height: shape.height,
        width: shape.width,
        frames: request.len(),
        relative: request.mode().is_relative(),
    };
    let mut buf = serde_json::to_vec(&header)
        .map_err(|e| AnimError::inference(format!("encode request header: {e}")))?;
    buf.push(b'\n');

    let frame_bytes = shape.width as usize * shape.height as usize * 3 * 4;
    buf.reserve(frame_bytes * (request.len() + 1));
    for frame in std::iter::once(request.source()).chain(request.driving()) {
        let img = frame
            .as_model()
            .ok_or_else(|| AnimError::validation("inference frames must be in the model domain"))?;
        for v in img.as_raw() {
            buf.extend_from_slice(&v.to_le_bytes());
        }
    }
    Ok(buf)
}

fn decode_response(bytes: &[u8], shape: TargetShape, frames: usize) -> AnimResult<FrameSequence> {
    let samples = shape.width as usize * shape.height as usize * 3;
    let expected = samples * 4 * frames;
    if bytes.len() != expected {
        return Err(AnimError::inference(format!(
            "model returned {} bytes, expected {expected} ({frames} frames of {}x{})",
            bytes.len(),
            shape.width,
            shape.height
        )));
    }

    bytes
        .chunks_exact(samples * 4)
        .map(|chunk| {
            let data = chunk
                .chunks_exact(4)
                .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
                .collect();
            Frame::from_rgb_f32(shape.width, shape.height, data)
        })
        .collect::<AnimResult<Vec<_>>>()
        .map(FrameSequence::from)
}
