use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use crate::{
    foundation::error::{AnimError, AnimResult},
    frame::{Frame, FrameSequence},
};

/// Stream metadata reported by `ffprobe` for the first video stream.
#[derive(Clone, Debug)]
pub struct VideoSourceInfo {
    pub source_path: PathBuf,
    /// Display width, after applying rotation metadata.
    pub width: u32,
    /// Display height, after applying rotation metadata.
    pub height: u32,
    pub fps_num: u32,
    pub fps_den: u32,
    pub duration_sec: f64,
    /// Container-reported frame count; many containers leave this out.
    pub frame_count: Option<u64>,
}

impl VideoSourceInfo {
    pub fn source_fps(&self) -> f64 {
        if self.fps_den == 0 {
            0.0
        } else {
            f64::from(self.fps_num) / f64::from(self.fps_den)
        }
    }

    fn frame_len_rgb24(&self) -> usize {
        self.width as usize * self.height as usize * 3
    }
}

/// Return `true` when both `ffmpeg` and `ffprobe` can be invoked from `PATH`.
pub fn ffmpeg_tools_available() -> bool {
    ["ffmpeg", "ffprobe"].iter().all(|tool| {
        Command::new(tool)
            .arg("-version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(false)
    })
}

#[tracing::instrument]
pub fn probe_video(source_path: &Path) -> AnimResult<VideoSourceInfo> {
    #[derive(serde::Deserialize)]
    struct ProbeSideData {
        rotation: Option<f64>,
    }
    #[derive(serde::Deserialize)]
    struct ProbeTags {
        rotate: Option<String>,
    }
    #[derive(serde::Deserialize)]
    struct ProbeStream {
        codec_type: Option<String>,
        width: Option<u32>,
        height: Option<u32>,
        r_frame_rate: Option<String>,
        nb_frames: Option<String>,
        tags: Option<ProbeTags>,
        #[serde(default)]
        side_data_list: Vec<ProbeSideData>,
    }
    #[derive(serde::Deserialize)]
    struct ProbeFormat {
        duration: Option<String>,
    }
    #[derive(serde::Deserialize)]
    struct ProbeOut {
        #[serde(default)]
        streams: Vec<ProbeStream>,
        format: Option<ProbeFormat>,
    }

    if !source_path.is_file() {
        return Err(AnimError::not_found(source_path));
    }

    let out = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-print_format",
            "json",
            "-show_streams",
            "-show_format",
        ])
        .arg(source_path)
        .output()
        .map_err(|e| {
            AnimError::decode(format!(
                "failed to run ffprobe (is it installed and on PATH?): {e}"
            ))
        })?;
    if !out.status.success() {
        return Err(AnimError::decode(format!(
            "ffprobe failed for '{}': {}",
            source_path.display(),
            String::from_utf8_lossy(&out.stderr).trim()
        )));
    }

    let parsed: ProbeOut = serde_json::from_slice(&out.stdout)
        .map_err(|e| AnimError::decode(format!("ffprobe json parse failed: {e}")))?;
    let video_stream = parsed
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"))
        .ok_or_else(|| {
            AnimError::decode(format!(
                "no video stream found in '{}'",
                source_path.display()
            ))
        })?;
    let coded_width = video_stream
        .width
        .filter(|&w| w > 0)
        .ok_or_else(|| AnimError::decode("missing video width from ffprobe"))?;
    let coded_height = video_stream
        .height
        .filter(|&h| h > 0)
        .ok_or_else(|| AnimError::decode("missing video height from ffprobe"))?;

    let rotation = video_stream
        .side_data_list
        .iter()
        .find_map(|s| s.rotation)
        .or_else(|| {
            video_stream
                .tags
                .as_ref()
                .and_then(|t| t.rotate.as_deref())
                .and_then(|r| r.parse::<f64>().ok())
        })
        .unwrap_or(0.0);
    // ffmpeg autorotates on decode, so quarter turns swap the output dimensions.
    let (width, height) = if is_quarter_turn(rotation) {
        (coded_height, coded_width)
    } else {
        (coded_width, coded_height)
    };

    let (fps_num, fps_den) =
        parse_ff_ratio(video_stream.r_frame_rate.as_deref().unwrap_or("0/1")).unwrap_or((0, 1));
    let duration_sec = parsed
        .format
        .as_ref()
        .and_then(|f| f.duration.as_ref())
        .and_then(|s| s.parse::<f64>().ok())
        .unwrap_or(0.0);
    let frame_count = video_stream
        .nb_frames
        .as_deref()
        .and_then(|s| s.parse::<u64>().ok());

    Ok(VideoSourceInfo {
        source_path: source_path.to_path_buf(),
        width,
        height,
        fps_num,
        fps_den,
        duration_sec,
        frame_count,
    })
}

/// Decode every frame of the first video stream, in presentation order.
#[tracing::instrument]
pub fn decode_video(source_path: &Path) -> AnimResult<FrameSequence> {
    let info = probe_video(source_path)?;
    let raw = decode_video_rgb24(&info)?;
    let frames = split_rgb24_frames(&raw, info.width, info.height)?;
    tracing::info!(
        frames = frames.len(),
        width = info.width,
        height = info.height,
        fps = info.source_fps(),
        "driving video decoded"
    );
    Ok(frames)
}

fn decode_video_rgb24(source: &VideoSourceInfo) -> AnimResult<Vec<u8>> {
    let out = Command::new("ffmpeg")
        .args(["-v", "error", "-nostdin", "-i"])
        .arg(&source.source_path)
        .args([
            "-map",
            "0:v:0",
            "-f",
            "rawvideo",
            "-pix_fmt",
            "rgb24",
            "pipe:1",
        ])
        .output()
        .map_err(|e| {
            AnimError::decode(format!(
                "failed to run ffmpeg for video decode (is it installed and on PATH?): {e}"
            ))
        })?;

    if !out.status.success() {
        let msg = String::from_utf8_lossy(&out.stderr);
        // Newer ffmpeg refuses to finalize an output whose stream never got a packet. With a
        // readable video stream that just means the clip has no frames.
        if out.stdout.is_empty() && reports_no_frames(&msg) {
            return Ok(Vec::new());
        }
        return Err(AnimError::decode(format!(
            "ffmpeg video decode failed for '{}': {}",
            source.source_path.display(),
            msg.trim()
        )));
    }
    tracing::debug!(
        bytes = out.stdout.len(),
        frame_bytes = source.frame_len_rgb24(),
        "ffmpeg decode finished"
    );
    Ok(out.stdout)
}

/// Split a packed `rgb24` stream into frames. No bytes at all means the clip had no frames.
pub fn split_rgb24_frames(raw: &[u8], width: u32, height: u32) -> AnimResult<FrameSequence> {
    let frame_len = width as usize * height as usize * 3;
    if frame_len == 0 {
        return Err(AnimError::decode(
            "decoded video frame size is zero (invalid source dimensions)",
        ));
    }
    if raw.is_empty() {
        return Err(AnimError::empty_input("driving video contains no frames"));
    }
    if !raw.len().is_multiple_of(frame_len) {
        return Err(AnimError::decode(format!(
            "decoded video ends with a partial frame ({} trailing bytes)",
            raw.len() % frame_len
        )));
    }

    raw.chunks_exact(frame_len)
        .map(|chunk| Frame::from_rgb8(width, height, chunk.to_vec()))
        .collect::<AnimResult<Vec<_>>>()
        .map(FrameSequence::from)
}

fn reports_no_frames(stderr: &str) -> bool {
    stderr.contains("received no packets")
        || stderr.contains("Output file is empty")
        || stderr.contains("nothing was encoded")
}

fn is_quarter_turn(rotation_deg: f64) -> bool {
    let r = rotation_deg.rem_euclid(180.0);
    (r - 90.0).abs() < 1.0
}

fn parse_ff_ratio(s: &str) -> Option<(u32, u32)> {
    let mut parts = s.split('/');
    let a = parts.next()?.parse::<u32>().ok()?;
    let b = parts.next()?.parse::<u32>().ok()?;
    if b == 0 {
        return None;
    }
    Some((a, b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_counts_whole_frames() {
        let raw = vec![7u8; 2 * 3 * 3 * 4];
        let seq = split_rgb24_frames(&raw, 2, 3).unwrap();
        assert_eq!(seq.len(), 4);
        assert!(seq.iter().all(|f| f.dimensions() == (2, 3)));
    }

    #[test]
    fn split_preserves_frame_order() {
        let raw: Vec<u8> = (0..3u8).flat_map(|i| [i; 3]).collect();
        let seq = split_rgb24_frames(&raw, 1, 1).unwrap();
        let firsts: Vec<u8> = seq
            .iter()
            .map(|f| f.as_display().unwrap().as_raw()[0])
            .collect();
        assert_eq!(firsts, vec![0, 1, 2]);
    }

    #[test]
    fn split_empty_is_empty_input() {
        assert!(matches!(
            split_rgb24_frames(&[], 4, 4),
            Err(AnimError::EmptyInput(_))
        ));
    }

    #[test]
    fn split_partial_frame_is_decode_error() {
        assert!(matches!(
            split_rgb24_frames(&[0u8; 13], 2, 2),
            Err(AnimError::Decode(_))
        ));
    }

    #[test]
    fn ratio_parsing() {
        assert_eq!(parse_ff_ratio("30000/1001"), Some((30000, 1001)));
        assert_eq!(parse_ff_ratio("30/0"), None);
        assert_eq!(parse_ff_ratio("abc"), None);
    }

    #[test]
    fn empty_stream_messages_are_recognized() {
        assert!(reports_no_frames(
            "Nothing was written into output file, because at least one of its streams received no packets."
        ));
        assert!(!reports_no_frames("moov atom not found"));
    }

    #[test]
    fn quarter_turns() {
        assert!(is_quarter_turn(90.0));
        assert!(is_quarter_turn(-90.0));
        assert!(is_quarter_turn(270.0));
        assert!(!is_quarter_turn(180.0));
        assert!(!is_quarter_turn(0.0));
    }

    #[test]
    fn probe_missing_file_is_not_found() {
        assert!(matches!(
            probe_video(Path::new("no/such/driving.mp4")),
            Err(AnimError::NotFound(_))
        ));
    }
}
