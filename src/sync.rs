//! Temporal resampling by nearest-index selection.

use crate::foundation::error::{AnimError, AnimResult};
use crate::frame::FrameSequence;

/// `target_count` evenly spaced indices over `0..=len-1`, truncated toward zero.
///
/// Computed in integer arithmetic so the last index is always exactly `len - 1` and no index is
/// lost to float drift. The result is non-decreasing and may repeat indices when upsampling.
pub fn sync_indices(len: usize, target_count: usize) -> AnimResult<Vec<usize>> {
    if len == 0 {
        return Err(AnimError::empty_input(
            "cannot synchronize an empty frame sequence",
        ));
    }
    if target_count == 0 {
        return Err(AnimError::validation("target frame count must be >= 1"));
    }
    if target_count == 1 {
        return Ok(vec![0]);
    }

    let span = (len - 1) as u128;
    let steps = (target_count - 1) as u128;
    Ok((0..target_count as u128)
        .map(|i| (i * span / steps) as usize)
        .collect())
}

/// Resample `frames` to exactly `target_count` frames, preserving temporal order.
#[tracing::instrument(skip(frames), fields(len = frames.len()))]
pub fn synchronize(frames: &FrameSequence, target_count: usize) -> AnimResult<FrameSequence> {
    let indices = sync_indices(frames.len(), target_count)?;
    let slice = frames.as_slice();
    Ok(indices.into_iter().map(|i| slice[i].clone()).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::Frame;

    fn numbered(n: u8) -> FrameSequence {
        (0..n).map(|i| Frame::filled(1, 1, [i, 0, 0])).collect()
    }

    fn tags(seq: &FrameSequence) -> Vec<u8> {
        seq.iter().map(|f| f.as_display().unwrap().as_raw()[0]).collect()
    }

    #[test]
    fn same_length_is_identity() {
        assert_eq!(sync_indices(5, 5).unwrap(), vec![0, 1, 2, 3, 4]);
        let seq = numbered(7);
        assert_eq!(synchronize(&seq, 7).unwrap(), seq);
    }

    #[test]
    fn single_target_picks_first_frame() {
        assert_eq!(sync_indices(10, 1).unwrap(), vec![0]);
        assert_eq!(tags(&synchronize(&numbered(4), 1).unwrap()), vec![0]);
    }

    #[test]
    fn downsample_matches_truncated_linspace() {
        // linspace(0, 9, 4) = [0, 3, 6, 9]
        assert_eq!(sync_indices(10, 4).unwrap(), vec![0, 3, 6, 9]);
        // linspace(0, 4, 3) = [0, 2, 4]
        assert_eq!(sync_indices(5, 3).unwrap(), vec![0, 2, 4]);
        // linspace(0, 10, 4) = [0, 3.33, 6.67, 10]
        assert_eq!(sync_indices(11, 4).unwrap(), vec![0, 3, 6, 10]);
    }

    #[test]
    fn upsample_repeats_frames_in_order() {
        assert_eq!(sync_indices(2, 5).unwrap(), vec![0, 0, 0, 0, 1]);
        assert_eq!(tags(&synchronize(&numbered(3), 5).unwrap()), vec![0, 0, 1, 1, 2]);
    }

    #[test]
    fn length_and_order_hold_for_many_sizes() {
        for len in 1..40 {
            for target in 1..60 {
                let idx = sync_indices(len, target).unwrap();
                assert_eq!(idx.len(), target);
                assert!(idx.windows(2).all(|w| w[0] <= w[1]));
                assert_eq!(idx[0], 0);
                assert!(*idx.last().unwrap() < len);
                if target > 1 {
                    assert_eq!(*idx.last().unwrap(), len - 1);
                }
            }
        }
    }

    #[test]
    fn empty_and_zero_target_are_rejected() {
        assert!(matches!(sync_indices(0, 3), Err(AnimError::EmptyInput(_))));
        assert!(matches!(
            synchronize(&FrameSequence::new(), 1),
            Err(AnimError::EmptyInput(_))
        ));
        assert!(matches!(sync_indices(3, 0), Err(AnimError::Validation(_))));
    }
}
