//! Frame ranges and the boundary convention used when baking.

use serde::{Deserialize, Serialize};

/// Whether the last frame of a range is sampled.
///
/// Both conventions exist in production batch scripts: one bakes
/// `frame_from..=frame_to`, the other `frame_from..frame_to`. The choice is
/// explicit configuration rather than a guess.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameBoundary {
    /// Sample `start..=end` (`end - start + 1` frames).
    #[default]
    Inclusive,
    /// Sample `start..end` (`end - start` frames).
    Exclusive,
}

impl FrameBoundary {
    /// Returns the boundary name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            FrameBoundary::Inclusive => "inclusive",
            FrameBoundary::Exclusive => "exclusive",
        }
    }
}

/// An integer frame range `[start, end]` with `start <= end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FrameRange {
    /// First frame.
    pub start: i32,
    /// Last frame (sampled only with [`FrameBoundary::Inclusive`]).
    pub end: i32,
}

impl FrameRange {
    /// Creates a frame range, returning `None` if `start > end`.
    pub fn new(start: i32, end: i32) -> Option<Self> {
        (start <= end).then_some(Self { start, end })
    }

    /// Creates a frame range from a floating point action range.
    ///
    /// Both ends are truncated toward zero, matching how host applications
    /// report integer frame ranges for actions.
    pub fn from_f32(start: f32, end: f32) -> Option<Self> {
        if !start.is_finite() || !end.is_finite() {
            return None;
        }
        Self::new(start as i32, end as i32)
    }

    /// Returns the frames sampled under the given convention, in increasing order.
    pub fn frames(&self, boundary: FrameBoundary) -> impl Iterator<Item = i32> {
        let end = match boundary {
            FrameBoundary::Inclusive => self.end + 1,
            FrameBoundary::Exclusive => self.end,
        };
        self.start..end
    }

    /// Returns the number of frames sampled under the given convention.
    pub fn frame_count(&self, boundary: FrameBoundary) -> usize {
        let span = (self.end - self.start).max(0) as usize;
        match boundary {
            FrameBoundary::Inclusive => span + 1,
            FrameBoundary::Exclusive => span,
        }
    }
}

impl std::fmt::Display for FrameRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inclusive_frames() {
        let range = FrameRange::new(1, 4).unwrap();
        let frames: Vec<i32> = range.frames(FrameBoundary::Inclusive).collect();
        assert_eq!(frames, vec![1, 2, 3, 4]);
        assert_eq!(range.frame_count(FrameBoundary::Inclusive), 4);
    }

    #[test]
    fn test_exclusive_frames() {
        let range = FrameRange::new(1, 4).unwrap();
        let frames: Vec<i32> = range.frames(FrameBoundary::Exclusive).collect();
        assert_eq!(frames, vec![1, 2, 3]);
        assert_eq!(range.frame_count(FrameBoundary::Exclusive), 3);
    }

    #[test]
    fn test_single_frame_range() {
        let range = FrameRange::new(7, 7).unwrap();
        assert_eq!(range.frame_count(FrameBoundary::Inclusive), 1);
        assert_eq!(range.frame_count(FrameBoundary::Exclusive), 0);
        assert_eq!(range.frames(FrameBoundary::Exclusive).count(), 0);
    }

    #[test]
    fn test_reversed_range_rejected() {
        assert!(FrameRange::new(5, 2).is_none());
    }

    #[test]
    fn test_from_f32_truncates() {
        let range = FrameRange::from_f32(0.0, 29.9).unwrap();
        assert_eq!(range, FrameRange { start: 0, end: 29 });
        assert!(FrameRange::from_f32(f32::NAN, 1.0).is_none());
    }

    #[test]
    fn test_boundary_serde() {
        let json = serde_json::to_string(&FrameBoundary::Exclusive).unwrap();
        assert_eq!(json, "\"exclusive\"");
        let parsed: FrameBoundary = serde_json::from_str("\"inclusive\"").unwrap();
        assert_eq!(parsed, FrameBoundary::Inclusive);
    }
}
