//! Detector output and the per-session detection record built from it.

use serde::{Deserialize, Serialize};

use crate::types::FrameIndex;

/// A raw finding as returned by a detector for one frame.
///
/// `bbox` is `[x1, y1, x2, y2]` in pixel coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameDetection {
    pub label: String,
    pub confidence: f32,
    pub bbox: [f32; 4],
}

impl FrameDetection {
    pub fn new(label: impl Into<String>, confidence: f32, bbox: [f32; 4]) -> Self {
        Self {
            label: label.into(),
            confidence,
            bbox,
        }
    }
}

/// Integer pixel box with `x1 <= x2` and `y1 <= y2`.
///
/// Serialized as a `[x1, y1, x2, y2]` array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "[i32; 4]", from = "[i32; 4]")]
pub struct BoundingBox {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl BoundingBox {
    /// Build a box from two arbitrary corners, reordering them if needed.
    pub fn from_corners(xa: i32, ya: i32, xb: i32, yb: i32) -> Self {
        Self {
            x1: xa.min(xb),
            y1: ya.min(yb),
            x2: xa.max(xb),
            y2: ya.max(yb),
        }
    }

    /// Truncate float detector coordinates toward zero.
    pub fn from_f32(bbox: [f32; 4]) -> Self {
        Self::from_corners(
            bbox[0] as i32,
            bbox[1] as i32,
            bbox[2] as i32,
            bbox[3] as i32,
        )
    }

    pub fn width(&self) -> u32 {
        self.x2.abs_diff(self.x1)
    }

    pub fn height(&self) -> u32 {
        self.y2.abs_diff(self.y1)
    }
}

impl From<BoundingBox> for [i32; 4] {
    fn from(b: BoundingBox) -> Self {
        [b.x1, b.y1, b.x2, b.y2]
    }
}

impl From<[i32; 4]> for BoundingBox {
    fn from(v: [i32; 4]) -> Self {
        BoundingBox::from_corners(v[0], v[1], v[2], v[3])
    }
}

/// One labeled finding recorded against a session. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    /// 1-based index of the frame the finding came from.
    pub frame: FrameIndex,
    pub label: String,
    /// Rounded to two decimals.
    pub confidence: f64,
    pub bbox: BoundingBox,
    /// Seconds from the start of the video, rounded to two decimals.
    pub timestamp: f64,
}

impl Detection {
    pub fn from_frame_detection(raw: &FrameDetection, frame: FrameIndex, fps: f64) -> Self {
        Self {
            frame,
            label: raw.label.clone(),
            confidence: round2(f64::from(raw.confidence).clamp(0.0, 1.0)),
            bbox: BoundingBox::from_f32(raw.bbox),
            timestamp: round2(timestamp_secs(frame, fps)),
        }
    }
}

/// Seconds at which `frame` is shown; 0 when the frame rate is unknown.
pub fn timestamp_secs(frame: FrameIndex, fps: f64) -> f64 {
    if fps > 0.0 && fps.is_finite() {
        frame as f64 / fps
    } else {
        0.0
    }
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounding_box_reorders_corners() {
        let b = BoundingBox::from_corners(40, 50, 10, 20);
        assert_eq!(b, BoundingBox { x1: 10, y1: 20, x2: 40, y2: 50 });
        assert_eq!(b.width(), 30);
        assert_eq!(b.height(), 30);
    }

    #[test]
    fn bounding_box_truncates_floats() {
        let b = BoundingBox::from_f32([10.9, 20.2, 30.7, 40.99]);
        assert_eq!(<[i32; 4]>::from(b), [10, 20, 30, 40]);
    }

    #[test]
    fn bounding_box_serializes_as_array() {
        let b = BoundingBox::from_corners(1, 2, 3, 4);
        assert_eq!(serde_json::to_value(b).unwrap(), serde_json::json!([1, 2, 3, 4]));
    }

    #[test]
    fn timestamp_is_zero_without_fps() {
        assert_eq!(timestamp_secs(120, 0.0), 0.0);
        assert_eq!(timestamp_secs(120, -5.0), 0.0);
        assert_eq!(timestamp_secs(120, f64::NAN), 0.0);
    }

    #[test]
    fn detection_rounds_confidence_and_timestamp() {
        let raw = FrameDetection::new("drowning", 0.876, [0.0, 0.0, 5.0, 5.0]);
        let d = Detection::from_frame_detection(&raw, 20, 30.0);
        assert_eq!(d.frame, 20);
        assert_eq!(d.confidence, 0.88);
        assert_eq!(d.timestamp, 0.67);
    }

    #[test]
    fn detection_clamps_out_of_range_confidence() {
        let raw = FrameDetection::new("swimming", 1.7, [0.0, 0.0, 1.0, 1.0]);
        let d = Detection::from_frame_detection(&raw, 10, 25.0);
        assert_eq!(d.confidence, 1.0);
    }

    #[test]
    fn detection_json_shape() {
        let raw = FrameDetection::new("drowning", 0.9, [1.0, 2.0, 3.0, 4.0]);
        let d = Detection::from_frame_detection(&raw, 40, 0.0);
        let json = serde_json::to_value(&d).unwrap();
        assert_eq!(json["frame"], 40);
        assert_eq!(json["label"], "drowning");
        assert_eq!(json["bbox"], serde_json::json!([1, 2, 3, 4]));
        assert_eq!(json["timestamp"], 0.0);
    }
}
