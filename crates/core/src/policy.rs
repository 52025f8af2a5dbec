//! Sampling, drowning classification and verdict rules.
//!
//! Only every `sample_interval`-th frame is sent to the detector. This keeps
//! inference cost at a tenth of the frame rate and accepts the loss of
//! short-lived events that fall between sampled frames.
//!
//! Both detection flavours stop reading frames early once enough qualifying
//! detections have been seen. The live flow stops at three and the blocking
//! flow at two; the verdict threshold is two for both.

use crate::detection::FrameDetection;
use crate::types::FrameIndex;

pub const DEFAULT_SAMPLE_INTERVAL: u64 = 10;
pub const DEFAULT_DROWNING_LABEL_FRAGMENT: &str = "drown";
pub const DEFAULT_MIN_DROWNING_CONFIDENCE: f32 = 0.5;
pub const DEFAULT_VERDICT_THRESHOLD: u32 = 2;
pub const DEFAULT_LIVE_EARLY_STOP: u32 = 3;
pub const DEFAULT_SIMPLE_EARLY_STOP: u32 = 2;

/// Tunables for one detection run.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionPolicy {
    /// Frames whose 1-based index is a multiple of this are sampled.
    pub sample_interval: u64,
    /// Lowercase substring marking a drowning-class label.
    pub drowning_label_fragment: String,
    /// Inclusive lower bound for a drowning detection to count.
    pub min_drowning_confidence: f32,
    /// Qualifying detections needed for a positive verdict.
    pub verdict_threshold: u32,
    /// Qualifying detections after which the live flow stops reading.
    pub live_early_stop: u32,
    /// Qualifying detections after which the blocking flow stops reading.
    pub simple_early_stop: u32,
}

impl Default for DetectionPolicy {
    fn default() -> Self {
        Self {
            sample_interval: DEFAULT_SAMPLE_INTERVAL,
            drowning_label_fragment: DEFAULT_DROWNING_LABEL_FRAGMENT.to_string(),
            min_drowning_confidence: DEFAULT_MIN_DROWNING_CONFIDENCE,
            verdict_threshold: DEFAULT_VERDICT_THRESHOLD,
            live_early_stop: DEFAULT_LIVE_EARLY_STOP,
            simple_early_stop: DEFAULT_SIMPLE_EARLY_STOP,
        }
    }
}

impl DetectionPolicy {
    /// Whether the frame at 1-based `index` goes to the detector.
    pub fn is_sampled(&self, index: FrameIndex) -> bool {
        self.sample_interval > 0 && index > 0 && index % self.sample_interval == 0
    }

    /// Case-insensitive check for the drowning label fragment.
    pub fn is_drowning_label(&self, label: &str) -> bool {
        label
            .to_lowercase()
            .contains(&self.drowning_label_fragment.to_lowercase())
    }

    /// Whether a detection increments the drowning counter.
    pub fn qualifies(&self, detection: &FrameDetection) -> bool {
        self.is_drowning_label(&detection.label)
            && detection.confidence >= self.min_drowning_confidence
    }

    /// Number of qualifying detections in a frame's results.
    pub fn count_qualifying(&self, detections: &[FrameDetection]) -> u32 {
        detections.iter().filter(|d| self.qualifies(d)).count() as u32
    }

    pub fn verdict(&self, drowning_count: u32) -> bool {
        drowning_count >= self.verdict_threshold
    }

    pub fn live_should_stop(&self, drowning_count: u32) -> bool {
        drowning_count >= self.live_early_stop
    }

    pub fn simple_should_stop(&self, drowning_count: u32) -> bool {
        drowning_count >= self.simple_early_stop
    }
}

/// Integer percentage of `current` over `total`, capped at 100.
///
/// Returns 0 when the total is unknown (0).
pub fn progress_percent(current: u64, total: u64) -> u8 {
    if total == 0 {
        return 0;
    }
    let pct = (u128::from(current) * 100 / u128::from(total)).min(100);
    pct as u8
}
