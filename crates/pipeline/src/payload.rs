//! Status and live-update payloads.

use lifeguard_core::detection::Detection;
use lifeguard_core::status::SessionStatus;
use serde::Serialize;

/// Detections included in a status poll.
pub const STATUS_DETECTION_LIMIT: usize = 10;

/// Detections included in each live update event.
pub const STREAM_DETECTION_LIMIT: usize = 3;

/// Response to a status poll.
#[derive(Debug, Clone, Serialize)]
pub struct StatusSnapshot {
    pub session_id: String,
    pub status: SessionStatus,
    pub progress: u8,
    pub current_frame: u64,
    pub total_frames: u64,
    pub drowning_count: u32,
    /// Most recent detections, oldest first.
    pub detections: Vec<Detection>,
    pub result: Option<bool>,
    pub error: Option<String>,
    /// Latest annotated frame as base64 JPEG, delivered at most once.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frame_data: Option<String>,
}

/// Periodic event on the live update stream.
#[derive(Debug, Clone, Serialize)]
pub struct LiveUpdate {
    pub status: SessionStatus,
    pub progress: u8,
    pub current_frame: u64,
    pub total_frames: u64,
    pub drowning_count: u32,
    pub recent_detections: Vec<Detection>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frame_data: Option<String>,
}

/// Last event on the live update stream.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum TerminalEvent {
    Completed {
        result: bool,
        total_detections: usize,
        drowning_count: u32,
    },
    Error {
        error: String,
    },
}

/// The last `limit` items of `items`, oldest first.
pub(crate) fn tail<T: Clone>(items: &[T], limit: usize) -> Vec<T> {
    items[items.len().saturating_sub(limit)..].to_vec()
}
