//! Frame source seam.

use std::path::Path;

use async_trait::async_trait;

use crate::frame::Frame;

#[derive(Debug, thiserror::Error)]
pub enum FrameSourceError {
    /// The file is missing, not a video, or has no decodable video stream.
    #[error("Cannot open video file: {0}")]
    UnreadableVideo(String),

    /// The decoder failed after the video was opened.
    #[error("Video decode failed: {0}")]
    Decode(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Container metadata reported when a video is opened.
///
/// `total_frames` and `fps` are best-effort and may be 0.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VideoMetadata {
    pub total_frames: u64,
    pub fps: f64,
    pub width: u32,
    pub height: u32,
}

/// A forward-only, finite sequence of frames.
#[async_trait]
pub trait FrameSource: Send {
    fn metadata(&self) -> VideoMetadata;

    fn total_frames(&self) -> u64 {
        self.metadata().total_frames
    }

    fn fps(&self) -> f64 {
        self.metadata().fps
    }

    /// `(width, height)` of every frame.
    fn dimensions(&self) -> (u32, u32) {
        let metadata = self.metadata();
        (metadata.width, metadata.height)
    }

    /// Next frame in order, or `None` at end of stream.
    async fn next_frame(&mut self) -> Result<Option<Frame>, FrameSourceError>;

    /// Release the underlying decoder. Safe to call more than once.
    async fn close(&mut self);
}

/// Opens stored videos as [`FrameSource`]s.
#[async_trait]
pub trait VideoOpener: Send + Sync {
    async fn open(&self, path: &Path) -> Result<Box<dyn FrameSource>, FrameSourceError>;
}
