//! In-memory frame source.
//!
//! Serves pre-built frames with declared metadata. Used to drive the
//! pipeline without a decoder, and to simulate containers whose metadata
//! disagrees with their contents.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use image::{Rgb, RgbImage};

use crate::frame::Frame;
use crate::source::{FrameSource, FrameSourceError, VideoMetadata, VideoOpener};

/// A decoded video held in memory.
#[derive(Debug, Clone)]
pub struct MemoryVideo {
    frames: Arc<[RgbImage]>,
    metadata: VideoMetadata,
}

impl MemoryVideo {
    /// A video of `count` uniformly grey frames whose metadata is accurate.
    pub fn blank(count: usize, width: u32, height: u32, fps: f64) -> Self {
        let frames: Vec<RgbImage> = (0..count)
            .map(|_| RgbImage::from_pixel(width, height, Rgb([96, 96, 96])))
            .collect();
        Self::from_frames(frames, fps)
    }

    pub fn from_frames(frames: Vec<RgbImage>, fps: f64) -> Self {
        let (width, height) = frames
            .first()
            .map(|f| (f.width(), f.height()))
            .unwrap_or((0, 0));
        Self {
            metadata: VideoMetadata {
                total_frames: frames.len() as u64,
                fps,
                width,
                height,
            },
            frames: frames.into(),
        }
    }

    /// Override the frame count the container claims to have.
    pub fn with_declared_total(mut self, total_frames: u64) -> Self {
        self.metadata.total_frames = total_frames;
        self
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

pub struct MemoryFrameSource {
    video: MemoryVideo,
    position: usize,
    closed: bool,
}

impl MemoryFrameSource {
    pub fn new(video: MemoryVideo) -> Self {
        Self {
            video,
            position: 0,
            closed: false,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

#[async_trait]
impl FrameSource for MemoryFrameSource {
    fn metadata(&self) -> VideoMetadata {
        self.video.metadata
    }

    async fn next_frame(&mut self) -> Result<Option<Frame>, FrameSourceError> {
        if self.closed {
            return Ok(None);
        }
        let Some(image) = self.video.frames.get(self.position) else {
            return Ok(None);
        };
        self.position += 1;
        Ok(Some(Frame::new(self.position as u64, image.clone())))
    }

    async fn close(&mut self) {
        self.closed = true;
    }
}

/// Opens every path as the same in-memory video, or fails every open.
#[derive(Debug, Clone)]
pub struct MemoryOpener {
    video: Option<MemoryVideo>,
}

impl MemoryOpener {
    pub fn new(video: MemoryVideo) -> Self {
        Self { video: Some(video) }
    }

    /// An opener for which every file is undecodable.
    pub fn unreadable() -> Self {
        Self { video: None }
    }
}

#[async_trait]
impl VideoOpener for MemoryOpener {
    async fn open(&self, path: &Path) -> Result<Box<dyn FrameSource>, FrameSourceError> {
        match &self.video {
            Some(video) => Ok(Box::new(MemoryFrameSource::new(video.clone()))),
            None => Err(FrameSourceError::UnreadableVideo(format!(
                "{} is not a decodable video",
                path.display()
            ))),
        }
    }
}
