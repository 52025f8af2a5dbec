use image::RgbImage;
use lifeguard_core::types::FrameIndex;

/// A decoded video frame.
#[derive(Debug, Clone)]
pub struct Frame {
    /// 1-based position in the video.
    pub index: FrameIndex,
    pub image: RgbImage,
}

impl Frame {
    pub fn new(index: FrameIndex, image: RgbImage) -> Self {
        Self { index, image }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}
