//! Detection overlays and JPEG snapshot encoding.

use std::path::Path;

use ab_glyph::{FontArc, PxScale};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use image::codecs::jpeg::JpegEncoder;
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;
use lifeguard_core::detection::{BoundingBox, Detection};
use lifeguard_core::policy::DetectionPolicy;

pub const DEFAULT_JPEG_QUALITY: u8 = 80;

const DROWNING_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
const OTHER_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
const LABEL_OFFSET_PX: i32 = 10;
const LABEL_SCALE_PX: f32 = 16.0;
const LABEL_TAB_HEIGHT: u32 = 6;
const LABEL_TAB_MAX_WIDTH: u32 = 48;

#[derive(Debug, thiserror::Error)]
pub enum AnnotateError {
    #[error("JPEG encoding failed: {0}")]
    Encode(#[from] image::ImageError),

    #[error("Failed to read font {path}: {source}")]
    FontIo {
        path: String,
        source: std::io::Error,
    },

    #[error("Invalid font file {0}")]
    InvalidFont(String),
}

/// A base64-encoded JPEG, ready to embed in a JSON payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedFrame(String);

impl EncodedFrame {
    pub fn from_jpeg(jpeg: &[u8]) -> Self {
        Self(STANDARD.encode(jpeg))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

/// Renders detections onto frames.
#[derive(Clone)]
pub struct FrameAnnotator {
    font: Option<FontArc>,
    jpeg_quality: u8,
}

impl Default for FrameAnnotator {
    fn default() -> Self {
        Self::new(DEFAULT_JPEG_QUALITY)
    }
}

impl FrameAnnotator {
    pub fn new(jpeg_quality: u8) -> Self {
        Self {
            font: None,
            jpeg_quality: jpeg_quality.clamp(1, 100),
        }
    }

    /// Draw `"{label}: {confidence}"` captions with this font.
    pub fn with_font(mut self, font: FontArc) -> Self {
        self.font = Some(font);
        self
    }

    pub fn load_font(path: &Path) -> Result<FontArc, AnnotateError> {
        let bytes = std::fs::read(path).map_err(|source| AnnotateError::FontIo {
            path: path.display().to_string(),
            source,
        })?;
        FontArc::try_from_vec(bytes)
            .map_err(|_| AnnotateError::InvalidFont(path.display().to_string()))
    }

    /// Copy `image` and draw every detection on it.
    ///
    /// Drowning-class boxes are red, everything else green.
    pub fn annotate(
        &self,
        image: &RgbImage,
        detections: &[Detection],
        policy: &DetectionPolicy,
    ) -> RgbImage {
        let mut canvas = image.clone();
        for detection in detections {
            let color = if policy.is_drowning_label(&detection.label) {
                DROWNING_COLOR
            } else {
                OTHER_COLOR
            };
            self.draw_detection(&mut canvas, detection, color);
        }
        canvas
    }

    /// Annotate and encode in one step.
    pub fn render(
        &self,
        image: &RgbImage,
        detections: &[Detection],
        policy: &DetectionPolicy,
    ) -> Result<EncodedFrame, AnnotateError> {
        let annotated = self.annotate(image, detections, policy);
        let jpeg = encode_jpeg(&annotated, self.jpeg_quality)?;
        Ok(EncodedFrame::from_jpeg(&jpeg))
    }

    fn draw_detection(&self, canvas: &mut RgbImage, detection: &Detection, color: Rgb<u8>) {
        let Some(rect) = clamp_to_canvas(&detection.bbox, canvas.width(), canvas.height()) else {
            return;
        };

        // Two nested outlines give a 2px border.
        draw_hollow_rect_mut(canvas, rect, color);
        if rect.width() > 2 && rect.height() > 2 {
            let inner = Rect::at(rect.left() + 1, rect.top() + 1)
                .of_size(rect.width() - 2, rect.height() - 2);
            draw_hollow_rect_mut(canvas, inner, color);
        }

        let label_y = (rect.top() - LABEL_OFFSET_PX).max(0);
        match &self.font {
            Some(font) => {
                let caption = format!("{}: {:.2}", detection.label, detection.confidence);
                draw_text_mut(
                    canvas,
                    color,
                    rect.left(),
                    label_y,
                    PxScale::from(LABEL_SCALE_PX),
                    font,
                    &caption,
                );
            }
            None => {
                let tab = Rect::at(rect.left(), label_y)
                    .of_size(rect.width().min(LABEL_TAB_MAX_WIDTH), LABEL_TAB_HEIGHT);
                draw_filled_rect_mut(canvas, tab, color);
            }
        }
    }
}

/// Intersect a box with the canvas. `None` when nothing is visible.
fn clamp_to_canvas(bbox: &BoundingBox, width: u32, height: u32) -> Option<Rect> {
    if width == 0 || height == 0 {
        return None;
    }
    let max_x = width as i32 - 1;
    let max_y = height as i32 - 1;
    if bbox.x2 < 0 || bbox.y2 < 0 || bbox.x1 > max_x || bbox.y1 > max_y {
        return None;
    }
    let x1 = bbox.x1.clamp(0, max_x);
    let y1 = bbox.y1.clamp(0, max_y);
    let x2 = bbox.x2.clamp(0, max_x);
    let y2 = bbox.y2.clamp(0, max_y);
    let w = (x2 - x1 + 1) as u32;
    let h = (y2 - y1 + 1) as u32;
    Some(Rect::at(x1, y1).of_size(w, h))
}

pub fn encode_jpeg(image: &RgbImage, quality: u8) -> Result<Vec<u8>, AnnotateError> {
    let mut buf = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut buf, quality);
    encoder.encode_image(image)?;
    Ok(buf)
}
