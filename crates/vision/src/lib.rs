//! Video frame sources and frame annotation.
//!
//! [`source::VideoOpener`] turns a stored video file into a forward-only
//! [`source::FrameSource`]. The production opener shells out to
//! `ffprobe`/`ffmpeg`; [`memory`] serves pre-built frames. [`annotate`]
//! renders detections onto a frame and encodes the result as a base64 JPEG.

pub mod annotate;
pub mod ffmpeg;
pub mod ffmpeg_source;
pub mod frame;
pub mod memory;
pub mod source;

pub use annotate::{EncodedFrame, FrameAnnotator};
pub use frame::Frame;
pub use source::{FrameSource, FrameSourceError, VideoMetadata, VideoOpener};
