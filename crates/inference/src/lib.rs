//! Object detector seam and the HTTP client for the inference server.
//!
//! The model itself runs out of process. This crate only knows how to load a
//! named, optionally version-pinned model and send it frames.

pub mod config;
pub mod detector;
pub mod http;

pub use config::DetectorConfig;
pub use detector::{DetectorError, FrameDetector};
pub use http::{HttpDetector, ModelInfo};
