//! Detection sessions and the video processing that feeds them.
//!
//! - [`session`]: one analysis' live state, safe to read while it is written.
//! - [`store`]: the process-wide session registry with capacity and expiry.
//! - [`pipeline`]: the live (session-tracked) and simple (blocking) runs.
//! - [`payload`]: what status polls and live update streams return.

pub mod error;
pub mod payload;
pub mod pipeline;
pub mod session;
pub mod store;

pub use error::PipelineError;
pub use pipeline::{DetectionPipeline, LiveOutcome, PipelineConfig, SimpleOutcome};
pub use session::DetectionSession;
pub use store::{SessionStore, StoreConfig, StoreError};
