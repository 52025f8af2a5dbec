use std::time::Duration;

use lifeguard_inference::DetectorError;
use lifeguard_vision::annotate::AnnotateError;
use lifeguard_vision::FrameSourceError;

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Source(#[from] FrameSourceError),

    #[error(transparent)]
    Detector(#[from] DetectorError),

    #[error("Detector did not answer within {0:?}")]
    DetectorTimeout(Duration),

    #[error(transparent)]
    Annotate(#[from] AnnotateError),

    #[error("Session cancelled")]
    Cancelled,

    /// The worker pool was shut down.
    #[error("Detection workers are shut down")]
    WorkersClosed,

    #[error("Background task failed: {0}")]
    Task(String),
}

impl PipelineError {
    /// Failures confined to a single frame; processing moves on to the next.
    pub fn is_per_frame(&self) -> bool {
        matches!(
            self,
            PipelineError::Detector(_)
                | PipelineError::DetectorTimeout(_)
                | PipelineError::Annotate(_)
        )
    }
}
