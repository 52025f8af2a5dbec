use async_trait::async_trait;
use lifeguard_core::detection::FrameDetection;
use lifeguard_vision::Frame;

/// Errors from the detector layer.
#[derive(Debug, thiserror::Error)]
pub enum DetectorError {
    /// The HTTP request itself failed (network, DNS, TLS, timeout).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The inference server returned a non-2xx status code.
    #[error("Inference server error ({status}): {body}")]
    Api { status: u16, body: String },

    /// The server is serving a different model version than configured.
    #[error("Model version mismatch: expected {expected}, server has {actual}")]
    VersionMismatch { expected: String, actual: String },

    #[error("Invalid detector configuration: {0}")]
    Config(String),

    #[error("Failed to encode frame: {0}")]
    Encode(String),

    /// Any other failure while running inference on a frame.
    #[error("Inference failed: {0}")]
    Inference(String),
}

/// Maps one image frame to labeled, scored boxes. Stateless per call.
#[async_trait]
pub trait FrameDetector: Send + Sync {
    /// Model identifier, used in logs and the health payload.
    fn name(&self) -> &str;

    /// Class labels the model can emit, if known.
    fn classes(&self) -> &[String] {
        &[]
    }

    async fn detect(&self, frame: &Frame) -> Result<Vec<FrameDetection>, DetectorError>;
}
