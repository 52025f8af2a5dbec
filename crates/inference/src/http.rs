//! Client for a model served over HTTP.
//!
//! Wire protocol:
//!
//! ```text
//! GET  {base}/v1/models/{model}          -> { name, version, classes: [..] }
//! POST {base}/v1/models/{model}/detect   body: image/jpeg
//!                                        -> { detections: [{ label, confidence, bbox }] }
//! ```

use async_trait::async_trait;
use lifeguard_core::detection::FrameDetection;
use lifeguard_vision::annotate::encode_jpeg;
use lifeguard_vision::Frame;
use serde::{de::DeserializeOwned, Deserialize};

use crate::config::DetectorConfig;
use crate::detector::{DetectorError, FrameDetector};

/// Quality used when shipping frames to the inference server.
const UPLOAD_JPEG_QUALITY: u8 = 90;

/// Model description reported by the inference server.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ModelInfo {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub classes: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct DetectResponse {
    #[serde(default)]
    detections: Vec<FrameDetection>,
}

pub struct HttpDetector {
    client: reqwest::Client,
    base_url: String,
    model: ModelInfo,
}

impl HttpDetector {
    /// Resolve the configured model on the server and verify its version.
    pub async fn load(config: &DetectorConfig) -> Result<Self, DetectorError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Self::load_with_client(client, config).await
    }

    /// Load reusing an existing [`reqwest::Client`].
    pub async fn load_with_client(
        client: reqwest::Client,
        config: &DetectorConfig,
    ) -> Result<Self, DetectorError> {
        let response = client
            .get(format!("{}/v1/models/{}", config.base_url, config.model))
            .send()
            .await?;
        let model: ModelInfo = parse_response(response).await?;

        if let Some(expected) = &config.model_version {
            if &model.version != expected {
                return Err(DetectorError::VersionMismatch {
                    expected: expected.clone(),
                    actual: model.version,
                });
            }
        }

        tracing::info!(
            model = %model.name,
            version = %model.version,
            classes = ?model.classes,
            "Detector model loaded",
        );

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            model,
        })
    }

    pub fn model(&self) -> &ModelInfo {
        &self.model
    }
}

#[async_trait]
impl FrameDetector for HttpDetector {
    fn name(&self) -> &str {
        &self.model.name
    }

    fn classes(&self) -> &[String] {
        &self.model.classes
    }

    async fn detect(&self, frame: &Frame) -> Result<Vec<FrameDetection>, DetectorError> {
        let image = frame.image.clone();
        let jpeg = tokio::task::spawn_blocking(move || encode_jpeg(&image, UPLOAD_JPEG_QUALITY))
            .await
            .map_err(|e| DetectorError::Encode(e.to_string()))?
            .map_err(|e| DetectorError::Encode(e.to_string()))?;

        let response = self
            .client
            .post(format!(
                "{}/v1/models/{}/detect",
                self.base_url, self.model.name
            ))
            .header(reqwest::header::CONTENT_TYPE, "image/jpeg")
            .body(jpeg)
            .send()
            .await?;

        let body: DetectResponse = parse_response(response).await?;
        Ok(body.detections)
    }
}

/// Check the status and deserialize the JSON body.
async fn parse_response<T: DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, DetectorError> {
    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<unreadable body>".to_string());
        return Err(DetectorError::Api {
            status: status.as_u16(),
            body,
        });
    }
    Ok(response.json::<T>().await?)
}
