#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use lifeguard_api::config::ServerConfig;
use lifeguard_api::router::build_app_router;
use lifeguard_api::state::AppState;
use lifeguard_core::detection::FrameDetection;
use lifeguard_core::status::SessionStatus;
use lifeguard_inference::{DetectorError, FrameDetector};
use lifeguard_pipeline::{DetectionPipeline, SessionStore};
use lifeguard_vision::memory::{MemoryOpener, MemoryVideo};
use lifeguard_vision::{Frame, FrameAnnotator};
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

pub const BOUNDARY: &str = "lifeguard-test-boundary";

// ---------------------------------------------------------------------------
// Scripted detector
// ---------------------------------------------------------------------------

/// Detector answering from a per-frame script.
#[derive(Default)]
pub struct ScriptedDetector {
    script: HashMap<u64, Vec<FrameDetection>>,
    classes: Vec<String>,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl ScriptedDetector {
    pub fn with(mut self, frame: u64, label: &str, confidence: f32) -> Self {
        self.script
            .entry(frame)
            .or_default()
            .push(FrameDetection::new(label, confidence, [4.0, 4.0, 20.0, 20.0]));
        self
    }

    /// Drowning detections at every listed frame.
    pub fn drowning_at(frames: &[u64]) -> Self {
        frames
            .iter()
            .fold(Self::default(), |d, &f| d.with(f, "drowning", 0.9))
    }

    pub fn with_classes(mut self, classes: &[&str]) -> Self {
        self.classes = classes.iter().map(|c| c.to_string()).collect();
        self
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FrameDetector for ScriptedDetector {
    fn name(&self) -> &str {
        "scripted"
    }

    fn classes(&self) -> &[String] {
        &self.classes
    }

    async fn detect(&self, frame: &Frame) -> Result<Vec<FrameDetection>, DetectorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        Ok(self.script.get(&frame.index).cloned().unwrap_or_default())
    }
}

// ---------------------------------------------------------------------------
// App construction
// ---------------------------------------------------------------------------

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub upload_dir: TempDir,
}

impl TestApp {
    /// Number of files left in the upload directory.
    pub fn staged_files(&self) -> usize {
        std::fs::read_dir(self.upload_dir.path()).unwrap().count()
    }

    /// Wait until the session leaves `processing`.
    pub async fn wait_for_terminal(&self, session_id: &str) -> SessionStatus {
        let id = uuid::Uuid::parse_str(session_id).unwrap();
        let session = self.state.sessions.get(&id).await.expect("session exists");
        for _ in 0..500 {
            let status = session.status().await;
            if status != SessionStatus::Processing {
                return status;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("session {session_id} did not finish");
    }
}

/// Build a test `ServerConfig` staging uploads in `upload_dir`.
pub fn test_config(upload_dir: &TempDir) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        upload_dir: upload_dir.path().to_path_buf(),
        live_update_interval_ms: 10,
        ..ServerConfig::default()
    }
}

/// Full application over an in-memory video and a scripted detector.
pub fn build_test_app(video: MemoryOpener, detector: ScriptedDetector) -> TestApp {
    build_test_app_with(video, Arc::new(detector), |_| {})
}

pub fn build_test_app_with(
    video: MemoryOpener,
    detector: Arc<ScriptedDetector>,
    customize: impl FnOnce(&mut ServerConfig),
) -> TestApp {
    let upload_dir = tempfile::tempdir().unwrap();
    let mut config = test_config(&upload_dir);
    customize(&mut config);

    let pipeline = DetectionPipeline::new(
        detector,
        Arc::new(video),
        FrameAnnotator::new(config.jpeg_quality),
        config.pipeline_config(Duration::from_secs(5)),
    );
    assemble(config, Some(Arc::new(pipeline)), upload_dir)
}

/// Application whose detector failed to load.
pub fn build_test_app_without_model() -> TestApp {
    let upload_dir = tempfile::tempdir().unwrap();
    let config = test_config(&upload_dir);
    assemble(config, None, upload_dir)
}

fn assemble(
    config: ServerConfig,
    pipeline: Option<Arc<DetectionPipeline>>,
    upload_dir: TempDir,
) -> TestApp {
    let state = AppState {
        sessions: Arc::new(SessionStore::new(config.store_config())),
        config: Arc::new(config.clone()),
        pipeline,
    };
    TestApp {
        router: build_app_router(state.clone(), &config),
        state,
        upload_dir,
    }
}

pub fn blank_video(frames: usize) -> MemoryOpener {
    MemoryOpener::new(MemoryVideo::blank(frames, 32, 24, 25.0))
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    app.oneshot(Request::get(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

pub async fn delete(app: Router, uri: &str) -> Response<Body> {
    app.oneshot(Request::delete(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

/// POST a multipart form with a single file part.
pub async fn post_file(
    app: Router,
    uri: &str,
    field: &str,
    filename: Option<&str>,
    content: &[u8],
) -> Response<Body> {
    let body = multipart_body(field, filename, content);
    app.oneshot(
        Request::post(uri)
            .header(
                "content-type",
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap(),
    )
    .await
    .unwrap()
}

/// POST a `video` file part named `clip.mp4`.
pub async fn post_video(app: Router, uri: &str) -> Response<Body> {
    post_file(app, uri, "video", Some("clip.mp4"), b"fake video bytes").await
}

pub fn multipart_body(field: &str, filename: Option<&str>, content: &[u8]) -> Vec<u8> {
    let disposition = match filename {
        Some(name) => format!("form-data; name=\"{field}\"; filename=\"{name}\""),
        None => format!("form-data; name=\"{field}\""),
    };
    let mut body = format!(
        "--{BOUNDARY}\r\nContent-Disposition: {disposition}\r\nContent-Type: video/mp4\r\n\r\n"
    )
    .into_bytes();
    body.extend_from_slice(content);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    body
}

// ---------------------------------------------------------------------------
// Responses
// ---------------------------------------------------------------------------

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .unwrap()
        .to_bytes()
        .to_vec()
}

pub async fn body_json(response: Response<Body>) -> Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

/// Parse every `data:` line of an event-stream body.
pub async fn sse_events(response: Response<Body>) -> Vec<Value> {
    let text = String::from_utf8(body_bytes(response).await).unwrap();
    text.lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(|data| serde_json::from_str(data.trim()).unwrap())
        .collect()
}

pub fn assert_error(json: &Value, code: &str, message: &str) {
    assert_eq!(json["code"], code, "unexpected error body: {json}");
    assert_eq!(json["error"], message);
}
