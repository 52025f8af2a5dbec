//! Frame-by-frame detection runs.
//!
//! Two flavours share the same sampling and counting rules:
//!
//! - **live**: runs in the background against a [`DetectionSession`], which
//!   it keeps updated with progress, detections and annotated snapshots.
//! - **simple**: runs to completion for a single request and returns only the
//!   verdict.
//!
//! At most `max_concurrent` runs decode and infer at once; the rest wait for
//! a permit. A live run that is cancelled while waiting never opens the file.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use lifeguard_core::detection::{Detection, FrameDetection};
use lifeguard_core::policy::DetectionPolicy;
use lifeguard_inference::FrameDetector;
use lifeguard_vision::{EncodedFrame, Frame, FrameAnnotator, FrameSource, VideoOpener};
use tokio::sync::{Semaphore, SemaphorePermit};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::error::PipelineError;
use crate::session::DetectionSession;

pub const DEFAULT_MAX_CONCURRENT: usize = 2;
pub const DEFAULT_DETECTOR_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub policy: DetectionPolicy,
    /// Runs allowed to process frames at the same time.
    pub max_concurrent: usize,
    /// Upper bound on a single detector call.
    pub detector_timeout: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            policy: DetectionPolicy::default(),
            max_concurrent: DEFAULT_MAX_CONCURRENT,
            detector_timeout: DEFAULT_DETECTOR_TIMEOUT,
        }
    }
}

/// Summary of a live run that reached the end of the video or stopped early.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LiveOutcome {
    pub drowning_count: u32,
    pub frames_read: u64,
    pub stopped_early: bool,
}

/// Result of a blocking run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimpleOutcome {
    pub drowning_detected: bool,
    pub drowning_count: u32,
    pub frames_read: u64,
}

pub struct DetectionPipeline {
    detector: Arc<dyn FrameDetector>,
    opener: Arc<dyn VideoOpener>,
    annotator: FrameAnnotator,
    policy: DetectionPolicy,
    permits: Semaphore,
    detector_timeout: Duration,
}

impl DetectionPipeline {
    pub fn new(
        detector: Arc<dyn FrameDetector>,
        opener: Arc<dyn VideoOpener>,
        annotator: FrameAnnotator,
        config: PipelineConfig,
    ) -> Self {
        Self {
            detector,
            opener,
            annotator,
            policy: config.policy,
            permits: Semaphore::new(config.max_concurrent.max(1)),
            detector_timeout: config.detector_timeout,
        }
    }

    pub fn detector_name(&self) -> &str {
        self.detector.name()
    }

    pub fn detector_classes(&self) -> &[String] {
        self.detector.classes()
    }

    /// Refuse new runs. Runs waiting for a permit fail immediately.
    pub fn close(&self) {
        self.permits.close();
    }

    /// Process `upload` in the background, reporting into `session`.
    ///
    /// The upload is deleted when the run ends, however it ends.
    pub fn spawn_live(
        self: &Arc<Self>,
        session: Arc<DetectionSession>,
        upload: PathBuf,
    ) -> JoinHandle<Option<LiveOutcome>> {
        let pipeline = Arc::clone(self);
        let span = tracing::info_span!("live_detection", session_id = %session.id());
        tokio::spawn(
            async move { pipeline.process_live(&session, &upload).await }.instrument(span),
        )
    }

    /// Run a live detection to its terminal state.
    ///
    /// Returns the outcome when the session completed, `None` when it failed.
    pub async fn process_live(
        &self,
        session: &DetectionSession,
        upload: &Path,
    ) -> Option<LiveOutcome> {
        let result = self.run_live(session, upload).await;
        remove_upload(upload).await;

        match result {
            Ok(outcome) => {
                let drowning_detected = self.policy.verdict(outcome.drowning_count);
                session.complete(drowning_detected).await;
                tracing::info!(
                    drowning_count = outcome.drowning_count,
                    frames_read = outcome.frames_read,
                    stopped_early = outcome.stopped_early,
                    drowning_detected,
                    "Live detection completed",
                );
                Some(outcome)
            }
            Err(PipelineError::Cancelled) => {
                session.fail(PipelineError::Cancelled.to_string()).await;
                tracing::info!("Live detection cancelled");
                None
            }
            Err(e) => {
                session.fail(e.to_string()).await;
                tracing::error!(error = %e, "Live detection failed");
                None
            }
        }
    }

    async fn run_live(
        &self,
        session: &DetectionSession,
        upload: &Path,
    ) -> Result<LiveOutcome, PipelineError> {
        let cancel = session.cancel_token().clone();
        let _permit = self.acquire(&cancel).await?;

        let mut source = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(PipelineError::Cancelled),
            opened = self.opener.open(upload) => opened?,
        };
        let metadata = source.metadata();
        tracing::info!(
            total_frames = metadata.total_frames,
            fps = metadata.fps,
            width = metadata.width,
            height = metadata.height,
            "Video opened",
        );
        session.begin(metadata.total_frames, metadata.fps).await;

        let result = self.consume_live(session, source.as_mut(), &cancel).await;
        source.close().await;
        result
    }

    async fn consume_live(
        &self,
        session: &DetectionSession,
        source: &mut dyn FrameSource,
        cancel: &CancellationToken,
    ) -> Result<LiveOutcome, PipelineError> {
        let fps = source.fps();
        let mut outcome = LiveOutcome {
            drowning_count: 0,
            frames_read: 0,
            stopped_early: false,
        };

        while let Some(frame) = next_frame(source, cancel).await? {
            outcome.frames_read += 1;
            session.advance(frame.index).await;
            if !self.policy.is_sampled(frame.index) {
                continue;
            }

            let Some(raw) = self.detect_sampled(&frame, cancel).await? else {
                continue;
            };
            outcome.drowning_count += self.policy.count_qualifying(&raw);

            let detections: Vec<Detection> = raw
                .iter()
                .map(|d| Detection::from_frame_detection(d, frame.index, fps))
                .collect();
            let snapshot = match self.render_snapshot(frame, &detections).await {
                Ok(snapshot) => Some(snapshot),
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to render frame snapshot");
                    None
                }
            };
            session
                .record_frame(detections, outcome.drowning_count, snapshot)
                .await;

            if self.policy.live_should_stop(outcome.drowning_count) {
                outcome.stopped_early = true;
                break;
            }
        }

        Ok(outcome)
    }

    /// Process `path` to a verdict without tracking a session.
    ///
    /// The caller owns the file.
    pub async fn run_simple(&self, path: &Path) -> Result<SimpleOutcome, PipelineError> {
        let cancel = CancellationToken::new();
        let _permit = self.acquire(&cancel).await?;

        let mut source = self.opener.open(path).await?;
        let result = self.consume_simple(source.as_mut(), &cancel).await;
        source.close().await;
        let (drowning_count, frames_read) = result?;

        let outcome = SimpleOutcome {
            drowning_detected: self.policy.verdict(drowning_count),
            drowning_count,
            frames_read,
        };
        tracing::info!(
            drowning_count,
            frames_read,
            drowning_detected = outcome.drowning_detected,
            "Detection finished",
        );
        Ok(outcome)
    }

    async fn consume_simple(
        &self,
        source: &mut dyn FrameSource,
        cancel: &CancellationToken,
    ) -> Result<(u32, u64), PipelineError> {
        let mut drowning_count = 0;
        let mut frames_read = 0;

        while let Some(frame) = next_frame(source, cancel).await? {
            frames_read += 1;
            if !self.policy.is_sampled(frame.index) {
                continue;
            }
            if let Some(raw) = self.detect_sampled(&frame, cancel).await? {
                drowning_count += self.policy.count_qualifying(&raw);
            }
            if self.policy.simple_should_stop(drowning_count) {
                break;
            }
        }

        Ok((drowning_count, frames_read))
    }

    async fn acquire(&self, cancel: &CancellationToken) -> Result<SemaphorePermit<'_>, PipelineError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(PipelineError::Cancelled),
            permit = self.permits.acquire() => permit.map_err(|_| PipelineError::WorkersClosed),
        }
    }

    /// Run the detector on a sampled frame.
    ///
    /// Per-frame failures are logged and yield `None`; cancellation and
    /// anything else is returned.
    async fn detect_sampled(
        &self,
        frame: &Frame,
        cancel: &CancellationToken,
    ) -> Result<Option<Vec<FrameDetection>>, PipelineError> {
        match self.detect(frame, cancel).await {
            Ok(raw) => Ok(Some(raw)),
            Err(e) if e.is_per_frame() => {
                tracing::warn!(frame = frame.index, error = %e, "Skipping frame after detector failure");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    async fn detect(
        &self,
        frame: &Frame,
        cancel: &CancellationToken,
    ) -> Result<Vec<FrameDetection>, PipelineError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(PipelineError::Cancelled),
            result = tokio::time::timeout(self.detector_timeout, self.detector.detect(frame)) => {
                match result {
                    Ok(detections) => Ok(detections?),
                    Err(_) => Err(PipelineError::DetectorTimeout(self.detector_timeout)),
                }
            }
        }
    }

    async fn render_snapshot(
        &self,
        frame: Frame,
        detections: &[Detection],
    ) -> Result<EncodedFrame, PipelineError> {
        let annotator = self.annotator.clone();
        let policy = self.policy.clone();
        let detections = detections.to_vec();
        let rendered = tokio::task::spawn_blocking(move || {
            annotator.render(&frame.image, &detections, &policy)
        })
        .await
        .map_err(|e| PipelineError::Task(e.to_string()))?;
        Ok(rendered?)
    }
}

async fn next_frame(
    source: &mut dyn FrameSource,
    cancel: &CancellationToken,
) -> Result<Option<Frame>, PipelineError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(PipelineError::Cancelled),
        frame = source.next_frame() => Ok(frame?),
    }
}

/// Delete a staged upload. A file that is already gone is not an error.
pub async fn remove_upload(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => tracing::debug!(path = %path.display(), "Removed upload"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(path = %path.display(), error = %e, "Failed to remove upload"),
    }
}

impl std::fmt::Debug for DetectionPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DetectionPipeline")
            .field("detector", &self.detector.name())
            .field("policy", &self.policy)
            .field("detector_timeout", &self.detector_timeout)
            .finish_non_exhaustive()
    }
}
