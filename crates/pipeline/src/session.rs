//! Live state of one video analysis.
//!
//! A session is written by exactly one processing task and read by any number
//! of status polls and update streams. All mutable fields sit behind one
//! `RwLock` so every reader sees a consistent whole. Readers take the write
//! side only to clear the pending frame snapshot.

use chrono::Utc;
use lifeguard_core::detection::Detection;
use lifeguard_core::policy::progress_percent;
use lifeguard_core::status::SessionStatus;
use lifeguard_core::types::{FrameIndex, SessionId, Timestamp};
use lifeguard_vision::EncodedFrame;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use crate::payload::{tail, LiveUpdate, StatusSnapshot, TerminalEvent};

/// Mutable session fields.
#[derive(Debug, Clone)]
pub struct SessionState {
    pub status: SessionStatus,
    pub progress: u8,
    pub current_frame: FrameIndex,
    /// Never below `current_frame`.
    pub total_frames: u64,
    /// Frame count reported by the container; 0 when unknown.
    pub declared_total: u64,
    pub fps: f64,
    pub drowning_count: u32,
    pub detections: Vec<Detection>,
    pub result: Option<bool>,
    pub error: Option<String>,
    /// When the session reached a terminal status.
    pub finished_at: Option<Timestamp>,
    pending_frame: Option<EncodedFrame>,
}

impl SessionState {
    fn new() -> Self {
        Self {
            status: SessionStatus::Processing,
            progress: 0,
            current_frame: 0,
            total_frames: 0,
            declared_total: 0,
            fps: 0.0,
            drowning_count: 0,
            detections: Vec::new(),
            result: None,
            error: None,
            finished_at: None,
            pending_frame: None,
        }
    }

    pub fn has_pending_frame(&self) -> bool {
        self.pending_frame.is_some()
    }

    fn is_processing(&self) -> bool {
        self.status == SessionStatus::Processing
    }

    /// Progress stays at 0 while the container length is unknown.
    fn refresh_progress(&mut self) {
        if self.declared_total == 0 {
            return;
        }
        let progress = progress_percent(self.current_frame, self.total_frames);
        self.progress = self.progress.max(progress);
    }

    fn take_frame(&mut self) -> Option<String> {
        self.pending_frame.take().map(EncodedFrame::into_string)
    }

    fn terminal_event(&self) -> Option<TerminalEvent> {
        match self.status {
            SessionStatus::Processing => None,
            SessionStatus::Completed => Some(TerminalEvent::Completed {
                result: self.result.unwrap_or(false),
                total_detections: self.detections.len(),
                drowning_count: self.drowning_count,
            }),
            SessionStatus::Error => Some(TerminalEvent::Error {
                error: self.error.clone().unwrap_or_default(),
            }),
        }
    }
}

pub struct DetectionSession {
    id: SessionId,
    created_at: Timestamp,
    state: RwLock<SessionState>,
    cancel: CancellationToken,
}

impl std::fmt::Debug for DetectionSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DetectionSession")
            .field("id", &self.id)
            .field("created_at", &self.created_at)
            .finish_non_exhaustive()
    }
}

impl DetectionSession {
    pub fn new(id: SessionId) -> Self {
        Self {
            id,
            created_at: Utc::now(),
            state: RwLock::new(SessionState::new()),
            cancel: CancellationToken::new(),
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn created_at(&self) -> Timestamp {
        self.created_at
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Ask the processing task to stop. It records the cancellation itself.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Copy of the current state.
    pub async fn state(&self) -> SessionState {
        self.state.read().await.clone()
    }

    pub async fn status(&self) -> SessionStatus {
        self.state.read().await.status
    }

    pub async fn finished_at(&self) -> Option<Timestamp> {
        self.state.read().await.finished_at
    }

    // -- writer side ---------------------------------------------------------

    /// Record the container metadata once the video is open.
    pub async fn begin(&self, total_frames: u64, fps: f64) {
        let mut state = self.state.write().await;
        if !state.is_processing() {
            return;
        }
        state.declared_total = total_frames;
        state.total_frames = total_frames.max(state.current_frame);
        state.fps = if fps.is_finite() && fps > 0.0 { fps } else { 0.0 };
        state.refresh_progress();
    }

    /// Mark `frame` as consumed.
    ///
    /// Containers can under-report their length, or not report it at all;
    /// the total is raised so the current frame never exceeds it.
    pub async fn advance(&self, frame: FrameIndex) {
        let mut state = self.state.write().await;
        if !state.is_processing() || frame <= state.current_frame {
            return;
        }
        state.current_frame = frame;
        state.total_frames = state.total_frames.max(frame);
        state.refresh_progress();
    }

    /// Append one sampled frame's results.
    ///
    /// `snapshot`, when present, replaces any snapshot nobody has read yet.
    pub async fn record_frame(
        &self,
        detections: Vec<Detection>,
        drowning_count: u32,
        snapshot: Option<EncodedFrame>,
    ) {
        let mut state = self.state.write().await;
        if !state.is_processing() {
            return;
        }
        state.detections.extend(detections);
        let bounded = drowning_count.min(state.detections.len() as u32);
        state.drowning_count = state.drowning_count.max(bounded);
        if let Some(frame) = snapshot {
            state.pending_frame = Some(frame);
        }
    }

    /// Move to `completed`. Returns `false` if the session was already terminal.
    pub async fn complete(&self, result: bool) -> bool {
        let mut state = self.state.write().await;
        if !state.status.can_transition_to(SessionStatus::Completed) {
            return false;
        }
        state.status = SessionStatus::Completed;
        state.result = Some(result);
        state.progress = 100;
        state.finished_at = Some(Utc::now());
        true
    }

    /// Move to `error`. Returns `false` if the session was already terminal.
    pub async fn fail(&self, message: impl Into<String>) -> bool {
        let mut state = self.state.write().await;
        if !state.status.can_transition_to(SessionStatus::Error) {
            return false;
        }
        state.status = SessionStatus::Error;
        state.error = Some(message.into());
        state.finished_at = Some(Utc::now());
        true
    }

    // -- reader side ---------------------------------------------------------

    /// Status poll payload. Hands out and clears the pending frame snapshot.
    pub async fn status_snapshot(&self, detection_limit: usize) -> StatusSnapshot {
        let mut state = self.state.write().await;
        StatusSnapshot {
            session_id: self.id.to_string(),
            status: state.status,
            progress: state.progress,
            current_frame: state.current_frame,
            total_frames: state.total_frames,
            drowning_count: state.drowning_count,
            detections: tail(&state.detections, detection_limit),
            result: state.result,
            error: state.error.clone(),
            frame_data: state.take_frame(),
        }
    }

    /// One live-stream tick: the update, plus the terminal event when done.
    ///
    /// Both are read under the same lock so the terminal event always agrees
    /// with the update before it.
    pub async fn live_update(&self, detection_limit: usize) -> (LiveUpdate, Option<TerminalEvent>) {
        let mut state = self.state.write().await;
        let update = LiveUpdate {
            status: state.status,
            progress: state.progress,
            current_frame: state.current_frame,
            total_frames: state.total_frames,
            drowning_count: state.drowning_count,
            recent_detections: tail(&state.detections, detection_limit),
            frame_data: state.take_frame(),
        };
        (update, state.terminal_event())
    }
}
