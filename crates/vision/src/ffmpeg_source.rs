//! Frame source that decodes through an `ffmpeg` child process.
//!
//! The video is probed with `ffprobe` for its dimensions and metadata, then
//! `ffmpeg` decodes it to raw `rgb24` on stdout. Each frame is exactly
//! `width * height * 3` bytes.

use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use image::RgbImage;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, ChildStdout};
use tokio::task::JoinHandle;

use crate::ffmpeg::{self, FfmpegError};
use crate::frame::Frame;
use crate::source::{FrameSource, FrameSourceError, VideoMetadata, VideoOpener};

/// Keep at most this much of ffmpeg's stderr for error messages.
const STDERR_TAIL_BYTES: usize = 4096;

/// Opens videos with the system `ffprobe` and `ffmpeg` binaries.
#[derive(Debug, Default, Clone)]
pub struct FfmpegOpener;

impl FfmpegOpener {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl VideoOpener for FfmpegOpener {
    async fn open(&self, path: &Path) -> Result<Box<dyn FrameSource>, FrameSourceError> {
        let source = FfmpegFrameSource::open(path).await?;
        Ok(Box::new(source))
    }
}

pub struct FfmpegFrameSource {
    metadata: VideoMetadata,
    child: Option<Child>,
    stdout: Option<ChildStdout>,
    stderr_task: Option<JoinHandle<String>>,
    frame_len: usize,
    next_index: u64,
}

impl FfmpegFrameSource {
    pub async fn open(path: &Path) -> Result<Self, FrameSourceError> {
        let probe = ffmpeg::probe_video(path).await.map_err(unreadable)?;
        if ffmpeg::first_video_stream(&probe).is_none() {
            return Err(FrameSourceError::UnreadableVideo(
                "no video stream found".to_string(),
            ));
        }

        let (width, height) = ffmpeg::parse_resolution(&probe);
        if width == 0 || height == 0 {
            return Err(FrameSourceError::UnreadableVideo(format!(
                "invalid frame size {width}x{height}"
            )));
        }

        let metadata = VideoMetadata {
            total_frames: ffmpeg::parse_total_frames(&probe),
            fps: ffmpeg::parse_framerate(&probe),
            width,
            height,
        };

        let mut child = tokio::process::Command::new("ffmpeg")
            .args(["-nostdin", "-v", "error", "-i"])
            .arg(path)
            .args(["-f", "rawvideo", "-pix_fmt", "rgb24", "pipe:1"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| unreadable(FfmpegError::NotFound(e)))?;

        let stdout = child.stdout.take();
        let stderr_task = child.stderr.take().map(|s| tokio::spawn(drain_tail(s)));

        tracing::debug!(
            path = %path.display(),
            width,
            height,
            total_frames = metadata.total_frames,
            fps = metadata.fps,
            "Opened video for decoding",
        );

        Ok(Self {
            metadata,
            child: Some(child),
            stdout,
            stderr_task,
            frame_len: width as usize * height as usize * 3,
            next_index: 1,
        })
    }

    /// Called once stdout is exhausted. A decoder that exits non-zero before
    /// producing any frame is a decode error; otherwise the stream just ended.
    async fn finish(&mut self) -> Result<Option<Frame>, FrameSourceError> {
        self.stdout = None;
        let status = match self.child.as_mut() {
            Some(child) => Some(child.wait().await?),
            None => None,
        };
        self.child = None;
        let stderr = match self.stderr_task.take() {
            Some(task) => task.await.unwrap_or_default(),
            None => String::new(),
        };

        match status {
            Some(status) if !status.success() && self.next_index == 1 => {
                Err(FrameSourceError::Decode(format!(
                    "ffmpeg exited with {status}: {}",
                    stderr.trim()
                )))
            }
            _ => Ok(None),
        }
    }
}

#[async_trait]
impl FrameSource for FfmpegFrameSource {
    fn metadata(&self) -> VideoMetadata {
        self.metadata
    }

    async fn next_frame(&mut self) -> Result<Option<Frame>, FrameSourceError> {
        let Some(stdout) = self.stdout.as_mut() else {
            return Ok(None);
        };

        let mut buf = vec![0u8; self.frame_len];
        match stdout.read_exact(&mut buf).await {
            Ok(_) => {}
            // Clean EOF or a truncated trailing frame both end the stream.
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                return self.finish().await;
            }
            Err(e) => return Err(e.into()),
        }

        let image = RgbImage::from_raw(self.metadata.width, self.metadata.height, buf)
            .ok_or_else(|| FrameSourceError::Decode("frame buffer size mismatch".to_string()))?;

        let index = self.next_index;
        self.next_index += 1;
        Ok(Some(Frame::new(index, image)))
    }

    async fn close(&mut self) {
        self.stdout = None;
        if let Some(mut child) = self.child.take() {
            if let Err(e) = child.start_kill() {
                tracing::debug!(error = %e, "ffmpeg already exited");
            }
            if let Err(e) = child.wait().await {
                tracing::warn!(error = %e, "Failed to reap ffmpeg process");
            }
        }
        if let Some(task) = self.stderr_task.take() {
            task.abort();
        }
    }
}

fn unreadable(e: FfmpegError) -> FrameSourceError {
    FrameSourceError::UnreadableVideo(e.to_string())
}

/// Read a stream to the end, keeping only its last few kilobytes.
async fn drain_tail<R: AsyncRead + Unpin>(mut reader: R) -> String {
    let mut tail: Vec<u8> = Vec::new();
    let mut chunk = [0u8; 1024];
    loop {
        match reader.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                tail.extend_from_slice(&chunk[..n]);
                if tail.len() > STDERR_TAIL_BYTES {
                    let excess = tail.len() - STDERR_TAIL_BYTES;
                    tail.drain(..excess);
                }
            }
        }
    }
    String::from_utf8_lossy(&tail).into_owned()
}
