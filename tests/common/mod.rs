//! In-memory port implementations shared by the integration tests

#![allow(dead_code)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use image::{Rgb, RgbImage};

use rangecrop_cli::domain::session::SessionState;
use rangecrop_cli::ports::*;
use rangecrop_cli::{DomainError, FrameIndex, VideoProperties};

/// Red channel of every pixel in a fake frame, so tests can tell frames apart
pub fn frame_marker(index: FrameIndex) -> u8 {
    (index % 256) as u8
}

/// Decoder over synthetic frames
pub struct FakeSource {
    properties: VideoProperties,
    position: FrameIndex,
    failing: HashSet<FrameIndex>,
    reads_left: Option<usize>,
}

impl FakeSource {
    pub fn new(properties: VideoProperties) -> Self {
        Self {
            properties,
            position: 0,
            failing: HashSet::new(),
            reads_left: None,
        }
    }

    /// Reads of these frames fail with a decode error
    pub fn failing_at(mut self, frames: &[FrameIndex]) -> Self {
        self.failing.extend(frames.iter().copied());
        self
    }

    /// Every read after the first `reads` fails
    pub fn failing_after(mut self, reads: usize) -> Self {
        self.reads_left = Some(reads);
        self
    }
}

impl FrameSource for FakeSource {
    fn properties(&self) -> VideoProperties {
        self.properties
    }

    fn position(&self) -> FrameIndex {
        self.position
    }

    fn seek(&mut self, frame: FrameIndex) -> Result<(), DomainError> {
        if frame >= self.properties.frame_count {
            return Err(DomainError::Decode(format!("seek past end: {}", frame)));
        }
        self.position = frame;
        Ok(())
    }

    fn read_frame(&mut self) -> Result<DecodedFrame, DomainError> {
        let index = self.position;
        if index >= self.properties.frame_count
            || self.failing.contains(&index)
            || self.reads_left == Some(0)
        {
            return Err(DomainError::Decode(format!("cannot decode frame {}", index)));
        }
        if let Some(left) = self.reads_left.as_mut() {
            *left -= 1;
        }
        self.position += 1;
        let image = RgbImage::from_pixel(
            self.properties.width,
            self.properties.height,
            Rgb([frame_marker(index), 0, 0]),
        );
        Ok(DecodedFrame { index, image })
    }
}

/// Opener for a fixed set of fake videos
#[derive(Default)]
pub struct FakeOpener {
    videos: Mutex<HashMap<PathBuf, VideoProperties>>,
    opens: AtomicUsize,
}

impl FakeOpener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_video(self, path: impl Into<PathBuf>, properties: VideoProperties) -> Self {
        self.add(path, properties);
        self
    }

    pub fn add(&self, path: impl Into<PathBuf>, properties: VideoProperties) {
        self.videos
            .lock()
            .unwrap()
            .insert(path.into(), properties);
    }

    pub fn open_count(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }
}

impl VideoOpener for FakeOpener {
    fn open(&self, path: &Path) -> Result<Box<dyn FrameSource>, DomainError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        let properties = self
            .videos
            .lock()
            .unwrap()
            .get(path)
            .copied()
            .ok_or_else(|| DomainError::SourceUnavailable(path.display().to_string()))?;
        Ok(Box::new(FakeSource::new(properties)))
    }
}

/// Transcoder that writes a marker file, or fails for outputs containing a pattern
#[derive(Default)]
pub struct FakeTranscoder {
    pub jobs: Mutex<Vec<TranscodeJob>>,
    pub conversions: Mutex<Vec<FpsConversionJob>>,
    fail_matching: Option<String>,
    /// Conversions fail while audio is stream-copied
    fail_audio_copy: bool,
}

impl FakeTranscoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_for(pattern: &str) -> Self {
        Self {
            fail_matching: Some(pattern.to_string()),
            ..Self::default()
        }
    }

    pub fn failing_audio_copy() -> Self {
        Self {
            fail_audio_copy: true,
            ..Self::default()
        }
    }

    fn should_fail(&self, output: &Path) -> bool {
        self.fail_matching
            .as_deref()
            .map(|pattern| output.to_string_lossy().contains(pattern))
            .unwrap_or(false)
    }
}

#[async_trait]
impl TranscodePort for FakeTranscoder {
    async fn transcode(&self, job: &TranscodeJob) -> Result<(), DomainError> {
        self.jobs.lock().unwrap().push(job.clone());
        // A failing encoder may leave a truncated file behind
        std::fs::write(&job.output, b"clip").map_err(|e| DomainError::Transcode(e.to_string()))?;
        if self.should_fail(&job.output) {
            return Err(DomainError::Transcode("encoder exited with status 1".to_string()));
        }
        Ok(())
    }

    async fn convert_fps(&self, job: &FpsConversionJob) -> Result<(), DomainError> {
        self.conversions.lock().unwrap().push(job.clone());
        std::fs::write(&job.output, b"converted").map_err(|e| DomainError::Transcode(e.to_string()))?;
        if self.should_fail(&job.input) || (self.fail_audio_copy && job.copy_audio) {
            return Err(DomainError::Transcode("encoder exited with status 1".to_string()));
        }
        Ok(())
    }
}

/// Session store that never touches the disk
#[derive(Default)]
pub struct MemorySession {
    state: Mutex<SessionState>,
    pub saves: AtomicUsize,
}

impl MemorySession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> SessionState {
        self.state.lock().unwrap().clone()
    }
}

#[async_trait]
impl SessionPort for MemorySession {
    async fn load(&self) -> SessionState {
        self.state.lock().unwrap().clone()
    }

    async fn save(&self, state: &SessionState) -> Result<(), DomainError> {
        *self.state.lock().unwrap() = state.clone();
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Captioning model that replays scripted answers
#[derive(Default)]
pub struct ScriptedCaptioner {
    pub image_answers: Mutex<VecDeque<Result<String, CaptionFailure>>>,
    pub upload_answers: Mutex<VecDeque<Result<UploadHandle, CaptionFailure>>>,
    pub status_answers: Mutex<VecDeque<Result<UploadState, CaptionFailure>>>,
    pub video_answers: Mutex<VecDeque<Result<String, CaptionFailure>>>,
    pub image_calls: AtomicUsize,
    pub upload_calls: AtomicUsize,
    pub video_calls: AtomicUsize,
    pub deleted: Mutex<Vec<String>>,
    pub prompts: Mutex<Vec<String>>,
}

impl ScriptedCaptioner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handle() -> UploadHandle {
        UploadHandle {
            name: "files/abc123".to_string(),
            uri: "https://example.invalid/files/abc123".to_string(),
            mime_type: "video/mp4".to_string(),
        }
    }

    pub fn image(self, answer: Result<&str, CaptionFailure>) -> Self {
        self.image_answers
            .lock()
            .unwrap()
            .push_back(answer.map(str::to_string));
        self
    }

    pub fn upload(self, answer: Result<UploadHandle, CaptionFailure>) -> Self {
        self.upload_answers.lock().unwrap().push_back(answer);
        self
    }

    pub fn status(self, answer: Result<UploadState, CaptionFailure>) -> Self {
        self.status_answers.lock().unwrap().push_back(answer);
        self
    }

    pub fn video(self, answer: Result<&str, CaptionFailure>) -> Self {
        self.video_answers
            .lock()
            .unwrap()
            .push_back(answer.map(str::to_string));
        self
    }

    fn next<T>(queue: &Mutex<VecDeque<Result<T, CaptionFailure>>>) -> Result<T, CaptionFailure> {
        queue
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(CaptionFailure::Permanent("no scripted answer".to_string())))
    }
}

#[async_trait]
impl CaptionPort for ScriptedCaptioner {
    async fn generate_from_image(&self, _path: &Path, prompt: &str) -> Result<String, CaptionFailure> {
        self.image_calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.to_string());
        Self::next(&self.image_answers)
    }

    async fn upload_video(&self, _path: &Path) -> Result<UploadHandle, CaptionFailure> {
        self.upload_calls.fetch_add(1, Ordering::SeqCst);
        Self::next(&self.upload_answers)
    }

    async fn poll_status(&self, _handle: &UploadHandle) -> Result<UploadState, CaptionFailure> {
        let mut queue = self.status_answers.lock().unwrap();
        queue.pop_front().unwrap_or(Ok(UploadState::Active))
    }

    async fn generate_from_video(
        &self,
        _handle: &UploadHandle,
        prompt: &str,
        _timeout: Duration,
    ) -> Result<String, CaptionFailure> {
        self.video_calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.to_string());
        Self::next(&self.video_answers)
    }

    async fn delete_upload(&self, handle: &UploadHandle) -> Result<(), CaptionFailure> {
        self.deleted.lock().unwrap().push(handle.name.clone());
        Ok(())
    }
}

pub fn props(frame_count: u64, width: u32, height: u32, fps: f64) -> VideoProperties {
    VideoProperties::new(frame_count, width, height, fps).unwrap()
}
