// Ports - Interface definitions (contracts)

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use image::RgbImage;

use crate::domain::errors::*;
use crate::domain::model::*;
use crate::domain::session::SessionState;

/// One decoded frame, tagged with the index it was decoded at
#[derive(Debug, Clone)]
pub struct DecodedFrame {
    pub index: FrameIndex,
    pub image: RgbImage,
}

/// Port for opening source videos for frame-accurate reading
pub trait VideoOpener: Send + Sync {
    /// Open a video and derive its properties
    fn open(&self, path: &Path) -> Result<Box<dyn FrameSource>, DomainError>;

    /// Properties only, without keeping a decoder around
    fn probe(&self, path: &Path) -> Result<VideoProperties, DomainError> {
        Ok(self.open(path)?.properties())
    }
}

/// Exclusive decoder handle for one open source.
///
/// Methods take `&mut self`, so a seek and a read can never overlap on one handle.
pub trait FrameSource {
    fn properties(&self) -> VideoProperties;

    /// Index of the frame the next `read_frame` will return
    fn position(&self) -> FrameIndex;

    fn seek(&mut self, frame: FrameIndex) -> Result<(), DomainError>;

    /// Decode the frame at `position()` and advance by one
    fn read_frame(&mut self) -> Result<DecodedFrame, DomainError>;

    fn seek_and_read(&mut self, frame: FrameIndex) -> Result<DecodedFrame, DomainError> {
        self.seek(frame)?;
        self.read_frame()
    }
}

/// One step of a transcoder filter graph
#[derive(Debug, Clone, PartialEq)]
pub enum FilterStep {
    /// Constant output frame rate
    Fps(u32),
    Crop(CropRect),
    Scale(PixelSize),
    /// Reset pixel aspect ratio to 1:1
    SetSar,
}

impl fmt::Display for FilterStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterStep::Fps(fps) => write!(f, "fps=fps={}:round=up", fps),
            FilterStep::Crop(rect) => write!(
                f,
                "crop={}:{}:{}:{}",
                rect.width, rect.height, rect.x, rect.y
            ),
            FilterStep::Scale(size) => write!(f, "scale={}:{}", size.width, size.height),
            FilterStep::SetSar => write!(f, "setsar=1"),
        }
    }
}

/// Render an ordered filter list as a single filter-graph expression
pub fn render_filter_graph(steps: &[FilterStep]) -> String {
    steps
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

/// A single re-encode of a time window of one source
#[derive(Debug, Clone, PartialEq)]
pub struct TranscodeJob {
    pub input: PathBuf,
    pub output: PathBuf,
    pub start_seconds: f64,
    pub duration_seconds: f64,
    pub filters: Vec<FilterStep>,
    pub output_fps: u32,
    pub preset: String,
    pub crf: u8,
}

/// Whole-file frame-rate conversion
#[derive(Debug, Clone, PartialEq)]
pub struct FpsConversionJob {
    pub input: PathBuf,
    pub output: PathBuf,
    pub fps: u32,
    /// Stream-copy the audio track instead of dropping it
    pub copy_audio: bool,
}

/// Port for the external transcoder
#[async_trait]
pub trait TranscodePort: Send + Sync {
    async fn transcode(&self, job: &TranscodeJob) -> Result<(), DomainError>;

    async fn convert_fps(&self, job: &FpsConversionJob) -> Result<(), DomainError>;
}

/// Classified failure of a captioning call
#[derive(Debug, Clone, PartialEq)]
pub enum CaptionFailure {
    /// Worth retrying: network, rate limit, server error
    Transient(String),
    /// Retrying cannot help: missing credential, rejected request
    Permanent(String),
}

impl CaptionFailure {
    pub fn is_transient(&self) -> bool {
        matches!(self, CaptionFailure::Transient(_))
    }
}

impl fmt::Display for CaptionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaptionFailure::Transient(msg) => write!(f, "transient: {}", msg),
            CaptionFailure::Permanent(msg) => write!(f, "permanent: {}", msg),
        }
    }
}

impl From<CaptionFailure> for DomainError {
    fn from(failure: CaptionFailure) -> Self {
        DomainError::Caption(failure.to_string())
    }
}

/// Server-side handle of an uploaded video
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadHandle {
    /// Resource name used for status and deletion
    pub name: String,
    /// URI referenced by generation requests
    pub uri: String,
    pub mime_type: String,
}

/// Processing state of an upload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadState {
    Processing,
    Active,
    Failed,
}

/// Port for the remote vision-language model
#[async_trait]
pub trait CaptionPort: Send + Sync {
    async fn generate_from_image(&self, path: &Path, prompt: &str)
        -> Result<String, CaptionFailure>;

    async fn upload_video(&self, path: &Path) -> Result<UploadHandle, CaptionFailure>;

    async fn poll_status(&self, handle: &UploadHandle) -> Result<UploadState, CaptionFailure>;

    async fn generate_from_video(
        &self,
        handle: &UploadHandle,
        prompt: &str,
        timeout: Duration,
    ) -> Result<String, CaptionFailure>;

    async fn delete_upload(&self, handle: &UploadHandle) -> Result<(), CaptionFailure>;
}

/// Port for session persistence
#[async_trait]
pub trait SessionPort: Send + Sync {
    /// Load saved state; unreadable or corrupt files yield an empty session
    async fn load(&self) -> SessionState;

    async fn save(&self, state: &SessionState) -> Result<(), DomainError>;
}
