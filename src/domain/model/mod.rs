// Domain models - Core types and data structures

use std::fmt;
use std::path::{Path, PathBuf};

use crate::domain::errors::DomainError;

/// Zero-based frame index into a source video
pub type FrameIndex = u64;

/// Fallback rate used when a container reports no usable frame rate
pub const FALLBACK_FPS: f64 = 30.0;

/// Properties derived from a source video every time it is opened
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VideoProperties {
    pub frame_count: u64,
    pub width: u32,
    pub height: u32,
    /// Reported frame rate; zero or negative when the container does not know it
    pub fps: f64,
}

impl VideoProperties {
    /// Create new video properties with validation
    pub fn new(frame_count: u64, width: u32, height: u32, fps: f64) -> Result<Self, DomainError> {
        if frame_count == 0 {
            return Err(DomainError::SourceUnavailable(
                "Video reports no frames".to_string(),
            ));
        }
        if width == 0 || height == 0 {
            return Err(DomainError::SourceUnavailable(
                "Video dimensions cannot be zero".to_string(),
            ));
        }

        Ok(Self {
            frame_count,
            width,
            height,
            fps,
        })
    }

    /// Pixel dimensions of a decoded frame
    pub fn frame_size(&self) -> PixelSize {
        PixelSize::new(self.width, self.height)
    }

    /// Whether the reported frame rate can be used for timing
    pub fn has_known_fps(&self) -> bool {
        self.fps.is_finite() && self.fps > 0.0
    }

    /// Frame rate to use for timing, falling back to 30fps
    pub fn effective_fps(&self) -> f64 {
        if self.has_known_fps() {
            self.fps
        } else {
            FALLBACK_FPS
        }
    }

    /// Integer output frame rate for constant-frame-rate re-encoding
    pub fn output_fps(&self) -> u32 {
        if !self.has_known_fps() {
            return FALLBACK_FPS as u32;
        }
        (self.fps.round() as u32).max(1)
    }

    /// Convert a frame count to seconds of source time at the effective rate
    pub fn frames_to_seconds(&self, frames: u64) -> f64 {
        frames as f64 / self.effective_fps()
    }
}

/// A video opened for editing, identified by its immutable path
#[derive(Debug, Clone, PartialEq)]
pub struct VideoSource {
    pub path: PathBuf,
    pub properties: VideoProperties,
}

impl VideoSource {
    pub fn new(path: impl Into<PathBuf>, properties: VideoProperties) -> Self {
        Self {
            path: path.into(),
            properties,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn frame_count(&self) -> u64 {
        self.properties.frame_count
    }
}

/// Opaque identity of a range, stable across edits
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RangeId(String);

impl RangeId {
    /// Generate a fresh random identity
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for RangeId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for RangeId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for RangeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Width and height in whole pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PixelSize {
    pub width: u32,
    pub height: u32,
}

impl PixelSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Parse `WIDTHxHEIGHT`
    pub fn parse(value: &str) -> Result<Self, DomainError> {
        let normalized = value.trim().to_lowercase();
        let (w, h) = normalized
            .split_once('x')
            .ok_or_else(|| DomainError::Validation(format!("Expected WIDTHxHEIGHT, got '{}'", value)))?;
        let width = w
            .trim()
            .parse::<u32>()
            .map_err(|_| DomainError::Validation(format!("Invalid width in '{}'", value)))?;
        let height = h
            .trim()
            .parse::<u32>()
            .map_err(|_| DomainError::Validation(format!("Invalid height in '{}'", value)))?;
        if width == 0 || height == 0 {
            return Err(DomainError::Validation(format!(
                "Resolution must be non-zero: '{}'",
                value
            )));
        }
        Ok(Self::new(width, height))
    }

    pub fn to_size_f(self) -> SizeF {
        SizeF::new(self.width as f64, self.height as f64)
    }
}

impl fmt::Display for PixelSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Size of a scaled display surface
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SizeF {
    pub width: f64,
    pub height: f64,
}

impl SizeF {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

/// Point on a display surface
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointF {
    pub x: f64,
    pub y: f64,
}

impl PointF {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Rectangle in display-surface coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RectF {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl RectF {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Rectangle spanned by two corners, in either order
    pub fn from_corners(a: PointF, b: PointF) -> Self {
        let x = a.x.min(b.x);
        let y = a.y.min(b.y);
        Self::new(x, y, (a.x - b.x).abs(), (a.y - b.y).abs())
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }
}

/// Rectangle in source-pixel space before bounds clamping; may extend past the frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRect {
    pub x: i64,
    pub y: i64,
    pub width: i64,
    pub height: i64,
}

impl PixelRect {
    pub fn new(x: i64, y: i64, width: i64, height: i64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

impl From<CropRect> for PixelRect {
    fn from(crop: CropRect) -> Self {
        Self::new(
            crop.x as i64,
            crop.y as i64,
            crop.width as i64,
            crop.height as i64,
        )
    }
}

/// Crop rectangle in source-pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CropRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl CropRect {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Parse `x,y,w,h`
    pub fn parse(value: &str) -> Result<Self, DomainError> {
        let parts: Vec<u32> = value
            .split(',')
            .map(|part| part.trim().parse::<u32>())
            .collect::<Result<_, _>>()
            .map_err(|_| DomainError::Validation(format!("Invalid crop '{}', expected x,y,w,h", value)))?;
        match parts.as_slice() {
            [x, y, w, h] => Ok(Self::new(*x, *y, *w, *h)),
            _ => Err(DomainError::Validation(format!(
                "Invalid crop '{}', expected x,y,w,h",
                value
            ))),
        }
    }

    /// Whether the crop has area and lies entirely inside a frame of the given size
    pub fn fits_within(&self, frame: PixelSize) -> bool {
        self.width > 0
            && self.height > 0
            && self.x as u64 + self.width as u64 <= frame.width as u64
            && self.y as u64 + self.height as u64 <= frame.height as u64
    }

    /// Check the crop against a frame size
    pub fn validate_within(&self, frame: PixelSize) -> Result<(), DomainError> {
        if self.fits_within(frame) {
            Ok(())
        } else {
            Err(DomainError::Validation(format!(
                "Crop {} does not fit inside {}",
                self, frame
            )))
        }
    }

    pub fn size(&self) -> PixelSize {
        PixelSize::new(self.width, self.height)
    }
}

impl fmt::Display for CropRect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{},{},{})", self.x, self.y, self.width, self.height)
    }
}

/// A `[start, end)` frame interval on one source, with an optional crop
#[derive(Debug, Clone, PartialEq)]
pub struct Range {
    pub id: RangeId,
    pub start: FrameIndex,
    pub end: FrameIndex,
    pub crop: Option<CropRect>,
    /// 1-based position within the source's range list
    pub ordinal: u32,
}

impl Range {
    pub fn duration(&self) -> u64 {
        self.end.saturating_sub(self.start)
    }

    pub fn contains(&self, frame: FrameIndex) -> bool {
        self.start <= frame && frame < self.end
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Range {} [{}-{}]", self.ordinal, self.start, self.end)
    }
}

/// Width-to-height ratio as a rational number
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AspectRatio {
    pub width: u32,
    pub height: u32,
}

impl AspectRatio {
    pub fn new(width: u32, height: u32) -> Result<Self, DomainError> {
        if width == 0 || height == 0 {
            return Err(DomainError::Validation(
                "Aspect ratio terms must be positive".to_string(),
            ));
        }
        Ok(Self { width, height })
    }

    /// Parse `W:H`
    pub fn parse(value: &str) -> Result<Self, DomainError> {
        let normalized = value.trim().replace(' ', "");
        let (w, h) = normalized
            .split_once(':')
            .ok_or_else(|| DomainError::Validation(format!("Expected W:H, got '{}'", value)))?;
        let width = w
            .parse::<u32>()
            .map_err(|_| DomainError::Validation(format!("Invalid ratio '{}'", value)))?;
        let height = h
            .parse::<u32>()
            .map_err(|_| DomainError::Validation(format!("Invalid ratio '{}'", value)))?;
        Self::new(width, height)
    }

    pub fn value(&self) -> f64 {
        self.width as f64 / self.height as f64
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.width, self.height)
    }
}

/// Named ratio presets offered for crop shaping
pub const ASPECT_PRESETS: &[(&str, Option<(u32, u32)>)] = &[
    ("free", None),
    ("1:1", Some((1, 1))),
    ("4:3", Some((4, 3))),
    ("16:9", Some((16, 9))),
    ("9:16", Some((9, 16))),
    ("2:1", Some((2, 1))),
    ("3:2", Some((3, 2))),
    ("21:9", Some((21, 9))),
];

/// Rule shaping crop rectangles and export scaling; one mode at a time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AspectConstraint {
    #[default]
    Free,
    Ratio(AspectRatio),
    Resolution(PixelSize),
}

impl AspectConstraint {
    /// Parse `free`, a `W:H` ratio, or a `WxH` resolution
    pub fn parse(value: &str) -> Result<Self, DomainError> {
        let trimmed = value.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("free") || trimmed.eq_ignore_ascii_case("free-form") {
            return Ok(AspectConstraint::Free);
        }
        if trimmed.contains(':') {
            return AspectRatio::parse(trimmed).map(AspectConstraint::Ratio);
        }
        PixelSize::parse(trimmed).map(AspectConstraint::Resolution)
    }

    /// Build from the two mutually exclusive user settings
    pub fn from_settings(
        resolution: Option<PixelSize>,
        ratio: Option<AspectRatio>,
    ) -> Result<Self, DomainError> {
        match (resolution, ratio) {
            (Some(_), Some(_)) => Err(DomainError::Validation(
                "A fixed resolution and a fixed ratio cannot both be active".to_string(),
            )),
            (Some(size), None) => Ok(AspectConstraint::Resolution(size)),
            (None, Some(ratio)) => Ok(AspectConstraint::Ratio(ratio)),
            (None, None) => Ok(AspectConstraint::Free),
        }
    }

    /// Width/height ratio this constraint enforces, if any
    pub fn ratio(&self) -> Option<f64> {
        match self {
            AspectConstraint::Free => None,
            AspectConstraint::Ratio(ratio) => Some(ratio.value()),
            AspectConstraint::Resolution(size) => Some(size.width as f64 / size.height as f64),
        }
    }
}

impl fmt::Display for AspectConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AspectConstraint::Free => write!(f, "free"),
            AspectConstraint::Ratio(ratio) => write!(f, "{}", ratio),
            AspectConstraint::Resolution(size) => write!(f, "{}", size),
        }
    }
}
