// Domain rules - Geometry, export shaping and naming policies

use std::time::Duration;

use crate::domain::errors::*;
use crate::domain::model::*;

/// Smallest extent substituted for a collapsed side while a rectangle is being drawn
pub const MIN_EXTENT: f64 = 1.0;

/// Gestures smaller than this (in display units) on either side are discarded
pub const MIN_GESTURE_EXTENT: f64 = 20.0;

/// Maps rectangles between a scaled display surface and source-pixel space
pub struct CoordinateTransform;

impl CoordinateTransform {
    /// Scale a display rectangle into source pixels, truncating to whole pixels.
    ///
    /// Each axis is scaled independently, so the display surface does not have
    /// to share the source's aspect ratio.
    pub fn to_source(
        display_rect: &RectF,
        display_size: SizeF,
        source_size: PixelSize,
    ) -> Result<PixelRect, DomainError> {
        if display_size.width <= 0.0 || display_size.height <= 0.0 {
            return Err(DomainError::Validation(
                "Display surface has no area".to_string(),
            ));
        }
        let scale_w = source_size.width as f64 / display_size.width;
        let scale_h = source_size.height as f64 / display_size.height;

        Ok(PixelRect::new(
            (display_rect.x * scale_w) as i64,
            (display_rect.y * scale_h) as i64,
            (display_rect.width * scale_w) as i64,
            (display_rect.height * scale_h) as i64,
        ))
    }

    /// Inverse of [`CoordinateTransform::to_source`]
    pub fn to_display(
        source_rect: &CropRect,
        display_size: SizeF,
        source_size: PixelSize,
    ) -> Result<RectF, DomainError> {
        if source_size.width == 0 || source_size.height == 0 {
            return Err(DomainError::Validation("Source has no area".to_string()));
        }
        let scale_w = display_size.width / source_size.width as f64;
        let scale_h = display_size.height / source_size.height as f64;

        Ok(RectF::new(
            source_rect.x as f64 * scale_w,
            source_rect.y as f64 * scale_h,
            source_rect.width as f64 * scale_w,
            source_rect.height as f64 * scale_h,
        ))
    }

    /// Intersect a rectangle with `[0, bounds)`.
    ///
    /// Returns [`DomainError::DegenerateCrop`] when nothing with positive area is left;
    /// callers discard the crop action in that case.
    pub fn clamp_to_bounds(rect: &PixelRect, bounds: PixelSize) -> Result<CropRect, DomainError> {
        let left = rect.x.max(0);
        let top = rect.y.max(0);
        let right = rect.x.saturating_add(rect.width).min(bounds.width as i64);
        let bottom = rect.y.saturating_add(rect.height).min(bounds.height as i64);

        let width = right - left;
        let height = bottom - top;
        if width <= 0 || height <= 0 {
            return Err(DomainError::DegenerateCrop);
        }

        Ok(CropRect::new(
            left as u32,
            top as u32,
            width as u32,
            height as u32,
        ))
    }

    /// Shrink one side of `rect` so that `width / height == ratio`, keeping its origin
    pub fn apply_aspect_constraint(rect: &RectF, ratio: f64) -> RectF {
        let width = rect.width.max(MIN_EXTENT);
        let height = rect.height.max(MIN_EXTENT);

        if width / height > ratio {
            RectF::new(rect.x, rect.y, height * ratio, height)
        } else {
            RectF::new(rect.x, rect.y, width, width / ratio)
        }
    }

    /// Clip a display rectangle to the display surface
    pub fn clip_to_surface(rect: &RectF, surface: SizeF) -> RectF {
        let left = rect.x.max(0.0);
        let top = rect.y.max(0.0);
        let right = rect.right().min(surface.width);
        let bottom = rect.bottom().min(surface.height);
        RectF::new(left, top, (right - left).max(0.0), (bottom - top).max(0.0))
    }

    /// Full display-to-source conversion used when a crop gesture is committed
    pub fn display_crop_to_source(
        display_rect: &RectF,
        display_size: SizeF,
        source_size: PixelSize,
    ) -> Result<CropRect, DomainError> {
        let raw = Self::to_source(display_rect, display_size, source_size)?;
        Self::clamp_to_bounds(&raw, source_size)
    }
}

/// An in-progress rectangle drag on the display surface.
///
/// The aspect constraint is applied on every update, so the visible rectangle
/// always satisfies it.
#[derive(Debug, Clone)]
pub struct CropGesture {
    anchor: PointF,
    surface: SizeF,
    ratio: Option<f64>,
    current: RectF,
}

impl CropGesture {
    pub fn begin(anchor: PointF, surface: SizeF, constraint: &AspectConstraint) -> Self {
        Self {
            anchor,
            surface,
            ratio: constraint.ratio(),
            current: RectF::new(anchor.x, anchor.y, 0.0, 0.0),
        }
    }

    /// Update the free corner and return the constrained rectangle
    pub fn drag_to(&mut self, point: PointF) -> RectF {
        let mut rect = RectF::from_corners(self.anchor, point);
        if let Some(ratio) = self.ratio {
            rect = CoordinateTransform::apply_aspect_constraint(&rect, ratio);
        }
        self.current = CoordinateTransform::clip_to_surface(&rect, self.surface);
        self.current
    }

    /// Switch constraint mid-gesture and reshape the current rectangle
    pub fn set_constraint(&mut self, constraint: &AspectConstraint) -> RectF {
        self.ratio = constraint.ratio();
        if let Some(ratio) = self.ratio {
            let reshaped = CoordinateTransform::apply_aspect_constraint(&self.current, ratio);
            self.current = CoordinateTransform::clip_to_surface(&reshaped, self.surface);
        }
        self.current
    }

    pub fn current(&self) -> RectF {
        self.current
    }

    /// Finish the gesture; tiny rectangles are treated as an accidental click
    pub fn finish(self) -> Option<RectF> {
        if self.current.width >= MIN_GESTURE_EXTENT && self.current.height >= MIN_GESTURE_EXTENT {
            Some(self.current)
        } else {
            None
        }
    }
}

/// Round to the nearest even integer, never below 2
pub fn round_to_even(value: f64) -> u32 {
    let even = ((value / 2.0).round() * 2.0) as i64;
    even.max(2) as u32
}

/// Business rules for export-time scaling
pub struct ScaleRule;

impl ScaleRule {
    /// Output dimensions for a segment whose natural size is `natural`.
    ///
    /// Returns `None` when no scale step is needed. The stored crop is treated as
    /// authoritative pixel data; ratio conformance is re-derived here.
    pub fn output_dimensions(
        natural: PixelSize,
        constraint: &AspectConstraint,
        longest_edge: Option<u32>,
    ) -> Option<PixelSize> {
        let (width, height) = match constraint {
            AspectConstraint::Resolution(size) => (size.width as f64, size.height as f64),
            AspectConstraint::Ratio(ratio) => {
                let shaped = CoordinateTransform::apply_aspect_constraint(
                    &RectF::new(0.0, 0.0, natural.width as f64, natural.height as f64),
                    ratio.value(),
                );
                Self::fit_longest_edge(shaped.width, shaped.height, longest_edge)
            }
            AspectConstraint::Free => {
                Self::fit_longest_edge(natural.width as f64, natural.height as f64, longest_edge)
            }
        };

        let target = PixelSize::new(round_to_even(width), round_to_even(height));
        if target == natural {
            None
        } else {
            Some(target)
        }
    }

    fn fit_longest_edge(width: f64, height: f64, longest_edge: Option<u32>) -> (f64, f64) {
        match longest_edge {
            Some(edge) if edge > 0 => {
                let factor = edge as f64 / width.max(height);
                (width * factor, height * factor)
            }
            _ => (width, height),
        }
    }
}

/// Derives base names for the artifacts of one export batch
#[derive(Debug, Clone)]
pub struct OutputNaming {
    prefix: Option<String>,
    counter: u32,
}

impl OutputNaming {
    pub fn new(prefix: Option<&str>) -> Self {
        let prefix = prefix
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(str::to_string);
        Self { prefix, counter: 0 }
    }

    /// Base name for the next range; the counter only advances in prefix mode
    pub fn next_base(&mut self, display_name: &str, ordinal: u32) -> String {
        match &self.prefix {
            Some(prefix) => {
                self.counter += 1;
                format!("{}_{:05}_range{}", prefix, self.counter, ordinal)
            }
            None => {
                let stem = std::path::Path::new(display_name)
                    .file_stem()
                    .map(|s| s.to_string_lossy().to_string())
                    .unwrap_or_else(|| display_name.to_string());
                format!("{}_range{}", stem, ordinal)
            }
        }
    }
}

/// Caption text policies
pub struct CaptionRule;

impl CaptionRule {
    /// Join trigger phrase and caption text; `None` when both are empty
    pub fn compose(trigger: &str, text: Option<&str>) -> Option<String> {
        let parts: Vec<&str> = [trigger.trim(), text.unwrap_or("").trim()]
            .into_iter()
            .filter(|part| !part.is_empty())
            .collect();
        if parts.is_empty() {
            None
        } else {
            Some(parts.join(", "))
        }
    }

    /// Strip markdown emphasis from model output; empty output counts as no caption
    pub fn clean_generated(raw: &str) -> Option<String> {
        let cleaned = raw.replace('*', "");
        let cleaned = cleaned.trim();
        if cleaned.is_empty() {
            None
        } else {
            Some(cleaned.to_string())
        }
    }
}

/// Playback timing rules
pub struct PlaybackTiming;

impl PlaybackTiming {
    /// Timer cadence for continuous playback
    pub fn tick_interval(fps: f64) -> Duration {
        let fps = if fps.is_finite() && fps > 0.0 {
            fps
        } else {
            FALLBACK_FPS
        };
        Duration::from_millis(((1000.0 / fps) as u64).max(1))
    }

    /// Frame delta for a jump of `seconds`, at least one frame in the jump's direction
    pub fn frames_for_seconds(seconds: f64, fps: f64) -> i64 {
        let fps = if fps.is_finite() && fps > 0.0 {
            fps
        } else {
            FALLBACK_FPS
        };
        let frames = (seconds * fps).round() as i64;
        if frames == 0 {
            if seconds < 0.0 {
                -1
            } else {
                1
            }
        } else {
            frames
        }
    }
}
