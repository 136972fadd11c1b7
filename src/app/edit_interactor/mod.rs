// Edit interactor - Session mutations: folders, entries, ranges and crops

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info};
use walkdir::WalkDir;

use crate::domain::errors::*;
use crate::domain::model::*;
use crate::domain::ranges::RangeBounds;
use crate::domain::rules::CoordinateTransform;
use crate::domain::session::*;
use crate::ports::*;

/// How a crop is supplied
#[derive(Debug, Clone, PartialEq)]
pub enum CropEdit {
    Clear,
    /// Rectangle already in source pixels
    Source(CropRect),
    /// Rectangle drawn on a scaled display surface
    Display { rect: RectF, surface: SizeF },
}

/// Interactor for every state-changing editing action.
///
/// Each operation loads the session, applies one mutation and saves it again.
pub struct EditInteractor {
    session_port: Arc<dyn SessionPort>,
    video_opener: Arc<dyn VideoOpener>,
    default_duration: u64,
}

impl EditInteractor {
    /// Create new edit interactor with injected ports
    pub fn new(
        session_port: Arc<dyn SessionPort>,
        video_opener: Arc<dyn VideoOpener>,
        default_duration: u64,
    ) -> Self {
        Self {
            session_port,
            video_opener,
            default_duration,
        }
    }

    pub async fn session(&self) -> SessionState {
        self.session_port.load().await
    }

    /// Make `folder` current, listing the videos directly inside it
    pub async fn scan_folder(&self, folder: &Path) -> Result<Vec<VideoEntry>, DomainError> {
        if !folder.is_dir() {
            return Err(DomainError::Validation(format!(
                "Not a directory: {}",
                folder.display()
            )));
        }

        let mut names: Vec<String> = WalkDir::new(folder)
            .min_depth(1)
            .max_depth(1)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|entry| entry.file_type().is_file() && SessionState::is_video_file(entry.path()))
            .map(|entry| entry.file_name().to_string_lossy().to_string())
            .collect();
        names.sort();

        let mut state = self.session_port.load().await;
        let entries = state.merge_folder_scan(folder, &names).to_vec();
        self.session_port.save(&state).await?;
        info!(folder = %folder.display(), videos = entries.len(), "Folder scanned");
        Ok(entries)
    }

    pub async fn duplicate(&self, display_name: &str) -> Result<VideoEntry, DomainError> {
        let mut state = self.session_port.load().await;
        let entry = state.duplicate_entry(display_name)?.clone();
        self.session_port.save(&state).await?;
        info!(from = display_name, to = %entry.display_name, "Entry duplicated");
        Ok(entry)
    }

    pub async fn select(&self, display_name: &str, enabled: bool) -> Result<(), DomainError> {
        let mut state = self.session_port.load().await;
        state.set_export_enabled(display_name, enabled)?;
        self.session_port.save(&state).await
    }

    /// Persist the longest-edge export setting; zero clears it
    pub async fn set_longest_edge(&self, edge: u32) -> Result<Option<u32>, DomainError> {
        let mut state = self.session_port.load().await;
        state.longest_edge = Some(edge).filter(|e| *e > 0);
        self.session_port.save(&state).await?;
        Ok(state.longest_edge)
    }

    /// Ranges of a video in ordinal order
    pub async fn list_ranges(&self, video: &str) -> Result<(PathBuf, Vec<Range>), DomainError> {
        let state = self.session_port.load().await;
        let path = resolve_video(&state, video);
        let ranges = state.ranges.list_for_source(&path).to_vec();
        Ok((path, ranges))
    }

    pub async fn add_range(
        &self,
        video: &str,
        bounds: AddBounds,
        crop: Option<CropRect>,
    ) -> Result<Range, DomainError> {
        let mut state = self.session_port.load().await;
        let source = self.open_source(&resolve_video(&state, video)).await?;
        let bounds = match bounds {
            AddBounds::Explicit { start, end } => RangeBounds::Explicit { start, end },
            AddBounds::At { position, duration } => RangeBounds::AtPosition {
                position,
                default_duration: duration.unwrap_or(self.default_duration),
            },
        };

        let id = state.ranges.add_range(&source, bounds, crop)?;
        let range = state
            .ranges
            .find_by_id(&id)
            .cloned()
            .ok_or_else(|| DomainError::RangeNotFound(id.to_string()))?;
        self.session_port.save(&state).await?;
        info!(source = %source.path.display(), range = %range, "Range added");
        Ok(range)
    }

    /// Set or clear a crop, shaping it with `constraint` first
    pub async fn set_crop(
        &self,
        video: &str,
        range: &str,
        edit: CropEdit,
        constraint: &AspectConstraint,
    ) -> Result<Range, DomainError> {
        let mut state = self.session_port.load().await;
        let source = self.open_source(&resolve_video(&state, video)).await?;
        let id = resolve_range(&state, &source.path, range)?;
        let crop = Self::crop_for(edit, constraint, source.properties.frame_size())?;

        let updated = state.ranges.set_crop(&source, &id, crop)?.clone();
        self.session_port.save(&state).await?;
        debug!(range = %updated, crop = ?updated.crop, "Crop updated");
        Ok(updated)
    }

    /// Convert a crop edit into a stored crop in source pixels
    pub fn crop_for(
        edit: CropEdit,
        constraint: &AspectConstraint,
        frame: PixelSize,
    ) -> Result<Option<CropRect>, DomainError> {
        match edit {
            CropEdit::Clear => Ok(None),
            CropEdit::Source(rect) => {
                let shaped = match constraint.ratio() {
                    Some(ratio) => {
                        let as_f = RectF::new(
                            rect.x as f64,
                            rect.y as f64,
                            rect.width as f64,
                            rect.height as f64,
                        );
                        let fitted = CoordinateTransform::apply_aspect_constraint(&as_f, ratio);
                        PixelRect::new(
                            fitted.x as i64,
                            fitted.y as i64,
                            fitted.width as i64,
                            fitted.height as i64,
                        )
                    }
                    None => PixelRect::from(rect),
                };
                CoordinateTransform::clamp_to_bounds(&shaped, frame).map(Some)
            }
            CropEdit::Display { rect, surface } => {
                let shaped = match constraint.ratio() {
                    Some(ratio) => CoordinateTransform::apply_aspect_constraint(&rect, ratio),
                    None => rect,
                };
                let clipped = CoordinateTransform::clip_to_surface(&shaped, surface);
                CoordinateTransform::display_crop_to_source(&clipped, surface, frame).map(Some)
            }
        }
    }

    pub async fn update_duration(&self, video: &str, range: &str, duration: u64) -> Result<Range, DomainError> {
        self.mutate_range(video, range, |state, source, id| {
            state.ranges.update_duration(source, id, duration).cloned()
        })
        .await
    }

    pub async fn nudge_start(&self, video: &str, range: &str, delta: i64) -> Result<Range, DomainError> {
        self.mutate_range(video, range, |state, source, id| {
            state.ranges.nudge_start(source, id, delta).cloned()
        })
        .await
    }

    pub async fn nudge_end(&self, video: &str, range: &str, delta: i64) -> Result<Range, DomainError> {
        self.mutate_range(video, range, |state, source, id| {
            state.ranges.nudge_end(source, id, delta).cloned()
        })
        .await
    }

    pub async fn remove_range(&self, video: &str, range: &str) -> Result<Range, DomainError> {
        let mut state = self.session_port.load().await;
        let path = resolve_video(&state, video);
        let id = resolve_range(&state, &path, range)?;
        let removed = state.ranges.remove(&path, &id)?;
        self.session_port.save(&state).await?;
        info!(source = %path.display(), range = %removed, "Range removed");
        Ok(removed)
    }

    async fn mutate_range<F>(&self, video: &str, range: &str, apply: F) -> Result<Range, DomainError>
    where
        F: FnOnce(&mut SessionState, &VideoSource, &RangeId) -> Result<Range, DomainError>,
    {
        let mut state = self.session_port.load().await;
        let source = self.open_source(&resolve_video(&state, video)).await?;
        let id = resolve_range(&state, &source.path, range)?;
        let updated = apply(&mut state, &source, &id)?;
        self.session_port.save(&state).await?;
        debug!(range = %updated, "Range updated");
        Ok(updated)
    }

    /// Probe a source off the executor; properties are re-derived on every open
    async fn open_source(&self, path: &Path) -> Result<VideoSource, DomainError> {
        let opener = Arc::clone(&self.video_opener);
        let owned = path.to_path_buf();
        let properties = tokio::task::spawn_blocking(move || opener.probe(&owned))
            .await
            .map_err(|e| DomainError::Decode(format!("Probe worker failed: {}", e)))??;
        Ok(VideoSource::new(path, properties))
    }
}

/// Bounds supplied for a new range
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AddBounds {
    Explicit { start: FrameIndex, end: FrameIndex },
    /// Start at `position`; `None` uses the configured default duration
    At {
        position: FrameIndex,
        duration: Option<u64>,
    },
}

/// A display name from the current folder, or else a path as given
pub fn resolve_video(state: &SessionState, video: &str) -> PathBuf {
    state
        .entry(video)
        .map(|entry| entry.original_path.clone())
        .unwrap_or_else(|_| PathBuf::from(video))
}

/// A range id, or a 1-based ordinal within the source
pub fn resolve_range(state: &SessionState, source: &Path, token: &str) -> Result<RangeId, DomainError> {
    let ranges = state.ranges.list_for_source(source);
    if let Some(range) = ranges.iter().find(|r| r.id.as_str() == token) {
        return Ok(range.id.clone());
    }
    token
        .parse::<u32>()
        .ok()
        .and_then(|ordinal| ranges.iter().find(|r| r.ordinal == ordinal))
        .map(|range| range.id.clone())
        .ok_or_else(|| DomainError::RangeNotFound(token.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_crop_follows_worked_example() {
        let crop = EditInteractor::crop_for(
            CropEdit::Display {
                rect: RectF::new(100.0, 50.0, 200.0, 150.0),
                surface: SizeF::new(960.0, 540.0),
            },
            &AspectConstraint::Free,
            PixelSize::new(1920, 1080),
        )
        .unwrap();
        assert_eq!(crop, Some(CropRect::new(200, 100, 400, 300)));
    }

    #[test]
    fn test_source_crop_is_shaped_and_clamped() {
        let square = AspectConstraint::Ratio(AspectRatio::new(1, 1).unwrap());
        let crop = EditInteractor::crop_for(
            CropEdit::Source(CropRect::new(100, 100, 400, 200)),
            &square,
            PixelSize::new(1920, 1080),
        )
        .unwrap();
        assert_eq!(crop, Some(CropRect::new(100, 100, 200, 200)));

        let clamped = EditInteractor::crop_for(
            CropEdit::Source(CropRect::new(1800, 1000, 400, 400)),
            &AspectConstraint::Free,
            PixelSize::new(1920, 1080),
        )
        .unwrap();
        assert_eq!(clamped, Some(CropRect::new(1800, 1000, 120, 80)));
    }

    #[test]
    fn test_degenerate_crop_rejected() {
        let result = EditInteractor::crop_for(
            CropEdit::Source(CropRect::new(1920, 0, 10, 10)),
            &AspectConstraint::Free,
            PixelSize::new(1920, 1080),
        );
        assert_eq!(result, Err(DomainError::DegenerateCrop));
    }

    #[test]
    fn test_resolve_range_by_ordinal() {
        let mut state = SessionState::new();
        let source = VideoSource::new(
            "/v/a.mp4",
            VideoProperties::new(100, 64, 48, 25.0).unwrap(),
        );
        let first = state
            .ranges
            .add_range(&source, RangeBounds::Explicit { start: 0, end: 10 }, None)
            .unwrap();
        let second = state
            .ranges
            .add_range(&source, RangeBounds::Explicit { start: 20, end: 30 }, None)
            .unwrap();

        assert_eq!(resolve_range(&state, source.path(), "2").unwrap(), second);
        assert_eq!(resolve_range(&state, source.path(), first.as_str()).unwrap(), first);
        assert!(resolve_range(&state, source.path(), "7").is_err());
        assert_eq!(resolve_video(&state, "/v/a.mp4"), PathBuf::from("/v/a.mp4"));
    }
}
