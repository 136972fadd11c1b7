// Range store - Per-source collections of ranges and their editing operations

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::domain::errors::*;
use crate::domain::model::*;

/// How the bounds of a new range are chosen
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RangeBounds {
    /// Caller-supplied `[start, end)`; `end` is clamped to the source length
    Explicit { start: FrameIndex, end: FrameIndex },
    /// Start at the playback position and run for the default duration
    AtPosition {
        position: FrameIndex,
        default_duration: u64,
    },
}

impl RangeBounds {
    /// Resolve to concrete bounds for a source of `frame_count` frames
    pub fn resolve(&self, frame_count: u64) -> Result<(FrameIndex, FrameIndex), DomainError> {
        match *self {
            RangeBounds::Explicit { start, end } => {
                let end = end.min(frame_count);
                if start >= end {
                    return Err(DomainError::Validation(format!(
                        "Range start {} must be before end {} (source has {} frames)",
                        start, end, frame_count
                    )));
                }
                Ok((start, end))
            }
            RangeBounds::AtPosition {
                position,
                default_duration,
            } => {
                let mut start = position.min(frame_count);
                let mut end = start.saturating_add(default_duration.max(1)).min(frame_count);
                if end <= start {
                    end = (start + 1).min(frame_count);
                }
                if start >= end {
                    start = end.saturating_sub(1);
                }
                if start >= end {
                    return Err(DomainError::Validation(
                        "Source is too short to hold a range".to_string(),
                    ));
                }
                Ok((start, end))
            }
        }
    }
}

/// Owns the ranges of every source, keyed by source path.
///
/// Every mutation either applies fully or leaves the store unchanged.
#[derive(Debug, Clone, Default)]
pub struct RangeStore {
    ranges: HashMap<PathBuf, Vec<Range>>,
}

impl RangeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a range to `source` and return its identity
    pub fn add_range(
        &mut self,
        source: &VideoSource,
        bounds: RangeBounds,
        crop: Option<CropRect>,
    ) -> Result<RangeId, DomainError> {
        let (start, end) = bounds.resolve(source.frame_count())?;
        if let Some(crop) = &crop {
            crop.validate_within(source.properties.frame_size())?;
        }

        let list = self.ranges.entry(source.path.clone()).or_default();
        let id = RangeId::generate();
        list.push(Range {
            id: id.clone(),
            start,
            end,
            crop,
            ordinal: list.len() as u32 + 1,
        });
        Ok(id)
    }

    /// Set the duration, clamping `end` to the source length
    pub fn update_duration(
        &mut self,
        source: &VideoSource,
        id: &RangeId,
        duration: u64,
    ) -> Result<&Range, DomainError> {
        let frame_count = source.frame_count();
        let range = self.range_mut(source.path(), id)?;
        if duration == 0 {
            return Err(DomainError::Validation(
                "Duration must be at least one frame".to_string(),
            ));
        }
        let end = range.start.saturating_add(duration).min(frame_count);
        if end <= range.start {
            return Err(DomainError::Validation(format!(
                "Range would be empty: start {} is at the end of the source",
                range.start
            )));
        }
        range.end = end;
        Ok(range)
    }

    /// Shift `start` by `delta` frames, keeping the duration
    pub fn nudge_start(
        &mut self,
        source: &VideoSource,
        id: &RangeId,
        delta: i64,
    ) -> Result<&Range, DomainError> {
        let frame_count = source.frame_count();
        let range = self.range_mut(source.path(), id)?;
        let duration = range.duration();
        let start = shift(range.start, delta);
        let end = start.saturating_add(duration).min(frame_count);
        if start >= end {
            return Err(DomainError::Validation(format!(
                "Moving start to {} would leave an empty range",
                start
            )));
        }
        range.start = start;
        range.end = end;
        Ok(range)
    }

    /// Grow or shrink the duration by `delta` frames, never below one frame
    pub fn nudge_end(
        &mut self,
        source: &VideoSource,
        id: &RangeId,
        delta: i64,
    ) -> Result<&Range, DomainError> {
        let duration = self.range_mut(source.path(), id)?.duration();
        let duration = shift(duration, delta).max(1);
        self.update_duration(source, id, duration)
    }

    /// Replace or clear the crop of a range
    pub fn set_crop(
        &mut self,
        source: &VideoSource,
        id: &RangeId,
        crop: Option<CropRect>,
    ) -> Result<&Range, DomainError> {
        if let Some(crop) = &crop {
            crop.validate_within(source.properties.frame_size())?;
        }
        let range = self.range_mut(source.path(), id)?;
        range.crop = crop;
        Ok(range)
    }

    /// Remove a range and renumber its siblings
    pub fn remove(&mut self, source: &Path, id: &RangeId) -> Result<Range, DomainError> {
        let list = self
            .ranges
            .get_mut(source)
            .ok_or_else(|| DomainError::RangeNotFound(id.to_string()))?;
        let position = list
            .iter()
            .position(|range| &range.id == id)
            .ok_or_else(|| DomainError::RangeNotFound(id.to_string()))?;

        let removed = list.remove(position);
        renumber(list);
        if list.is_empty() {
            self.ranges.remove(source);
        }
        Ok(removed)
    }

    pub fn find_by_id(&self, id: &RangeId) -> Option<&Range> {
        self.ranges
            .values()
            .flat_map(|list| list.iter())
            .find(|range| &range.id == id)
    }

    /// Source path owning a range
    pub fn source_of(&self, id: &RangeId) -> Option<&Path> {
        self.ranges
            .iter()
            .find(|(_, list)| list.iter().any(|range| &range.id == id))
            .map(|(path, _)| path.as_path())
    }

    /// Ranges of one source in ordinal order
    pub fn list_for_source(&self, source: &Path) -> &[Range] {
        self.ranges
            .get(source)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Replace the ranges of a source wholesale, renumbering ordinals by list order
    pub fn replace_for_source(&mut self, source: impl Into<PathBuf>, mut ranges: Vec<Range>) {
        let source = source.into();
        if ranges.is_empty() {
            self.ranges.remove(&source);
            return;
        }
        renumber(&mut ranges);
        self.ranges.insert(source, ranges);
    }

    /// All sources that currently own at least one range
    pub fn sources(&self) -> impl Iterator<Item = &Path> {
        self.ranges.keys().map(PathBuf::as_path)
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    fn range_mut(&mut self, source: &Path, id: &RangeId) -> Result<&mut Range, DomainError> {
        self.ranges
            .get_mut(source)
            .and_then(|list| list.iter_mut().find(|range| &range.id == id))
            .ok_or_else(|| DomainError::RangeNotFound(id.to_string()))
    }
}

fn shift(value: u64, delta: i64) -> u64 {
    if delta >= 0 {
        value.saturating_add(delta as u64)
    } else {
        value.saturating_sub(delta.unsigned_abs())
    }
}

fn renumber(list: &mut [Range]) {
    for (index, range) in list.iter_mut().enumerate() {
        range.ordinal = index as u32 + 1;
    }
}
