//! Frame position parsing and timecode formatting

use crate::domain::errors::DomainError;
use crate::domain::model::{FrameIndex, VideoProperties};
use crate::error::RangeCropResult;

/// Parses frame positions given either as frame numbers or as timecodes
pub struct TimeParser;

impl TimeParser {
    /// Parse a position into a frame index.
    ///
    /// Plain integers are frame numbers. `12.5s`, `MM:SS(.ms)` and `HH:MM:SS(.ms)`
    /// are converted through the source frame rate.
    pub fn parse_position(value: &str, properties: &VideoProperties) -> RangeCropResult<FrameIndex> {
        let value = value.trim();
        if let Ok(frame) = value.parse::<u64>() {
            return Ok(frame);
        }
        let seconds = Self::parse_seconds(value)?;
        Ok((seconds * properties.effective_fps()).round() as FrameIndex)
    }

    /// Parse `12.5s`, `MM:SS(.ms)` or `HH:MM:SS(.ms)` to seconds
    pub fn parse_seconds(value: &str) -> RangeCropResult<f64> {
        let value = value.trim();
        let invalid = || DomainError::Validation(format!("Invalid time '{}'", value));

        if let Some(secs) = value.strip_suffix('s') {
            let seconds = secs.trim().parse::<f64>().map_err(|_| invalid())?;
            return Self::non_negative(seconds, value);
        }

        let parts: Vec<&str> = value.split(':').collect();
        let seconds = match parts.as_slice() {
            [minutes, seconds] => {
                let minutes = minutes.parse::<f64>().map_err(|_| invalid())?;
                let seconds = seconds.parse::<f64>().map_err(|_| invalid())?;
                minutes * 60.0 + seconds
            }
            [hours, minutes, seconds] => {
                let hours = hours.parse::<f64>().map_err(|_| invalid())?;
                let minutes = minutes.parse::<f64>().map_err(|_| invalid())?;
                let seconds = seconds.parse::<f64>().map_err(|_| invalid())?;
                hours * 3600.0 + minutes * 60.0 + seconds
            }
            _ => return Err(invalid().into()),
        };
        Self::non_negative(seconds, value)
    }

    fn non_negative(seconds: f64, raw: &str) -> RangeCropResult<f64> {
        if seconds.is_finite() && seconds >= 0.0 {
            Ok(seconds)
        } else {
            Err(DomainError::Validation(format!("Time must be non-negative: '{}'", raw)).into())
        }
    }

    /// Format seconds to `HH:MM:SS.ms`, or `MM:SS.ms` under an hour
    pub fn format_time(seconds: f64) -> String {
        let total_ms = (seconds.max(0.0) * 1000.0).round() as u64;
        let hours = total_ms / 3_600_000;
        let minutes = (total_ms % 3_600_000) / 60_000;
        let secs = (total_ms % 60_000) / 1000;
        let milliseconds = total_ms % 1000;

        if hours > 0 {
            format!("{:02}:{:02}:{:02}.{:03}", hours, minutes, secs, milliseconds)
        } else {
            format!("{:02}:{:02}.{:03}", minutes, secs, milliseconds)
        }
    }

    /// Timecode of a frame on a given source
    pub fn format_frame(frame: FrameIndex, properties: &VideoProperties) -> String {
        Self::format_time(frame as f64 / properties.effective_fps())
    }
}
